use std::time::{Duration, Instant};

use itertools::Itertools;

use crate::telemetry::{RpmZone, SamplingStats, Status, Telemetry, TelemetrySample};

const INPUT_BAR_WIDTH: usize = 20;

/// Text readout of the telemetry store, throttled to one readout per interval.
pub struct ConsoleDashboard {
    verbose: bool,
    port: Option<u16>,
    readout_interval: Duration,
    last_readout: Option<Instant>,
}

impl ConsoleDashboard {
    pub fn new(verbose: bool, port: Option<u16>, readout_interval: Duration) -> Self {
        Self {
            verbose,
            port,
            readout_interval,
            last_readout: None,
        }
    }

    /// Build the readout for `sample` if the readout interval has passed since
    /// the previous one.
    pub fn render(
        &mut self,
        sample: &TelemetrySample,
        stats: &SamplingStats,
        now: Instant,
    ) -> Option<String> {
        if let Some(last) = self.last_readout
            && now.duration_since(last) < self.readout_interval
        {
            return None;
        }
        self.last_readout = Some(now);

        let status = status_line(sample.status, self.port, stats.packets_per_second());
        if !sample.has_data() {
            return Some(format!("{status}\nWaiting for telemetry..."));
        }
        let readout = if self.verbose {
            verbose_readout(&sample.telemetry)
        } else {
            brief_readout(&sample.telemetry)
        };
        Some(format!("{status}\n{readout}"))
    }
}

pub fn status_line(status: Status, port: Option<u16>, packets_per_second: f32) -> String {
    let port = port.map_or_else(|| "-".to_string(), |p| p.to_string());
    format!(
        "[{}] port {} | {:.0} pkt/s",
        status.label(),
        port,
        packets_per_second
    )
}

/// Speed, RPM and gear on one line.
pub fn brief_readout(telemetry: &Telemetry) -> String {
    format!(
        "Speed: {:.1} km/h | RPM: {:.0} | Gear: {}",
        telemetry.speed_kph(),
        telemetry.engine.current_rpm,
        telemetry.vehicle_control.gear_label()
    )
}

pub fn verbose_readout(telemetry: &Telemetry) -> String {
    let controls = &telemetry.vehicle_control;
    let mut lines = Vec::new();

    if telemetry.race_active() {
        lines.push(format!(
            "Lap {} | P{} | Current {} | Last {} | Best {}",
            telemetry.race.lap_number,
            telemetry.race.position,
            format_lap_time(telemetry.race.current_lap),
            format_lap_time(telemetry.race.last_lap),
            format_lap_time(telemetry.race.best_lap)
        ));
    }

    let car = &telemetry.car;
    lines.push(format!(
        "Car #{} | {} | PI {} | {} cyl",
        car.ordinal,
        car.drivetrain().map_or("UNK", |d| d.label()),
        car.performance_index,
        car.num_cylinders
    ));
    lines.push(format!(
        "Speed: {:.1} km/h | RPM: {:.0}/{:.0} [{}] | Gear: {}",
        telemetry.speed_kph(),
        telemetry.engine.current_rpm,
        telemetry.engine.max_rpm,
        zone_label(telemetry.engine.rpm_zone()),
        controls.gear_label()
    ));
    lines.push(format!(
        "Power: {:.0} hp | Torque: {:.0} Nm | Boost: {:.2} bar | Fuel: {:.0}%",
        telemetry.power_hp(),
        telemetry.torque,
        telemetry.boost_bar(),
        telemetry.fuel_pct()
    ));
    lines.push(format!("Throttle {}", input_bar(controls.accel)));
    lines.push(format!("Brake    {}", input_bar(controls.brake)));
    lines.push(format!("Clutch   {}", input_bar(controls.clutch)));
    lines.push(format!("Steering deviation: {}", controls.steer_deviation()));
    let hits = telemetry.object_hit.hits().join(", ");
    if !hits.is_empty() {
        lines.push(format!("Object hits: {hits}"));
    }
    lines.push(format!(
        "Tires (C): {}",
        telemetry
            .tire_temp_celsius()
            .as_array()
            .iter()
            .map(|temp| format!("{temp:.0}"))
            .join(" / ")
    ));

    let alerts = telemetry.alerts();
    if !alerts.is_empty() {
        lines.push(format!(
            "!! {}",
            alerts.iter().map(|alert| alert.label()).join(" | ")
        ));
    }
    lines.join("\n")
}

fn zone_label(zone: RpmZone) -> &'static str {
    match zone {
        RpmZone::Normal => "green",
        RpmZone::Warning => "yellow",
        RpmZone::Redline => "red",
    }
}

/// `m:ss.mmm`, or `-:--.---` for non-positive times.
pub fn format_lap_time(seconds: f32) -> String {
    if seconds.is_nan() || seconds <= 0. {
        return "-:--.---".to_string();
    }
    let total_ms = (seconds * 1000.).round() as u64;
    format!(
        "{}:{:02}.{:03}",
        total_ms / 60_000,
        (total_ms / 1000) % 60,
        total_ms % 1000
    )
}

fn input_bar(value: u8) -> String {
    let filled = value as usize * INPUT_BAR_WIDTH / u8::MAX as usize;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        " ".repeat(INPUT_BAR_WIDTH - filled),
        value as usize * 100 / u8::MAX as usize
    )
}
