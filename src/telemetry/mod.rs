pub mod codec;
pub mod producer;
pub mod sampler;
pub mod store;

use serde::{Deserialize, Serialize};
use uom::si::{
    f32::{Power, Pressure, ThermodynamicTemperature, Velocity},
    power::{horsepower, watt},
    pressure::{bar, pound_force_per_square_inch},
    thermodynamic_temperature::{degree_celsius, degree_fahrenheit},
    velocity::{kilometer_per_hour, meter_per_second},
};

pub use codec::{DecodeError, TELEMETRY_PACKET_SIZE, decode, encode};
pub use producer::{MockTelemetryProducer, PollResult, TelemetryProducer, TelemetrySource};
pub use sampler::{SamplingLoop, SamplingStats};
pub use store::TelemetryStore;

/// Fraction of max RPM above which the tachometer turns yellow.
pub const RPM_WARNING_FRACTION: f32 = 0.6;
/// Fraction of max RPM above which the tachometer turns red.
pub const RPM_REDLINE_FRACTION: f32 = 0.8;
/// Fuel percentage below which the low fuel light comes on.
pub const LOW_FUEL_PCT: f32 = 15.0;
/// Steering input value for a centred wheel.
pub const STEER_CENTER: u8 = 128;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    pub max_rpm: f32,
    pub idle_rpm: f32,
    pub current_rpm: f32,
}

impl Engine {
    /// Current RPM as a fraction of max RPM, clamped to `0.0..=1.0`.
    /// Returns 0 when the game reports no max RPM (menus, replays).
    pub fn rpm_fraction(&self) -> f32 {
        if self.max_rpm <= 0. {
            return 0.;
        }
        (self.current_rpm / self.max_rpm).clamp(0., 1.)
    }

    pub fn rpm_zone(&self) -> RpmZone {
        let fraction = self.rpm_fraction();
        if fraction > RPM_REDLINE_FRACTION {
            RpmZone::Redline
        } else if fraction > RPM_WARNING_FRACTION {
            RpmZone::Warning
        } else {
            RpmZone::Normal
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpmZone {
    Normal,
    Warning,
    Redline,
}

/// Right-handed 3D vector: +X right, +Y up, +Z forward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// One value per wheel, in wire order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelValues {
    pub front_left: f32,
    pub front_right: f32,
    pub rear_left: f32,
    pub rear_right: f32,
}

impl WheelValues {
    pub fn as_array(&self) -> [f32; 4] {
        [
            self.front_left,
            self.front_right,
            self.rear_left,
            self.rear_right,
        ]
    }

    pub fn from_array(values: [f32; 4]) -> Self {
        let [front_left, front_right, rear_left, rear_right] = values;
        Self {
            front_left,
            front_right,
            rear_left,
            rear_right,
        }
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self::from_array(self.as_array().map(f))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Drivetrain {
    Fwd,
    Rwd,
    Awd,
}

impl Drivetrain {
    pub fn label(&self) -> &'static str {
        match self {
            Drivetrain::Fwd => "FWD",
            Drivetrain::Rwd => "RWD",
            Drivetrain::Awd => "AWD",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Car {
    /// Unique ID of the car make/model
    pub ordinal: i32,
    /// Performance class, 0 (D) to 7 (X)
    pub classification: i32,
    /// 100 to 999
    pub performance_index: i32,
    /// 0 = FWD, 1 = RWD, 2 = AWD
    pub drivetrain_type: i32,
    pub num_cylinders: i32,
    pub car_type: i32,
}

impl Car {
    /// Decoded drivetrain, `None` for values outside the documented range.
    pub fn drivetrain(&self) -> Option<Drivetrain> {
        match self.drivetrain_type {
            0 => Some(Drivetrain::Fwd),
            1 => Some(Drivetrain::Rwd),
            2 => Some(Drivetrain::Awd),
            _ => None,
        }
    }
}

/// Up to 6 object identifiers hit during the last interval; 0 marks an empty slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectHit {
    pub objects: [u8; 6],
}

impl ObjectHit {
    pub fn hits(&self) -> impl Iterator<Item = u8> + '_ {
        self.objects.iter().copied().filter(|id| *id != 0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub distance_traveled: f32,
    pub best_lap: f32,
    pub last_lap: f32,
    pub current_lap: f32,
    pub current_time: f32,
    pub lap_number: i16,
    /// 1 = leader
    pub position: u8,
}

/// Raw 8-bit driver inputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleControl {
    pub accel: u8,
    pub brake: u8,
    pub clutch: u8,
    pub handbrake: u8,
    pub gear: u8,
    pub steer: u8,
}

impl VehicleControl {
    /// Gear label as shown on the dashboard, `N` for 0.
    pub fn gear_label(&self) -> String {
        match self.gear {
            0 => "N".to_string(),
            gear => gear.to_string(),
        }
    }

    /// Absolute steering deviation from centre, 0 to 128.
    pub fn steer_deviation(&self) -> u8 {
        self.steer.abs_diff(STEER_CENTER)
    }
}

/// One complete snapshot of the simulated vehicle and race state.
///
/// Field order follows the wire layout documented in [`codec`]. The default
/// value is all zeroes, which is what a renderer sees before the first packet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// 1 when a race is on, 0 otherwise
    pub is_race_on: i32,
    /// In-game timestamp in milliseconds, wraps at `u32::MAX`
    pub timestamp_ms: u32,
    pub engine: Engine,

    pub acceleration: Vector3,
    pub velocity: Vector3,
    pub angular_velocity: Vector3,
    pub rotation: Rotation,

    /// 0.0 = max stretch, 1.0 = max compression
    pub normalized_suspension_travel: WheelValues,
    pub tire_slip_ratio: WheelValues,
    /// rad/s
    pub wheel_rotation_speed: WheelValues,
    /// 1 = on rumble strip
    pub wheel_on_rumble_strip: WheelValues,
    /// 0.0 to 1.0, 1.0 = deepest puddle
    pub wheel_in_puddle_depth: WheelValues,
    pub surface_rumble: WheelValues,
    pub tire_slip_angle: WheelValues,
    pub tire_combined_slip: WheelValues,
    /// Meters
    pub suspension_travel_meters: WheelValues,

    pub car: Car,
    pub object_hit: ObjectHit,

    pub position: Vector3,
    /// m/s
    pub speed: f32,
    /// Watts
    pub power: f32,
    /// Newton-meter
    pub torque: f32,
    /// Degrees Fahrenheit
    pub tire_temp: WheelValues,
    /// PSI
    pub boost: f32,
    /// Fraction of fuel left, 0.0 to 1.0
    pub fuel: f32,
    pub race: Race,
    pub vehicle_control: VehicleControl,

    pub normalized_driving_line: u8,
    pub normalized_ai_brake_difference: u8,
}

impl Telemetry {
    pub fn race_active(&self) -> bool {
        self.is_race_on != 0
    }

    pub fn speed_kph(&self) -> f32 {
        Velocity::new::<meter_per_second>(self.speed).get::<kilometer_per_hour>()
    }

    pub fn power_hp(&self) -> f32 {
        Power::new::<watt>(self.power).get::<horsepower>()
    }

    pub fn boost_bar(&self) -> f32 {
        Pressure::new::<pound_force_per_square_inch>(self.boost).get::<bar>()
    }

    pub fn fuel_pct(&self) -> f32 {
        self.fuel * 100.
    }

    pub fn tire_temp_celsius(&self) -> WheelValues {
        self.tire_temp.map(|temp| {
            ThermodynamicTemperature::new::<degree_fahrenheit>(temp).get::<degree_celsius>()
        })
    }

    /// Warning lights that should currently be lit.
    pub fn alerts(&self) -> Vec<Alert> {
        let mut alerts = Vec::new();
        if self.vehicle_control.handbrake != 0 {
            alerts.push(Alert::Handbrake);
        }
        if self.fuel_pct() < LOW_FUEL_PCT {
            alerts.push(Alert::LowFuel);
        }
        if self.engine.rpm_zone() == RpmZone::Redline {
            alerts.push(Alert::Redline);
        }
        alerts
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alert {
    Handbrake,
    LowFuel,
    Redline,
}

impl Alert {
    pub fn label(&self) -> &'static str {
        match self {
            Alert::Handbrake => "HANDBRAKE",
            Alert::LowFuel => "LOW FUEL",
            Alert::Redline => "SHIFT",
        }
    }
}

/// Outcome of the most recent sampling tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[default]
    NoData,
    Success,
    ParseError,
    TransportError,
    /// Sample was older than the stored one and was dropped.
    Stale,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::NoData => "no data",
            Status::Success => "ok",
            Status::ParseError => "parse error",
            Status::TransportError => "transport error",
            Status::Stale => "stale",
        }
    }
}

/// Last-known-good telemetry paired with the status of the latest tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TelemetrySample {
    pub telemetry: Telemetry,
    pub status: Status,
    /// Number of samples accepted so far, 0 until the first success.
    pub sequence: u64,
}

impl TelemetrySample {
    pub fn has_data(&self) -> bool {
        self.sequence > 0
    }
}
