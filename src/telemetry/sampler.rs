use std::{io, sync::mpsc::Sender, time::Instant};

use log::{error, warn};
use simple_moving_average::{SMA, SumTreeSMA};

use super::{
    PollResult, Status, Telemetry,
    codec::TELEMETRY_PACKET_SIZE,
    producer::{MAX_DATAGRAM_SIZE, TelemetryProducer},
    store::TelemetryStore,
};

const PACKET_RATE_WINDOW: usize = 60;

/// Per-status tick counters and the recent packet arrival rate.
pub struct SamplingStats {
    pub ticks: u64,
    pub received: u64,
    pub no_data: u64,
    pub parse_errors: u64,
    pub stale: u64,
    pub transport_errors: u64,
    arrival_intervals_ms: SumTreeSMA<f32, f32, PACKET_RATE_WINDOW>,
    last_arrival: Option<Instant>,
}

impl Default for SamplingStats {
    fn default() -> Self {
        Self {
            ticks: 0,
            received: 0,
            no_data: 0,
            parse_errors: 0,
            stale: 0,
            transport_errors: 0,
            arrival_intervals_ms: SumTreeSMA::new(),
            last_arrival: None,
        }
    }
}

impl SamplingStats {
    pub(crate) fn record(&mut self, status: Status, now: Instant) {
        self.ticks += 1;
        match status {
            Status::NoData => self.no_data += 1,
            Status::ParseError => self.parse_errors += 1,
            Status::Stale => self.stale += 1,
            Status::TransportError => self.transport_errors += 1,
            Status::Success => {
                self.received += 1;
                if let Some(last) = self.last_arrival {
                    let interval = now.duration_since(last).as_secs_f32() * 1000.;
                    self.arrival_intervals_ms.add_sample(interval);
                }
                self.last_arrival = Some(now);
            }
        }
    }

    /// Average rate of accepted packets over the last few arrivals.
    pub fn packets_per_second(&self) -> f32 {
        if self.arrival_intervals_ms.get_num_samples() == 0 {
            return 0.;
        }
        let avg_interval_ms = self.arrival_intervals_ms.get_average();
        if avg_interval_ms <= 0. {
            return 0.;
        }
        1000. / avg_interval_ms
    }
}

/// Per-frame driver that moves at most one datagram from the producer into the store.
///
/// The host calls [`SamplingLoop::tick`] once per frame and renders from the
/// store afterwards. A tick never blocks or sleeps; pacing is up to the host.
/// Datagrams that pile up between frames are drained one per tick, never queued
/// on our side.
pub struct SamplingLoop<P: TelemetryProducer> {
    producer: P,
    store: TelemetryStore,
    max_datagram_size: usize,
    recorder: Option<Sender<Telemetry>>,
    stats: SamplingStats,
    halted: bool,
    halt_reason: Option<io::Error>,
}

impl<P: TelemetryProducer> SamplingLoop<P> {
    pub fn new(producer: P, store: TelemetryStore) -> Self {
        Self {
            producer,
            store,
            max_datagram_size: MAX_DATAGRAM_SIZE,
            recorder: None,
            stats: SamplingStats::default(),
            halted: false,
            halt_reason: None,
        }
    }

    /// Read limit per datagram, clamped so a full packet always fits.
    pub fn with_max_datagram_size(mut self, max_datagram_size: usize) -> Self {
        self.max_datagram_size = max_datagram_size.clamp(TELEMETRY_PACKET_SIZE, MAX_DATAGRAM_SIZE);
        self
    }

    /// Forward every accepted sample to `recorder` as well as the store.
    pub fn with_recorder(mut self, recorder: Sender<Telemetry>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Poll the producer once, fold the result into the store and return the
    /// resulting status.
    ///
    /// After a transport error the loop is halted: the producer is closed and
    /// later ticks return [`Status::TransportError`] without polling.
    pub fn tick(&mut self) -> Status {
        if self.halted {
            return Status::TransportError;
        }

        let result = self.producer.try_receive(self.max_datagram_size);
        let status = self.store.update(&result);
        match result {
            PollResult::Received(telemetry) if status == Status::Success => {
                self.record(*telemetry);
            }
            PollResult::TransportError(e) => {
                error!("Telemetry sampling halted: {}", e);
                self.producer.close();
                self.halted = true;
                self.halt_reason = Some(e);
            }
            _ => {}
        }

        self.stats.record(status, Instant::now());
        status
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// The receive error that halted the loop, handed out once.
    pub fn take_halt_reason(&mut self) -> Option<io::Error> {
        self.halt_reason.take()
    }

    pub fn store(&self) -> &TelemetryStore {
        &self.store
    }

    pub fn stats(&self) -> &SamplingStats {
        &self.stats
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    /// Close the producer. Later ticks see no data.
    pub fn close(&mut self) {
        self.producer.close();
    }

    fn record(&mut self, telemetry: Telemetry) {
        let Some(recorder) = self.recorder.as_ref() else {
            return;
        };
        if let Err(e) = recorder.send(telemetry) {
            warn!("Telemetry recorder is gone, recording stopped: {}", e);
            self.recorder = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{DecodeError, MockTelemetryProducer, TelemetrySource, codec};
    use std::{sync::mpsc, time::Duration};

    fn point(speed: f32) -> Telemetry {
        Telemetry {
            speed,
            ..Telemetry::default()
        }
    }

    #[test]
    fn test_tick_polls_exactly_once() {
        let producer = MockTelemetryProducer::from_points(vec![point(1.), point(2.)]);
        let mut sampler = SamplingLoop::new(producer, TelemetryStore::new());

        assert_eq!(sampler.tick(), Status::Success);
        assert_eq!(sampler.producer().polls, 1);
        assert_eq!(sampler.store().snapshot().telemetry.speed, 1.);

        assert_eq!(sampler.tick(), Status::Success);
        assert_eq!(sampler.producer().polls, 2);
        assert_eq!(sampler.store().snapshot().telemetry.speed, 2.);
    }

    #[test]
    fn test_no_data_tick_keeps_last_sample() {
        let producer = MockTelemetryProducer::from_points(vec![point(60.)]);
        let mut sampler = SamplingLoop::new(producer, TelemetryStore::new());

        sampler.tick();
        assert_eq!(sampler.tick(), Status::NoData);

        let sample = sampler.store().snapshot();
        assert_eq!(sample.telemetry.speed, 60.);
        assert_eq!(sample.status, Status::NoData);
    }

    #[test]
    fn test_parse_error_keeps_last_sample() {
        let producer = MockTelemetryProducer::from_results(vec![
            PollResult::Received(Box::new(point(12.))),
            PollResult::ParseError(DecodeError::BufferTooSmall {
                got: 0,
                expected: TELEMETRY_PACKET_SIZE,
            }),
        ]);
        let mut sampler = SamplingLoop::new(producer, TelemetryStore::new());

        sampler.tick();
        assert_eq!(sampler.tick(), Status::ParseError);
        assert_eq!(sampler.store().snapshot().telemetry.speed, 12.);
        assert!(!sampler.is_halted());
    }

    #[test]
    fn test_transport_error_halts_sampling() {
        let producer = MockTelemetryProducer::from_results(vec![
            PollResult::TransportError(io::Error::other("socket gone")),
            PollResult::Received(Box::new(point(1.))),
        ]);
        let mut sampler = SamplingLoop::new(producer, TelemetryStore::new());

        assert_eq!(sampler.tick(), Status::TransportError);
        assert!(sampler.is_halted());
        assert!(sampler.producer().is_closed());

        assert_eq!(sampler.tick(), Status::TransportError);
        assert_eq!(sampler.producer().polls, 1);

        let reason = sampler.take_halt_reason().unwrap();
        assert_eq!(reason.to_string(), "socket gone");
        assert!(sampler.take_halt_reason().is_none());
        assert_eq!(sampler.store().snapshot().status, Status::TransportError);
    }

    #[test]
    fn test_recorder_receives_accepted_samples() {
        let producer = MockTelemetryProducer::from_results(vec![
            PollResult::Received(Box::new(point(1.))),
            PollResult::NoData,
            PollResult::Received(Box::new(point(2.))),
        ]);
        let (tx, rx) = mpsc::channel();
        let mut sampler = SamplingLoop::new(producer, TelemetryStore::new()).with_recorder(tx);

        for _ in 0..3 {
            sampler.tick();
        }
        drop(sampler);

        let recorded: Vec<f32> = rx.iter().map(|t| t.speed).collect();
        assert_eq!(recorded, vec![1., 2.]);
    }

    #[test]
    fn test_stale_samples_are_not_recorded() {
        let producer = MockTelemetryProducer::from_points(vec![
            Telemetry {
                timestamp_ms: 200,
                ..point(2.)
            },
            Telemetry {
                timestamp_ms: 100,
                ..point(1.)
            },
        ]);
        let (tx, rx) = mpsc::channel();
        let mut sampler =
            SamplingLoop::new(producer, TelemetryStore::with_stale_rejection(true)).with_recorder(tx);

        assert_eq!(sampler.tick(), Status::Success);
        assert_eq!(sampler.tick(), Status::Stale);
        assert_eq!(sampler.stats().stale, 1);
        drop(sampler);

        assert_eq!(rx.iter().count(), 1);
    }

    #[test]
    fn test_dropped_recorder_does_not_stop_sampling() {
        let producer = MockTelemetryProducer::from_points(vec![point(1.), point(2.)]);
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut sampler = SamplingLoop::new(producer, TelemetryStore::new()).with_recorder(tx);

        assert_eq!(sampler.tick(), Status::Success);
        assert_eq!(sampler.tick(), Status::Success);
        assert_eq!(sampler.store().snapshot().telemetry.speed, 2.);
    }

    #[test]
    fn test_close_turns_ticks_into_no_data() {
        let producer = MockTelemetryProducer::from_points(vec![point(1.)]);
        let mut sampler = SamplingLoop::new(producer, TelemetryStore::new());
        sampler.close();
        assert_eq!(sampler.tick(), Status::NoData);
        assert!(!sampler.store().snapshot().has_data());
    }

    #[test]
    fn test_stats_count_statuses() {
        let producer = MockTelemetryProducer::from_results(vec![
            PollResult::Received(Box::new(point(1.))),
            PollResult::NoData,
            PollResult::ParseError(DecodeError::BufferTooSmall {
                got: 3,
                expected: TELEMETRY_PACKET_SIZE,
            }),
            PollResult::Received(Box::new(point(2.))),
        ]);
        let mut sampler = SamplingLoop::new(producer, TelemetryStore::new());
        for _ in 0..5 {
            sampler.tick();
        }

        let stats = sampler.stats();
        assert_eq!(stats.ticks, 5);
        assert_eq!(stats.received, 2);
        assert_eq!(stats.no_data, 2);
        assert_eq!(stats.parse_errors, 1);
        assert_eq!(stats.transport_errors, 0);
    }

    #[test]
    fn test_packet_rate_from_arrival_intervals() {
        let mut stats = SamplingStats::default();
        assert_eq!(stats.packets_per_second(), 0.);

        let start = Instant::now();
        for i in 0..10u64 {
            stats.record(Status::Success, start + Duration::from_millis(i * 20));
            stats.record(Status::NoData, start + Duration::from_millis(i * 20 + 10));
        }
        assert!((stats.packets_per_second() - 50.).abs() < 0.5);
    }

    #[test]
    fn test_datagram_size_is_capped() {
        let sampler = SamplingLoop::new(MockTelemetryProducer::default(), TelemetryStore::new())
            .with_max_datagram_size(1 << 20);
        assert_eq!(sampler.max_datagram_size, MAX_DATAGRAM_SIZE);
    }

    #[test]
    fn test_full_packet_accepted_with_zero_datagram_size() {
        let source = TelemetrySource::open(0).unwrap();
        let port = source.local_addr().unwrap().port();
        let mut sampler =
            SamplingLoop::new(source, TelemetryStore::new()).with_max_datagram_size(0);
        assert_eq!(sampler.max_datagram_size, TELEMETRY_PACKET_SIZE);

        let sender = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(&codec::encode(&point(42.)), ("127.0.0.1", port))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut status = sampler.tick();
        while status == Status::NoData && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
            status = sampler.tick();
        }
        assert_eq!(status, Status::Success);
        assert_eq!(sampler.store().snapshot().telemetry.speed, 42.);
    }
}
