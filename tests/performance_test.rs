use std::time::Instant;

use tangue::{
    PollResult, TelemetryStore,
    telemetry::{Telemetry, codec},
};

/// Decoding has to keep up with a 60 Hz stream with lots of room to spare
#[test]
fn test_decode_keeps_up_with_frame_rate() {
    let packets: Vec<_> = (0..10_000u32)
        .map(|i| {
            codec::encode(&Telemetry {
                timestamp_ms: i * 16,
                speed: i as f32 * 0.1,
                ..Telemetry::default()
            })
        })
        .collect();

    let start = Instant::now();
    for packet in &packets {
        let telemetry = codec::decode(packet).expect("Failed to decode packet");
        assert!(telemetry.speed >= 0.);
    }
    let elapsed = start.elapsed();

    let avg_time_per_packet_us = elapsed.as_micros() as f64 / packets.len() as f64;
    println!("Decoded {} packets in {:?}", packets.len(), elapsed);
    println!("Average time per packet: {:.2}μs", avg_time_per_packet_us);

    // 60 Hz leaves 16.67ms per frame
    assert!(
        avg_time_per_packet_us < 1000.0,
        "Decoding too slow: {:.2}μs per packet",
        avg_time_per_packet_us
    );
}

/// Store updates and snapshots are copies of a small value and should stay cheap
#[test]
fn test_store_update_and_snapshot_are_cheap() {
    let store = TelemetryStore::new();
    let iterations = 10_000u32;

    let start = Instant::now();
    for i in 0..iterations {
        store.update(&PollResult::Received(Box::new(Telemetry {
            timestamp_ms: i,
            ..Telemetry::default()
        })));
        let sample = store.snapshot();
        assert_eq!(sample.telemetry.timestamp_ms, i);
    }
    let elapsed = start.elapsed();

    let avg_time_us = elapsed.as_micros() as f64 / iterations as f64;
    println!("Average update + snapshot time: {:.2}μs", avg_time_us);
    assert!(
        avg_time_us < 1000.0,
        "Store too slow: {:.2}μs per update",
        avg_time_us
    );
}
