use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;
use tangue::{
    PollResult, TelemetryStore,
    telemetry::{Engine, MockTelemetryProducer, SamplingLoop, Telemetry, VehicleControl, codec},
};

fn create_sample_telemetry(point_no: u32) -> Telemetry {
    Telemetry {
        is_race_on: 1,
        timestamp_ms: point_no * 16, // ~60Hz
        engine: Engine {
            max_rpm: 8000.,
            idle_rpm: 800.,
            current_rpm: 5000. + point_no as f32,
        },
        speed: 50.0 + (point_no as f32 * 0.1),
        power: 250_000.,
        torque: 400.,
        fuel: 0.6,
        vehicle_control: VehicleControl {
            accel: 200,
            brake: 0,
            gear: 3,
            steer: 140,
            ..VehicleControl::default()
        },
        ..Telemetry::default()
    }
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    let telemetry = create_sample_telemetry(0);
    let packet = codec::encode(&telemetry);

    group.bench_function("decode_packet", |b| {
        b.iter(|| black_box(codec::decode(black_box(&packet)).unwrap()));
    });

    group.bench_function("encode_packet", |b| {
        b.iter(|| black_box(codec::encode(black_box(&telemetry))));
    });

    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");

    let store = TelemetryStore::new();
    let result = PollResult::Received(Box::new(create_sample_telemetry(0)));

    group.bench_function("update", |b| {
        b.iter(|| black_box(store.update(black_box(&result))));
    });

    group.bench_function("snapshot", |b| {
        b.iter(|| black_box(store.snapshot()));
    });

    group.finish();
}

fn bench_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampling");

    group.bench_function("tick_1000_points", |b| {
        b.iter(|| {
            let points = (0..1000).map(create_sample_telemetry).collect();
            let mut sampler =
                SamplingLoop::new(MockTelemetryProducer::from_points(points), TelemetryStore::new());
            for _ in 0..1000 {
                black_box(sampler.tick());
            }
        });
    });

    group.finish();
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");

    let telemetry = create_sample_telemetry(0);

    group.bench_function("serialize_telemetry", |b| {
        b.iter(|| black_box(serde_json::to_string(&telemetry).unwrap()));
    });

    let json = serde_json::to_string(&telemetry).unwrap();
    group.bench_function("deserialize_telemetry", |b| {
        b.iter(|| black_box(serde_json::from_str::<Telemetry>(&json).unwrap()));
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(100);
    targets = bench_codec, bench_store, bench_sampling, bench_serialization
}
criterion_main!(benches);
