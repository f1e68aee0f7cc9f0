//! Fixed-layout telemetry packet codec.
//!
//! The packet is the sender's in-memory telemetry struct sent verbatim, so
//! every field is read in native byte order at the offset a C compiler gives
//! it under natural alignment. Nothing is byte-swapped: sender and receiver
//! must share byte order and layout.
//!
//! | Offset | Size | Field                               |
//! |-------:|-----:|-------------------------------------|
//! |      0 |    4 | is_race_on (i32)                    |
//! |      4 |    4 | timestamp_ms (u32)                  |
//! |      8 |   12 | engine: max, idle, current rpm      |
//! |     20 |   12 | acceleration x, y, z                |
//! |     32 |   12 | velocity x, y, z                    |
//! |     44 |   12 | angular_velocity x, y, z            |
//! |     56 |   12 | rotation yaw, pitch, roll           |
//! |     68 |   16 | normalized_suspension_travel        |
//! |     84 |   16 | tire_slip_ratio                     |
//! |    100 |   16 | wheel_rotation_speed                |
//! |    116 |   16 | wheel_on_rumble_strip               |
//! |    132 |   16 | wheel_in_puddle_depth               |
//! |    148 |   16 | surface_rumble                      |
//! |    164 |   16 | tire_slip_angle                     |
//! |    180 |   16 | tire_combined_slip                  |
//! |    196 |   16 | suspension_travel_meters            |
//! |    212 |   24 | car: 6 x i32                        |
//! |    236 |    6 | object_hit: 6 x u8                  |
//! |    242 |    2 | padding                             |
//! |    244 |   12 | position x, y, z                    |
//! |    256 |    4 | speed                               |
//! |    260 |    4 | power                               |
//! |    264 |    4 | torque                              |
//! |    268 |   16 | tire_temp                           |
//! |    284 |    4 | boost                               |
//! |    288 |    4 | fuel                                |
//! |    292 |   20 | race: 5 x f32 timings               |
//! |    312 |    2 | race.lap_number (i16)               |
//! |    314 |    1 | race.position (u8)                  |
//! |    315 |    1 | padding                             |
//! |    316 |    6 | vehicle_control: 6 x u8             |
//! |    322 |    1 | normalized_driving_line             |
//! |    323 |    1 | normalized_ai_brake_difference      |
//!
//! Wheel groups are ordered front-left, front-right, rear-left, rear-right.

use snafu::Snafu;

use super::{
    Car, Engine, ObjectHit, Race, Rotation, Telemetry, Vector3, VehicleControl, WheelValues,
};

/// Size in bytes of one telemetry packet on the wire.
pub const TELEMETRY_PACKET_SIZE: usize = 324;

const OFF_IS_RACE_ON: usize = 0;
const OFF_TIMESTAMP: usize = 4;
const OFF_ENGINE: usize = 8;
const OFF_ACCELERATION: usize = 20;
const OFF_VELOCITY: usize = 32;
const OFF_ANGULAR_VELOCITY: usize = 44;
const OFF_ROTATION: usize = 56;
const OFF_NORMALIZED_SUSPENSION_TRAVEL: usize = 68;
const OFF_TIRE_SLIP_RATIO: usize = 84;
const OFF_WHEEL_ROTATION_SPEED: usize = 100;
const OFF_WHEEL_ON_RUMBLE_STRIP: usize = 116;
const OFF_WHEEL_IN_PUDDLE_DEPTH: usize = 132;
const OFF_SURFACE_RUMBLE: usize = 148;
const OFF_TIRE_SLIP_ANGLE: usize = 164;
const OFF_TIRE_COMBINED_SLIP: usize = 180;
const OFF_SUSPENSION_TRAVEL_METERS: usize = 196;
const OFF_CAR: usize = 212;
const OFF_OBJECT_HIT: usize = 236;
const OFF_POSITION: usize = 244;
const OFF_SPEED: usize = 256;
const OFF_POWER: usize = 260;
const OFF_TORQUE: usize = 264;
const OFF_TIRE_TEMP: usize = 268;
const OFF_BOOST: usize = 284;
const OFF_FUEL: usize = 288;
const OFF_RACE: usize = 292;
const OFF_RACE_LAP_NUMBER: usize = 312;
const OFF_RACE_POSITION: usize = 314;
const OFF_VEHICLE_CONTROL: usize = 316;
const OFF_NORMALIZED_DRIVING_LINE: usize = 322;
const OFF_NORMALIZED_AI_BRAKE_DIFFERENCE: usize = 323;

const OBJECT_HIT_SLOTS: usize = 6;

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum DecodeError {
    #[snafu(display("Buffer too small: {got} bytes, expected at least {expected} bytes"))]
    BufferTooSmall { got: usize, expected: usize },
}

/// Decode the first [`TELEMETRY_PACKET_SIZE`] bytes of `buffer`.
///
/// Trailing bytes are ignored. Values are not range checked.
pub fn decode(buffer: &[u8]) -> Result<Telemetry, DecodeError> {
    let Some(packet) = buffer.first_chunk::<TELEMETRY_PACKET_SIZE>() else {
        return Err(DecodeError::BufferTooSmall {
            got: buffer.len(),
            expected: TELEMETRY_PACKET_SIZE,
        });
    };
    let packet = PacketReader { buf: packet };

    let [accel, brake, clutch, handbrake, gear, steer] = packet.bytes::<6>(OFF_VEHICLE_CONTROL);

    Ok(Telemetry {
        is_race_on: packet.i32(OFF_IS_RACE_ON),
        timestamp_ms: packet.u32(OFF_TIMESTAMP),
        engine: Engine {
            max_rpm: packet.f32(OFF_ENGINE),
            idle_rpm: packet.f32(OFF_ENGINE + 4),
            current_rpm: packet.f32(OFF_ENGINE + 8),
        },
        acceleration: packet.vector3(OFF_ACCELERATION),
        velocity: packet.vector3(OFF_VELOCITY),
        angular_velocity: packet.vector3(OFF_ANGULAR_VELOCITY),
        rotation: Rotation {
            yaw: packet.f32(OFF_ROTATION),
            pitch: packet.f32(OFF_ROTATION + 4),
            roll: packet.f32(OFF_ROTATION + 8),
        },
        normalized_suspension_travel: packet.wheels(OFF_NORMALIZED_SUSPENSION_TRAVEL),
        tire_slip_ratio: packet.wheels(OFF_TIRE_SLIP_RATIO),
        wheel_rotation_speed: packet.wheels(OFF_WHEEL_ROTATION_SPEED),
        wheel_on_rumble_strip: packet.wheels(OFF_WHEEL_ON_RUMBLE_STRIP),
        wheel_in_puddle_depth: packet.wheels(OFF_WHEEL_IN_PUDDLE_DEPTH),
        surface_rumble: packet.wheels(OFF_SURFACE_RUMBLE),
        tire_slip_angle: packet.wheels(OFF_TIRE_SLIP_ANGLE),
        tire_combined_slip: packet.wheels(OFF_TIRE_COMBINED_SLIP),
        suspension_travel_meters: packet.wheels(OFF_SUSPENSION_TRAVEL_METERS),
        car: Car {
            ordinal: packet.i32(OFF_CAR),
            classification: packet.i32(OFF_CAR + 4),
            performance_index: packet.i32(OFF_CAR + 8),
            drivetrain_type: packet.i32(OFF_CAR + 12),
            num_cylinders: packet.i32(OFF_CAR + 16),
            car_type: packet.i32(OFF_CAR + 20),
        },
        object_hit: ObjectHit {
            objects: packet.bytes::<OBJECT_HIT_SLOTS>(OFF_OBJECT_HIT),
        },
        position: packet.vector3(OFF_POSITION),
        speed: packet.f32(OFF_SPEED),
        power: packet.f32(OFF_POWER),
        torque: packet.f32(OFF_TORQUE),
        tire_temp: packet.wheels(OFF_TIRE_TEMP),
        boost: packet.f32(OFF_BOOST),
        fuel: packet.f32(OFF_FUEL),
        race: Race {
            distance_traveled: packet.f32(OFF_RACE),
            best_lap: packet.f32(OFF_RACE + 4),
            last_lap: packet.f32(OFF_RACE + 8),
            current_lap: packet.f32(OFF_RACE + 12),
            current_time: packet.f32(OFF_RACE + 16),
            lap_number: packet.i16(OFF_RACE_LAP_NUMBER),
            position: packet.buf[OFF_RACE_POSITION],
        },
        vehicle_control: VehicleControl {
            accel,
            brake,
            clutch,
            handbrake,
            gear,
            steer,
        },
        normalized_driving_line: packet.buf[OFF_NORMALIZED_DRIVING_LINE],
        normalized_ai_brake_difference: packet.buf[OFF_NORMALIZED_AI_BRAKE_DIFFERENCE],
    })
}

/// Encode `telemetry` into its wire form. Padding bytes are zero.
pub fn encode(telemetry: &Telemetry) -> [u8; TELEMETRY_PACKET_SIZE] {
    let mut packet = PacketWriter {
        buf: [0u8; TELEMETRY_PACKET_SIZE],
    };

    packet.put(OFF_IS_RACE_ON, telemetry.is_race_on.to_ne_bytes());
    packet.put(OFF_TIMESTAMP, telemetry.timestamp_ms.to_ne_bytes());
    packet.f32s(
        OFF_ENGINE,
        &[
            telemetry.engine.max_rpm,
            telemetry.engine.idle_rpm,
            telemetry.engine.current_rpm,
        ],
    );
    packet.vector3(OFF_ACCELERATION, &telemetry.acceleration);
    packet.vector3(OFF_VELOCITY, &telemetry.velocity);
    packet.vector3(OFF_ANGULAR_VELOCITY, &telemetry.angular_velocity);
    packet.f32s(
        OFF_ROTATION,
        &[
            telemetry.rotation.yaw,
            telemetry.rotation.pitch,
            telemetry.rotation.roll,
        ],
    );
    packet.wheels(
        OFF_NORMALIZED_SUSPENSION_TRAVEL,
        &telemetry.normalized_suspension_travel,
    );
    packet.wheels(OFF_TIRE_SLIP_RATIO, &telemetry.tire_slip_ratio);
    packet.wheels(OFF_WHEEL_ROTATION_SPEED, &telemetry.wheel_rotation_speed);
    packet.wheels(OFF_WHEEL_ON_RUMBLE_STRIP, &telemetry.wheel_on_rumble_strip);
    packet.wheels(OFF_WHEEL_IN_PUDDLE_DEPTH, &telemetry.wheel_in_puddle_depth);
    packet.wheels(OFF_SURFACE_RUMBLE, &telemetry.surface_rumble);
    packet.wheels(OFF_TIRE_SLIP_ANGLE, &telemetry.tire_slip_angle);
    packet.wheels(OFF_TIRE_COMBINED_SLIP, &telemetry.tire_combined_slip);
    packet.wheels(
        OFF_SUSPENSION_TRAVEL_METERS,
        &telemetry.suspension_travel_meters,
    );

    let car = &telemetry.car;
    for (i, value) in [
        car.ordinal,
        car.classification,
        car.performance_index,
        car.drivetrain_type,
        car.num_cylinders,
        car.car_type,
    ]
    .into_iter()
    .enumerate()
    {
        packet.put(OFF_CAR + i * 4, value.to_ne_bytes());
    }
    packet.put(OFF_OBJECT_HIT, telemetry.object_hit.objects);

    packet.vector3(OFF_POSITION, &telemetry.position);
    packet.put(OFF_SPEED, telemetry.speed.to_ne_bytes());
    packet.put(OFF_POWER, telemetry.power.to_ne_bytes());
    packet.put(OFF_TORQUE, telemetry.torque.to_ne_bytes());
    packet.wheels(OFF_TIRE_TEMP, &telemetry.tire_temp);
    packet.put(OFF_BOOST, telemetry.boost.to_ne_bytes());
    packet.put(OFF_FUEL, telemetry.fuel.to_ne_bytes());

    let race = &telemetry.race;
    packet.f32s(
        OFF_RACE,
        &[
            race.distance_traveled,
            race.best_lap,
            race.last_lap,
            race.current_lap,
            race.current_time,
        ],
    );
    packet.put(OFF_RACE_LAP_NUMBER, race.lap_number.to_ne_bytes());
    packet.put(OFF_RACE_POSITION, [race.position]);

    let controls = &telemetry.vehicle_control;
    packet.put(
        OFF_VEHICLE_CONTROL,
        [
            controls.accel,
            controls.brake,
            controls.clutch,
            controls.handbrake,
            controls.gear,
            controls.steer,
        ],
    );
    packet.put(
        OFF_NORMALIZED_DRIVING_LINE,
        [telemetry.normalized_driving_line],
    );
    packet.put(
        OFF_NORMALIZED_AI_BRAKE_DIFFERENCE,
        [telemetry.normalized_ai_brake_difference],
    );

    packet.buf
}

/// Offset-addressed reads over a packet that is known to be full length.
struct PacketReader<'a> {
    buf: &'a [u8; TELEMETRY_PACKET_SIZE],
}

impl PacketReader<'_> {
    fn bytes<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[offset..offset + N]);
        out
    }

    fn f32(&self, offset: usize) -> f32 {
        f32::from_ne_bytes(self.bytes(offset))
    }

    fn i32(&self, offset: usize) -> i32 {
        i32::from_ne_bytes(self.bytes(offset))
    }

    fn u32(&self, offset: usize) -> u32 {
        u32::from_ne_bytes(self.bytes(offset))
    }

    fn i16(&self, offset: usize) -> i16 {
        i16::from_ne_bytes(self.bytes(offset))
    }

    fn vector3(&self, offset: usize) -> Vector3 {
        Vector3 {
            x: self.f32(offset),
            y: self.f32(offset + 4),
            z: self.f32(offset + 8),
        }
    }

    fn wheels(&self, offset: usize) -> WheelValues {
        WheelValues {
            front_left: self.f32(offset),
            front_right: self.f32(offset + 4),
            rear_left: self.f32(offset + 8),
            rear_right: self.f32(offset + 12),
        }
    }
}

struct PacketWriter {
    buf: [u8; TELEMETRY_PACKET_SIZE],
}

impl PacketWriter {
    fn put<const N: usize>(&mut self, offset: usize, bytes: [u8; N]) {
        self.buf[offset..offset + N].copy_from_slice(&bytes);
    }

    fn f32s(&mut self, offset: usize, values: &[f32]) {
        for (i, value) in values.iter().enumerate() {
            self.put(offset + i * 4, value.to_ne_bytes());
        }
    }

    fn vector3(&mut self, offset: usize, vector: &Vector3) {
        self.f32s(offset, &[vector.x, vector.y, vector.z]);
    }

    fn wheels(&mut self, offset: usize, wheels: &WheelValues) {
        self.f32s(offset, &wheels.as_array());
    }
}
