use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket},
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use log::{debug, info};

use crate::{
    TangueError,
    telemetry::{Telemetry, codec},
};

pub const DEFAULT_REPLAY_RATE_HZ: u32 = 60;

/// Load a JSON Lines recording produced by [`crate::writer::write_telemetry`].
pub fn load_telemetry_jsonl(source_file: &Path) -> Result<Vec<Telemetry>, TangueError> {
    if !source_file.exists() {
        return Err(TangueError::InvalidTelemetryFile {
            path: format!("{:?}", source_file),
        });
    }

    let points = serde_jsonlines::json_lines(source_file)
        .map_err(|e| TangueError::TelemetryLoaderError { source: e })?
        .collect::<Result<Vec<Telemetry>, std::io::Error>>()
        .map_err(|e| TangueError::TelemetryLoaderError { source: e })?;

    if points.is_empty() {
        return Err(TangueError::InvalidTelemetryFile {
            path: format!("{:?}", source_file),
        });
    }
    info!("Loaded {} telemetry samples from {:?}", points.len(), source_file);
    Ok(points)
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub target: SocketAddr,
    pub rate_hz: u32,
    /// Start over from the first sample after the last one
    pub repeat: bool,
}

/// Send `points` to `options.target`, one encoded datagram per sample, paced
/// at `options.rate_hz`. Blocks until done or until `running` is cleared and
/// returns the number of datagrams sent.
pub fn replay_telemetry(
    points: &[Telemetry],
    options: &ReplayOptions,
    running: &AtomicBool,
) -> Result<usize, TangueError> {
    let bind_addr: SocketAddr = if options.target.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket =
        UdpSocket::bind(bind_addr).map_err(|e| TangueError::ReplaySendError { source: e })?;
    let interval = Duration::from_secs(1) / options.rate_hz.max(1);
    info!(
        "Replaying {} samples to {} at {} Hz",
        points.len(),
        options.target,
        options.rate_hz.max(1)
    );

    let mut sent = 0;
    let mut next_send = Instant::now();
    'replay: loop {
        for point in points {
            if !running.load(Ordering::SeqCst) {
                break 'replay;
            }
            socket
                .send_to(&codec::encode(point), options.target)
                .map_err(|e| TangueError::ReplaySendError { source: e })?;
            sent += 1;
            debug!(
                "Sent sample at {} ms, speed {:.1} m/s",
                point.timestamp_ms, point.speed
            );

            next_send += interval;
            let now = Instant::now();
            if next_send > now {
                thread::sleep(next_send - now);
            } else {
                next_send = now;
            }
        }
        if !options.repeat || points.is_empty() {
            break;
        }
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TELEMETRY_PACKET_SIZE;

    fn write_recording(path: &Path, points: &[Telemetry]) {
        let lines: Vec<String> = points
            .iter()
            .map(|point| serde_json::to_string(point).unwrap())
            .collect();
        std::fs::write(path, lines.join("\n") + "\n").unwrap();
    }

    #[test]
    fn test_load_recording() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        let points = vec![
            Telemetry {
                speed: 1.,
                ..Telemetry::default()
            },
            Telemetry {
                speed: 2.,
                ..Telemetry::default()
            },
        ];
        write_recording(&path, &points);

        assert_eq!(load_telemetry_jsonl(&path).unwrap(), points);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_telemetry_jsonl(&dir.path().join("missing.jsonl")),
            Err(TangueError::InvalidTelemetryFile { .. })
        ));
    }

    #[test]
    fn test_load_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            load_telemetry_jsonl(&path),
            Err(TangueError::InvalidTelemetryFile { .. })
        ));
    }

    #[test]
    fn test_load_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jsonl");
        std::fs::write(&path, "{\"speed\": 1.0\n").unwrap();
        assert!(matches!(
            load_telemetry_jsonl(&path),
            Err(TangueError::TelemetryLoaderError { .. })
        ));
    }

    #[test]
    fn test_replay_sends_encoded_datagrams() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let points: Vec<Telemetry> = (0..3)
            .map(|i| Telemetry {
                timestamp_ms: i,
                ..Telemetry::default()
            })
            .collect();
        let options = ReplayOptions {
            target: receiver.local_addr().unwrap(),
            rate_hz: 1000,
            repeat: false,
        };

        let sent = replay_telemetry(&points, &options, &AtomicBool::new(true)).unwrap();
        assert_eq!(sent, 3);

        let mut buffer = [0u8; 2048];
        for expected in &points {
            let received = receiver.recv(&mut buffer).unwrap();
            assert_eq!(received, TELEMETRY_PACKET_SIZE);
            assert_eq!(codec::decode(&buffer[..received]).unwrap(), *expected);
        }
    }

    #[test]
    fn test_replay_stops_when_not_running() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let options = ReplayOptions {
            target: receiver.local_addr().unwrap(),
            rate_hz: 1000,
            repeat: true,
        };
        let sent =
            replay_telemetry(&[Telemetry::default()], &options, &AtomicBool::new(false)).unwrap();
        assert_eq!(sent, 0);
    }
}
