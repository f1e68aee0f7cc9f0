// Error types for tangue

use snafu::Snafu;
use std::io;

#[derive(Debug, Snafu)]
pub enum TangueError {
    // Errors while opening the telemetry socket
    #[snafu(display("Unable to create UDP socket: {source}"))]
    SocketCreateFailed { source: io::Error },
    #[snafu(display("Unable to configure UDP socket: {source}"))]
    SocketOptionFailed { source: io::Error },
    #[snafu(display("Unable to bind UDP socket to port {port}: {source}"))]
    BindFailed { port: u16, source: io::Error },

    // Errors while receiving telemetry
    #[snafu(display("Telemetry receive failed, sampling stopped: {source}"))]
    TransportError { source: io::Error },

    // Errors for the telemetry writer
    #[snafu(display("Error writing telemetry file: {source}"))]
    WriterError { source: io::Error },

    // Config management errors
    #[snafu(display("Could not find application config directory"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file: {source}"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error parsing config file: {source}"))]
    ConfigSerializeError { source: serde_json::Error },

    // Replay errors
    #[snafu(display("Invalid telemetry file: {path}"))]
    InvalidTelemetryFile { path: String },
    #[snafu(display("Error loading telemetry file: {source}"))]
    TelemetryLoaderError { source: io::Error },
    #[snafu(display("Error sending replayed telemetry: {source}"))]
    ReplaySendError { source: io::Error },
}
