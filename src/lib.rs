// Library interface for tangue
// This allows integration tests and benches to access internal modules

pub mod config;
pub mod dashboard;
pub mod errors;
pub mod replay;
pub mod telemetry;
pub mod writer;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::TangueError;
pub use telemetry::{
    PollResult, SamplingLoop, Status, Telemetry, TelemetryProducer, TelemetrySample,
    TelemetrySource, TelemetryStore,
};
