use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use super::{PollResult, Status, TelemetrySample};

/// Last-known-good telemetry cache shared between the sampling loop and renderers.
///
/// Clones share the same underlying sample, so a renderer on another thread can
/// hold its own handle. Every update and snapshot copies the whole sample under
/// one lock, so readers never see a half-written value.
#[derive(Clone, Default)]
pub struct TelemetryStore {
    inner: Arc<Mutex<TelemetrySample>>,
    reject_stale_timestamps: bool,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that refuses samples whose timestamp is older than the stored one.
    pub fn with_stale_rejection(reject_stale_timestamps: bool) -> Self {
        Self {
            reject_stale_timestamps,
            ..Self::default()
        }
    }

    /// Fold one poll result into the store and return the new status.
    ///
    /// Only a received sample replaces the stored telemetry; every other result
    /// just updates the status.
    pub fn update(&self, result: &PollResult) -> Status {
        let mut sample = self.lock();
        match result {
            PollResult::Received(telemetry) => {
                if self.reject_stale_timestamps
                    && sample.has_data()
                    && is_older(telemetry.timestamp_ms, sample.telemetry.timestamp_ms)
                {
                    debug!(
                        "Dropping stale sample at {} ms, holding {} ms",
                        telemetry.timestamp_ms, sample.telemetry.timestamp_ms
                    );
                    sample.status = Status::Stale;
                } else {
                    sample.telemetry = **telemetry;
                    sample.status = Status::Success;
                    sample.sequence += 1;
                }
            }
            other => sample.status = other.status(),
        }
        sample.status
    }

    /// Consistent copy of the current telemetry and status.
    pub fn snapshot(&self) -> TelemetrySample {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, TelemetrySample> {
        // Writes are whole-value assignments, a poisoned sample is still intact.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Wrap-aware "candidate happened before current" for millisecond timestamps.
fn is_older(candidate_ms: u32, current_ms: u32) -> bool {
    (candidate_ms.wrapping_sub(current_ms) as i32) < 0
}
