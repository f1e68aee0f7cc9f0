use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    TangueError,
    telemetry::{TELEMETRY_PACKET_SIZE, producer::MAX_DATAGRAM_SIZE},
};

const CONFIG_DIR_NAME: &str = "tangue";
const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_FRAME_RATE_HZ: u32 = 60;
pub const DEFAULT_READOUT_INTERVAL_MS: u64 = 250;

/// Settings for the dashboard host. The listening port always comes from the
/// command line.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Frames per second of the host loop, one sampling tick per frame
    pub frame_rate_hz: u32,
    /// Receive buffer size, between one packet and the 2048 byte ceiling
    pub max_datagram_size: usize,
    /// Minimum time between two console readouts
    pub readout_interval_ms: u64,
    /// Drop samples whose timestamp is older than the one on display
    pub reject_stale_timestamps: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: DEFAULT_FRAME_RATE_HZ,
            max_datagram_size: MAX_DATAGRAM_SIZE,
            readout_interval_ms: DEFAULT_READOUT_INTERVAL_MS,
            reject_stale_timestamps: false,
        }
    }
}

impl AppConfig {
    /// Path of the config file in the platform config directory.
    pub fn local_path() -> Result<PathBuf, TangueError> {
        Ok(dirs::config_dir()
            .ok_or(TangueError::NoConfigDir)?
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// Load the config at `path`, writing the defaults there first if there is no file yet.
    pub fn load_or_init(path: &Path) -> Result<Self, TangueError> {
        if path.exists() {
            return Self::from_file(path);
        }
        let config = Self::default();
        match config.save_to(path) {
            Ok(()) => info!("Wrote default config to {:?}", path),
            Err(e) => warn!("Could not write default config to {:?}: {}", path, e),
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, TangueError> {
        let file =
            std::fs::File::open(path).map_err(|e| TangueError::ConfigIOError { source: e })?;
        let config: AppConfig = serde_json::from_reader(file)
            .map_err(|e| TangueError::ConfigSerializeError { source: e })?;
        debug!("Loaded config from {:?}: {:?}", path, config);
        Ok(config.normalized())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), TangueError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TangueError::ConfigIOError { source: e })?;
        }
        let file =
            std::fs::File::create(path).map_err(|e| TangueError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| TangueError::ConfigSerializeError { source: e })
    }

    /// Clamp values into their usable ranges.
    pub fn normalized(mut self) -> Self {
        self.frame_rate_hz = self.frame_rate_hz.max(1);
        self.max_datagram_size = self
            .max_datagram_size
            .clamp(TELEMETRY_PACKET_SIZE, MAX_DATAGRAM_SIZE);
        self
    }

    pub fn frame_budget(&self) -> std::time::Duration {
        std::time::Duration::from_secs(1) / self.frame_rate_hz.max(1)
    }
}
