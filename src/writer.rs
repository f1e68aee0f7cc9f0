use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    sync::mpsc::Receiver,
};

use log::{info, warn};
use serde_jsonlines::JsonLinesWriter;

use crate::{TangueError, telemetry::Telemetry};

/// JSON Lines recording file, created up front so a bad path fails before sampling starts.
pub struct TelemetryWriter {
    path: PathBuf,
    writer: JsonLinesWriter<BufWriter<File>>,
}

impl TelemetryWriter {
    pub fn create(file: &Path) -> Result<Self, TangueError> {
        let telemetry_file =
            File::create(file).map_err(|e| TangueError::WriterError { source: e })?;
        info!("Recording telemetry to {:?}", file);
        Ok(Self {
            path: file.to_path_buf(),
            writer: JsonLinesWriter::new(BufWriter::new(telemetry_file)),
        })
    }

    /// Write every sample from `telemetry_receiver` until every sender is
    /// dropped, then flush. A sample that fails to serialize is skipped.
    pub fn write_from(
        mut self,
        telemetry_receiver: Receiver<Telemetry>,
    ) -> Result<usize, TangueError> {
        let mut written = 0;
        for point in &telemetry_receiver {
            match self.writer.write(&point) {
                Ok(()) => written += 1,
                Err(e) => warn!("Error while writing telemetry point to output file: {}", e),
            }
        }
        self.writer
            .flush()
            .map_err(|e| TangueError::WriterError { source: e })?;
        info!("Recorded {} telemetry samples to {:?}", written, self.path);
        Ok(written)
    }
}

/// Write every telemetry sample from `telemetry_receiver` to `file` as JSON Lines.
pub fn write_telemetry(
    file: &Path,
    telemetry_receiver: Receiver<Telemetry>,
) -> Result<usize, TangueError> {
    TelemetryWriter::create(file)?.write_from(telemetry_receiver)
}
