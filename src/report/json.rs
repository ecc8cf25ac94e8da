use std::path::{Path, PathBuf};

use super::Reporter;
use crate::{aggregate::Metrics, error::ReportError};

/// Writes the full [`Metrics`] record, verbatim, as pretty JSON.
pub struct JsonFileReporter {
    pub path: PathBuf,
}

impl JsonFileReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Reporter for JsonFileReporter {
    async fn report(&self, metrics: &Metrics) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(metrics)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|source| ReportError::Io {
                path: self.path.clone(),
                source,
            })?;
        tracing::info!("Results written to {}", self.path.display());
        Ok(())
    }
}

/// Read a results file back into a [`Metrics`] record.
pub async fn load_results(path: &Path) -> Result<Metrics, ReportError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(serde_json::from_str(&raw)?)
}
