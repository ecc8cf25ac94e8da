use std::{path::Path, path::PathBuf, time::Duration};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::ConfigError;

pub const DEFAULT_TARGET_URL: &str = "http://localhost:3000";
pub const DEFAULT_CONCURRENT_USERS: usize = 100;
pub const DEFAULT_TEST_DURATION_SECONDS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RAMP_UP_STEPS: usize = 10;
pub const DEFAULT_TRACKING_INTERVAL_SECONDS: u64 = 5;
pub const DEFAULT_RESULTS_FILE: &str = "load-test-results.json";
pub const DEFAULT_REPORT_FILE: &str = "load-test-report.html";

/// Everything a run needs to know, with the defaults documented on each field.
///
/// Field names serialize in camelCase, so a JSON config file uses the same
/// option names as the results file (`targetUrl`, `concurrentUsers`, ...).
///
/// ```
/// use shuttle_load::config::LoadTestConfig;
///
/// let config = LoadTestConfig::builder()
///     .target_url("http://localhost:8080/health")
///     .concurrent_users(50)
///     .use_ramp_up(true)
///     .ramp_up_steps(5)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadTestConfig {
    /// URL every request is issued against. Default `http://localhost:3000`.
    #[builder(default = DEFAULT_TARGET_URL.to_string(), setter(into))]
    pub target_url: String,
    /// Number of virtual users. Default 100.
    #[builder(default = DEFAULT_CONCURRENT_USERS)]
    pub concurrent_users: usize,
    /// How long each virtual user runs, measured from its own launch. Default 30.
    #[builder(default = DEFAULT_TEST_DURATION_SECONDS)]
    pub test_duration_seconds: u64,
    /// Per-request abort threshold in milliseconds. Default 10 000.
    #[builder(default = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout: u64,
    /// Launch users in staged batches instead of all at once. Default off.
    #[builder(default = false)]
    pub use_ramp_up: bool,
    /// Number of ramp-up batches. Default 10.
    #[builder(default = DEFAULT_RAMP_UP_STEPS)]
    pub ramp_up_steps: usize,
    /// Width of a throughput time bucket. Default 5.
    #[builder(default = DEFAULT_TRACKING_INTERVAL_SECONDS)]
    pub tracking_interval_seconds: u64,
    #[builder(default = PathBuf::from(DEFAULT_RESULTS_FILE), setter(into))]
    pub results_file: PathBuf,
    #[builder(default = PathBuf::from(DEFAULT_REPORT_FILE), setter(into))]
    pub report_file: PathBuf,
    /// Open the HTML report in the platform viewer when the run ends. Default off.
    #[builder(default = false)]
    pub open_browser_after_test: bool,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Staged launch plan derived from the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampUp {
    pub steps: usize,
}

impl LoadTestConfig {
    /// Load a JSON config file. Missing fields fall back to their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.target_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.target_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: self.target_url.clone(),
                reason: format!("unsupported scheme `{}`", url.scheme()),
            });
        }

        let zero_checks = [
            ("concurrentUsers", self.concurrent_users as u64),
            ("testDurationSeconds", self.test_duration_seconds),
            ("requestTimeout", self.request_timeout),
            ("rampUpSteps", self.ramp_up_steps as u64),
            ("trackingIntervalSeconds", self.tracking_interval_seconds),
        ];
        for (field, value) in zero_checks {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        Ok(())
    }

    pub fn test_duration(&self) -> Duration {
        Duration::from_secs(self.test_duration_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }

    pub fn tracking_interval(&self) -> Duration {
        Duration::from_secs(self.tracking_interval_seconds)
    }

    pub fn ramp_up(&self) -> Option<RampUp> {
        self.use_ramp_up.then_some(RampUp {
            steps: self.ramp_up_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = LoadTestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.ramp_up(), None);
    }

    #[test]
    fn ramp_up_only_when_enabled() {
        let config = LoadTestConfig::builder()
            .use_ramp_up(true)
            .ramp_up_steps(4)
            .build();
        assert_eq!(config.ramp_up(), Some(RampUp { steps: 4 }));
    }

    #[test]
    fn rejects_zero_users() {
        let config = LoadTestConfig::builder().concurrent_users(0).build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "concurrentUsers"
            })
        ));
    }

    #[test]
    fn rejects_zero_ramp_steps_even_when_disabled() {
        let config = LoadTestConfig::builder().ramp_up_steps(0).build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "rampUpSteps"
            })
        ));
    }

    #[test]
    fn rejects_bad_urls() {
        for url in ["not a url", "ftp://example.com"] {
            let config = LoadTestConfig::builder().target_url(url).build();
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidUrl { .. })
            ));
        }
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: LoadTestConfig =
            serde_json::from_str(r#"{"targetUrl":"https://example.com","concurrentUsers":7}"#)
                .unwrap();
        assert_eq!(config.target_url, "https://example.com");
        assert_eq!(config.concurrent_users, 7);
        assert_eq!(config.test_duration_seconds, DEFAULT_TEST_DURATION_SECONDS);
        assert_eq!(config.results_file, PathBuf::from(DEFAULT_RESULTS_FILE));
    }

    #[test]
    fn from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            LoadTestConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            LoadTestConfig::from_file(dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}
