//! Client configuration stored as RON.
//!
//! Lookup order: an explicit `--config` path (must exist), then `./docflow.ron`
//! if present, then built-in defaults. Command-line flags override file values.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use docflow_engine::{batch_filename, ApiSettings, EngineConfig, PollSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::logging::LogDestination;

pub const DEFAULT_CONFIG_FILE: &str = "./docflow.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocflowConfig {
    pub server_url: String,
    pub output_dir: PathBuf,
    pub poll_interval_ms: u64,
    pub detail_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub upload_timeout_ms: u64,
    pub max_download_bytes: u64,
    pub log_destination: LogDestination,
}

impl Default for DocflowConfig {
    fn default() -> Self {
        let api = ApiSettings::default();
        let poll = PollSettings::default();
        Self {
            server_url: api.base_url,
            output_dir: PathBuf::from("./downloads"),
            poll_interval_ms: poll.progress_interval.as_millis() as u64,
            detail_interval_ms: poll.detail_interval.as_millis() as u64,
            connect_timeout_ms: api.connect_timeout.as_millis() as u64,
            request_timeout_ms: api.request_timeout.as_millis() as u64,
            upload_timeout_ms: api.upload_timeout.as_millis() as u64,
            max_download_bytes: api.max_download_bytes,
            log_destination: LogDestination::default(),
        }
    }
}

/// Values given on the command line; `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub output_dir: Option<PathBuf>,
}

impl DocflowConfig {
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::read(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::read(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(server_url) = overrides.server_url {
            self.server_url = server_url;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.output_dir = output_dir;
        }
        self
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default_with_output(self.output_dir.clone());
        config.api = ApiSettings {
            base_url: self.server_url.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            upload_timeout: Duration::from_millis(self.upload_timeout_ms),
            max_download_bytes: self.max_download_bytes,
        };
        config.poll = PollSettings {
            progress_interval: Duration::from_millis(self.poll_interval_ms),
            detail_interval: Duration::from_millis(self.detail_interval_ms),
        };
        config.batch_name = Arc::new(|| batch_filename(chrono::Utc::now().timestamp_millis()));
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let config = DocflowConfig::parse(r#"(server_url: "http://gpu-box:9000")"#)
            .expect("parse config");

        assert_eq!(config.server_url, "http://gpu-box:9000");
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.detail_interval_ms, 3000);
        assert_eq!(config.upload_timeout_ms, 600_000);
        assert_eq!(config.output_dir, PathBuf::from("./downloads"));
    }

    #[test]
    fn pretty_output_parses_back() {
        let config = DocflowConfig {
            log_destination: LogDestination::Both,
            ..DocflowConfig::default()
        };
        let text = config.to_ron().expect("serialize");

        assert!(text.contains("log_destination: both"));
        assert_eq!(DocflowConfig::parse(&text).expect("parse"), config);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("absent.ron");

        let err = DocflowConfig::load(Some(&missing)).expect_err("missing file");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_file_reports_its_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("docflow.ron");
        fs::write(&path, "(server_url: 42)").expect("write config");

        let err = DocflowConfig::load(Some(&path)).expect_err("bad file");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("docflow.ron"));
    }

    #[test]
    fn command_line_values_win_and_reach_the_engine() {
        let config = DocflowConfig::default().with_overrides(ConfigOverrides {
            server_url: Some("https://convert.example".to_string()),
            output_dir: Some(PathBuf::from("/tmp/out")),
        });
        let engine = config.engine_config();

        assert_eq!(engine.api.base_url, "https://convert.example");
        assert_eq!(engine.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(engine.poll.progress_interval, Duration::from_secs(1));
        let name = (engine.batch_name)();
        assert!(name.starts_with("batch_download_") && name.ends_with(".zip"));
    }
}
