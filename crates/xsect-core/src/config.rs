//! Run configuration.
//!
//! Every field has a default matching a stock PLAXIS 2D installation; a JSON
//! config file may override any subset of them.

use crate::domain::{CrossSectionLine, XsectError};
use crate::session::SessionEndpoint;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_PASSWORD: &str = "1234567890";
pub const DEFAULT_STARTUP_DELAY_SECONDS: u64 = 5;
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 30;
pub const OUTPUT_FILE_NAME: &str = "soil_cross_section_results.csv";
pub const MODEL_INCLUDE_PATTERN: &str = "*.p2dx";
pub const MODEL_EXCLUDE_PATTERN: &str = "*data.p2dx";

/// Environment variable naming the application executable.
pub const EXECUTABLE_ENV_VAR: &str = "PLAXIS_XSECT_EXECUTABLE";

/// Known installation paths, newest release first.
pub const DEFAULT_EXECUTABLE_CANDIDATES: [&str; 4] = [
    r"C:\Program Files\Seequent\PLAXIS 2D 2024\Plaxis2DXInput.exe",
    r"C:\Program Files\Seequent\PLAXIS 2D 2023\Plaxis2DXInput.exe",
    r"C:\Program Files (x86)\Seequent\PLAXIS 2D 2024\Plaxis2DXInput.exe",
    r"C:\Program Files (x86)\Seequent\PLAXIS 2D 2023\Plaxis2DXInput.exe",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RunConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub executable_candidates: Vec<PathBuf>,
    pub cross_section: CrossSectionLine,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub output_file_name: String,
    pub startup_delay_seconds: u64,
    /// How long a launched application may take to answer the handshake.
    pub connect_timeout_seconds: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            password: DEFAULT_PASSWORD.to_string(),
            executable_candidates: DEFAULT_EXECUTABLE_CANDIDATES
                .iter()
                .map(PathBuf::from)
                .collect(),
            cross_section: CrossSectionLine::default(),
            include_patterns: vec![MODEL_INCLUDE_PATTERN.to_string()],
            exclude_patterns: vec![MODEL_EXCLUDE_PATTERN.to_string()],
            output_file_name: OUTPUT_FILE_NAME.to_string(),
            startup_delay_seconds: DEFAULT_STARTUP_DELAY_SECONDS,
            connect_timeout_seconds: DEFAULT_CONNECT_TIMEOUT_SECONDS,
        }
    }
}

impl RunConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == u16::MAX {
            return Err(ConfigError::Invalid(format!(
                "port {} leaves no room for the output server on the next port",
                self.port
            )));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        let file_name = Path::new(&self.output_file_name);
        if self.output_file_name.trim().is_empty()
            || file_name.file_name() != Some(file_name.as_os_str())
        {
            return Err(ConfigError::Invalid(format!(
                "output file name '{}' must be a bare file name",
                self.output_file_name
            )));
        }
        if self.include_patterns.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one include pattern is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn controller_endpoint(&self) -> SessionEndpoint {
        SessionEndpoint::new(self.host.clone(), self.port, self.password.clone())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn output_path(&self, root: &Path) -> PathBuf {
        root.join(&self.output_file_name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for XsectError {
    fn from(error: ConfigError) -> Self {
        let message = error.to_string();
        match error {
            ConfigError::Read { .. } => XsectError::io_system("IO.CONFIG", message),
            ConfigError::Parse { .. } | ConfigError::Invalid(_) => {
                XsectError::input_validation("INPUT.CONFIG", message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, DEFAULT_PORT, OUTPUT_FILE_NAME, RunConfig};
    use crate::domain::Point2;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_stock_installation() {
        let config = RunConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.password, "1234567890");
        assert_eq!(config.executable_candidates.len(), 4);
        assert_eq!(config.output_file_name, OUTPUT_FILE_NAME);
        assert_eq!(
            config.output_path(Path::new("/data/models")),
            Path::new("/data/models").join("soil_cross_section_results.csv")
        );
        config.validate().expect("defaults should validate");
    }

    #[test]
    fn partial_config_file_overrides_only_given_fields() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("xsect.json");
        fs::write(
            &path,
            r#"
            {
              "port": 20000,
              "connectTimeoutSeconds": 90,
              "executableCandidates": ["/opt/plaxis/Plaxis2DXInput"],
              "crossSection": { "start": [5.0, 1.0], "end": [5.0, -12.0] }
            }
            "#,
        )
        .expect("config should be written");

        let config = RunConfig::from_path(&path).expect("config should load");
        assert_eq!(config.port, 20000);
        assert_eq!(config.controller_endpoint().port, 20000);
        assert_eq!(config.password, "1234567890");
        assert_eq!(config.connect_timeout_seconds, 90);
        assert_eq!(config.startup_delay_seconds, 5);
        assert_eq!(config.cross_section.start, Point2::new(5.0, 1.0));
        assert_eq!(config.cross_section.end, Point2::new(5.0, -12.0));
        assert_eq!(
            config.executable_candidates,
            vec![Path::new("/opt/plaxis/Plaxis2DXInput").to_path_buf()]
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("xsect.json");
        fs::write(&path, r#"{ "prot": 1 }"#).expect("config should be written");

        let error = RunConfig::from_path(&path).expect_err("typo should be rejected");
        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn output_file_name_must_not_contain_directories() {
        let config = RunConfig {
            output_file_name: "nested/out.csv".to_string(),
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = RunConfig {
            port: u16::MAX,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
