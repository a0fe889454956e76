use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_yml;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/* Searched in this order by RavenConfig::load */
pub const CONFIG_PATHS: [&str; 2] = ["config/raven.yaml", "raven.yaml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No config found, tried {0:?}")]
    NotFound(Vec<PathBuf>),
    #[error("Unable to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unable to parse config: {0}")]
    Yaml(#[from] serde_yml::Error),
}

fn serial_baud_rate_default() -> u32 { return 115200 }
fn serial_timeout_secs_default() -> u64 { return 5 }

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SerialConfig {
    pub port: String,
    #[serde(default="serial_baud_rate_default")]
    pub baud_rate: u32,
    #[serde(default="serial_timeout_secs_default")]
    pub timeout_secs: u64,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        SerialConfig {
            port: port.into(),
            baud_rate: serial_baud_rate_default(),
            timeout_secs: serial_timeout_secs_default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn history_size_default() -> usize { return 10000 }

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RavenConfig {
    pub serial: SerialConfig,
    #[serde(default="history_size_default")]
    pub history_size: usize,
    /* Used for commands that take a MeterMacId when none is given */
    #[serde(default)]
    pub meter_mac_id: Option<String>,
}

impl RavenConfig {
    pub fn new(serial: SerialConfig) -> Self {
        RavenConfig {
            serial,
            history_size: history_size_default(),
            meter_mac_id: None,
        }
    }

    /// Loads the first existing file of [`CONFIG_PATHS`]
    pub fn load() -> Result<Self, ConfigError> {
        for path in CONFIG_PATHS {
            if Path::new(path).is_file() {
                return RavenConfig::load_from(path);
            }
            debug!("No config at {}", path);
        }
        Err(ConfigError::NotFound(CONFIG_PATHS.iter().map(PathBuf::from).collect()))
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound(vec![path.to_path_buf()]),
            _ => ConfigError::Io { path: path.to_path_buf(), source },
        })?;

        let config = RavenConfig::from_yaml_str(&contents)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(contents)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yml::to_string(self)?)
    }
}
