use chrono_tz::Tz;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::panels::{default_panel_catalog, PanelConfig};

const DEFAULT_CONFIG_PATH: &str = "crop-monitor.json";
const DEFAULT_TIMEZONE: &str = "America/Bogota";

pub const ENV_URL: &str = "INFLUX_URL";
pub const ENV_TOKEN: &str = "INFLUX_TOKEN";
pub const ENV_ORG: &str = "INFLUX_ORG";
pub const ENV_BUCKET: &str = "INFLUX_BUCKET";
pub const ENV_TIMEZONE: &str = "CROP_MONITOR_TIMEZONE";
pub const ENV_CONFIG_PATH: &str = "CROP_MONITOR_CONFIG_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required store settings: {}", .keys.join(", "))]
    Missing { keys: Vec<&'static str> },
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Connection settings for the time-series store. All four are required.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let keys: Vec<&'static str> = [
            (ENV_URL, &self.url),
            (ENV_TOKEN, &self.token),
            (ENV_ORG, &self.org),
            (ENV_BUCKET, &self.bucket),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
        .collect();
        if !keys.is_empty() {
            return Err(ConfigError::Missing { keys });
        }

        let url = Url::parse(self.url.trim()).map_err(|err| ConfigError::Invalid {
            key: ENV_URL,
            reason: err.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::Invalid {
                key: ENV_URL,
                reason: format!("expected an absolute http(s) URL, got {}", self.url),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub timezone: Tz,
    pub panels: Vec<PanelConfig>,
}

/// Optional JSON setup file. Values fill whatever the environment left unset.
#[derive(Debug, Clone, Default, Deserialize)]
struct SetupFile {
    #[serde(default)]
    influx_url: Option<String>,
    #[serde(default)]
    influx_token: Option<String>,
    #[serde(default)]
    influx_org: Option<String>,
    #[serde(default)]
    influx_bucket: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    panels: Option<Vec<PanelConfig>>,
}

impl Config {
    /// Loads `.env`, the process environment and the setup file, then validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let setup = load_setup_file(path)?;
        Self::resolve(&env_optional, setup)
    }

    fn resolve(
        lookup: &dyn Fn(&str) -> Option<String>,
        setup: Option<SetupFile>,
    ) -> Result<Self, ConfigError> {
        let setup = setup.unwrap_or_default();
        let pick = |key: &str, fallback: Option<&String>| -> String {
            lookup(key)
                .or_else(|| {
                    fallback
                        .map(|value| value.trim().to_string())
                        .filter(|value| !value.is_empty())
                })
                .unwrap_or_default()
        };

        let store = StoreConfig {
            url: pick(ENV_URL, setup.influx_url.as_ref())
                .trim_end_matches('/')
                .to_string(),
            token: pick(ENV_TOKEN, setup.influx_token.as_ref()),
            org: pick(ENV_ORG, setup.influx_org.as_ref()),
            bucket: pick(ENV_BUCKET, setup.influx_bucket.as_ref()),
        };
        store.validate()?;

        let timezone_name = lookup(ENV_TIMEZONE)
            .or(setup.timezone.clone())
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = timezone_name
            .trim()
            .parse::<Tz>()
            .map_err(|err| ConfigError::Invalid {
                key: ENV_TIMEZONE,
                reason: err.to_string(),
            })?;

        let panels = setup.panels.unwrap_or_else(default_panel_catalog);

        Ok(Self {
            store,
            timezone,
            panels,
        })
    }
}

fn setup_file_path(explicit: Option<&Path>) -> (PathBuf, bool) {
    if let Some(path) = explicit {
        return (path.to_path_buf(), true);
    }
    if let Some(path) = env_optional(ENV_CONFIG_PATH) {
        return (PathBuf::from(path), true);
    }
    (PathBuf::from(DEFAULT_CONFIG_PATH), false)
}

fn load_setup_file(explicit: Option<&Path>) -> Result<Option<SetupFile>, ConfigError> {
    let (path, required) = setup_file_path(explicit);
    if !required && !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let setup = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loaded setup config");
    Ok(Some(setup))
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
