//! Daemon configuration.
//!
//! One TOML file describes the whole deployment: the two directory
//! endpoints, the polling schedule and the conversion-map location. The
//! file path comes from `DELTA_CONFIG` (default `delta.toml`); a `.env`
//! file is honored for the environment itself.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use delta_core::ScheduleConfig;
use delta_ldap::EndpointConfig;

const CONFIG_PATH_VAR: &str = "DELTA_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "delta.toml";

/// Everything the daemon needs to run.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Directory polled for changed entries.
    pub source: EndpointConfig,

    /// Directory reconciled against the source.
    pub destination: EndpointConfig,

    /// Polling cadence and window.
    pub schedule: ScheduleConfig,

    /// Path to the conversion-map file.
    pub rules_file: PathBuf,
}

impl DaemonConfig {
    /// Loads the configuration named by `DELTA_CONFIG`, falling back to
    /// `delta.toml` in the working directory.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_path(Path::new(&path))
    }

    /// Loads and validates the configuration at `path`.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read configuration {}", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("invalid configuration {}", path.display()))
    }

    fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text).context("cannot parse TOML")?;
        config.source.validate().context("source endpoint")?;
        config
            .destination
            .validate()
            .context("destination endpoint")?;
        Ok(config)
    }
}
