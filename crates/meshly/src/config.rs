//! CLI-owned configuration: a small TOML file merged with environment
//! variables and flag overrides, translated to `meshly_core::HubConfig`.
//!
//! Core never sees these types -- it receives a pre-built `HubConfig`.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use meshly_core::HubConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── TOML config struct ───────────────────────────────────────────────

/// CLI-owned TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Hub base URL (e.g. "http://avion-hub.local").
    pub hub: Option<String>,

    /// Default output format ("table", "json", "json-compact", "plain").
    #[serde(default = "default_output")]
    pub output: String,

    /// Default color mode ("auto", "always", "never").
    #[serde(default = "default_color")]
    pub color: String,

    /// Command timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds to wait for the initial state replay.
    #[serde(default = "default_sync_timeout")]
    pub sync_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hub: None,
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            sync_timeout: default_sync_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_sync_timeout() -> u64 {
    15
}

// ── Config file path ─────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "meshly", "meshly")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from(".meshly/config.toml"))
}

// ── Loading ──────────────────────────────────────────────────────────

/// Load the effective configuration: built-in defaults, then the TOML
/// file, then `MESHLY_*` environment variables.
pub fn load_config() -> Result<Config, CliError> {
    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(config_path()))
        .merge(Env::prefixed("MESHLY_"));
    Ok(figment.extract()?)
}

/// Build a `HubConfig` from the config file and CLI flag overrides.
pub fn build_hub_config(global: &GlobalOpts) -> Result<HubConfig, CliError> {
    let cfg = load_config()?;

    let url_str = global
        .hub
        .clone()
        .or(cfg.hub)
        .ok_or_else(|| CliError::NoHub { path: config_path().display().to_string() })?;

    let url: url::Url = url_str.parse().map_err(|_| CliError::Validation {
        field: "hub".into(),
        reason: format!("invalid URL: {url_str}"),
    })?;

    Ok(HubConfig::new(url).with_timeout(Duration::from_secs(global.timeout)))
}
