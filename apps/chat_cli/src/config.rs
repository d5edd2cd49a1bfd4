use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use client_core::BackendConfig;
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "chat_client.toml";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_READ_TIMEOUT_SECS: u64 = 10;
const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: Url,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl Settings {
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig::new(self.api_url.clone()).with_timeouts(
            Duration::from_secs(self.read_timeout_secs),
            Duration::from_secs(self.write_timeout_secs),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    read_timeout_secs: Option<u64>,
    write_timeout_secs: Option<u64>,
}

/// Defaults, then the config file (if readable), then the process environment.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    let raw = match fs::read_to_string(path) {
        Ok(raw) => Some(raw),
        Err(err) if config_path.is_some() => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
        Err(_) => None,
    };
    load_settings_from(raw.as_deref(), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings {
        api_url: parse_api_url(DEFAULT_API_URL)?,
        read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
        write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
    };

    if let Some(raw) = file {
        match toml::from_str::<FileSettings>(raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.api_url {
                    settings.api_url = parse_api_url(&v)?;
                }
                if let Some(v) = file_cfg.read_timeout_secs {
                    settings.read_timeout_secs = v;
                }
                if let Some(v) = file_cfg.write_timeout_secs {
                    settings.write_timeout_secs = v;
                }
            }
            Err(err) => warn!(error = %err, "config: ignoring malformed config file"),
        }
    }

    if let Some(v) = env("API_URL") {
        settings.api_url = parse_api_url(&v)?;
    }
    if let Some(v) = env("APP__API_URL") {
        settings.api_url = parse_api_url(&v)?;
    }

    if let Some(v) = env("APP__READ_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.read_timeout_secs = parsed;
        }
    }
    if let Some(v) = env("APP__WRITE_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.write_timeout_secs = parsed;
        }
    }

    Ok(settings)
}

pub fn parse_api_url(raw: &str) -> anyhow::Result<Url> {
    let raw = raw.trim();
    let url = Url::parse(raw).with_context(|| format!("invalid api url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("invalid api url '{raw}': scheme must be http or https");
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
