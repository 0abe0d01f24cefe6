use crate::error::{utils::config_error, RedirectorError};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RedirectorConfig {
    pub listen_host: String,
    pub port: u16,
    pub database_url: String,
    pub mode: ForwardMode,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// How the catch-all path hands a request to the selected target.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ForwardMode {
    /// Fetch the destination and relay its response.
    #[default]
    Proxy,
    /// Answer with `301 Moved Permanently` pointing at the destination.
    Redirect,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

impl Default for RedirectorConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            database_url: "sqlite:redirector.db".to_string(),
            mode: ForwardMode::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "0.0.0.0:9000".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,redirector=debug".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl fmt::Display for ForwardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardMode::Proxy => f.write_str("proxy"),
            ForwardMode::Redirect => f.write_str("redirect"),
        }
    }
}

impl FromStr for ForwardMode {
    type Err = RedirectorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proxy" => Ok(ForwardMode::Proxy),
            "redirect" => Ok(ForwardMode::Redirect),
            other => Err(config_error(format!(
                "unknown forwarding mode '{}' (expected 'proxy' or 'redirect')",
                other
            ))),
        }
    }
}

impl RedirectorConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: RedirectorConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Apply `PORT`, `DATABASE_URL` and `REDIRECTOR_MODE` on top of the
    /// current values. `lookup` is usually `|key| std::env::var(key).ok()`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").filter(|p| !p.is_empty()) {
            self.port = port
                .parse()
                .with_context(|| format!("PORT must be a port number, got '{}'", port))?;
        }

        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.is_empty()) {
            self.database_url = url;
        }

        if let Some(mode) = lookup("REDIRECTOR_MODE").filter(|m| !m.is_empty()) {
            self.mode = mode.parse()?;
        }

        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.listen_host, self.port);
        addr.parse()
            .with_context(|| format!("invalid listen address '{}'", addr))
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(anyhow::anyhow!("database_url cannot be empty"));
        }

        self.listen_addr()?;

        if self.metrics.enabled {
            self.metrics
                .listen_addr
                .parse::<SocketAddr>()
                .with_context(|| {
                    format!("invalid metrics listen address '{}'", self.metrics.listen_addr)
                })?;
        }

        Ok(())
    }
}

pub fn load_config(path: &str) -> Result<RedirectorConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file '{}'", path))?;
    RedirectorConfig::from_yaml_str(&content)
        .with_context(|| format!("failed to parse configuration file '{}'", path))
}
