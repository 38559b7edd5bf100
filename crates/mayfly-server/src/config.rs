//! Process configuration.
//!
//! Read from a TOML file; every field has a default so an empty (or absent)
//! file yields a runnable server: HTTP on :80, TFTP on :69, in-memory
//! repository.

use anyhow::Context;
use mayfly_store::StoreConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    pub http: HttpConfig,
    pub tftp: TftpConfig,
    pub db: StoreConfig,
    /// Directory for static boot files; also the place firmware blobs are
    /// loaded from at startup. Unset disables the static locator.
    pub basedir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct HttpConfig {
    pub address: String,
    /// Whole-request timeout in seconds.
    pub request_timeout: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:80".to_string(),
            request_timeout: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct TftpConfig {
    pub address: String,
    /// Per-block retransmission timeout in seconds, used when the client
    /// does not negotiate its own.
    pub timeout: u64,
}

impl Default for TftpConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:69".to_string(),
            timeout: 5,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or fall back to `./config.toml`, or
    /// to pure defaults when neither exists. An explicitly given path that
    /// cannot be read is an error; the implicit fallback is not.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let content = match path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?,
            None => match std::fs::read_to_string("config.toml") {
                Ok(content) => content,
                Err(_) => return Ok(Config::default()),
            },
        };
        toml::from_str(&content).context("failed to parse config file")
    }
}
