use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const LAST_DOCUMENT_FILE_NAME: &str = "last_document.json";

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    #[serde(rename = "request_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub request_timeout: Duration,
    /// Delay before a page write is sent; writes superseded meanwhile are dropped.
    #[serde(rename = "persist_debounce_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub persist_debounce: Duration,
    pub start_dual_pane: bool,
    pub fit_to_height: bool,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_owned(),
            request_timeout: Duration::from_secs(10),
            persist_debounce: Duration::ZERO,
            start_dual_pane: false,
            fit_to_height: true,
            log_filter: "info".to_owned(),
        }
    }
}

impl Config {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::from_toml_str(&raw).with_context(|| format!("failed to parse config file {:?}", path))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn default_path(dirs: &ProjectDirs) -> PathBuf {
        dirs.config_dir().join(CONFIG_FILE_NAME)
    }
}

pub fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("net", "pagesync", "pagesync")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))
}

pub fn last_document_path(dirs: &ProjectDirs) -> PathBuf {
    dirs.data_local_dir().join(LAST_DOCUMENT_FILE_NAME)
}
