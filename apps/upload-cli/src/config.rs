//! Client configuration management.
//!
//! Configuration is stored as TOML at `$XDG_CONFIG_HOME/roost/upload.toml`
//! (falling back to `~/.config/roost/upload.toml`, or `%APPDATA%` on
//! Windows).

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use roost_protocol::constants::{CHUNK_ENDPOINT, COMPLETE_ENDPOINT};
use roost_upload_client::TransportConfig;
use roost_uploader::UploadConfig;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Backend root URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    #[serde(default = "default_chunk_path")]
    pub chunk_path: String,

    #[serde(default = "default_complete_path")]
    pub complete_path: String,

    /// Where session state is persisted (platform default when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    #[serde(default)]
    pub upload: UploadConfig,
}

fn default_base_url() -> String {
    "http://localhost:8080".into()
}

fn default_chunk_path() -> String {
    CHUNK_ENDPOINT.into()
}

fn default_complete_path() -> String {
    COMPLETE_ENDPOINT.into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_token: None,
            chunk_path: default_chunk_path(),
            complete_path: default_complete_path(),
            state_dir: None,
            upload: UploadConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the default location, creating it with
    /// defaults if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    /// Loads configuration from `path`, creating it with defaults if not found.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            tracing::info!(path = %path.display(), "created default configuration");
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file may hold a bearer token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.base_url.clone(),
            chunk_path: self.chunk_path.clone(),
            complete_path: self.complete_path.clone(),
            auth_token: self.auth_token.clone(),
            headers: Vec::new(),
            request_timeout: self.upload.request_timeout(),
        }
    }

    /// Resolves the session state directory.
    pub fn state_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => roost_transfer::default_state_dir()
                .context("cannot determine a state directory; set state_dir in the config"),
        }
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("roost").join("upload.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
                PathBuf::from(home).join(".config")
            });
        base.join("roost").join("upload.toml")
    }
}
