//! CLI configuration.
//!
//! Stored as TOML:
//! - Linux/macOS: `~/.config/shock/cli.toml`
//! - Windows: `%APPDATA%/shock/cli.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shock_client::ClientConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the Shock server.
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default)]
    pub token: Option<String>,

    /// User name the token belongs to.
    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub allow_self_signed_certs: bool,

    /// Most requests in flight at once.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Transfer chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_url() -> String {
    ClientConfig::default().url
}

fn default_max_connections() -> usize {
    ClientConfig::default().max_connections
}

fn default_chunk_size() -> usize {
    ClientConfig::default().chunk_size
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: default_url(),
            token: None,
            user: None,
            allow_self_signed_certs: false,
            max_connections: default_max_connections(),
            chunk_size: default_chunk_size(),
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Loads the configuration at `path` (or the default location), creating
    /// a default file if none exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path(),
        };

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file may hold a token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            url: self.url.clone(),
            token: self.token.clone(),
            user: self.user.clone(),
            allow_self_signed_certs: self.allow_self_signed_certs,
            max_connections: self.max_connections,
            chunk_size: self.chunk_size,
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("shock").join("cli.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("shock")
            .join("cli.toml")
    }
}
