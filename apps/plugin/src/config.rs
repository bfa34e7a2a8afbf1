//! Plugin configuration management.
//!
//! Configuration is stored as TOML at `$THEMELINK_CONFIG` if set, otherwise
//! `$XDG_CONFIG_HOME/themelink/plugin.toml`, falling back to
//! `~/.config/themelink/plugin.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use themelink_protocol::MIN_SUPPORTED_VERSION;
use themelink_resource_server::ServerConfig;
use themelink_session::SessionConfig;

/// Plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Our application id; authority of every published resource.
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Directory holding the theme metadata files and folders.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,

    /// WebSocket endpoint of the remote theme service.
    #[serde(default = "default_remote_url")]
    pub remote_url: String,

    /// Identity the remote service presents when reading resources.
    #[serde(default = "default_remote_identity")]
    pub remote_identity: String,

    /// Resource server TCP port (0 = auto-assign).
    #[serde(default = "default_resource_port")]
    pub resource_port: u16,

    #[serde(default = "default_bind_timeout_secs")]
    pub bind_timeout_secs: u64,

    #[serde(default = "default_min_protocol_version")]
    pub min_protocol_version: u32,
}

fn default_app_id() -> String {
    "org.themelink.plugin".into()
}

fn default_assets_dir() -> String {
    "~/.local/share/themelink/assets".into()
}

fn default_remote_url() -> String {
    "ws://127.0.0.1:7420".into()
}

fn default_remote_identity() -> String {
    "org.themelink.service".into()
}

fn default_resource_port() -> u16 {
    7421
}

fn default_bind_timeout_secs() -> u64 {
    10
}

fn default_min_protocol_version() -> u32 {
    MIN_SUPPORTED_VERSION
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            assets_dir: default_assets_dir(),
            remote_url: default_remote_url(),
            remote_identity: default_remote_identity(),
            resource_port: default_resource_port(),
            bind_timeout_secs: default_bind_timeout_secs(),
            min_protocol_version: default_min_protocol_version(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// The asset root with a leading `~` expanded.
    pub fn assets_path(&self) -> PathBuf {
        expand_home(&self.assets_dir, std::env::var("HOME").ok().as_deref())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            app_id: self.app_id.clone(),
            remote_identity: self.remote_identity.clone(),
            min_protocol_version: self.min_protocol_version,
            bind_timeout: Duration::from_secs(self.bind_timeout_secs),
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.resource_port,
            ..ServerConfig::default()
        }
    }
}

/// Returns the configuration file path for the current environment.
fn config_path() -> anyhow::Result<PathBuf> {
    resolve_config_path(
        std::env::var("THEMELINK_CONFIG").ok(),
        std::env::var("XDG_CONFIG_HOME").ok(),
        std::env::var("HOME").ok(),
    )
}

fn resolve_config_path(
    explicit: Option<String>,
    xdg_config_home: Option<String>,
    home: Option<String>,
) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit.filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    let base = match (xdg_config_home.filter(|p| !p.is_empty()), home) {
        (Some(xdg), _) => PathBuf::from(xdg),
        (None, Some(home)) => PathBuf::from(home).join(".config"),
        (None, None) => anyhow::bail!("cannot locate config: neither XDG_CONFIG_HOME nor HOME is set"),
    };
    Ok(base.join("themelink").join("plugin.toml"))
}

fn expand_home(path: &str, home: Option<&str>) -> PathBuf {
    let Some(home) = home else {
        return PathBuf::from(path);
    };
    if path == "~" {
        return PathBuf::from(home);
    }
    match path.strip_prefix("~/") {
        Some(rest) => PathBuf::from(home).join(rest),
        None => PathBuf::from(path),
    }
}
