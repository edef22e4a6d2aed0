use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use common::identity::KeyStore;
use common::peer::{PeerDirectory, RemotePeer};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "peerchat";
pub const CONFIG_DIR_NAME: &str = ".peerchat";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const KEY_FILE_NAME: &str = "identity.key";
pub const DEFAULT_APP_VERSION: &str = "1.0.0";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHomeDirectory,
    #[error("config file not found at {0}; run `peerchat init` first")]
    NotFound(PathBuf),
    #[error("config file already exists at {0}")]
    AlreadyExists(PathBuf),
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where the private key lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateKeyConfig {
    /// may start with `~`
    pub dir: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub app_name: String,
    pub app_version: String,
    #[serde(rename = "protocolID")]
    pub protocol_id: String,
}

/// The configuration document, built once at startup and passed by reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub private_key: PrivateKeyConfig,
    pub app_config: AppConfig,
    #[serde(default)]
    pub listen_addrs: Vec<String>,
    /// Local display name
    pub name: String,
    /// Absent or null means nobody to dial: we wait for peers instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_peers: Option<Vec<RemotePeer>>,
}

impl Config {
    /// `~/.peerchat/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// A config that starts a responder listening on `listen_addrs`
    pub fn starter(name: impl Into<String>, listen_addrs: Vec<String>) -> Self {
        Self {
            private_key: PrivateKeyConfig {
                dir: format!("~/{}", CONFIG_DIR_NAME),
                file_name: KEY_FILE_NAME.to_string(),
            },
            app_config: AppConfig {
                app_name: APP_NAME.to_string(),
                app_version: DEFAULT_APP_VERSION.to_string(),
                protocol_id: APP_NAME.to_string(),
            },
            listen_addrs,
            name: name.into(),
            remote_peers: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()))
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        tracing::debug!(path = %path.display(), "loading config");

        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write a new config file; never overwrites an existing one
    pub fn create(&self, path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        self.validate()?;

        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }
        if self.private_key.dir.trim().is_empty() || self.private_key.file_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "privateKey.dir and privateKey.fileName must not be empty".to_string(),
            ));
        }
        if self.app_config.protocol_id.is_empty() || self.app_config.app_version.is_empty() {
            return Err(ConfigError::Invalid(
                "appConfig.protocolID and appConfig.appVersion must not be empty".to_string(),
            ));
        }
        self.listen_addrs()?;
        Ok(())
    }

    /// Protocol identifier for chat streams: `/<protocolID>/<appVersion>`
    pub fn protocol(&self) -> String {
        format!(
            "/{}/{}",
            self.app_config.protocol_id, self.app_config.app_version
        )
    }

    pub fn listen_addrs(&self) -> Result<Vec<SocketAddr>, ConfigError> {
        self.listen_addrs
            .iter()
            .map(|raw| {
                parse_listen_addr(raw).ok_or_else(|| {
                    ConfigError::Invalid(format!("listen address '{}' is not valid", raw))
                })
            })
            .collect()
    }

    pub fn key_store(&self) -> Result<KeyStore, ConfigError> {
        let dir = expand_home(&self.private_key.dir)?;
        Ok(KeyStore::new(dir, self.private_key.file_name.clone()))
    }

    pub fn directory(&self) -> PeerDirectory {
        PeerDirectory::new(self.remote_peers.clone().unwrap_or_default())
    }
}

/// Accepts `ip:port` as well as the `/ip4/<ip>/udp/<port>` (or `/tcp/`)
///  multiaddr prefix older configs use. Trailing multiaddr segments such as
///  `/quic-v1` are ignored.
fn parse_listen_addr(raw: &str) -> Option<SocketAddr> {
    let raw = raw.trim();
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return Some(addr);
    }

    let mut parts = raw.strip_prefix('/')?.split('/');
    let ip: IpAddr = match (parts.next()?, parts.next()?) {
        ("ip4", ip) | ("ip6", ip) => ip.parse().ok()?,
        _ => return None,
    };
    let port: u16 = match (parts.next()?, parts.next()?) {
        ("udp", port) | ("tcp", port) => port.parse().ok()?,
        _ => return None,
    };
    Some(SocketAddr::new(ip, port))
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &str) -> Result<PathBuf, ConfigError> {
    if path == "~" {
        return dirs::home_dir().ok_or(ConfigError::NoHomeDirectory);
    }
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}
