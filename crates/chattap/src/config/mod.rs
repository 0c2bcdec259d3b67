use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ChatTapError, Result};

/// Main configuration structure for chattap
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// HTTP proxy configuration
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Interaction log location
    #[serde(default)]
    pub storage: StorageConfig,
    /// Log filter configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP proxy server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Address to listen on (e.g., "0.0.0.0:8082")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Base URL of the upstream chat-completion API
    #[serde(default = "default_target_server")]
    pub target_server: String,
    /// Verify upstream TLS certificates (private hosts are always relaxed)
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    /// Upstream timeout in seconds, covering connect and the full response
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            target_server: default_target_server(),
            verify_ssl: default_verify_ssl(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8082".to_string()
}

fn default_target_server() -> String {
    "http://localhost:8080".to_string()
}

fn default_verify_ssl() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    600
}

/// Interaction log configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding the interaction log
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// File name of the interaction log inside `data_dir`
    #[serde(default = "default_prompts_file")]
    pub prompts_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            prompts_file: default_prompts_file(),
        }
    }
}

impl StorageConfig {
    /// Full path of the interaction log
    pub fn prompts_path(&self) -> PathBuf {
        self.data_dir.join(&self.prompts_file)
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_prompts_file() -> String {
    "ai_prompts.json".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default)]
    pub filter: Option<String>,
}

impl Config {
    /// Load configuration from an explicit path, the default locations, or defaults,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                tracing::info!("Loading config from: {}", path.display());
                Self::load_from(path)?
            }
            None => {
                let default_paths = [
                    dirs::home_dir().map(|h| h.join(".chattap").join("config.toml")),
                    dirs::config_dir().map(|c| c.join("chattap").join("config.toml")),
                    Some(PathBuf::from("chattap.toml")),
                ];

                match default_paths.iter().flatten().find(|p| p.exists()) {
                    Some(found) => {
                        tracing::info!("Loading config from: {}", found.display());
                        Self::load_from(found)?
                    }
                    None => {
                        tracing::info!("No config file found, using defaults");
                        Config::default()
                    }
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChatTapError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content)
            .map_err(|e| ChatTapError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply environment-style overrides using `lookup` to resolve variables.
    ///
    /// Recognised keys: `TARGET_SERVER`, `VERIFY_SSL`, `DATA_DIR`, `PROMPTS_FILE`,
    /// `CHATTAP_LISTEN_ADDR` and `PORT` (applied last, replacing only the port).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(target) = lookup("TARGET_SERVER") {
            self.proxy.target_server = target.trim_end_matches('/').to_string();
        }
        if let Some(verify) = lookup("VERIFY_SSL") {
            self.proxy.verify_ssl = verify.to_lowercase() == "true";
        }
        if let Some(dir) = lookup("DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup("PROMPTS_FILE") {
            self.storage.prompts_file = file;
        }
        if let Some(addr) = lookup("CHATTAP_LISTEN_ADDR") {
            self.proxy.listen_addr = addr;
        }
        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|e| ChatTapError::Config(format!("Invalid PORT '{port}': {e}")))?;
            let host = self
                .proxy
                .listen_addr
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.proxy.listen_addr = format!("{host}:{port}");
        }
        Ok(())
    }
}
