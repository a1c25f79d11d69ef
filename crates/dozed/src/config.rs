//! doze.toml configuration parser.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DozeConfig {
    pub server: ServerConfig,
    pub ovh: OvhConfig,
    pub minecraft: MinecraftConfig,
    pub ssh: SshSection,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the API listens on.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Static bearer token for the non-public routes. Unset leaves the
    /// API open.
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OvhConfig {
    /// Endpoint alias (`ovh-eu`, ...) or a full base URL.
    pub endpoint: String,
    pub application_key: String,
    pub application_secret: String,
    pub consumer_key: String,
    /// Cloud project id.
    pub service_id: String,
    /// Instance to wake and shelve.
    pub instance_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinecraftConfig {
    pub host: String,
    #[serde(default = "default_minecraft_port")]
    pub port: u16,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshSection {
    pub username: String,
    pub private_key: PathBuf,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Defaults to the minecraft host.
    pub host: Option<String>,
    pub stop_proxy_command: Option<String>,
    pub clear_build_data_command: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    #[serde(default = "default_recheck_delay_secs")]
    pub recheck_delay_secs: u64,
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay_secs(),
            recheck_delay_secs: default_recheck_delay_secs(),
            error_backoff_secs: default_error_backoff_secs(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_minecraft_port() -> u16 {
    25565
}

fn default_probe_timeout_ms() -> u64 {
    3000
}

fn default_ssh_port() -> u16 {
    22
}

fn default_initial_delay_secs() -> u64 {
    3600
}

fn default_recheck_delay_secs() -> u64 {
    1800
}

fn default_error_backoff_secs() -> u64 {
    300
}

impl DozeConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DozeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Host the cleanup commands run on.
    pub fn ssh_host(&self) -> &str {
        self.ssh.host.as_deref().unwrap_or(&self.minecraft.host)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.minecraft.probe_timeout_ms)
    }
}
