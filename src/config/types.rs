use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default = "default_video_dir")]
    pub video_dir: PathBuf,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_interface_dir")]
    pub interface_dir: PathBuf,

    #[serde(default)]
    pub watch: WatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            video_dir: default_video_dir(),
            cache_dir: default_cache_dir(),
            interface_dir: default_interface_dir(),
            watch: WatchConfig::default(),
        }
    }
}

fn default_video_dir() -> PathBuf {
    PathBuf::from("./videos")
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}
fn default_interface_dir() -> PathBuf {
    PathBuf::from("./interface")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    #[serde(default = "default_watch_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub paths: Vec<PathBuf>,

    #[serde(default = "default_settle_time")]
    pub settle_time_secs: u64,

    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_watch_enabled() -> bool {
    true
}
fn default_settle_time() -> u64 {
    30
}
fn default_extensions() -> Vec<String> {
    vec!["mp4", "mkv", "mov", "m4v", "avi", "ts"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: default_watch_enabled(),
            paths: Vec::new(),
            settle_time_secs: default_settle_time(),
            extensions: default_extensions(),
        }
    }
}
