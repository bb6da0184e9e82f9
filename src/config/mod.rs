mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from `--config`, then a fixed search path, falling back to defaults.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./dashforge.toml",
        "~/.config/dashforge/config.toml",
        "/etc/dashforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    let config = Config::default();
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration. Only the port is fatal; everything else is a warning.
fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("server.port cannot be 0");
    }

    if !config.video_dir.exists() {
        tracing::warn!(path = ?config.video_dir, "video_dir does not exist");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_rejects_port_zero() {
        let toml = "[server]\nport = 0\n";
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashforge.toml");
        std::fs::write(&path, toml).unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn default_config_has_sane_paths_and_port() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.video_dir, std::path::PathBuf::from("./videos"));
        assert!(config.watch.enabled);
    }

    #[test]
    fn load_config_or_default_falls_back_when_no_file_found() {
        let config = load_config_or_default(None).unwrap();
        assert_eq!(config.server.port, 8080);
    }
}
