use std::path::Path;

use acip_protocol::AcipConfig;
use anyhow::{Context, Result};

/// Load configuration from a TOML file at the given path.
/// If the file doesn't exist, returns default configuration.
pub fn load_config(path: &Path) -> Result<AcipConfig> {
    if !path.exists() {
        tracing::warn!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return toml::from_str("").context("failed to build default config");
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: AcipConfig =
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")?;

    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Path::new("/nonexistent/path/acip.toml")).unwrap();
        assert_eq!(config.server.port, acip_protocol::constants::DEFAULT_PORT);
    }

    #[test]
    fn parses_a_real_file() {
        let dir = std::env::temp_dir().join(format!(
            "acip-config-test-{:?}",
            std::thread::current().id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("acip.toml");
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        let _ = std::fs::remove_file(&path);
    }
}
