mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./mediadrop.toml",
        "~/.config/mediadrop/config.toml",
        "/etc/mediadrop/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.intake.extensions.is_empty() {
        anyhow::bail!("At least one intake extension must be configured");
    }

    if config.intake.poll_interval_secs == 0 {
        anyhow::bail!("Intake poll interval cannot be 0");
    }

    if config.transcode.hls_segment_secs == 0 {
        anyhow::bail!("HLS segment duration cannot be 0");
    }

    if !config.intake.dir.exists() {
        tracing::warn!("Intake directory does not exist yet: {:?}", config.intake.dir);
    }

    Ok(())
}
