use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default encore data directory: ~/.encore
pub fn get_encore_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".encore"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.encore/config.toml (highest)
    let encore_dir = get_encore_data_dir()?;
    let encore_config = encore_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg: AppConfig = if encore_config.exists() {
        let s = std::fs::read_to_string(&encore_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else if local_config.exists() {
        let s = std::fs::read_to_string(local_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else {
        AppConfig::default()
    };

    // Default the log directory into the data dir when file logging is on.
    if cfg.logging.file
        && cfg
            .logging
            .directory
            .as_deref()
            .map(str::trim)
            .map_or(true, str::is_empty)
    {
        let logs_dir = encore_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        cfg.logging.directory = Some(logs_dir.to_string_lossy().to_string());
    }

    Ok(cfg)
}
