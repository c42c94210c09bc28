//! Initialize the configuration directory: create ~/.parley and a default config template.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{Config, TelegramChannelConfig};

/// Template written by `parley init`: every Telegram field present so the user only fills in values.
fn default_config_template() -> Result<String> {
    let mut config = Config::default();
    config.channels.telegram = TelegramChannelConfig {
        bot_token: Some(String::new()),
        chat_id: Some(String::new()),
        api_base: None,
        proxy_url: None,
    };
    serde_json::to_string_pretty(&config).context("serializing default config")
}

/// Create the config directory and default config file if they do not exist.
/// An existing config file is left untouched. Returns the config directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, default_config_template()?)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, skipping", config_path.display());
    }

    Ok(config_dir.to_path_buf())
}
