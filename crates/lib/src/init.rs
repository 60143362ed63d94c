//! Initialize the configuration directory: create ~/.relay, a default config and an
//! empty teams/channels mapping store.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{self, Config};
use crate::store::TeamsChannelsConfig;

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with the default settings if missing.
/// - Writes an empty mapping store (`{"teams": []}`) at the resolved store path if missing.
///
/// Existing files are left untouched. Returns the config directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        let default_config = serde_json::to_string_pretty(&Config::default())
            .context("serializing default config")?;
        std::fs::write(config_path, default_config)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let (config, _) = config::load_config(Some(config_path.to_path_buf()))?;
    let store_path = config::resolve_store_path(&config, config_path);
    if !store_path.exists() {
        if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating store directory {}", parent.display()))?;
        }
        let empty = serde_json::to_string_pretty(&TeamsChannelsConfig::default())
            .context("serializing empty mapping store")?;
        std::fs::write(&store_path, empty)
            .with_context(|| format!("writing mapping store to {}", store_path.display()))?;
        log::info!("created mapping store at {}", store_path.display());
    } else {
        log::debug!("mapping store already exists at {}, skipping", store_path.display());
    }

    Ok(config_dir.to_path_buf())
}
