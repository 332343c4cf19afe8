//! ``src/config.rs``
//! ============================================================================
//! # Config: Application Configuration Loader and Saver
//!
//! User-editable settings for the browser core, stored as TOML at the
//! XDG-compliant config path discovered through the
//! [`directories`](https://docs.rs/directories) crate. Falls back to
//! defaults (and writes them out) when no config file exists.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use tokio::fs as TokioFs;

/// Default bound for `count_items` before a whole-subtree selection.
pub const ITEMS_WARNING: usize = 10_000;

/// Logging destination and verbosity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,

    /// Log file directory; `None` logs to stderr.
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// Main configuration struct for the browser core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Include dotfiles in directory listings.
    pub show_hidden: bool,

    /// Item-count bound used to warn before selecting a large subtree.
    pub items_warning: usize,

    /// Capacity of the visited-path cache (restored cursors and selections).
    pub visited_cache_capacity: usize,

    #[serde(default)]
    pub logging: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            show_hidden: false,
            items_warning: ITEMS_WARNING,
            visited_cache_capacity: 256,
            logging: LogConfig::default(),
        }
    }
}

impl Config {
    /// Loads config from the TOML file at the app config dir, or returns
    /// defaults (writing them out for the next run).
    pub async fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            info!("Loading config from {}", path.display());
            let text = TokioFs::read_to_string(&path).await?;
            let cfg: Self = toml::from_str(&text)?;

            Ok(cfg)
        } else {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            let default_config = Self::default();
            default_config.save().await?;

            Ok(default_config)
        }
    }

    /// Saves config to the TOML file at the app config dir.
    pub async fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        TokioFs::write(&path, toml_str).await?;

        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "arcman", "arcman")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}
