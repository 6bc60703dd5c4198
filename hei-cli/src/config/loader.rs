use super::types::{
    FilesystemConfig, HeiConfig, LoggingConfig, PluginsConfig, RawFilesystemConfig,
    RawHeiConfig, RawLoggingConfig, RawPluginsConfig,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<HeiConfig> {
        let mut raw = RawHeiConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path()
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        Ok(Self::finalize(raw))
    }

    fn read_raw(path: &Path) -> Result<RawHeiConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "hei").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with HEI_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("HEI_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".hei/config.toml")
        }
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawHeiConfig, overlay: RawHeiConfig) -> RawHeiConfig {
        RawHeiConfig {
            plugins: RawPluginsConfig {
                user_dir: overlay.plugins.user_dir.or(base.plugins.user_dir),
                project_dir: overlay.plugins.project_dir.or(base.plugins.project_dir),
            },
            filesystem: RawFilesystemConfig {
                search_roots: overlay
                    .filesystem
                    .search_roots
                    .or(base.filesystem.search_roots),
            },
            logging: RawLoggingConfig {
                muted_channels: overlay
                    .logging
                    .muted_channels
                    .or(base.logging.muted_channels),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawHeiConfig) -> HeiConfig {
        let plugins = PluginsConfig::default();
        HeiConfig {
            plugins: PluginsConfig {
                user_dir: raw.plugins.user_dir.unwrap_or(plugins.user_dir),
                project_dir: raw.plugins.project_dir.or(plugins.project_dir),
            },
            filesystem: FilesystemConfig {
                search_roots: raw
                    .filesystem
                    .search_roots
                    .unwrap_or_else(|| FilesystemConfig::default().search_roots),
            },
            logging: LoggingConfig {
                muted_channels: raw.logging.muted_channels.unwrap_or_default(),
            },
        }
    }

    /// Load config from a specific path (for testing)
    #[cfg(test)]
    pub fn load_from_path(path: &Path) -> Result<HeiConfig> {
        if path.exists() {
            Ok(Self::finalize(Self::read_raw(path)?))
        } else {
            Ok(HeiConfig::default())
        }
    }
}
