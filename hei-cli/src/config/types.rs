use hei_core::HostConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawHeiConfig {
    #[serde(default)]
    pub plugins: RawPluginsConfig,

    #[serde(default)]
    pub filesystem: RawFilesystemConfig,

    #[serde(default)]
    pub logging: RawLoggingConfig,
}

/// Module directories as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPluginsConfig {
    /// User module directory
    pub user_dir: Option<PathBuf>,

    /// Project module directory, searched first
    pub project_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawFilesystemConfig {
    /// Search roots for relative paths, in lookup order
    pub search_roots: Option<Vec<PathBuf>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawLoggingConfig {
    /// Module log channels to switch off after loading
    pub muted_channels: Option<Vec<String>>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HeiConfig {
    #[serde(default)]
    pub plugins: PluginsConfig,

    #[serde(default)]
    pub filesystem: FilesystemConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    pub user_dir: PathBuf,
    pub project_dir: Option<PathBuf>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            user_dir: hei_paths::plugin_dir(),
            project_dir: Some(PathBuf::from(DEFAULT_PROJECT_PLUGIN_DIR)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemConfig {
    pub search_roots: Vec<PathBuf>,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            search_roots: vec![PathBuf::from("."), hei_paths::data_dir()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    pub muted_channels: Vec<String>,
}

/// Project-level module directory, relative to the working directory
pub const DEFAULT_PROJECT_PLUGIN_DIR: &str = ".hei/plugins";

impl HeiConfig {
    /// Host settings for `hei_core::build_host`.
    pub fn host_config(&self) -> HostConfig {
        HostConfig {
            user_plugin_dir: self.plugins.user_dir.clone(),
            project_plugin_dir: self.plugins.project_dir.clone(),
            search_roots: self.filesystem.search_roots.clone(),
            module_list_path: None,
        }
    }
}
