//! Module list - which discovered modules the user switched off

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use super::error::PluginHostError;

/// Persistent list of disabled modules.
///
/// Stored as TOML in `~/.config/hei/plugins/modules.toml`. Modules are
/// enabled unless listed here, so dropping a library into a plugin
/// directory is enough to install it.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ModuleList {
    #[serde(default)]
    pub disabled: BTreeSet<String>,
}

impl ModuleList {
    /// Returns an empty list if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, PluginHostError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PluginHostError::ModuleList(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), PluginHostError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PluginHostError::ModuleList(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        !self.disabled.contains(name)
    }

    /// Returns `true` if the module was disabled before.
    pub fn enable(&mut self, name: &str) -> bool {
        self.disabled.remove(name)
    }

    /// Returns `true` if the module was enabled before.
    pub fn disable(&mut self, name: &str) -> bool {
        self.disabled.insert(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_everything_enabled_by_default() {
        let list = ModuleList::default();
        assert!(list.is_enabled("classic_formats"));
    }

    #[test]
    fn test_enable_disable() {
        let mut list = ModuleList::default();

        assert!(list.disable("vtf"));
        assert!(!list.disable("vtf"));
        assert!(!list.is_enabled("vtf"));
        assert!(list.is_enabled("pak"));

        assert!(list.enable("vtf"));
        assert!(list.is_enabled("vtf"));
    }

    #[test]
    fn test_load_missing_file() {
        let list = ModuleList::load(Path::new("/nonexistent/path/modules.toml")).unwrap();
        assert!(list.disabled.is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("modules.toml");

        let mut list = ModuleList::default();
        list.disable("dds");
        list.disable("bf");
        list.save(&path).unwrap();

        let loaded = ModuleList::load(&path).unwrap();
        assert_eq!(loaded.disabled.iter().collect::<Vec<_>>(), ["bf", "dds"]);
    }

    #[test]
    fn test_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("modules.toml");
        std::fs::write(&path, "disabled = 3").unwrap();

        let err = ModuleList::load(&path).unwrap_err();
        assert!(matches!(err, PluginHostError::ModuleList(_)));
    }
}
