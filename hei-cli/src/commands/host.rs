//! Host startup shared by the commands that need loaded modules

use hei_core::plugins::LoadReport;
use hei_core::{Dispatcher, PluginRegistry};

use crate::config::HeiConfig;

/// A host with every enabled module loaded.
///
/// Field order matters: the dispatcher and anything it handed out must go
/// before the registry unloads the modules behind them.
pub struct LoadedHost {
    pub dispatcher: Dispatcher,
    pub report: LoadReport,
    pub registry: PluginRegistry,
}

/// Build the host from `config` and load all enabled modules.
///
/// Module failures are reported through `tracing`; they never fail the command.
pub fn start(config: &HeiConfig) -> anyhow::Result<LoadedHost> {
    let (mut registry, dispatcher) = hei_core::build_host(&config.host_config());
    let report = registry.load_all()?;

    if !report.failed.is_empty() {
        tracing::warn!(
            failed = report.failed.len(),
            loaded = report.loaded.len(),
            "Some modules failed to load"
        );
    }

    let services = registry.services();
    for channel in &config.logging.muted_channels {
        if services.set_log_level_enabled(channel, false) == 0 {
            tracing::debug!(channel = %channel, "Muted channel not registered by any module");
        }
    }

    Ok(LoadedHost {
        dispatcher,
        report,
        registry,
    })
}

/// Build the host without loading anything.
pub fn idle(config: &HeiConfig) -> PluginRegistry {
    hei_core::build_host(&config.host_config()).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeiConfig;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> HeiConfig {
        let mut config = HeiConfig::default();
        config.plugins.user_dir = dir.path().join("plugins");
        config.plugins.project_dir = None;
        config.filesystem.search_roots = vec![dir.path().to_path_buf()];
        config
    }

    #[test]
    fn test_start_with_no_modules() {
        let dir = TempDir::new().unwrap();
        let host = start(&config(&dir)).unwrap();
        assert!(host.registry.is_empty());
        assert!(host.report.failed.is_empty());
        assert!(host.dispatcher.graphics_backends().is_empty());
    }

    #[test]
    fn test_start_reports_broken_module_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("plugins/broken")).unwrap();
        let host = start(&config(&dir)).unwrap();
        assert_eq!(host.report.failed.len(), 1);
    }
}
