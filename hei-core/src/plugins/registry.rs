//! PluginRegistry - module lifecycle: load, version check, init, unload

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hei_plugin_api::InterfaceVersion;
use serde::Serialize;

use super::capabilities::{CapabilityInfo, CapabilityKey, ModuleId, ModuleOwner};
use super::error::PluginHostError;
use super::module::{DynamicImage, ModuleImage, ModuleInfo, StaticImage, StaticModule, query_info};
use super::modules::ModuleList;
use crate::fs::FileSystem;
use crate::services::HostServices;

/// Configuration for [`PluginRegistry`] and the [`HostServices`] it drives.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// User module directory (~/.config/hei/plugins)
    pub user_plugin_dir: PathBuf,
    /// Project-level module directory (.hei/plugins)
    pub project_plugin_dir: Option<PathBuf>,
    /// Filesystem search roots handed to modules, in lookup order
    pub search_roots: Vec<PathBuf>,
    /// Disabled module list; defaults to `modules.toml` in the user dir
    pub module_list_path: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            user_plugin_dir: hei_paths::plugin_dir(),
            project_plugin_dir: None,
            search_roots: Vec::new(),
            module_list_path: None,
        }
    }
}

impl HostConfig {
    pub fn file_system(&self) -> FileSystem {
        FileSystem::new(self.search_roots.clone())
    }

    pub fn module_list_path(&self) -> PathBuf {
        self.module_list_path
            .clone()
            .unwrap_or_else(|| self.user_plugin_dir.join(hei_paths::MODULE_LIST_FILE))
    }

    /// Module directories, project first.
    pub fn plugin_dirs(&self) -> Vec<PathBuf> {
        self.project_plugin_dir
            .iter()
            .chain(std::iter::once(&self.user_plugin_dir))
            .cloned()
            .collect()
    }
}

/// Lifecycle state of a loaded module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// Descriptor accepted, init entry point not called yet
    Loaded,
    /// Init entry point has run
    Initialized,
}

/// A module the registry owns.
struct LoadedModule {
    info: ModuleInfo,
    state: ModuleState,
    registered: Vec<CapabilityKey>,
    rejected: Vec<PluginHostError>,
    image: Box<dyn ModuleImage>,
}

/// Read-only view of a loaded module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    pub id: ModuleId,
    #[serde(flatten)]
    pub info: ModuleInfo,
    pub state: ModuleState,
    pub registered: Vec<CapabilityKey>,
    /// Registrations the host refused, as messages
    pub rejected: Vec<String>,
}

/// A module `load_all` could not load.
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: PluginHostError,
}

/// Outcome of [`PluginRegistry::load_all`].
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<ModuleId>,
    /// Names skipped because they are disabled
    pub skipped: Vec<String>,
    pub failed: Vec<LoadFailure>,
}

/// Owns every loaded module and drives the host side of the module ABI.
pub struct PluginRegistry {
    /// Declared first so modules drop before the services they point into
    modules: BTreeMap<ModuleId, LoadedModule>,
    next_id: u32,
    plugin_dirs: Vec<PathBuf>,
    module_list_path: PathBuf,
    services: Arc<HostServices>,
}

impl PluginRegistry {
    pub fn new(config: &HostConfig, services: Arc<HostServices>) -> Self {
        Self {
            modules: BTreeMap::new(),
            next_id: 1,
            plugin_dirs: config.plugin_dirs(),
            module_list_path: config.module_list_path(),
            services,
        }
    }

    pub fn services(&self) -> &Arc<HostServices> {
        &self.services
    }

    pub fn plugin_dirs(&self) -> &[PathBuf] {
        &self.plugin_dirs
    }

    fn host_interface(&self) -> InterfaceVersion {
        self.services.interface()
    }

    // ─── Loading ─────────────────────────────────────────────────────

    /// Load, check and initialize the shared library at `path`.
    pub fn load_module(&mut self, path: &Path) -> Result<ModuleId, PluginHostError> {
        let image = DynamicImage::open(path)?;
        let id = self.admit(Box::new(image))?;
        self.initialize_module(id)?;
        Ok(id)
    }

    /// Load a module linked into the host binary.
    pub fn load_static(&mut self, module: StaticModule) -> Result<ModuleId, PluginHostError> {
        let id = self.admit(Box::new(StaticImage(module)))?;
        self.initialize_module(id)?;
        Ok(id)
    }

    /// Query an image's descriptor and accept it if the interface matches.
    ///
    /// On a major mismatch the image is dropped here and no table changes.
    pub fn admit(&mut self, image: Box<dyn ModuleImage>) -> Result<ModuleId, PluginHostError> {
        if self.find(image.name()).is_some() {
            return Err(PluginHostError::AlreadyLoaded {
                name: image.name().to_string(),
            });
        }

        let host = self.host_interface();
        let info = query_info(image.as_ref(), host)?;

        if !info.interface.is_compatible_with(host) {
            tracing::error!(
                module = %info.name,
                interface = %info.interface,
                host = %host,
                "Module interface incompatible, not loading"
            );
            return Err(PluginHostError::IncompatibleInterface {
                module: info.name,
                host,
                found: info.interface,
            });
        }
        if info.interface.minor > host.minor {
            tracing::warn!(
                module = %info.name,
                interface = %info.interface,
                host = %host,
                "Module built against a newer interface minor"
            );
        }

        let id = ModuleId(self.next_id);
        self.next_id += 1;

        tracing::info!(
            module = %info.name,
            version = %info.version,
            interface = %info.interface,
            id = %id,
            "Module loaded"
        );
        self.modules.insert(
            id,
            LoadedModule {
                info,
                state: ModuleState::Loaded,
                registered: Vec::new(),
                rejected: Vec::new(),
                image,
            },
        );
        Ok(id)
    }

    /// Run the module's init entry point with the export table.
    ///
    /// Allowed once per module. Everything the module registers during the
    /// call is tagged with its id.
    pub fn initialize_module(&mut self, id: ModuleId) -> Result<(), PluginHostError> {
        let module = self.modules.get_mut(&id).ok_or_else(|| not_found(id))?;
        if module.state == ModuleState::Initialized {
            return Err(PluginHostError::AlreadyInitialized {
                name: module.info.name.clone(),
            });
        }

        self.services.begin_init(ModuleOwner {
            id,
            name: Arc::from(module.info.name.as_str()),
        })?;
        let initialize = module.image.initialize();
        // SAFETY: the export table lives inside `services`, which outlives
        // every module this registry owns.
        unsafe { initialize(self.services.exports()) };
        let window = self.services.end_init();

        module.state = ModuleState::Initialized;
        if let Some(window) = window {
            module.registered = window.registered;
            module.rejected = window.rejected;
        }

        tracing::info!(
            module = %module.info.name,
            registered = module.registered.len(),
            rejected = module.rejected.len(),
            "Module initialized"
        );
        Ok(())
    }

    /// Remove everything the module registered, then unmap it.
    pub fn unload_module(&mut self, id: ModuleId) -> Result<ModuleInfo, PluginHostError> {
        let module = self.modules.remove(&id).ok_or_else(|| not_found(id))?;
        let removed = self.services.remove_module(id);
        let LoadedModule { info, image, .. } = module;
        drop(image);

        tracing::info!(module = %info.name, removed, "Module unloaded");
        Ok(info)
    }

    /// Discover and load every enabled module in the plugin directories.
    ///
    /// Failures are logged and reported; they never stop the scan.
    pub fn load_all(&mut self) -> Result<LoadReport, PluginHostError> {
        let list = ModuleList::load(&self.module_list_path)?;
        let mut report = LoadReport::default();

        for dir in self.discover()? {
            let name = dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string();

            if name.is_empty() {
                continue;
            }

            if !list.is_enabled(&name) {
                tracing::debug!(module = %name, "Module disabled, skipping");
                report.skipped.push(name);
                continue;
            }

            if self.find(&name).is_some() {
                tracing::debug!(module = %name, dir = %dir.display(), "Module shadowed by an earlier directory");
                continue;
            }

            match find_library(&dir, &name).and_then(|path| self.load_module(&path)) {
                Ok(id) => report.loaded.push(id),
                Err(error) => {
                    tracing::error!(module = %name, error = %error, "Failed to load module");
                    report.failed.push(LoadFailure { path: dir, error });
                }
            }
        }

        Ok(report)
    }

    /// Module directories, project dir first, each sorted by path.
    fn discover(&self) -> Result<Vec<PathBuf>, PluginHostError> {
        let mut found = Vec::new();

        for base_dir in &self.plugin_dirs {
            if !base_dir.exists() {
                tracing::debug!(dir = %base_dir.display(), "Plugin directory does not exist");
                continue;
            }

            let mut dirs = Vec::new();
            for entry in std::fs::read_dir(base_dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    dirs.push(path);
                }
            }
            dirs.sort();
            found.extend(dirs);
        }

        Ok(found)
    }

    // ─── Queries ─────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Loaded modules in load order.
    pub fn modules(&self) -> Vec<ModuleSummary> {
        self.modules
            .iter()
            .map(|(id, m)| summarize(*id, m))
            .collect()
    }

    pub fn module(&self, id: ModuleId) -> Option<ModuleSummary> {
        self.modules.get(&id).map(|m| summarize(id, m))
    }

    pub fn find(&self, name: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .find(|(_, m)| m.info.name == name)
            .map(|(id, _)| *id)
    }

    /// Ask the module for its descriptor again.
    pub fn query_descriptor(&self, id: ModuleId) -> Result<ModuleInfo, PluginHostError> {
        let module = self.modules.get(&id).ok_or_else(|| not_found(id))?;
        query_info(module.image.as_ref(), self.host_interface())
    }

    /// Registrations the host refused while the module initialized.
    pub fn rejected(&self, id: ModuleId) -> Option<&[PluginHostError]> {
        self.modules.get(&id).map(|m| m.rejected.as_slice())
    }

    /// Every capability currently registered, sorted.
    pub fn capabilities(&self) -> Vec<CapabilityInfo> {
        self.services.capabilities().describe()
    }

    // ─── Module list ─────────────────────────────────────────────────

    /// Enable a module for the next `load_all`.
    pub fn enable_module(&self, name: &str) -> Result<(), PluginHostError> {
        let mut list = ModuleList::load(&self.module_list_path)?;
        if list.enable(name) {
            list.save(&self.module_list_path)?;
        }
        Ok(())
    }

    /// Disable a module for the next `load_all`. A loaded copy stays loaded.
    pub fn disable_module(&self, name: &str) -> Result<(), PluginHostError> {
        let mut list = ModuleList::load(&self.module_list_path)?;
        if list.disable(name) {
            list.save(&self.module_list_path)?;
        }
        Ok(())
    }

    pub fn is_module_enabled(&self, name: &str) -> Result<bool, PluginHostError> {
        Ok(ModuleList::load(&self.module_list_path)?.is_enabled(name))
    }
}

impl Drop for PluginRegistry {
    fn drop(&mut self) {
        let ids: Vec<ModuleId> = self.modules.keys().rev().copied().collect();
        for id in ids {
            let _ = self.unload_module(id);
        }
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("modules", &self.modules.len())
            .field("plugin_dirs", &self.plugin_dirs)
            .finish_non_exhaustive()
    }
}

fn summarize(id: ModuleId, module: &LoadedModule) -> ModuleSummary {
    ModuleSummary {
        id,
        info: module.info.clone(),
        state: module.state,
        registered: module.registered.clone(),
        rejected: module.rejected.iter().map(ToString::to_string).collect(),
    }
}

fn not_found(id: ModuleId) -> PluginHostError {
    PluginHostError::NotFound {
        name: id.to_string(),
    }
}

/// Find the library file in a module directory
pub fn find_library(dir: &Path, name: &str) -> Result<PathBuf, PluginHostError> {
    hei_paths::library_candidates(dir, name)
        .into_iter()
        .find(|candidate| candidate.exists())
        .ok_or_else(|| PluginHostError::LibraryNotFound {
            dir: dir.to_path_buf(),
        })
}
