//! HostServices - the host-owned state behind the export table
//!
//! One instance per host, shared through an `Arc` by the
//! [`PluginRegistry`](crate::plugins::PluginRegistry) and the
//! [`Dispatcher`](crate::dispatch::Dispatcher). The export table handed to
//! modules lives inside it and points back at it, so its address is stable
//! for as long as any module can call in.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hei_plugin_api::{ExportTable, FileHandle, InterfaceVersion, LogLevelId, RegistrationStatus};

use crate::fs::{FileSystem, FileTable, VirtualFile};
use crate::plugins::capabilities::{
    Capability, CapabilityKey, CapabilityKind, CapabilityTables, ModuleId, ModuleOwner,
    normalize_key,
};
use crate::plugins::channels::LogChannel;
use crate::plugins::exports;
use crate::plugins::PluginHostError;

/// Registrations collected while one module's init entry point runs.
#[derive(Debug)]
pub(crate) struct InitWindow {
    pub owner: ModuleOwner,
    pub registered: Vec<CapabilityKey>,
    pub rejected: Vec<PluginHostError>,
}

/// Host services shared with every module.
pub struct HostServices {
    exports: ExportTable,
    capabilities: RwLock<CapabilityTables>,
    init_window: Mutex<Option<InitWindow>>,
    files: Mutex<FileTable>,
    last_error: Mutex<Option<String>>,
}

impl HostServices {
    pub fn new(fs: FileSystem) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            exports: exports::build(weak.as_ptr()),
            capabilities: RwLock::new(CapabilityTables::new()),
            init_window: Mutex::new(None),
            files: Mutex::new(FileTable::new(fs)),
            last_error: Mutex::new(None),
        })
    }

    /// The table passed to every module's init entry point.
    pub fn exports(&self) -> &ExportTable {
        &self.exports
    }

    pub fn interface(&self) -> InterfaceVersion {
        self.exports.interface
    }

    /// Read access to the capability tables.
    pub fn capabilities(&self) -> RwLockReadGuard<'_, CapabilityTables> {
        self.capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn capabilities_mut(&self) -> RwLockWriteGuard<'_, CapabilityTables> {
        self.capabilities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ─── Init window ─────────────────────────────────────────────────

    /// Open the registration window for `owner`. Only one may be open.
    pub(crate) fn begin_init(&self, owner: ModuleOwner) -> Result<(), PluginHostError> {
        let mut window = lock(&self.init_window);
        if let Some(active) = window.as_ref() {
            return Err(PluginHostError::InitInProgress {
                name: owner.name.to_string(),
                active: active.owner.name.to_string(),
            });
        }
        *window = Some(InitWindow {
            owner,
            registered: Vec::new(),
            rejected: Vec::new(),
        });
        Ok(())
    }

    pub(crate) fn end_init(&self) -> Option<InitWindow> {
        lock(&self.init_window).take()
    }

    /// Name of the module currently initializing, if any.
    pub fn initializing(&self) -> Option<String> {
        lock(&self.init_window)
            .as_ref()
            .map(|w| w.owner.name.to_string())
    }

    /// Add `capability` under `key` for the module whose window is open.
    ///
    /// Duplicate keys are rejected; the first owner keeps the entry.
    pub fn register(&self, key: &str, capability: Capability) -> RegistrationStatus {
        let kind = capability.kind();
        let mut guard = lock(&self.init_window);
        let Some(window) = guard.as_mut() else {
            tracing::warn!(kind = %kind, key, "Registration outside module initialization rejected");
            return RegistrationStatus::OUTSIDE_INIT;
        };
        let Some(key) = normalize_key(key) else {
            tracing::warn!(module = %window.owner.name, kind = %kind, "Empty registration key rejected");
            return RegistrationStatus::INVALID_KEY;
        };

        let inserted = self
            .capabilities_mut()
            .insert(key.clone(), capability, window.owner.clone());
        match inserted {
            Ok(()) => {
                tracing::debug!(module = %window.owner.name, kind = %kind, key = %key, "Capability registered");
                window.registered.push(CapabilityKey { kind, key });
                RegistrationStatus::OK
            }
            Err(existing) => {
                tracing::warn!(
                    module = %window.owner.name,
                    owner = %existing.name,
                    kind = %kind,
                    key = %key,
                    "Duplicate registration rejected"
                );
                window.rejected.push(PluginHostError::DuplicateRegistration {
                    kind,
                    key,
                    module: window.owner.name.to_string(),
                    owner: existing.name.to_string(),
                });
                RegistrationStatus::DUPLICATE
            }
        }
    }

    /// Remove everything `module` registered.
    pub(crate) fn remove_module(&self, module: ModuleId) -> usize {
        self.capabilities_mut().remove_owner(module)
    }

    // ─── Logging ─────────────────────────────────────────────────────

    /// Allocate a log channel, owned by the initializing module if any.
    pub fn add_log_level(&self, name: &str, colour: u32, enabled: bool) -> LogLevelId {
        let mut guard = lock(&self.init_window);
        let owner = guard.as_ref().map(|w| w.owner.clone());
        let id = self.capabilities_mut().log_levels.add(LogChannel {
            name: name.to_string(),
            colour,
            enabled,
            owner,
        });
        if let Some(window) = guard.as_mut() {
            window.registered.push(CapabilityKey {
                kind: CapabilityKind::LogLevel,
                key: name.to_string(),
            });
        }
        tracing::debug!(channel = name, id = id.0, "Log level added");
        id
    }

    /// Emit `message` on a channel if it exists and is enabled.
    pub fn log(&self, level: LogLevelId, message: &str) {
        let tables = self.capabilities();
        match tables.log_levels.get(level) {
            Some(channel) if channel.enabled => {
                let module = channel
                    .owner
                    .as_ref()
                    .map_or("host", |o| o.name.as_ref());
                tracing::info!(target: "hei::module", channel = %channel.name, module, "{message}");
            }
            Some(_) => {}
            None => {
                tracing::warn!(target: "hei::module", id = level.0, "{message} (unknown log channel)");
            }
        }
    }

    /// Returns how many channels matched `name`.
    pub fn set_log_level_enabled(&self, name: &str, enabled: bool) -> usize {
        self.capabilities_mut().log_levels.set_enabled(name, enabled)
    }

    // ─── Errors ──────────────────────────────────────────────────────

    pub fn report_error(&self, message: &str) {
        tracing::error!(target: "hei::module", "{message}");
        *lock(&self.last_error) = Some(message.to_string());
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub fn take_last_error(&self) -> Option<String> {
        lock(&self.last_error).take()
    }

    // ─── Files ───────────────────────────────────────────────────────

    pub fn open_file(&self, path: &str, must_exist: bool) -> io::Result<FileHandle> {
        lock(&self.files).open(path, must_exist)
    }

    /// Returns `false` if the handle was not open.
    pub fn close_file(&self, handle: FileHandle) -> bool {
        lock(&self.files).close(handle)
    }

    /// Run `f` on an open file.
    pub fn with_file<R>(
        &self,
        handle: FileHandle,
        f: impl FnOnce(&mut VirtualFile) -> io::Result<R>,
    ) -> io::Result<R> {
        let mut files = lock(&self.files);
        let file = files.get_mut(handle).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("file handle {} is not open", handle.0),
            )
        })?;
        f(file)
    }

    pub fn open_file_count(&self) -> usize {
        lock(&self.files).open_count()
    }

    pub fn search_roots(&self) -> Vec<std::path::PathBuf> {
        lock(&self.files).filesystem().roots().to_vec()
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices")
            .field("interface", &self.interface())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
