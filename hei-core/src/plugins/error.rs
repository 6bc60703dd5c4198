//! Plugin registry error types

use std::path::PathBuf;

use hei_plugin_api::InterfaceVersion;
use thiserror::Error;

use super::capabilities::CapabilityKind;

/// Errors that can occur while loading, initializing or unloading modules.
///
/// All of these are scoped to a single module; the host keeps running.
#[derive(Error, Debug)]
pub enum PluginHostError {
    /// The module image could not be mapped
    #[error("Failed to load module {path}: {source}")]
    ModuleLoad {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// A required entry point is missing from the module image
    #[error("Module {module} does not export '{symbol}'")]
    MissingEntryPoint { module: String, symbol: String },

    /// The module returned no descriptor, or an unreadable one
    #[error("Module {module} returned an invalid descriptor: {reason}")]
    InvalidDescriptor { module: String, reason: String },

    /// Interface major version mismatch between host and module
    #[error("Module {module} targets interface {found}, host provides {host}")]
    IncompatibleInterface {
        module: String,
        host: InterfaceVersion,
        found: InterfaceVersion,
    },

    /// A module tried to register a key another module already owns
    #[error("{kind} '{key}' from module {module} rejected: already registered by {owner}")]
    DuplicateRegistration {
        kind: CapabilityKind,
        key: String,
        module: String,
        owner: String,
    },

    /// A module with the same name is already loaded
    #[error("Module '{name}' is already loaded")]
    AlreadyLoaded { name: String },

    /// `initialize_module` was called twice for the same module
    #[error("Module '{name}' is already initialized")]
    AlreadyInitialized { name: String },

    /// Another module's init window is still open
    #[error("Cannot initialize '{name}' while '{active}' is initializing")]
    InitInProgress { name: String, active: String },

    /// Module not found
    #[error("Module '{name}' not found")]
    NotFound { name: String },

    /// No loadable library inside a module directory
    #[error("Module library not found in {dir}")]
    LibraryNotFound { dir: PathBuf },

    /// Module list could not be read or written
    #[error("Module list error: {0}")]
    ModuleList(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
