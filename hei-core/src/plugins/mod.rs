//! Module system for hei
//!
//! This module provides the host side of the module ABI:
//!
//! - [`PluginRegistry`]: loads, version-checks, initializes and unloads modules
//! - [`CapabilityTables`]: what modules registered, keyed by extension or name
//! - [`ModuleList`]: tracks which modules are disabled
//! - [`PluginHostError`]: error types for module operations
//!
//! # Module Discovery
//!
//! Modules are discovered from two directories:
//! 1. Project modules: `.hei/plugins/` (takes precedence)
//! 2. User modules: `~/.config/hei/plugins/`
//!
//! Each module directory contains `<name>.so` or `lib<name>.so` (`.dylib` /
//! `.dll` on other platforms).
//!
//! # Example
//!
//! ```ignore
//! use hei_core::plugins::{HostConfig, PluginRegistry};
//! use hei_core::HostServices;
//!
//! let config = HostConfig::default();
//! let services = HostServices::new(config.file_system());
//! let mut registry = PluginRegistry::new(&config, services);
//!
//! let report = registry.load_all()?;
//! for cap in registry.capabilities() {
//!     println!("{} {} ({})", cap.kind, cap.key, cap.module);
//! }
//! ```

pub mod capabilities;
pub mod channels;
mod error;
pub(crate) mod exports;
pub mod module;
mod modules;
mod registry;

pub use capabilities::{
    Capability, CapabilityInfo, CapabilityKey, CapabilityKind, CapabilityTable, CapabilityTables,
    ModuleId, ModuleOwner, normalize_key,
};
pub use channels::{LogChannel, LogChannelInfo, LogChannels};
pub use error::PluginHostError;
pub use module::{DynamicImage, ModuleImage, ModuleInfo, StaticImage, StaticModule};
pub use modules::ModuleList;
pub use registry::{
    HostConfig, LoadFailure, LoadReport, ModuleState, ModuleSummary, PluginRegistry, find_library,
};
