//! hei-core: Host side of the hei module system
//!
//! This crate provides everything a program needs to host hei modules:
//!
//! - **Host services** - [`HostServices`] owns the export table, the capability
//!   tables, the open-file table and module log channels
//! - **Module lifecycle** - [`plugins::PluginRegistry`] loads shared libraries
//!   (or linked-in [`plugins::StaticModule`]s), checks their interface version
//!   and runs their init entry point
//! - **Dispatch** - [`Dispatcher`] routes "open this file" to the package or
//!   image loader registered for its extension, and hands out graphics backends
//! - **Filesystem** - [`fs::FileSystem`] resolves paths against ordered search
//!   roots for both the host and modules
//!
//! # Quick Start
//!
//! ```no_run
//! use hei_core::plugins::HostConfig;
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let (mut registry, dispatcher) = hei_core::build_host(&HostConfig::default());
//!     registry.load_all()?;
//!
//!     let package = dispatcher.open_package("id1/pak0.pak")?;
//!     println!("{} entries", package.len());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//!   PluginRegistry ──init──▶ module ──register_*──▶ ExportTable
//!         │                                             │
//!         └──────────── Arc<HostServices> ◀─────────────┘
//!                              │
//!                          Dispatcher ──open_*──▶ registered handler
//! ```

pub mod dispatch;
pub mod error;
pub mod fs;
pub mod graphics;
pub mod plugins;
pub mod services;

pub use dispatch::Dispatcher;
pub use error::DispatchError;
pub use graphics::{BackendInfo, GraphicsBackend, GraphicsDevice};
pub use plugins::{HostConfig, PluginHostError, PluginRegistry};
pub use services::HostServices;

/// Create the shared services for `config` and the two objects that use them.
pub fn build_host(config: &HostConfig) -> (PluginRegistry, Dispatcher) {
    let services = HostServices::new(config.file_system());
    let dispatcher = Dispatcher::new(services.clone());
    (PluginRegistry::new(config, services), dispatcher)
}
