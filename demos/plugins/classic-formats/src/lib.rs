//! Classic Formats - a sample hei module
//!
//! This module demonstrates:
//! - Exporting the entry points with the `export_module!` macro
//! - Registering package and image loaders by extension
//! - Reading through host file handles instead of `std::fs`
//! - Registering a graphics backend and a log channel
//!
//! ## Building
//!
//! ```bash
//! cargo build --release
//! ```
//!
//! ## Installing
//!
//! ```bash
//! mkdir -p ~/.config/hei/plugins/classic_formats
//! cp target/release/libclassic_formats.so ~/.config/hei/plugins/classic_formats/
//! hei plugin list
//! ```

mod dds;
mod null_gfx;
mod pak;
mod source;

use hei_plugin_api::{Host, LogLevelId, RegistrationError, export_module};
use std::sync::atomic::{AtomicU32, Ordering};

static CHANNEL: AtomicU32 = AtomicU32::new(u32::MAX);

fn init(host: &Host) {
    let channel = host.add_log_level("classic", 0x5fa8d3, true);
    CHANNEL.store(channel.0, Ordering::Relaxed);

    report("pak", host.register_package_loader("pak", pak::load), host);
    report("dds", host.register_image_loader("dds", dds::load), host);
    report("null", host.register_graphics_mode("null", &null_gfx::DRIVER), host);
}

fn report(key: &str, result: Result<(), RegistrationError>, host: &Host) {
    match result {
        Ok(()) => log(host, &format!("registered {key}")),
        Err(e) => host.report_error(&format!("classic_formats: {key}: {e}")),
    }
}

/// Log on this module's channel. A no-op on hosts without logging.
fn log(host: &Host, message: &str) {
    host.log(LogLevelId(CHANNEL.load(Ordering::Relaxed)), message);
}

/// Run a loader body against the installed host, reporting failures.
fn with_host<T>(load: impl FnOnce(&Host) -> Result<T, String>) -> Option<T> {
    let host = Host::current()?;
    match load(&host) {
        Ok(value) => Some(value),
        Err(message) => {
            host.report_error(&message);
            None
        }
    }
}

export_module! {
    description: "Quake PAK archives, DDS textures and a null graphics backend",
    version: (0, 1, 0),
    init: init,
}
