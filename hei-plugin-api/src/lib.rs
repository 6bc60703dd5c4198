//! hei-plugin-api - Module ABI for the hei engine support library
//!
//! This crate is shared by the host and by every loadable module. It defines
//! the C-compatible contract between independently compiled binaries:
//!
//! - [`ModuleDescriptor`]: static metadata a module reports when queried
//! - [`ExportTable`]: the versioned table of host services given to modules
//! - [`PackageLoaderFn`] / [`ImageLoaderFn`] / [`GraphicsDriver`]: what a module
//!   can register
//! - [`Host`]: the safe wrapper module code uses instead of raw table calls
//!
//! # Example
//!
//! ```ignore
//! use hei_plugin_api::{FileHandle, Host, Image, RawImage, export_module};
//!
//! unsafe extern "C" fn load_tga(file: FileHandle) -> *mut RawImage {
//!     // read through Host::current().file(file) ...
//!     std::ptr::null_mut()
//! }
//!
//! fn init(host: &Host) {
//!     let _ = host.register_image_loader("tga", load_tga);
//! }
//!
//! export_module! {
//!     description: "Truevision TGA images",
//!     version: (0, 1, 0),
//!     init: init,
//! }
//! ```

pub mod abi;
pub mod error;
pub mod host;
pub mod types;

pub use abi::{
    CreateDeviceFn, DestroyDeviceFn, ExportTable, FileHandle, GraphicsDriver, INITIALIZE_SYMBOL,
    ImageLoaderFn, InitializePluginFn, InterfaceVersion, LogLevelId, ModuleDescriptor,
    ModuleVersion, PackageLoaderFn, QUERY_SYMBOL, QueryPluginFn, RegistrationStatus, SeekOrigin,
};
pub use error::{FileError, RegistrationError};
pub use host::{File, FileRef, Host, READ_STRING_LIMIT};
pub use types::{Image, Package, PackageEntry, PixelFormat, RawImage, RawPackage, RawPackageEntry};

/// Interface version this crate was built as.
///
/// The host publishes it in its export table; modules report it in their
/// descriptor. Only the major must match.
pub const INTERFACE_VERSION: InterfaceVersion = InterfaceVersion::new(1, 1);

/// Export the two entry points a module needs.
///
/// # Usage
///
/// ```ignore
/// hei_plugin_api::export_module! {
///     description: "Quake PAK archives",
///     version: (1, 0, 0),
///     init: init,
/// }
/// ```
///
/// # Generated Functions
///
/// - `hei_query_plugin()`: returns a pointer to a static [`ModuleDescriptor`]
/// - `hei_initialize_plugin()`: installs the [`Host`] and calls `init`
#[macro_export]
macro_rules! export_module {
    (
        description: $desc:literal,
        version: ($major:expr, $minor:expr, $patch:expr),
        init: $init:path $(,)?
    ) => {
        static HEI_MODULE_DESCRIPTOR: $crate::ModuleDescriptor = $crate::ModuleDescriptor {
            description: concat!($desc, "\0").as_ptr() as *const ::std::ffi::c_char,
            version: $crate::ModuleVersion::new($major, $minor, $patch),
            interface: $crate::INTERFACE_VERSION,
        };

        #[unsafe(no_mangle)]
        pub extern "C" fn hei_query_plugin(
            _host: $crate::InterfaceVersion,
        ) -> *const $crate::ModuleDescriptor {
            &HEI_MODULE_DESCRIPTOR
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn hei_initialize_plugin(exports: *const $crate::ExportTable) {
            // SAFETY: the host keeps the table alive while this module is loaded.
            if let Some(host) = unsafe { $crate::Host::from_raw(exports) } {
                host.install();
                let init: fn(&$crate::Host) = $init;
                init(&host);
            }
        }
    };
}
