//! C-compatible types shared by the host and every module.
//!
//! Everything in this file crosses the boundary between independently
//! compiled binaries. Layouts are `#[repr(C)]` and, once published under a
//! major interface version, only ever grow at the end.

use serde::{Deserialize, Serialize};
use std::ffi::{CStr, c_char, c_void};
use std::fmt;
use std::mem::{offset_of, size_of};

use crate::error::RegistrationError;
use crate::types::{RawImage, RawPackage};

/// Symbol name of the descriptor query entry point.
pub const QUERY_SYMBOL: &[u8] = b"hei_query_plugin\0";

/// Symbol name of the initialization entry point.
pub const INITIALIZE_SYMBOL: &[u8] = b"hei_initialize_plugin\0";

/// `(major, minor)` version of the host/module contract.
///
/// Majors must match exactly. A newer minor only ever appends entries to the
/// [`ExportTable`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceVersion {
    pub major: u16,
    pub minor: u16,
}

impl InterfaceVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Whether a module built against `self` may be initialized by `host`.
    pub fn is_compatible_with(self, host: InterfaceVersion) -> bool {
        self.major == host.major
    }
}

impl fmt::Display for InterfaceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Semantic version of a module.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl ModuleVersion {
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Static metadata a module reports from `hei_query_plugin`.
#[repr(C)]
#[derive(Debug)]
pub struct ModuleDescriptor {
    /// Null-terminated human-readable description.
    pub description: *const c_char,
    pub version: ModuleVersion,
    /// Interface version the module was compiled against.
    pub interface: InterfaceVersion,
}

// SAFETY: a descriptor only points at static, immutable string data.
unsafe impl Send for ModuleDescriptor {}
unsafe impl Sync for ModuleDescriptor {}

impl ModuleDescriptor {
    /// Get the description as a Rust string.
    ///
    /// Returns `None` if the pointer is null or the text is not UTF-8.
    ///
    /// # Safety
    ///
    /// `description` must be null or point to a valid null-terminated string.
    pub unsafe fn description_str(&self) -> Option<&str> {
        if self.description.is_null() {
            return None;
        }
        // SAFETY: caller guarantees the pointer is valid and null-terminated.
        unsafe { CStr::from_ptr(self.description).to_str().ok() }
    }
}

/// Host-side handle to an open file. `0` is the null handle.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct FileHandle(pub u64);

impl FileHandle {
    pub const NULL: FileHandle = FileHandle(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Handle to a log channel allocated with `add_log_level`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogLevelId(pub u32);

/// Result code of a registration call.
///
/// An integer newtype rather than an enum: a newer host may return codes an
/// older module has never heard of.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationStatus(pub i32);

impl RegistrationStatus {
    pub const OK: Self = Self(0);
    /// Another module already owns the key.
    pub const DUPLICATE: Self = Self(1);
    /// Empty or malformed key, or a null handler.
    pub const INVALID_KEY: Self = Self(2);
    /// Registration attempted while no module was being initialized.
    pub const OUTSIDE_INIT: Self = Self(3);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    pub fn into_result(self) -> Result<(), RegistrationError> {
        match self {
            Self::OK => Ok(()),
            Self::DUPLICATE => Err(RegistrationError::Duplicate),
            Self::INVALID_KEY => Err(RegistrationError::InvalidKey),
            Self::OUTSIDE_INIT => Err(RegistrationError::OutsideInit),
            Self(code) => Err(RegistrationError::Unknown(code)),
        }
    }
}

/// Origin for `seek`, mirroring `SEEK_SET`/`SEEK_CUR`/`SEEK_END`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekOrigin(pub u32);

impl SeekOrigin {
    pub const START: Self = Self(0);
    pub const CURRENT: Self = Self(1);
    pub const END: Self = Self(2);
}

/// Package loader: `(path, opened file) -> package or null`.
pub type PackageLoaderFn =
    unsafe extern "C" fn(path: *const c_char, file: FileHandle) -> *mut RawPackage;

/// Image loader: `(opened file) -> image or null`.
pub type ImageLoaderFn = unsafe extern "C" fn(file: FileHandle) -> *mut RawImage;

/// Creates a backend device, returning an opaque device pointer or null.
pub type CreateDeviceFn = unsafe extern "C" fn(width: u32, height: u32) -> *mut c_void;

/// Destroys a device created by the matching [`CreateDeviceFn`].
pub type DestroyDeviceFn = unsafe extern "C" fn(device: *mut c_void);

/// Backend descriptor passed to `register_graphics_mode`. The host copies it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GraphicsDriver {
    /// Higher wins when the host picks a default backend.
    pub priority: i32,
    pub create_device: Option<CreateDeviceFn>,
    pub destroy_device: Option<DestroyDeviceFn>,
}

/// `hei_query_plugin(host_interface) -> *const ModuleDescriptor`
pub type QueryPluginFn = unsafe extern "C" fn(host: InterfaceVersion) -> *const ModuleDescriptor;

/// `hei_initialize_plugin(exports)`
pub type InitializePluginFn = unsafe extern "C" fn(exports: *const ExportTable);

/// Table of host services handed to every module.
///
/// The header (`size`, `interface`, `ctx`) never changes. Function pointers
/// follow in publication order; entries introduced in a later minor version
/// are appended and must be gated with [`ExportTable::provides_minor`].
#[repr(C)]
pub struct ExportTable {
    /// `size_of::<ExportTable>()` as compiled into the host.
    pub size: u32,
    pub interface: InterfaceVersion,
    /// Opaque host pointer, passed back as the first argument of every entry.
    pub ctx: *const c_void,

    // ─── 1.0 ─────────────────────────────────────────────────────────
    pub add_log_level: unsafe extern "C" fn(
        ctx: *const c_void,
        name: *const c_char,
        colour: u32,
        enabled_by_default: bool,
    ) -> LogLevelId,
    pub register_graphics_mode: unsafe extern "C" fn(
        ctx: *const c_void,
        name: *const c_char,
        driver: *const GraphicsDriver,
    ) -> RegistrationStatus,
    pub register_package_loader: unsafe extern "C" fn(
        ctx: *const c_void,
        extension: *const c_char,
        loader: Option<PackageLoaderFn>,
    ) -> RegistrationStatus,
    pub register_image_loader: unsafe extern "C" fn(
        ctx: *const c_void,
        extension: *const c_char,
        loader: Option<ImageLoaderFn>,
    ) -> RegistrationStatus,
    pub open_file:
        unsafe extern "C" fn(ctx: *const c_void, path: *const c_char, must_exist: bool) -> FileHandle,
    pub read_string: unsafe extern "C" fn(
        ctx: *const c_void,
        file: FileHandle,
        buf: *mut c_char,
        cap: usize,
    ) -> usize,
    pub close_file: unsafe extern "C" fn(ctx: *const c_void, file: FileHandle),
    pub report_error: unsafe extern "C" fn(ctx: *const c_void, message: *const c_char),

    // ─── 1.1 ─────────────────────────────────────────────────────────
    pub log: unsafe extern "C" fn(ctx: *const c_void, level: LogLevelId, message: *const c_char),
    /// Returns bytes read, or `-1` on error.
    pub read:
        unsafe extern "C" fn(ctx: *const c_void, file: FileHandle, buf: *mut u8, len: usize) -> isize,
    /// Returns the new position, or `-1` on error.
    pub seek: unsafe extern "C" fn(
        ctx: *const c_void,
        file: FileHandle,
        offset: i64,
        origin: SeekOrigin,
    ) -> i64,
    /// Returns the file size in bytes, or `-1` on error.
    pub file_size: unsafe extern "C" fn(ctx: *const c_void, file: FileHandle) -> i64,
}

// SAFETY: the table is immutable after construction and `ctx` points at
// host state that is itself synchronised.
unsafe impl Send for ExportTable {}
unsafe impl Sync for ExportTable {}

impl ExportTable {
    /// Size in bytes of the table as published at `minor`.
    pub const fn size_for_minor(minor: u16) -> usize {
        match minor {
            0 => offset_of!(ExportTable, log),
            _ => size_of::<ExportTable>(),
        }
    }

    /// Whether the entries introduced in `minor` exist in this table.
    pub fn provides_minor(&self, minor: u16) -> bool {
        self.interface.minor >= minor && self.size as usize >= Self::size_for_minor(minor)
    }
}

impl fmt::Debug for ExportTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportTable")
            .field("size", &self.size)
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}
