//! `extern "C"` entry points behind the export table
//!
//! Every function receives the table's `ctx`, which is the address of the
//! owning [`HostServices`]. None of them may unwind into module code, so
//! failures turn into the sentinel values documented on [`ExportTable`].

use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_void};
use std::io::SeekFrom;
use std::mem::size_of;

use hei_plugin_api::{
    ExportTable, FileHandle, GraphicsDriver, INTERFACE_VERSION, ImageLoaderFn, LogLevelId,
    PackageLoaderFn, RegistrationStatus, SeekOrigin,
};

use super::capabilities::Capability;
use crate::services::HostServices;

/// Build the table for the services living at `ctx`.
pub(crate) fn build(ctx: *const HostServices) -> ExportTable {
    ExportTable {
        size: size_of::<ExportTable>() as u32,
        interface: INTERFACE_VERSION,
        ctx: ctx.cast(),
        add_log_level,
        register_graphics_mode,
        register_package_loader,
        register_image_loader,
        open_file,
        read_string,
        close_file,
        report_error,
        log,
        read,
        seek,
        file_size,
    }
}

/// # Safety
/// `ctx` must be null or the `ctx` of a live table built by [`build`].
unsafe fn services<'a>(ctx: *const c_void) -> Option<&'a HostServices> {
    unsafe { ctx.cast::<HostServices>().as_ref() }
}

unsafe fn text<'a>(ptr: *const c_char) -> Option<Cow<'a, str>> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy())
}

// ─── 1.0 ─────────────────────────────────────────────────────────────

unsafe extern "C" fn add_log_level(
    ctx: *const c_void,
    name: *const c_char,
    colour: u32,
    enabled_by_default: bool,
) -> LogLevelId {
    let Some(services) = (unsafe { services(ctx) }) else {
        return LogLevelId(u32::MAX);
    };
    let name = unsafe { text(name) }.unwrap_or(Cow::Borrowed("unnamed"));
    services.add_log_level(&name, colour, enabled_by_default)
}

unsafe fn register(ctx: *const c_void, key: *const c_char, capability: Capability) -> RegistrationStatus {
    let Some(services) = (unsafe { services(ctx) }) else {
        return RegistrationStatus::OUTSIDE_INIT;
    };
    match unsafe { text(key) } {
        Some(key) => services.register(&key, capability),
        None => RegistrationStatus::INVALID_KEY,
    }
}

unsafe extern "C" fn register_graphics_mode(
    ctx: *const c_void,
    name: *const c_char,
    driver: *const GraphicsDriver,
) -> RegistrationStatus {
    // Copied now; the module's struct may be on its stack.
    let Some(driver) = (unsafe { driver.as_ref() }).copied() else {
        return RegistrationStatus::INVALID_KEY;
    };
    unsafe { register(ctx, name, Capability::GraphicsBackend(driver)) }
}

unsafe extern "C" fn register_package_loader(
    ctx: *const c_void,
    extension: *const c_char,
    loader: Option<PackageLoaderFn>,
) -> RegistrationStatus {
    let Some(loader) = loader else {
        return RegistrationStatus::INVALID_KEY;
    };
    unsafe { register(ctx, extension, Capability::PackageLoader(loader)) }
}

unsafe extern "C" fn register_image_loader(
    ctx: *const c_void,
    extension: *const c_char,
    loader: Option<ImageLoaderFn>,
) -> RegistrationStatus {
    let Some(loader) = loader else {
        return RegistrationStatus::INVALID_KEY;
    };
    unsafe { register(ctx, extension, Capability::ImageLoader(loader)) }
}

unsafe extern "C" fn open_file(ctx: *const c_void, path: *const c_char, must_exist: bool) -> FileHandle {
    let (Some(services), Some(path)) = (unsafe { services(ctx) }, unsafe { text(path) }) else {
        return FileHandle::NULL;
    };
    match services.open_file(&path, must_exist) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::debug!(path = %path, error = %e, "Module file open failed");
            FileHandle::NULL
        }
    }
}

unsafe extern "C" fn read_string(
    ctx: *const c_void,
    file: FileHandle,
    buf: *mut c_char,
    cap: usize,
) -> usize {
    let Some(services) = (unsafe { services(ctx) }) else {
        return 0;
    };
    if buf.is_null() || cap == 0 {
        return 0;
    }
    let out = unsafe { std::slice::from_raw_parts_mut(buf.cast::<u8>(), cap) };
    // Leave room for the terminator.
    let bytes = match services.with_file(file, |f| f.read_string(cap - 1)) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(handle = file.0, error = %e, "Module read_string failed");
            out[0] = 0;
            return 0;
        }
    };
    out[..bytes.len()].copy_from_slice(&bytes);
    out[bytes.len()] = 0;
    bytes.len()
}

unsafe extern "C" fn close_file(ctx: *const c_void, file: FileHandle) {
    if let Some(services) = unsafe { services(ctx) } {
        if !services.close_file(file) {
            tracing::debug!(handle = file.0, "Module closed a handle that was not open");
        }
    }
}

unsafe extern "C" fn report_error(ctx: *const c_void, message: *const c_char) {
    if let (Some(services), Some(message)) = (unsafe { services(ctx) }, unsafe { text(message) }) {
        services.report_error(&message);
    }
}

// ─── 1.1 ─────────────────────────────────────────────────────────────

unsafe extern "C" fn log(ctx: *const c_void, level: LogLevelId, message: *const c_char) {
    if let (Some(services), Some(message)) = (unsafe { services(ctx) }, unsafe { text(message) }) {
        services.log(level, &message);
    }
}

unsafe extern "C" fn read(ctx: *const c_void, file: FileHandle, buf: *mut u8, len: usize) -> isize {
    let Some(services) = (unsafe { services(ctx) }) else {
        return -1;
    };
    if len == 0 {
        return 0;
    }
    if buf.is_null() {
        return -1;
    }
    let out = unsafe { std::slice::from_raw_parts_mut(buf, len) };
    match services.with_file(file, |f| f.read(out)) {
        Ok(n) => n as isize,
        Err(_) => -1,
    }
}

unsafe extern "C" fn seek(ctx: *const c_void, file: FileHandle, offset: i64, origin: SeekOrigin) -> i64 {
    let Some(services) = (unsafe { services(ctx) }) else {
        return -1;
    };
    let pos = match origin {
        SeekOrigin::START if offset >= 0 => SeekFrom::Start(offset as u64),
        SeekOrigin::CURRENT => SeekFrom::Current(offset),
        SeekOrigin::END => SeekFrom::End(offset),
        _ => return -1,
    };
    match services.with_file(file, |f| f.seek(pos)) {
        Ok(pos) => i64::try_from(pos).unwrap_or(-1),
        Err(_) => -1,
    }
}

unsafe extern "C" fn file_size(ctx: *const c_void, file: FileHandle) -> i64 {
    let Some(services) = (unsafe { services(ctx) }) else {
        return -1;
    };
    match services.with_file(file, |f| f.size()) {
        Ok(size) => i64::try_from(size).unwrap_or(-1),
        Err(_) => -1,
    }
}
