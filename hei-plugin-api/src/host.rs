//! Host - a module's safe view of the export table
//!
//! Modules never call export table entries directly. [`Host`] converts Rust
//! strings to C strings, turns status codes into `Result`s and refuses to
//! touch entries the running host does not provide.

use std::ffi::{CString, c_char};
use std::io::SeekFrom;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::abi::{
    ExportTable, FileHandle, GraphicsDriver, ImageLoaderFn, InterfaceVersion, LogLevelId,
    PackageLoaderFn, SeekOrigin,
};
use crate::error::{FileError, RegistrationError};

/// Export table of the host that initialized this module.
static INSTALLED: AtomicPtr<ExportTable> = AtomicPtr::new(ptr::null_mut());

/// Handle to the host's services.
#[derive(Clone, Copy)]
pub struct Host {
    table: &'static ExportTable,
}

impl Host {
    /// Wrap a raw export table pointer.
    ///
    /// # Safety
    ///
    /// `table` must be null or point to an export table that stays valid for
    /// as long as the returned `Host` (or any copy of it) is used.
    pub unsafe fn from_raw(table: *const ExportTable) -> Option<Self> {
        // SAFETY: caller guarantees validity for the module's lifetime.
        unsafe { table.as_ref() }.map(|table| Self { table })
    }

    /// Remember this host so loaders can reach it later via [`Host::current`].
    ///
    /// There is one slot per loaded copy of the module, so a module supports
    /// one host per process. If two hosts load the same library, the later
    /// `install` wins and `current` dangles once that host is dropped.
    pub fn install(self) {
        INSTALLED.store(ptr::from_ref(self.table).cast_mut(), Ordering::Release);
    }

    /// The host installed during initialization, if any.
    ///
    /// Valid only while that host is alive; see [`Host::install`].
    pub fn current() -> Option<Self> {
        let table = INSTALLED.load(Ordering::Acquire);
        // SAFETY: only pointers passed to `install` are stored, and those
        // satisfy the `from_raw` contract.
        unsafe { Self::from_raw(table) }
    }

    pub fn interface(&self) -> InterfaceVersion {
        self.table.interface
    }

    /// Whether entries introduced in `minor` can be called.
    pub fn supports_minor(&self, minor: u16) -> bool {
        self.table.provides_minor(minor)
    }

    // ─── Registration ────────────────────────────────────────────────

    /// Allocate a log channel. Never fails.
    pub fn add_log_level(&self, name: &str, colour: u32, enabled_by_default: bool) -> LogLevelId {
        let name = lossy_cstring(name);
        // SAFETY: arguments are valid for the duration of the call.
        unsafe { (self.table.add_log_level)(self.table.ctx, name.as_ptr(), colour, enabled_by_default) }
    }

    pub fn register_package_loader(
        &self,
        extension: &str,
        loader: PackageLoaderFn,
    ) -> Result<(), RegistrationError> {
        let key = CString::new(extension).map_err(|_| RegistrationError::InvalidKey)?;
        // SAFETY: arguments are valid for the duration of the call.
        unsafe { (self.table.register_package_loader)(self.table.ctx, key.as_ptr(), Some(loader)) }
            .into_result()
    }

    pub fn register_image_loader(
        &self,
        extension: &str,
        loader: ImageLoaderFn,
    ) -> Result<(), RegistrationError> {
        let key = CString::new(extension).map_err(|_| RegistrationError::InvalidKey)?;
        // SAFETY: arguments are valid for the duration of the call.
        unsafe { (self.table.register_image_loader)(self.table.ctx, key.as_ptr(), Some(loader)) }
            .into_result()
    }

    pub fn register_graphics_mode(
        &self,
        name: &str,
        driver: &GraphicsDriver,
    ) -> Result<(), RegistrationError> {
        let key = CString::new(name).map_err(|_| RegistrationError::InvalidKey)?;
        // SAFETY: the host copies the driver before returning.
        unsafe { (self.table.register_graphics_mode)(self.table.ctx, key.as_ptr(), driver) }
            .into_result()
    }

    // ─── Diagnostics ─────────────────────────────────────────────────

    /// Set the host's last error message.
    pub fn report_error(&self, message: &str) {
        let message = lossy_cstring(message);
        // SAFETY: arguments are valid for the duration of the call.
        unsafe { (self.table.report_error)(self.table.ctx, message.as_ptr()) }
    }

    /// Log on a channel from [`Host::add_log_level`].
    ///
    /// Returns `false` without logging on hosts older than interface 1.1.
    pub fn log(&self, level: LogLevelId, message: &str) -> bool {
        if !self.supports_minor(1) {
            return false;
        }
        let message = lossy_cstring(message);
        // SAFETY: entry exists (checked above); arguments outlive the call.
        unsafe { (self.table.log)(self.table.ctx, level, message.as_ptr()) };
        true
    }

    // ─── Files ───────────────────────────────────────────────────────

    /// Open a file through the host filesystem. Closed on drop.
    pub fn open_file(&self, path: &str, must_exist: bool) -> Result<File, FileError> {
        let c_path = CString::new(path).map_err(|_| FileError::InvalidPath(path.to_string()))?;
        // SAFETY: arguments are valid for the duration of the call.
        let handle = unsafe { (self.table.open_file)(self.table.ctx, c_path.as_ptr(), must_exist) };
        if handle.is_null() {
            return Err(FileError::Open(path.to_string()));
        }
        Ok(File {
            file: self.file(handle),
        })
    }

    /// Borrow a handle the host opened, e.g. the one passed to a loader.
    /// The handle is not closed when the returned value is dropped.
    pub fn file(&self, handle: FileHandle) -> FileRef {
        FileRef { host: *self, handle }
    }
}

/// Longest string [`FileRef::read_string`] will ask the host for.
pub const READ_STRING_LIMIT: usize = 1 << 16;

/// Non-owning access to a host file handle.
#[derive(Clone, Copy)]
pub struct FileRef {
    host: Host,
    handle: FileHandle,
}

impl FileRef {
    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    /// Read a NUL-terminated string of at most `max_len` bytes, capped at
    /// [`READ_STRING_LIMIT`].
    pub fn read_string(&self, max_len: usize) -> String {
        let max_len = max_len.min(READ_STRING_LIMIT);
        let mut buf = vec![0u8; max_len + 1];
        let table = self.host.table;
        // SAFETY: `buf` has room for `max_len` bytes plus the terminator.
        let len = unsafe {
            (table.read_string)(
                table.ctx,
                self.handle,
                buf.as_mut_ptr().cast::<c_char>(),
                buf.len(),
            )
        };
        buf.truncate(len.min(max_len));
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Read up to `buf.len()` bytes. Requires interface 1.1.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, FileError> {
        let table = self.require_minor(1)?;
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        let n = unsafe { (table.read)(table.ctx, self.handle, buf.as_mut_ptr(), buf.len()) };
        usize::try_from(n).map_err(|_| FileError::Read(self.handle.0))
    }

    /// Fill `buf` completely or fail with `UnexpectedEof`.
    pub fn read_exact(&self, buf: &mut [u8]) -> Result<(), FileError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(FileError::UnexpectedEof(self.handle.0));
            }
            filled += n;
        }
        Ok(())
    }

    /// Requires interface 1.1.
    pub fn seek(&self, pos: SeekFrom) -> Result<u64, FileError> {
        let table = self.require_minor(1)?;
        let (offset, origin) = match pos {
            SeekFrom::Start(n) => (
                i64::try_from(n).map_err(|_| FileError::Seek(self.handle.0))?,
                SeekOrigin::START,
            ),
            SeekFrom::Current(n) => (n, SeekOrigin::CURRENT),
            SeekFrom::End(n) => (n, SeekOrigin::END),
        };
        // SAFETY: plain value arguments.
        let at = unsafe { (table.seek)(table.ctx, self.handle, offset, origin) };
        u64::try_from(at).map_err(|_| FileError::Seek(self.handle.0))
    }

    /// Requires interface 1.1.
    pub fn size(&self) -> Result<u64, FileError> {
        let table = self.require_minor(1)?;
        // SAFETY: plain value arguments.
        let size = unsafe { (table.file_size)(table.ctx, self.handle) };
        u64::try_from(size).map_err(|_| FileError::Read(self.handle.0))
    }

    fn require_minor(&self, minor: u16) -> Result<&'static ExportTable, FileError> {
        if self.host.supports_minor(minor) {
            Ok(self.host.table)
        } else {
            Err(FileError::Unsupported(self.host.interface().to_string()))
        }
    }
}

/// An open host file, closed on drop.
pub struct File {
    file: FileRef,
}

impl std::ops::Deref for File {
    type Target = FileRef;

    fn deref(&self) -> &FileRef {
        &self.file
    }
}

impl Drop for File {
    fn drop(&mut self) {
        let table = self.file.host.table;
        // SAFETY: the handle was returned by `open_file` and is closed once.
        unsafe { (table.close_file)(table.ctx, self.file.handle) }
    }
}

fn lossy_cstring(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::RegistrationStatus;
    use std::ffi::{CStr, c_void};
    use std::sync::Mutex;

    /// Records what the fake host was asked to do.
    #[derive(Default)]
    struct FakeHost {
        calls: Mutex<Vec<String>>,
    }

    fn fake<'a>(ctx: *const c_void) -> &'a FakeHost {
        unsafe { &*ctx.cast::<FakeHost>() }
    }

    fn text(ptr: *const c_char) -> String {
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    unsafe extern "C" fn add_log_level(
        ctx: *const c_void,
        name: *const c_char,
        _colour: u32,
        _enabled: bool,
    ) -> LogLevelId {
        fake(ctx).calls.lock().unwrap().push(format!("level {}", text(name)));
        LogLevelId(7)
    }

    unsafe extern "C" fn register_graphics_mode(
        _ctx: *const c_void,
        _name: *const c_char,
        _driver: *const GraphicsDriver,
    ) -> RegistrationStatus {
        RegistrationStatus::OUTSIDE_INIT
    }

    unsafe extern "C" fn register_package_loader(
        ctx: *const c_void,
        ext: *const c_char,
        _loader: Option<PackageLoaderFn>,
    ) -> RegistrationStatus {
        fake(ctx).calls.lock().unwrap().push(format!("package {}", text(ext)));
        RegistrationStatus::OK
    }

    unsafe extern "C" fn register_image_loader(
        _ctx: *const c_void,
        _ext: *const c_char,
        _loader: Option<ImageLoaderFn>,
    ) -> RegistrationStatus {
        RegistrationStatus::DUPLICATE
    }

    unsafe extern "C" fn open_file(
        _ctx: *const c_void,
        path: *const c_char,
        _must_exist: bool,
    ) -> FileHandle {
        if text(path) == "present.bin" {
            FileHandle(5)
        } else {
            FileHandle::NULL
        }
    }

    unsafe extern "C" fn read_string(
        _ctx: *const c_void,
        _file: FileHandle,
        buf: *mut c_char,
        cap: usize,
    ) -> usize {
        let src = b"hello";
        let n = src.len().min(cap - 1);
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), buf.cast::<u8>(), n);
            *buf.add(n) = 0;
        }
        n
    }

    unsafe extern "C" fn close_file(ctx: *const c_void, file: FileHandle) {
        fake(ctx).calls.lock().unwrap().push(format!("close {}", file.0));
    }

    unsafe extern "C" fn report_error(ctx: *const c_void, message: *const c_char) {
        fake(ctx).calls.lock().unwrap().push(format!("error {}", text(message)));
    }

    unsafe extern "C" fn log(ctx: *const c_void, level: LogLevelId, message: *const c_char) {
        fake(ctx)
            .calls
            .lock()
            .unwrap()
            .push(format!("log {} {}", level.0, text(message)));
    }

    unsafe extern "C" fn read(
        _ctx: *const c_void,
        _file: FileHandle,
        buf: *mut u8,
        len: usize,
    ) -> isize {
        let n = len.min(3);
        unsafe { std::ptr::write_bytes(buf, 0xab, n) };
        n as isize
    }

    unsafe extern "C" fn seek(
        _ctx: *const c_void,
        _file: FileHandle,
        offset: i64,
        origin: SeekOrigin,
    ) -> i64 {
        if origin == SeekOrigin::START { offset } else { -1 }
    }

    unsafe extern "C" fn file_size(_ctx: *const c_void, _file: FileHandle) -> i64 {
        128
    }

    fn leak_table(minor: u16) -> (&'static FakeHost, Host) {
        let state: &'static FakeHost = Box::leak(Box::default());
        let table = Box::leak(Box::new(ExportTable {
            size: ExportTable::size_for_minor(minor) as u32,
            interface: InterfaceVersion::new(1, minor),
            ctx: ptr::from_ref(state).cast(),
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
        }));
        (state, unsafe { Host::from_raw(table) }.unwrap())
    }

    unsafe extern "C" fn noop_package(
        _path: *const c_char,
        _file: FileHandle,
    ) -> *mut crate::types::RawPackage {
        ptr::null_mut()
    }

    unsafe extern "C" fn noop_image(_file: FileHandle) -> *mut crate::types::RawImage {
        ptr::null_mut()
    }

    #[test]
    fn test_from_raw_null() {
        assert!(unsafe { Host::from_raw(ptr::null()) }.is_none());
    }

    #[test]
    fn test_registration_maps_status_codes() {
        let (state, host) = leak_table(1);
        assert!(host.register_package_loader("pak", noop_package).is_ok());
        assert_eq!(
            host.register_image_loader("dds", noop_image),
            Err(RegistrationError::Duplicate)
        );
        let driver = GraphicsDriver {
            priority: 0,
            create_device: None,
            destroy_device: None,
        };
        assert_eq!(
            host.register_graphics_mode("null", &driver),
            Err(RegistrationError::OutsideInit)
        );
        assert!(state.calls.lock().unwrap().contains(&"package pak".to_string()));
    }

    #[test]
    fn test_interior_nul_key_rejected_locally() {
        let (state, host) = leak_table(1);
        assert_eq!(
            host.register_package_loader("p\0k", noop_package),
            Err(RegistrationError::InvalidKey)
        );
        assert!(state.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_log_gated_on_minor_version() {
        let (state, host) = leak_table(0);
        assert!(!host.supports_minor(1));
        assert!(!host.log(LogLevelId(1), "ignored"));
        assert!(state.calls.lock().unwrap().is_empty());

        let (state, host) = leak_table(1);
        assert!(host.log(LogLevelId(1), "hello"));
        assert_eq!(state.calls.lock().unwrap().as_slice(), ["log 1 hello"]);
    }

    #[test]
    fn test_file_io_gated_on_minor_version() {
        let (_, host) = leak_table(0);
        let file = host.file(FileHandle(5));
        let mut buf = [0u8; 4];
        assert!(matches!(file.read(&mut buf), Err(FileError::Unsupported(_))));
        assert!(matches!(file.size(), Err(FileError::Unsupported(_))));
        // 1.0 entries still work
        assert_eq!(file.read_string(16), "hello");
    }

    #[test]
    fn test_open_file_closes_on_drop() {
        let (state, host) = leak_table(1);
        {
            let file = host.open_file("present.bin", true).unwrap();
            assert_eq!(file.handle(), FileHandle(5));
            assert_eq!(file.size().unwrap(), 128);
            assert_eq!(file.seek(SeekFrom::Start(10)).unwrap(), 10);
            assert!(matches!(file.seek(SeekFrom::End(0)), Err(FileError::Seek(5))));
        }
        assert!(state.calls.lock().unwrap().contains(&"close 5".to_string()));

        assert!(matches!(
            host.open_file("absent.bin", true),
            Err(FileError::Open(_))
        ));
    }

    #[test]
    fn test_read_exact_loops_over_short_reads() {
        let (_, host) = leak_table(1);
        let file = host.file(FileHandle(5));
        let mut buf = [0u8; 8];
        file.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0xab; 8]);
    }

    #[test]
    fn test_read_string_truncates_to_max_len() {
        let (_, host) = leak_table(1);
        assert_eq!(host.file(FileHandle(5)).read_string(3), "hel");
    }

    #[test]
    fn test_read_string_unbounded_request_is_capped() {
        let (_, host) = leak_table(1);
        assert_eq!(host.file(FileHandle(5)).read_string(usize::MAX), "hello");
    }

    #[test]
    fn test_report_error_and_log_level() {
        let (state, host) = leak_table(1);
        assert_eq!(host.add_log_level("dds", 0x00ff00, true), LogLevelId(7));
        host.report_error("bad header");
        let calls = state.calls.lock().unwrap();
        assert!(calls.contains(&"level dds".to_string()));
        assert!(calls.contains(&"error bad header".to_string()));
    }
}
