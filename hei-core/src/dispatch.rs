//! Dispatcher - routes file and backend requests to registered handlers
//!
//! The dispatcher keeps no state of its own. Every lookup reads the shared
//! capability tables, so registrations become visible immediately. Handler
//! pointers are copied out and the table lock released before a handler
//! runs, which lets handlers call back into the export table.

use std::ffi::CString;
use std::io;
use std::path::Path;
use std::sync::Arc;

use hei_plugin_api::{FileHandle, Image, Package};

use crate::error::DispatchError;
use crate::graphics::GraphicsBackend;
use crate::plugins::{CapabilityKind, CapabilityTables, normalize_key};
use crate::services::HostServices;

/// Lower-cased extension of `path`, without the dot.
pub fn extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(normalize_key)
}

/// Routes requests through the capability tables of one host.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    services: Arc<HostServices>,
}

impl Dispatcher {
    pub fn new(services: Arc<HostServices>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Arc<HostServices> {
        &self.services
    }

    /// Whether some module can read packages like `path`.
    pub fn supports_package(&self, path: &str) -> bool {
        extension(path).is_some_and(|ext| self.services.capabilities().packages.get(&ext).is_some())
    }

    /// Whether some module can decode images like `path`.
    pub fn supports_image(&self, path: &str) -> bool {
        extension(path).is_some_and(|ext| self.services.capabilities().images.get(&ext).is_some())
    }

    /// Open a package archive with the loader registered for its extension.
    pub fn open_package(&self, path: &str) -> Result<Package, DispatchError> {
        let loader = self.handler(path, CapabilityKind::PackageLoader, |t, ext| {
            t.packages.handler(ext)
        })?;
        let c_path = c_path(path)?;

        let package = self.with_open_file(path, |file| {
            // SAFETY: the loader belongs to a loaded module, `c_path` outlives
            // the call and `file` stays open until it returns. The module
            // hands over ownership of the returned record.
            unsafe { Package::from_raw(loader(c_path.as_ptr(), file)) }
        })?;

        tracing::debug!(path, entries = package.len(), "Package opened");
        Ok(package)
    }

    /// Decode an image with the loader registered for its extension.
    pub fn open_image(&self, path: &str) -> Result<Image, DispatchError> {
        let loader = self.handler(path, CapabilityKind::ImageLoader, |t, ext| {
            t.images.handler(ext)
        })?;

        let image = self.with_open_file(path, |file| {
            // SAFETY: as in `open_package`.
            unsafe { Image::from_raw(loader(file)) }
        })?;

        tracing::debug!(path, width = image.width, height = image.height, "Image opened");
        Ok(image)
    }

    /// Like [`open_package`](Self::open_package), but hands paths no module
    /// claims to `fallback` instead of failing.
    pub fn open_package_or_else<F>(&self, path: &str, fallback: F) -> Result<Package, DispatchError>
    where
        F: FnOnce(&str) -> Result<Package, DispatchError>,
    {
        match self.open_package(path) {
            Err(DispatchError::UnsupportedFormat { .. }) => {
                tracing::debug!(path, "No package loader, using fallback");
                fallback(path)
            }
            other => other,
        }
    }

    // ─── Graphics ────────────────────────────────────────────────────

    pub fn graphics_backend(&self, name: &str) -> Result<GraphicsBackend, DispatchError> {
        let unknown = || DispatchError::UnknownBackend {
            name: name.to_string(),
        };
        let key = normalize_key(name).ok_or_else(unknown)?;
        let tables = self.services.capabilities();
        let entry = tables.graphics.get(&key).ok_or_else(unknown)?;
        Ok(GraphicsBackend::new(
            key,
            entry.owner.name.to_string(),
            entry.handler,
        ))
    }

    /// All backends, highest priority first, then by name.
    pub fn graphics_backends(&self) -> Vec<GraphicsBackend> {
        let tables = self.services.capabilities();
        let mut backends: Vec<GraphicsBackend> = tables
            .graphics
            .iter()
            .map(|(name, entry)| {
                GraphicsBackend::new(name.to_string(), entry.owner.name.to_string(), entry.handler)
            })
            .collect();
        backends.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.name().cmp(b.name()))
        });
        backends
    }

    /// The backend with the highest priority, if any is registered.
    pub fn preferred_graphics_backend(&self) -> Option<GraphicsBackend> {
        self.graphics_backends().into_iter().next()
    }

    // ─── Internals ───────────────────────────────────────────────────

    /// Copy the handler for `path`'s extension out of the tables.
    fn handler<H>(
        &self,
        path: &str,
        kind: CapabilityKind,
        lookup: impl FnOnce(&CapabilityTables, &str) -> Option<H>,
    ) -> Result<H, DispatchError> {
        let unsupported = || {
            tracing::debug!(path, kind = %kind, "No handler for extension");
            DispatchError::UnsupportedFormat {
                kind,
                path: path.to_string(),
            }
        };
        let ext = extension(path).ok_or_else(unsupported)?;
        let tables = self.services.capabilities();
        lookup(&*tables, &ext).ok_or_else(unsupported)
    }

    /// Open `path`, run `load` with its handle, and close it again.
    fn with_open_file<T>(
        &self,
        path: &str,
        load: impl FnOnce(FileHandle) -> Option<T>,
    ) -> Result<T, DispatchError> {
        let file = self.services.open_file(path, true).map_err(|source| {
            tracing::debug!(path, error = %source, "Open failed");
            DispatchError::Open {
                path: path.to_string(),
                source,
            }
        })?;
        let _guard = CloseOnDrop {
            services: &self.services,
            file,
        };

        self.services.take_last_error();
        load(file).ok_or_else(|| {
            let detail = self.services.take_last_error();
            tracing::debug!(path, detail = ?detail, "Handler returned nothing");
            DispatchError::FormatParse {
                path: path.to_string(),
                detail,
            }
        })
    }
}

struct CloseOnDrop<'a> {
    services: &'a HostServices,
    file: FileHandle,
}

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        // Handlers may close the handle themselves.
        self.services.close_file(self.file);
    }
}

fn c_path(path: &str) -> Result<CString, DispatchError> {
    CString::new(path).map_err(|e| DispatchError::Open {
        path: path.to_string(),
        source: io::Error::new(io::ErrorKind::InvalidInput, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FileSystem;
    use crate::plugins::{Capability, ModuleId, ModuleOwner};
    use hei_plugin_api::{GraphicsDriver, RawPackage};
    use std::ffi::c_char;

    unsafe extern "C" fn null_loader(_path: *const c_char, _file: FileHandle) -> *mut RawPackage {
        std::ptr::null_mut()
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(HostServices::new(FileSystem::default()))
    }

    fn register(services: &HostServices, key: &str, capability: Capability) {
        services
            .begin_init(ModuleOwner {
                id: ModuleId(1),
                name: Arc::from("test"),
            })
            .unwrap();
        assert!(services.register(key, capability).is_ok());
        services.end_init();
    }

    fn driver(priority: i32) -> Capability {
        Capability::GraphicsBackend(GraphicsDriver {
            priority,
            create_device: None,
            destroy_device: None,
        })
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("id1/PAK0.PAK").as_deref(), Some("pak"));
        assert_eq!(extension("textures/sky.vtf").as_deref(), Some("vtf"));
        assert_eq!(extension("README"), None);
        assert_eq!(extension(".hidden"), None);
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let err = dispatcher().open_package("data.zzz").unwrap_err();
        assert!(matches!(
            err,
            DispatchError::UnsupportedFormat { kind: CapabilityKind::PackageLoader, .. }
        ));
    }

    #[test]
    fn test_no_extension_is_unsupported() {
        let err = dispatcher().open_image("Makefile").unwrap_err();
        assert!(matches!(err, DispatchError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let dispatcher = dispatcher();
        register(dispatcher.services(), "pak", Capability::PackageLoader(null_loader));
        let err = dispatcher.open_package("/nonexistent/pak0.pak").unwrap_err();
        assert!(matches!(err, DispatchError::Open { .. }));
    }

    #[test]
    fn test_fallback_only_for_unsupported() {
        let dispatcher = dispatcher();
        let package = dispatcher
            .open_package_or_else("game.zzz", |_| Ok(Package::default()))
            .unwrap();
        assert!(package.is_empty());

        register(dispatcher.services(), "pak", Capability::PackageLoader(null_loader));
        let err = dispatcher
            .open_package_or_else("/nonexistent/pak0.pak", |_| Ok(Package::default()))
            .unwrap_err();
        assert!(matches!(err, DispatchError::Open { .. }));
    }

    #[test]
    fn test_backends_sorted_by_priority() {
        let dispatcher = dispatcher();
        register(dispatcher.services(), "null", driver(0));
        register(dispatcher.services(), "vulkan", driver(10));
        register(dispatcher.services(), "gl", driver(10));

        let names: Vec<String> = dispatcher
            .graphics_backends()
            .iter()
            .map(|b| b.name().to_string())
            .collect();
        assert_eq!(names, ["gl", "vulkan", "null"]);
        assert_eq!(dispatcher.preferred_graphics_backend().unwrap().name(), "gl");
    }

    #[test]
    fn test_backend_lookup_is_case_insensitive() {
        let dispatcher = dispatcher();
        register(dispatcher.services(), "Vulkan", driver(1));
        assert_eq!(dispatcher.graphics_backend("VULKAN").unwrap().module(), "test");
        assert!(matches!(
            dispatcher.graphics_backend("metal"),
            Err(DispatchError::UnknownBackend { .. })
        ));
        assert!(dispatcher.preferred_graphics_backend().is_some());
    }

    #[test]
    fn test_no_backends() {
        assert!(dispatcher().preferred_graphics_backend().is_none());
    }
}
