//! Module images - where a module's two entry points come from

use std::fmt;
use std::path::{Path, PathBuf};

use hei_plugin_api::{
    INITIALIZE_SYMBOL, InitializePluginFn, InterfaceVersion, ModuleVersion, QUERY_SYMBOL,
    QueryPluginFn,
};
use libloading::Library;
use serde::Serialize;

use super::error::PluginHostError;

/// Source of a module's entry points.
///
/// Owned exclusively by the registry. Dropping the image unmaps the module,
/// so every capability it registered must be gone by then.
pub trait ModuleImage: Send {
    /// Name the module is known by.
    fn name(&self) -> &str;

    /// On-disk location, for dynamically loaded modules.
    fn path(&self) -> Option<&Path>;

    fn query(&self) -> QueryPluginFn;

    fn initialize(&self) -> InitializePluginFn;
}

/// A shared library opened with `libloading`.
pub struct DynamicImage {
    name: String,
    path: PathBuf,
    query: QueryPluginFn,
    initialize: InitializePluginFn,
    /// Keeps the entry points above mapped.
    _library: Library,
}

impl DynamicImage {
    /// Map the library at `path` and resolve both entry points.
    pub fn open(path: &Path) -> Result<Self, PluginHostError> {
        let name = hei_paths::module_name(path);

        // SAFETY: loading runs the library's initializers. Modules come from
        // the configured plugin directories only.
        let library = unsafe { Library::new(path) }.map_err(|source| PluginHostError::ModuleLoad {
            path: path.to_path_buf(),
            source,
        })?;

        // SAFETY: the symbol types match the signatures `export_module!` emits.
        let query = unsafe { library.get::<QueryPluginFn>(QUERY_SYMBOL) }
            .map(|symbol| *symbol)
            .map_err(|_| missing(&name, QUERY_SYMBOL))?;
        let initialize = unsafe { library.get::<InitializePluginFn>(INITIALIZE_SYMBOL) }
            .map(|symbol| *symbol)
            .map_err(|_| missing(&name, INITIALIZE_SYMBOL))?;

        Ok(Self {
            name,
            path: path.to_path_buf(),
            query,
            initialize,
            _library: library,
        })
    }
}

impl ModuleImage for DynamicImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn query(&self) -> QueryPluginFn {
        self.query
    }

    fn initialize(&self) -> InitializePluginFn {
        self.initialize
    }
}

impl fmt::Debug for DynamicImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicImage")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Entry points of a module linked into the host binary.
#[derive(Debug, Clone, Copy)]
pub struct StaticModule {
    pub name: &'static str,
    pub query: QueryPluginFn,
    pub initialize: InitializePluginFn,
}

/// [`ModuleImage`] for a [`StaticModule`]. Nothing to unmap.
#[derive(Debug)]
pub struct StaticImage(pub StaticModule);

impl ModuleImage for StaticImage {
    fn name(&self) -> &str {
        self.0.name
    }

    fn path(&self) -> Option<&Path> {
        None
    }

    fn query(&self) -> QueryPluginFn {
        self.0.query
    }

    fn initialize(&self) -> InitializePluginFn {
        self.0.initialize
    }
}

/// Owned snapshot of a module's descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub description: String,
    pub version: ModuleVersion,
    pub interface: InterfaceVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Ask `image` for its descriptor and copy it out.
///
/// Querying has no side effects in the module and may be repeated.
pub fn query_info(image: &dyn ModuleImage, host: InterfaceVersion) -> Result<ModuleInfo, PluginHostError> {
    let invalid = |reason: &str| PluginHostError::InvalidDescriptor {
        module: image.name().to_string(),
        reason: reason.to_string(),
    };

    // SAFETY: `query` came from a live image and takes no pointers.
    let descriptor = unsafe { (image.query())(host) };
    // SAFETY: a non-null descriptor points at static data in the image.
    let descriptor = unsafe { descriptor.as_ref() }.ok_or_else(|| invalid("null descriptor"))?;
    // SAFETY: as above; the description is a static C string.
    let description = unsafe { descriptor.description_str() }
        .ok_or_else(|| invalid("description is null or not UTF-8"))?;

    Ok(ModuleInfo {
        name: image.name().to_string(),
        description: description.to_string(),
        version: descriptor.version,
        interface: descriptor.interface,
        path: image.path().map(Path::to_path_buf),
    })
}

fn missing(module: &str, symbol: &[u8]) -> PluginHostError {
    let symbol = symbol.strip_suffix(b"\0").unwrap_or(symbol);
    PluginHostError::MissingEntryPoint {
        module: module.to_string(),
        symbol: String::from_utf8_lossy(symbol).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hei_plugin_api::{ExportTable, ModuleDescriptor};
    use std::ffi::c_char;
    use std::ptr;
    use tempfile::TempDir;

    static GOOD: ModuleDescriptor = ModuleDescriptor {
        description: c"Quake PAK archives".as_ptr(),
        version: ModuleVersion::new(1, 2, 3),
        interface: InterfaceVersion::new(1, 0),
    };

    static UNNAMED: ModuleDescriptor = ModuleDescriptor {
        description: ptr::null::<c_char>(),
        version: ModuleVersion::new(0, 0, 1),
        interface: InterfaceVersion::new(1, 0),
    };

    unsafe extern "C" fn query_good(_host: InterfaceVersion) -> *const ModuleDescriptor {
        &GOOD
    }

    unsafe extern "C" fn query_null(_host: InterfaceVersion) -> *const ModuleDescriptor {
        ptr::null()
    }

    unsafe extern "C" fn query_unnamed(_host: InterfaceVersion) -> *const ModuleDescriptor {
        &UNNAMED
    }

    unsafe extern "C" fn init_nothing(_exports: *const ExportTable) {}

    fn image(query: QueryPluginFn) -> StaticImage {
        StaticImage(StaticModule {
            name: "pak",
            query,
            initialize: init_nothing,
        })
    }

    #[test]
    fn test_query_info_copies_descriptor() {
        let info = query_info(&image(query_good), InterfaceVersion::new(1, 1)).unwrap();
        assert_eq!(info.name, "pak");
        assert_eq!(info.description, "Quake PAK archives");
        assert_eq!(info.version.to_string(), "1.2.3");
        assert_eq!(info.interface, InterfaceVersion::new(1, 0));
        assert!(info.path.is_none());
    }

    #[test]
    fn test_query_is_repeatable() {
        let image = image(query_good);
        let host = InterfaceVersion::new(1, 1);
        assert_eq!(query_info(&image, host).unwrap(), query_info(&image, host).unwrap());
    }

    #[test]
    fn test_null_descriptor_is_invalid() {
        let err = query_info(&image(query_null), InterfaceVersion::new(1, 1)).unwrap_err();
        assert!(matches!(err, PluginHostError::InvalidDescriptor { ref reason, .. } if reason == "null descriptor"));
    }

    #[test]
    fn test_null_description_is_invalid() {
        let err = query_info(&image(query_unnamed), InterfaceVersion::new(1, 1)).unwrap_err();
        assert!(matches!(err, PluginHostError::InvalidDescriptor { .. }));
    }

    #[test]
    fn test_open_missing_library() {
        let dir = TempDir::new().unwrap();
        let err = DynamicImage::open(&dir.path().join("nope.so")).unwrap_err();
        assert!(matches!(err, PluginHostError::ModuleLoad { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_foreign_library_is_missing_entry_point() {
        let err = DynamicImage::open(Path::new("libm.so.6")).unwrap_err();
        assert!(matches!(
            err,
            PluginHostError::MissingEntryPoint { ref module, ref symbol }
                if module == "m" && symbol == "hei_query_plugin"
        ));
    }

    #[test]
    fn test_missing_entry_point_names_symbol() {
        let err = missing("bf", INITIALIZE_SYMBOL);
        assert!(matches!(
            err,
            PluginHostError::MissingEntryPoint { ref symbol, .. } if symbol == "hei_initialize_plugin"
        ));
    }
}
