//! Packages and images as produced by loaders.
//!
//! Modules build the owned [`Package`] / [`Image`] types and hand them to the
//! host with `into_raw()`. The raw records carry their own `release`
//! function so memory is always freed by the allocator that created it.

use serde::{Deserialize, Serialize};
use std::ffi::{CStr, CString, c_char};
use std::ptr;

/// Pixel layout of an [`Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    #[default]
    Unknown,
    R8,
    Rgb8,
    Rgba8,
    Bgra8,
    /// DXT1
    Bc1,
    /// DXT3
    Bc2,
    /// DXT5
    Bc3,
}

impl PixelFormat {
    pub fn to_raw(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::R8 => 1,
            Self::Rgb8 => 2,
            Self::Rgba8 => 3,
            Self::Bgra8 => 4,
            Self::Bc1 => 5,
            Self::Bc2 => 6,
            Self::Bc3 => 7,
        }
    }

    /// Unrecognised codes map to [`PixelFormat::Unknown`].
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::R8,
            2 => Self::Rgb8,
            3 => Self::Rgba8,
            4 => Self::Bgra8,
            5 => Self::Bc1,
            6 => Self::Bc2,
            7 => Self::Bc3,
            _ => Self::Unknown,
        }
    }

    pub fn is_compressed(self) -> bool {
        matches!(self, Self::Bc1 | Self::Bc2 | Self::Bc3)
    }
}

/// A decoded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    /// 1 for 2D images.
    pub depth: u32,
    pub mip_count: u32,
    pub format: PixelFormat,
    /// Pixel payload, all mip levels back to back.
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// One file stored inside a package archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub name: String,
    /// Byte offset of the entry inside the archive file.
    pub offset: u64,
    pub size: u64,
}

/// Table of contents of a package archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub entries: Vec<PackageEntry>,
}

impl Package {
    pub fn new(entries: Vec<PackageEntry>) -> Self {
        Self { entries }
    }

    /// Find an entry by name (case-insensitive, `\` and `/` are equivalent).
    pub fn find(&self, name: &str) -> Option<&PackageEntry> {
        let wanted = normalize_entry_name(name);
        self.entries
            .iter()
            .find(|e| normalize_entry_name(&e.name) == wanted)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all entry sizes.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

fn normalize_entry_name(name: &str) -> String {
    name.replace('\\', "/").to_ascii_lowercase()
}

// ─── Raw (FFI) representations ───────────────────────────────────────

#[repr(C)]
#[derive(Debug)]
pub struct RawPackageEntry {
    pub name: *const c_char,
    pub offset: u64,
    pub size: u64,
}

#[repr(C)]
#[derive(Debug)]
pub struct RawPackage {
    pub entries: *const RawPackageEntry,
    pub entry_count: usize,
    /// Frees this record. Called exactly once by the host.
    pub release: Option<unsafe extern "C" fn(package: *mut RawPackage)>,
}

#[repr(C)]
#[derive(Debug)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_count: u32,
    /// [`PixelFormat::to_raw`] code.
    pub format: u32,
    pub data: *const u8,
    pub data_len: usize,
    /// Frees this record. Called exactly once by the host.
    pub release: Option<unsafe extern "C" fn(image: *mut RawImage)>,
}

/// Backing storage for a `RawPackage` built by this crate. `raw` must stay
/// the first field so the two pointers are interchangeable.
#[repr(C)]
struct OwnedRawPackage {
    raw: RawPackage,
    entries: Vec<RawPackageEntry>,
    _names: Vec<CString>,
}

#[repr(C)]
struct OwnedRawImage {
    raw: RawImage,
    data: Vec<u8>,
}

unsafe extern "C" fn release_package(package: *mut RawPackage) {
    if !package.is_null() {
        // SAFETY: only ever installed on records created by `Package::into_raw`.
        drop(unsafe { Box::from_raw(package.cast::<OwnedRawPackage>()) });
    }
}

unsafe extern "C" fn release_image(image: *mut RawImage) {
    if !image.is_null() {
        // SAFETY: only ever installed on records created by `Image::into_raw`.
        drop(unsafe { Box::from_raw(image.cast::<OwnedRawImage>()) });
    }
}

impl Package {
    /// Hand this package across the ABI. The host releases it.
    pub fn into_raw(self) -> *mut RawPackage {
        let names: Vec<CString> = self
            .entries
            .iter()
            .map(|e| CString::new(e.name.replace('\0', "")).unwrap_or_default())
            .collect();
        let entries: Vec<RawPackageEntry> = self
            .entries
            .iter()
            .zip(&names)
            .map(|(e, name)| RawPackageEntry {
                name: name.as_ptr(),
                offset: e.offset,
                size: e.size,
            })
            .collect();

        let mut owned = Box::new(OwnedRawPackage {
            raw: RawPackage {
                entries: ptr::null(),
                entry_count: 0,
                release: Some(release_package),
            },
            entries,
            _names: names,
        });
        owned.raw.entries = owned.entries.as_ptr();
        owned.raw.entry_count = owned.entries.len();
        Box::into_raw(owned).cast::<RawPackage>()
    }

    /// Copy a raw package into an owned one and release the raw record.
    ///
    /// Returns `None` for a null pointer.
    ///
    /// # Safety
    ///
    /// `raw` must be null or a record produced by a loader that has not been
    /// released yet. It must not be used after this call.
    pub unsafe fn from_raw(raw: *mut RawPackage) -> Option<Self> {
        // SAFETY: caller guarantees `raw` is null or valid.
        let record = unsafe { raw.as_ref() }?;
        let entries = if record.entries.is_null() || record.entry_count == 0 {
            Vec::new()
        } else {
            // SAFETY: the loader promises `entry_count` valid entries.
            let slice = unsafe { std::slice::from_raw_parts(record.entries, record.entry_count) };
            slice
                .iter()
                .map(|e| PackageEntry {
                    name: if e.name.is_null() {
                        String::new()
                    } else {
                        // SAFETY: entry names are null-terminated strings owned by the record.
                        unsafe { CStr::from_ptr(e.name) }.to_string_lossy().into_owned()
                    },
                    offset: e.offset,
                    size: e.size,
                })
                .collect()
        };

        if let Some(release) = record.release {
            // SAFETY: the record came from the loader and is released once.
            unsafe { release(raw) };
        }
        Some(Self { entries })
    }
}

impl Image {
    /// Hand this image across the ABI. The host releases it.
    pub fn into_raw(self) -> *mut RawImage {
        let mut owned = Box::new(OwnedRawImage {
            raw: RawImage {
                width: self.width,
                height: self.height,
                depth: self.depth,
                mip_count: self.mip_count,
                format: self.format.to_raw(),
                data: ptr::null(),
                data_len: 0,
                release: Some(release_image),
            },
            data: self.data,
        });
        owned.raw.data = owned.data.as_ptr();
        owned.raw.data_len = owned.data.len();
        Box::into_raw(owned).cast::<RawImage>()
    }

    /// Copy a raw image into an owned one and release the raw record.
    ///
    /// # Safety
    ///
    /// Same contract as [`Package::from_raw`].
    pub unsafe fn from_raw(raw: *mut RawImage) -> Option<Self> {
        // SAFETY: caller guarantees `raw` is null or valid.
        let record = unsafe { raw.as_ref() }?;
        let data = if record.data.is_null() || record.data_len == 0 {
            Vec::new()
        } else {
            // SAFETY: the loader promises `data_len` readable bytes.
            unsafe { std::slice::from_raw_parts(record.data, record.data_len) }.to_vec()
        };
        let image = Self {
            width: record.width,
            height: record.height,
            depth: record.depth,
            mip_count: record.mip_count,
            format: PixelFormat::from_raw(record.format),
            data,
        };

        if let Some(release) = record.release {
            // SAFETY: the record came from the loader and is released once.
            unsafe { release(raw) };
        }
        Some(image)
    }
}
