//! Quake PACK archives
//!
//! Layout: `"PACK"`, directory offset (i32), directory length (i32), then at
//! the directory offset a run of 64-byte entries: a NUL-padded 56-byte name
//! followed by the entry's file position and length.

use hei_plugin_api::{FileHandle, Package, PackageEntry, RawPackage};
use std::ffi::{CStr, c_char};
use std::io::{Read, Seek, SeekFrom};
use std::ptr;

use crate::source::{HostReader, i32_le};

const MAGIC: &[u8; 4] = b"PACK";
const HEADER_LEN: usize = 12;
const ENTRY_LEN: usize = 64;
const NAME_LEN: usize = 56;

pub unsafe extern "C" fn load(path: *const c_char, file: FileHandle) -> *mut RawPackage {
    let path = if path.is_null() {
        String::from("<unnamed>")
    } else {
        // SAFETY: the host passes a NUL-terminated path valid for this call.
        unsafe { CStr::from_ptr(path) }.to_string_lossy().into_owned()
    };

    crate::with_host(|host| {
        let mut reader = HostReader(host.file(file));
        let package = read_package(&mut reader).map_err(|e| format!("{path}: {e}"))?;
        crate::log(host, &format!("{path}: {} entries", package.len()));
        Ok(package.into_raw())
    })
    .unwrap_or(ptr::null_mut())
}

pub fn read_package<R: Read + Seek>(reader: &mut R) -> Result<Package, String> {
    let mut header = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header)
        .map_err(|e| format!("short header: {e}"))?;
    if &header[..4] != MAGIC {
        return Err("not a PACK file".to_string());
    }

    let dir_offset = i32_le(&header, 4);
    let dir_len = i32_le(&header, 8);
    if dir_offset < 0 || dir_len < 0 || dir_len as usize % ENTRY_LEN != 0 {
        return Err(format!(
            "bad directory (offset {dir_offset}, length {dir_len})"
        ));
    }

    let mut directory = vec![0u8; dir_len as usize];
    reader
        .seek(SeekFrom::Start(dir_offset as u64))
        .and_then(|_| reader.read_exact(&mut directory))
        .map_err(|e| format!("truncated directory: {e}"))?;

    directory
        .chunks_exact(ENTRY_LEN)
        .map(parse_entry)
        .collect::<Result<Vec<_>, _>>()
        .map(Package::new)
}

fn parse_entry(raw: &[u8]) -> Result<PackageEntry, String> {
    let name_bytes = &raw[..NAME_LEN];
    let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
    let name = String::from_utf8_lossy(&name_bytes[..end]).into_owned();

    let offset = i32_le(raw, NAME_LEN);
    let size = i32_le(raw, NAME_LEN + 4);
    if offset < 0 || size < 0 {
        return Err(format!("bad entry '{name}'"));
    }
    Ok(PackageEntry {
        name,
        offset: offset as u64,
        size: size as u64,
    })
}
