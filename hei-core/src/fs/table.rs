//! Open-file table behind the `FileHandle`s given to modules

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use hei_plugin_api::FileHandle;

use super::FileSystem;

/// A file opened through the [`FileSystem`].
#[derive(Debug)]
pub struct VirtualFile {
    path: PathBuf,
    reader: BufReader<File>,
}

impl VirtualFile {
    pub(crate) fn new(path: PathBuf, file: File) -> Self {
        Self {
            path,
            reader: BufReader::new(file),
        }
    }

    /// Resolved on-disk location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }

    /// Read bytes up to a NUL terminator, EOF, or `max_len` bytes.
    ///
    /// The terminator is consumed but not returned.
    pub fn read_string(&mut self, max_len: usize) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        while out.len() < max_len {
            let available = self.reader.fill_buf()?;
            if available.is_empty() {
                break;
            }
            let wanted = (max_len - out.len()).min(available.len());
            match available[..wanted].iter().position(|&b| b == 0) {
                Some(nul) => {
                    out.extend_from_slice(&available[..nul]);
                    self.reader.consume(nul + 1);
                    break;
                }
                None => {
                    out.extend_from_slice(&available[..wanted]);
                    self.reader.consume(wanted);
                }
            }
        }
        Ok(out)
    }

    pub fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }

    pub fn size(&self) -> io::Result<u64> {
        Ok(self.reader.get_ref().metadata()?.len())
    }
}

/// Maps live handles to open files. Handles are never reused.
pub struct FileTable {
    fs: FileSystem,
    next: u64,
    open: HashMap<FileHandle, VirtualFile>,
}

impl FileTable {
    pub fn new(fs: FileSystem) -> Self {
        Self {
            fs,
            next: 1,
            open: HashMap::new(),
        }
    }

    pub fn filesystem(&self) -> &FileSystem {
        &self.fs
    }

    pub fn open(&mut self, path: &str, must_exist: bool) -> io::Result<FileHandle> {
        let file = self.fs.open(path, must_exist)?;
        let handle = FileHandle(self.next);
        self.next += 1;
        self.open.insert(handle, file);
        Ok(handle)
    }

    pub fn get_mut(&mut self, handle: FileHandle) -> Option<&mut VirtualFile> {
        self.open.get_mut(&handle)
    }

    /// Returns `false` if the handle was not open.
    pub fn close(&mut self, handle: FileHandle) -> bool {
        self.open.remove(&handle).is_some()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}
