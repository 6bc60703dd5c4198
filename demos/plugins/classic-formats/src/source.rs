//! `std::io` adapter over host file handles

use hei_plugin_api::{FileError, FileRef};
use std::io::{self, Read, Seek, SeekFrom};

pub struct HostReader(pub FileRef);

fn to_io(e: FileError) -> io::Error {
    match e {
        FileError::UnexpectedEof(_) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        other => io::Error::other(other),
    }
}

impl Read for HostReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf).map_err(to_io)
    }
}

impl Seek for HostReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.seek(pos).map_err(to_io)
    }
}

pub fn u32_le(bytes: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(word)
}

pub fn i32_le(bytes: &[u8], at: usize) -> i32 {
    u32_le(bytes, at) as i32
}
