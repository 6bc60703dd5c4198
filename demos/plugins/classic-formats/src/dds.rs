//! DirectDraw Surface textures
//!
//! Only the fixed 128-byte header is interpreted. Everything after it is
//! handed to the host untouched as the pixel payload.

use hei_plugin_api::{FileHandle, Image, PixelFormat, RawImage};
use std::io::Read;
use std::ptr;

use crate::source::{HostReader, u32_le};

const MAGIC: &[u8; 4] = b"DDS ";
const HEADER_LEN: usize = 128;
const HEADER_SIZE: u32 = 124;

const DDPF_ALPHAPIXELS: u32 = 0x1;
const DDPF_FOURCC: u32 = 0x4;
const DDPF_RGB: u32 = 0x40;
const DDPF_LUMINANCE: u32 = 0x2_0000;

pub unsafe extern "C" fn load(file: FileHandle) -> *mut RawImage {
    crate::with_host(|host| {
        let mut reader = HostReader(host.file(file));
        let image = read_image(&mut reader)?;
        crate::log(
            host,
            &format!(
                "dds {}x{} {:?}, {} mips",
                image.width, image.height, image.format, image.mip_count
            ),
        );
        Ok(image.into_raw())
    })
    .unwrap_or(ptr::null_mut())
}

pub fn read_image<R: Read>(reader: &mut R) -> Result<Image, String> {
    let mut header = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header)
        .map_err(|e| format!("short DDS header: {e}"))?;
    let mut image = parse_header(&header)?;
    reader
        .read_to_end(&mut image.data)
        .map_err(|e| format!("reading DDS payload: {e}"))?;
    Ok(image)
}

fn parse_header(header: &[u8; HEADER_LEN]) -> Result<Image, String> {
    if &header[..4] != MAGIC {
        return Err("not a DDS file".to_string());
    }
    let size = u32_le(header, 4);
    if size != HEADER_SIZE {
        return Err(format!("unexpected DDS header size {size}"));
    }

    let height = u32_le(header, 12);
    let width = u32_le(header, 16);
    if width == 0 || height == 0 {
        return Err(format!("empty DDS surface {width}x{height}"));
    }

    Ok(Image {
        width,
        height,
        depth: u32_le(header, 24).max(1),
        mip_count: u32_le(header, 28).max(1),
        format: pixel_format(header),
        data: Vec::new(),
    })
}

fn pixel_format(header: &[u8]) -> PixelFormat {
    let flags = u32_le(header, 80);
    if flags & DDPF_FOURCC != 0 {
        return match &header[84..88] {
            b"DXT1" => PixelFormat::Bc1,
            b"DXT3" => PixelFormat::Bc2,
            b"DXT5" => PixelFormat::Bc3,
            _ => PixelFormat::Unknown,
        };
    }

    let bits = u32_le(header, 88);
    let red_mask = u32_le(header, 92);
    match bits {
        32 if flags & DDPF_RGB != 0 && red_mask == 0x00ff_0000 => PixelFormat::Bgra8,
        32 if flags & DDPF_RGB != 0 && red_mask == 0x0000_00ff => PixelFormat::Rgba8,
        24 if flags & DDPF_RGB != 0 && flags & DDPF_ALPHAPIXELS == 0 => PixelFormat::Rgb8,
        8 if flags & DDPF_LUMINANCE != 0 => PixelFormat::R8,
        _ => PixelFormat::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header(width: u32, height: u32, mips: u32) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[..4].copy_from_slice(MAGIC);
        bytes[4..8].copy_from_slice(&HEADER_SIZE.to_le_bytes());
        bytes[12..16].copy_from_slice(&height.to_le_bytes());
        bytes[16..20].copy_from_slice(&width.to_le_bytes());
        bytes[28..32].copy_from_slice(&mips.to_le_bytes());
        bytes
    }

    fn with_fourcc(mut bytes: Vec<u8>, fourcc: &[u8; 4]) -> Vec<u8> {
        bytes[80..84].copy_from_slice(&DDPF_FOURCC.to_le_bytes());
        bytes[84..88].copy_from_slice(fourcc);
        bytes
    }

    fn with_rgb(mut bytes: Vec<u8>, bits: u32, red_mask: u32) -> Vec<u8> {
        bytes[80..84].copy_from_slice(&DDPF_RGB.to_le_bytes());
        bytes[88..92].copy_from_slice(&bits.to_le_bytes());
        bytes[92..96].copy_from_slice(&red_mask.to_le_bytes());
        bytes
    }

    #[test]
    fn test_dxt5_with_payload() {
        let mut bytes = with_fourcc(header(256, 128, 9), b"DXT5");
        bytes.extend_from_slice(&[0xaa; 16]);

        let image = read_image(&mut Cursor::new(bytes)).unwrap();
        assert_eq!((image.width, image.height), (256, 128));
        assert_eq!(image.depth, 1);
        assert_eq!(image.mip_count, 9);
        assert_eq!(image.format, PixelFormat::Bc3);
        assert_eq!(image.data.len(), 16);
    }

    #[test]
    fn test_block_compressed_variants() {
        for (fourcc, format) in [(b"DXT1", PixelFormat::Bc1), (b"DXT3", PixelFormat::Bc2)] {
            let image = read_image(&mut Cursor::new(with_fourcc(header(4, 4, 1), fourcc))).unwrap();
            assert_eq!(image.format, format);
        }
        let image = read_image(&mut Cursor::new(with_fourcc(header(4, 4, 1), b"ATI2"))).unwrap();
        assert_eq!(image.format, PixelFormat::Unknown);
    }

    #[test]
    fn test_uncompressed_channel_order() {
        let bgra = with_rgb(header(2, 2, 0), 32, 0x00ff_0000);
        let rgba = with_rgb(header(2, 2, 0), 32, 0x0000_00ff);

        let image = read_image(&mut Cursor::new(bgra)).unwrap();
        assert_eq!(image.format, PixelFormat::Bgra8);
        assert_eq!(image.mip_count, 1);
        assert_eq!(
            read_image(&mut Cursor::new(rgba)).unwrap().format,
            PixelFormat::Rgba8
        );
    }

    #[test]
    fn test_rejects_bad_magic_and_size() {
        let mut bytes = header(4, 4, 1);
        bytes[..4].copy_from_slice(b"DDSX");
        assert!(read_image(&mut Cursor::new(bytes)).unwrap_err().contains("not a DDS"));

        let mut bytes = header(4, 4, 1);
        bytes[4..8].copy_from_slice(&100u32.to_le_bytes());
        assert!(read_image(&mut Cursor::new(bytes)).unwrap_err().contains("header size"));
    }

    #[test]
    fn test_rejects_truncated_header() {
        let bytes = header(4, 4, 1)[..64].to_vec();
        assert!(read_image(&mut Cursor::new(bytes)).unwrap_err().contains("short"));
    }

    #[test]
    fn test_rejects_empty_surface() {
        let err = read_image(&mut Cursor::new(header(0, 4, 1))).unwrap_err();
        assert!(err.contains("empty"));
    }
}
