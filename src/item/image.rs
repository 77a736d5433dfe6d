//! Image dimension sniffing from PNG, GIF and JPEG headers

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Reads `(width, height)` from the header of a PNG, GIF or JPEG image
///
/// Returns `None` for other formats and for truncated or malformed headers.
pub fn sniff_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.starts_with(PNG_SIGNATURE) {
        png_dimensions(bytes)
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        gif_dimensions(bytes)
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        jpeg_dimensions(bytes)
    } else {
        None
    }
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*bytes.get(at)?, *bytes.get(at + 1)?]))
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let slice = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// IHDR is always the first chunk: width and height follow its type tag
fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.get(12..16)? != b"IHDR" {
        return None;
    }
    Some((be_u32(bytes, 16)?, be_u32(bytes, 20)?))
}

/// Logical screen descriptor, little-endian
fn gif_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let width = u16::from_le_bytes([*bytes.get(6)?, *bytes.get(7)?]);
    let height = u16::from_le_bytes([*bytes.get(8)?, *bytes.get(9)?]);
    Some((u32::from(width), u32::from(height)))
}

/// Walks the marker segments up to the first start-of-frame
fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let mut at = 2;
    loop {
        if *bytes.get(at)? != 0xFF {
            return None;
        }
        let marker = *bytes.get(at + 1)?;
        match marker {
            // fill byte
            0xFF => at += 1,
            // standalone markers carry no length
            0x01 | 0xD0..=0xD8 => at += 2,
            // SOF0..SOF15, except DHT (C4), JPG (C8) and DAC (CC)
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                let height = be_u16(bytes, at + 5)?;
                let width = be_u16(bytes, at + 7)?;
                return Some((u32::from(width), u32::from(height)));
            }
            // start of scan or end of image before any frame header
            0xDA | 0xD9 => return None,
            _ => at += 2 + usize::from(be_u16(bytes, at + 2)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes
    }

    #[test]
    fn test_png_dimensions() {
        assert_eq!(sniff_dimensions(&png(640, 480)), Some((640, 480)));
    }

    #[test]
    fn test_gif_dimensions() {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&300u16.to_le_bytes());
        bytes.extend_from_slice(&200u16.to_le_bytes());
        assert_eq!(sniff_dimensions(&bytes), Some((300, 200)));
    }

    #[test]
    fn test_jpeg_dimensions_after_app0() {
        let mut bytes = vec![0xFF, 0xD8];
        // APP0 segment with a 16-byte length
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        bytes.extend_from_slice(&[0u8; 14]);
        // SOF0: length, precision, height, width, components
        bytes.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        bytes.extend_from_slice(&720u16.to_be_bytes());
        bytes.extend_from_slice(&1280u16.to_be_bytes());
        bytes.push(3);
        assert_eq!(sniff_dimensions(&bytes), Some((1280, 720)));
    }

    #[test]
    fn test_truncated_headers() {
        assert_eq!(sniff_dimensions(&png(1, 1)[..18]), None);
        assert_eq!(sniff_dimensions(b"GIF89a\x01"), None);
        assert_eq!(sniff_dimensions(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), None);
    }

    #[test]
    fn test_unknown_format() {
        assert_eq!(sniff_dimensions(b"RIFF\x00\x00\x00\x00WEBP"), None);
        assert_eq!(sniff_dimensions(&[]), None);
    }
}
