//! Binary framebuffer decoder: 52-byte little-endian header parse plus a
//! streaming RGBA/RGB reformatter. Grounded on
//! `adb/common/host_transport/framebuffer.py` and
//! `adb/framebuffer/rgbtransform.py`.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{AdbError, AdbResult};

pub const HEADER_LEN: usize = 52;

/// Parsed `framebuffer:` header. Field order matches the wire layout
/// exactly (13 little-endian u32 values).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub bpp: u32,
    pub size: u32,
    pub width: u32,
    pub height: u32,
    pub red_offset: u32,
    pub red_length: u32,
    pub blue_offset: u32,
    pub blue_length: u32,
    pub green_offset: u32,
    pub green_length: u32,
    pub alpha_offset: u32,
    pub alpha_length: u32,
}

impl Header {
    /// Parse the 52-byte little-endian header. `version == 16` (the legacy
    /// 5:6:5 format) is rejected as unsupported.
    pub fn parse(bytes: &[u8]) -> AdbResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(AdbError::ConfigError(format!(
                "framebuffer header too short: {} bytes",
                bytes.len()
            )));
        }
        let mut fields = [0u32; 13];
        for (i, field) in fields.iter_mut().enumerate() {
            *field = LittleEndian::read_u32(&bytes[i * 4..i * 4 + 4]);
        }
        let header = Header {
            version: fields[0],
            bpp: fields[1],
            size: fields[2],
            width: fields[3],
            height: fields[4],
            red_offset: fields[5],
            red_length: fields[6],
            blue_offset: fields[7],
            blue_length: fields[8],
            green_offset: fields[9],
            green_length: fields[10],
            alpha_offset: fields[11],
            alpha_length: fields[12],
        };
        if header.version == 16 {
            return Err(AdbError::ConfigError(
                "old-style raw images (version 16) are not supported".to_string(),
            ));
        }
        Ok(header)
    }

    /// Derived pixel format: `"bgr"`/`"rgb"`, suffixed with `"a"` when alpha
    /// is present.
    pub fn format(&self) -> String {
        let mut format = if self.blue_offset == 0 { "bgr" } else { "rgb" }.to_string();
        if self.bpp == 32 || self.alpha_length != 0 {
            format.push('a');
        }
        format
    }
}

/// Streaming 24/32bpp → planar RGB transform with a rolling carry buffer for
/// a chunk that ends mid-pixel.
pub struct RgbTransform {
    pixel_bytes: usize,
    r_pos: usize,
    g_pos: usize,
    b_pos: usize,
    carry: Vec<u8>,
}

impl RgbTransform {
    pub fn new(header: &Header) -> AdbResult<Self> {
        if header.bpp != 24 && header.bpp != 32 {
            return Err(AdbError::ConfigError(format!(
                "unsupported bpp for RGB transform: {}",
                header.bpp
            )));
        }
        Ok(Self {
            pixel_bytes: (header.bpp / 8) as usize,
            r_pos: (header.red_offset / 8) as usize,
            g_pos: (header.green_offset / 8) as usize,
            b_pos: (header.blue_offset / 8) as usize,
            carry: Vec::new(),
        })
    }

    /// Feed a chunk of raw pixel bytes, returning the R,G,B triples that
    /// could be fully decoded. Any trailing partial pixel is retained and
    /// concatenated with the next call's input.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<u8> {
        self.carry.extend_from_slice(chunk);
        let mut out = Vec::with_capacity(self.carry.len());
        let mut cursor = 0;
        while self.carry.len() - cursor >= self.pixel_bytes {
            let pixel = &self.carry[cursor..cursor + self.pixel_bytes];
            out.push(pixel[self.r_pos]);
            out.push(pixel[self.g_pos]);
            out.push(pixel[self.b_pos]);
            cursor += self.pixel_bytes;
        }
        self.carry.drain(..cursor);
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn header_bytes(fields: [u32; 13]) -> Vec<u8> {
        let mut out = vec![0u8; 52];
        for (i, f) in fields.iter().enumerate() {
            LittleEndian::write_u32(&mut out[i * 4..i * 4 + 4], *f);
        }
        out
    }

    #[test]
    fn parses_rgba_header() {
        // version bpp size width height r_off r_len b_off b_len g_off g_len a_off a_len
        let bytes = header_bytes([1, 32, 0, 100, 200, 0, 8, 16, 8, 8, 8, 24, 8]);
        let header = Header::parse(&bytes).unwrap();
        assert_eq!(header.width, 100);
        assert_eq!(header.height, 200);
        assert_eq!(header.format(), "rgba");
    }

    #[test]
    fn derives_bgr_format_when_blue_offset_zero() {
        let bytes = header_bytes([1, 24, 0, 1, 1, 16, 8, 0, 8, 8, 8, 0, 0]);
        let header = Header::parse(&bytes).unwrap();
        assert_eq!(header.format(), "bgr");
    }

    #[test]
    fn rejects_legacy_version_16() {
        let bytes = header_bytes([16, 16, 0, 1, 1, 11, 5, 0, 5, 5, 6, 0, 0]);
        let err = Header::parse(&bytes).unwrap_err();
        assert!(matches!(err, AdbError::ConfigError(_)));
    }

    #[test]
    fn rgb_transform_handles_split_pixel_across_chunks() {
        let header = Header {
            version: 1,
            bpp: 32,
            size: 0,
            width: 1,
            height: 2,
            red_offset: 0,
            red_length: 8,
            blue_offset: 16,
            blue_length: 8,
            green_offset: 8,
            green_length: 8,
            alpha_offset: 24,
            alpha_length: 8,
        };
        let mut t = RgbTransform::new(&header).unwrap();
        let pixel1 = [10u8, 20, 30, 255];
        let pixel2 = [40u8, 50, 60, 255];
        let mut first = pixel1.to_vec();
        first.extend_from_slice(&pixel2[..2]);
        let out1 = t.push(&first);
        assert_eq!(out1, vec![10, 20, 30]);
        let out2 = t.push(&pixel2[2..]);
        assert_eq!(out2, vec![40, 50, 60]);
    }
}
