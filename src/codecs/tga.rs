//! Truevision TGA codec.
//!
//! TGA has no magic number, so detection is a plausibility check over the
//! 18-byte header. The codec is registered last for that reason.

use std::io::{Read, Write};

use alloc::vec::Vec;

use super::{check_encode_nonempty, le_u16, read_header, unsupported};
use crate::codec::{DecodeOutput, FormatCodec};
use crate::info::{ImageInfo, ImageSaveInfo};
use crate::pixel::{BGR, BGRA, Gray, GrayAlpha, PixelFormat, Rgb555, Rgba};
use crate::storage::ColorStorage;
use crate::stream::Stream;
use crate::{CodecError, ImageFormat, Limits};

const FORMAT: ImageFormat = ImageFormat::Tga;
const HEADER_LEN: usize = 18;
const FOOTER_SIGNATURE: &[u8; 18] = b"TRUEVISION-XFILE.\0";

const TYPE_COLOR_MAPPED: u8 = 1;
const TYPE_TRUE_COLOR: u8 = 2;
const TYPE_GRAY: u8 = 3;
const RLE_FLAG: u8 = 8;

const DESC_RIGHT_TO_LEFT: u8 = 0x10;
const DESC_TOP_DOWN: u8 = 0x20;
const MAX_PACKET: usize = 128;

pub(crate) struct TgaCodec;

#[derive(Debug)]
struct Header {
    id_len: u8,
    map_type: u8,
    image_type: u8,
    map_first: u16,
    map_len: u16,
    map_bits: u8,
    width: u16,
    height: u16,
    depth: u8,
    descriptor: u8,
}

impl Header {
    fn from_bytes(h: &[u8; HEADER_LEN]) -> Self {
        Header {
            id_len: h[0],
            map_type: h[1],
            image_type: h[2],
            map_first: le_u16(h, 3),
            map_len: le_u16(h, 5),
            map_bits: h[7],
            width: le_u16(h, 12),
            height: le_u16(h, 14),
            depth: h[16],
            descriptor: h[17],
        }
    }

    fn base_type(&self) -> u8 {
        self.image_type & !RLE_FLAG
    }

    fn rle(&self) -> bool {
        self.image_type & RLE_FLAG != 0
    }

    fn alpha_bits(&self) -> u8 {
        self.descriptor & 0x0F
    }

    /// The layout the pixel data decodes to, if the header is coherent.
    fn pixel_format(&self) -> Option<PixelFormat> {
        if self.map_type > 1
            || !matches!(self.image_type, 1 | 2 | 3 | 9 | 10 | 11)
            || self.width == 0
            || self.height == 0
            // Interleaved storage is obsolete.
            || self.descriptor & 0xC0 != 0
        {
            return None;
        }
        if self.map_type == 1 && !matches!(self.map_bits, 15 | 16 | 24 | 32) {
            return None;
        }
        match (self.base_type(), self.depth) {
            (TYPE_COLOR_MAPPED, 8) if self.map_type == 1 && self.map_len > 0 => {
                Some(PixelFormat::Indexed8)
            }
            (TYPE_TRUE_COLOR, 15 | 16) => Some(PixelFormat::Rgb555),
            (TYPE_TRUE_COLOR, 24) => Some(PixelFormat::Bgr24),
            (TYPE_TRUE_COLOR, 32) => Some(PixelFormat::Bgra32),
            (TYPE_GRAY, 8) => Some(PixelFormat::Grayscale8),
            (TYPE_GRAY, 16) => Some(PixelFormat::Grayscale8Alpha),
            _ => None,
        }
    }

    fn pixel_bytes(&self) -> usize {
        usize::from(self.depth).div_ceil(8)
    }
}

fn map_entry(c: &[u8]) -> Rgba<u8> {
    match c.len() {
        2 => Rgb555(le_u16(c, 0) & 0x7FFF).to_rgba8(),
        3 => Rgba::new(c[2], c[1], c[0], 255),
        _ => Rgba::new(c[2], c[1], c[0], c[3]),
    }
}

/// Expand RLE packets into `out`; packets may cross scanlines.
fn unpack_rle(data: &[u8], pb: usize, out: &mut [u8]) -> Result<(), CodecError> {
    let truncated = || CodecError::invalid(FORMAT, "truncated data");
    let mut src = 0;
    let mut filled = 0;
    while filled < out.len() {
        let packet = *data.get(src).ok_or_else(truncated)?;
        src += 1;
        let count = (usize::from(packet & 0x7F) + 1) * pb;
        let end = (filled + count).min(out.len());
        if packet & 0x80 != 0 {
            let px = data.get(src..src + pb).ok_or_else(truncated)?;
            src += pb;
            for dst in out[filled..end].chunks_mut(pb) {
                dst.copy_from_slice(&px[..dst.len()]);
            }
        } else {
            let raw = data.get(src..src + count).ok_or_else(truncated)?;
            src += count;
            out[filled..end].copy_from_slice(&raw[..end - filled]);
        }
        filled = end;
    }
    Ok(())
}

/// Run-length encode one scanline of `pb`-byte pixels.
fn pack_rle(line: &[u8], pb: usize, out: &mut Vec<u8>) {
    let px: Vec<&[u8]> = line.chunks_exact(pb).collect();
    let mut i = 0;
    while i < px.len() {
        let run = px[i..]
            .iter()
            .take(MAX_PACKET)
            .take_while(|&&p| p == px[i])
            .count();
        if run > 1 {
            out.push(0x80 | (run - 1) as u8);
            out.extend_from_slice(px[i]);
            i += run;
            continue;
        }
        let start = i;
        while i < px.len() && i - start < MAX_PACKET && (i + 1 == px.len() || px[i] != px[i + 1]) {
            i += 1;
        }
        out.push((i - start - 1) as u8);
        for p in &px[start..i] {
            out.extend_from_slice(p);
        }
    }
}

/// Reorder file-order pixel bytes to top-left origin in place.
fn orient(data: &mut [u8], row_len: usize, pb: usize, top_down: bool, right_to_left: bool) {
    if !top_down {
        data.reverse();
        // Reversing the buffer flips both axes; undo the horizontal flip.
        for row in data.chunks_exact_mut(row_len) {
            row.reverse();
        }
    }
    if right_to_left {
        for row in data.chunks_exact_mut(row_len) {
            row.reverse();
            for p in row.chunks_exact_mut(pb) {
                p.reverse();
            }
        }
    }
}

impl FormatCodec for TgaCodec {
    fn format(&self) -> ImageFormat {
        FORMAT
    }

    fn detect(&self, stream: &mut Stream<'_>) -> Result<bool, CodecError> {
        Ok(match stream.peek_array::<HEADER_LEN>()? {
            Some(h) => Header::from_bytes(&h).pixel_format().is_some(),
            None => false,
        })
    }

    fn decode(&self, stream: &mut Stream<'_>, limits: &Limits) -> Result<DecodeOutput, CodecError> {
        let header = Header::from_bytes(&read_header::<HEADER_LEN>(stream, FORMAT)?);
        let pixel_format = header
            .pixel_format()
            .ok_or_else(|| CodecError::invalid(FORMAT, "unsupported or inconsistent header"))?;
        let (width, height) = (u32::from(header.width), u32::from(header.height));
        let count = limits.check_decode(width, height, pixel_format)?;
        let mut pixels = ColorStorage::allocate(pixel_format, count)?;

        let mut body = Vec::new();
        stream.read_to_end(&mut body)?;
        let truncated = || CodecError::invalid(FORMAT, "truncated data");
        let map_start = usize::from(header.id_len);
        let map_bytes = if header.map_type == 1 {
            usize::from(header.map_len) * usize::from(header.map_bits).div_ceil(8)
        } else {
            0
        };
        let map = body
            .get(map_start..map_start + map_bytes)
            .ok_or_else(truncated)?;
        if let Some(indexed) = pixels.indexed_mut() {
            let entry = usize::from(header.map_bits).div_ceil(8);
            let first = usize::from(header.map_first);
            for (i, c) in map.chunks_exact(entry).enumerate() {
                if let Some(dst) = indexed.palette.get_mut(first + i) {
                    *dst = map_entry(c);
                }
            }
        }

        let pb = header.pixel_bytes();
        let data_start = map_start + map_bytes;
        let mut data = Vec::new();
        data.try_reserve_exact(count * pb)
            .map_err(|_| CodecError::Oom)?;
        if header.rle() {
            data.resize(count * pb, 0);
            unpack_rle(&body[data_start..], pb, &mut data)?;
        } else {
            let raw = body
                .get(data_start..data_start + count * pb)
                .ok_or_else(truncated)?;
            data.extend_from_slice(raw);
        }
        orient(
            &mut data,
            usize::from(header.width) * pb,
            pb,
            header.descriptor & DESC_TOP_DOWN != 0,
            header.descriptor & DESC_RIGHT_TO_LEFT != 0,
        );

        let opaque = header.alpha_bits() == 0;
        match &mut pixels {
            ColorStorage::Indexed8(p) => p.indices.copy_from_slice(&data),
            ColorStorage::Grayscale8(p) => {
                for (dst, &v) in p.iter_mut().zip(&data) {
                    *dst = Gray::new(v);
                }
            }
            ColorStorage::Grayscale8Alpha(p) => {
                for (dst, c) in p.iter_mut().zip(data.chunks_exact(2)) {
                    *dst = GrayAlpha::new(c[0], if opaque { 255 } else { c[1] });
                }
            }
            ColorStorage::Rgb555(p) => {
                for (dst, c) in p.iter_mut().zip(data.chunks_exact(2)) {
                    *dst = Rgb555(le_u16(c, 0) & 0x7FFF);
                }
            }
            ColorStorage::Bgr24(p) => {
                for (dst, c) in p.iter_mut().zip(data.chunks_exact(3)) {
                    *dst = BGR {
                        b: c[0],
                        g: c[1],
                        r: c[2],
                    };
                }
            }
            ColorStorage::Bgra32(p) => {
                for (dst, c) in p.iter_mut().zip(data.chunks_exact(4)) {
                    *dst = BGRA {
                        b: c[0],
                        g: c[1],
                        r: c[2],
                        a: if opaque { 255 } else { c[3] },
                    };
                }
            }
            _ => return Err(unsupported(FORMAT, pixel_format)),
        }

        tracing::trace!(?header, "tga decoded");
        Ok(DecodeOutput {
            info: ImageInfo {
                width,
                height,
                pixel_format,
            },
            pixels,
        })
    }

    fn encode(
        &self,
        stream: &mut Stream<'_>,
        pixels: &ColorStorage,
        info: &ImageSaveInfo<'_>,
    ) -> Result<(), CodecError> {
        let (w, h) = check_encode_nonempty(FORMAT, pixels, info)?;
        let width = u16::try_from(w).map_err(|_| CodecError::LimitExceeded("width too large for TGA"))?;
        let height =
            u16::try_from(h).map_err(|_| CodecError::LimitExceeded("height too large for TGA"))?;
        let rle = info.options.tga().rle;

        // (image type, depth, alpha bits, pixel bytes in file order)
        let (image_type, depth, alpha_bits, data): (u8, u8, u8, Vec<u8>) = match pixels {
            ColorStorage::Indexed8(p) => (TYPE_COLOR_MAPPED, 8, 0, p.indices.to_vec()),
            ColorStorage::Grayscale8(p) => (TYPE_GRAY, 8, 0, p.iter().map(|g| g.value()).collect()),
            ColorStorage::Grayscale8Alpha(p) => {
                (TYPE_GRAY, 16, 8, p.iter().flat_map(|g| [g.v, g.a]).collect())
            }
            ColorStorage::Rgb555(p) => {
                (TYPE_TRUE_COLOR, 16, 0, p.iter().flat_map(|c| (c.0 & 0x7FFF).to_le_bytes()).collect())
            }
            ColorStorage::Bgr24(p) => {
                (TYPE_TRUE_COLOR, 24, 0, p.iter().flat_map(|c| [c.b, c.g, c.r]).collect())
            }
            ColorStorage::Rgb24(p) => {
                (TYPE_TRUE_COLOR, 24, 0, p.iter().flat_map(|c| [c.b, c.g, c.r]).collect())
            }
            ColorStorage::Bgra32(p) => (
                TYPE_TRUE_COLOR,
                32,
                8,
                p.iter().flat_map(|c| [c.b, c.g, c.r, c.a]).collect(),
            ),
            ColorStorage::Rgba32(p) => (
                TYPE_TRUE_COLOR,
                32,
                8,
                p.iter().flat_map(|c| [c.b, c.g, c.r, c.a]).collect(),
            ),
            other => return Err(unsupported(FORMAT, other.pixel_format())),
        };

        let palette = pixels.palette();
        let mut out = Vec::with_capacity(HEADER_LEN + data.len());
        out.push(0);
        out.push(u8::from(palette.is_some()));
        out.push(if rle { image_type | RLE_FLAG } else { image_type });
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&(palette.map_or(0, <[_]>::len) as u16).to_le_bytes());
        out.push(if palette.is_some() { 32 } else { 0 });
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.push(depth);
        out.push(DESC_TOP_DOWN | alpha_bits);
        if let Some(palette) = palette {
            for c in palette {
                out.extend_from_slice(&[c.b, c.g, c.r, c.a]);
            }
        }

        let pb = usize::from(depth) / 8;
        if rle {
            for line in data.chunks_exact(w * pb) {
                pack_rle(line, pb, &mut out);
            }
        } else {
            out.extend_from_slice(&data);
        }

        // TGA 2.0 footer without extension or developer areas.
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(FOOTER_SIGNATURE);
        stream.write_all(&out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EncoderOptions, TgaOptions};

    fn encode(pixels: &ColorStorage, width: u32, height: u32, rle: bool) -> Vec<u8> {
        let mut out = Vec::new();
        let options = EncoderOptions::Tga(TgaOptions { rle });
        let info = ImageSaveInfo {
            width,
            height,
            options: &options,
        };
        TgaCodec
            .encode(&mut Stream::from_vec(&mut out), pixels, &info)
            .unwrap();
        out
    }

    fn decode(data: &[u8]) -> Result<DecodeOutput, CodecError> {
        TgaCodec.decode(&mut Stream::from_memory(data), &Limits::none())
    }

    fn gradient(format: PixelFormat, count: usize) -> ColorStorage {
        let mut pixels = ColorStorage::allocate(format, count).unwrap();
        match &mut pixels {
            ColorStorage::Bgra32(p) => {
                for (i, px) in p.iter_mut().enumerate() {
                    // Pairs of equal pixels exercise both packet kinds.
                    let v = (i / 2) as u8;
                    *px = BGRA {
                        b: v,
                        g: 2 * v,
                        r: 3,
                        a: 255 - v,
                    };
                }
            }
            ColorStorage::Rgb555(p) => {
                for (i, px) in p.iter_mut().enumerate() {
                    *px = Rgb555::new(i as u8, 31 - i as u8, 7);
                }
            }
            ColorStorage::Indexed8(p) => {
                for (i, c) in p.palette.iter_mut().enumerate() {
                    *c = Rgba::new(i as u8, 0, 0, 128);
                }
                for (i, v) in p.indices.iter_mut().enumerate() {
                    *v = (i * 3) as u8;
                }
            }
            _ => {}
        }
        pixels
    }

    #[test]
    fn round_trips_with_and_without_rle() {
        for format in [PixelFormat::Bgra32, PixelFormat::Rgb555, PixelFormat::Indexed8] {
            let pixels = gradient(format, 20);
            for rle in [false, true] {
                let data = encode(&pixels, 5, 4, rle);
                assert!(TgaCodec.detect(&mut Stream::from_memory(&data)).unwrap());
                let out = decode(&data).unwrap();
                assert_eq!(out.pixels, pixels, "{format:?} rle={rle}");
            }
        }
    }

    #[test]
    fn rle_packets() {
        let mut out = Vec::new();
        pack_rle(&[1, 1, 1, 2, 3, 3], 1, &mut out);
        assert_eq!(out, [0x82, 1, 0x00, 2, 0x81, 3]);

        let mut back = [0u8; 6];
        unpack_rle(&out, 1, &mut back).unwrap();
        assert_eq!(back, [1, 1, 1, 2, 3, 3]);
    }

    #[test]
    fn bottom_up_and_right_to_left_origins() {
        // 2x2 gray image stored bottom-up, right-to-left.
        let mut data = alloc::vec![0, 0, TYPE_GRAY, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 2, 0, 8];
        data.push(DESC_RIGHT_TO_LEFT);
        data.extend_from_slice(&[4, 3, 2, 1]);
        let out = decode(&data).unwrap();
        assert_eq!(
            out.pixels,
            ColorStorage::Grayscale8(alloc::vec![Gray::new(1), Gray::new(2), Gray::new(3), Gray::new(4)].into())
        );
    }

    #[test]
    fn plausibility_checks() {
        assert!(!TgaCodec.detect(&mut Stream::from_memory(b"not an image at all")).unwrap());
        assert!(!TgaCodec.detect(&mut Stream::from_memory(&[0; 18])).unwrap());
        assert!(!TgaCodec.detect(&mut Stream::from_memory(&[0; 5])).unwrap());
    }

    #[test]
    fn thirty_two_bit_without_alpha_bits_is_opaque() {
        let pixels = gradient(PixelFormat::Bgra32, 4);
        let mut data = encode(&pixels, 2, 2, false);
        data[17] = DESC_TOP_DOWN;
        let out = decode(&data).unwrap();
        assert!(out.pixels.iter().all(|c| c.a == 255));
    }

    #[test]
    fn truncated_rle_is_invalid() {
        let data = encode(&gradient(PixelFormat::Bgra32, 20), 5, 4, true);
        assert!(matches!(
            decode(&data[..HEADER_LEN + 3]),
            Err(CodecError::InvalidData { .. })
        ));
    }
}
