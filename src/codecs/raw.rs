//! Lossless raw container for every [`PixelFormat`].
//!
//! ```text
//! 0   magic  89 52 41 57 0D 0A 1A 0A
//! 8   version (1)
//! 9   pixel format code
//! 10  reserved (2)
//! 12  width  u32 LE
//! 16  height u32 LE
//! 20  [indexed only] palette length u16 LE, reserved (2), RGBA entries
//!     pixel data in storage order
//! ```

use std::io::Write;

use alloc::vec::Vec;

use super::{check_encode, le_u16, le_u32, read_bytes, read_header};
use crate::codec::{DecodeOutput, FormatCodec};
use crate::info::{ImageInfo, ImageSaveInfo};
use crate::pixel::{BGR, BGRA, Gray, GrayAlpha, PixelFormat, Rgb, Rgb555, Rgba};
use crate::storage::ColorStorage;
use crate::stream::Stream;
use crate::{CodecError, ImageFormat, Limits};

const MAGIC: [u8; 8] = [0x89, b'R', b'A', b'W', 0x0D, 0x0A, 0x1A, 0x0A];
const VERSION: u8 = 1;
const HEADER_LEN: usize = 20;
const FORMAT: ImageFormat = ImageFormat::Raw;

pub(crate) struct RawCodec;

/// The fixed header for a `width`x`height` image.
pub(crate) fn encode_header(width: u32, height: u32, pixel_format: PixelFormat) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    out.push(pixel_format.code());
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out
}

/// Bytes each pixel occupies in the payload.
fn stored_size(pixel_format: PixelFormat) -> usize {
    match pixel_format {
        PixelFormat::Indexed1
        | PixelFormat::Indexed2
        | PixelFormat::Indexed4
        | PixelFormat::Indexed8
        | PixelFormat::Grayscale1 => 1,
        pf => pf.bits_per_pixel().div_ceil(8) as usize,
    }
}

fn u16s(data: &[u8]) -> impl Iterator<Item = u16> + '_ {
    data.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]]))
}

impl FormatCodec for RawCodec {
    fn format(&self) -> ImageFormat {
        FORMAT
    }

    fn detect(&self, stream: &mut Stream<'_>) -> Result<bool, CodecError> {
        Ok(match stream.peek_array::<9>()? {
            Some(h) => h[..8] == MAGIC && h[8] == VERSION,
            None => false,
        })
    }

    fn decode(&self, stream: &mut Stream<'_>, limits: &Limits) -> Result<DecodeOutput, CodecError> {
        let h = read_header::<HEADER_LEN>(stream, FORMAT)?;
        if h[..8] != MAGIC {
            return Err(CodecError::invalid(FORMAT, "bad magic"));
        }
        if h[8] != VERSION {
            return Err(CodecError::invalid(FORMAT, "unknown version"));
        }
        let pixel_format = PixelFormat::from_code(h[9])
            .ok_or_else(|| CodecError::invalid(FORMAT, "unknown pixel format code"))?;
        let (width, height) = (le_u32(&h, 12), le_u32(&h, 16));
        let count = limits.check_decode(width, height, pixel_format)?;
        let mut pixels = ColorStorage::allocate(pixel_format, count)?;

        if let Some(indexed) = pixels.indexed_mut() {
            let p = read_header::<4>(stream, FORMAT)?;
            let len = le_u16(&p, 0) as usize;
            if len > indexed.palette.len() {
                return Err(CodecError::invalid(FORMAT, "palette too long"));
            }
            let entries = read_bytes(stream, len * 4, FORMAT)?;
            for (dst, c) in indexed.palette.iter_mut().zip(entries.chunks_exact(4)) {
                *dst = Rgba::new(c[0], c[1], c[2], c[3]);
            }
        }

        let data = read_bytes(stream, count * stored_size(pixel_format), FORMAT)?;
        fill(&mut pixels, &data)?;

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
        check_encode(FORMAT, pixels, info)?;
        let pixel_format = pixels.pixel_format();
        let mut out = encode_header(info.width, info.height, pixel_format);
        if let Some(indexed) = pixels.indexed() {
            out.extend_from_slice(&(indexed.palette.len() as u16).to_le_bytes());
            out.extend_from_slice(&[0, 0]);
            for c in indexed.palette.iter() {
                out.extend_from_slice(&[c.r, c.g, c.b, c.a]);
            }
        }
        out.try_reserve(pixels.len() * stored_size(pixel_format))
            .map_err(|_| CodecError::Oom)?;
        serialize(pixels, &mut out);
        stream.write_all(&out)?;
        Ok(())
    }
}

/// Copy the payload into already-allocated storage of matching length.
fn fill(pixels: &mut ColorStorage, data: &[u8]) -> Result<(), CodecError> {
    match pixels {
        ColorStorage::Indexed1(p)
        | ColorStorage::Indexed2(p)
        | ColorStorage::Indexed4(p)
        | ColorStorage::Indexed8(p) => {
            let limit = p.palette.len();
            if data.iter().any(|&i| i as usize >= limit) {
                return Err(CodecError::invalid(FORMAT, "palette index out of range"));
            }
            p.indices.copy_from_slice(data);
        }
        ColorStorage::Grayscale1(p) => {
            if data.iter().any(|&v| v > 1) {
                return Err(CodecError::invalid(FORMAT, "1-bit sample out of range"));
            }
            p.copy_from_slice(data);
        }
        ColorStorage::Grayscale8(p) => {
            for (dst, &v) in p.iter_mut().zip(data) {
                *dst = Gray::new(v);
            }
        }
        ColorStorage::Grayscale16(p) => {
            for (dst, v) in p.iter_mut().zip(u16s(data)) {
                *dst = Gray::new(v);
            }
        }
        ColorStorage::Grayscale8Alpha(p) => {
            for (dst, c) in p.iter_mut().zip(data.chunks_exact(2)) {
                *dst = GrayAlpha::new(c[0], c[1]);
            }
        }
        ColorStorage::Grayscale16Alpha(p) => {
            for (dst, c) in p.iter_mut().zip(data.chunks_exact(4)) {
                *dst = GrayAlpha::new(le_u16(c, 0), le_u16(c, 2));
            }
        }
        ColorStorage::Rgb555(p) => {
            for (dst, v) in p.iter_mut().zip(u16s(data)) {
                *dst = Rgb555(v);
            }
        }
        ColorStorage::Rgb24(p) => bytemuck::cast_slice_mut::<Rgb<u8>, u8>(p).copy_from_slice(data),
        ColorStorage::Rgba32(p) => {
            bytemuck::cast_slice_mut::<Rgba<u8>, u8>(p).copy_from_slice(data);
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
                    a: c[3],
                };
            }
        }
        ColorStorage::Rgb48(p) => {
            for (dst, c) in p.iter_mut().zip(data.chunks_exact(6)) {
                *dst = Rgb::new(le_u16(c, 0), le_u16(c, 2), le_u16(c, 4));
            }
        }
        ColorStorage::Rgba64(p) => {
            for (dst, c) in p.iter_mut().zip(data.chunks_exact(8)) {
                *dst = Rgba::new(le_u16(c, 0), le_u16(c, 2), le_u16(c, 4), le_u16(c, 6));
            }
        }
    }
    Ok(())
}

fn put16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn serialize(pixels: &ColorStorage, out: &mut Vec<u8>) {
    match pixels {
        ColorStorage::Indexed1(p)
        | ColorStorage::Indexed2(p)
        | ColorStorage::Indexed4(p)
        | ColorStorage::Indexed8(p) => out.extend_from_slice(&p.indices),
        ColorStorage::Grayscale1(p) => out.extend(p.iter().map(|&v| u8::from(v != 0))),
        ColorStorage::Grayscale8(p) => out.extend(p.iter().map(|g| g.value())),
        ColorStorage::Grayscale16(p) => p.iter().for_each(|g| put16(out, g.value())),
        ColorStorage::Grayscale8Alpha(p) => {
            p.iter().for_each(|g| out.extend_from_slice(&[g.v, g.a]));
        }
        ColorStorage::Grayscale16Alpha(p) => p.iter().for_each(|g| {
            put16(out, g.v);
            put16(out, g.a);
        }),
        ColorStorage::Rgb555(p) => p.iter().for_each(|c| put16(out, c.0)),
        ColorStorage::Rgb24(p) => out.extend_from_slice(bytemuck::cast_slice::<Rgb<u8>, u8>(p)),
        ColorStorage::Rgba32(p) => out.extend_from_slice(bytemuck::cast_slice::<Rgba<u8>, u8>(p)),
        ColorStorage::Bgr24(p) => p.iter().for_each(|c| out.extend_from_slice(&[c.b, c.g, c.r])),
        ColorStorage::Bgra32(p) => {
            p.iter().for_each(|c| out.extend_from_slice(&[c.b, c.g, c.r, c.a]));
        }
        ColorStorage::Rgb48(p) => p.iter().for_each(|c| {
            put16(out, c.r);
            put16(out, c.g);
            put16(out, c.b);
        }),
        ColorStorage::Rgba64(p) => p.iter().for_each(|c| {
            put16(out, c.r);
            put16(out, c.g);
            put16(out, c.b);
            put16(out, c.a);
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncoderOptions;

    fn encode(pixels: &ColorStorage, width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        let options = EncoderOptions::Default;
        let info = ImageSaveInfo {
            width,
            height,
            options: &options,
        };
        RawCodec
            .encode(&mut Stream::from_vec(&mut out), pixels, &info)
            .unwrap();
        out
    }

    fn decode(data: &[u8]) -> Result<DecodeOutput, CodecError> {
        RawCodec.decode(&mut Stream::from_memory(data), &Limits::none())
    }

    #[test]
    fn two_by_two_rgba() {
        let mut data = encode_header(2, 2, PixelFormat::Rgba32);
        let colors = [[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255], [9, 8, 7, 6]];
        for c in colors {
            data.extend_from_slice(&c);
        }
        assert!(RawCodec.detect(&mut Stream::from_memory(&data)).unwrap());

        let out = decode(&data).unwrap();
        assert_eq!((out.info.width, out.info.height), (2, 2));
        assert_eq!(out.info.pixel_format, PixelFormat::Rgba32);
        let got: Vec<_> = out.pixels.iter().collect();
        let want: Vec<_> = colors.iter().map(|c| Rgba::new(c[0], c[1], c[2], c[3])).collect();
        assert_eq!(got, want);
    }

    #[test]
    fn indexed_keeps_palette_and_indices() {
        let mut pixels = ColorStorage::allocate(PixelFormat::Indexed2, 6).unwrap();
        let indexed = pixels.indexed_mut().unwrap();
        indexed.palette[3] = Rgba::new(1, 2, 3, 4);
        indexed.indices.copy_from_slice(&[0, 1, 2, 3, 3, 0]);

        let back = decode(&encode(&pixels, 3, 2)).unwrap();
        assert_eq!(back.pixels, pixels);
    }

    #[test]
    fn sixteen_bit_is_little_endian() {
        let mut pixels = ColorStorage::allocate(PixelFormat::Grayscale16, 1).unwrap();
        if let ColorStorage::Grayscale16(p) = &mut pixels {
            p[0] = Gray::new(0x1234);
        }
        let data = encode(&pixels, 1, 1);
        assert_eq!(&data[HEADER_LEN..], &[0x34, 0x12]);
        assert_eq!(decode(&data).unwrap().pixels, pixels);
    }

    #[test]
    fn nonzero_bilevel_samples_are_stored_as_one() {
        let pixels = ColorStorage::Grayscale1(alloc::vec![0, 255, 7, 1].into());
        let data = encode(&pixels, 2, 2);
        assert_eq!(&data[HEADER_LEN..], &[0, 1, 1, 1]);
        let back = decode(&data).unwrap();
        assert_eq!(back.pixels.iter().collect::<Vec<_>>(), pixels.iter().collect::<Vec<_>>());
    }

    #[test]
    fn rejects_bad_header_fields() {
        let mut data = encode_header(1, 1, PixelFormat::Grayscale8);
        data.push(0);
        data[9] = 0xEE;
        assert!(matches!(decode(&data), Err(CodecError::InvalidData { .. })));

        let mut data = encode_header(1, 1, PixelFormat::Grayscale8);
        data[8] = 2;
        assert!(!RawCodec.detect(&mut Stream::from_memory(&data)).unwrap());
    }

    #[test]
    fn truncated_payload_is_invalid_data() {
        let mut data = encode_header(4, 4, PixelFormat::Rgb24);
        data.extend_from_slice(&[0; 10]);
        assert!(matches!(decode(&data), Err(CodecError::InvalidData { .. })));
    }

    #[test]
    fn out_of_range_index_rejected() {
        let mut pixels = ColorStorage::allocate(PixelFormat::Indexed1, 2).unwrap();
        pixels.indexed_mut().unwrap().indices[1] = 1;
        let mut data = encode(&pixels, 2, 1);
        *data.last_mut().unwrap() = 5;
        assert!(matches!(decode(&data), Err(CodecError::InvalidData { .. })));
    }

    #[test]
    fn empty_image_is_allowed() {
        let pixels = ColorStorage::allocate(PixelFormat::Bgr24, 0).unwrap();
        let back = decode(&encode(&pixels, 0, 7)).unwrap();
        assert_eq!((back.info.width, back.info.height), (0, 7));
        assert!(back.pixels.is_empty());
    }
}
