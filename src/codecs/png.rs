//! PNG codec adapter using the png crate.
//!
//! Palettes, low bit depths and `tRNS` transparency are expanded on decode,
//! so decoded images are always 8- or 16-bit gray, gray+alpha, RGB or RGBA.

use std::io::BufReader;

use alloc::vec::Vec;

use super::{check_encode_nonempty, unsupported};
use crate::codec::{DecodeOutput, FormatCodec};
use crate::config::PngCompression;
use crate::info::{ImageInfo, ImageSaveInfo};
use crate::pixel::{Gray, GrayAlpha, PixelFormat, Rgb, Rgba};
use crate::storage::ColorStorage;
use crate::stream::Stream;
use crate::{CodecError, ImageFormat, Limits};

const FORMAT: ImageFormat = ImageFormat::Png;
const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

pub(crate) struct PngCodec;

fn codec_error<E>(e: E) -> CodecError
where
    E: core::error::Error + Send + Sync + 'static,
{
    CodecError::from_codec(FORMAT, e)
}

fn be16(c: &[u8]) -> u16 {
    u16::from_be_bytes([c[0], c[1]])
}

impl FormatCodec for PngCodec {
    fn format(&self) -> ImageFormat {
        FORMAT
    }

    fn detect(&self, stream: &mut Stream<'_>) -> Result<bool, CodecError> {
        Ok(stream.peek_array::<8>()? == Some(SIGNATURE))
    }

    fn decode(&self, stream: &mut Stream<'_>, limits: &Limits) -> Result<DecodeOutput, CodecError> {
        let mut decoder = png::Decoder::new(BufReader::new(stream));
        decoder.set_transformations(png::Transformations::EXPAND);
        let mut reader = decoder.read_info().map_err(codec_error)?;

        let (width, height) = {
            let info = reader.info();
            (info.width, info.height)
        };
        let (color_type, bit_depth) = reader.output_color_type();
        let wide = bit_depth == png::BitDepth::Sixteen;
        let pixel_format = match (color_type, wide) {
            (png::ColorType::Grayscale, false) => PixelFormat::Grayscale8,
            (png::ColorType::Grayscale, true) => PixelFormat::Grayscale16,
            (png::ColorType::GrayscaleAlpha, false) => PixelFormat::Grayscale8Alpha,
            (png::ColorType::GrayscaleAlpha, true) => PixelFormat::Grayscale16Alpha,
            (png::ColorType::Rgb, false) => PixelFormat::Rgb24,
            (png::ColorType::Rgb, true) => PixelFormat::Rgb48,
            (png::ColorType::Rgba, false) => PixelFormat::Rgba32,
            (png::ColorType::Rgba, true) => PixelFormat::Rgba64,
            (png::ColorType::Indexed, _) => {
                return Err(CodecError::invalid(FORMAT, "palette was not expanded"));
            }
        };
        let count = limits.check_decode(width, height, pixel_format)?;

        let buffer_size = reader
            .output_buffer_size()
            .ok_or_else(|| CodecError::InvalidInput("cannot determine PNG output buffer size".into()))?;
        let mut raw = Vec::new();
        raw.try_reserve_exact(buffer_size)
            .map_err(|_| CodecError::Oom)?;
        raw.resize(buffer_size, 0);
        let frame = reader.next_frame(&mut raw).map_err(codec_error)?;

        let line = frame.line_size;
        let row_bytes = width as usize * pixel_format.bits_per_pixel() as usize / 8;
        if line < row_bytes || raw.len() < line * height as usize {
            return Err(CodecError::invalid(FORMAT, "short frame"));
        }
        let mut pixels = ColorStorage::allocate(pixel_format, count)?;
        let w = width as usize;
        for (y, row) in raw.chunks_exact(line).take(height as usize).enumerate() {
            let row = &row[..row_bytes];
            let span = y * w..(y + 1) * w;
            match &mut pixels {
                ColorStorage::Grayscale8(p) => {
                    for (dst, &v) in p[span].iter_mut().zip(row) {
                        *dst = Gray::new(v);
                    }
                }
                ColorStorage::Grayscale16(p) => {
                    for (dst, c) in p[span].iter_mut().zip(row.chunks_exact(2)) {
                        *dst = Gray::new(be16(c));
                    }
                }
                ColorStorage::Grayscale8Alpha(p) => {
                    for (dst, c) in p[span].iter_mut().zip(row.chunks_exact(2)) {
                        *dst = GrayAlpha::new(c[0], c[1]);
                    }
                }
                ColorStorage::Grayscale16Alpha(p) => {
                    for (dst, c) in p[span].iter_mut().zip(row.chunks_exact(4)) {
                        *dst = GrayAlpha::new(be16(c), be16(&c[2..]));
                    }
                }
                ColorStorage::Rgb24(p) => {
                    bytemuck::cast_slice_mut::<Rgb<u8>, u8>(&mut p[span]).copy_from_slice(row);
                }
                ColorStorage::Rgb48(p) => {
                    for (dst, c) in p[span].iter_mut().zip(row.chunks_exact(6)) {
                        *dst = Rgb::new(be16(c), be16(&c[2..]), be16(&c[4..]));
                    }
                }
                ColorStorage::Rgba32(p) => {
                    bytemuck::cast_slice_mut::<Rgba<u8>, u8>(&mut p[span]).copy_from_slice(row);
                }
                ColorStorage::Rgba64(p) => {
                    for (dst, c) in p[span].iter_mut().zip(row.chunks_exact(8)) {
                        *dst = Rgba::new(be16(c), be16(&c[2..]), be16(&c[4..]), be16(&c[6..]));
                    }
                }
                _ => return Err(unsupported(FORMAT, pixel_format)),
            }
        }

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
        check_encode_nonempty(FORMAT, pixels, info)?;
        let (color, depth, data) = png_layout(pixels)?;

        let mut encoder = png::Encoder::new(&mut *stream, info.width, info.height);
        encoder.set_color(color);
        encoder.set_depth(depth);
        encoder.set_compression(match info.options.png().compression {
            PngCompression::Fast => png::Compression::Fast,
            PngCompression::Balanced => png::Compression::Balanced,
            PngCompression::High => png::Compression::High,
        });

        let mut writer = encoder.write_header().map_err(codec_error)?;
        writer.write_image_data(&data).map_err(codec_error)?;
        writer.finish().map_err(codec_error)?;
        Ok(())
    }
}

/// PNG color type, bit depth and big-endian sample bytes for `pixels`.
fn png_layout(pixels: &ColorStorage) -> Result<(png::ColorType, png::BitDepth, Vec<u8>), CodecError> {
    use png::BitDepth::{Eight, Sixteen};
    use png::ColorType;

    fn wide<const N: usize>(src: impl Iterator<Item = [u16; N]>) -> Vec<u8> {
        src.flat_map(|c| c.into_iter().flat_map(u16::to_be_bytes)).collect()
    }

    Ok(match pixels {
        ColorStorage::Grayscale8(p) => (ColorType::Grayscale, Eight, p.iter().map(|g| g.value()).collect()),
        ColorStorage::Grayscale16(p) => (ColorType::Grayscale, Sixteen, wide(p.iter().map(|g| [g.value()]))),
        ColorStorage::Grayscale8Alpha(p) => (
            ColorType::GrayscaleAlpha,
            Eight,
            p.iter().flat_map(|g| [g.v, g.a]).collect(),
        ),
        ColorStorage::Grayscale16Alpha(p) => (
            ColorType::GrayscaleAlpha,
            Sixteen,
            wide(p.iter().map(|g| [g.v, g.a])),
        ),
        ColorStorage::Rgb24(p) => (ColorType::Rgb, Eight, bytemuck::cast_slice::<Rgb<u8>, u8>(p).to_vec()),
        ColorStorage::Rgb48(p) => (ColorType::Rgb, Sixteen, wide(p.iter().map(|c| [c.r, c.g, c.b]))),
        ColorStorage::Rgba32(p) => (ColorType::Rgba, Eight, bytemuck::cast_slice::<Rgba<u8>, u8>(p).to_vec()),
        ColorStorage::Rgba64(p) => (
            ColorType::Rgba,
            Sixteen,
            wide(p.iter().map(|c| [c.r, c.g, c.b, c.a])),
        ),
        ColorStorage::Bgr24(p) => (ColorType::Rgb, Eight, p.iter().flat_map(|c| [c.r, c.g, c.b]).collect()),
        ColorStorage::Bgra32(p) => (
            ColorType::Rgba,
            Eight,
            p.iter().flat_map(|c| [c.r, c.g, c.b, c.a]).collect(),
        ),
        other => return Err(unsupported(FORMAT, other.pixel_format())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EncoderOptions, PngOptions};

    fn encode(pixels: &ColorStorage, width: u32, height: u32, options: EncoderOptions) -> Vec<u8> {
        let mut out = Vec::new();
        let info = ImageSaveInfo {
            width,
            height,
            options: &options,
        };
        PngCodec
            .encode(&mut Stream::from_vec(&mut out), pixels, &info)
            .unwrap();
        out
    }

    fn decode(data: &[u8]) -> Result<DecodeOutput, CodecError> {
        PngCodec.decode(&mut Stream::from_memory(data), &Limits::none())
    }

    #[test]
    fn rgba64_round_trip() {
        let pixels = ColorStorage::Rgba64(alloc::vec![
            Rgba::new(0, 1, 0x1234, 0xFFFF),
            Rgba::new(65535, 40000, 2, 3),
        ].into());
        let data = encode(&pixels, 1, 2, EncoderOptions::Default);
        assert!(PngCodec.detect(&mut Stream::from_memory(&data)).unwrap());
        let out = decode(&data).unwrap();
        assert_eq!(out.info.pixel_format, PixelFormat::Rgba64);
        assert_eq!(out.pixels, pixels);
    }

    #[test]
    fn gray_alpha_and_compression_levels() {
        let pixels = ColorStorage::Grayscale8Alpha(alloc::vec![GrayAlpha::new(10, 20); 64].into());
        for compression in [PngCompression::Fast, PngCompression::Balanced, PngCompression::High] {
            let data = encode(&pixels, 8, 8, PngOptions { compression }.into());
            assert_eq!(decode(&data).unwrap().pixels, pixels);
        }
    }

    #[test]
    fn bgr_is_written_as_rgb() {
        let pixels = ColorStorage::Bgr24(alloc::vec![crate::pixel::BGR { b: 1, g: 2, r: 3 }].into());
        let out = decode(&encode(&pixels, 1, 1, EncoderOptions::Default)).unwrap();
        assert_eq!(out.pixels, ColorStorage::Rgb24(alloc::vec![Rgb::new(3, 2, 1)].into()));
    }

    #[test]
    fn corrupt_data_is_a_codec_error() {
        let pixels = ColorStorage::Rgb24(alloc::vec![Rgb::new(1, 2, 3); 4].into());
        let mut data = encode(&pixels, 2, 2, EncoderOptions::Default);
        data.truncate(40);
        assert!(decode(&data).is_err());
        assert!(!PngCodec.detect(&mut Stream::from_memory(&data[1..])).unwrap());
    }

    #[test]
    fn options_for_other_formats_are_rejected() {
        let pixels = ColorStorage::Rgb24(alloc::vec![Rgb::new(1, 2, 3)].into());
        let options = EncoderOptions::Tga(Default::default());
        let info = ImageSaveInfo {
            width: 1,
            height: 1,
            options: &options,
        };
        let mut out = Vec::new();
        assert!(matches!(
            PngCodec.encode(&mut Stream::from_vec(&mut out), &pixels, &info),
            Err(CodecError::InvalidOptions { .. })
        ));
    }
}
