//! Windows bitmap (BMP/DIB) codec.
//!
//! Decodes uncompressed 1/4/8-bit palettized, 24-bit and 32-bit bitmaps
//! (OS/2 core, `BITMAPINFOHEADER` and V2-V5 headers), bottom-up or top-down.
//! Encodes palettized images with a `BITMAPINFOHEADER` and 32-bit images with
//! a V4 header carrying an alpha mask.

use std::io::{Read, Seek, SeekFrom, Write};

use alloc::vec::Vec;

use super::{
    check_encode_nonempty, le_i32, le_u16, le_u32, read_bytes, read_header, unpack_row,
    unsupported,
};
use crate::codec::{DecodeOutput, FormatCodec};
use crate::info::{ImageInfo, ImageSaveInfo};
use crate::pixel::{BGR, BGRA, PixelFormat, Rgba};
use crate::storage::{ColorStorage, Indexed};
use crate::stream::Stream;
use crate::{CodecError, ImageFormat, Limits};

const FORMAT: ImageFormat = ImageFormat::Bmp;
const FILE_HEADER_LEN: usize = 14;
const CORE_HEADER_LEN: u32 = 12;
const INFO_HEADER_LEN: u32 = 40;
const V4_HEADER_LEN: u32 = 108;
const DIB_HEADER_LENS: [u32; 6] = [12, 40, 52, 56, 108, 124];

const BI_RGB: u32 = 0;
const BI_BITFIELDS: u32 = 3;
const BI_ALPHABITFIELDS: u32 = 6;

/// `LCS_sRGB`
const SRGB_TAG: u32 = 0x7352_4742;

pub(crate) struct BmpCodec;

/// Parsed file and DIB headers.
#[derive(Debug)]
struct Header {
    data_offset: u64,
    dib_len: u32,
    width: u32,
    height: u32,
    top_down: bool,
    bpp: u16,
    compression: u32,
    colors_used: u32,
    masks: [u32; 4],
}

impl Header {
    fn parse(stream: &mut Stream<'_>) -> Result<Self, CodecError> {
        let fh = read_header::<{ FILE_HEADER_LEN + 4 }>(stream, FORMAT)?;
        if &fh[..2] != b"BM" {
            return Err(CodecError::invalid(FORMAT, "missing BM signature"));
        }
        let dib_len = le_u32(&fh, 14);
        if !DIB_HEADER_LENS.contains(&dib_len) {
            return Err(CodecError::invalid(FORMAT, "unknown DIB header size"));
        }
        let data_offset = u64::from(le_u32(&fh, 10));

        // Offsets into `dib` are relative to the start of the DIB header.
        let mut dib = [0u8; 124];
        stream
            .read_exact(&mut dib[4..dib_len as usize])
            .map_err(super::read_error(FORMAT))?;

        if dib_len == CORE_HEADER_LEN {
            let (width, height) = (le_u16(&dib, 4), le_u16(&dib, 6));
            if width == 0 || height == 0 {
                return Err(CodecError::invalid(FORMAT, "bad dimensions"));
            }
            return Ok(Header {
                data_offset,
                dib_len,
                width: u32::from(width),
                height: u32::from(height),
                top_down: false,
                bpp: le_u16(&dib, 10),
                compression: BI_RGB,
                colors_used: 0,
                masks: [0; 4],
            });
        }

        let width = le_i32(&dib, 4);
        let height = le_i32(&dib, 8);
        if width <= 0 || height == 0 || height == i32::MIN {
            return Err(CodecError::invalid(FORMAT, "bad dimensions"));
        }
        let compression = le_u32(&dib, 16);
        let mut masks = [0u32; 4];
        if dib_len >= 52 {
            masks[..3].copy_from_slice(&[le_u32(&dib, 40), le_u32(&dib, 44), le_u32(&dib, 48)]);
        }
        if dib_len >= 56 {
            masks[3] = le_u32(&dib, 52);
        }
        if dib_len == INFO_HEADER_LEN && matches!(compression, BI_BITFIELDS | BI_ALPHABITFIELDS) {
            let n = if compression == BI_ALPHABITFIELDS { 4 } else { 3 };
            let extra = read_bytes(stream, n * 4, FORMAT)?;
            for (i, mask) in masks.iter_mut().take(n).enumerate() {
                *mask = le_u32(&extra, i * 4);
            }
        }

        Ok(Header {
            data_offset,
            dib_len,
            width: width as u32,
            height: height.unsigned_abs(),
            top_down: height < 0,
            bpp: le_u16(&dib, 14),
            compression,
            colors_used: le_u32(&dib, 32),
            masks,
        })
    }

    fn pixel_format(&self) -> Result<PixelFormat, CodecError> {
        let bitfields = matches!(self.compression, BI_BITFIELDS | BI_ALPHABITFIELDS);
        match (self.bpp, self.compression) {
            (1, BI_RGB) => Ok(PixelFormat::Indexed1),
            (4, BI_RGB) => Ok(PixelFormat::Indexed4),
            (8, BI_RGB) => Ok(PixelFormat::Indexed8),
            (24, BI_RGB) => Ok(PixelFormat::Bgr24),
            (32, BI_RGB) => Ok(PixelFormat::Bgra32),
            (32, _) if bitfields => Ok(PixelFormat::Bgra32),
            (16, BI_RGB) => Err(unsupported(FORMAT, PixelFormat::Rgb555)),
            (16, _) if bitfields => Err(unsupported(FORMAT, PixelFormat::Rgb555)),
            (1 | 4 | 8, _) => Err(CodecError::invalid(FORMAT, "RLE compression is not supported")),
            _ => Err(CodecError::invalid(FORMAT, "unsupported bit depth or compression")),
        }
    }

    fn row_stride(&self) -> usize {
        (self.width as usize * self.bpp as usize).div_ceil(32) * 4
    }
}

/// Extracts one channel from a packed 32-bit value and scales it to 8 bits.
#[derive(Clone, Copy)]
struct Channel {
    mask: u32,
    shift: u32,
    max: u32,
}

impl Channel {
    fn new(mask: u32) -> Self {
        let shift = if mask == 0 { 0 } else { mask.trailing_zeros() };
        Channel {
            mask,
            shift,
            max: mask >> shift,
        }
    }

    fn get(self, v: u32, missing: u8) -> u8 {
        let raw = (v & self.mask) >> self.shift;
        match self.max {
            0 => missing,
            255 => raw as u8,
            max => (u64::from(raw) * 255 / u64::from(max)) as u8,
        }
    }
}

impl FormatCodec for BmpCodec {
    fn format(&self) -> ImageFormat {
        FORMAT
    }

    fn detect(&self, stream: &mut Stream<'_>) -> Result<bool, CodecError> {
        Ok(match stream.peek_array::<{ FILE_HEADER_LEN + 4 }>()? {
            Some(h) => &h[..2] == b"BM" && DIB_HEADER_LENS.contains(&le_u32(&h, 14)),
            None => false,
        })
    }

    fn decode(&self, stream: &mut Stream<'_>, limits: &Limits) -> Result<DecodeOutput, CodecError> {
        let header = Header::parse(stream)?;
        let pixel_format = header.pixel_format()?;
        let count = limits.check_decode(header.width, header.height, pixel_format)?;
        let mut pixels = ColorStorage::allocate(pixel_format, count)?;

        if let Some(indexed) = pixels.indexed_mut() {
            read_palette(stream, &header, indexed)?;
        }

        stream.seek(SeekFrom::Start(header.data_offset))?;
        let stride = header.row_stride();
        let data = read_bytes(stream, stride * header.height as usize, FORMAT)?;
        let (w, h) = (header.width as usize, header.height as usize);
        // File row `i` is image row `y`.
        let image_row = |i: usize| if header.top_down { i } else { h - 1 - i };

        match &mut pixels {
            ColorStorage::Indexed1(p) | ColorStorage::Indexed4(p) | ColorStorage::Indexed8(p) => {
                for (i, row) in data.chunks_exact(stride).enumerate() {
                    let y = image_row(i);
                    unpack_row(row, header.bpp as usize, &mut p.indices[y * w..][..w]);
                }
            }
            ColorStorage::Bgr24(p) => {
                for (i, row) in data.chunks_exact(stride).enumerate() {
                    let y = image_row(i);
                    for (dst, c) in p[y * w..][..w].iter_mut().zip(row.chunks_exact(3)) {
                        *dst = BGR {
                            b: c[0],
                            g: c[1],
                            r: c[2],
                        };
                    }
                }
            }
            ColorStorage::Bgra32(p) => {
                let masks = if header.compression == BI_RGB {
                    [0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0]
                } else {
                    header.masks
                };
                let [r, g, b, a] = masks.map(Channel::new);
                for (i, row) in data.chunks_exact(stride).enumerate() {
                    let y = image_row(i);
                    for (dst, c) in p[y * w..][..w].iter_mut().zip(row.chunks_exact(4)) {
                        let v = le_u32(c, 0);
                        *dst = BGRA {
                            b: b.get(v, 0),
                            g: g.get(v, 0),
                            r: r.get(v, 0),
                            a: a.get(v, 255),
                        };
                    }
                }
            }
            _ => return Err(unsupported(FORMAT, pixel_format)),
        }

        tracing::trace!(?header, "bmp decoded");
        Ok(DecodeOutput {
            info: ImageInfo {
                width: header.width,
                height: header.height,
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
        let out = match pixels {
            ColorStorage::Indexed1(p) => encode_indexed(p, w, h, 1),
            ColorStorage::Indexed4(p) => encode_indexed(p, w, h, 4),
            ColorStorage::Indexed8(p) => encode_indexed(p, w, h, 8),
            ColorStorage::Bgr24(p) => encode_rows(p, w, h, 24, |c, out| {
                out.extend_from_slice(&[c.b, c.g, c.r]);
            }),
            ColorStorage::Rgb24(p) => encode_rows(p, w, h, 24, |c, out| {
                out.extend_from_slice(&[c.b, c.g, c.r]);
            }),
            ColorStorage::Bgra32(p) => encode_rows(p, w, h, 32, |c, out| {
                out.extend_from_slice(&[c.b, c.g, c.r, c.a]);
            }),
            ColorStorage::Rgba32(p) => encode_rows(p, w, h, 32, |c, out| {
                out.extend_from_slice(&[c.b, c.g, c.r, c.a]);
            }),
            other => return Err(unsupported(FORMAT, other.pixel_format())),
        }?;
        stream.write_all(&out)?;
        Ok(())
    }
}

fn read_palette(
    stream: &mut Stream<'_>,
    header: &Header,
    indexed: &mut Indexed,
) -> Result<(), CodecError> {
    let capacity = indexed.palette.len();
    let entries = match header.colors_used as usize {
        0 => capacity,
        n => n.min(capacity),
    };
    let entry_len = if header.dib_len == CORE_HEADER_LEN { 3 } else { 4 };
    let data = read_bytes(stream, entries * entry_len, FORMAT)?;
    for (dst, c) in indexed.palette.iter_mut().zip(data.chunks_exact(entry_len)) {
        *dst = Rgba::new(c[2], c[1], c[0], 255);
    }
    Ok(())
}

/// File header plus a DIB header of `dib_len` bytes; returns the buffer with
/// room reserved for `palette_len` entries and the pixel rows.
fn headers(w: usize, h: usize, bpp: u16, dib_len: u32, palette_len: usize) -> Result<Vec<u8>, CodecError> {
    let stride = (w * bpp as usize).div_ceil(32) * 4;
    let image_len = stride
        .checked_mul(h)
        .ok_or(CodecError::LimitExceeded("image too large for BMP"))?;
    let offset = FILE_HEADER_LEN + dib_len as usize + palette_len * 4;
    let file_len = u32::try_from(offset + image_len)
        .map_err(|_| CodecError::LimitExceeded("image too large for BMP"))?;
    let width = i32::try_from(w).map_err(|_| CodecError::LimitExceeded("width too large for BMP"))?;
    let height = i32::try_from(h).map_err(|_| CodecError::LimitExceeded("height too large for BMP"))?;

    let mut out = Vec::new();
    out.try_reserve_exact(file_len as usize)
        .map_err(|_| CodecError::Oom)?;
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&file_len.to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&(offset as u32).to_le_bytes());

    let compression = if dib_len == V4_HEADER_LEN { BI_BITFIELDS } else { BI_RGB };
    out.extend_from_slice(&dib_len.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&bpp.to_le_bytes());
    out.extend_from_slice(&compression.to_le_bytes());
    out.extend_from_slice(&(image_len as u32).to_le_bytes());
    // 2835 px/m = 72 dpi
    out.extend_from_slice(&2835u32.to_le_bytes());
    out.extend_from_slice(&2835u32.to_le_bytes());
    out.extend_from_slice(&(palette_len as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    if dib_len == V4_HEADER_LEN {
        for mask in [0x00FF_0000u32, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000] {
            out.extend_from_slice(&mask.to_le_bytes());
        }
        out.extend_from_slice(&SRGB_TAG.to_le_bytes());
        // Endpoints and gamma are unused for sRGB.
        out.extend_from_slice(&[0; 48]);
    }
    Ok(out)
}

fn encode_indexed(p: &Indexed, w: usize, h: usize, bits: usize) -> Result<Vec<u8>, CodecError> {
    let palette_len = p.palette.len();
    let mut out = headers(w, h, bits as u16, INFO_HEADER_LEN, palette_len)?;
    for c in p.palette.iter() {
        out.extend_from_slice(&[c.b, c.g, c.r, 0]);
    }
    let stride = (w * bits).div_ceil(32) * 4;
    let mut row = alloc::vec![0u8; stride];
    for src in p.indices.chunks_exact(w).rev() {
        super::pack_row(src, bits, &mut row);
        out.extend_from_slice(&row);
    }
    Ok(out)
}

/// Bottom-up rows of `w` pixels, each padded to four bytes.
fn encode_rows<T: Copy>(
    pixels: &[T],
    w: usize,
    h: usize,
    bpp: u16,
    put: impl Fn(T, &mut Vec<u8>),
) -> Result<Vec<u8>, CodecError> {
    let dib_len = if bpp == 32 { V4_HEADER_LEN } else { INFO_HEADER_LEN };
    let mut out = headers(w, h, bpp, dib_len, 0)?;
    let row_len = w * bpp as usize / 8;
    let padding = row_len.div_ceil(4) * 4 - row_len;
    for row in pixels.chunks_exact(w).rev() {
        for &px in row {
            put(px, &mut out);
        }
        out.extend(core::iter::repeat_n(0u8, padding));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncoderOptions;
    use crate::pixel::Rgb;

    fn encode(pixels: &ColorStorage, width: u32, height: u32) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        let options = EncoderOptions::Default;
        let info = ImageSaveInfo {
            width,
            height,
            options: &options,
        };
        BmpCodec.encode(&mut Stream::from_vec(&mut out), pixels, &info)?;
        Ok(out)
    }

    fn decode(data: &[u8]) -> Result<DecodeOutput, CodecError> {
        BmpCodec.decode(&mut Stream::from_memory(data), &Limits::none())
    }

    #[test]
    fn bgr24_rows_are_padded_and_bottom_up() {
        let mut pixels = ColorStorage::allocate(PixelFormat::Bgr24, 2).unwrap();
        if let ColorStorage::Bgr24(p) = &mut pixels {
            p[0] = BGR { b: 1, g: 2, r: 3 };
            p[1] = BGR { b: 4, g: 5, r: 6 };
        }
        let data = encode(&pixels, 1, 2).unwrap();
        assert_eq!(data.len(), 54 + 2 * 4);
        // Last image row comes first.
        assert_eq!(&data[54..62], &[4, 5, 6, 0, 1, 2, 3, 0]);
        assert!(BmpCodec.detect(&mut Stream::from_memory(&data)).unwrap());
        assert_eq!(decode(&data).unwrap().pixels, pixels);
    }

    #[test]
    fn bgra32_keeps_alpha() {
        let mut pixels = ColorStorage::allocate(PixelFormat::Bgra32, 3).unwrap();
        if let ColorStorage::Bgra32(p) = &mut pixels {
            p[1] = BGRA {
                b: 10,
                g: 20,
                r: 30,
                a: 40,
            };
        }
        let out = decode(&encode(&pixels, 3, 1).unwrap()).unwrap();
        assert_eq!(out.pixels, pixels);
    }

    #[test]
    fn rgb24_is_stored_as_bgr() {
        let mut pixels = ColorStorage::allocate(PixelFormat::Rgb24, 1).unwrap();
        if let ColorStorage::Rgb24(p) = &mut pixels {
            p[0] = Rgb::new(200, 100, 50);
        }
        let out = decode(&encode(&pixels, 1, 1).unwrap()).unwrap();
        assert_eq!(out.info.pixel_format, PixelFormat::Bgr24);
        assert_eq!(out.pixels.color(0), Rgba::new(200, 100, 50, 255));
    }

    #[test]
    fn indexed4_round_trip() {
        let mut pixels = ColorStorage::allocate(PixelFormat::Indexed4, 15).unwrap();
        let indexed = pixels.indexed_mut().unwrap();
        for (i, c) in indexed.palette.iter_mut().enumerate() {
            *c = Rgba::new(i as u8 * 16, 0, 255 - i as u8, 255);
        }
        for (i, v) in indexed.indices.iter_mut().enumerate() {
            *v = i as u8;
        }
        let out = decode(&encode(&pixels, 5, 3).unwrap()).unwrap();
        assert_eq!(out.pixels, pixels);
    }

    #[test]
    fn top_down_32bpp_bi_rgb_is_opaque() {
        let base = encode(&ColorStorage::allocate(PixelFormat::Bgr24, 2).unwrap(), 1, 2).unwrap();
        // Flip to top-down and relabel as a 40-byte BI_RGB 32bpp image.
        let mut bmp = base[..54].to_vec();
        bmp[22..26].copy_from_slice(&(-2i32).to_le_bytes());
        bmp[28..30].copy_from_slice(&32u16.to_le_bytes());
        bmp.extend_from_slice(&[1, 2, 3, 0, 4, 5, 6, 0]);

        let out = decode(&bmp).unwrap();
        assert_eq!(out.pixels.color(0), Rgba::new(3, 2, 1, 255));
        assert_eq!(out.pixels.color(1), Rgba::new(6, 5, 4, 255));
    }

    #[test]
    fn rejects_unsupported_layouts() {
        let pixels = ColorStorage::allocate(PixelFormat::Grayscale16, 1).unwrap();
        assert!(matches!(
            encode(&pixels, 1, 1),
            Err(CodecError::UnsupportedPixelFormat { .. })
        ));
        let pixels = ColorStorage::allocate(PixelFormat::Bgr24, 0).unwrap();
        assert!(matches!(encode(&pixels, 0, 0), Err(CodecError::InvalidInput(_))));
    }

    #[test]
    fn detection_needs_known_dib_size() {
        let mut data = b"BM".to_vec();
        data.extend_from_slice(&[0; 12]);
        data.extend_from_slice(&41u32.to_le_bytes());
        assert!(!BmpCodec.detect(&mut Stream::from_memory(&data)).unwrap());
        assert!(!BmpCodec.detect(&mut Stream::from_memory(b"BM")).unwrap());
    }
}
