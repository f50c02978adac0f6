//! ZSoft PCX codec (run-length encoded, versions 0-5).
//!
//! A 1-bit file whose two header palette entries are both black decodes
//! with a black and white palette. PCX writers commonly leave that palette
//! zeroed, so an all-black 2-color palette does not survive a round trip.

use std::io::{Read, Write};

use alloc::vec::Vec;
use imgref::ImgRef;

use super::{check_encode_nonempty, le_u16, unpack_row, unsupported};
use crate::codec::{DecodeOutput, FormatCodec};
use crate::info::{ImageInfo, ImageSaveInfo};
use crate::pixel::{PixelFormat, Rgb, Rgba};
use crate::storage::{ColorStorage, Indexed};
use crate::stream::Stream;
use crate::{CodecError, ImageFormat, Limits};

const FORMAT: ImageFormat = ImageFormat::Pcx;
const HEADER_LEN: usize = 128;
const MANUFACTURER: u8 = 0x0A;
const VERSIONS: [u8; 5] = [0, 2, 3, 4, 5];
const RLE: u8 = 1;
/// Precedes the 256-color palette at the end of 8-bit files.
const VGA_PALETTE_MARKER: u8 = 0x0C;
const VGA_PALETTE_LEN: usize = 769;
const EGA_PALETTE_OFFSET: usize = 16;
const MAX_RUN: usize = 63;

pub(crate) struct PcxCodec;

#[derive(Debug)]
struct Header {
    bpp: u8,
    planes: u8,
    width: u32,
    height: u32,
    bytes_per_line: usize,
}

impl Header {
    fn parse(h: &[u8; HEADER_LEN]) -> Result<Self, CodecError> {
        if h[0] != MANUFACTURER || !VERSIONS.contains(&h[1]) || h[2] != RLE {
            return Err(CodecError::invalid(FORMAT, "bad header"));
        }
        let (xmin, ymin, xmax, ymax) = (le_u16(h, 4), le_u16(h, 6), le_u16(h, 8), le_u16(h, 10));
        if xmax < xmin || ymax < ymin {
            return Err(CodecError::invalid(FORMAT, "bad dimensions"));
        }
        let header = Header {
            bpp: h[3],
            planes: h[65],
            width: u32::from(xmax - xmin) + 1,
            height: u32::from(ymax - ymin) + 1,
            bytes_per_line: le_u16(h, 66) as usize,
        };
        let min_line = (header.width as usize * header.bpp as usize).div_ceil(8);
        if header.bytes_per_line < min_line {
            return Err(CodecError::invalid(FORMAT, "scanline too short"));
        }
        Ok(header)
    }

    fn pixel_format(&self) -> Result<PixelFormat, CodecError> {
        match (self.bpp, self.planes) {
            (1, 1) => Ok(PixelFormat::Indexed1),
            (1, 4) | (4, 1) => Ok(PixelFormat::Indexed4),
            (8, 1) => Ok(PixelFormat::Indexed8),
            (8, 3) => Ok(PixelFormat::Rgb24),
            _ => Err(CodecError::invalid(FORMAT, "unsupported bit depth and plane count")),
        }
    }
}

/// Expand RLE data into `out`; runs may cross scanlines.
fn unpack_rle(data: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
    let mut src = data.iter();
    let mut filled = 0;
    while filled < out.len() {
        let &b = src
            .next()
            .ok_or_else(|| CodecError::invalid(FORMAT, "truncated data"))?;
        if b >= 0xC0 {
            let count = (b & 0x3F) as usize;
            let &value = src
                .next()
                .ok_or_else(|| CodecError::invalid(FORMAT, "truncated data"))?;
            let end = (filled + count).min(out.len());
            out[filled..end].fill(value);
            filled = end;
        } else {
            out[filled] = b;
            filled += 1;
        }
    }
    Ok(data.len() - src.as_slice().len())
}

fn pack_rle(line: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < line.len() {
        let value = line[i];
        let run = line[i..]
            .iter()
            .take(MAX_RUN)
            .take_while(|&&b| b == value)
            .count();
        if run > 1 || value >= 0xC0 {
            out.push(0xC0 | run as u8);
        }
        out.push(value);
        i += run;
    }
}

impl FormatCodec for PcxCodec {
    fn format(&self) -> ImageFormat {
        FORMAT
    }

    fn detect(&self, stream: &mut Stream<'_>) -> Result<bool, CodecError> {
        Ok(match stream.peek_array::<4>()? {
            Some([m, version, encoding, bpp]) => {
                m == MANUFACTURER
                    && VERSIONS.contains(&version)
                    && encoding == RLE
                    && matches!(bpp, 1 | 2 | 4 | 8)
            }
            None => false,
        })
    }

    fn decode(&self, stream: &mut Stream<'_>, limits: &Limits) -> Result<DecodeOutput, CodecError> {
        let raw = super::read_header::<HEADER_LEN>(stream, FORMAT)?;
        let header = Header::parse(&raw)?;
        let pixel_format = header.pixel_format()?;
        let count = limits.check_decode(header.width, header.height, pixel_format)?;
        let mut pixels = ColorStorage::allocate(pixel_format, count)?;

        let mut body = Vec::new();
        stream.read_to_end(&mut body)?;
        let (w, h) = (header.width as usize, header.height as usize);
        let line = header.bytes_per_line;
        let scanline = line * header.planes as usize;
        let mut planar = Vec::new();
        planar
            .try_reserve_exact(scanline * h)
            .map_err(|_| CodecError::Oom)?;
        planar.resize(scanline * h, 0);
        let used = unpack_rle(&body, &mut planar)?;

        match &mut pixels {
            ColorStorage::Indexed8(p) => {
                let tail = &body[used..];
                let palette = tail
                    .len()
                    .checked_sub(VGA_PALETTE_LEN)
                    .map(|at| &tail[at..])
                    .filter(|pal| pal[0] == VGA_PALETTE_MARKER)
                    .ok_or_else(|| CodecError::invalid(FORMAT, "missing 256-color palette"))?;
                read_rgb_palette(&palette[1..], &mut p.palette);
                for (dst, src) in p.indices.chunks_exact_mut(w).zip(planar.chunks_exact(scanline)) {
                    dst.copy_from_slice(&src[..w]);
                }
            }
            ColorStorage::Indexed1(p) => {
                read_header_palette(&raw, p, 2);
                for (dst, src) in p.indices.chunks_exact_mut(w).zip(planar.chunks_exact(scanline)) {
                    unpack_row(src, 1, dst);
                }
            }
            ColorStorage::Indexed4(p) => {
                read_header_palette(&raw, p, 16);
                let mut bits = alloc::vec![0u8; w];
                for (dst, src) in p.indices.chunks_exact_mut(w).zip(planar.chunks_exact(scanline)) {
                    if header.planes == 1 {
                        unpack_row(src, 4, dst);
                        continue;
                    }
                    dst.fill(0);
                    for (plane, plane_line) in src.chunks_exact(line).enumerate() {
                        unpack_row(plane_line, 1, &mut bits);
                        for (d, &bit) in dst.iter_mut().zip(&bits) {
                            *d |= bit << plane;
                        }
                    }
                }
            }
            ColorStorage::Rgb24(p) => {
                for (dst, src) in p.chunks_exact_mut(w).zip(planar.chunks_exact(scanline)) {
                    let (r, rest) = src.split_at(line);
                    let (g, b) = rest.split_at(line);
                    for (x, px) in dst.iter_mut().enumerate() {
                        *px = Rgb::new(r[x], g[x], b[x]);
                    }
                }
            }
            _ => return Err(unsupported(FORMAT, pixel_format)),
        }

        tracing::trace!(?header, "pcx decoded");
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
        if w > usize::from(u16::MAX) || h > usize::from(u16::MAX) {
            return Err(CodecError::LimitExceeded("image too large for PCX"));
        }
        let (bpp, planes) = match pixels {
            ColorStorage::Indexed1(_) => (1, 1),
            ColorStorage::Indexed4(_) => (1, 4),
            ColorStorage::Indexed8(_) => (8, 1),
            ColorStorage::Rgb24(_) => (8, 3),
            other => return Err(unsupported(FORMAT, other.pixel_format())),
        };
        // Scanlines are padded to an even length.
        let line = (w * bpp as usize).div_ceil(8).next_multiple_of(2);

        let mut out = write_header(w, h, bpp, planes, line, pixels.indexed());
        let mut scanline = alloc::vec![0u8; line * planes as usize];
        match pixels {
            ColorStorage::Indexed1(p) | ColorStorage::Indexed8(p) => {
                for row in ImgRef::new(&p.indices[..], w, h).rows() {
                    if bpp == 1 {
                        super::pack_row(row, 1, &mut scanline);
                    } else {
                        scanline[..w].copy_from_slice(row);
                    }
                    pack_rle(&scanline, &mut out);
                }
            }
            ColorStorage::Indexed4(p) => {
                let mut bits = alloc::vec![0u8; w];
                for row in ImgRef::new(&p.indices[..], w, h).rows() {
                    for (plane, plane_line) in scanline.chunks_exact_mut(line).enumerate() {
                        for (b, &idx) in bits.iter_mut().zip(row) {
                            *b = (idx >> plane) & 1;
                        }
                        super::pack_row(&bits, 1, plane_line);
                    }
                    for plane_line in scanline.chunks_exact(line) {
                        pack_rle(plane_line, &mut out);
                    }
                }
            }
            ColorStorage::Rgb24(p) => {
                for row in ImgRef::new(&p[..], w, h).rows() {
                    for (x, px) in row.iter().enumerate() {
                        scanline[x] = px.r;
                        scanline[line + x] = px.g;
                        scanline[2 * line + x] = px.b;
                    }
                    for plane_line in scanline.chunks_exact(line) {
                        pack_rle(plane_line, &mut out);
                    }
                }
            }
            _ => {}
        }

        if let ColorStorage::Indexed8(p) = pixels {
            out.push(VGA_PALETTE_MARKER);
            for c in p.palette.iter() {
                out.extend_from_slice(&[c.r, c.g, c.b]);
            }
        }
        stream.write_all(&out)?;
        Ok(())
    }
}

fn read_rgb_palette(data: &[u8], palette: &mut [Rgba<u8>]) {
    for (dst, c) in palette.iter_mut().zip(data.chunks_exact(3)) {
        *dst = Rgba::new(c[0], c[1], c[2], 255);
    }
}

fn read_header_palette(header: &[u8; HEADER_LEN], indexed: &mut Indexed, entries: usize) {
    let colors = &header[EGA_PALETTE_OFFSET..EGA_PALETTE_OFFSET + entries * 3];
    if entries == 2 && colors.iter().all(|&b| b == 0) {
        // Zeroed monochrome palette: black and white.
        indexed.palette[0] = Rgba::new(0, 0, 0, 255);
        indexed.palette[1] = Rgba::new(255, 255, 255, 255);
    } else {
        read_rgb_palette(colors, &mut indexed.palette);
    }
}

fn write_header(
    w: usize,
    h: usize,
    bpp: u8,
    planes: u8,
    line: usize,
    indexed: Option<&Indexed>,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(&[MANUFACTURER, 5, RLE, bpp]);
    for v in [0, 0, w as u16 - 1, h as u16 - 1, 72, 72] {
        out.extend_from_slice(&u16::to_le_bytes(v));
    }
    let mut ega = [0u8; 48];
    if let Some(indexed) = indexed.filter(|_| bpp == 1) {
        for (dst, c) in ega.chunks_exact_mut(3).zip(indexed.palette.iter()) {
            dst.copy_from_slice(&[c.r, c.g, c.b]);
        }
    }
    out.extend_from_slice(&ega);
    out.push(0);
    out.push(planes);
    out.extend_from_slice(&(line as u16).to_le_bytes());
    // Palette info: 1 = color or monochrome.
    out.extend_from_slice(&1u16.to_le_bytes());
    out.resize(HEADER_LEN, 0);
    out
}
