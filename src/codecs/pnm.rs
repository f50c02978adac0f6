//! Netpbm codecs: PBM (P1/P4), PGM (P2/P5) and PPM (P3/P6).
//!
//! The three formats share one header grammar and differ only in channel
//! count, so a single implementation serves all three codecs.

use std::io::{Read, Write};

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;

use super::{check_encode_nonempty, packed_row_len, unsupported};
use crate::codec::{DecodeOutput, FormatCodec};
use crate::config::PnmEncoding;
use crate::info::{ImageInfo, ImageSaveInfo};
use crate::pixel::{Gray, PixelFormat, Rgb};
use crate::storage::ColorStorage;
use crate::stream::Stream;
use crate::{CodecError, ImageFormat, Limits};

/// Netpbm recommends lines of at most 70 characters in plain formats.
const ASCII_LINE_LEN: usize = 70;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Bitmap,
    Graymap,
    Pixmap,
}

impl Kind {
    fn format(self) -> ImageFormat {
        match self {
            Kind::Bitmap => ImageFormat::Pbm,
            Kind::Graymap => ImageFormat::Pgm,
            Kind::Pixmap => ImageFormat::Ppm,
        }
    }

    /// Magic digits for (plain, raw).
    fn magic(self) -> (u8, u8) {
        match self {
            Kind::Bitmap => (b'1', b'4'),
            Kind::Graymap => (b'2', b'5'),
            Kind::Pixmap => (b'3', b'6'),
        }
    }

    fn channels(self) -> usize {
        if self == Kind::Pixmap { 3 } else { 1 }
    }
}

/// Whitespace- and comment-separated header and plain-format tokens.
struct Tokens<'a> {
    data: &'a [u8],
    pos: usize,
    format: ImageFormat,
}

impl<'a> Tokens<'a> {
    fn skip_space(&mut self) {
        while let Some(&b) = self.data.get(self.pos) {
            if b == b'#' {
                while self.data.get(self.pos).is_some_and(|&b| b != b'\n' && b != b'\r') {
                    self.pos += 1;
                }
            } else if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn number(&mut self) -> Result<u32, CodecError> {
        self.skip_space();
        let start = self.pos;
        let mut value: u32 = 0;
        while let Some(&b) = self.data.get(self.pos).filter(|b| b.is_ascii_digit()) {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u32::from(b - b'0')))
                .ok_or_else(|| CodecError::invalid(self.format, "number out of range"))?;
            self.pos += 1;
        }
        if self.pos == start {
            return Err(if self.pos >= self.data.len() {
                CodecError::invalid(self.format, "truncated data")
            } else {
                CodecError::invalid(self.format, "expected a number")
            });
        }
        Ok(value)
    }

    /// One plain PBM digit; digits need not be separated.
    fn bit(&mut self) -> Result<u8, CodecError> {
        self.skip_space();
        let b = self.data.get(self.pos).copied();
        self.pos += 1;
        match b {
            Some(b'0') => Ok(0),
            Some(b'1') => Ok(1),
            Some(_) => Err(CodecError::invalid(self.format, "expected 0 or 1")),
            None => Err(CodecError::invalid(self.format, "truncated data")),
        }
    }

    /// Consume the single whitespace byte that ends a raw-format header.
    fn end_of_header(&mut self) -> Result<&'a [u8], CodecError> {
        match self.data.get(self.pos) {
            Some(b) if b.is_ascii_whitespace() => Ok(&self.data[self.pos + 1..]),
            _ => Err(CodecError::invalid(self.format, "malformed header")),
        }
    }
}

struct Header {
    ascii: bool,
    width: u32,
    height: u32,
    maxval: u32,
}

fn parse_header(kind: Kind, tokens: &mut Tokens<'_>) -> Result<Header, CodecError> {
    let format = kind.format();
    let (plain, raw) = kind.magic();
    let ascii = match tokens.data {
        [b'P', d, ..] if *d == plain => true,
        [b'P', d, ..] if *d == raw => false,
        _ => return Err(CodecError::invalid(format, "bad magic number")),
    };
    tokens.pos = 2;
    let width = tokens.number()?;
    let height = tokens.number()?;
    if width == 0 || height == 0 {
        return Err(CodecError::invalid(format, "bad dimensions"));
    }
    let maxval = if kind == Kind::Bitmap { 1 } else { tokens.number()? };
    if maxval == 0 || maxval > u32::from(u16::MAX) {
        return Err(CodecError::invalid(format, "maxval out of range"));
    }
    Ok(Header {
        ascii,
        width,
        height,
        maxval,
    })
}

fn pixel_format(kind: Kind, maxval: u32) -> PixelFormat {
    match (kind, maxval > 255) {
        (Kind::Bitmap, _) => PixelFormat::Grayscale1,
        (Kind::Graymap, false) => PixelFormat::Grayscale8,
        (Kind::Graymap, true) => PixelFormat::Grayscale16,
        (Kind::Pixmap, false) => PixelFormat::Rgb24,
        (Kind::Pixmap, true) => PixelFormat::Rgb48,
    }
}

fn detect(kind: Kind, stream: &mut Stream<'_>) -> Result<bool, CodecError> {
    let (plain, raw) = kind.magic();
    Ok(match stream.peek_array::<3>()? {
        Some([b'P', d, ws]) => (d == plain || d == raw) && ws.is_ascii_whitespace(),
        _ => false,
    })
}

fn decode(kind: Kind, stream: &mut Stream<'_>, limits: &Limits) -> Result<DecodeOutput, CodecError> {
    let format = kind.format();
    let mut data = Vec::new();
    stream.read_to_end(&mut data)?;
    let mut tokens = Tokens {
        data: &data,
        pos: 0,
        format,
    };
    let header = parse_header(kind, &mut tokens)?;
    let pixel_format = pixel_format(kind, header.maxval);
    let count = limits.check_decode(header.width, header.height, pixel_format)?;
    let mut pixels = ColorStorage::allocate(pixel_format, count)?;
    let samples = count * kind.channels();

    if let ColorStorage::Grayscale1(p) = &mut pixels {
        // 1 is black in the file and white in storage.
        if header.ascii {
            for v in p.iter_mut() {
                *v = 1 - tokens.bit()?;
            }
        } else {
            let w = header.width as usize;
            let row_len = packed_row_len(w, 1);
            let body = tokens.end_of_header()?;
            let body = body
                .get(..row_len * header.height as usize)
                .ok_or_else(|| CodecError::invalid(format, "truncated data"))?;
            for (dst, row) in p.chunks_exact_mut(w).zip(body.chunks_exact(row_len)) {
                super::unpack_row(row, 1, dst);
                dst.iter_mut().for_each(|v| *v = 1 - *v);
            }
        }
    } else {
        let values = read_samples(&mut tokens, &header, samples)?;
        store(&mut pixels, &values);
    }

    Ok(DecodeOutput {
        info: ImageInfo {
            width: header.width,
            height: header.height,
            pixel_format,
        },
        pixels,
    })
}

/// Read `samples` values and rescale them to the full 8- or 16-bit range.
fn read_samples(
    tokens: &mut Tokens<'_>,
    header: &Header,
    samples: usize,
) -> Result<Vec<u16>, CodecError> {
    let format = tokens.format;
    let mut values = Vec::new();
    values.try_reserve_exact(samples).map_err(|_| CodecError::Oom)?;

    if header.ascii {
        for _ in 0..samples {
            let v = tokens.number()?;
            if v > header.maxval {
                return Err(CodecError::invalid(format, "sample exceeds maxval"));
            }
            values.push(v as u16);
        }
    } else {
        let wide = header.maxval > 255;
        let size = if wide { 2 } else { 1 };
        let body = tokens.end_of_header()?;
        let body = body
            .get(..samples * size)
            .ok_or_else(|| CodecError::invalid(format, "truncated data"))?;
        if wide {
            values.extend(body.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])));
        } else {
            values.extend(body.iter().map(|&b| u16::from(b)));
        }
        if values.iter().any(|&v| u32::from(v) > header.maxval) {
            return Err(CodecError::invalid(format, "sample exceeds maxval"));
        }
    }

    let target = if header.maxval > 255 { 65535 } else { 255 };
    if header.maxval != target {
        for v in &mut values {
            *v = ((u32::from(*v) * target + header.maxval / 2) / header.maxval) as u16;
        }
    }
    Ok(values)
}

fn store(pixels: &mut ColorStorage, values: &[u16]) {
    match pixels {
        ColorStorage::Grayscale8(p) => {
            for (dst, &v) in p.iter_mut().zip(values) {
                *dst = Gray::new(v as u8);
            }
        }
        ColorStorage::Grayscale16(p) => {
            for (dst, &v) in p.iter_mut().zip(values) {
                *dst = Gray::new(v);
            }
        }
        ColorStorage::Rgb24(p) => {
            for (dst, c) in p.iter_mut().zip(values.chunks_exact(3)) {
                *dst = Rgb::new(c[0] as u8, c[1] as u8, c[2] as u8);
            }
        }
        ColorStorage::Rgb48(p) => {
            for (dst, c) in p.iter_mut().zip(values.chunks_exact(3)) {
                *dst = Rgb::new(c[0], c[1], c[2]);
            }
        }
        _ => {}
    }
}

/// Plain-format body writer that wraps lines.
struct AsciiBody {
    out: String,
    line: usize,
}

impl AsciiBody {
    fn push(&mut self, value: impl core::fmt::Display) {
        let mut token = String::new();
        let _ = write!(token, "{value}");
        if self.line > 0 && self.line + 1 + token.len() > ASCII_LINE_LEN {
            self.out.push('\n');
            self.line = 0;
        } else if self.line > 0 {
            self.out.push(' ');
            self.line += 1;
        }
        self.line += token.len();
        self.out.push_str(&token);
    }

    fn end_row(&mut self) {
        if self.line > 0 {
            self.out.push('\n');
            self.line = 0;
        }
    }
}

fn encode(
    kind: Kind,
    stream: &mut Stream<'_>,
    pixels: &ColorStorage,
    info: &ImageSaveInfo<'_>,
) -> Result<(), CodecError> {
    let format = kind.format();
    let (w, _) = check_encode_nonempty(format, pixels, info)?;
    let ascii = info.options.pnm().encoding == PnmEncoding::Ascii;
    let (plain, raw) = kind.magic();

    let (maxval, samples): (u32, Vec<u16>) = match (kind, pixels) {
        (Kind::Bitmap, ColorStorage::Grayscale1(p)) => (1, p.iter().map(|&v| u16::from(v != 0)).collect()),
        (Kind::Graymap, ColorStorage::Grayscale8(p)) => (255, p.iter().map(|g| u16::from(g.value())).collect()),
        (Kind::Graymap, ColorStorage::Grayscale16(p)) => (65535, p.iter().map(|g| g.value()).collect()),
        (Kind::Pixmap, ColorStorage::Rgb24(p)) => (
            255,
            p.iter()
                .flat_map(|c| [c.r, c.g, c.b].map(u16::from))
                .collect(),
        ),
        (Kind::Pixmap, ColorStorage::Rgb48(p)) => {
            (65535, p.iter().flat_map(|c| [c.r, c.g, c.b]).collect())
        }
        (_, other) => return Err(unsupported(format, other.pixel_format())),
    };

    let mut header = String::new();
    let magic = char::from(if ascii { plain } else { raw });
    let _ = write!(header, "P{magic}\n{} {}\n", info.width, info.height);
    if kind != Kind::Bitmap {
        let _ = writeln!(header, "{maxval}");
    }
    stream.write_all(header.as_bytes())?;

    let row_samples = w * kind.channels();
    if ascii {
        let mut body = AsciiBody {
            out: String::new(),
            line: 0,
        };
        for row in samples.chunks_exact(row_samples) {
            for &v in row {
                // PBM stores 1 for black.
                body.push(if kind == Kind::Bitmap { 1 - v } else { v });
            }
            body.end_row();
        }
        stream.write_all(body.out.as_bytes())?;
    } else if kind == Kind::Bitmap {
        let mut row = alloc::vec![0u8; packed_row_len(w, 1)];
        let mut inverted = alloc::vec![0u8; w];
        for src in samples.chunks_exact(w) {
            for (dst, &v) in inverted.iter_mut().zip(src) {
                *dst = 1 - v as u8;
            }
            super::pack_row(&inverted, 1, &mut row);
            stream.write_all(&row)?;
        }
    } else if maxval > 255 {
        let bytes: Vec<u8> = samples.iter().flat_map(|v| v.to_be_bytes()).collect();
        stream.write_all(&bytes)?;
    } else {
        let bytes: Vec<u8> = samples.iter().map(|&v| v as u8).collect();
        stream.write_all(&bytes)?;
    }
    Ok(())
}

macro_rules! pnm_codec {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        pub(crate) struct $name;

        impl FormatCodec for $name {
            fn format(&self) -> ImageFormat {
                $kind.format()
            }

            fn detect(&self, stream: &mut Stream<'_>) -> Result<bool, CodecError> {
                detect($kind, stream)
            }

            fn decode(
                &self,
                stream: &mut Stream<'_>,
                limits: &Limits,
            ) -> Result<DecodeOutput, CodecError> {
                decode($kind, stream, limits)
            }

            fn encode(
                &self,
                stream: &mut Stream<'_>,
                pixels: &ColorStorage,
                info: &ImageSaveInfo<'_>,
            ) -> Result<(), CodecError> {
                encode($kind, stream, pixels, info)
            }
        }
    };
}

pnm_codec!(
    /// Portable bitmap, 1 bit per pixel.
    PbmCodec,
    Kind::Bitmap
);
pnm_codec!(
    /// Portable graymap, 8 or 16 bits per pixel.
    PgmCodec,
    Kind::Graymap
);
pnm_codec!(
    /// Portable pixmap, RGB with 8 or 16 bits per channel.
    PpmCodec,
    Kind::Pixmap
);
