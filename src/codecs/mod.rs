//! Format backends.
//!
//! Each module provides a stateless [`FormatCodec`](crate::FormatCodec)
//! registered by [`CodecRegistry::builtin`](crate::CodecRegistry::builtin).
//! The helpers below are shared header and buffer plumbing.

use std::io::{self, Read};

use alloc::vec::Vec;

use crate::info::ImageSaveInfo;
use crate::pixel::PixelFormat;
use crate::storage::ColorStorage;
use crate::stream::Stream;
use crate::{CodecError, ImageFormat};

#[cfg(feature = "bmp")]
pub(crate) mod bmp;

#[cfg(feature = "pcx")]
pub(crate) mod pcx;

#[cfg(feature = "png")]
pub(crate) mod png;

#[cfg(feature = "pnm")]
pub(crate) mod pnm;

pub(crate) mod raw;

#[cfg(feature = "tga")]
pub(crate) mod tga;

/// Map a read failure during decode: running out of data means the file is
/// malformed, anything else is a real I/O error.
pub(crate) fn read_error(format: ImageFormat) -> impl Fn(io::Error) -> CodecError {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::invalid(format, "truncated data")
        } else {
            CodecError::Io(e)
        }
    }
}

/// Read exactly `len` bytes into a new buffer.
pub(crate) fn read_bytes(
    stream: &mut Stream<'_>,
    len: usize,
    format: ImageFormat,
) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| CodecError::Oom)?;
    buf.resize(len, 0);
    stream.read_exact(&mut buf).map_err(read_error(format))?;
    Ok(buf)
}

/// Read a fixed-size header, mapping truncation to `InvalidData`.
pub(crate) fn read_header<const N: usize>(
    stream: &mut Stream<'_>,
    format: ImageFormat,
) -> Result<[u8; N], CodecError> {
    stream.read_array::<N>().map_err(read_error(format))
}

pub(crate) fn unsupported(format: ImageFormat, pixel_format: PixelFormat) -> CodecError {
    CodecError::UnsupportedPixelFormat {
        format,
        pixel_format,
    }
}

/// Validate options and the buffer length; returns `(width, height)`.
pub(crate) fn check_encode(
    format: ImageFormat,
    pixels: &ColorStorage,
    info: &ImageSaveInfo<'_>,
) -> Result<(usize, usize), CodecError> {
    info.options.expect_for(format)?;
    let (w, h) = (info.width as usize, info.height as usize);
    if w.checked_mul(h) != Some(pixels.len()) {
        return Err(CodecError::InvalidInput(alloc::format!(
            "{} pixels for a {}x{} image",
            pixels.len(),
            info.width,
            info.height
        )));
    }
    Ok((w, h))
}

/// Like [`check_encode`], also rejecting empty images for formats that
/// cannot represent them.
pub(crate) fn check_encode_nonempty(
    format: ImageFormat,
    pixels: &ColorStorage,
    info: &ImageSaveInfo<'_>,
) -> Result<(usize, usize), CodecError> {
    let (w, h) = check_encode(format, pixels, info)?;
    if w == 0 || h == 0 {
        return Err(CodecError::InvalidInput(alloc::format!(
            "{format} cannot store a {w}x{h} image"
        )));
    }
    Ok((w, h))
}

pub(crate) fn le_u16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

pub(crate) fn le_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

pub(crate) fn le_i32(b: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

/// Bytes per row for `width` pixels at `bits` per pixel, before padding.
pub(crate) fn packed_row_len(width: usize, bits: usize) -> usize {
    (width * bits).div_ceil(8)
}

/// Unpack MSB-first `bits`-wide samples from `row` into `out`.
pub(crate) fn unpack_row(row: &[u8], bits: usize, out: &mut [u8]) {
    let per_byte = 8 / bits;
    let mask = ((1u16 << bits) - 1) as u8;
    for (x, dst) in out.iter_mut().enumerate() {
        let byte = row[x / per_byte];
        let shift = 8 - bits * (x % per_byte + 1);
        *dst = (byte >> shift) & mask;
    }
}

/// Pack `samples` MSB-first at `bits` per sample into `row`.
pub(crate) fn pack_row(samples: &[u8], bits: usize, row: &mut [u8]) {
    let per_byte = 8 / bits;
    let mask = ((1u16 << bits) - 1) as u8;
    row.fill(0);
    for (x, &s) in samples.iter().enumerate() {
        let shift = 8 - bits * (x % per_byte + 1);
        row[x / per_byte] |= (s & mask) << shift;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_sub_byte_rows() {
        let samples = [1u8, 0, 1, 1, 0, 0, 0, 1, 1];
        let mut row = [0u8; 2];
        pack_row(&samples, 1, &mut row);
        assert_eq!(row, [0b1011_0001, 0b1000_0000]);

        let mut out = [0u8; 9];
        unpack_row(&row, 1, &mut out);
        assert_eq!(out, samples);

        let nibbles = [0xA, 0x3, 0xF];
        let mut row = [0u8; 2];
        pack_row(&nibbles, 4, &mut row);
        assert_eq!(row, [0xA3, 0xF0]);
    }

    #[test]
    fn truncation_is_invalid_data() {
        let mut stream = Stream::from_memory(b"abc");
        let err = read_bytes(&mut stream, 8, ImageFormat::Tga).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidData {
                format: ImageFormat::Tga,
                ..
            }
        ));
    }

    #[test]
    fn row_lengths() {
        assert_eq!(packed_row_len(9, 1), 2);
        assert_eq!(packed_row_len(3, 4), 2);
        assert_eq!(packed_row_len(3, 24), 9);
    }
}
