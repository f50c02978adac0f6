//! Metadata exchanged with codecs, and format probing without decoding.

use crate::config::EncoderOptions;
use crate::pixel::PixelFormat;
use crate::stream::Stream;
use crate::{CodecError, CodecRegistry, ImageFormat};

/// What a codec reports after a successful decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl ImageInfo {
    /// Width × height, or `None` if that overflows `usize`.
    pub fn pixel_count(&self) -> Option<usize> {
        (self.width as usize).checked_mul(self.height as usize)
    }
}

/// What a codec receives alongside the pixels when encoding.
#[derive(Clone, Copy, Debug)]
pub struct ImageSaveInfo<'a> {
    pub width: u32,
    pub height: u32,
    pub options: &'a EncoderOptions,
}

/// Identify the format of `data` without decoding pixels.
///
/// All codecs in the global registry are tried in registration order.
pub fn detect_format(data: &[u8]) -> Result<ImageFormat, CodecError> {
    detect_format_with_registry(data, CodecRegistry::global())
}

/// Identify the format of `data` using a specific registry.
///
/// Only formats registered in `registry` are recognized.
pub fn detect_format_with_registry(
    data: &[u8],
    registry: &CodecRegistry,
) -> Result<ImageFormat, CodecError> {
    let mut stream = Stream::from_memory(data);
    registry.detect(&mut stream).map(|codec| codec.format())
}
