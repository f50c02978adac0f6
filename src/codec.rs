//! The contract every format backend implements.

use crate::info::{ImageInfo, ImageSaveInfo};
use crate::storage::ColorStorage;
use crate::stream::Stream;
use crate::{CodecError, ImageFormat, Limits};

/// Decoded image: metadata plus the pixels it describes.
#[derive(Debug)]
pub struct DecodeOutput {
    pub info: ImageInfo,
    pub pixels: ColorStorage,
}

/// A codec backend for one [`ImageFormat`].
///
/// Implementations are stateless values; the registry holds `&'static`
/// references to them and shares them across threads.
///
/// # Detection
///
/// [`detect`](Self::detect) is called with the stream positioned at offset 0
/// and may read as much as it needs; the caller rewinds before every trial.
/// Data that is empty, truncated, or simply not this format is `Ok(false)`.
/// Only genuine I/O failures are errors. Detection should be as specific as
/// the format allows, since earlier-registered codecs win ties.
///
/// # Decode and encode
///
/// [`decode`](Self::decode) starts at offset 0 and must return storage whose
/// length is `width * height` and whose tag equals `info.pixel_format`.
/// [`encode`](Self::encode) writes at the stream's current position.
pub trait FormatCodec: Send + Sync {
    /// The format this codec reads and writes.
    fn format(&self) -> ImageFormat;

    /// Whether the stream's contents look like this format.
    fn detect(&self, stream: &mut Stream<'_>) -> Result<bool, CodecError>;

    /// Decode the whole image.
    fn decode(&self, stream: &mut Stream<'_>, limits: &Limits) -> Result<DecodeOutput, CodecError>;

    /// Encode `pixels` (`info.width * info.height` of them).
    fn encode(
        &self,
        stream: &mut Stream<'_>,
        pixels: &ColorStorage,
        info: &ImageSaveInfo<'_>,
    ) -> Result<(), CodecError>;
}

impl core::fmt::Debug for dyn FormatCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("FormatCodec").field(&self.format()).finish()
    }
}
