//! Image encoding.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use alloc::vec::Vec;

use crate::codec::FormatCodec;
use crate::config::EncoderOptions;
use crate::image::Image;
use crate::info::ImageSaveInfo;
use crate::storage::ColorStorage;
use crate::stream::Stream;
use crate::{CodecError, CodecRegistry, ImageFormat};

/// Image encode request builder.
///
/// # Example
///
/// ```no_run
/// use zenimage::{EncodeRequest, Image, ImageFormat, PixelFormat, TgaOptions};
///
/// let image = Image::allocate_blank(16, 16, PixelFormat::Bgra32)?;
/// let bytes = EncodeRequest::new(ImageFormat::Tga)
///     .with_options(TgaOptions { rle: true })
///     .encode_to_vec(&image)?;
/// # Ok::<(), zenimage::CodecError>(())
/// ```
#[derive(Clone, Debug)]
pub struct EncodeRequest<'a> {
    format: ImageFormat,
    options: EncoderOptions,
    registry: Option<&'a CodecRegistry>,
}

impl<'a> EncodeRequest<'a> {
    /// Encode to a specific format.
    pub fn new(format: ImageFormat) -> Self {
        Self {
            format,
            options: EncoderOptions::Default,
            registry: None,
        }
    }

    /// Set format-specific encoder options.
    pub fn with_options(mut self, options: impl Into<EncoderOptions>) -> Self {
        self.options = options.into();
        self
    }

    /// Set a codec registry to control which formats are available.
    pub fn with_registry(mut self, registry: &'a CodecRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Check preconditions before touching any destination.
    fn prepare<'i>(
        &self,
        image: &'i Image,
    ) -> Result<(&'static dyn FormatCodec, &'i ColorStorage), CodecError> {
        let pixels = image.pixels().ok_or(CodecError::NoPixelData)?;
        let registry = self.registry.unwrap_or(CodecRegistry::global());
        let codec = registry
            .find(self.format)
            .ok_or(CodecError::UnsupportedFormat(self.format))?;
        Ok((codec, pixels))
    }

    fn run(
        &self,
        codec: &dyn FormatCodec,
        image: &Image,
        pixels: &ColorStorage,
        stream: &mut Stream<'_>,
    ) -> Result<(), CodecError> {
        let info = ImageSaveInfo {
            width: image.width(),
            height: image.height(),
            options: &self.options,
        };
        tracing::debug!(
            format = %self.format,
            width = info.width,
            height = info.height,
            pixel_format = ?pixels.pixel_format(),
            "encoding image"
        );
        codec.encode(stream, pixels, &info)?;
        stream.flush()?;
        Ok(())
    }

    /// Encode into an arbitrary stream at its current position.
    pub fn encode_to_stream(&self, image: &Image, stream: &mut Stream<'_>) -> Result<(), CodecError> {
        let (codec, pixels) = self.prepare(image)?;
        self.run(codec, image, pixels, stream)
    }

    /// Encode to a new file at `path`, replacing any existing file.
    ///
    /// Nothing is created when the image has no pixels or the format is
    /// not registered.
    pub fn encode_to_path(&self, image: &Image, path: impl AsRef<Path>) -> Result<(), CodecError> {
        let (codec, pixels) = self.prepare(image)?;
        let mut file = File::create(path)?;
        self.run(codec, image, pixels, &mut Stream::from_file(&mut file))
    }

    /// Encode into an open file at its current position.
    pub fn encode_to_file(&self, image: &Image, file: &mut File) -> Result<(), CodecError> {
        let (codec, pixels) = self.prepare(image)?;
        self.run(codec, image, pixels, &mut Stream::from_file(file))
    }

    /// Encode into a caller-supplied buffer and return the written prefix.
    ///
    /// Fails with an I/O error (`WriteZero`) when the buffer is too small.
    /// The buffer is untouched when preconditions fail.
    pub fn encode_to_memory<'b>(
        &self,
        image: &Image,
        buf: &'b mut [u8],
    ) -> Result<&'b [u8], CodecError> {
        let (codec, pixels) = self.prepare(image)?;
        let written = {
            let mut stream = Stream::from_memory_mut(&mut *buf);
            self.run(codec, image, pixels, &mut stream)?;
            stream.position()? as usize
        };
        Ok(&buf[..written])
    }

    /// Encode into a new vector.
    pub fn encode_to_vec(&self, image: &Image) -> Result<Vec<u8>, CodecError> {
        let (codec, pixels) = self.prepare(image)?;
        let mut out = Vec::new();
        self.run(codec, image, pixels, &mut Stream::from_vec(&mut out))?;
        Ok(out)
    }
}
