//! Image decoding.

use std::fs::File;
use std::path::Path;

use crate::codec::FormatCodec;
use crate::image::Image;
use crate::stream::Stream;
use crate::{CodecError, CodecRegistry, ImageFormat, Limits};

/// Where a [`DecodeRequest`] reads from.
#[derive(Debug)]
pub enum Source<'a> {
    Path(&'a Path),
    File(&'a mut File),
    Memory(&'a [u8]),
}

/// Image decode request builder.
///
/// # Example
///
/// ```no_run
/// use zenimage::{DecodeRequest, Limits, Source};
///
/// let data: &[u8] = &[]; // your image bytes
/// let limits = Limits { max_pixels: Some(1 << 24), ..Limits::none() };
/// let image = DecodeRequest::new(Source::Memory(data))
///     .with_limits(&limits)
///     .decode()?;
/// println!("{}x{}", image.width(), image.height());
/// # Ok::<(), zenimage::CodecError>(())
/// ```
#[derive(Debug)]
pub struct DecodeRequest<'a> {
    source: Source<'a>,
    format: Option<ImageFormat>,
    limits: Option<&'a Limits>,
    registry: Option<&'a CodecRegistry>,
}

impl<'a> DecodeRequest<'a> {
    /// Create a new decode request.
    ///
    /// Format will be auto-detected using the global registry.
    pub fn new(source: Source<'a>) -> Self {
        Self {
            source,
            format: None,
            limits: None,
            registry: None,
        }
    }

    /// Skip detection and decode as `format`.
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set resource limits.
    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Set a codec registry to control which formats are available.
    pub fn with_registry(mut self, registry: &'a CodecRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Decode the image.
    pub fn decode(self) -> Result<Image, CodecError> {
        let registry = self.registry.unwrap_or(CodecRegistry::global());
        let default_limits = Limits::none();
        let limits = self.limits.unwrap_or(&default_limits);

        match self.source {
            Source::Path(path) => {
                let mut file = File::open(path)?;
                decode_stream(&mut Stream::from_file(&mut file), self.format, registry, limits)
            }
            Source::File(file) => {
                decode_stream(&mut Stream::from_file(file), self.format, registry, limits)
            }
            Source::Memory(data) => {
                decode_stream(&mut Stream::from_memory(data), self.format, registry, limits)
            }
        }
    }
}

/// Detect (unless `format` is given), rewind, and decode.
pub(crate) fn decode_stream(
    stream: &mut Stream<'_>,
    format: Option<ImageFormat>,
    registry: &CodecRegistry,
    limits: &Limits,
) -> Result<Image, CodecError> {
    let codec: &dyn FormatCodec = match format {
        Some(f) => registry.find(f).ok_or(CodecError::UnsupportedFormat(f))?,
        None => registry.detect(stream)?,
    };
    stream.seek_absolute(0)?;

    let output = codec.decode(stream, limits)?;
    let info = output.info;
    if output.pixels.pixel_format() != info.pixel_format
        || Some(output.pixels.len()) != info.pixel_count()
    {
        return Err(CodecError::InvalidInput(alloc::format!(
            "{} codec returned {} {:?} pixels for a {}x{} {:?} image",
            codec.format(),
            output.pixels.len(),
            output.pixels.pixel_format(),
            info.width,
            info.height,
            info.pixel_format,
        )));
    }

    tracing::debug!(
        format = %codec.format(),
        width = info.width,
        height = info.height,
        pixel_format = ?info.pixel_format,
        "decoded image"
    );
    Ok(Image::from_decoded(codec.format(), info, output.pixels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelFormat;

    #[test]
    fn builder_pattern() {
        let data = b"test";
        let request = DecodeRequest::new(Source::Memory(data)).with_format(ImageFormat::Png);
        assert_eq!(request.format, Some(ImageFormat::Png));
    }

    #[test]
    fn forced_format_must_be_registered() {
        let raw = crate::codecs::raw::encode_header(0, 0, PixelFormat::Rgb24);
        let registry = CodecRegistry::empty();

        let result = DecodeRequest::new(Source::Memory(&raw))
            .with_registry(&registry)
            .with_format(ImageFormat::Raw)
            .decode();

        assert!(matches!(result, Err(CodecError::UnsupportedFormat(ImageFormat::Raw))));
    }

    #[test]
    fn limits_reach_the_codec() {
        let mut raw = crate::codecs::raw::encode_header(64, 64, PixelFormat::Grayscale8);
        raw.resize(raw.len() + 64 * 64, 0);
        let limits = Limits {
            max_width: Some(32),
            ..Limits::none()
        };

        let result = DecodeRequest::new(Source::Memory(&raw))
            .with_limits(&limits)
            .decode();

        assert!(matches!(result, Err(CodecError::LimitExceeded(_))));
    }

    #[test]
    fn missing_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = DecodeRequest::new(Source::Path(&dir.path().join("missing.bmp"))).decode();
        assert!(matches!(result, Err(CodecError::Io(_))));
    }
}
