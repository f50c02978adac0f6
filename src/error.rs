//! Unified error types for codec operations.

use alloc::boxed::Box;
use alloc::string::String;

use crate::format::ImageFormat;
use crate::pixel::PixelFormat;

/// Unified error type for codec operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    /// Underlying stream I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// No registered codec recognized the data.
    #[error("unsupported format: no registered codec recognized the data")]
    UnrecognizedFormat,
    /// The requested format has no codec in the registry in use.
    #[error("unsupported format: no codec registered for {0}")]
    UnsupportedFormat(ImageFormat),
    /// Encode was attempted on an image without pixels.
    #[error("no pixel data")]
    NoPixelData,
    /// Allocation failure.
    #[error("out of memory")]
    Oom,
    /// Resource limit exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    /// The format was recognized but its contents are malformed.
    #[error("invalid {format} data: {detail}")]
    InvalidData {
        format: ImageFormat,
        detail: &'static str,
    },
    /// The codec cannot read or write this pixel layout.
    #[error("{format} does not support pixel format {pixel_format:?}")]
    UnsupportedPixelFormat {
        format: ImageFormat,
        pixel_format: PixelFormat,
    },
    /// Encoder options were rejected by the target codec.
    #[error("invalid {format} encoder options: {detail}")]
    InvalidOptions {
        format: ImageFormat,
        detail: &'static str,
    },
    /// Input validation failed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Underlying codec crate error.
    #[error("codec error ({format}): {source}")]
    Codec {
        format: ImageFormat,
        source: Box<dyn core::error::Error + Send + Sync>,
    },
}

impl CodecError {
    /// Wrap a codec-specific error.
    pub fn from_codec<E>(format: ImageFormat, error: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        CodecError::Codec {
            format,
            source: Box::new(error),
        }
    }

    /// True for both flavours of "unsupported format": nothing detected the
    /// input, or the requested format has no registered codec.
    pub fn is_unsupported_format(&self) -> bool {
        matches!(
            self,
            CodecError::UnrecognizedFormat | CodecError::UnsupportedFormat(_)
        )
    }

    pub(crate) fn invalid(format: ImageFormat, detail: &'static str) -> Self {
        CodecError::InvalidData { format, detail }
    }
}
