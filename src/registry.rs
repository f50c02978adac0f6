//! Registry of format codecs and the detection protocol.

use std::sync::LazyLock;

use alloc::vec::Vec;

use crate::codec::FormatCodec;
use crate::stream::Stream;
use crate::{CodecError, ImageFormat};

static GLOBAL: LazyLock<CodecRegistry> = LazyLock::new(CodecRegistry::builtin);

/// Every codec compiled into this build, in registration order.
///
/// Built on first use and never modified afterwards.
pub fn all_formats() -> &'static [&'static dyn FormatCodec] {
    GLOBAL.codecs()
}

/// Ordered list of codecs used for detection and encoder lookup.
///
/// Order matters: detection tries codecs front to back and the first match
/// wins. The process-wide instance is [`CodecRegistry::global`]; build your
/// own to restrict which formats a request may use, or to add a codec.
#[derive(Clone, Debug)]
pub struct CodecRegistry {
    codecs: Vec<&'static dyn FormatCodec>,
}

impl CodecRegistry {
    /// The shared registry of all compiled-in codecs.
    pub fn global() -> &'static CodecRegistry {
        &GLOBAL
    }

    /// A fresh registry of all compiled-in codecs.
    pub fn builtin() -> Self {
        let mut codecs: Vec<&'static dyn FormatCodec> = Vec::new();

        #[cfg(feature = "bmp")]
        {
            codecs.push(&crate::codecs::bmp::BmpCodec);
        }
        #[cfg(feature = "pnm")]
        {
            codecs.push(&crate::codecs::pnm::PbmCodec);
        }
        #[cfg(feature = "pcx")]
        {
            codecs.push(&crate::codecs::pcx::PcxCodec);
        }
        #[cfg(feature = "pnm")]
        {
            codecs.push(&crate::codecs::pnm::PgmCodec);
        }
        #[cfg(feature = "png")]
        {
            codecs.push(&crate::codecs::png::PngCodec);
        }
        #[cfg(feature = "pnm")]
        {
            codecs.push(&crate::codecs::pnm::PpmCodec);
        }
        codecs.push(&crate::codecs::raw::RawCodec);
        // Last: TGA has no magic number, only header plausibility checks.
        #[cfg(feature = "tga")]
        {
            codecs.push(&crate::codecs::tga::TgaCodec);
        }

        CodecRegistry { codecs }
    }

    /// No codecs. Every lookup fails.
    pub fn empty() -> Self {
        CodecRegistry { codecs: Vec::new() }
    }

    /// Append a codec; it is tried after every codec already present.
    pub fn with_codec(mut self, codec: &'static dyn FormatCodec) -> Self {
        self.codecs.push(codec);
        self
    }

    /// Remove every codec for `format`.
    pub fn without(mut self, format: ImageFormat) -> Self {
        self.codecs.retain(|c| c.format() != format);
        self
    }

    /// Registered codecs, in order.
    pub fn codecs(&self) -> &[&'static dyn FormatCodec] {
        &self.codecs
    }

    /// Registered formats, in order.
    pub fn formats(&self) -> impl Iterator<Item = ImageFormat> + '_ {
        self.codecs.iter().map(|c| c.format())
    }

    /// The first codec registered for `format`.
    pub fn find(&self, format: ImageFormat) -> Option<&'static dyn FormatCodec> {
        self.codecs.iter().copied().find(|c| c.format() == format)
    }

    /// Is `format` registered?
    pub fn contains(&self, format: ImageFormat) -> bool {
        self.find(format).is_some()
    }

    /// Run detection over `stream`.
    ///
    /// Each codec is tried in order, with the stream rewound to offset 0
    /// before every trial. The first positive answer wins. The stream is
    /// left at offset 0 whether or not anything matched.
    pub fn detect(&self, stream: &mut Stream<'_>) -> Result<&'static dyn FormatCodec, CodecError> {
        for &codec in &self.codecs {
            stream.seek_absolute(0)?;
            let matched = codec.detect(stream)?;
            tracing::trace!(format = %codec.format(), matched, "detection trial");
            if matched {
                stream.seek_absolute(0)?;
                tracing::debug!(format = %codec.format(), "format detected");
                return Ok(codec);
            }
        }
        stream.seek_absolute(0)?;
        tracing::debug!(candidates = self.codecs.len(), "no codec recognized the data");
        Err(CodecError::UnrecognizedFormat)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
