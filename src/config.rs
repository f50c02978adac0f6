//! Format-specific encoder configuration.
//!
//! [`EncoderOptions`] carries the settings for one target format. The core
//! never looks inside it; the selected codec interprets the variant meant
//! for it and rejects variants meant for another format.

use crate::error::CodecError;
use crate::format::ImageFormat;

/// PNG deflate effort.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PngCompression {
    Fast,
    #[default]
    Balanced,
    High,
}

/// PNG encoder settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PngOptions {
    pub compression: PngCompression,
}

/// Sample encoding for PBM/PGM/PPM.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PnmEncoding {
    /// P4/P5/P6.
    #[default]
    Binary,
    /// P1/P2/P3, whitespace-separated decimal samples.
    Ascii,
}

/// PBM/PGM/PPM encoder settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PnmOptions {
    pub encoding: PnmEncoding,
}

/// TGA encoder settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TgaOptions {
    /// Run-length encode the pixel data.
    pub rle: bool,
}

/// Encoder configuration, chosen per target format.
///
/// `Default` asks the codec for its defaults and is accepted by every codec.
///
/// ```
/// use zenimage::{EncoderOptions, TgaOptions};
///
/// let options = EncoderOptions::Tga(TgaOptions { rle: true });
/// assert!(options.is_for(zenimage::ImageFormat::Tga));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum EncoderOptions {
    #[default]
    Default,
    Png(PngOptions),
    /// Applies to PBM, PGM and PPM.
    Pnm(PnmOptions),
    Tga(TgaOptions),
}

impl EncoderOptions {
    /// Whether this value can configure `format`.
    pub fn is_for(&self, format: ImageFormat) -> bool {
        match self {
            EncoderOptions::Default => true,
            EncoderOptions::Png(_) => format == ImageFormat::Png,
            EncoderOptions::Pnm(_) => matches!(
                format,
                ImageFormat::Pbm | ImageFormat::Pgm | ImageFormat::Ppm
            ),
            EncoderOptions::Tga(_) => format == ImageFormat::Tga,
        }
    }

    /// Reject options meant for another format.
    pub(crate) fn expect_for(&self, format: ImageFormat) -> Result<(), CodecError> {
        if self.is_for(format) {
            Ok(())
        } else {
            Err(CodecError::InvalidOptions {
                format,
                detail: "options belong to a different format",
            })
        }
    }

    pub(crate) fn png(&self) -> PngOptions {
        match self {
            EncoderOptions::Png(o) => *o,
            _ => PngOptions::default(),
        }
    }

    pub(crate) fn pnm(&self) -> PnmOptions {
        match self {
            EncoderOptions::Pnm(o) => *o,
            _ => PnmOptions::default(),
        }
    }

    pub(crate) fn tga(&self) -> TgaOptions {
        match self {
            EncoderOptions::Tga(o) => *o,
            _ => TgaOptions::default(),
        }
    }
}

impl From<PngOptions> for EncoderOptions {
    fn from(o: PngOptions) -> Self {
        EncoderOptions::Png(o)
    }
}

impl From<PnmOptions> for EncoderOptions {
    fn from(o: PnmOptions) -> Self {
        EncoderOptions::Pnm(o)
    }
}

impl From<TgaOptions> for EncoderOptions {
    fn from(o: TgaOptions) -> Self {
        EncoderOptions::Tga(o)
    }
}
