//! Image format identifiers.

use core::fmt;

/// Supported image formats.
///
/// The set is closed: adding a format means adding a variant here and
/// registering a [`FormatCodec`](crate::FormatCodec) for it.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Bmp,
    Pbm,
    Pcx,
    Pgm,
    Png,
    Ppm,
    /// Uncompressed container holding any [`PixelFormat`](crate::PixelFormat)
    /// verbatim. Also the tag of images created with
    /// [`Image::allocate_blank`](crate::Image::allocate_blank).
    Raw,
    Tga,
}

impl ImageFormat {
    /// Every format identifier, in registration order.
    pub const ALL: [ImageFormat; 8] = [
        ImageFormat::Bmp,
        ImageFormat::Pbm,
        ImageFormat::Pcx,
        ImageFormat::Pgm,
        ImageFormat::Png,
        ImageFormat::Ppm,
        ImageFormat::Raw,
        ImageFormat::Tga,
    ];

    /// Detect format from file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "bmp" | "dib" => Some(ImageFormat::Bmp),
            "pbm" => Some(ImageFormat::Pbm),
            "pcx" => Some(ImageFormat::Pcx),
            "pgm" => Some(ImageFormat::Pgm),
            "png" => Some(ImageFormat::Png),
            "ppm" | "pnm" => Some(ImageFormat::Ppm),
            "raw" => Some(ImageFormat::Raw),
            "tga" | "icb" | "vda" | "vst" => Some(ImageFormat::Tga),
            _ => None,
        }
    }

    /// Short lowercase name, as used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Bmp => "bmp",
            ImageFormat::Pbm => "pbm",
            ImageFormat::Pcx => "pcx",
            ImageFormat::Pgm => "pgm",
            ImageFormat::Png => "png",
            ImageFormat::Ppm => "ppm",
            ImageFormat::Raw => "raw",
            ImageFormat::Tga => "tga",
        }
    }

    /// MIME type string.
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Pbm => "image/x-portable-bitmap",
            ImageFormat::Pcx => "image/x-pcx",
            ImageFormat::Pgm => "image/x-portable-graymap",
            ImageFormat::Png => "image/png",
            ImageFormat::Ppm => "image/x-portable-pixmap",
            ImageFormat::Raw => "application/octet-stream",
            ImageFormat::Tga => "image/x-tga",
        }
    }

    /// Common file extensions.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ImageFormat::Bmp => &["bmp", "dib"],
            ImageFormat::Pbm => &["pbm"],
            ImageFormat::Pcx => &["pcx"],
            ImageFormat::Pgm => &["pgm"],
            ImageFormat::Png => &["png"],
            ImageFormat::Ppm => &["ppm", "pnm"],
            ImageFormat::Raw => &["raw"],
            ImageFormat::Tga => &["tga", "icb", "vda", "vst"],
        }
    }

    /// Whether a decode of this format's own output reproduces the pixels exactly.
    pub fn supports_lossless(self) -> bool {
        true
    }

    /// Whether this format can carry an alpha channel.
    pub fn supports_alpha(self) -> bool {
        matches!(
            self,
            ImageFormat::Bmp | ImageFormat::Png | ImageFormat::Raw | ImageFormat::Tga
        )
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
