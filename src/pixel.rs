//! Pixel format tags and the packed pixel types not covered by `rgb`.

pub use rgb::alt::{BGR, BGRA, Gray, GrayAlpha};
pub use rgb::{Rgb, Rgba};

/// Pixel memory layout of a [`ColorStorage`](crate::ColorStorage).
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PixelFormat {
    /// Palette index, 2 colors.
    Indexed1 = 1,
    /// Palette index, 4 colors.
    Indexed2 = 2,
    /// Palette index, 16 colors.
    Indexed4 = 3,
    /// Palette index, 256 colors.
    Indexed8 = 4,
    /// Black and white, one 0/1 value per pixel.
    Grayscale1 = 5,
    Grayscale8 = 6,
    Grayscale16 = 7,
    Grayscale8Alpha = 8,
    Grayscale16Alpha = 9,
    /// 5 bits per channel packed into a `u16` (`0RRRRRGGGGGBBBBB`).
    Rgb555 = 10,
    Rgb24 = 11,
    Rgb48 = 12,
    Rgba32 = 13,
    Rgba64 = 14,
    Bgr24 = 15,
    Bgra32 = 16,
}

impl PixelFormat {
    /// Every pixel format.
    pub const ALL: [PixelFormat; 16] = [
        PixelFormat::Indexed1,
        PixelFormat::Indexed2,
        PixelFormat::Indexed4,
        PixelFormat::Indexed8,
        PixelFormat::Grayscale1,
        PixelFormat::Grayscale8,
        PixelFormat::Grayscale16,
        PixelFormat::Grayscale8Alpha,
        PixelFormat::Grayscale16Alpha,
        PixelFormat::Rgb555,
        PixelFormat::Rgb24,
        PixelFormat::Rgb48,
        PixelFormat::Rgba32,
        PixelFormat::Rgba64,
        PixelFormat::Bgr24,
        PixelFormat::Bgra32,
    ];

    /// Stable one-byte code, used by the raw container.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.code() == code)
    }

    /// Bits per pixel of the format's native representation.
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Indexed1 | Self::Grayscale1 => 1,
            Self::Indexed2 => 2,
            Self::Indexed4 => 4,
            Self::Indexed8 | Self::Grayscale8 => 8,
            Self::Grayscale16 | Self::Grayscale8Alpha | Self::Rgb555 => 16,
            Self::Rgb24 | Self::Bgr24 => 24,
            Self::Grayscale16Alpha | Self::Rgba32 | Self::Bgra32 => 32,
            Self::Rgb48 => 48,
            Self::Rgba64 => 64,
        }
    }

    /// Number of channels (palette indices count as one).
    pub fn channels(self) -> usize {
        match self {
            Self::Indexed1
            | Self::Indexed2
            | Self::Indexed4
            | Self::Indexed8
            | Self::Grayscale1
            | Self::Grayscale8
            | Self::Grayscale16 => 1,
            Self::Grayscale8Alpha | Self::Grayscale16Alpha => 2,
            Self::Rgb555 | Self::Rgb24 | Self::Rgb48 | Self::Bgr24 => 3,
            Self::Rgba32 | Self::Rgba64 | Self::Bgra32 => 4,
        }
    }

    /// Number of palette entries for indexed formats.
    pub fn palette_capacity(self) -> Option<usize> {
        match self {
            Self::Indexed1 => Some(2),
            Self::Indexed2 => Some(4),
            Self::Indexed4 => Some(16),
            Self::Indexed8 => Some(256),
            _ => None,
        }
    }

    pub fn is_indexed(self) -> bool {
        self.palette_capacity().is_some()
    }

    pub fn is_grayscale(self) -> bool {
        matches!(
            self,
            Self::Grayscale1
                | Self::Grayscale8
                | Self::Grayscale16
                | Self::Grayscale8Alpha
                | Self::Grayscale16Alpha
        )
    }

    /// Whether pixels carry their own alpha channel. Indexed formats may
    /// still be translucent through their palette.
    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::Grayscale8Alpha
                | Self::Grayscale16Alpha
                | Self::Rgba32
                | Self::Rgba64
                | Self::Bgra32
        )
    }
}

/// 15-bit RGB packed into a `u16`, high bit unused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Rgb555(pub u16);

impl Rgb555 {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb555(((r as u16 & 0x1F) << 10) | ((g as u16 & 0x1F) << 5) | (b as u16 & 0x1F))
    }

    pub fn r(self) -> u8 {
        ((self.0 >> 10) & 0x1F) as u8
    }

    pub fn g(self) -> u8 {
        ((self.0 >> 5) & 0x1F) as u8
    }

    pub fn b(self) -> u8 {
        (self.0 & 0x1F) as u8
    }

    /// Expand to 8 bits per channel, opaque.
    pub fn to_rgba8(self) -> Rgba<u8> {
        Rgba {
            r: expand5(self.r()),
            g: expand5(self.g()),
            b: expand5(self.b()),
            a: 255,
        }
    }
}

#[inline]
fn expand5(v: u8) -> u8 {
    (v << 3) | (v >> 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for format in PixelFormat::ALL {
            assert_eq!(PixelFormat::from_code(format.code()), Some(format));
        }
        assert_eq!(PixelFormat::from_code(0), None);
        assert_eq!(PixelFormat::from_code(200), None);
    }

    #[test]
    fn palette_capacity_matches_bit_depth() {
        for format in PixelFormat::ALL.into_iter().filter(|f| f.is_indexed()) {
            assert_eq!(
                format.palette_capacity(),
                Some(1usize << format.bits_per_pixel())
            );
        }
    }

    #[test]
    fn rgb555_expands_full_range() {
        let white = Rgb555::new(31, 31, 31);
        assert_eq!(white.to_rgba8(), Rgba { r: 255, g: 255, b: 255, a: 255 });
        let red = Rgb555::new(31, 0, 0);
        assert_eq!(red.r(), 31);
        assert_eq!(red.to_rgba8().g, 0);
    }
}
