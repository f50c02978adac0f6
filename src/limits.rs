//! Resource limits applied by decoders before they allocate.

use crate::error::CodecError;
use crate::pixel::PixelFormat;

/// Resource limits for decode operations.
///
/// Headers are untrusted: a few bytes can claim a 65535×65535 image. Every
/// built-in codec checks its parsed dimensions against these limits before
/// allocating [`ColorStorage`](crate::ColorStorage). All limits are
/// optional; the default is unlimited.
///
/// ```
/// use zenimage::{Limits, PixelFormat};
///
/// let limits = Limits::none().with_max_pixels(1 << 20);
/// assert!(limits.check_decode(1024, 1024, PixelFormat::Rgba32).is_ok());
/// assert!(limits.check_decode(1025, 1024, PixelFormat::Rgba32).is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Limits {
    /// Maximum image width in pixels.
    pub max_width: Option<u64>,
    /// Maximum image height in pixels.
    pub max_height: Option<u64>,
    /// Maximum total pixels (width × height).
    pub max_pixels: Option<u64>,
    /// Maximum pixel buffer size in bytes, palette excluded.
    pub max_memory_bytes: Option<u64>,
}

fn within(value: u64, max: Option<u64>, reason: &'static str) -> Result<(), CodecError> {
    match max {
        Some(max) if value > max => Err(CodecError::LimitExceeded(reason)),
        _ => Ok(()),
    }
}

impl Limits {
    /// No restrictions.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_max_dimensions(mut self, width: u64, height: u64) -> Self {
        self.max_width = Some(width);
        self.max_height = Some(height);
        self
    }

    pub fn with_max_pixels(mut self, pixels: u64) -> Self {
        self.max_pixels = Some(pixels);
        self
    }

    pub fn with_max_memory(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = Some(bytes);
        self
    }

    /// Validate a decode target and return its pixel count.
    ///
    /// Width and height are checked first, then the pixel count, then the
    /// storage size for `pixel_format`. Fails with
    /// [`CodecError::LimitExceeded`] naming the first limit hit.
    pub fn check_decode(
        &self,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
    ) -> Result<usize, CodecError> {
        let (w, h) = (u64::from(width), u64::from(height));
        within(w, self.max_width, "width exceeds limit")?;
        within(h, self.max_height, "height exceeds limit")?;

        // u32 × u32 always fits in u64.
        let pixels = w * h;
        within(pixels, self.max_pixels, "pixel count exceeds limit")?;

        let stored = u64::from(pixel_format.bits_per_pixel()).div_ceil(8);
        within(
            pixels.saturating_mul(stored),
            self.max_memory_bytes,
            "memory allocation exceeds limit",
        )?;

        usize::try_from(pixels)
            .map_err(|_| CodecError::LimitExceeded("pixel count exceeds address space"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(result: Result<usize, CodecError>) -> &'static str {
        match result {
            Err(CodecError::LimitExceeded(reason)) => reason,
            other => panic!("expected LimitExceeded, got {other:?}"),
        }
    }

    #[test]
    fn unlimited_by_default() {
        let limits = Limits::none();
        assert_eq!(
            limits.check_decode(u32::MAX, 2, PixelFormat::Rgba64).ok(),
            usize::try_from(u64::from(u32::MAX) * 2).ok()
        );
    }

    #[test]
    fn dimensions_are_checked_before_pixel_count() {
        let limits = Limits::none()
            .with_max_dimensions(1000, 1000)
            .with_max_pixels(500_000);

        assert_eq!(limits.check_decode(500, 500, PixelFormat::Grayscale8).unwrap(), 250_000);
        assert_eq!(
            reason(limits.check_decode(1000, 1000, PixelFormat::Grayscale8)),
            "pixel count exceeds limit"
        );
        assert_eq!(
            reason(limits.check_decode(2000, 10, PixelFormat::Grayscale8)),
            "width exceeds limit"
        );
        assert_eq!(
            reason(limits.check_decode(10, 1001, PixelFormat::Grayscale8)),
            "height exceeds limit"
        );
    }

    #[test]
    fn memory_counts_stored_bytes_per_pixel() {
        let limits = Limits::none().with_max_memory(64);
        assert_eq!(limits.check_decode(4, 4, PixelFormat::Rgba32).unwrap(), 16);
        // One byte per pixel for sub-byte layouts.
        assert_eq!(limits.check_decode(8, 8, PixelFormat::Indexed1).unwrap(), 64);
        assert_eq!(
            reason(limits.check_decode(4, 4, PixelFormat::Rgba64)),
            "memory allocation exceeds limit"
        );
    }
}
