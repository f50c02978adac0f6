//! The [`Image`] facade.

use std::fs::File;
use std::path::Path;

use alloc::vec::Vec;
use imgref::ImgVec;

use crate::config::EncoderOptions;
use crate::decode::{DecodeRequest, Source};
use crate::encode::EncodeRequest;
use crate::info::ImageInfo;
use crate::pixel::{PixelFormat, Rgba};
use crate::storage::{ColorStorage, ColorStorageMut, Colors};
use crate::{CodecError, ImageFormat};

/// An image of any supported format, with optional pixel storage.
///
/// A new `Image` is empty. It gains pixels by decoding
/// ([`open_path`](Self::open_path) and friends) or by
/// [`allocate_blank`](Self::allocate_blank). Pixels are released when the
/// image is dropped or [`take_pixels`](Self::take_pixels) is called.
///
/// ```
/// use zenimage::{Image, ImageFormat, PixelFormat};
///
/// let image = Image::allocate_blank(3, 2, PixelFormat::Rgb24)?;
/// let bytes = image.save_to_vec(ImageFormat::Raw, &Default::default())?;
/// let decoded = Image::open_memory(&bytes)?;
/// assert_eq!((decoded.width(), decoded.height()), (3, 2));
/// assert_eq!(decoded.iter().count(), 6);
/// # Ok::<(), zenimage::CodecError>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    image_format: ImageFormat,
    pixels: Option<ColorStorage>,
}

impl Default for Image {
    fn default() -> Self {
        Image {
            width: 0,
            height: 0,
            image_format: ImageFormat::Raw,
            pixels: None,
        }
    }
}

impl Image {
    /// An empty image: no pixels, zero size, tagged [`ImageFormat::Raw`].
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_decoded(format: ImageFormat, info: ImageInfo, pixels: ColorStorage) -> Self {
        Image {
            width: info.width,
            height: info.height,
            image_format: format,
            pixels: Some(pixels),
        }
    }

    /// Detect the format of the file at `path` and decode it.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        DecodeRequest::new(Source::Path(path.as_ref())).decode()
    }

    /// Detect and decode from an open file. Detection starts at offset 0
    /// regardless of the handle's current position.
    pub fn open_file(file: &mut File) -> Result<Self, CodecError> {
        DecodeRequest::new(Source::File(file)).decode()
    }

    /// Detect and decode from memory.
    pub fn open_memory(data: &[u8]) -> Result<Self, CodecError> {
        DecodeRequest::new(Source::Memory(data)).decode()
    }

    /// A zeroed image with the given layout, tagged [`ImageFormat::Raw`].
    pub fn allocate_blank(
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
    ) -> Result<Self, CodecError> {
        let count = (width as usize)
            .checked_mul(height as usize)
            .ok_or(CodecError::Oom)?;
        Ok(Image {
            width,
            height,
            image_format: ImageFormat::Raw,
            pixels: Some(ColorStorage::allocate(pixel_format, count)?),
        })
    }

    /// Width in pixels; 0 without pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels; 0 without pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Format the image was decoded from, or `Raw` for blank images.
    pub fn image_format(&self) -> ImageFormat {
        self.image_format
    }

    /// Layout of the pixel storage, if any.
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        self.pixels.as_ref().map(ColorStorage::pixel_format)
    }

    pub fn has_pixels(&self) -> bool {
        self.pixels.is_some()
    }

    pub fn pixels(&self) -> Option<&ColorStorage> {
        self.pixels.as_ref()
    }

    /// Mutable access to pixel values.
    ///
    /// The view only holds fixed-length slices, so the layout and pixel
    /// count always agree with [`width`](Self::width) and
    /// [`height`](Self::height).
    pub fn pixels_mut(&mut self) -> Option<ColorStorageMut<'_>> {
        self.pixels.as_mut().map(ColorStorage::view_mut)
    }

    /// Release the pixels now, leaving an empty image.
    pub fn take_pixels(&mut self) -> Option<ColorStorage> {
        self.width = 0;
        self.height = 0;
        self.pixels.take()
    }

    /// Normalized colors in row-major order; empty without pixels.
    pub fn iter(&self) -> Colors<'_> {
        Colors::over(self.pixels.as_ref())
    }

    /// Copy the pixels into an 8-bit RGBA [`ImgVec`].
    pub fn to_rgba8(&self) -> Option<ImgVec<Rgba<u8>>> {
        let pixels: Vec<Rgba<u8>> = self.pixels.as_ref()?.iter().collect();
        Some(ImgVec::new(pixels, self.width as usize, self.height as usize))
    }

    /// Encode to a new file at `path`.
    pub fn save_to_path(
        &self,
        path: impl AsRef<Path>,
        format: ImageFormat,
        options: &EncoderOptions,
    ) -> Result<(), CodecError> {
        EncodeRequest::new(format)
            .with_options(*options)
            .encode_to_path(self, path)
    }

    /// Encode into an open file at its current position.
    pub fn save_to_file(
        &self,
        file: &mut File,
        format: ImageFormat,
        options: &EncoderOptions,
    ) -> Result<(), CodecError> {
        EncodeRequest::new(format)
            .with_options(*options)
            .encode_to_file(self, file)
    }

    /// Encode into `buf` and return the written prefix.
    pub fn save_to_memory<'b>(
        &self,
        buf: &'b mut [u8],
        format: ImageFormat,
        options: &EncoderOptions,
    ) -> Result<&'b [u8], CodecError> {
        EncodeRequest::new(format)
            .with_options(*options)
            .encode_to_memory(self, buf)
    }

    /// Encode into a new vector.
    pub fn save_to_vec(
        &self,
        format: ImageFormat,
        options: &EncoderOptions,
    ) -> Result<Vec<u8>, CodecError> {
        EncodeRequest::new(format)
            .with_options(*options)
            .encode_to_vec(self)
    }
}

impl<'a> IntoIterator for &'a Image {
    type Item = Rgba<u8>;
    type IntoIter = Colors<'a>;

    fn into_iter(self) -> Colors<'a> {
        self.iter()
    }
}
