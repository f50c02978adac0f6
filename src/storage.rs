//! Format-tagged pixel storage.
//!
//! [`ColorStorage`] owns one boxed slice whose element type depends on the
//! [`PixelFormat`] chosen at allocation. The variant and the slice length
//! never change afterwards; a different layout needs a new allocation.
//! [`ColorStorageMut`] hands out the values without the buffers, and
//! [`Colors`] walks any variant as normalized [`Rgba<u8>`].

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::CodecError;
use crate::pixel::{BGR, BGRA, Gray, GrayAlpha, PixelFormat, Rgb, Rgb555, Rgba};

/// Palette indices plus the palette they index into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Indexed {
    pub(crate) indices: Box<[u8]>,
    pub(crate) palette: Box<[Rgba<u8>]>,
}

impl Indexed {
    fn allocate(pixel_count: usize, palette_len: usize) -> Result<Self, CodecError> {
        Ok(Indexed {
            indices: filled(pixel_count, 0u8)?,
            palette: filled(palette_len, Rgba::new(0, 0, 0, 0))?,
        })
    }

    /// One palette index per pixel.
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    /// Exactly [`PixelFormat::palette_capacity`] entries.
    pub fn palette(&self) -> &[Rgba<u8>] {
        &self.palette
    }

    pub fn indices_mut(&mut self) -> &mut [u8] {
        &mut self.indices
    }

    pub fn palette_mut(&mut self) -> &mut [Rgba<u8>] {
        &mut self.palette
    }

    /// Both halves at once, for filling a palette and its indices together.
    pub fn split_mut(&mut self) -> IndexedMut<'_> {
        IndexedMut {
            indices: &mut self.indices,
            palette: &mut self.palette,
        }
    }

    fn color(&self, i: usize) -> Rgba<u8> {
        self.indices
            .get(i)
            .and_then(|&idx| self.palette.get(idx as usize))
            .copied()
            .unwrap_or(Rgba::new(0, 0, 0, 0))
    }
}

/// Mutable indices and palette of an indexed buffer.
#[derive(Debug)]
pub struct IndexedMut<'a> {
    pub indices: &'a mut [u8],
    pub palette: &'a mut [Rgba<u8>],
}

/// Owned pixel buffer, one variant per [`PixelFormat`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ColorStorage {
    Indexed1(Indexed),
    Indexed2(Indexed),
    Indexed4(Indexed),
    Indexed8(Indexed),
    /// One value per pixel: 0 is black, anything else is white.
    Grayscale1(Box<[u8]>),
    Grayscale8(Box<[Gray<u8>]>),
    Grayscale16(Box<[Gray<u16>]>),
    Grayscale8Alpha(Box<[GrayAlpha<u8>]>),
    Grayscale16Alpha(Box<[GrayAlpha<u16>]>),
    Rgb555(Box<[Rgb555]>),
    Rgb24(Box<[Rgb<u8>]>),
    Rgb48(Box<[Rgb<u16>]>),
    Rgba32(Box<[Rgba<u8>]>),
    Rgba64(Box<[Rgba<u16>]>),
    Bgr24(Box<[BGR<u8>]>),
    Bgra32(Box<[BGRA<u8>]>),
}

/// Zero-filled slice whose allocation failure is reported instead of aborting.
fn filled<T: Clone>(len: usize, value: T) -> Result<Box<[T]>, CodecError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| CodecError::Oom)?;
    v.resize(len, value);
    Ok(v.into_boxed_slice())
}

impl ColorStorage {
    /// Allocate a zeroed buffer of `pixel_count` pixels. Indexed formats also
    /// get a zeroed palette sized to the format's capacity.
    pub fn allocate(pixel_format: PixelFormat, pixel_count: usize) -> Result<Self, CodecError> {
        let palette_len = pixel_format.palette_capacity().unwrap_or(0);
        Ok(match pixel_format {
            PixelFormat::Indexed1 => Self::Indexed1(Indexed::allocate(pixel_count, palette_len)?),
            PixelFormat::Indexed2 => Self::Indexed2(Indexed::allocate(pixel_count, palette_len)?),
            PixelFormat::Indexed4 => Self::Indexed4(Indexed::allocate(pixel_count, palette_len)?),
            PixelFormat::Indexed8 => Self::Indexed8(Indexed::allocate(pixel_count, palette_len)?),
            PixelFormat::Grayscale1 => Self::Grayscale1(filled(pixel_count, 0)?),
            PixelFormat::Grayscale8 => Self::Grayscale8(filled(pixel_count, Gray::new(0))?),
            PixelFormat::Grayscale16 => Self::Grayscale16(filled(pixel_count, Gray::new(0))?),
            PixelFormat::Grayscale8Alpha => {
                Self::Grayscale8Alpha(filled(pixel_count, GrayAlpha::new(0, 0))?)
            }
            PixelFormat::Grayscale16Alpha => {
                Self::Grayscale16Alpha(filled(pixel_count, GrayAlpha::new(0, 0))?)
            }
            PixelFormat::Rgb555 => Self::Rgb555(filled(pixel_count, Rgb555(0))?),
            PixelFormat::Rgb24 => Self::Rgb24(filled(pixel_count, Rgb::new(0, 0, 0))?),
            PixelFormat::Rgb48 => Self::Rgb48(filled(pixel_count, Rgb::new(0, 0, 0))?),
            PixelFormat::Rgba32 => Self::Rgba32(filled(pixel_count, Rgba::new(0, 0, 0, 0))?),
            PixelFormat::Rgba64 => Self::Rgba64(filled(pixel_count, Rgba::new(0, 0, 0, 0))?),
            PixelFormat::Bgr24 => Self::Bgr24(filled(pixel_count, BGR { b: 0, g: 0, r: 0 })?),
            PixelFormat::Bgra32 => Self::Bgra32(filled(
                pixel_count,
                BGRA {
                    b: 0,
                    g: 0,
                    r: 0,
                    a: 0,
                },
            )?),
        })
    }

    /// The variant tag.
    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            Self::Indexed1(_) => PixelFormat::Indexed1,
            Self::Indexed2(_) => PixelFormat::Indexed2,
            Self::Indexed4(_) => PixelFormat::Indexed4,
            Self::Indexed8(_) => PixelFormat::Indexed8,
            Self::Grayscale1(_) => PixelFormat::Grayscale1,
            Self::Grayscale8(_) => PixelFormat::Grayscale8,
            Self::Grayscale16(_) => PixelFormat::Grayscale16,
            Self::Grayscale8Alpha(_) => PixelFormat::Grayscale8Alpha,
            Self::Grayscale16Alpha(_) => PixelFormat::Grayscale16Alpha,
            Self::Rgb555(_) => PixelFormat::Rgb555,
            Self::Rgb24(_) => PixelFormat::Rgb24,
            Self::Rgb48(_) => PixelFormat::Rgb48,
            Self::Rgba32(_) => PixelFormat::Rgba32,
            Self::Rgba64(_) => PixelFormat::Rgba64,
            Self::Bgr24(_) => PixelFormat::Bgr24,
            Self::Bgra32(_) => PixelFormat::Bgra32,
        }
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        match self {
            Self::Indexed1(p) | Self::Indexed2(p) | Self::Indexed4(p) | Self::Indexed8(p) => {
                p.indices.len()
            }
            Self::Grayscale1(p) => p.len(),
            Self::Grayscale8(p) => p.len(),
            Self::Grayscale16(p) => p.len(),
            Self::Grayscale8Alpha(p) => p.len(),
            Self::Grayscale16Alpha(p) => p.len(),
            Self::Rgb555(p) => p.len(),
            Self::Rgb24(p) => p.len(),
            Self::Rgb48(p) => p.len(),
            Self::Rgba32(p) => p.len(),
            Self::Rgba64(p) => p.len(),
            Self::Bgr24(p) => p.len(),
            Self::Bgra32(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices and palette of an indexed variant.
    pub fn indexed(&self) -> Option<&Indexed> {
        match self {
            Self::Indexed1(p) | Self::Indexed2(p) | Self::Indexed4(p) | Self::Indexed8(p) => {
                Some(p)
            }
            _ => None,
        }
    }

    pub fn indexed_mut(&mut self) -> Option<&mut Indexed> {
        match self {
            Self::Indexed1(p) | Self::Indexed2(p) | Self::Indexed4(p) | Self::Indexed8(p) => {
                Some(p)
            }
            _ => None,
        }
    }

    /// Palette of an indexed variant.
    pub fn palette(&self) -> Option<&[Rgba<u8>]> {
        self.indexed().map(Indexed::palette)
    }

    /// Pixel `i` normalized to 8-bit RGBA.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    pub fn color(&self, i: usize) -> Rgba<u8> {
        match self {
            Self::Indexed1(p) | Self::Indexed2(p) | Self::Indexed4(p) | Self::Indexed8(p) => {
                assert!(i < p.indices.len(), "pixel index out of bounds");
                p.color(i)
            }
            Self::Grayscale1(p) => gray8(if p[i] != 0 { 255 } else { 0 }, 255),
            Self::Grayscale8(p) => gray8(p[i].value(), 255),
            Self::Grayscale16(p) => gray8(narrow(p[i].value()), 255),
            Self::Grayscale8Alpha(p) => gray8(p[i].v, p[i].a),
            Self::Grayscale16Alpha(p) => gray8(narrow(p[i].v), narrow(p[i].a)),
            Self::Rgb555(p) => p[i].to_rgba8(),
            Self::Rgb24(p) => {
                let c = p[i];
                Rgba::new(c.r, c.g, c.b, 255)
            }
            Self::Rgb48(p) => {
                let c = p[i];
                Rgba::new(narrow(c.r), narrow(c.g), narrow(c.b), 255)
            }
            Self::Rgba32(p) => p[i],
            Self::Rgba64(p) => {
                let c = p[i];
                Rgba::new(narrow(c.r), narrow(c.g), narrow(c.b), narrow(c.a))
            }
            Self::Bgr24(p) => {
                let c = p[i];
                Rgba::new(c.r, c.g, c.b, 255)
            }
            Self::Bgra32(p) => {
                let c = p[i];
                Rgba::new(c.r, c.g, c.b, c.a)
            }
        }
    }

    /// Iterate all pixels as normalized 8-bit RGBA. Each call starts over.
    pub fn iter(&self) -> Colors<'_> {
        Colors {
            storage: Some(self),
            pos: 0,
            end: self.len(),
        }
    }

    /// Borrow the pixel values mutably without exposing the buffers.
    pub fn view_mut(&mut self) -> ColorStorageMut<'_> {
        match self {
            Self::Indexed1(p) => ColorStorageMut::Indexed1(p.split_mut()),
            Self::Indexed2(p) => ColorStorageMut::Indexed2(p.split_mut()),
            Self::Indexed4(p) => ColorStorageMut::Indexed4(p.split_mut()),
            Self::Indexed8(p) => ColorStorageMut::Indexed8(p.split_mut()),
            Self::Grayscale1(p) => ColorStorageMut::Grayscale1(p),
            Self::Grayscale8(p) => ColorStorageMut::Grayscale8(p),
            Self::Grayscale16(p) => ColorStorageMut::Grayscale16(p),
            Self::Grayscale8Alpha(p) => ColorStorageMut::Grayscale8Alpha(p),
            Self::Grayscale16Alpha(p) => ColorStorageMut::Grayscale16Alpha(p),
            Self::Rgb555(p) => ColorStorageMut::Rgb555(p),
            Self::Rgb24(p) => ColorStorageMut::Rgb24(p),
            Self::Rgb48(p) => ColorStorageMut::Rgb48(p),
            Self::Rgba32(p) => ColorStorageMut::Rgba32(p),
            Self::Rgba64(p) => ColorStorageMut::Rgba64(p),
            Self::Bgr24(p) => ColorStorageMut::Bgr24(p),
            Self::Bgra32(p) => ColorStorageMut::Bgra32(p),
        }
    }
}

/// Mutable view of a [`ColorStorage`], one fixed-length slice per variant.
#[derive(Debug)]
#[non_exhaustive]
pub enum ColorStorageMut<'a> {
    Indexed1(IndexedMut<'a>),
    Indexed2(IndexedMut<'a>),
    Indexed4(IndexedMut<'a>),
    Indexed8(IndexedMut<'a>),
    Grayscale1(&'a mut [u8]),
    Grayscale8(&'a mut [Gray<u8>]),
    Grayscale16(&'a mut [Gray<u16>]),
    Grayscale8Alpha(&'a mut [GrayAlpha<u8>]),
    Grayscale16Alpha(&'a mut [GrayAlpha<u16>]),
    Rgb555(&'a mut [Rgb555]),
    Rgb24(&'a mut [Rgb<u8>]),
    Rgb48(&'a mut [Rgb<u16>]),
    Rgba32(&'a mut [Rgba<u8>]),
    Rgba64(&'a mut [Rgba<u16>]),
    Bgr24(&'a mut [BGR<u8>]),
    Bgra32(&'a mut [BGRA<u8>]),
}

impl ColorStorageMut<'_> {
    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            Self::Indexed1(_) => PixelFormat::Indexed1,
            Self::Indexed2(_) => PixelFormat::Indexed2,
            Self::Indexed4(_) => PixelFormat::Indexed4,
            Self::Indexed8(_) => PixelFormat::Indexed8,
            Self::Grayscale1(_) => PixelFormat::Grayscale1,
            Self::Grayscale8(_) => PixelFormat::Grayscale8,
            Self::Grayscale16(_) => PixelFormat::Grayscale16,
            Self::Grayscale8Alpha(_) => PixelFormat::Grayscale8Alpha,
            Self::Grayscale16Alpha(_) => PixelFormat::Grayscale16Alpha,
            Self::Rgb555(_) => PixelFormat::Rgb555,
            Self::Rgb24(_) => PixelFormat::Rgb24,
            Self::Rgb48(_) => PixelFormat::Rgb48,
            Self::Rgba32(_) => PixelFormat::Rgba32,
            Self::Rgba64(_) => PixelFormat::Rgba64,
            Self::Bgr24(_) => PixelFormat::Bgr24,
            Self::Bgra32(_) => PixelFormat::Bgra32,
        }
    }
}

#[inline]
fn gray8(v: u8, a: u8) -> Rgba<u8> {
    Rgba::new(v, v, v, a)
}

#[inline]
fn narrow(v: u16) -> u8 {
    (v >> 8) as u8
}

impl<'a> IntoIterator for &'a ColorStorage {
    type Item = Rgba<u8>;
    type IntoIter = Colors<'a>;

    fn into_iter(self) -> Colors<'a> {
        self.iter()
    }
}

/// Iterator over normalized colors of a [`ColorStorage`].
///
/// Created by [`ColorStorage::iter`], or empty via [`Colors::empty`] when
/// there is no storage.
#[derive(Clone, Debug)]
pub struct Colors<'a> {
    storage: Option<&'a ColorStorage>,
    pos: usize,
    end: usize,
}

impl<'a> Colors<'a> {
    /// An iterator that yields nothing.
    pub fn empty() -> Self {
        Colors {
            storage: None,
            pos: 0,
            end: 0,
        }
    }

    pub(crate) fn over(storage: Option<&'a ColorStorage>) -> Self {
        storage.map_or_else(Self::empty, ColorStorage::iter)
    }
}

impl Iterator for Colors<'_> {
    type Item = Rgba<u8>;

    fn next(&mut self) -> Option<Rgba<u8>> {
        if self.pos >= self.end {
            return None;
        }
        let color = self.storage?.color(self.pos);
        self.pos += 1;
        Some(color)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end - self.pos;
        (n, Some(n))
    }

    fn nth(&mut self, n: usize) -> Option<Rgba<u8>> {
        self.pos = self.pos.saturating_add(n).min(self.end);
        self.next()
    }
}

impl DoubleEndedIterator for Colors<'_> {
    fn next_back(&mut self) -> Option<Rgba<u8>> {
        if self.pos >= self.end {
            return None;
        }
        self.end -= 1;
        self.storage.map(|s| s.color(self.end))
    }
}

impl ExactSizeIterator for Colors<'_> {}

impl core::iter::FusedIterator for Colors<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_every_format() {
        for format in PixelFormat::ALL {
            let storage = ColorStorage::allocate(format, 12).unwrap();
            assert_eq!(storage.pixel_format(), format);
            assert_eq!(storage.len(), 12);
            assert_eq!(storage.iter().count(), 12);
            assert_eq!(
                storage.palette().map(<[_]>::len),
                format.palette_capacity()
            );
        }
    }

    #[test]
    fn allocation_failure_is_oom() {
        let result = ColorStorage::allocate(PixelFormat::Rgba64, usize::MAX / 2);
        assert!(matches!(result, Err(CodecError::Oom)));
    }

    #[test]
    fn indexed_colors_come_from_palette() {
        let mut storage = ColorStorage::allocate(PixelFormat::Indexed1, 3).unwrap();
        let mut indexed = storage.indexed_mut().unwrap().split_mut();
        indexed.palette[0] = Rgba::new(10, 20, 30, 255);
        indexed.palette[1] = Rgba::new(200, 100, 50, 128);
        indexed.indices.copy_from_slice(&[1, 0, 1]);

        let colors: Vec<_> = storage.iter().collect();
        assert_eq!(
            colors,
            [
                Rgba::new(200, 100, 50, 128),
                Rgba::new(10, 20, 30, 255),
                Rgba::new(200, 100, 50, 128),
            ]
        );
    }

    #[test]
    fn out_of_range_index_is_transparent() {
        let mut storage = ColorStorage::allocate(PixelFormat::Indexed4, 1).unwrap();
        storage.indexed_mut().unwrap().indices_mut()[0] = 200;
        assert_eq!(storage.color(0), Rgba::new(0, 0, 0, 0));
    }

    #[test]
    fn normalizes_native_layouts() {
        let storage = ColorStorage::Grayscale1(vec![0, 1, 255].into());
        assert_eq!(
            storage.iter().collect::<Vec<_>>(),
            [
                Rgba::new(0, 0, 0, 255),
                Rgba::new(255, 255, 255, 255),
                Rgba::new(255, 255, 255, 255),
            ]
        );

        let storage = ColorStorage::Grayscale16(vec![Gray::new(0xABCD)].into());
        assert_eq!(storage.color(0), Rgba::new(0xAB, 0xAB, 0xAB, 255));

        let storage = ColorStorage::Bgra32(vec![BGRA {
            b: 1,
            g: 2,
            r: 3,
            a: 4,
        }]
        .into());
        assert_eq!(storage.color(0), Rgba::new(3, 2, 1, 4));

        let storage = ColorStorage::Rgba64(vec![Rgba::new(0xFFFF, 0x8000, 0x00FF, 0x1234)].into());
        assert_eq!(storage.color(0), Rgba::new(0xFF, 0x80, 0x00, 0x12));
    }

    #[test]
    fn iteration_restarts_and_runs_backwards() {
        let storage = ColorStorage::Rgb24(vec![Rgb::new(1, 1, 1), Rgb::new(2, 2, 2)].into());
        let first: Vec<_> = storage.iter().collect();
        let second: Vec<_> = storage.iter().collect();
        assert_eq!(first, second);

        let reversed: Vec<_> = storage.iter().rev().map(|c| c.r).collect();
        assert_eq!(reversed, [2, 1]);
        assert_eq!(storage.iter().len(), 2);
    }

    #[test]
    fn empty_iterator_yields_nothing() {
        assert_eq!(Colors::empty().next(), None);
        assert_eq!(Colors::over(None).len(), 0);
    }

    #[test]
    fn view_mut_edits_values_in_place() {
        let mut storage = ColorStorage::allocate(PixelFormat::Indexed2, 4).unwrap();
        match storage.view_mut() {
            ColorStorageMut::Indexed2(mut p) => {
                assert_eq!((p.indices.len(), p.palette.len()), (4, 4));
                p.palette[3] = Rgba::new(9, 8, 7, 255);
                p.indices.fill(3);
            }
            other => panic!("unexpected view {:?}", other.pixel_format()),
        }
        assert_eq!(storage.pixel_format(), PixelFormat::Indexed2);
        assert_eq!(storage.len(), 4);
        assert!(storage.iter().all(|c| c == Rgba::new(9, 8, 7, 255)));

        for format in PixelFormat::ALL {
            let mut storage = ColorStorage::allocate(format, 3).unwrap();
            assert_eq!(storage.view_mut().pixel_format(), format);
        }
    }
}
