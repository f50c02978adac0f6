//! Encode/decode round trips through the `Image` facade.

use std::io::{Seek, SeekFrom};

use rayon::prelude::*;
use zenimage::{
    CodecError, CodecRegistry, ColorStorageMut, EncodeRequest, EncoderOptions, Gray, Image,
    ImageFormat, PixelFormat, Rgba,
};

/// A `width`x`height` image whose pixel values vary by position.
fn gradient(width: u32, height: u32, pixel_format: PixelFormat) -> Image {
    let mut image = Image::allocate_blank(width, height, pixel_format).unwrap();
    let w = width as usize;
    let value = |i: usize| ((i % w) * 37 + (i / w) * 91) as u8;
    match image.pixels_mut().unwrap() {
        ColorStorageMut::Indexed1(mut p)
        | ColorStorageMut::Indexed2(mut p)
        | ColorStorageMut::Indexed4(mut p)
        | ColorStorageMut::Indexed8(mut p) => {
            let n = p.palette.len();
            for (i, c) in p.palette.iter_mut().enumerate() {
                *c = Rgba::new((i * 3) as u8, 255 - i as u8, i as u8 ^ 0x55, 255);
            }
            for (i, idx) in p.indices.iter_mut().enumerate() {
                *idx = (value(i) as usize % n) as u8;
            }
        }
        ColorStorageMut::Grayscale1(p) => {
            for (i, v) in p.iter_mut().enumerate() {
                *v = value(i) & 1;
            }
        }
        ColorStorageMut::Grayscale8(p) => {
            for (i, g) in p.iter_mut().enumerate() {
                *g = Gray::new(value(i));
            }
        }
        ColorStorageMut::Grayscale16(p) => {
            for (i, g) in p.iter_mut().enumerate() {
                *g = Gray::new(u16::from(value(i)) * 256 + 1);
            }
        }
        ColorStorageMut::Rgb24(p) => {
            for (i, c) in p.iter_mut().enumerate() {
                *c = zenimage::Rgb::new(value(i), value(i + 1), value(i + 2));
            }
        }
        ColorStorageMut::Rgb48(p) => {
            for (i, c) in p.iter_mut().enumerate() {
                *c = zenimage::Rgb::new((i * 1000) as u16, 65535 - i as u16, 7);
            }
        }
        ColorStorageMut::Bgra32(p) => {
            for (i, c) in p.iter_mut().enumerate() {
                *c = zenimage::BGRA {
                    b: value(i),
                    g: value(i + 3),
                    r: value(i + 5),
                    a: value(i + 7),
                };
            }
        }
        ColorStorageMut::Rgba32(p) => {
            for (i, c) in p.iter_mut().enumerate() {
                *c = Rgba::new(value(i), value(i + 1), value(i + 2), value(i + 3));
            }
        }
        other => panic!("no gradient for {:?}", other.pixel_format()),
    }
    image
}

fn assert_same_colors(a: &Image, b: &Image) {
    assert_eq!((a.width(), a.height()), (b.width(), b.height()));
    assert!(a.iter().eq(b.iter()));
}

fn round_trip(image: &Image, format: ImageFormat, options: EncoderOptions) -> Image {
    let data = image.save_to_vec(format, &options).unwrap();
    let decoded = Image::open_memory(&data).unwrap();
    assert_eq!(decoded.image_format(), format);
    decoded
}

#[test]
fn raw_preserves_every_layout_exactly() {
    for pixel_format in [
        PixelFormat::Indexed1,
        PixelFormat::Indexed2,
        PixelFormat::Indexed4,
        PixelFormat::Indexed8,
        PixelFormat::Grayscale1,
        PixelFormat::Grayscale16,
        PixelFormat::Rgb48,
        PixelFormat::Bgra32,
    ] {
        let image = gradient(7, 5, pixel_format);
        let decoded = round_trip(&image, ImageFormat::Raw, EncoderOptions::Default);
        assert_eq!(decoded.pixels(), image.pixels(), "{pixel_format:?}");
    }
}

#[cfg(feature = "bmp")]
#[test]
fn bmp_round_trips() {
    for pixel_format in [
        PixelFormat::Indexed1,
        PixelFormat::Indexed4,
        PixelFormat::Indexed8,
        PixelFormat::Rgb24,
        PixelFormat::Bgra32,
        PixelFormat::Rgba32,
    ] {
        let image = gradient(9, 4, pixel_format);
        let decoded = round_trip(&image, ImageFormat::Bmp, EncoderOptions::Default);
        assert_same_colors(&image, &decoded);
    }
}

#[cfg(feature = "pnm")]
#[test]
fn pnm_round_trips_in_both_encodings() {
    use zenimage::{PnmEncoding, PnmOptions};

    let cases = [
        (ImageFormat::Pbm, PixelFormat::Grayscale1),
        (ImageFormat::Pgm, PixelFormat::Grayscale8),
        (ImageFormat::Pgm, PixelFormat::Grayscale16),
        (ImageFormat::Ppm, PixelFormat::Rgb24),
        (ImageFormat::Ppm, PixelFormat::Rgb48),
    ];
    for (format, pixel_format) in cases {
        for encoding in [PnmEncoding::Binary, PnmEncoding::Ascii] {
            let image = gradient(11, 3, pixel_format);
            let decoded = round_trip(&image, format, PnmOptions { encoding }.into());
            assert_eq!(decoded.pixels(), image.pixels(), "{format} {encoding:?}");
        }
    }
}

#[cfg(feature = "pcx")]
#[test]
fn pcx_round_trips() {
    for pixel_format in [
        PixelFormat::Indexed1,
        PixelFormat::Indexed4,
        PixelFormat::Indexed8,
        PixelFormat::Rgb24,
    ] {
        let image = gradient(13, 6, pixel_format);
        let decoded = round_trip(&image, ImageFormat::Pcx, EncoderOptions::Default);
        assert_same_colors(&image, &decoded);
    }
}

#[cfg(feature = "png")]
#[test]
fn png_round_trips() {
    use zenimage::{PngCompression, PngOptions};

    for pixel_format in [
        PixelFormat::Grayscale8,
        PixelFormat::Grayscale16,
        PixelFormat::Rgb24,
        PixelFormat::Rgb48,
        PixelFormat::Rgba32,
    ] {
        let image = gradient(10, 10, pixel_format);
        let options = PngOptions {
            compression: PngCompression::High,
        };
        let decoded = round_trip(&image, ImageFormat::Png, options.into());
        assert_eq!(decoded.pixels(), image.pixels(), "{pixel_format:?}");
    }
}

#[cfg(feature = "tga")]
#[test]
fn tga_round_trips_with_and_without_rle() {
    use zenimage::TgaOptions;

    for rle in [false, true] {
        for pixel_format in [
            PixelFormat::Indexed8,
            PixelFormat::Grayscale8,
            PixelFormat::Bgra32,
            PixelFormat::Rgba32,
        ] {
            let image = gradient(17, 4, pixel_format);
            let decoded = round_trip(&image, ImageFormat::Tga, TgaOptions { rle }.into());
            assert_same_colors(&image, &decoded);
        }
    }
}

#[test]
fn blank_image_saves_to_memory() {
    let image = Image::allocate_blank(4, 4, PixelFormat::Rgba32).unwrap();
    let mut buf = [0xAAu8; 256];
    let written = image
        .save_to_memory(&mut buf, ImageFormat::Raw, &EncoderOptions::Default)
        .unwrap();
    assert_eq!(written.len(), 20 + 4 * 4 * 4);

    let decoded = Image::open_memory(written).unwrap();
    assert!(decoded.iter().all(|c| c == Rgba::new(0, 0, 0, 0)));
}

#[test]
fn buffer_too_small_is_an_io_error() {
    let image = Image::allocate_blank(8, 8, PixelFormat::Rgb24).unwrap();
    let mut buf = [0u8; 32];
    let err = image
        .save_to_memory(&mut buf, ImageFormat::Raw, &EncoderOptions::Default)
        .unwrap_err();
    assert!(matches!(err, CodecError::Io(_)), "{err:?}");
}

#[test]
fn unregistered_format_leaves_buffer_untouched() {
    let image = Image::allocate_blank(2, 2, PixelFormat::Rgba32).unwrap();
    let registry = CodecRegistry::builtin().without(ImageFormat::Tga);
    let mut buf = [0x5Au8; 128];
    let result = EncodeRequest::new(ImageFormat::Tga)
        .with_registry(&registry)
        .encode_to_memory(&image, &mut buf);
    assert!(matches!(result, Err(CodecError::UnsupportedFormat(ImageFormat::Tga))));
    assert!(buf.iter().all(|&b| b == 0x5A));
}

#[test]
fn empty_image_has_nothing_to_save() {
    let image = Image::new();
    let mut buf = [0x11u8; 16];
    let result = image.save_to_memory(&mut buf, ImageFormat::Raw, &EncoderOptions::Default);
    assert!(matches!(result, Err(CodecError::NoPixelData)));
    assert!(buf.iter().all(|&b| b == 0x11));
}

#[test]
fn options_for_another_format_are_rejected() {
    let image = Image::allocate_blank(2, 2, PixelFormat::Rgb24).unwrap();
    let options = EncoderOptions::Tga(Default::default());
    assert!(matches!(
        image.save_to_vec(ImageFormat::Raw, &options),
        Err(CodecError::InvalidOptions { .. })
    ));
}

#[test]
fn path_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradient.raw");
    let image = gradient(6, 6, PixelFormat::Rgba32);

    image
        .save_to_path(&path, ImageFormat::Raw, &EncoderOptions::Default)
        .unwrap();
    let decoded = Image::open_path(&path).unwrap();
    assert_eq!(decoded.pixels(), image.pixels());
}

#[test]
fn missing_path_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Image::open_path(dir.path().join("absent.bmp"));
    assert!(matches!(result, Err(CodecError::Io(_))));
}

#[test]
fn file_round_trip_ignores_handle_position() {
    let mut file = tempfile::tempfile().unwrap();
    let image = gradient(3, 2, PixelFormat::Grayscale16);
    image
        .save_to_file(&mut file, ImageFormat::Raw, &EncoderOptions::Default)
        .unwrap();

    // Handle sits at the end after writing.
    assert!(file.stream_position().unwrap() > 0);
    let decoded = Image::open_file(&mut file).unwrap();
    assert_eq!(decoded.pixels(), image.pixels());

    file.seek(SeekFrom::Start(5)).unwrap();
    assert!(Image::open_file(&mut file).is_ok());
}

#[test]
fn to_rgba8_matches_iteration() {
    let image = gradient(4, 3, PixelFormat::Indexed4);
    let img = image.to_rgba8().unwrap();
    assert_eq!((img.width(), img.height()), (4, 3));
    assert!(img.pixels().eq(image.iter()));
}

#[test]
fn global_registry_is_shared_across_threads() {
    let encoded: Vec<Vec<u8>> = (1..=16u32)
        .map(|n| {
            gradient(n, 17 - n, PixelFormat::Rgba32)
                .save_to_vec(ImageFormat::Raw, &EncoderOptions::Default)
                .unwrap()
        })
        .collect();

    let sizes: Vec<(u32, u32)> = encoded
        .par_iter()
        .map(|data| {
            let image = Image::open_memory(data).unwrap();
            (image.width(), image.height())
        })
        .collect();
    let expected: Vec<(u32, u32)> = (1..=16u32).map(|n| (n, 17 - n)).collect();
    assert_eq!(sizes, expected);
}

#[test]
fn pixel_edits_cannot_change_layout_or_size() {
    let mut image = Image::allocate_blank(2, 2, PixelFormat::Rgba32).unwrap();
    match image.pixels_mut().unwrap() {
        ColorStorageMut::Rgba32(p) => {
            assert_eq!(p.len(), 4);
            p.fill(Rgba::new(1, 2, 3, 4));
        }
        other => panic!("unexpected view {:?}", other.pixel_format()),
    }
    assert_eq!(image.pixel_format(), Some(PixelFormat::Rgba32));
    assert_eq!(image.pixels().unwrap().len(), 4);
    assert_eq!(image.iter().count(), 4);

    let mut taken = image.take_pixels().unwrap();
    assert_eq!(taken.view_mut().pixel_format(), PixelFormat::Rgba32);
    assert_eq!(taken.len(), 4);
}

#[test]
fn bilevel_samples_above_one_save_as_white() {
    let mut image = Image::allocate_blank(3, 1, PixelFormat::Grayscale1).unwrap();
    if let Some(ColorStorageMut::Grayscale1(p)) = image.pixels_mut() {
        p.copy_from_slice(&[255, 0, 1]);
    }
    let white = Rgba::new(255, 255, 255, 255);
    let black = Rgba::new(0, 0, 0, 255);

    let raw = round_trip(&image, ImageFormat::Raw, EncoderOptions::Default);
    assert_eq!(raw.iter().collect::<Vec<_>>(), [white, black, white]);

    #[cfg(feature = "pnm")]
    {
        let pbm = round_trip(&image, ImageFormat::Pbm, EncoderOptions::Default);
        assert_eq!(pbm.iter().collect::<Vec<_>>(), [white, black, white]);
    }
}
