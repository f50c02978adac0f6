//! # zenimage
//!
//! Format-agnostic image container with pluggable codec backends.
//!
//! An [`Image`] is opened from a path, a file or memory. Every registered
//! [`FormatCodec`] is asked in turn whether it recognizes the data; the first
//! match decodes into format-tagged [`ColorStorage`]. Saving goes the other
//! way, to an explicit [`ImageFormat`].
//!
//! Each backend except the raw container is feature-gated:
//!
//! ```toml
//! [dependencies]
//! zenimage = { version = "0.1", default-features = false, features = ["png", "tga"] }
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use zenimage::{EncoderOptions, Image, ImageFormat, TgaOptions};
//!
//! // Detect and decode
//! let image = Image::open_path("input.bmp")?;
//! println!("{}x{} {:?}", image.width(), image.height(), image.pixel_format());
//! for color in &image {
//!     let _ = (color.r, color.g, color.b, color.a);
//! }
//!
//! // Encode to a different format
//! let options = EncoderOptions::Tga(TgaOptions { rle: true });
//! image.save_to_path("output.tga", ImageFormat::Tga, &options)?;
//! # Ok::<(), zenimage::CodecError>(())
//! ```
//!
//! ## Formats
//!
//! | Format | Feature | Decodes | Encodes |
//! |--------|---------|---------|---------|
//! | BMP | `bmp` | 1/4/8-bit indexed, 24/32-bit | indexed, BGR(A), RGB(A) |
//! | PBM/PGM/PPM | `pnm` | plain and raw, 8/16-bit | same |
//! | PCX | `pcx` | 1-bit, EGA, VGA, 24-bit | same |
//! | PNG | `png` | all color types, expanded | 8/16-bit gray, RGB(A) |
//! | TGA | `tga` | indexed, gray, 15/16/24/32-bit, RLE | same |
//! | Raw | always | every [`PixelFormat`] | every [`PixelFormat`] |

#![forbid(unsafe_code)]

extern crate alloc;

mod codec;
mod codecs;
mod config;
mod decode;
mod encode;
mod error;
mod format;
mod image;
mod info;
mod limits;
mod pixel;
mod registry;
mod storage;
mod stream;

// Re-exports
pub use codec::{DecodeOutput, FormatCodec};
pub use config::{
    EncoderOptions, PngCompression, PngOptions, PnmEncoding, PnmOptions, TgaOptions,
};
pub use decode::{DecodeRequest, Source};
pub use encode::EncodeRequest;
pub use error::CodecError;
pub use format::ImageFormat;
pub use image::Image;
pub use info::{ImageInfo, ImageSaveInfo, detect_format, detect_format_with_registry};
pub use limits::Limits;
pub use pixel::{BGR, BGRA, Gray, GrayAlpha, PixelFormat, Rgb, Rgb555, Rgba};
pub use registry::{CodecRegistry, all_formats};
pub use storage::{ColorStorage, ColorStorageMut, Colors, Indexed, IndexedMut};
pub use stream::Stream;

pub use imgref::ImgVec;
