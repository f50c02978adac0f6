//! Decode → encode conversion, single file or batch.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use zenimage::{CodecError, ColorStorageMut, Gray, Image, ImageFormat, PixelFormat, Rgb, Rgba};

use crate::ConvertArgs;
use crate::batch::{self, BatchSummary, FileResult};
use crate::output::OutputConfig;

/// Run the `convert` subcommand.
pub fn run(args: ConvertArgs) -> anyhow::Result<()> {
    let files = batch::expand_inputs(&args.files)?;

    if files.is_empty() {
        anyhow::bail!("no image files found");
    }

    let output_config = OutputConfig::new(args.output.as_deref(), args.force, args.resolve_format());
    let input_count = files.len();

    let summary = if let [path] = files.as_slice() {
        let result = convert_one(path, &args, &output_config, input_count);
        match (&result.error, result.output_size, &result.output_path) {
            (Some(err), _, _) => eprintln!("error: {}: {}", path.display(), err),
            (None, Some(out_size), Some(out_path)) => eprintln!(
                "{} -> {} ({}, {})",
                batch::format_size(result.input_size),
                batch::format_size(out_size),
                out_path.display(),
                batch::percent_change(result.input_size, out_size),
            ),
            _ => {}
        }
        BatchSummary {
            results: vec![result],
        }
    } else {
        let jobs = args.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("=>-"),
        );

        let results = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let result = convert_one(path, &args, &output_config, input_count);
                    if let Some(ref err) = result.error {
                        pb.println(format!("error: {}: {}", path.display(), err));
                    }
                    pb.inc(1);
                    result
                })
                .collect()
        });
        pb.finish_and_clear();
        BatchSummary { results }
    };

    if args.report {
        summary.print_report();
    }

    match summary.error_count() {
        0 => Ok(()),
        n => anyhow::bail!("{n} of {} files failed", summary.results.len()),
    }
}

/// Convert a single file, catching errors into a [`FileResult`].
fn convert_one(
    input: &Path,
    args: &ConvertArgs,
    output_config: &OutputConfig,
    input_count: usize,
) -> FileResult {
    let start = Instant::now();
    let input_size = input.metadata().map(|m| m.len()).unwrap_or(0);

    let (output_path, output_size, error) =
        match convert_inner(input, args, output_config, input_count) {
            Ok((path, size)) => (Some(path), Some(size), None),
            Err(e) => (None, None, Some(format!("{e:#}"))),
        };
    FileResult {
        input_path: input.to_path_buf(),
        input_size,
        output_size,
        output_path,
        error,
        duration: start.elapsed(),
    }
}

fn convert_inner(
    input: &Path,
    args: &ConvertArgs,
    output_config: &OutputConfig,
    input_count: usize,
) -> anyhow::Result<(PathBuf, u64)> {
    let image = Image::open_path(input).with_context(|| format!("decoding {}", input.display()))?;
    let target = output_config
        .target_format
        .unwrap_or(image.image_format());
    let options = args.encoder_options(target);

    let encoded = match image.save_to_vec(target, &options) {
        Err(CodecError::UnsupportedPixelFormat { pixel_format, .. }) => {
            let layout = fallback_layout(target);
            tracing::info!(
                input = %input.display(),
                from = ?pixel_format,
                to = ?layout,
                "converting pixels for {target}"
            );
            flatten(&image, layout)?.save_to_vec(target, &options)
        }
        other => other,
    }
    .with_context(|| format!("encoding {} as {target}", input.display()))?;

    let output_path = output_config.resolve(input, input_count)?;
    output_config.check_writable(input, &output_path)?;
    OutputConfig::ensure_parent(&output_path)?;
    std::fs::write(&output_path, &encoded)
        .with_context(|| format!("writing {}", output_path.display()))?;

    Ok((output_path, encoded.len() as u64))
}

/// Pixel layout every encoder for `format` accepts.
fn fallback_layout(format: ImageFormat) -> PixelFormat {
    match format {
        ImageFormat::Pbm => PixelFormat::Grayscale1,
        ImageFormat::Pgm => PixelFormat::Grayscale8,
        ImageFormat::Ppm | ImageFormat::Pcx => PixelFormat::Rgb24,
        _ => PixelFormat::Rgba32,
    }
}

/// Rec. 601 luma.
fn luma(c: Rgba<u8>) -> u8 {
    ((c.r as u32 * 299 + c.g as u32 * 587 + c.b as u32 * 114 + 500) / 1000) as u8
}

/// Copy `image` into a blank image of `layout`, going through 8-bit RGBA.
fn flatten(image: &Image, layout: PixelFormat) -> anyhow::Result<Image> {
    let mut out = Image::allocate_blank(image.width(), image.height(), layout)?;
    let colors = image.iter();
    match out.pixels_mut() {
        Some(ColorStorageMut::Grayscale1(p)) => {
            for (dst, c) in p.iter_mut().zip(colors) {
                *dst = u8::from(luma(c) >= 128);
            }
        }
        Some(ColorStorageMut::Grayscale8(p)) => {
            for (dst, c) in p.iter_mut().zip(colors) {
                *dst = Gray::new(luma(c));
            }
        }
        Some(ColorStorageMut::Rgb24(p)) => {
            for (dst, c) in p.iter_mut().zip(colors) {
                *dst = Rgb::new(c.r, c.g, c.b);
            }
        }
        Some(ColorStorageMut::Rgba32(p)) => {
            for (dst, c) in p.iter_mut().zip(colors) {
                *dst = c;
            }
        }
        _ => anyhow::bail!("cannot convert pixels to {layout:?}"),
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_to_bilevel_thresholds_luma() {
        let mut image = Image::allocate_blank(2, 1, PixelFormat::Rgb24).unwrap();
        if let Some(ColorStorageMut::Rgb24(p)) = image.pixels_mut() {
            p[0] = Rgb::new(250, 250, 250);
            p[1] = Rgb::new(10, 20, 30);
        }
        let flat = flatten(&image, PixelFormat::Grayscale1).unwrap();
        assert_eq!(flat.pixel_format(), Some(PixelFormat::Grayscale1));
        let levels: Vec<u8> = flat.iter().map(|c| c.r).collect();
        assert_eq!(levels, [255, 0]);
    }

    #[test]
    fn rgba_image_becomes_writable_as_ppm() {
        let image = Image::allocate_blank(3, 3, PixelFormat::Rgba64).unwrap();
        assert!(matches!(
            image.save_to_vec(ImageFormat::Ppm, &Default::default()),
            Err(CodecError::UnsupportedPixelFormat { .. })
        ));
        let flat = flatten(&image, fallback_layout(ImageFormat::Ppm)).unwrap();
        let bytes = flat.save_to_vec(ImageFormat::Ppm, &Default::default()).unwrap();
        assert!(bytes.starts_with(b"P6"));
    }
}
