//! Image inspection: detect, decode, and print properties.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use zenimage::Image;

use crate::InfoArgs;
use crate::batch;

/// Run the `info` subcommand.
pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let files = batch::expand_inputs(&args.files)?;

    if files.is_empty() {
        anyhow::bail!("no image files found");
    }

    let multi = files.len() > 1;
    let mut failures = 0usize;

    for (i, path) in files.iter().enumerate() {
        if multi && !args.json {
            if i > 0 {
                println!();
            }
            println!("{}:", path.display());
        }

        match inspect_file(path) {
            Ok(info) => {
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&info)?);
                } else {
                    print_info(&info);
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("  error: {e:#}");
            }
        }
    }

    if failures == files.len() {
        anyhow::bail!("no file could be read");
    }
    Ok(())
}

/// Decode a single file and collect what it reports.
fn inspect_file(path: &Path) -> anyhow::Result<ImageInfoDisplay> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let image =
        Image::open_memory(&data).with_context(|| format!("decoding {}", path.display()))?;
    let pixel_format = image
        .pixel_format()
        .context("decoder produced no pixels")?;
    let format = image.image_format();

    Ok(ImageInfoDisplay {
        path: path.display().to_string(),
        format: format.name().to_string(),
        mime_type: format.mime_type().to_string(),
        width: image.width(),
        height: image.height(),
        pixel_format: format!("{pixel_format:?}"),
        bits_per_pixel: pixel_format.bits_per_pixel(),
        channels: pixel_format.channels(),
        has_alpha: pixel_format.has_alpha(),
        palette_size: image.pixels().and_then(|p| p.palette()).map(<[_]>::len),
        file_size: data.len() as u64,
    })
}

#[derive(Debug, Serialize)]
struct ImageInfoDisplay {
    path: String,
    format: String,
    mime_type: String,
    width: u32,
    height: u32,
    pixel_format: String,
    bits_per_pixel: u32,
    channels: usize,
    has_alpha: bool,
    palette_size: Option<usize>,
    file_size: u64,
}

fn print_info(info: &ImageInfoDisplay) {
    println!("  Format:       {} ({})", info.format, info.mime_type);
    println!("  Dimensions:   {}x{}", info.width, info.height);
    println!(
        "  Pixels:       {} ({} bpp, {} channels)",
        info.pixel_format, info.bits_per_pixel, info.channels
    );
    if let Some(size) = info.palette_size {
        println!("  Palette:      {size} entries");
    }
    println!(
        "  Alpha:        {}",
        if info.has_alpha { "yes" } else { "no" }
    );
    println!("  File size:    {}", batch::format_size(info.file_size));
}
