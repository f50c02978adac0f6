//! zimg: inspect and convert images with zenimage.
//!
//! Every format the library was built with is detected from file contents,
//! never from the extension.

mod batch;
mod convert;
mod info;
mod output;

use std::path::Path;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use zenimage::{
    EncoderOptions, ImageFormat, PngCompression, PngOptions, PnmEncoding, PnmOptions, TgaOptions,
};

#[derive(Parser, Debug)]
#[command(name = "zimg", version, about = "Inspect and convert images")]
struct Cli {
    /// More log output (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect and decode images, then print their properties.
    Info(InfoArgs),

    /// Decode images and encode them to another format.
    Convert(Box<ConvertArgs>),
}

/// Arguments for the `info` subcommand.
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Input files, directories or glob patterns.
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `convert` subcommand.
#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// Input files, directories or glob patterns.
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Output file or directory (dir/ with trailing slash for batch).
    #[arg(short, long)]
    pub output: Option<String>,

    /// Target format. Defaults to the -o extension, then the input's format.
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// PNG deflate effort.
    #[arg(long, value_enum)]
    pub compression: Option<CompressionArg>,

    /// Write PBM/PGM/PPM as plain ASCII (P1/P2/P3).
    #[arg(long)]
    pub ascii: bool,

    /// Run-length encode TGA output.
    #[arg(long)]
    pub rle: bool,

    /// Allow overwriting existing files.
    #[arg(long)]
    pub force: bool,

    /// Number of parallel workers (default: CPU count).
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Print summary report after batch conversion.
    #[arg(long)]
    pub report: bool,
}

/// Target image format.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FormatArg {
    Bmp,
    Pbm,
    Pcx,
    Pgm,
    Png,
    Ppm,
    Raw,
    Tga,
}

impl FormatArg {
    pub fn to_image_format(self) -> ImageFormat {
        match self {
            FormatArg::Bmp => ImageFormat::Bmp,
            FormatArg::Pbm => ImageFormat::Pbm,
            FormatArg::Pcx => ImageFormat::Pcx,
            FormatArg::Pgm => ImageFormat::Pgm,
            FormatArg::Png => ImageFormat::Png,
            FormatArg::Ppm => ImageFormat::Ppm,
            FormatArg::Raw => ImageFormat::Raw,
            FormatArg::Tga => ImageFormat::Tga,
        }
    }
}

/// PNG compression level.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CompressionArg {
    Fast,
    Balanced,
    High,
}

impl ConvertArgs {
    /// Resolve the target format from --format or the -o extension.
    /// `None` keeps each input's own format.
    pub fn resolve_format(&self) -> Option<ImageFormat> {
        if let Some(fmt) = self.format {
            return Some(fmt.to_image_format());
        }

        self.output
            .as_deref()
            .and_then(|out| Path::new(out).extension())
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension)
    }

    /// Encoder options for `format` built from the format-specific flags.
    pub fn encoder_options(&self, format: ImageFormat) -> EncoderOptions {
        match format {
            ImageFormat::Png => match self.compression {
                Some(level) => PngOptions {
                    compression: match level {
                        CompressionArg::Fast => PngCompression::Fast,
                        CompressionArg::Balanced => PngCompression::Balanced,
                        CompressionArg::High => PngCompression::High,
                    },
                }
                .into(),
                None => EncoderOptions::Default,
            },
            ImageFormat::Pbm | ImageFormat::Pgm | ImageFormat::Ppm if self.ascii => PnmOptions {
                encoding: PnmEncoding::Ascii,
            }
            .into(),
            ImageFormat::Tga if self.rle => TgaOptions { rle: true }.into(),
            _ => EncoderOptions::Default,
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("zimg={default_level},zenimage={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Info(args) => info::run(args),
        Command::Convert(args) => convert::run(*args),
    }
}
