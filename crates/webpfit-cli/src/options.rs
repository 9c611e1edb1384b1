//! Command-line arguments and the batch options derived from them.

use std::path::PathBuf;

use clap::Parser;
use webpfit_core::encode::{FINAL_EFFORT, MAX_EFFORT, MAX_QUALITY};
use webpfit_core::ConversionMode;

pub const DEFAULT_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff", "gif", "webp"];

/// Convert images to WebP at a fixed quality or under a size limit.
#[derive(Debug, Parser)]
#[command(name = "webpfit", version, about)]
pub struct Args {
    /// Input file or directory (directories are walked recursively)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file or directory (default: next to the input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Quality 0-100; 100 encodes lossless
    #[arg(short, long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_QUALITY)))]
    pub quality: u8,

    /// Compression effort 0-6
    #[arg(short = 'c', long, default_value_t = FINAL_EFFORT, value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_EFFORT)))]
    pub effort: u8,

    /// Largest allowed output size in bytes; picks the highest quality that fits
    #[arg(long, value_name = "BYTES", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_size: Option<u64>,

    /// Allow downscaling when no quality fits under --max-size
    #[arg(long, requires = "max_size")]
    pub downscale: bool,

    /// Text appended to each output file stem
    #[arg(long, default_value = "")]
    pub postfix: String,

    /// Delete each source file after it converts successfully
    #[arg(long)]
    pub delete_original: bool,

    /// Comma-separated input extensions to convert
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_EXTENSIONS.map(String::from))]
    pub extensions: Vec<String>,

    /// Worker threads (default: available parallelism)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Everything a batch run needs, independent of how it was parsed.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub mode: ConversionMode,
    pub output: Option<PathBuf>,
    pub postfix: String,
    pub delete_original: bool,
    /// Lowercase, without the leading dot.
    pub extensions: Vec<String>,
    pub jobs: Option<usize>,
}

impl ConvertOptions {
    pub fn from_args(args: &Args) -> Self {
        let mode = match args.max_size {
            Some(max_bytes) => ConversionMode::SizeLimit {
                max_bytes,
                allow_downscale: args.downscale,
            },
            None => ConversionMode::Quality {
                quality: args.quality,
                effort: args.effort,
            },
        };

        let extensions = args
            .extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Self {
            mode,
            output: args.output.clone(),
            postfix: args.postfix.clone(),
            delete_original: args.delete_original,
            extensions,
            jobs: args.jobs.filter(|&jobs| jobs > 0),
        }
    }

    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}
