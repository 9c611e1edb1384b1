//! webpfit - batch WebP conversion with optional size limits.

mod batch;
mod logging;
mod options;

use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use webpfit_core::WebpEncoder;

use crate::batch::Summary;
use crate::options::{Args, ConvertOptions};

fn run(args: &Args) -> anyhow::Result<Summary> {
    let options = ConvertOptions::from_args(args);
    let jobs = batch::plan_jobs(&args.input, &options)?;
    if jobs.is_empty() {
        tracing::warn!(input = %args.input.display(), "no matching images found");
        return Ok(Summary::default());
    }
    batch::run(&WebpEncoder, &jobs, &options)
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = logging::init(args.verbose) {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(summary) if summary.failed == 0 => ExitCode::SUCCESS,
        Ok(summary) => {
            error!(failed = summary.failed, "some files could not be converted");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
