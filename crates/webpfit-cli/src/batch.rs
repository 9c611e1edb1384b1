//! Batch conversion: job planning, the worker pool, and progress reporting.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use anyhow::{bail, Context};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use webpfit_core::{convert, load_image, EncodeParameters, EncodedImage, Encoder};

use crate::options::ConvertOptions;

const WEBP_EXTENSION: &str = "webp";

/// One source file and where its WebP output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Per-file events sent from workers to the reporter thread.
#[derive(Debug)]
pub enum Progress {
    Finished {
        source: PathBuf,
        target: PathBuf,
        bytes: usize,
        params: EncodeParameters,
        width: u32,
        height: u32,
        downscales: u32,
    },
    Failed {
        source: PathBuf,
        error: String,
    },
}

/// Counts collected by the reporter once every worker is done.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub converted: usize,
    pub failed: usize,
}

/// Work out the source/target pairs for `input`.
///
/// A file input maps to a single job. A directory is walked recursively and
/// outputs mirror its layout under the output directory.
pub fn plan_jobs(input: &Path, options: &ConvertOptions) -> anyhow::Result<Vec<Job>> {
    if input.is_file() {
        let target = match &options.output {
            Some(out) if is_webp_path(out) && !out.is_dir() => out.clone(),
            Some(dir) => dir.join(output_name(input, &options.postfix)),
            None => input.with_file_name(output_name(input, &options.postfix)),
        };
        return Ok(vec![Job {
            source: input.to_path_buf(),
            target,
        }]);
    }

    if !input.is_dir() {
        bail!("Input {} does not exist", input.display());
    }

    let out_root = options.output.as_deref().unwrap_or(input);
    let mut sources = Vec::new();
    collect_files(input, options, &mut sources)?;
    sources.sort();

    let mut jobs = sources
        .into_iter()
        .map(|source| {
            let relative = source
                .strip_prefix(input)
                .with_context(|| format!("{} is outside {}", source.display(), input.display()))?;
            let dir = relative.parent().map_or_else(|| out_root.to_path_buf(), |p| out_root.join(p));
            let target = dir.join(output_name(&source, &options.postfix));
            Ok(Job { source, target })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    resolve_collisions(&mut jobs, &options.postfix)?;
    Ok(jobs)
}

/// Give sources that share a stem (`a.png`, `a.bmp`) distinct targets.
///
/// A WebP source re-encoded in place keeps its name; every other member of a
/// colliding group gets its source extension kept in the name (`a.png.webp`).
/// Fails if two jobs would still write the same file.
fn resolve_collisions(jobs: &mut [Job], postfix: &str) -> anyhow::Result<()> {
    let mut groups: HashMap<PathBuf, Vec<usize>> = HashMap::new();
    for (index, job) in jobs.iter().enumerate() {
        groups.entry(job.target.clone()).or_default().push(index);
    }

    for indices in groups.into_values().filter(|indices| indices.len() > 1) {
        for index in indices {
            let job = &mut jobs[index];
            if job.source != job.target {
                job.target = job.target.with_file_name(qualified_name(&job.source, postfix));
            }
        }
    }

    let mut claimed: HashMap<&Path, &Path> = HashMap::new();
    for job in jobs.iter() {
        if let Some(other) = claimed.insert(&job.target, &job.source) {
            bail!(
                "{} and {} would both be written to {}",
                other.display(),
                job.source.display(),
                job.target.display()
            );
        }
    }
    Ok(())
}

fn collect_files(dir: &Path, options: &ConvertOptions, out: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read {}", dir.display()))?
            .path();
        if path.is_dir() {
            collect_files(&path, options, out)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| options.accepts_extension(ext))
        {
            out.push(path);
        }
    }
    Ok(())
}

fn is_webp_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(WEBP_EXTENSION))
}

fn output_name(source: &Path, postfix: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    format!("{stem}{postfix}.{WEBP_EXTENSION}")
}

fn qualified_name(source: &Path, postfix: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let ext = source
        .extension()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    format!("{stem}{postfix}.{ext}.{WEBP_EXTENSION}")
}

/// Load, convert and write a single file, then delete the source if asked.
pub fn convert_file<E: Encoder + ?Sized>(
    encoder: &E,
    job: &Job,
    options: &ConvertOptions,
) -> anyhow::Result<EncodedImage> {
    let image = load_image(&job.source)
        .with_context(|| format!("Failed to load {}", job.source.display()))?;
    debug!(source = %job.source.display(), image.width, image.height, "loaded");

    let encoded = convert(encoder, &image, &options.mode)
        .with_context(|| format!("Failed to convert {}", job.source.display()))?;

    if let Some(parent) = job.target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&job.target, &encoded.data)
        .with_context(|| format!("Failed to write {}", job.target.display()))?;

    if options.delete_original && !same_file(&job.source, &job.target) {
        fs::remove_file(&job.source)
            .with_context(|| format!("Failed to delete {}", job.source.display()))?;
        debug!(source = %job.source.display(), "deleted original");
    }

    Ok(encoded)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Run every job on a rayon pool, reporting through a channel.
///
/// A failing file is reported and counted; it never stops the others.
pub fn run<E: Encoder + ?Sized>(
    encoder: &E,
    jobs: &[Job],
    options: &ConvertOptions,
) -> anyhow::Result<Summary> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs.unwrap_or(0))
        .build()
        .context("Failed to build worker pool")?;

    info!(files = jobs.len(), threads = pool.current_num_threads(), "starting conversion");

    let (tx, rx) = mpsc::channel();
    let total = jobs.len();
    let reporter = thread::spawn(move || report(rx, total));

    pool.install(|| {
        jobs.par_iter().for_each_with(tx, |tx, job| {
            let event = match convert_file(encoder, job, options) {
                Ok(encoded) => Progress::Finished {
                    source: job.source.clone(),
                    target: job.target.clone(),
                    bytes: encoded.len(),
                    params: encoded.params,
                    width: encoded.width,
                    height: encoded.height,
                    downscales: encoded.downscales,
                },
                Err(err) => Progress::Failed {
                    source: job.source.clone(),
                    error: format!("{err:#}"),
                },
            };
            // The reporter only stops once every sender is gone.
            let _ = tx.send(event);
        });
    });

    reporter
        .join()
        .map_err(|_| anyhow::anyhow!("Progress reporter panicked"))
}

fn report(rx: Receiver<Progress>, total: usize) -> Summary {
    let mut summary = Summary::default();

    for event in rx {
        match event {
            Progress::Finished {
                source,
                target,
                bytes,
                params,
                width,
                height,
                downscales,
            } => {
                summary.converted += 1;
                info!(
                    done = summary.converted + summary.failed,
                    total,
                    bytes,
                    quality = params.quality,
                    effort = params.effort,
                    lossless = params.lossless,
                    width,
                    height,
                    downscales,
                    "{} -> {}",
                    source.display(),
                    target.display()
                );
            }
            Progress::Failed { source, error } => {
                summary.failed += 1;
                warn!(
                    done = summary.converted + summary.failed,
                    total,
                    "{}: {error}",
                    source.display()
                );
            }
        }
    }

    info!(converted = summary.converted, failed = summary.failed, "finished");
    summary
}
