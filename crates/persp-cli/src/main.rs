use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use image::RgbImage;
use log::warn;
use rayon::prelude::*;
use serde::Deserialize;

use persp_core::{Real, SensorFrame};
use persp_remap::{control_points_from_arrays, PerspectiveCorrection, RemapTable};

/// Batch perspective correction driven by JSON job files.
///
/// Each job file is an array
/// `[image, focal_length_mm, crop_factor, scaling, [x...], [y...]]` with the
/// image path relative to the job file and the control points in pixel
/// coordinates of the unmodified image.
#[derive(Debug, Parser)]
#[command(author, version, about = "Perspective correction from control points")]
struct Args {
    /// JSON job files to process, one image each.
    #[arg(required = true)]
    jobs: Vec<PathBuf>,

    /// Correction strength in [-1, 1]: -1 no correction, 0 full correction,
    /// 1 over-correction by 25%.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    strength: Real,

    /// Directory for corrected images; defaults to each source image's
    /// directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

/// On-disk job record: image path, focal length (mm), crop factor, scaling,
/// control point x values, control point y values.
#[derive(Debug, Deserialize)]
struct Job(String, Real, Real, Real, Vec<Real>, Vec<Real>);

fn load_job(path: &Path) -> Result<Job> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading job file {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing job file {}", path.display()))
}

/// Nearest-neighbour copy of the source image through a remap table.
/// Unmapped and out-of-frame destination pixels stay black.
fn apply_nearest(src: &RgbImage, table: &RemapTable) -> RgbImage {
    let mut dst = RgbImage::new(table.width(), table.height());
    for (x, y, coord) in table.iter() {
        let Some(p) = coord else { continue };
        let (a, b) = (p.x.round(), p.y.round());
        if a >= 0.0 && b >= 0.0 && (a as u32) < src.width() && (b as u32) < src.height() {
            dst.put_pixel(x, y, *src.get_pixel(a as u32, b as u32));
        }
    }
    dst
}

fn output_path(image_path: &Path, output_dir: Option<&Path>) -> Result<PathBuf> {
    let stem = image_path
        .file_stem()
        .context("image path has no file name")?;
    let mut name = stem.to_os_string();
    name.push("_corrected");
    if let Some(ext) = image_path.extension() {
        name.push(".");
        name.push(ext);
    }
    let dir = match output_dir {
        Some(d) => d.to_path_buf(),
        None => image_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    Ok(dir.join(name))
}

fn process_job(job_path: &Path, strength: Real, output_dir: Option<&Path>) -> Result<PathBuf> {
    let Job(image_name, focal_length, crop_factor, scaling, xs, ys) = load_job(job_path)?;
    let image_path = job_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
        .join(&image_name);
    let src = image::open(&image_path)
        .with_context(|| format!("opening image {}", image_path.display()))?
        .to_rgb8();

    let frame = SensorFrame::new(crop_factor, src.width(), src.height());
    let correction = control_points_from_arrays(&xs, &ys)
        .and_then(|points| PerspectiveCorrection::new(&frame, focal_length, &points, strength));

    let dst = match correction {
        Ok(correction) => {
            let table = RemapTable::build(&frame, &correction, scaling);
            apply_nearest(&src, &table)
        }
        Err(err) => {
            warn!(
                "{}: {err}; passing image through unmodified",
                job_path.display()
            );
            src
        }
    };

    let out = output_path(&image_path, output_dir)?;
    dst.save(&out)
        .with_context(|| format!("writing {}", out.display()))?;
    Ok(out)
}

fn run(args: &Args) -> Result<()> {
    let results: Vec<(PathBuf, Result<PathBuf>)> = args
        .jobs
        .par_iter()
        .map(|job| {
            (
                job.clone(),
                process_job(job, args.strength, args.output_dir.as_deref()),
            )
        })
        .collect();

    let mut failures = 0usize;
    for (job, result) in &results {
        match result {
            Ok(out) => println!("{} -> {}", job.display(), out.display()),
            Err(err) => {
                eprintln!("{}: {err:#}", job.display());
                failures += 1;
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} jobs failed", results.len());
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(err) = run(&args) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
