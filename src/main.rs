mod args;

use std::fs;
use std::process::exit;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use mpl_nrb::batch::{self, BatchReport, FileReport, Job};
use mpl_nrb::data::correction::{self, Corrections};

use crate::args::Args;

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn load_corrections(args: &Args) -> Result<Corrections> {
    let afterpulse = args
        .afterpulse
        .as_deref()
        .map(|p| {
            correction::load_afterpulse(p)
                .with_context(|| format!("reading afterpulse file {}", p.display()))
        })
        .transpose()?;
    let overlap = args
        .overlap
        .as_deref()
        .map(|p| {
            correction::load_overlap(p)
                .with_context(|| format!("reading overlap file {}", p.display()))
        })
        .transpose()?;
    let dead_time = args
        .dead_time
        .as_deref()
        .map(|p| {
            correction::load_dead_time(p)
                .with_context(|| format!("reading dead time file {}", p.display()))
        })
        .transpose()?;

    if let Some(t) = &afterpulse {
        info!("afterpulse: {} bins, energy {}", t.range.len(), t.header.ap_energy);
    }
    if let Some(t) = &overlap {
        info!("overlap: {} bins", t.range.len());
    }
    if let Some(t) = &dead_time {
        info!("dead time: {} coefficients", t.coeff.len());
    }

    Ok(Corrections {
        afterpulse,
        overlap,
        dead_time,
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let (input, output) = args.paths();

    if input.is_none() && !args.has_corrections() {
        eprintln!("mpl-nrb: at least one correction file or input have to be specified");
        exit(1);
    }

    init_logging(args.quiet);
    let corrections = load_corrections(&args)?;

    let report = match input {
        None => {
            batch::write_corrections(&corrections, output)
                .with_context(|| format!("writing {}", output.display()))?;
            return Ok(());
        }
        Some(input) if input.is_dir() => {
            fs::create_dir_all(output)
                .with_context(|| format!("creating output directory {}", output.display()))?;
            let jobs = batch::plan(input, output)
                .with_context(|| format!("listing {}", input.display()))?;
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(args.jobs.unwrap_or(0))
                .build()
                .context("starting worker pool")?;
            pool.install(|| batch::run(&jobs, &corrections))?
        }
        Some(input) => {
            info!("{}", input.display());
            let job = Job::new(input.to_path_buf(), output.to_path_buf());
            let tables = corrections.to_dataset()?;
            let result = batch::convert(&job, &corrections, &tables);
            let report = BatchReport {
                files: vec![FileReport::new(&job, &result)],
            };
            match result {
                Ok(n) => info!("{n} profiles -> {}", output.display()),
                Err(e) => {
                    if let Some(path) = &args.report {
                        report.write_json(path)?;
                    }
                    return Err(anyhow::Error::new(e).context(format!("converting {}", input.display())));
                }
            }
            report
        }
    };

    if let Some(path) = &args.report {
        report
            .write_json(path)
            .with_context(|| format!("writing report {}", path.display()))?;
    }
    if report.failed() > 0 {
        error!("{} of {} files failed", report.failed(), report.files.len());
        exit(1);
    }
    Ok(())
}
