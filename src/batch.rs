use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use log::{error, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::data::correction::Corrections;
use crate::data::loader;
use crate::data::model::{Dataset, Dim};
use crate::error::{Error, Result};
use crate::nrb;
use crate::output::{self, OUTPUT_EXTENSION};

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// One input file and where its conversion goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Earlier input in the same plan that already writes `output`.
    pub clashes_with: Option<PathBuf>,
}

impl Job {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self {
            input,
            output,
            clashes_with: None,
        }
    }
}

/// Output path for `name` inside `dir`: the extension is replaced.
pub fn output_name(dir: &Path, input: &Path) -> PathBuf {
    let mut name = input.file_stem().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(OUTPUT_EXTENSION);
    dir.join(name)
}

/// Expand an input path into jobs.
///
/// A directory yields one job per regular file, sorted by name, written
/// into `output` as a directory. A file maps straight onto `output`.
/// Inputs differing only in extension share an output name; every one
/// after the first is marked as clashing and will not be converted.
pub fn plan(input: &Path, output: &Path) -> io::Result<Vec<Job>> {
    if !input.is_dir() {
        return Ok(vec![Job::new(input.to_path_buf(), output.to_path_buf())]);
    }

    let mut inputs = Vec::new();
    for entry in fs::read_dir(input)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            inputs.push(entry.path());
        }
    }
    inputs.sort();

    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    Ok(inputs
        .into_iter()
        .map(|input| {
            let mut job = Job::new(input, PathBuf::new());
            job.output = output_name(output, &job.input);
            job.clashes_with = claimed.get(&job.output).cloned();
            claimed
                .entry(job.output.clone())
                .or_insert_with(|| job.input.clone());
            job
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Convert one file; returns the number of profiles written.
///
/// `tables` is `corrections.to_dataset()`, built once per run.
pub fn convert(job: &Job, corrections: &Corrections, tables: &Dataset) -> Result<usize> {
    if let Some(first) = &job.clashes_with {
        return Err(Error::OutputClash {
            output: job.output.clone(),
            first: first.clone(),
        });
    }
    let mut ds = loader::load_file(&job.input)?;
    let profiles = ds.dim_len(Dim::Profile).unwrap_or(0);
    ds.merge(tables)?;
    nrb::process_nrb(&mut ds, corrections)?;
    output::write_parquet(&ds, &job.output)?;
    Ok(profiles)
}

/// Write only the correction tables.
pub fn write_corrections(corrections: &Corrections, output: &Path) -> Result<()> {
    output::write_parquet(&corrections.to_dataset()?, output)
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of one job.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiles: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    pub fn new(job: &Job, result: &Result<usize>) -> Self {
        Self {
            input: job.input.clone(),
            output: job.output.clone(),
            profiles: result.as_ref().ok().copied(),
            error: result.as_ref().err().map(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_some()).count()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

/// Convert every job on the current rayon pool.
///
/// A failing file is logged and recorded; the others still run.
pub fn run(jobs: &[Job], corrections: &Corrections) -> Result<BatchReport> {
    let tables = corrections.to_dataset()?;
    let files = jobs
        .par_iter()
        .map(|job| {
            info!("{}", job.input.display());
            let result = convert(job, corrections, &tables);
            match &result {
                Ok(n) => info!("{}: {n} profiles -> {}", job.input.display(), job.output.display()),
                Err(e) => error!("{}: {e}", job.input.display()),
            }
            FileReport::new(job, &result)
        })
        .collect();
    Ok(BatchReport { files })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::correction::OverlapTable;
    use crate::data::header::ProfileHeader;
    use crate::data::record::Profile;
    use tempfile::TempDir;

    fn write_mpl(path: &Path, profiles: usize) {
        let mut buf = Vec::new();
        for i in 0..profiles {
            Profile {
                header: ProfileHeader {
                    year: 2022,
                    month: 6,
                    day: 1,
                    minutes: i as u16,
                    number_bins: 3,
                    energy_monitor: 1000,
                    bin_time: 1e-7,
                    ..Default::default()
                },
                channel_1: vec![1.0, 2.0, 3.0],
                channel_2: vec![4.0, 5.0, 6.0],
            }
            .encode(&mut buf)
            .unwrap();
        }
        fs::write(path, buf).unwrap();
    }

    #[test]
    fn output_name_replaces_only_last_extension() {
        let out = Path::new("/out");
        assert_eq!(output_name(out, Path::new("/in/a.mpl")), Path::new("/out/a.parquet"));
        assert_eq!(output_name(out, Path::new("/in/a.b.mpl")), Path::new("/out/a.b.parquet"));
        assert_eq!(output_name(out, Path::new("/in/noext")), Path::new("/out/noext.parquet"));
    }

    #[test]
    fn directory_plan_has_one_output_per_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        fs::create_dir(&input).unwrap();
        for name in ["c.mpl", "a.mpl", "b.MPL"] {
            fs::write(input.join(name), b"").unwrap();
        }
        fs::create_dir(input.join("nested")).unwrap();

        let jobs = plan(&input, Path::new("out")).unwrap();
        let inputs: Vec<_> = jobs.iter().map(|j| j.input.file_name().unwrap().to_owned()).collect();
        let outputs: Vec<_> = jobs.iter().map(|j| j.output.clone()).collect();
        assert_eq!(inputs, ["a.mpl", "b.MPL", "c.mpl"]);
        assert_eq!(
            outputs,
            [
                PathBuf::from("out/a.parquet"),
                PathBuf::from("out/b.parquet"),
                PathBuf::from("out/c.parquet")
            ]
        );
    }

    #[test]
    fn batch_continues_past_a_bad_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir(&input).unwrap();
        fs::create_dir(&output).unwrap();
        write_mpl(&input.join("good1.mpl"), 2);
        write_mpl(&input.join("good2.mpl"), 5);
        fs::write(input.join("broken.mpl"), [0u8; 40]).unwrap();

        let corrections = Corrections {
            overlap: Some(OverlapTable {
                range: vec![0.0, 10.0],
                overlap: vec![1.0, 1.0],
            }),
            ..Default::default()
        };
        let jobs = plan(&input, &output).unwrap();
        let report = run(&jobs, &corrections).unwrap();

        assert_eq!(report.files.len(), 3);
        assert_eq!(report.failed(), 1);
        assert!(report.files[0].error.is_some());
        assert_eq!(report.files[1].profiles, Some(2));
        assert_eq!(report.files[2].profiles, Some(5));

        let mut written: Vec<_> = fs::read_dir(&output)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        written.sort();
        assert_eq!(written, ["good1.parquet", "good2.parquet"]);

        let report_path = dir.path().join("report.json");
        report.write_json(&report_path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(report_path).unwrap()).unwrap();
        assert_eq!(json["files"][1]["profiles"], 2);
        assert!(json["files"][0]["error"].as_str().unwrap().contains("incomplete header"));
    }

    #[test]
    fn inputs_sharing_a_stem_do_not_share_an_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir(&input).unwrap();
        fs::create_dir(&output).unwrap();
        write_mpl(&input.join("a.dat"), 1);
        write_mpl(&input.join("a.mpl"), 3);
        write_mpl(&input.join("b.mpl"), 2);

        let jobs = plan(&input, &output).unwrap();
        assert_eq!(jobs[0].clashes_with, None);
        assert_eq!(jobs[1].clashes_with, Some(input.join("a.dat")));
        assert_eq!(jobs[2].clashes_with, None);

        let report = run(&jobs, &Corrections::default()).unwrap();
        assert_eq!(report.failed(), 1);
        assert_eq!(report.files[0].profiles, Some(1));
        let message = report.files[1].error.as_deref().unwrap();
        assert!(message.contains("a.dat"), "{message}");
        assert_eq!(report.files[2].profiles, Some(2));

        // the surviving output is the first input's
        let ds_file = File::open(output.join("a.parquet")).unwrap();
        let builder =
            parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder::try_new(ds_file).unwrap();
        assert_eq!(builder.metadata().file_metadata().num_rows(), 1);
    }

    #[test]
    fn corrections_only_output_is_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tables.parquet");
        let corrections = Corrections {
            overlap: Some(OverlapTable {
                range: vec![0.0, 1.0],
                overlap: vec![0.3, 1.0],
            }),
            ..Default::default()
        };
        write_corrections(&corrections, &path).unwrap();
        assert!(path.metadata().unwrap().len() > 0);
    }
}
