use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mpl-nrb",
    version,
    about = "Convert Micro Pulse Lidar (MPL) data files to Parquet with normalized relative backscatter",
    long_about = None,
    disable_version_flag = true,
    after_help = "Examples:\n  mpl-nrb -a afterpulse.bin -o overlap.bin -d deadtime.bin 202103041200.mpl 202103041200.parquet\n  mpl-nrb -a afterpulse.bin -o overlap.bin mpl/ parquet/\n  mpl-nrb -a afterpulse.bin afterpulse.parquet\n"
)]
pub struct Args {
    /// Afterpulse correction file (bin)
    #[arg(short = 'a', long, value_name = "FILE")]
    pub afterpulse: Option<PathBuf>,

    /// Dead time correction file (bin)
    #[arg(short = 'd', long = "dead-time", value_name = "FILE")]
    pub dead_time: Option<PathBuf>,

    /// Overlap correction file (bin)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub overlap: Option<PathBuf>,

    /// Run quietly (suppress progress output)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Worker threads for directory input (default: one per CPU)
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Write a JSON summary of converted files
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    #[allow(dead_code)]
    version: Option<bool>,

    /// Input file or directory (MPL); the output when given alone
    #[arg(value_name = "INPUT")]
    first: PathBuf,

    /// Output file or directory (Parquet)
    #[arg(value_name = "OUTPUT")]
    second: Option<PathBuf>,
}

impl Args {
    /// `(input, output)`; a lone positional is the output path.
    pub fn paths(&self) -> (Option<&Path>, &Path) {
        match &self.second {
            Some(output) => (Some(self.first.as_path()), output.as_path()),
            None => (None, self.first.as_path()),
        }
    }

    pub fn has_corrections(&self) -> bool {
        self.afterpulse.is_some() || self.overlap.is_some() || self.dead_time.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lone_positional_is_the_output() {
        let args = Args::try_parse_from(["mpl-nrb", "-a", "ap.bin", "out.parquet"]).unwrap();
        assert_eq!(args.paths(), (None, Path::new("out.parquet")));
        assert!(args.has_corrections());
    }

    #[test]
    fn two_positionals_are_input_then_output() {
        let args = Args::try_parse_from(["mpl-nrb", "-q", "-j", "2", "in/", "out/"]).unwrap();
        assert_eq!(args.paths(), (Some(Path::new("in/")), Path::new("out/")));
        assert!(args.quiet);
        assert_eq!(args.jobs, Some(2));
        assert!(!args.has_corrections());
    }

    #[test]
    fn short_v_prints_version() {
        let err = Args::try_parse_from(["mpl-nrb", "-v"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
