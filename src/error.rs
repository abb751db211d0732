use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::data::model::{DType, Dim};

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// FormatError – malformed or truncated binary input
// ---------------------------------------------------------------------------

/// Errors raised while decoding instrument records or correction files.
///
/// Any of these aborts the file (or correction source) being read; no
/// partial result is ever returned alongside them.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Fewer bytes were available than the layout requires
    #[error("incomplete {what}: expected {expected} bytes, got {actual}")]
    Truncated {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Afterpulse file does not start with the expected magic number
    #[error("invalid afterpulse header: magic 0x{0:08X}")]
    BadMagic(u32),

    /// Correction table decoded to zero entries
    #[error("{0} table is empty")]
    EmptyTable(&'static str),

    /// Profiles in one file disagree on the number of range bins
    #[error("profile {index} has {actual} bins, expected {expected}")]
    InconsistentBins {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Header date/time fields do not form a valid post-1970 timestamp
    #[error("profile {index} has invalid timestamp {year:04}-{month:02}-{day:02} {hours:02}:{minutes:02}:{seconds:02}")]
    InvalidTimestamp {
        index: usize,
        year: u16,
        month: u16,
        day: u16,
        hours: u16,
        minutes: u16,
        seconds: u16,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// DatasetError – violations of the dataset's shape/type invariants
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("required variable '{0}' is missing")]
    MissingVariable(String),

    #[error("variable '{name}' has type {actual}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: DType,
        actual: DType,
    },

    #[error("variable '{name}' has rank {actual}, expected {expected}")]
    RankMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("variable '{name}' has {actual} entries along '{dim}', dataset has {expected}")]
    ShapeMismatch {
        name: String,
        dim: Dim,
        expected: usize,
        actual: usize,
    },
}

// ---------------------------------------------------------------------------
// Error – everything a conversion can fail with
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("arrow: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Two inputs of one batch map onto the same output file
    #[error("output {} is already written from {}", .output.display(), .first.display())]
    OutputClash { output: PathBuf, first: PathBuf },

    #[error("serializing report: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}
