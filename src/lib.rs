//! Micro Pulse Lidar (MPL) conversion: binary profile decoding, correction
//! tables, normalized relative backscatter and Parquet output.

pub mod batch;
pub mod data;
pub mod error;
pub mod nrb;
pub mod output;

pub use error::{DatasetError, Error, FormatError, Result};
