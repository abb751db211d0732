use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use ndarray::{arr0, Array1};

use super::header::{AfterpulseHeader, AFTERPULSE_MAGIC};
use super::model::{Dataset, Values};
use super::record::{read_block, read_full};
use crate::error::{DatasetError, FormatError};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Afterpulse calibration: detector response after each pulse versus range.
#[derive(Debug, Clone, PartialEq)]
pub struct AfterpulseTable {
    pub header: AfterpulseHeader,
    /// km
    pub range: Vec<f64>,
    pub copol: Vec<f64>,
    pub crosspol: Vec<f64>,
}

/// Overlap correction factor versus range (km).
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapTable {
    pub range: Vec<f64>,
    pub overlap: Vec<f64>,
}

/// Dead-time polynomial, highest degree first.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadTimeTable {
    pub coeff: Vec<f32>,
}

impl DeadTimeTable {
    /// Polynomial degree of each coefficient: `[n-1, n-2, .., 0]`.
    pub fn degrees(&self) -> Vec<u32> {
        (0..self.coeff.len() as u32).rev().collect()
    }
}

/// Correction tables loaded once per run and shared read-only by every file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corrections {
    pub afterpulse: Option<AfterpulseTable>,
    pub overlap: Option<OverlapTable>,
    pub dead_time: Option<DeadTimeTable>,
}

impl Corrections {
    pub fn is_empty(&self) -> bool {
        self.afterpulse.is_none() && self.overlap.is_none() && self.dead_time.is_none()
    }

    /// Variables to merge into each output dataset.
    pub fn to_dataset(&self) -> Result<Dataset, DatasetError> {
        let mut ds = Dataset::new();
        if let Some(ap) = &self.afterpulse {
            for (name, value) in ap.header.scalars() {
                ds.insert(name, value)?;
            }
            ds.insert("ap_range", f64_values(&ap.range))?;
            ds.insert("ap_copol", f64_values(&ap.copol))?;
            ds.insert("ap_crosspol", f64_values(&ap.crosspol))?;
        }
        if let Some(ol) = &self.overlap {
            ds.insert("ol_number_bins", Values::U32(arr0(ol.range.len() as u32).into_dyn()))?;
            ds.insert("ol_range", f64_values(&ol.range))?;
            ds.insert("ol_overlap", f64_values(&ol.overlap))?;
        }
        if let Some(dt) = &self.dead_time {
            ds.insert("dt_number_coeff", Values::U32(arr0(dt.coeff.len() as u32).into_dyn()))?;
            ds.insert("dt_coeff", Values::F32(Array1::from_vec(dt.coeff.clone()).into_dyn()))?;
            ds.insert("dt_coeff_degree", Values::U32(Array1::from_vec(dt.degrees()).into_dyn()))?;
        }
        Ok(ds)
    }
}

fn f64_values(v: &[f64]) -> Values {
    Values::F64(Array1::from_vec(v.to_vec()).into_dyn())
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

fn read_f64_block<R: Read>(
    reader: &mut R,
    n: usize,
    what: &'static str,
) -> Result<Vec<f64>, FormatError> {
    let buf = read_block(reader, n.saturating_mul(8), what)?;
    let mut values = vec![0f64; n];
    LittleEndian::read_f64_into(&buf, &mut values);
    Ok(values)
}

/// Decode an afterpulse file: magic-checked header then range, co-pol and
/// cross-pol blocks of `ap_number_bins` doubles each.
pub fn read_afterpulse<R: Read>(mut reader: R) -> Result<AfterpulseTable, FormatError> {
    let mut buf = [0u8; AfterpulseHeader::SIZE];
    let got = read_full(&mut reader, &mut buf)?;
    if got < buf.len() {
        return Err(FormatError::Truncated {
            what: "afterpulse header",
            expected: buf.len(),
            actual: got,
        });
    }
    let header = AfterpulseHeader::decode(&buf)?;
    if header.ap_header != AFTERPULSE_MAGIC {
        return Err(FormatError::BadMagic(header.ap_header));
    }

    let n = header.ap_number_bins as usize;
    if n == 0 {
        return Err(FormatError::EmptyTable("afterpulse"));
    }
    let range = read_f64_block(&mut reader, n, "ap_range data")?;
    let copol = read_f64_block(&mut reader, n, "ap_copol data")?;
    let crosspol = read_f64_block(&mut reader, n, "ap_crosspol data")?;

    Ok(AfterpulseTable {
        header,
        range,
        copol,
        crosspol,
    })
}

/// Decode an overlap file. The bin count is `len / 16`: a block of ranges
/// followed by a block of overlap factors. Trailing bytes are ignored.
pub fn read_overlap<R: Read>(mut reader: R) -> Result<OverlapTable, FormatError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let n = bytes.len() / 16;
    if n == 0 {
        return Err(FormatError::EmptyTable("overlap"));
    }
    let mut cursor = &bytes[..];
    let range = read_f64_block(&mut cursor, n, "ol_range data")?;
    let overlap = read_f64_block(&mut cursor, n, "ol_overlap data")?;
    Ok(OverlapTable { range, overlap })
}

/// Decode a dead-time file of `len / 4` float coefficients.
pub fn read_dead_time<R: Read>(mut reader: R) -> Result<DeadTimeTable, FormatError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let n = bytes.len() / 4;
    if n == 0 {
        return Err(FormatError::EmptyTable("dead time"));
    }
    let mut coeff = vec![0f32; n];
    LittleEndian::read_f32_into(&bytes[..n * 4], &mut coeff);
    Ok(DeadTimeTable { coeff })
}

fn open(path: &Path) -> Result<BufReader<File>, FormatError> {
    Ok(BufReader::new(File::open(path)?))
}

pub fn load_afterpulse(path: &Path) -> Result<AfterpulseTable, FormatError> {
    read_afterpulse(open(path)?)
}

pub fn load_overlap(path: &Path) -> Result<OverlapTable, FormatError> {
    read_overlap(open(path)?)
}

pub fn load_dead_time(path: &Path) -> Result<DeadTimeTable, FormatError> {
    read_dead_time(open(path)?)
}
