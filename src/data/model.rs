use std::collections::BTreeMap;
use std::fmt;

use ndarray::{ArrayD, ArrayView1, ArrayView2, Ix1, Ix2};

use super::meta;
use crate::error::DatasetError;

// ---------------------------------------------------------------------------
// Dim – named dimensions a variable can be laid out along
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dim {
    Profile,
    Range,
    ApRange,
    OlRange,
    DtCoeffDegree,
}

impl Dim {
    pub fn as_str(self) -> &'static str {
        match self {
            Dim::Profile => "profile",
            Dim::Range => "range",
            Dim::ApRange => "ap_range",
            Dim::OlRange => "ol_range",
            Dim::DtCoeffDegree => "dt_coeff_degree",
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DType – element type of a stored variable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    U8,
    U16,
    U32,
    U64,
    I16,
    I32,
    F32,
    F64,
    /// Fixed-width 19 character timestamp text.
    Text,
}

impl DType {
    /// Missing-value marker written alongside each variable.
    ///
    /// The unsigned 16-bit marker is -999 wrapped into `u16`.
    pub fn fill_value(self) -> &'static str {
        match self {
            DType::F32 | DType::F64 => "-999.0",
            DType::I16 => "-999",
            DType::I32 => "2147483647",
            DType::U8 => "255",
            DType::U16 => "64537",
            DType::U32 => "4294939996",
            DType::U64 => "18446744073709551615",
            DType::Text => "",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::U8 => "uint8",
            DType::U16 => "uint16",
            DType::U32 => "uint32",
            DType::U64 => "uint64",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::Text => "S19",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Values – a typed n-dimensional array
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
    U32(ArrayD<u32>),
    U64(ArrayD<u64>),
    I16(ArrayD<i16>),
    I32(ArrayD<i32>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    Text(ArrayD<String>),
}

macro_rules! dispatch {
    ($values:expr, $arr:ident => $body:expr) => {
        match $values {
            Values::U8($arr) => $body,
            Values::U16($arr) => $body,
            Values::U32($arr) => $body,
            Values::U64($arr) => $body,
            Values::I16($arr) => $body,
            Values::I32($arr) => $body,
            Values::F32($arr) => $body,
            Values::F64($arr) => $body,
            Values::Text($arr) => $body,
        }
    };
}

impl Values {
    pub fn dtype(&self) -> DType {
        match self {
            Values::U8(_) => DType::U8,
            Values::U16(_) => DType::U16,
            Values::U32(_) => DType::U32,
            Values::U64(_) => DType::U64,
            Values::I16(_) => DType::I16,
            Values::I32(_) => DType::I32,
            Values::F32(_) => DType::F32,
            Values::F64(_) => DType::F64,
            Values::Text(_) => DType::Text,
        }
    }

    pub fn shape(&self) -> &[usize] {
        dispatch!(self, a => a.shape())
    }
}

// ---------------------------------------------------------------------------
// Variable / Dataset
// ---------------------------------------------------------------------------

/// One named array together with the dimensions it is laid out along.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub dims: Vec<Dim>,
    pub values: Values,
}

/// Named, dimensioned arrays making up one converted file.
///
/// Every variable must be listed in the static metadata table; its type and
/// rank are checked against that table on insert, and each dimension keeps a
/// single length across all variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    variables: BTreeMap<String, Variable>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a variable after validating it.
    pub fn insert(&mut self, name: &str, values: Values) -> Result<(), DatasetError> {
        let meta = meta::lookup(name).ok_or_else(|| DatasetError::UnknownVariable(name.into()))?;

        if values.dtype() != meta.dtype {
            return Err(DatasetError::TypeMismatch {
                name: name.into(),
                expected: meta.dtype,
                actual: values.dtype(),
            });
        }
        let shape = values.shape();
        if shape.len() != meta.dims.len() {
            return Err(DatasetError::RankMismatch {
                name: name.into(),
                expected: meta.dims.len(),
                actual: shape.len(),
            });
        }
        for (&dim, &len) in meta.dims.iter().zip(shape) {
            if let Some(expected) = self.dim_len_excluding(dim, name) {
                if expected != len {
                    return Err(DatasetError::ShapeMismatch {
                        name: name.into(),
                        dim,
                        expected,
                        actual: len,
                    });
                }
            }
        }

        self.variables.insert(
            name.to_string(),
            Variable {
                dims: meta.dims.to_vec(),
                values,
            },
        );
        Ok(())
    }

    /// Overlay every variable of `other`, replacing same-named ones.
    pub fn merge(&mut self, other: &Dataset) -> Result<(), DatasetError> {
        for (name, var) in &other.variables {
            self.insert(name, var.values.clone())?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Iterate variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Current length of a dimension, if any variable uses it.
    pub fn dim_len(&self, dim: Dim) -> Option<usize> {
        self.dim_len_excluding(dim, "")
    }

    fn dim_len_excluding(&self, dim: Dim, skip: &str) -> Option<usize> {
        self.variables
            .iter()
            .filter(|(name, _)| name.as_str() != skip)
            .find_map(|(_, var)| {
                var.dims
                    .iter()
                    .position(|&d| d == dim)
                    .map(|axis| var.values.shape()[axis])
            })
    }

    // -- typed accessors used by the NRB stage --

    fn require(&self, name: &str) -> Result<&Values, DatasetError> {
        self.variables
            .get(name)
            .map(|v| &v.values)
            .ok_or_else(|| DatasetError::MissingVariable(name.into()))
    }

    fn mismatch(name: &str, expected: DType, actual: &Values) -> DatasetError {
        DatasetError::TypeMismatch {
            name: name.into(),
            expected,
            actual: actual.dtype(),
        }
    }

    fn rank(name: &str, expected: usize, actual: usize) -> DatasetError {
        DatasetError::RankMismatch {
            name: name.into(),
            expected,
            actual,
        }
    }

    pub fn f32_1d(&self, name: &str) -> Result<ArrayView1<'_, f32>, DatasetError> {
        match self.require(name)? {
            Values::F32(a) => a
                .view()
                .into_dimensionality::<Ix1>()
                .map_err(|_| Self::rank(name, 1, a.ndim())),
            other => Err(Self::mismatch(name, DType::F32, other)),
        }
    }

    pub fn u32_1d(&self, name: &str) -> Result<ArrayView1<'_, u32>, DatasetError> {
        match self.require(name)? {
            Values::U32(a) => a
                .view()
                .into_dimensionality::<Ix1>()
                .map_err(|_| Self::rank(name, 1, a.ndim())),
            other => Err(Self::mismatch(name, DType::U32, other)),
        }
    }

    pub fn f32_2d(&self, name: &str) -> Result<ArrayView2<'_, f32>, DatasetError> {
        match self.require(name)? {
            Values::F32(a) => a
                .view()
                .into_dimensionality::<Ix2>()
                .map_err(|_| Self::rank(name, 2, a.ndim())),
            other => Err(Self::mismatch(name, DType::F32, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, Array1, Array2};

    #[test]
    fn rejects_unknown_and_mistyped_variables() {
        let mut ds = Dataset::new();
        let err = ds
            .insert("no_such_field", Values::F64(arr0(1.0).into_dyn()))
            .unwrap_err();
        assert!(matches!(err, DatasetError::UnknownVariable(_)));

        let err = ds
            .insert("c", Values::F32(arr0(1.0f32).into_dyn()))
            .unwrap_err();
        assert!(matches!(err, DatasetError::TypeMismatch { .. }));

        let err = ds
            .insert("c", Values::F64(Array1::zeros(3).into_dyn()))
            .unwrap_err();
        assert!(matches!(err, DatasetError::RankMismatch { .. }));
    }

    #[test]
    fn profile_dimension_length_is_shared() {
        let mut ds = Dataset::new();
        ds.insert("bin_time", Values::F32(Array1::zeros(4).into_dyn()))
            .unwrap();
        assert_eq!(ds.dim_len(Dim::Profile), Some(4));

        let err = ds
            .insert("energy_monitor", Values::U32(Array1::zeros(5).into_dyn()))
            .unwrap_err();
        assert!(matches!(
            err,
            DatasetError::ShapeMismatch { dim: Dim::Profile, expected: 4, actual: 5, .. }
        ));

        ds.insert("channel_1", Values::F32(Array2::zeros((4, 7)).into_dyn()))
            .unwrap();
        assert_eq!(ds.dim_len(Dim::Range), Some(7));
    }

    #[test]
    fn replacing_a_variable_may_change_its_own_length() {
        let mut ds = Dataset::new();
        ds.insert("ol_range", Values::F64(Array1::zeros(3).into_dyn()))
            .unwrap();
        ds.insert("ol_range", Values::F64(Array1::zeros(5).into_dyn()))
            .unwrap();
        assert_eq!(ds.dim_len(Dim::OlRange), Some(5));
    }

    #[test]
    fn typed_accessors_report_missing_variables() {
        let ds = Dataset::new();
        let err = ds.f32_1d("bin_time").unwrap_err();
        assert!(matches!(err, DatasetError::MissingVariable(name) if name == "bin_time"));
    }
}
