use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, ListBuilder, PrimitiveArray, PrimitiveBuilder, StringArray, StringBuilder,
};
use arrow::datatypes::{
    ArrowPrimitiveType, Field, Float32Type, Float64Type, Int16Type, Int32Type, Schema,
    UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use chrono::Utc;
use ndarray::{ArrayD, Axis};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use tempfile::NamedTempFile;

use crate::data::meta;
use crate::data::model::{Dataset, Values, Variable};
use crate::error::{DatasetError, Result};

pub const SOFTWARE: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File extension of converted output.
pub const OUTPUT_EXTENSION: &str = "parquet";

// ---------------------------------------------------------------------------
// Arrow conversion
// ---------------------------------------------------------------------------
//
// The dataset is written as a single row. Each variable is one column:
// 0-d values as plain primitives, 1-d as List<T>, 2-d as List<List<T>>.

fn primitive_column<T: ArrowPrimitiveType>(a: &ArrayD<T::Native>) -> ArrayRef {
    match a.ndim() {
        0 => Arc::new(PrimitiveArray::<T>::from_iter_values(a.iter().copied())),
        1 => {
            let mut b = ListBuilder::new(PrimitiveBuilder::<T>::new());
            for &v in a.iter() {
                b.values().append_value(v);
            }
            b.append(true);
            Arc::new(b.finish())
        }
        _ => {
            let mut b = ListBuilder::new(ListBuilder::new(PrimitiveBuilder::<T>::new()));
            for row in a.axis_iter(Axis(0)) {
                let inner = b.values();
                for &v in row.iter() {
                    inner.values().append_value(v);
                }
                inner.append(true);
            }
            b.append(true);
            Arc::new(b.finish())
        }
    }
}

fn text_column(a: &ArrayD<String>) -> ArrayRef {
    if a.ndim() == 0 {
        return Arc::new(StringArray::from_iter_values(a.iter()));
    }
    let mut b = ListBuilder::new(StringBuilder::new());
    for v in a.iter() {
        b.values().append_value(v);
    }
    b.append(true);
    Arc::new(b.finish())
}

fn to_arrow(values: &Values) -> ArrayRef {
    match values {
        Values::U8(a) => primitive_column::<UInt8Type>(a),
        Values::U16(a) => primitive_column::<UInt16Type>(a),
        Values::U32(a) => primitive_column::<UInt32Type>(a),
        Values::U64(a) => primitive_column::<UInt64Type>(a),
        Values::I16(a) => primitive_column::<Int16Type>(a),
        Values::I32(a) => primitive_column::<Int32Type>(a),
        Values::F32(a) => primitive_column::<Float32Type>(a),
        Values::F64(a) => primitive_column::<Float64Type>(a),
        Values::Text(a) => text_column(a),
    }
}

/// Per-variable attributes: units, long name, comment, dimensions, fill.
fn field_metadata(name: &str, var: &Variable) -> Result<HashMap<String, String>> {
    let meta = meta::lookup(name).ok_or_else(|| DatasetError::UnknownVariable(name.into()))?;
    let mut attrs = HashMap::new();
    if let Some(units) = meta.units {
        attrs.insert("units".to_string(), units.to_string());
    }
    if let Some(long_name) = meta.long_name {
        attrs.insert("long_name".to_string(), long_name.to_string());
    }
    if let Some(comment) = meta.comment {
        attrs.insert("comment".to_string(), comment.to_string());
    }
    let dims: Vec<&str> = var.dims.iter().map(|d| d.as_str()).collect();
    attrs.insert("dimensions".to_string(), serde_json::to_string(&dims)?);
    attrs.insert("_FillValue".to_string(), meta.dtype.fill_value().to_string());
    Ok(attrs)
}

/// File-level attributes recorded with every output.
pub fn file_attributes() -> Vec<(String, String)> {
    vec![
        (
            "created".to_string(),
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        ),
        ("software".to_string(), SOFTWARE.to_string()),
        ("version".to_string(), VERSION.to_string()),
    ]
}

/// Convert a dataset into a one-row record batch with attributes attached.
pub fn to_record_batch(ds: &Dataset, attributes: &[(String, String)]) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(ds.len());
    let mut columns = Vec::with_capacity(ds.len());

    for (name, var) in ds.iter() {
        let column = to_arrow(&var.values);
        fields.push(
            Field::new(name, column.data_type().clone(), false)
                .with_metadata(field_metadata(name, var)?),
        );
        columns.push(column);
    }

    let schema = Arc::new(Schema::new_with_metadata(
        fields,
        attributes.iter().cloned().collect(),
    ));
    let options = RecordBatchOptions::new().with_row_count(Some(1));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}

/// Write a dataset to a Parquet file.
///
/// The file is built under a temporary name next to `path` and renamed into
/// place once complete; on failure nothing is left at `path`.
pub fn write_parquet(ds: &Dataset, path: &Path) -> Result<()> {
    let attributes = file_attributes();
    let batch = to_record_batch(ds, &attributes)?;

    let props = WriterProperties::builder()
        .set_key_value_metadata(Some(
            attributes
                .into_iter()
                .map(|(k, v)| KeyValue::new(k, v))
                .collect(),
        ))
        .build();

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    let mut writer = ArrowWriter::try_new(tmp.as_file_mut(), batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::aggregate::C;
    use arrow::array::{Array, AsArray, Float64Array};
    use ndarray::{arr0, array};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn sample() -> Dataset {
        let mut ds = Dataset::new();
        ds.insert("c", Values::F64(arr0(C).into_dyn())).unwrap();
        ds.insert("energy_monitor", Values::U32(array![1000u32, 2000].into_dyn()))
            .unwrap();
        ds.insert(
            "time_utc",
            Values::Text(array!["2020-01-01T00:00:00".to_string(), "2020-01-01T00:00:01".to_string()].into_dyn()),
        )
        .unwrap();
        ds.insert(
            "nrb_copol",
            Values::F64(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn()),
        )
        .unwrap();
        ds
    }

    #[test]
    fn batch_has_one_column_per_variable() {
        let batch = to_record_batch(&sample(), &file_attributes()).unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.num_columns(), 4);

        let schema = batch.schema();
        let field = schema.field_with_name("nrb_copol").unwrap();
        assert_eq!(field.metadata()["units"], "count us-1 uJ-1 km2");
        assert_eq!(field.metadata()["dimensions"], r#"["profile","range"]"#);
        assert_eq!(field.metadata()["_FillValue"], "-999.0");
        assert_eq!(schema.metadata()["software"], SOFTWARE);

        let nrb = batch.column_by_name("nrb_copol").unwrap().as_list::<i32>();
        let rows = nrb.value(0);
        assert_eq!(rows.len(), 2);
        let second = rows.as_list::<i32>().value(1);
        let second = second.as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(second.values().to_vec(), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn parquet_file_keeps_attributes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.parquet");
        write_parquet(&sample(), &path).unwrap();

        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap()).unwrap();
        let kv = builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .cloned()
            .unwrap_or_default();
        let version = kv.iter().find(|e| e.key == "version").and_then(|e| e.value.clone());
        assert_eq!(version.as_deref(), Some(VERSION));
        assert!(kv.iter().any(|e| e.key == "created"));

        let schema = builder.schema().clone();
        let field = schema.field_with_name("energy_monitor").unwrap();
        assert_eq!(field.metadata()["long_name"], "energy monitor");

        let batches: Vec<RecordBatch> = builder.build().unwrap().collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(batches.len(), 1);
        let c = batches[0]
            .column_by_name("c")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap()
            .value(0);
        assert_eq!(c, C);
    }

    #[test]
    fn failed_write_leaves_no_file_behind() {
        let dir = TempDir::new().unwrap();
        // a non-empty directory cannot be replaced by the finished file
        let target = dir.path().join("taken.parquet");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), b"x").unwrap();

        assert!(write_parquet(&sample(), &target).is_err());
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, ["taken.parquet"]);
        assert!(target.is_dir());
    }
}
