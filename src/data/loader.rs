use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, Float32Array, Float64Array, Int32Array, Int64Array, LargeListArray, ListArray,
};
use arrow::datatypes::DataType;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::EcgDataset;
use crate::error::{EcgError, EcgResult};

/// One parsed row: signal values and the trailing label.
type Row = (Vec<f64>, f64);

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a heartbeat dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – headerless, `L` signal columns followed by the label
/// * `.json`    – `[[s0, ..., label], ...]` or `[{ "signal": [...], "label": x }, ...]`
/// * `.parquet` – `signal` list column plus `label`, or `L + 1` numeric columns
///
/// Unknown extensions are read as CSV, the format of the MIT-BIH extracts.
pub fn load_file(path: &Path) -> EcgResult<EcgDataset> {
    let rows = read_rows(path)
        .map_err(|e| EcgError::DataLoad(format!("{}: {e:#}", path.display())))?;
    debug!("Parsed {} rows from {}", rows.len(), path.display());

    let dataset = EcgDataset::from_rows(rows)?;
    info!(
        "Loaded {} ECG rows ({} samples each) from {}",
        dataset.len(),
        dataset.signal_len(),
        path.display()
    );
    Ok(dataset)
}

fn read_rows(path: &Path) -> Result<Vec<Row>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let rows = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        _ => load_csv(path)?,
    };

    if rows.is_empty() {
        bail!("file contains no rows");
    }
    Ok(rows)
}

/// Split `[s0, ..., sL-1, label]` into its signal and label.
fn split_row(mut values: Vec<f64>, row: usize) -> Result<Row> {
    if values.len() < 2 {
        bail!(
            "Row {row}: expected at least 2 columns (signal + label), got {}",
            values.len()
        );
    }
    let label = values.pop().unwrap_or_default();
    Ok((values, label))
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: no header row, every column numeric, the last one is the label.
fn load_csv(path: &Path) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context("opening CSV")?;

    let mut rows = Vec::new();
    let mut width: Option<usize> = None;

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let expected = *width.get_or_insert(record.len());
        if record.len() != expected {
            bail!(
                "CSV row {row_no}: has {} columns but row 0 has {expected}",
                record.len()
            );
        }

        let values = record
            .iter()
            .enumerate()
            .map(|(col, tok)| {
                tok.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .with_context(|| {
                        format!("Row {row_no}, column {col}: '{tok}' is not a finite number")
                    })
            })
            .collect::<Result<Vec<f64>>>()?;

        rows.push(split_row(values, row_no)?);
    }

    Ok(rows)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema, either flat rows
///
/// ```json
/// [[0.98, 0.93, ..., 0.0], [1.0, 0.79, ..., 2.0]]
/// ```
///
/// or records
///
/// ```json
/// [{ "signal": [0.98, 0.93, ...], "label": 0.0 }, ...]
/// ```
fn load_json(path: &Path) -> Result<Vec<Row>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut rows = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let row = match rec {
            JsonValue::Array(_) => split_row(json_array_to_f64(Some(rec), i, "row")?, i)?,
            JsonValue::Object(obj) => {
                let signal = json_array_to_f64(obj.get("signal"), i, "signal")?;
                let label = obj
                    .get("label")
                    .and_then(|v| v.as_f64())
                    .filter(|v| v.is_finite())
                    .with_context(|| format!("Row {i}: missing or non-finite 'label'"))?;
                (signal, label)
            }
            _ => bail!("Row {i} is neither an array nor an object"),
        };
        rows.push(row);
    }

    Ok(rows)
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .filter(|x| x.is_finite())
                .with_context(|| format!("Row {row}, {col}[{j}]: not a finite number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file containing heartbeat rows.
///
/// Two layouts are accepted:
/// - `signal`: List<Float64|Float32> and `label`: numeric (record layout)
/// - `L + 1` numeric columns, the last being the label (the CSV layout
///   written by `df.to_parquet()` on the headerless frame)
fn load_parquet(path: &Path) -> Result<Vec<Row>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let n_rows = batch.num_rows();
        let offset = rows.len();

        match (schema.index_of("signal"), schema.index_of("label")) {
            (Ok(signal_idx), Ok(label_idx)) => {
                let signal_col = batch.column(signal_idx);
                let label_col = batch.column(label_idx);
                for row in 0..n_rows {
                    let signal = extract_f64_list(signal_col, row)
                        .with_context(|| format!("Row {}: failed to read 'signal'", offset + row))?;
                    let label = extract_f64_value(label_col, row)
                        .with_context(|| format!("Row {}: failed to read 'label'", offset + row))?;
                    rows.push((signal, label));
                }
            }
            _ => {
                let columns = batch.columns();
                for row in 0..n_rows {
                    let values = columns
                        .iter()
                        .enumerate()
                        .map(|(col, array)| {
                            extract_f64_value(array, row).with_context(|| {
                                format!("Row {}, column {col}: failed to read value", offset + row)
                            })
                        })
                        .collect::<Result<Vec<f64>>>()?;
                    rows.push(split_row(values, offset + row)?);
                }
            }
        }
    }

    Ok(rows)
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    if values_array.null_count() > 0 {
        bail!("null amplitude inside signal list");
    }

    // The inner array can be Float64 or Float32
    let values: Vec<f64> =
        if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
            f64_arr.values().iter().copied().collect()
        } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
            f32_arr.values().iter().map(|&v| v as f64).collect()
        } else {
            bail!(
                "List inner type is {:?}, expected Float64 or Float32",
                values_array.data_type()
            )
        };

    if let Some(j) = values.iter().position(|v| !v.is_finite()) {
        bail!("signal[{j}] is {}, expected a finite number", values[j]);
    }
    Ok(values)
}

/// Extract a single numeric cell from an Arrow column as `f64`.
fn extract_f64_value(col: &Arc<dyn Array>, row: usize) -> Result<f64> {
    if col.is_null(row) {
        bail!("null value in numeric column");
    }
    let value = match col.data_type() {
        DataType::Float64 => col
            .as_any()
            .downcast_ref::<Float64Array>()
            .context("expected Float64Array")?
            .value(row),
        DataType::Float32 => col
            .as_any()
            .downcast_ref::<Float32Array>()
            .context("expected Float32Array")?
            .value(row) as f64,
        DataType::Int64 => col
            .as_any()
            .downcast_ref::<Int64Array>()
            .context("expected Int64Array")?
            .value(row) as f64,
        DataType::Int32 => col
            .as_any()
            .downcast_ref::<Int32Array>()
            .context("expected Int32Array")?
            .value(row) as f64,
        other => bail!("Expected a numeric column, got {other:?}"),
    };
    if !value.is_finite() {
        bail!("value is {value}, expected a finite number");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::data::filter::FilterKind;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "rusty-ecg-loader-{}-{name}",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_headerless_csv() {
        let path = temp_file(
            "ok.csv",
            "0.1,0.2,0.3,0.0\n0.4,0.5,0.6,2.0\n0.7,0.8,0.9,0.0\n1.0,0.9,0.8,1.0\n",
        );
        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.signal_len(), 3);
        assert_eq!(ds.get(1).unwrap().signal, vec![0.4, 0.5, 0.6]);
        assert_eq!(ds.get(3).unwrap().label, 1.0);
        assert_eq!(ds.view(FilterKind::Abnormal), &[1, 3]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn rejects_inconsistent_column_counts() {
        let path = temp_file("ragged.csv", "0.1,0.2,0.0\n0.4,0.5,0.6,2.0\n");
        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, EcgError::DataLoad(ref msg) if msg.contains("columns")));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn rejects_empty_and_missing_files() {
        let path = temp_file("empty.csv", "");
        assert!(matches!(load_file(&path), Err(EcgError::DataLoad(_))));
        std::fs::remove_file(path).ok();

        let missing = std::env::temp_dir().join("rusty-ecg-does-not-exist.csv");
        assert!(matches!(load_file(&missing), Err(EcgError::DataLoad(_))));
    }

    #[test]
    fn rejects_non_numeric_cells() {
        let path = temp_file("text.csv", "0.1,abc,0.0\n");
        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, EcgError::DataLoad(ref msg) if msg.contains("abc")));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn rejects_non_finite_cells() {
        let nan_label = temp_file("nan-label.csv", "0.1,0.2,0.0\n0.3,0.4,nan\n");
        let err = load_file(&nan_label).unwrap_err();
        assert!(matches!(err, EcgError::DataLoad(ref msg) if msg.contains("Row 1, column 2")));
        std::fs::remove_file(nan_label).ok();

        let inf_cell = temp_file("inf-cell.csv", "0.1,0.2,0.0\n0.3,inf,1.0\n0.5,0.6,0.0\n");
        let err = load_file(&inf_cell).unwrap_err();
        assert!(matches!(err, EcgError::DataLoad(ref msg) if msg.contains("'inf'")));
        std::fs::remove_file(inf_cell).ok();

        let infinity = temp_file("infinity.csv", "-infinity,0.2,0.0\n");
        assert!(matches!(load_file(&infinity), Err(EcgError::DataLoad(_))));
        std::fs::remove_file(infinity).ok();
    }

    #[test]
    fn rejects_non_finite_parquet_values() {
        use arrow::array::{ArrayRef, Float64Array};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let path = std::env::temp_dir().join(format!(
            "rusty-ecg-loader-{}-nan.parquet",
            std::process::id()
        ));
        let batch = RecordBatch::try_from_iter(vec![
            ("c0", Arc::new(Float64Array::from(vec![0.1, 0.2])) as ArrayRef),
            ("c1", Arc::new(Float64Array::from(vec![0.3, f64::INFINITY])) as ArrayRef),
            ("c2", Arc::new(Float64Array::from(vec![0.0, 1.0])) as ArrayRef),
        ])
        .unwrap();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, EcgError::DataLoad(ref msg) if msg.contains("Row 1, column 1")));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn loads_both_json_layouts() {
        let path = temp_file(
            "rows.json",
            r#"[[0.1, 0.2, 0.0], {"signal": [0.3, 0.4], "label": 3.0}]"#,
        );
        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get(0).unwrap().signal, vec![0.1, 0.2]);
        assert_eq!(ds.get(1).unwrap().label, 3.0);
        std::fs::remove_file(path).ok();
    }
}
