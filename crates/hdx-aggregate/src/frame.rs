//! Adapters from polars frames to the row stream.

use std::path::Path;

use hdx_model::{CellValue, HdxError, Row};
use polars::prelude::{AnyValue, CsvReadOptions, DataFrame, SerReader};

/// Converts a polars value into a cell, keeping numbers and booleans typed.
pub fn cell_from_any(value: AnyValue<'_>) -> CellValue {
    match value {
        AnyValue::Null => CellValue::Null,
        AnyValue::Boolean(b) => CellValue::Bool(b),
        AnyValue::Int8(v) => CellValue::Int(i64::from(v)),
        AnyValue::Int16(v) => CellValue::Int(i64::from(v)),
        AnyValue::Int32(v) => CellValue::Int(i64::from(v)),
        AnyValue::Int64(v) => CellValue::Int(v),
        AnyValue::UInt8(v) => CellValue::Int(i64::from(v)),
        AnyValue::UInt16(v) => CellValue::Int(i64::from(v)),
        AnyValue::UInt32(v) => CellValue::Int(i64::from(v)),
        AnyValue::UInt64(v) => i64::try_from(v).map_or(CellValue::Float(v as f64), CellValue::Int),
        AnyValue::Float32(v) => CellValue::Float(f64::from(v)),
        AnyValue::Float64(v) => CellValue::Float(v),
        AnyValue::String(s) => CellValue::Text(s.to_string()),
        AnyValue::StringOwned(s) => CellValue::Text(s.to_string()),
        other => {
            let text = other.to_string();
            // Display wraps some types in quotes
            match text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
                Some(inner) => CellValue::Text(inner.to_string()),
                None => CellValue::Text(text),
            }
        }
    }
}

/// Materializes every frame row, in frame order.
pub fn rows_from_frame(df: &DataFrame) -> Vec<Row> {
    let columns = df.get_columns();
    (0..df.height())
        .map(|idx| {
            let mut row = Row::with_capacity(columns.len());
            for column in columns {
                let value = column.get(idx).unwrap_or(AnyValue::Null);
                row.set(column.name().as_str(), cell_from_any(value));
            }
            row
        })
        .collect()
}

/// Reads a headed CSV file into a frame.
pub fn read_csv_frame(path: &Path) -> Result<DataFrame, HdxError> {
    let failed = |e: polars::error::PolarsError| {
        HdxError::data_format(path.display().to_string(), "", e.to_string())
    };
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(failed)?
        .finish()
        .map_err(failed)
}
