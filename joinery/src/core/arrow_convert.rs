//! Conversion between [`TabularDataset`] and Arrow record batches, plus the
//! Arrow IPC stream codec used for the bytes kept in blob storage.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Field, Float64Type, Int64Type, Schema, SchemaRef, TimeUnit,
    TimestampMicrosecondType,
};
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use chrono::DateTime;

use super::dataset::{ColumnSpec, ColumnType, Row, TabularDataset};
use super::scalar::Scalar;
use crate::error::Result;

const UTC: &str = "UTC";

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into()))
}

impl TabularDataset {
    /// Converts the dataset into a single Arrow record batch.
    ///
    /// Columns whose values do not all fit the declared type are stored as
    /// strings; integer columns containing floats are widened to float.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            let values = self.column_values(&column.name);
            let column_type = effective_type(column.data_type, &values);
            let array = build_array(column_type, &values);
            fields.push(Field::new(&column.name, array.data_type().clone(), true));
            arrays.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        let options = RecordBatchOptions::new().with_row_count(Some(self.rows.len()));
        Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
    }

    /// Builds a dataset from record batches sharing one schema.
    pub fn from_record_batches(schema: &SchemaRef, batches: &[RecordBatch]) -> Result<Self> {
        let mut columns: Vec<ColumnSpec> = schema
            .fields()
            .iter()
            .map(|f| ColumnSpec::new(f.name(), column_type_of(f.data_type())))
            .collect();

        let mut rows = Vec::new();
        for batch in batches {
            let mut batch_columns = Vec::with_capacity(batch.num_columns());
            for (idx, array) in batch.columns().iter().enumerate() {
                let (column_type, values) = array_to_scalars(array)?;
                if let Some(spec) = columns.get_mut(idx) {
                    if spec.data_type == ColumnType::Unknown {
                        spec.data_type = column_type;
                    }
                }
                batch_columns.push(values);
            }

            for row_idx in 0..batch.num_rows() {
                let row: Row = columns
                    .iter()
                    .zip(&batch_columns)
                    .map(|(spec, values)| (spec.name.clone(), values[row_idx].clone()))
                    .collect();
                rows.push(row);
            }
        }

        Ok(TabularDataset::new(columns, rows))
    }
}

/// Encodes record batches as an Arrow IPC stream.
pub fn encode_ipc(schema: &SchemaRef, batches: &[RecordBatch]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buffer, schema.as_ref())?;
        for batch in batches {
            writer.write(batch)?;
        }
        writer.finish()?;
    }
    Ok(buffer)
}

/// Decodes an Arrow IPC stream into its schema and record batches.
pub fn decode_ipc(bytes: &[u8]) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let reader = StreamReader::try_new(Cursor::new(bytes), None)?;
    let schema = reader.schema();
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((schema, batches))
}

/// Maps an Arrow type onto the logical column type.
pub fn column_type_of(data_type: &DataType) -> ColumnType {
    match data_type {
        DataType::Boolean => ColumnType::Boolean,
        dt if dt.is_integer() => ColumnType::Integer,
        dt if dt.is_floating() => ColumnType::Float,
        DataType::Decimal128(_, _) | DataType::Decimal256(_, _) => ColumnType::Float,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => ColumnType::String,
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => ColumnType::Timestamp,
        DataType::Null => ColumnType::Unknown,
        _ => ColumnType::String,
    }
}

fn effective_type(declared: ColumnType, values: &[Scalar]) -> ColumnType {
    let mut current = match declared {
        ColumnType::Unknown => values
            .iter()
            .find(|v| !v.is_null())
            .map(ColumnType::of)
            .unwrap_or(ColumnType::String),
        other => other,
    };

    for value in values {
        current = match (current, value) {
            (_, Scalar::Null) => current,
            (ColumnType::Integer, Scalar::Int(_)) => current,
            (ColumnType::Integer, Scalar::Float(_)) => ColumnType::Float,
            (ColumnType::Float, Scalar::Int(_) | Scalar::Float(_)) => current,
            (ColumnType::Boolean, Scalar::Bool(_)) => current,
            (ColumnType::Timestamp, Scalar::Timestamp(_)) => current,
            (ColumnType::String, _) => current,
            _ => ColumnType::String,
        };
    }
    current
}

fn build_array(column_type: ColumnType, values: &[Scalar]) -> ArrayRef {
    match column_type {
        ColumnType::Boolean => Arc::new(BooleanArray::from(
            values
                .iter()
                .map(|v| match v {
                    Scalar::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnType::Integer => Arc::new(Int64Array::from(
            values
                .iter()
                .map(|v| match v {
                    Scalar::Int(i) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        ColumnType::Float => Arc::new(Float64Array::from(
            values.iter().map(Scalar::as_f64).collect::<Vec<_>>(),
        )),
        ColumnType::Timestamp => Arc::new(
            TimestampMicrosecondArray::from(
                values
                    .iter()
                    .map(|v| match v {
                        Scalar::Timestamp(ts) => Some(ts.timestamp_micros()),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )
            .with_timezone(UTC),
        ),
        ColumnType::String | ColumnType::Unknown => Arc::new(StringArray::from(
            values
                .iter()
                .map(|v| (!v.is_null()).then(|| v.to_string()))
                .collect::<Vec<_>>(),
        )),
    }
}

fn array_to_scalars(array: &ArrayRef) -> Result<(ColumnType, Vec<Scalar>)> {
    let column_type = column_type_of(array.data_type());
    let len = array.len();

    let values: Vec<Scalar> = match column_type {
        ColumnType::Boolean => {
            let bools = array.as_boolean();
            (0..len)
                .map(|i| {
                    if bools.is_null(i) {
                        Scalar::Null
                    } else {
                        Scalar::Bool(bools.value(i))
                    }
                })
                .collect()
        }
        ColumnType::Integer => {
            let casted = cast(array, &DataType::Int64)?;
            let ints = casted.as_primitive::<Int64Type>();
            (0..len)
                .map(|i| {
                    if ints.is_null(i) {
                        Scalar::Null
                    } else {
                        Scalar::Int(ints.value(i))
                    }
                })
                .collect()
        }
        ColumnType::Float => {
            let casted = cast(array, &DataType::Float64)?;
            let floats = casted.as_primitive::<Float64Type>();
            (0..len)
                .map(|i| {
                    if floats.is_null(i) {
                        Scalar::Null
                    } else {
                        Scalar::Float(floats.value(i))
                    }
                })
                .collect()
        }
        ColumnType::Timestamp => {
            let casted = cast(array, &timestamp_type())?;
            let micros = casted.as_primitive::<TimestampMicrosecondType>();
            (0..len)
                .map(|i| {
                    if micros.is_null(i) {
                        return Scalar::Null;
                    }
                    DateTime::from_timestamp_micros(micros.value(i))
                        .map(Scalar::Timestamp)
                        .unwrap_or(Scalar::Null)
                })
                .collect()
        }
        ColumnType::Unknown => vec![Scalar::Null; len],
        ColumnType::String => match array.data_type() {
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
                let casted = cast(array, &DataType::Utf8)?;
                let strings = casted.as_string::<i32>();
                (0..len)
                    .map(|i| {
                        if strings.is_null(i) {
                            Scalar::Null
                        } else {
                            Scalar::String(strings.value(i).to_string())
                        }
                    })
                    .collect()
            }
            _ => {
                let formatter = ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default())?;
                (0..len)
                    .map(|i| {
                        if array.is_null(i) {
                            Scalar::Null
                        } else {
                            Scalar::String(formatter.value(i).to_string())
                        }
                    })
                    .collect()
            }
        },
    };

    Ok((column_type, values))
}
