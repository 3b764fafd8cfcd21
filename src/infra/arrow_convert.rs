//! Conversion between in-memory tables and Arrow record batches.
//!
//! Column type mapping:
//!
//! | column type | Arrow type                        |
//! |-------------|-----------------------------------|
//! | `Null`      | `Null`                            |
//! | `Bool`      | `Boolean`                         |
//! | `Int`       | `Int64`                           |
//! | `Float`     | `Float64`                         |
//! | `Str`       | `Utf8`                            |
//! | `DateTime`  | `Timestamp(Nanosecond, "UTC")`    |
//! | `Date`      | `Date32`                          |

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Date32Array, Float64Array, Int64Array, NullArray,
    RecordBatch, RecordBatchOptions, StringArray, TimestampNanosecondArray,
};
use arrow::datatypes::{
    DataType, Date32Type, Field, Float64Type, Int64Type, Schema, SchemaRef, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType,
};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

use crate::error::{EtlError, Result};
use crate::table::{Column, Row, Table};
use crate::types::{ColumnType, Value};

const UTC: &str = "UTC";

fn data_type(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::Null => DataType::Null,
        ColumnType::Bool => DataType::Boolean,
        ColumnType::Int => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Str => DataType::Utf8,
        ColumnType::DateTime => DataType::Timestamp(TimeUnit::Nanosecond, Some(UTC.into())),
        ColumnType::Date => DataType::Date32,
    }
}

/// Arrow schema for a table; every field is nullable
pub fn schema_for(table: &Table) -> SchemaRef {
    let fields: Vec<Field> = table
        .columns()
        .iter()
        .map(|c| Field::new(&c.name, data_type(c.column_type), true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Convert a table into a single record batch
pub fn table_to_record_batch(table: &Table) -> Result<RecordBatch> {
    let schema = schema_for(table);
    let arrays = table
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| build_array(column, table.rows().iter().map(|r| &r[i])))
        .collect::<Result<Vec<ArrayRef>>>()?;

    let options = RecordBatchOptions::new().with_row_count(Some(table.len()));
    Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
}

fn mismatch(column: &Column, value: &Value) -> EtlError {
    EtlError::TypeMismatch {
        column: column.name.clone(),
        expected: column.column_type,
        value: value.to_string(),
    }
}

fn build_array<'a>(column: &Column, values: impl Iterator<Item = &'a Value>) -> Result<ArrayRef> {
    let array: ArrayRef = match column.column_type {
        ColumnType::Null => Arc::new(NullArray::new(values.count())),
        ColumnType::Bool => {
            let cells = values
                .map(|v| match v {
                    Value::Bool(b) => Ok(Some(*b)),
                    v if v.is_null() => Ok(None),
                    v => Err(mismatch(column, v)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(BooleanArray::from(cells))
        }
        ColumnType::Int => {
            let cells = values
                .map(|v| match v {
                    Value::Int(i) => Ok(Some(*i)),
                    v if v.is_null() => Ok(None),
                    v => Err(mismatch(column, v)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(Int64Array::from(cells))
        }
        ColumnType::Float => {
            let cells = values
                .map(|v| match v {
                    v if v.is_null() => Ok(None),
                    Value::Float(f) => Ok(Some(*f)),
                    Value::Int(i) => Ok(Some(*i as f64)),
                    v => Err(mismatch(column, v)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(Float64Array::from(cells))
        }
        // Mixed columns land here too, so every value is written as text
        ColumnType::Str => {
            let cells: Vec<Option<String>> = values
                .map(|v| match v {
                    v if v.is_null() => None,
                    Value::Str(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect();
            Arc::new(StringArray::from(cells))
        }
        ColumnType::DateTime => {
            let cells = values
                .map(|v| match v {
                    // Only instants between 1677 and 2262 fit in i64 nanoseconds
                    Value::DateTime(dt) => dt
                        .timestamp_nanos_opt()
                        .map(Some)
                        .ok_or_else(|| mismatch(column, v)),
                    v if v.is_null() => Ok(None),
                    v => Err(mismatch(column, v)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(TimestampNanosecondArray::from(cells).with_timezone(UTC))
        }
        ColumnType::Date => {
            let epoch = NaiveDate::default();
            let cells = values
                .map(|v| match v {
                    Value::Date(d) => Ok(Some((*d - epoch).num_days() as i32)),
                    v if v.is_null() => Ok(None),
                    v => Err(mismatch(column, v)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(Date32Array::from(cells))
        }
    };
    Ok(array)
}

fn column_type_of(field: &Field) -> Result<ColumnType> {
    let column_type = match field.data_type() {
        DataType::Null => ColumnType::Null,
        DataType::Boolean => ColumnType::Bool,
        DataType::Int64 => ColumnType::Int,
        DataType::Float64 => ColumnType::Float,
        DataType::Utf8 | DataType::LargeUtf8 => ColumnType::Str,
        DataType::Timestamp(_, _) => ColumnType::DateTime,
        DataType::Date32 => ColumnType::Date,
        other => {
            return Err(EtlError::UnsupportedColumnType {
                column: field.name().clone(),
                data_type: other.to_string(),
            })
        }
    };
    Ok(column_type)
}

/// Rebuild a table from a schema and the record batches read under it
pub fn record_batches_to_table(name: &str, schema: &Schema, batches: &[RecordBatch]) -> Result<Table> {
    let columns = schema
        .fields()
        .iter()
        .map(|f| Ok(Column::new(f.name().clone(), column_type_of(f)?)))
        .collect::<Result<Vec<Column>>>()?;

    let mut rows: Vec<Row> = Vec::with_capacity(batches.iter().map(|b| b.num_rows()).sum());
    for batch in batches {
        let decoded = batch
            .columns()
            .iter()
            .zip(schema.fields().iter())
            .map(|(array, field)| array_values(field, array.as_ref()))
            .collect::<Result<Vec<Vec<Value>>>>()?;

        for r in 0..batch.num_rows() {
            rows.push(decoded.iter().map(|col| col[r].clone()).collect());
        }
    }

    Ok(Table::from_parts(name, columns, rows))
}

fn array_values(field: &Field, array: &dyn Array) -> Result<Vec<Value>> {
    let len = array.len();
    let cell = |i: usize, f: &dyn Fn(usize) -> Value| {
        if array.is_null(i) {
            Value::Null
        } else {
            f(i)
        }
    };

    let values = match array.data_type() {
        DataType::Null => vec![Value::Null; len],
        DataType::Boolean => {
            let a = array.as_boolean();
            (0..len).map(|i| cell(i, &|i| Value::Bool(a.value(i)))).collect()
        }
        DataType::Int64 => {
            let a = array.as_primitive::<Int64Type>();
            (0..len).map(|i| cell(i, &|i| Value::Int(a.value(i)))).collect()
        }
        DataType::Float64 => {
            let a = array.as_primitive::<Float64Type>();
            (0..len)
                .map(|i| cell(i, &|i| ColumnType::Float.coerce(Value::Float(a.value(i)))))
                .collect()
        }
        DataType::Utf8 => {
            let a = array.as_string::<i32>();
            (0..len).map(|i| cell(i, &|i| Value::from(a.value(i)))).collect()
        }
        DataType::LargeUtf8 => {
            let a = array.as_string::<i64>();
            (0..len).map(|i| cell(i, &|i| Value::from(a.value(i)))).collect()
        }
        DataType::Timestamp(unit, _) => {
            let raw: Vec<Option<i64>> = match unit {
                TimeUnit::Second => array.as_primitive::<TimestampSecondType>().iter().collect(),
                TimeUnit::Millisecond => array.as_primitive::<TimestampMillisecondType>().iter().collect(),
                TimeUnit::Microsecond => array.as_primitive::<TimestampMicrosecondType>().iter().collect(),
                TimeUnit::Nanosecond => array.as_primitive::<TimestampNanosecondType>().iter().collect(),
            };
            raw.into_iter()
                .map(|v| {
                    v.and_then(|v| timestamp_to_datetime(unit, v))
                        .map_or(Value::Null, Value::DateTime)
                })
                .collect()
        }
        DataType::Date32 => {
            let epoch = NaiveDate::default();
            array
                .as_primitive::<Date32Type>()
                .iter()
                .map(|v| {
                    v.and_then(|days| epoch.checked_add_signed(TimeDelta::days(days as i64)))
                        .map_or(Value::Null, Value::Date)
                })
                .collect()
        }
        other => {
            return Err(EtlError::UnsupportedColumnType {
                column: field.name().clone(),
                data_type: other.to_string(),
            })
        }
    };
    Ok(values)
}

fn timestamp_to_datetime(unit: &TimeUnit, value: i64) -> Option<DateTime<Utc>> {
    match unit {
        TimeUnit::Second => DateTime::from_timestamp(value, 0),
        TimeUnit::Millisecond => DateTime::from_timestamp_millis(value),
        TimeUnit::Microsecond => DateTime::from_timestamp_micros(value),
        TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(value)),
    }
}
