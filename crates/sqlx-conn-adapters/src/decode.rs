use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlValueRef};
use sqlx::postgres::{PgRow, PgValueRef};
use sqlx::sqlite::{SqliteRow, SqliteValueRef};
use sqlx::{Column, Row, TypeInfo, Value, ValueRef};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use crate::Result;
use crate::error::Error;

/// A decoded row: column name to JSON value, in column order.
pub type JsonRow = IndexMap<String, JsonValue>;

/// Decode every column of a row, in column order.
fn decode_columns<C: Column>(
   columns: &[C],
   mut value_at: impl FnMut(usize) -> Result<JsonValue>,
) -> Result<JsonRow> {
   let mut decoded = IndexMap::with_capacity(columns.len());
   for column in columns {
      decoded.insert(column.name().to_string(), value_at(column.ordinal())?);
   }
   Ok(decoded)
}

pub(crate) fn decode_sqlite_row(row: &SqliteRow) -> Result<JsonRow> {
   decode_columns(row.columns(), |i| sqlite_to_json(row.try_get_raw(i)?))
}

pub(crate) fn decode_mysql_row(row: &MySqlRow) -> Result<JsonRow> {
   decode_columns(row.columns(), |i| mysql_to_json(row.try_get_raw(i)?))
}

pub(crate) fn decode_pg_row(row: &PgRow) -> Result<JsonRow> {
   decode_columns(row.columns(), |i| pg_to_json(row.try_get_raw(i)?))
}

/// Convert a SQLite value to a JSON value.
///
/// SQLite reports the declared column affinity, so dates and times arrive as
/// TEXT unless the column was declared DATETIME. Booleans are stored as INTEGER.
pub fn sqlite_to_json(value: SqliteValueRef<'_>) -> Result<JsonValue> {
   if value.is_null() {
      return Ok(JsonValue::Null);
   }

   let column_type = value.type_info();
   let owned = ValueRef::to_owned(&value);

   let result = match column_type.name() {
      "TEXT" | "DATE" | "TIME" => text(owned.try_decode::<String>().ok()),
      "REAL" => owned.try_decode::<f64>().map(JsonValue::from).unwrap_or(JsonValue::Null),
      "INTEGER" | "NUMERIC" => owned
         .try_decode::<i64>()
         .map(JsonValue::from)
         .unwrap_or(JsonValue::Null),
      "BOOLEAN" => owned.try_decode::<bool>().map(JsonValue::Bool).unwrap_or(JsonValue::Null),
      "DATETIME" => {
         if let Ok(dt) = owned.try_decode::<PrimitiveDateTime>() {
            JsonValue::String(dt.to_string())
         } else {
            text(owned.try_decode::<String>().ok())
         }
      }
      "BLOB" => blob(owned.try_decode::<Vec<u8>>().ok()),
      "NULL" => JsonValue::Null,
      other => fallback_text(owned.try_decode::<String>().ok(), "SQLite", other)?,
   };

   Ok(result)
}

/// Convert a MySQL value to a JSON value.
pub fn mysql_to_json(value: MySqlValueRef<'_>) -> Result<JsonValue> {
   if value.is_null() {
      return Ok(JsonValue::Null);
   }

   let column_type = value.type_info();
   let owned = ValueRef::to_owned(&value);

   let result = match column_type.name() {
      "BOOLEAN" => owned.try_decode::<bool>().map(JsonValue::Bool).unwrap_or(JsonValue::Null),
      "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => owned
         .try_decode::<i64>()
         .map(JsonValue::from)
         .unwrap_or(JsonValue::Null),
      name if name.ends_with("UNSIGNED") => owned
         .try_decode::<u64>()
         .map(JsonValue::from)
         .unwrap_or(JsonValue::Null),
      "FLOAT" | "DOUBLE" => owned.try_decode::<f64>().map(JsonValue::from).unwrap_or(JsonValue::Null),
      "YEAR" => owned
         .try_decode_unchecked::<u16>()
         .map(JsonValue::from)
         .unwrap_or(JsonValue::Null),
      "DATE" => display(owned.try_decode::<Date>().ok()),
      "TIME" => display(owned.try_decode::<Time>().ok()),
      "DATETIME" | "TIMESTAMP" => display(owned.try_decode::<PrimitiveDateTime>().ok()),
      "JSON" => owned.try_decode::<JsonValue>().unwrap_or(JsonValue::Null),
      "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
         blob(owned.try_decode::<Vec<u8>>().ok())
      }
      "NULL" => JsonValue::Null,
      // DECIMAL, ENUM, SET and the character types travel as text in both protocols
      other => fallback_text(owned.try_decode_unchecked::<String>().ok(), "MySQL", other)?,
   };

   Ok(result)
}

/// Convert a PostgreSQL value to a JSON value.
///
/// PostgreSQL returns most values in binary format, so there is no generic
/// text fallback: types without a mapping below are reported as unsupported.
pub fn pg_to_json(value: PgValueRef<'_>) -> Result<JsonValue> {
   if value.is_null() {
      return Ok(JsonValue::Null);
   }

   let column_type = value.type_info();
   let owned = ValueRef::to_owned(&value);

   let result = match column_type.name() {
      "BOOL" => owned.try_decode::<bool>().map(JsonValue::Bool).unwrap_or(JsonValue::Null),
      "INT2" => owned.try_decode::<i16>().map(JsonValue::from).unwrap_or(JsonValue::Null),
      "INT4" => owned.try_decode::<i32>().map(JsonValue::from).unwrap_or(JsonValue::Null),
      "INT8" => owned.try_decode::<i64>().map(JsonValue::from).unwrap_or(JsonValue::Null),
      "FLOAT4" => owned
         .try_decode::<f32>()
         .map(|v| JsonValue::from(f64::from(v)))
         .unwrap_or(JsonValue::Null),
      "FLOAT8" => owned.try_decode::<f64>().map(JsonValue::from).unwrap_or(JsonValue::Null),
      "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => text(owned.try_decode::<String>().ok()),
      "JSON" | "JSONB" => owned.try_decode::<JsonValue>().unwrap_or(JsonValue::Null),
      "BYTEA" => blob(owned.try_decode::<Vec<u8>>().ok()),
      "DATE" => display(owned.try_decode::<Date>().ok()),
      "TIME" => display(owned.try_decode::<Time>().ok()),
      "TIMESTAMP" => display(owned.try_decode::<PrimitiveDateTime>().ok()),
      "TIMESTAMPTZ" => display(owned.try_decode::<OffsetDateTime>().ok()),
      "VOID" => JsonValue::Null,
      other => {
         return Err(Error::UnsupportedDatatype(format!(
            "Unknown PostgreSQL type: {other}"
         )));
      }
   };

   Ok(result)
}

fn text(value: Option<String>) -> JsonValue {
   value.map(JsonValue::String).unwrap_or(JsonValue::Null)
}

fn display<T: std::fmt::Display>(value: Option<T>) -> JsonValue {
   value
      .map(|v| JsonValue::String(v.to_string()))
      .unwrap_or(JsonValue::Null)
}

fn blob(value: Option<Vec<u8>>) -> JsonValue {
   value
      .map(|bytes| JsonValue::String(base64_encode(&bytes)))
      .unwrap_or(JsonValue::Null)
}

fn fallback_text(value: Option<String>, backend: &str, type_name: &str) -> Result<JsonValue> {
   value.map(JsonValue::String).ok_or_else(|| {
      Error::UnsupportedDatatype(format!("Unknown {backend} type: {type_name}"))
   })
}

/// Base64 encode binary data, since JSON has no native binary type.
fn base64_encode(data: &[u8]) -> String {
   use base64::Engine;
   base64::engine::general_purpose::STANDARD.encode(data)
}
