use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteRow, SqliteValueRef};
use sqlx::{Column, Row, TypeInfo, Value, ValueRef};

use crate::{Error, Result};

/// Decode rows into column-ordered JSON objects
pub(crate) fn decode_rows(rows: Vec<SqliteRow>) -> Result<Vec<IndexMap<String, JsonValue>>> {
   let mut values = Vec::with_capacity(rows.len());
   for row in rows {
      let mut value = IndexMap::default();
      for (i, column) in row.columns().iter().enumerate() {
         let v = row.try_get_raw(i)?;
         value.insert(column.name().to_string(), to_json(v)?);
      }
      values.push(value);
   }
   Ok(values)
}

/// Convert a raw SQLite value to JSON based on its storage class.
///
/// BLOBs are returned as base64 text.
pub(crate) fn to_json(v: SqliteValueRef<'_>) -> Result<JsonValue> {
   if v.is_null() {
      return Ok(JsonValue::Null);
   }

   let type_name = v.type_info().name().to_string();
   let value = ValueRef::to_owned(&v);

   let json = match type_name.as_str() {
      "TEXT" | "DATE" | "TIME" | "DATETIME" => {
         value.try_decode::<String>().map(JsonValue::String)?
      }
      "REAL" => value.try_decode::<f64>().map(JsonValue::from)?,
      "INTEGER" | "NUMERIC" | "BOOLEAN" => value.try_decode::<i64>().map(JsonValue::from)?,
      "BLOB" => value
         .try_decode::<Vec<u8>>()
         .map(|bytes| JsonValue::String(STANDARD.encode(bytes)))?,
      "NULL" => JsonValue::Null,
      other => return Err(Error::UnsupportedDatatype(other.to_string())),
   };

   Ok(json)
}
