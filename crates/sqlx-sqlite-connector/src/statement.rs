//! Statements and per-statement outcomes

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::Error;

/// One SQL statement with its positional bind values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
   pub sql: String,
   #[serde(default)]
   pub params: Vec<JsonValue>,
}

impl Statement {
   pub fn new(sql: impl Into<String>, params: Vec<JsonValue>) -> Self {
      Self {
         sql: sql.into(),
         params,
      }
   }

   /// Statement without bind values
   pub fn sql(sql: impl Into<String>) -> Self {
      Self::new(sql, Vec::new())
   }
}

/// Result of a statement that executed successfully.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
   /// Decoded rows, with column order preserved.
   pub rows: Vec<IndexMap<String, JsonValue>>,
   /// Rows changed by the statement (0 for queries and DDL).
   pub rows_affected: u64,
   /// Last inserted ROWID, set only when the statement inserted a row.
   #[serde(skip_serializing_if = "Option::is_none")]
   pub insert_id: Option<i64>,
}

/// Failure of a single statement within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementError {
   pub code: String,
   pub message: String,
}

impl From<&Error> for StatementError {
   fn from(error: &Error) -> Self {
      Self {
         code: error.error_code(),
         message: error.to_string(),
      }
   }
}

/// Outcome of one statement in a batch.
///
/// Serializes as `{"type": "success", "result": {...}}` or
/// `{"type": "error", "result": {"code": ..., "message": ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "result", rename_all = "lowercase")]
pub enum StatementOutcome {
   Success(QueryResult),
   Error(StatementError),
}

impl StatementOutcome {
   pub fn is_success(&self) -> bool {
      matches!(self, StatementOutcome::Success(_))
   }

   /// The successful result, if any
   pub fn result(&self) -> Option<&QueryResult> {
      match self {
         StatementOutcome::Success(result) => Some(result),
         StatementOutcome::Error(_) => None,
      }
   }
}
