//! Single SQLite connection handle and the traits used to drive it

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteConnection};
use sqlx::{Connection, Sqlite};
use tracing::{debug, trace};

use crate::config::Backend;
use crate::decode::decode_rows;
use crate::statement::{QueryResult, Statement, StatementError, StatementOutcome};
use crate::Result;

type SqliteQuery<'a> = sqlx::query::Query<'a, Sqlite, SqliteArguments<'a>>;

/// An open database connection owned by a single worker.
///
/// Implementations are never accessed from two tasks at once; the owner
/// serializes every call.
pub trait DatabaseConnection: Send {
   /// Execute the statements in order, producing one outcome per statement.
   ///
   /// Returns `Err` only when the batch as a whole could not run.
   fn execute_batch<'a>(
      &'a mut self,
      statements: &'a [Statement],
   ) -> BoxFuture<'a, Result<Vec<StatementOutcome>>>;

   /// Close the connection, releasing the underlying file handles.
   fn close(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}

/// Opens connections for a resolved database path.
pub trait ConnectionProvider: Send + Sync {
   fn open<'a>(
      &'a self,
      path: &'a Path,
      backend: Backend,
   ) -> BoxFuture<'a, Result<Box<dyn DatabaseConnection>>>;
}

/// [`ConnectionProvider`] that opens [`SqliteConnectionHandle`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlxConnectionProvider;

impl ConnectionProvider for SqlxConnectionProvider {
   fn open<'a>(
      &'a self,
      path: &'a Path,
      backend: Backend,
   ) -> BoxFuture<'a, Result<Box<dyn DatabaseConnection>>> {
      Box::pin(async move {
         let handle = SqliteConnectionHandle::open(path, backend).await?;
         Ok(Box::new(handle) as Box<dyn DatabaseConnection>)
      })
   }
}

/// One open SQLite connection.
///
/// Unlike a pool, the handle wraps exactly one `SqliteConnection`, so every
/// statement executed through it runs in the order it was issued.
#[derive(Debug)]
pub struct SqliteConnectionHandle {
   conn: SqliteConnection,
   path: PathBuf,
   backend: Backend,
}

impl SqliteConnectionHandle {
   /// Open (creating if missing) the database file at `path`.
   pub async fn open(path: &Path, backend: Backend) -> Result<Self> {
      let options = SqliteConnectOptions::new()
         .filename(path)
         .create_if_missing(true)
         .journal_mode(backend.journal_mode())
         .synchronous(backend.synchronous());

      let conn = SqliteConnection::connect_with(&options).await?;
      debug!(path = %path.display(), ?backend, "Opened sqlite connection");

      Ok(Self {
         conn,
         path: path.to_path_buf(),
         backend,
      })
   }

   pub fn path(&self) -> &Path {
      &self.path
   }

   pub fn backend(&self) -> Backend {
      self.backend
   }

   /// Execute statements in order. A failing statement is reported in its
   /// outcome slot and execution continues with the next one.
   pub async fn execute_batch(&mut self, statements: &[Statement]) -> Result<Vec<StatementOutcome>> {
      let mut outcomes = Vec::with_capacity(statements.len());
      for statement in statements {
         let outcome = match self.execute_statement(statement).await {
            Ok(result) => StatementOutcome::Success(result),
            Err(e) => {
               debug!(sql = %statement.sql, error = %e, "Statement failed");
               StatementOutcome::Error(StatementError::from(&e))
            }
         };
         outcomes.push(outcome);
      }
      Ok(outcomes)
   }

   async fn execute_statement(&mut self, statement: &Statement) -> Result<QueryResult> {
      let (changes_before, rowid_before) = self.change_counters().await?;

      let mut q = sqlx::query(&statement.sql);
      for value in &statement.params {
         q = bind_value(q, value.clone());
      }
      let rows = q.fetch_all(&mut self.conn).await?;

      let (changes_after, rowid_after) = self.change_counters().await?;
      let rows_affected = u64::try_from(changes_after.saturating_sub(changes_before)).unwrap_or(0);
      let insert_id = (rows_affected > 0 && rowid_after != rowid_before).then_some(rowid_after);
      trace!(sql = %statement.sql, rows = rows.len(), rows_affected, "Statement executed");

      Ok(QueryResult {
         rows: decode_rows(rows)?,
         rows_affected,
         insert_id,
      })
   }

   /// Connection-wide change counter and last inserted ROWID
   async fn change_counters(&mut self) -> Result<(i64, i64)> {
      let counters = sqlx::query_as::<_, (i64, i64)>("SELECT total_changes(), last_insert_rowid()")
         .fetch_one(&mut self.conn)
         .await?;
      Ok(counters)
   }

   /// Close the connection
   pub async fn close(self) -> Result<()> {
      self.conn.close().await?;
      debug!(path = %self.path.display(), "Closed sqlite connection");
      Ok(())
   }
}

impl DatabaseConnection for SqliteConnectionHandle {
   fn execute_batch<'a>(
      &'a mut self,
      statements: &'a [Statement],
   ) -> BoxFuture<'a, Result<Vec<StatementOutcome>>> {
      Box::pin(SqliteConnectionHandle::execute_batch(self, statements))
   }

   fn close(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
      Box::pin(SqliteConnectionHandle::close(*self))
   }
}

/// Bind a JSON value to a SQLx query
fn bind_value(query: SqliteQuery<'_>, value: JsonValue) -> SqliteQuery<'_> {
   match value {
      JsonValue::Null => query.bind(None::<JsonValue>),
      JsonValue::String(text) => query.bind(text),
      JsonValue::Bool(flag) => query.bind(flag),
      JsonValue::Number(number) => {
         // Preserve integer precision by binding as i64 when possible
         if let Some(int_val) = number.as_i64() {
            query.bind(int_val)
         } else if let Some(uint_val) = number.as_u64() {
            match i64::try_from(uint_val) {
               Ok(int_val) => query.bind(int_val),
               // Value too large for i64, use f64 (will lose precision)
               Err(_) => query.bind(uint_val as f64),
            }
         } else {
            query.bind(number.as_f64().unwrap_or_default())
         }
      }
      other => query.bind(other),
   }
}
