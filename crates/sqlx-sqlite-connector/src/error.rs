//! Error types for sqlx-sqlite-connector

use thiserror::Error;

/// Errors that may occur when opening, using, or deleting a database
#[derive(Error, Debug)]
pub enum Error {
   /// IO error when accessing database files. Standard library IO errors
   /// are converted to this variant.
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Error from the sqlx library. Standard sqlx errors are converted to this variant
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// Database has been closed and cannot be used
   #[error("Database has been closed")]
   DatabaseClosed,

   /// Database name cannot be mapped to a file inside the storage root
   #[error("invalid database name: {0:?}")]
   InvalidDatabaseName(String),

   /// SQLite type that cannot be mapped to JSON
   #[error("unsupported datatype: {0}")]
   UnsupportedDatatype(String),
}

impl Error {
   /// Machine-readable code for this error.
   ///
   /// SQLite database errors report their native result code as `SQLITE_<code>`.
   pub fn error_code(&self) -> String {
      match self {
         Error::Sqlx(e) => {
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("SQLITE_{}", code);
            }
            "SQLX_ERROR".to_string()
         }
         Error::Io(_) => "IO_ERROR".to_string(),
         Error::DatabaseClosed => "DATABASE_CLOSED".to_string(),
         Error::InvalidDatabaseName(_) => "INVALID_DATABASE_NAME".to_string(),
         Error::UnsupportedDatatype(_) => "UNSUPPORTED_DATATYPE".to_string(),
      }
   }
}

/// A type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_error_code_database_closed() {
      assert_eq!(Error::DatabaseClosed.error_code(), "DATABASE_CLOSED");
      assert_eq!(Error::DatabaseClosed.to_string(), "Database has been closed");
   }

   #[test]
   fn test_error_code_invalid_database_name() {
      let err = Error::InvalidDatabaseName("../x.db".into());
      assert_eq!(err.error_code(), "INVALID_DATABASE_NAME");
      assert!(err.to_string().contains("../x.db"));
   }

   #[test]
   fn test_error_code_io() {
      let err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
      assert_eq!(err.error_code(), "IO_ERROR");
   }

   #[test]
   fn test_error_code_sqlx_non_database() {
      let err = Error::Sqlx(sqlx::Error::RowNotFound);
      assert_eq!(err.error_code(), "SQLX_ERROR");
   }
}
