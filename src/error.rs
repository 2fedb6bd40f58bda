use sqlx_sqlite_connector::Error as ConnectionError;

/// Result type alias for runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors delivered through a command's [`Reply`](crate::Reply).
///
/// Every error is local to the command that produced it; none of them stop a
/// worker except the open and close/delete failures, which happen while the
/// worker is already leaving the registry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// The database could not be opened; the worker never started its loop.
   #[error("can't open database {name}: {source}")]
   OpenFailed {
      name: String,
      #[source]
      source: ConnectionError,
   },

   /// Open on a live database while re-open is configured as an error.
   #[error("database already open: {0}")]
   AlreadyOpen(String),

   /// No live worker exists for the database.
   #[error("database not open: {0}")]
   DatabaseNotOpen(String),

   /// The worker queue refused the command.
   #[error("couldn't add to queue for database: {0}")]
   QueueSubmitFailed(String),

   /// The batch could not run against the connection.
   #[error("execution failed: {0}")]
   ExecutionFailed(#[source] ConnectionError),

   #[error("couldn't close database {name}: {source}")]
   CloseFailed {
      name: String,
      #[source]
      source: ConnectionError,
   },

   #[error("couldn't delete database {name}: {source}")]
   DeleteFailed {
      name: String,
      #[source]
      source: ConnectionError,
   },

   /// The command was discarded before anyone answered it.
   #[error("command dropped before completion")]
   CommandDropped,
}

impl Error {
   /// Extract a structured error code from the error type.
   pub fn error_code(&self) -> String {
      match self {
         Error::OpenFailed { .. } => "OPEN_FAILED".to_string(),
         Error::AlreadyOpen(_) => "ALREADY_OPEN".to_string(),
         Error::DatabaseNotOpen(_) => "DATABASE_NOT_OPEN".to_string(),
         Error::QueueSubmitFailed(_) => "QUEUE_SUBMIT_FAILED".to_string(),
         Error::ExecutionFailed(source) => source.error_code(),
         Error::CloseFailed { .. } => "CLOSE_FAILED".to_string(),
         Error::DeleteFailed { .. } => "DELETE_FAILED".to_string(),
         Error::CommandDropped => "COMMAND_DROPPED".to_string(),
      }
   }
}
