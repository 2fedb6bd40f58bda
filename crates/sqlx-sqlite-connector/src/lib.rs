//! # sqlx-sqlite-connector
//!
//! Single-connection SQLite handles built on SQLx, meant to be owned by exactly one
//! worker at a time.
//!
//! ## Core Types
//!
//! - **[`SqliteConnectionHandle`]**: One open SQLite connection that executes ordered
//!   statement batches and decodes rows to JSON
//! - **[`ConnectionProvider`]** / **[`DatabaseConnection`]**: Seams used by callers that
//!   need to open and drive connections without depending on SQLx directly
//! - **[`StorageLocator`]**: Maps database names to files and deletes them
//! - **[`OpenOptions`]**: Open-time configuration selecting the connection [`Backend`]
//! - **[`Error`]**: Error type for connection operations
//!
//! ## Batches
//!
//! A batch is an ordered list of [`Statement`]s. Every statement produces one
//! [`StatementOutcome`]; a failing statement does not stop the statements after it.
//! Transaction control (`BEGIN`/`COMMIT`/`ROLLBACK`) is left to the caller.

mod config;
mod connection;
mod decode;
mod error;
mod statement;
mod storage;

pub use config::{Backend, OpenOptions};
pub use connection::{
   ConnectionProvider, DatabaseConnection, SqliteConnectionHandle, SqlxConnectionProvider,
};
pub use error::{Error, Result};
pub use statement::{QueryResult, Statement, StatementError, StatementOutcome};
pub use storage::{DirectoryLocator, StorageLocator, delete_database_files};

/// Boxed, sendable future returned by the connection traits.
pub use futures::future::BoxFuture;
