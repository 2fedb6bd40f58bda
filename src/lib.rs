//! # sqlite-runner
//!
//! Runs SQLite databases on dedicated per-database workers.
//!
//! Every open database gets one worker that owns its connection and consumes an
//! ordered command queue. Statements against one database therefore run strictly
//! in submission order, while different databases run in parallel. Results come
//! back through a [`Reply`], which is answered exactly once per command.
//!
//! ## Core Types
//!
//! - **[`Registry`]**: Maps database names to live workers and routes requests
//! - **[`Request`]**: Batch execution, close, or close-and-delete for one database
//! - **[`Reply`]**: Exactly-once result channel (callback or oneshot)
//! - **[`WorkerState`]**: Worker lifecycle, `Opening -> Ready <-> Executing -> Closing -> Terminated`
//! - **[`Builder`]**: Explicit registry construction
//!
//! ## Example
//!
//! ```no_run
//! use sqlite_runner::{Builder, OpenOptions, Statement};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sqlite_runner::Error> {
//!    let registry = Builder::new("/var/lib/app/databases").build();
//!
//!    registry.open("app.db", OpenOptions::default()).await?;
//!    registry
//!       .execute_batch(
//!          "app.db",
//!          vec![
//!             Statement::sql("CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY)"),
//!             Statement::sql("INSERT INTO t DEFAULT VALUES"),
//!          ],
//!       )
//!       .await?;
//!    registry.close("app.db").await?;
//!
//!    registry.shutdown_all().await;
//!    Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

mod command;
mod config;
mod error;
mod queue;
mod registry;
mod reply;
mod worker;

pub use command::Request;
pub use config::RegistryConfig;
pub use error::{Error, Result};
pub use registry::Registry;
pub use reply::Reply;
pub use worker::WorkerState;

pub use sqlx_sqlite_connector::{
   Backend, BoxFuture, ConnectionProvider, DatabaseConnection, DirectoryLocator, OpenOptions,
   QueryResult, SqlxConnectionProvider, Statement, StatementError, StatementOutcome,
   StorageLocator,
};
/// Errors raised by connections and storage, carried inside [`Error`].
pub use sqlx_sqlite_connector::Error as ConnectionError;

/// Builder for a [`Registry`].
///
/// # Example
///
/// ```no_run
/// use sqlite_runner::{Builder, RegistryConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = Builder::new("/var/lib/app/databases")
///    .config(RegistryConfig { reopen_is_noop: false })
///    .build();
/// # registry.shutdown_all().await;
/// # }
/// ```
pub struct Builder {
   locator: Arc<dyn StorageLocator>,
   provider: Arc<dyn ConnectionProvider>,
   config: RegistryConfig,
}

impl Builder {
   /// Create a builder storing databases as files under `storage_dir`.
   pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
      Self {
         locator: Arc::new(DirectoryLocator::new(storage_dir)),
         provider: Arc::new(SqlxConnectionProvider),
         config: RegistryConfig::default(),
      }
   }

   /// Replace how database names map to files.
   pub fn locator(mut self, locator: impl StorageLocator + 'static) -> Self {
      self.locator = Arc::new(locator);
      self
   }

   /// Replace how connections are opened.
   pub fn provider(mut self, provider: impl ConnectionProvider + 'static) -> Self {
      self.provider = Arc::new(provider);
      self
   }

   pub fn config(mut self, config: RegistryConfig) -> Self {
      self.config = config;
      self
   }

   /// Build the registry. No workers start until a database is opened.
   pub fn build(self) -> Registry {
      Registry::new(self.provider, self.locator, self.config)
   }
}
