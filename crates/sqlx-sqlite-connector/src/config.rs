//! Open-time configuration for database connections

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteJournalMode, SqliteSynchronous};

/// SQLite connection backend, chosen once when a database is opened.
///
/// - **`Connector`**: write-ahead logging with `synchronous = NORMAL`
/// - **`Legacy`**: rollback journal (`DELETE`) with `synchronous = FULL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
   #[default]
   Connector,
   Legacy,
}

impl Backend {
   pub(crate) fn journal_mode(self) -> SqliteJournalMode {
      match self {
         Backend::Connector => SqliteJournalMode::Wal,
         Backend::Legacy => SqliteJournalMode::Delete,
      }
   }

   pub(crate) fn synchronous(self) -> SqliteSynchronous {
      match self {
         Backend::Connector => SqliteSynchronous::Normal,
         Backend::Legacy => SqliteSynchronous::Full,
      }
   }
}

/// Options recognized when a database is opened
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_connector::{Backend, OpenOptions};
///
/// // Use defaults
/// let options = OpenOptions::default();
/// assert_eq!(options.backend(), Backend::Connector);
///
/// // Legacy backend with the COMMIT workaround
/// let options = OpenOptions {
///     old_implementation: true,
///     bug_workaround: true,
/// };
/// assert!(options.commit_workaround_enabled());
///
/// // The workaround alone does nothing
/// let options = OpenOptions {
///     bug_workaround: true,
///     ..Default::default()
/// };
/// assert!(!options.commit_workaround_enabled());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenOptions {
   /// Select the legacy connection backend
   ///
   /// Default: false
   pub old_implementation: bool,

   /// Close and reopen the connection after a batch consisting solely of `COMMIT`
   ///
   /// Only honored together with `old_implementation`.
   ///
   /// Default: false
   pub bug_workaround: bool,
}

impl OpenOptions {
   /// Backend selected by these options
   pub fn backend(&self) -> Backend {
      if self.old_implementation {
         Backend::Legacy
      } else {
         Backend::Connector
      }
   }

   /// Whether a lone `COMMIT` batch must be followed by a connection reopen
   pub fn commit_workaround_enabled(&self) -> bool {
      self.old_implementation && self.bug_workaround
   }
}
