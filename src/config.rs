//! Registry configuration

use serde::Deserialize;

/// Configuration for a [`Registry`](crate::Registry)
///
/// # Examples
///
/// ```
/// use sqlite_runner::RegistryConfig;
///
/// // Opening an already-open database is a no-op success
/// let config = RegistryConfig::default();
/// assert!(config.reopen_is_noop);
///
/// // Report re-open as an error instead
/// let config = RegistryConfig {
///     reopen_is_noop: false,
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryConfig {
   /// Answer an open request for a database that already has a live worker
   /// with success instead of [`Error::AlreadyOpen`](crate::Error::AlreadyOpen).
   ///
   /// Hosts routinely re-open databases they never closed, so this defaults on.
   ///
   /// Default: true
   pub reopen_is_noop: bool,
}

impl Default for RegistryConfig {
   fn default() -> Self {
      Self {
         reopen_is_noop: true,
      }
   }
}
