//! Scripted connection provider shared by the registry test suites.
//!
//! Connections record every open, statement and close as an [`Event`] and
//! never touch SQLite. Special statements drive behavior:
//!
//! - `SLEEP <ms>`: wait before recording the statement
//! - `FAIL`: the statement's outcome is an error
//! - `FAIL_BATCH`: the whole batch fails
//!
//! Setting [`Script::panic_open`] makes the next open panic inside the worker.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sqlite_runner::{
   Backend, BoxFuture, Builder, ConnectionError, ConnectionProvider, DatabaseConnection,
   DirectoryLocator, QueryResult, Registry, Statement, StatementError, StatementOutcome,
   StorageLocator,
};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
   Open(String, Backend),
   Exec(String, String),
   Close(String),
}

#[derive(Default)]
pub struct Script {
   pub fail_open: AtomicBool,
   pub fail_close: AtomicBool,
   pub panic_open: AtomicBool,
   open_delay_ms: AtomicU64,
   opens: AtomicUsize,
   events: Mutex<Vec<Event>>,
}

impl Script {
   pub fn new() -> Arc<Self> {
      Arc::new(Self::default())
   }

   pub fn set_open_delay(&self, delay: Duration) {
      self
         .open_delay_ms
         .store(delay.as_millis() as u64, Ordering::SeqCst);
   }

   pub fn opens(&self) -> usize {
      self.opens.load(Ordering::SeqCst)
   }

   pub fn events(&self) -> Vec<Event> {
      self.events.lock().unwrap().clone()
   }

   /// Statements executed against `db`, in execution order
   pub fn execs(&self, db: &str) -> Vec<String> {
      self
         .events()
         .into_iter()
         .filter_map(|event| match event {
            Event::Exec(name, sql) if name == db => Some(sql),
            _ => None,
         })
         .collect()
   }

   pub fn closes(&self, db: &str) -> usize {
      self
         .events()
         .iter()
         .filter(|event| matches!(event, Event::Close(name) if name == db))
         .count()
   }

   fn record(&self, event: Event) {
      self.events.lock().unwrap().push(event);
   }
}

fn scripted_failure(message: &str) -> ConnectionError {
   ConnectionError::Io(std::io::Error::other(message.to_string()))
}

#[derive(Clone)]
pub struct ScriptedProvider(pub Arc<Script>);

impl ConnectionProvider for ScriptedProvider {
   fn open<'a>(
      &'a self,
      path: &'a Path,
      backend: Backend,
   ) -> BoxFuture<'a, Result<Box<dyn DatabaseConnection>, ConnectionError>> {
      Box::pin(async move {
         let delay = self.0.open_delay_ms.load(Ordering::SeqCst);
         if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
         }

         self.0.opens.fetch_add(1, Ordering::SeqCst);
         if self.0.panic_open.swap(false, Ordering::SeqCst) {
            panic!("scripted open panic");
         }
         if self.0.fail_open.load(Ordering::SeqCst) {
            return Err(scripted_failure("scripted open failure"));
         }

         if !path.exists() {
            fs::write(path, b"")?;
         }

         let db = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
         self.0.record(Event::Open(db.clone(), backend));

         Ok(Box::new(ScriptedConnection {
            db,
            script: Arc::clone(&self.0),
         }) as Box<dyn DatabaseConnection>)
      })
   }
}

struct ScriptedConnection {
   db: String,
   script: Arc<Script>,
}

impl DatabaseConnection for ScriptedConnection {
   fn execute_batch<'a>(
      &'a mut self,
      statements: &'a [Statement],
   ) -> BoxFuture<'a, Result<Vec<StatementOutcome>, ConnectionError>> {
      Box::pin(async move {
         let mut outcomes = Vec::with_capacity(statements.len());
         for statement in statements {
            if statement.sql == "FAIL_BATCH" {
               return Err(scripted_failure("scripted batch failure"));
            }
            if let Some(ms) = statement.sql.strip_prefix("SLEEP ") {
               let ms: u64 = ms.parse().unwrap_or(0);
               tokio::time::sleep(Duration::from_millis(ms)).await;
            }

            self
               .script
               .record(Event::Exec(self.db.clone(), statement.sql.clone()));

            outcomes.push(if statement.sql == "FAIL" {
               StatementOutcome::Error(StatementError {
                  code: "SCRIPTED".into(),
                  message: "scripted statement failure".into(),
               })
            } else {
               StatementOutcome::Success(QueryResult {
                  rows: Vec::new(),
                  rows_affected: 0,
                  insert_id: None,
               })
            });
         }
         Ok(outcomes)
      })
   }

   fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), ConnectionError>> {
      Box::pin(async move {
         self.script.record(Event::Close(self.db.clone()));
         if self.script.fail_close.load(Ordering::SeqCst) {
            return Err(scripted_failure("scripted close failure"));
         }
         Ok(())
      })
   }
}

/// Directory storage whose deletes take `delay` to finish.
pub struct SlowDeleteLocator {
   pub inner: DirectoryLocator,
   pub delay: Duration,
}

impl StorageLocator for SlowDeleteLocator {
   fn resolve(&self, name: &str) -> Result<PathBuf, ConnectionError> {
      self.inner.resolve(name)
   }

   fn delete(&self, path: &Path) -> Result<(), ConnectionError> {
      std::thread::sleep(self.delay);
      self.inner.delete(path)
   }
}

pub struct TestRegistry {
   pub registry: Registry,
   pub script: Arc<Script>,
   pub dir: TempDir,
}

pub fn scripted_registry() -> TestRegistry {
   scripted_registry_with(|builder, _| builder)
}

/// Scripted registry whose builder can be adjusted; the closure also gets the
/// storage directory.
pub fn scripted_registry_with(configure: impl FnOnce(Builder, &Path) -> Builder) -> TestRegistry {
   init_tracing();
   let dir = TempDir::new().expect("Failed to create temp directory");
   let script = Script::new();
   let builder = Builder::new(dir.path()).provider(ScriptedProvider(Arc::clone(&script)));
   let registry = configure(builder, dir.path()).build();

   TestRegistry {
      registry,
      script,
      dir,
   }
}

pub fn init_tracing() {
   let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn batch(sqls: &[&str]) -> Vec<Statement> {
   sqls.iter().map(|sql| Statement::sql(*sql)).collect()
}
