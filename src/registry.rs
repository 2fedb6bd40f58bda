//! Directory of live database workers

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use sqlx_sqlite_connector::{
   ConnectionProvider, Error as ConnectionError, OpenOptions, Statement, StatementOutcome,
   StorageLocator,
};
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use crate::command::{Command, Request};
use crate::config::RegistryConfig;
use crate::reply::recv;
use crate::worker::{Worker, WorkerContext, WorkerHandle, WorkerState, delete_storage};
use crate::{Error, Reply, Result};

/// Maps database names to their workers.
///
/// At most one worker exists per name. Workers remove themselves when they
/// terminate, before any new worker for the same name can be admitted.
///
/// Cloning is cheap; clones share the same workers. Call
/// [`shutdown_all`](Registry::shutdown_all) before the process exits.
#[derive(Clone)]
pub struct Registry {
   ctx: WorkerContext,
   config: RegistryConfig,
}

impl Registry {
   pub(crate) fn new(
      provider: Arc<dyn ConnectionProvider>,
      locator: Arc<dyn StorageLocator>,
      config: RegistryConfig,
   ) -> Self {
      Self {
         ctx: WorkerContext {
            workers: Arc::new(RwLock::new(HashMap::new())),
            provider,
            locator,
         },
         config,
      }
   }

   /// Start a worker for `name` and open the database on it.
   ///
   /// If a worker already exists, `reply` succeeds immediately without opening
   /// anything (or fails with [`Error::AlreadyOpen`] when
   /// [`RegistryConfig::reopen_is_noop`] is off). Otherwise the worker is
   /// registered before this returns and `reply` is answered once the open
   /// attempt finishes. Must be called within a Tokio runtime.
   pub async fn start_database(&self, name: &str, options: OpenOptions, reply: Reply<()>) {
      let mut workers = self.ctx.workers.write().await;

      match workers.entry(name.to_string()) {
         Entry::Occupied(_) if self.config.reopen_is_noop => {
            debug!(db = %name, "Already open");
            reply.succeed(());
         }
         Entry::Occupied(_) => reply.fail(Error::AlreadyOpen(name.to_string())),
         Entry::Vacant(slot) => {
            let (worker, handle) = Worker::new(name, options, self.ctx.clone());
            slot.insert(handle);
            tokio::spawn(worker.run(reply));
         }
      }
   }

   /// Open `name` and wait for the outcome.
   pub async fn open(&self, name: &str, options: OpenOptions) -> Result<()> {
      let (reply, rx) = Reply::channel();
      self.start_database(name, options, reply).await;
      recv(rx).await
   }

   /// Route a request to the worker for `name`.
   ///
   /// Never waits for a worker to appear: if none is live, the request is
   /// answered with [`Error::DatabaseNotOpen`].
   pub async fn submit(&self, name: &str, request: Request) {
      let workers = self.ctx.workers.read().await;
      match workers.get(name) {
         Some(handle) => enqueue(name, handle, request.into()),
         None => {
            debug!(db = %name, "Database not open");
            request.reject(Error::DatabaseNotOpen(name.to_string()));
         }
      }
   }

   /// Run `statements` in order as one unit on the worker for `name`.
   pub async fn execute_batch(
      &self,
      name: &str,
      statements: Vec<Statement>,
   ) -> Result<Vec<StatementOutcome>> {
      let (reply, rx) = Reply::channel();
      self
         .submit(name, Request::ExecuteBatch { statements, reply })
         .await;
      recv(rx).await
   }

   /// Run one statement; missing params are treated as none.
   pub async fn execute_single(
      &self,
      name: &str,
      sql: impl Into<String>,
      params: Option<Vec<JsonValue>>,
   ) -> Result<Vec<StatementOutcome>> {
      let statement = Statement::new(sql, params.unwrap_or_default());
      self.execute_batch(name, vec![statement]).await
   }

   /// Queue a close behind everything already submitted for `name`.
   ///
   /// Closing a database that is not open succeeds.
   pub async fn close_database(&self, name: &str, reply: Reply<()>) {
      let workers = self.ctx.workers.read().await;
      match workers.get(name) {
         Some(handle) => enqueue(name, handle, Command::Close { reply }),
         None => {
            debug!(db = %name, "Close requested for database that is not open");
            reply.succeed(());
         }
      }
   }

   /// Close `name` and wait for the outcome.
   pub async fn close(&self, name: &str) -> Result<()> {
      let (reply, rx) = Reply::channel();
      self.close_database(name, reply).await;
      recv(rx).await
   }

   /// Queue a close-and-delete behind everything already submitted for `name`.
   ///
   /// If the database is not open, its storage is deleted right away on the
   /// blocking pool.
   pub async fn delete_database(&self, name: &str, reply: Reply<()>) {
      // Held while deleting so no worker for `name` can start meanwhile.
      let workers = self.ctx.workers.read().await;
      match workers.get(name) {
         Some(handle) => enqueue(name, handle, Command::CloseAndDelete { reply }),
         None => {
            let deleted = match self.ctx.locator.resolve(name) {
               Ok(path) => delete_storage(Arc::clone(&self.ctx.locator), path).await,
               Err(e) => Err(e),
            };
            reply.complete(deleted.map_err(|source| delete_failed(name, source)));
         }
      }
   }

   /// Delete `name` and wait for the outcome.
   pub async fn delete(&self, name: &str) -> Result<()> {
      let (reply, rx) = Reply::channel();
      self.delete_database(name, reply).await;
      recv(rx).await
   }

   /// Delete the storage for `name` on the caller's task.
   ///
   /// Does not consult the registry; only use it for databases that are not open.
   pub fn delete_database_now(&self, name: &str) -> Result<()> {
      self
         .ctx
         .locator
         .resolve(name)
         .and_then(|path| self.ctx.locator.delete(&path))
         .map_err(|source| delete_failed(name, source))
   }

   /// Close the connection for `name` immediately, bypassing its queue.
   ///
   /// Meant for process teardown. The worker keeps running but every later
   /// batch fails. Failures are logged.
   pub async fn close_now(&self, name: &str) {
      let handle = self.ctx.workers.read().await.get(name).cloned();
      match handle {
         Some(handle) => handle.force_close(name).await,
         None => debug!(db = %name, "close_now: database not open"),
      }
   }

   /// Force-close every database, stop its worker and empty the registry.
   ///
   /// Commands still queued are answered with [`Error::DatabaseNotOpen`].
   pub async fn shutdown_all(&self) {
      let mut workers = self.ctx.workers.write().await;
      debug!("Shutting down {} database worker(s)", workers.len());

      for (name, handle) in workers.drain() {
         handle.force_close(&name).await;
         if handle.enqueue(Command::Stop).is_err() {
            error!(db = %name, "Couldn't stop database worker");
         }
      }
   }

   pub async fn is_open(&self, name: &str) -> bool {
      self.ctx.workers.read().await.contains_key(name)
   }

   /// Names with a live worker, in no particular order
   pub async fn open_databases(&self) -> Vec<String> {
      self.ctx.workers.read().await.keys().cloned().collect()
   }

   /// Lifecycle state of the worker for `name`, if one is registered
   pub async fn worker_state(&self, name: &str) -> Option<WorkerState> {
      self
         .ctx
         .workers
         .read()
         .await
         .get(name)
         .map(WorkerHandle::state)
   }
}

fn delete_failed(name: &str, source: ConnectionError) -> Error {
   warn!(db = %name, error = %source, "Couldn't delete database");
   Error::DeleteFailed {
      name: name.to_string(),
      source,
   }
}

fn enqueue(name: &str, handle: &WorkerHandle, command: Command) {
   if let Err(command) = handle.enqueue(command) {
      error!(db = %name, "Couldn't add command to worker queue");
      command.reject(Error::QueueSubmitFailed(name.to_string()));
   }
}
