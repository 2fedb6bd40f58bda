//! Per-database worker and its lifecycle state machine.
//!
//! ```text
//! Created -> Opening -> Ready <-> Executing -> Closing -> Terminated
//!               |                                            ^
//!               +-------------- open failed -----------------+
//! ```
//!
//! The worker is the only owner of its connection. The registry keeps a
//! [`WorkerHandle`] to enqueue commands and, during teardown only, to force the
//! connection closed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use sqlx_sqlite_connector::{
   ConnectionProvider, DatabaseConnection, Error as ConnectionError, OpenOptions, Statement,
   StatementOutcome, StorageLocator,
};
use tokio::runtime::Handle;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::command::Command;
use crate::queue::{CommandReceiver, CommandSender, command_queue};
use crate::{Error, Reply, Result};

/// Lifecycle state of a database worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkerState {
   Created,
   Opening,
   Ready,
   Executing,
   Closing,
   Terminated,
}

/// Live workers keyed by database name
pub(crate) type WorkerMap = Arc<RwLock<HashMap<String, WorkerHandle>>>;

type ConnectionSlot = Arc<Mutex<Option<Box<dyn DatabaseConnection>>>>;

/// Registry-side handle to a running worker.
#[derive(Clone)]
pub(crate) struct WorkerHandle {
   id: Uuid,
   queue: CommandSender,
   connection: ConnectionSlot,
   state: watch::Receiver<WorkerState>,
}

impl WorkerHandle {
   pub(crate) fn enqueue(&self, command: Command) -> std::result::Result<(), Command> {
      self.queue.enqueue(command)
   }

   pub(crate) fn state(&self) -> WorkerState {
      *self.state.borrow()
   }

   /// Close the connection out-of-band, bypassing the command queue.
   ///
   /// Waits for an in-flight batch to finish. Batches that run afterwards fail
   /// with [`ConnectionError::DatabaseClosed`]. Failures are only logged.
   pub(crate) async fn force_close(&self, name: &str) {
      let connection = self.connection.lock().await.take();
      match connection {
         Some(connection) => match connection.close().await {
            Ok(()) => debug!(db = %name, "Force-closed database connection"),
            Err(e) => warn!(db = %name, error = %e, "Couldn't force-close database connection"),
         },
         None => trace!(db = %name, "No open connection to force-close"),
      }
   }
}

/// How the command loop ended
enum Exit {
   Close { reply: Reply<()>, delete: bool },
   Stop,
}

/// Collaborators a worker needs to open and remove its database
#[derive(Clone)]
pub(crate) struct WorkerContext {
   pub(crate) workers: WorkerMap,
   pub(crate) provider: Arc<dyn ConnectionProvider>,
   pub(crate) locator: Arc<dyn StorageLocator>,
}

pub(crate) struct Worker {
   id: Uuid,
   name: String,
   options: OpenOptions,
   ctx: WorkerContext,
   connection: ConnectionSlot,
   queue: CommandReceiver,
   state: watch::Sender<WorkerState>,
   terminated: bool,
}

impl Worker {
   /// Build a worker and its handle. The worker does nothing until [`run`](Self::run).
   pub(crate) fn new(name: &str, options: OpenOptions, ctx: WorkerContext) -> (Self, WorkerHandle) {
      let id = Uuid::new_v4();
      let (tx, rx) = command_queue();
      let (state_tx, state_rx) = watch::channel(WorkerState::Created);
      let connection: ConnectionSlot = Arc::new(Mutex::new(None));

      if options.old_implementation {
         debug!(db = %name, "Using legacy database backend");
      }
      if options.commit_workaround_enabled() {
         debug!(db = %name, "COMMIT reopen workaround enabled");
      }

      let handle = WorkerHandle {
         id,
         queue: tx,
         connection: Arc::clone(&connection),
         state: state_rx,
      };

      let worker = Self {
         id,
         name: name.to_string(),
         options,
         ctx,
         connection,
         queue: rx,
         state: state_tx,
         terminated: false,
      };

      (worker, handle)
   }

   /// Open the database, then serve commands until a barrier or stop arrives.
   ///
   /// `open_reply` is answered once the open attempt finishes.
   pub(crate) async fn run(mut self, open_reply: Reply<()>) {
      self.set_state(WorkerState::Opening);

      let path = match self.open().await {
         Ok(path) => path,
         Err(source) => {
            error!(db = %self.name, error = %source, "Can't open database, stopping worker");
            self.deregister().await;
            self.terminate();
            open_reply.fail(Error::OpenFailed {
               name: self.name.clone(),
               source,
            });
            return;
         }
      };

      self.set_state(WorkerState::Ready);
      open_reply.succeed(());

      let exit = loop {
         let Some(command) = self.queue.next().await else {
            debug!(db = %self.name, "Command queue disconnected");
            break Exit::Stop;
         };

         match command {
            Command::ExecuteBatch { statements, reply } => {
               self.execute(&path, statements, reply).await;
            }
            Command::Close { reply } => break Exit::Close { reply, delete: false },
            Command::CloseAndDelete { reply } => break Exit::Close { reply, delete: true },
            Command::Stop => break Exit::Stop,
         }
      };

      match exit {
         Exit::Close { reply, delete } => {
            let result = self.close(&path, delete).await;
            self.terminate();
            reply.complete(result);
         }
         Exit::Stop => {
            debug!(db = %self.name, "Stopping database worker");
            self.release_connection().await;
            self.terminate();
         }
      }
   }

   async fn open(&mut self) -> std::result::Result<PathBuf, ConnectionError> {
      let path = self.ctx.locator.resolve(&self.name)?;
      self.ctx.locator.ensure_parent_exists(&path)?;

      debug!(db = %self.name, path = %path.display(), "Opening database");
      let connection = self.ctx.provider.open(&path, self.options.backend()).await?;
      *self.connection.lock().await = Some(connection);

      Ok(path)
   }

   async fn execute(
      &self,
      path: &Path,
      statements: Vec<Statement>,
      reply: Reply<Vec<StatementOutcome>>,
   ) {
      self.set_state(WorkerState::Executing);

      let mut slot = self.connection.lock().await;
      let result = match slot.as_mut() {
         Some(connection) => connection
            .execute_batch(&statements)
            .await
            .map_err(Error::ExecutionFailed),
         None => Err(Error::ExecutionFailed(ConnectionError::DatabaseClosed)),
      };
      if let Err(e) = &result {
         debug!(db = %self.name, error = %e, "Batch failed");
      }
      reply.complete(result);

      if self.options.commit_workaround_enabled() && is_lone_commit(&statements) {
         self.reopen(path, &mut slot).await;
      }

      drop(slot);
      self.set_state(WorkerState::Ready);
   }

   /// Close and reopen the connection so the backend releases its locks.
   async fn reopen(&self, path: &Path, slot: &mut Option<Box<dyn DatabaseConnection>>) {
      let Some(connection) = slot.take() else {
         return;
      };
      if let Err(e) = connection.close().await {
         warn!(db = %self.name, error = %e, "Couldn't close connection before reopen");
      }

      match self.ctx.provider.open(path, self.options.backend()).await {
         Ok(connection) => {
            *slot = Some(connection);
            trace!(db = %self.name, "Reopened connection after COMMIT");
         }
         Err(e) => error!(db = %self.name, error = %e, "Couldn't reopen database after COMMIT"),
      }
   }

   /// Close the connection and, if asked, delete the file, then leave the registry.
   ///
   /// The worker stays registered until the storage is gone, so no new worker
   /// for the same name can open the file while it is being deleted. It leaves
   /// the registry even when close or delete fails.
   async fn close(&self, path: &Path, delete: bool) -> Result<()> {
      self.set_state(WorkerState::Closing);

      let connection = self.connection.lock().await.take();
      let closed = match connection {
         Some(connection) => connection.close().await,
         None => Ok(()),
      };

      let result = match closed {
         Err(source) => {
            warn!(db = %self.name, error = %source, "Couldn't close database");
            Err(Error::CloseFailed {
               name: self.name.clone(),
               source,
            })
         }
         Ok(()) if delete => {
            match delete_storage(Arc::clone(&self.ctx.locator), path.to_path_buf()).await {
               Ok(()) => {
                  debug!(db = %self.name, "Closed and deleted database");
                  Ok(())
               }
               Err(source) => {
                  warn!(db = %self.name, error = %source, "Couldn't delete database");
                  Err(Error::DeleteFailed {
                     name: self.name.clone(),
                     source,
                  })
               }
            }
         }
         Ok(()) => {
            debug!(db = %self.name, "Closed database");
            Ok(())
         }
      };

      self.deregister().await;
      result
   }

   /// Close a connection still held when the worker stops.
   async fn release_connection(&self) {
      let connection = self.connection.lock().await.take();
      if let Some(connection) = connection
         && let Err(e) = connection.close().await
      {
         warn!(db = %self.name, error = %e, "Couldn't close database on stop");
      }
   }

   /// Remove this worker's own entry from the registry.
   async fn deregister(&self) {
      let mut workers = self.ctx.workers.write().await;
      remove_own_entry(&mut workers, &self.name, self.id);
   }

   /// Fail everything still queued and mark the worker terminated.
   fn terminate(&mut self) {
      let pending = self.queue.close_and_drain();
      if !pending.is_empty() {
         debug!(
            db = %self.name,
            count = pending.len(),
            "Rejecting commands queued behind worker termination"
         );
      }
      for command in pending {
         command.reject(Error::DatabaseNotOpen(self.name.clone()));
      }
      self.set_state(WorkerState::Terminated);
      self.terminated = true;
   }

   fn set_state(&self, state: WorkerState) {
      self.state.send_replace(state);
   }
}

impl Drop for Worker {
   /// A worker dropped before terminating was aborted or panicked. Leave the
   /// registry and answer whatever is still queued so the name is usable again.
   fn drop(&mut self) {
      if self.terminated {
         return;
      }

      error!(db = %self.name, "Database worker stopped unexpectedly, cleaning up");
      self.terminate();

      if let Ok(mut workers) = self.ctx.workers.try_write() {
         remove_own_entry(&mut workers, &self.name, self.id);
         return;
      }

      // Registry is busy; finish on the runtime
      let workers = Arc::clone(&self.ctx.workers);
      let (name, id) = (self.name.clone(), self.id);
      match Handle::try_current() {
         Ok(runtime) => {
            runtime.spawn(async move {
               remove_own_entry(&mut *workers.write().await, &name, id);
            });
         }
         Err(_) => warn!(db = %name, "No runtime left to deregister worker"),
      }
   }
}

/// Remove the entry for `name` only if it still belongs to worker `id`.
fn remove_own_entry(workers: &mut HashMap<String, WorkerHandle>, name: &str, id: Uuid) {
   if workers.get(name).is_some_and(|handle| handle.id == id) {
      workers.remove(name);
      trace!(db = %name, "Worker removed from registry");
   }
}

/// Delete the storage at `path` on the blocking pool.
pub(crate) async fn delete_storage(
   locator: Arc<dyn StorageLocator>,
   path: PathBuf,
) -> std::result::Result<(), ConnectionError> {
   tokio::task::spawn_blocking(move || locator.delete(&path))
      .await
      .unwrap_or_else(|e| Err(ConnectionError::Io(std::io::Error::other(e.to_string()))))
}

/// Batch consisting of exactly the single statement `COMMIT`
fn is_lone_commit(statements: &[Statement]) -> bool {
   matches!(statements, [only] if only.sql == "COMMIT")
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_is_lone_commit() {
      assert!(is_lone_commit(&[Statement::sql("COMMIT")]));

      assert!(!is_lone_commit(&[]));
      assert!(!is_lone_commit(&[Statement::sql("commit")]));
      assert!(!is_lone_commit(&[Statement::sql("COMMIT;")]));
      assert!(!is_lone_commit(&[Statement::sql("BEGIN"), Statement::sql("COMMIT")]));
      assert!(!is_lone_commit(&[Statement::sql("COMMIT"), Statement::sql("COMMIT")]));
   }
}
