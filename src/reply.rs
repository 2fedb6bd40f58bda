//! Exactly-once result delivery

use std::fmt;

use tokio::sync::oneshot;
use tracing::warn;

use crate::{Error, Result};

type Sink<T> = Box<dyn FnOnce(Result<T>) + Send>;

/// The result channel paired with one submitted command.
///
/// A `Reply` is consumed by [`complete`](Reply::complete), so it can be answered
/// at most once. If it is dropped unanswered (a command discarded by a worker
/// that went away), the destructor delivers [`Error::CommandDropped`], so the
/// caller always hears back exactly once.
///
/// The sink runs on whichever task answers the command, typically the
/// database's worker. It must not block.
#[must_use = "a reply must be handed to a command or completed"]
pub struct Reply<T> {
   sink: Option<Sink<T>>,
}

impl<T> Reply<T> {
   /// Wrap a callback as a reply.
   pub fn new<F>(callback: F) -> Self
   where
      F: FnOnce(Result<T>) + Send + 'static,
   {
      Self {
         sink: Some(Box::new(callback)),
      }
   }

   pub fn complete(mut self, result: Result<T>) {
      self.deliver(result);
   }

   pub fn succeed(self, value: T) {
      self.complete(Ok(value));
   }

   pub fn fail(self, error: Error) {
      self.complete(Err(error));
   }

   fn deliver(&mut self, result: Result<T>) {
      if let Some(sink) = self.sink.take() {
         sink(result);
      }
   }
}

impl<T: Send + 'static> Reply<T> {
   /// Reply backed by a oneshot channel.
   pub fn channel() -> (Self, oneshot::Receiver<Result<T>>) {
      let (tx, rx) = oneshot::channel();
      let reply = Self::new(move |result| {
         // The caller may have stopped waiting; nothing else to notify.
         let _ = tx.send(result);
      });
      (reply, rx)
   }
}

/// Await a reply created with [`Reply::channel`].
pub(crate) async fn recv<T>(rx: oneshot::Receiver<Result<T>>) -> Result<T> {
   rx.await.unwrap_or(Err(Error::CommandDropped))
}

impl<T> Drop for Reply<T> {
   fn drop(&mut self) {
      if self.sink.is_some() {
         warn!("Reply dropped without a result");
         self.deliver(Err(Error::CommandDropped));
      }
   }
}

impl<T> fmt::Debug for Reply<T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Reply")
         .field("pending", &self.sink.is_some())
         .finish()
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use std::sync::Arc;
   use std::sync::atomic::{AtomicUsize, Ordering};

   #[tokio::test]
   async fn test_channel_delivers_success() {
      let (reply, rx) = Reply::channel();
      reply.succeed(42);
      assert_eq!(recv(rx).await.unwrap(), 42);
   }

   #[tokio::test]
   async fn test_channel_delivers_error() {
      let (reply, rx) = Reply::<()>::channel();
      reply.fail(Error::DatabaseNotOpen("a.db".into()));
      assert!(matches!(recv(rx).await, Err(Error::DatabaseNotOpen(name)) if name == "a.db"));
   }

   #[tokio::test]
   async fn test_drop_delivers_command_dropped() {
      let (reply, rx) = Reply::<()>::channel();
      drop(reply);
      assert!(matches!(recv(rx).await, Err(Error::CommandDropped)));
   }

   #[test]
   fn test_callback_invoked_exactly_once() {
      let calls = Arc::new(AtomicUsize::new(0));

      let counter = Arc::clone(&calls);
      let reply = Reply::<()>::new(move |_| {
         counter.fetch_add(1, Ordering::SeqCst);
      });
      reply.succeed(());

      let counter = Arc::clone(&calls);
      let reply = Reply::<()>::new(move |result| {
         assert!(matches!(result, Err(Error::CommandDropped)));
         counter.fetch_add(1, Ordering::SeqCst);
      });
      drop(reply);

      assert_eq!(calls.load(Ordering::SeqCst), 2);
   }

   #[test]
   fn test_debug_shows_pending() {
      let reply = Reply::<()>::new(|_| {});
      assert_eq!(format!("{reply:?}"), "Reply { pending: true }");
      reply.succeed(());
   }
}
