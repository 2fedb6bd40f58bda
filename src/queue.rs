//! Per-worker command queue.
//!
//! An unbounded multi-producer/single-consumer FIFO. Delivery order per queue
//! is the only ordering primitive the runner relies on.

use tokio::sync::mpsc;

use crate::command::Command;

pub(crate) fn command_queue() -> (CommandSender, CommandReceiver) {
   let (tx, rx) = mpsc::unbounded_channel();
   (CommandSender(tx), CommandReceiver(rx))
}

/// Producer end, shared by every caller that submits to the worker.
#[derive(Debug, Clone)]
pub(crate) struct CommandSender(mpsc::UnboundedSender<Command>);

impl CommandSender {
   /// Never blocks. Hands the command back if the worker has stopped consuming.
   pub(crate) fn enqueue(&self, command: Command) -> Result<(), Command> {
      self.0.send(command).map_err(|e| e.0)
   }
}

/// Consumer end, owned by the worker.
#[derive(Debug)]
pub(crate) struct CommandReceiver(mpsc::UnboundedReceiver<Command>);

impl CommandReceiver {
   /// Wait for the next command; `None` once every sender is gone.
   pub(crate) async fn next(&mut self) -> Option<Command> {
      self.0.recv().await
   }

   /// Stop accepting commands and return whatever is still queued, in order.
   pub(crate) fn close_and_drain(&mut self) -> Vec<Command> {
      self.0.close();
      let mut pending = Vec::new();
      while let Ok(command) = self.0.try_recv() {
         pending.push(command);
      }
      pending
   }
}
