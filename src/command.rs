//! Units of work submitted to a database worker

use sqlx_sqlite_connector::{Statement, StatementOutcome};

use crate::{Error, Reply};

/// A caller-submitted request for one database.
///
/// Single statements and batches are both `ExecuteBatch`; they differ only in
/// the length of `statements`. `Close` and `CloseAndDelete` are barriers:
/// everything queued before them completes first, and nothing queued after
/// them runs.
#[derive(Debug)]
pub enum Request {
   ExecuteBatch {
      statements: Vec<Statement>,
      reply: Reply<Vec<StatementOutcome>>,
   },
   Close {
      reply: Reply<()>,
   },
   CloseAndDelete {
      reply: Reply<()>,
   },
}

impl Request {
   /// Answer the request with `error` without running it.
   pub fn reject(self, error: Error) {
      Command::from(self).reject(error);
   }
}

/// Item consumed by a worker loop.
#[derive(Debug)]
pub(crate) enum Command {
   ExecuteBatch {
      statements: Vec<Statement>,
      reply: Reply<Vec<StatementOutcome>>,
   },
   Close {
      reply: Reply<()>,
   },
   CloseAndDelete {
      reply: Reply<()>,
   },
   /// Shutdown signal; carries no reply.
   Stop,
}

impl Command {
   pub(crate) fn reject(self, error: Error) {
      match self {
         Command::ExecuteBatch { reply, .. } => reply.fail(error),
         Command::Close { reply } | Command::CloseAndDelete { reply } => reply.fail(error),
         Command::Stop => {}
      }
   }
}

impl From<Request> for Command {
   fn from(request: Request) -> Self {
      match request {
         Request::ExecuteBatch { statements, reply } => Command::ExecuteBatch { statements, reply },
         Request::Close { reply } => Command::Close { reply },
         Request::CloseAndDelete { reply } => Command::CloseAndDelete { reply },
      }
   }
}
