use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::{mpsc, oneshot};

use crate::error::{FrameworkError, Result};

type Job = Box<dyn FnOnce() + Send>;

enum Command {
    Run(Job),
    Settle(oneshot::Sender<()>),
}

/// The delivery thread of one process side.
///
/// Publishers enqueue one job per subscriber and return immediately. A single
/// task drains the queue in order, so every callback of a side runs on the
/// same logical thread and never concurrently with another callback.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Command>,
}

impl Dispatcher {
    /// Spawn the delivery task on the current tokio runtime.
    pub fn spawn() -> Result<Self> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            FrameworkError::Runtime("no tokio runtime found for the event dispatcher".to_string())
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(run(rx));

        Ok(Self { tx })
    }

    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if self.tx.send(Command::Run(Box::new(job))).is_err() {
            tracing::debug!("dispatcher stopped, dropping delivery");
        }
    }

    /// Resolves once every job enqueued before this call has run.
    ///
    /// Jobs enqueued by those callbacks themselves land behind the marker and
    /// are not waited for.
    pub async fn settle(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Settle(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Run(job) => {
                // A panicking subscriber must not take the delivery thread down.
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::error!("event subscriber panicked");
                }
            }
            Command::Settle(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("event dispatcher finished");
}
