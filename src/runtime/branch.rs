//! Concurrent branches with a single FIFO merge point.
//!
//! Each branch runs as its own tokio task and sends its result into one
//! unbounded channel; the owner consumes results in arrival order. Dropping
//! the set aborts every branch still running.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::error;

pub struct BranchSet<T> {
    tasks: JoinSet<()>,
    tx: mpsc::UnboundedSender<T>,
    rx: mpsc::UnboundedReceiver<T>,
    spawned: usize,
    /// Results received plus branches that ended without one
    finished: usize,
}

impl<T: Send + 'static> BranchSet<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tasks: JoinSet::new(),
            tx,
            rx,
            spawned: 0,
            finished: 0,
        }
    }

    /// Launch an independent branch; its output is delivered by [`next`](Self::next)
    pub fn spawn<F>(&mut self, branch: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let tx = self.tx.clone();
        self.tasks.spawn(async move {
            let result = branch.await;
            // Receiver gone means the set was abandoned
            let _ = tx.send(result);
        });
        self.spawned += 1;
    }

    /// Next result in arrival order, or `None` once every branch has finished.
    ///
    /// A branch that panics yields no result; it is logged and skipped.
    pub async fn next(&mut self) -> Option<T> {
        while self.finished < self.spawned {
            tokio::select! {
                biased;
                Some(result) = self.rx.recv() => {
                    self.finished += 1;
                    return Some(result);
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Branch ended without a result");
                        self.finished += 1;
                    }
                }
                else => break,
            }
        }
        None
    }

    /// Branches spawned but not yet delivered
    pub fn outstanding(&self) -> usize {
        self.spawned - self.finished
    }

    /// Abort every running branch and drop queued results
    pub fn abandon(mut self) -> usize {
        let outstanding = self.outstanding();
        self.tasks.abort_all();
        outstanding
    }
}

impl<T: Send + 'static> Default for BranchSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
