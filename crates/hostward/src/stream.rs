//! Lazily started, cancellable stream of assessment states.

use futures_util::future::BoxFuture;
use futures_util::Stream;
use hostward_core::{AssessmentState, Category};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

/// States of one category run: `Running` zero or more times, then exactly
/// one `Terminal`, then end of stream.
///
/// Nothing runs until the stream is first polled. Dropping the stream
/// cancels the run; the run still sweeps its hardware keys in the
/// background.
pub struct AssessmentStream {
    category: Category,
    pending: Option<BoxFuture<'static, ()>>,
    task: Option<JoinHandle<()>>,
    states: UnboundedReceiverStream<AssessmentState>,
    cancel: watch::Sender<bool>,
    done: bool,
}

impl std::fmt::Debug for AssessmentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssessmentStream")
            .field("category", &self.category)
            .field("started", &self.is_started())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl AssessmentStream {
    pub(crate) fn new(
        category: Category,
        run: BoxFuture<'static, ()>,
        states: mpsc::UnboundedReceiver<AssessmentState>,
        cancel: watch::Sender<bool>,
    ) -> Self {
        Self {
            category,
            pending: Some(run),
            task: None,
            states: UnboundedReceiverStream::new(states),
            cancel,
            done: false,
        }
    }

    /// Category being assessed.
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Whether the run has been spawned.
    pub const fn is_started(&self) -> bool {
        self.task.is_some() || (self.pending.is_none() && !self.done)
    }

    /// Cancel the run and wait until it has cleaned up.
    ///
    /// A started run still delivers its `Terminal` state, with unfinished
    /// probes marked cancelled. A run that never started yields nothing.
    pub async fn cancel(&mut self) {
        self.cancel.send_replace(true);
        if self.pending.take().is_some() {
            debug!(category = %self.category, "cancelled before start");
            self.done = true;
            return;
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(category = %self.category, error = %e, "assessment task failed");
            }
        }
    }

    fn start(&mut self) {
        if let Some(run) = self.pending.take() {
            debug!(category = %self.category, "starting assessment");
            self.task = Some(tokio::spawn(run));
        }
    }
}

impl Stream for AssessmentStream {
    type Item = AssessmentState;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        this.start();

        match Pin::new(&mut this.states).poll_next(cx) {
            Poll::Ready(Some(state)) => {
                if state.is_terminal() {
                    this.done = true;
                }
                Poll::Ready(Some(state))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for AssessmentStream {
    fn drop(&mut self) {
        self.cancel.send_replace(true);
    }
}
