//! Hand-off of background results to the UI thread.
//!
//! Background tasks never touch UI state. They post closures through a
//! [`UiHandle`], and the UI thread applies them in order with
//! [`UiQueue::drain`] or [`UiQueue::next`]. [`UiQueue`] is `!Send`, so state
//! can only be mutated on the thread that created the queue.

use std::future::Future;
use std::marker::PhantomData;

use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::debug;

type UiTask<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Sending side; cheap to clone and safe to move into worker tasks.
pub struct UiHandle<S> {
    tx: mpsc::UnboundedSender<UiTask<S>>,
}

impl<S> Clone for UiHandle<S> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<S: 'static> UiHandle<S> {
    /// Queues `task` for the UI thread. Returns `false` if the queue is gone,
    /// in which case the task is dropped.
    pub fn post(&self, task: impl FnOnce(&mut S) + Send + 'static) -> bool {
        self.tx.send(Box::new(task)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side, owned by the UI thread.
pub struct UiQueue<S> {
    rx: mpsc::UnboundedReceiver<UiTask<S>>,
    _ui_thread: PhantomData<*const ()>,
}

impl<S: 'static> UiQueue<S> {
    pub fn new() -> (Self, UiHandle<S>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx,
                _ui_thread: PhantomData,
            },
            UiHandle { tx },
        )
    }

    /// Applies every task queued so far, oldest first, without waiting.
    pub fn drain(&mut self, state: &mut S) -> usize {
        let mut applied = 0;
        loop {
            match self.rx.try_recv() {
                Ok(task) => {
                    task(state);
                    applied += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        applied
    }

    /// Waits for one task and applies it. `false` once every handle is dropped
    /// and the queue is empty.
    pub async fn next(&mut self, state: &mut S) -> bool {
        match self.rx.recv().await {
            Some(task) => {
                task(state);
                true
            }
            None => false,
        }
    }

    /// Stops accepting new tasks; already queued ones can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Runs `work` on the runtime and posts `apply(state, output)` to the UI.
/// If the UI queue has been closed the output is discarded.
pub fn spawn_background<S, T, F, A>(handle: &UiHandle<S>, work: F, apply: A) -> JoinHandle<()>
where
    S: 'static,
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
    A: FnOnce(&mut S, T) + Send + 'static,
{
    let handle = handle.clone();
    tokio::spawn(async move {
        let output = work.await;
        if !handle.post(move |state| apply(state, output)) {
            debug!("ui queue closed, dropping background result");
        }
    })
}
