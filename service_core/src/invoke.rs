use crate::error::InferenceError;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

/// Set once the caller stopped waiting for a blocking inference task.
///
/// Work queued behind a model lock checks it after acquiring the lock, so an
/// abandoned request never runs the network.
#[derive(Debug, Clone)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
    timeout: Duration,
}

impl Cancellation {
    pub fn new(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            timeout,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), InferenceError> {
        if self.is_cancelled() {
            return Err(InferenceError::Timeout(self.timeout));
        }
        Ok(())
    }
}

/// Runs a blocking inference closure on the blocking pool, bounded by `timeout`.
///
/// On timeout the caller gets [`InferenceError::Timeout`] and the closure's
/// [`Cancellation`] is set. A closure already running the network finishes in
/// the background and its result is discarded.
pub async fn run_blocking<T, E, F>(timeout: Duration, task: F) -> Result<T, E>
where
    F: FnOnce(&Cancellation) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<InferenceError> + Send + 'static,
{
    let cancellation = Cancellation::new(timeout);
    let task_cancellation = cancellation.clone();
    let handle = tokio::task::spawn_blocking(move || task(&task_cancellation));

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(InferenceError::Task(join_error.to_string()).into()),
        Err(_) => {
            cancellation.cancel();
            tracing::warn!("Inference abandoned after {:?}", timeout);
            Err(InferenceError::Timeout(timeout).into())
        }
    }
}
