//! Mutation gate — per-session exclusive access to the engine/layout handles.
//!
//! The only way in is [`MutationGate::with`], which runs a synchronous
//! closure while the gate is held. The closure cannot `.await`, so no caller
//! can keep the gate across a suspension point, and the guard is released on
//! every exit path including early returns and panics.
//!
//! Engine and layout calls can be CPU-heavy, so the closure runs on the
//! blocking pool with the owned guard moved in. The async caller only waits;
//! the runtime's worker threads stay free for every other session.

use std::sync::Arc;

use tokio::sync::Mutex;

use simlive_core::{EngineError, SessionError};

pub struct MutationGate<T> {
    inner: Arc<Mutex<T>>,
}

impl<T: Send + 'static> MutationGate<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Wait for the gate, run `f` on the guarded state off the async
    /// workers, release. A panic in `f` resumes on the caller.
    pub async fn with<R, F>(&self, f: F) -> Result<R, SessionError>
    where
        F: FnOnce(&mut T) -> Result<R, SessionError> + Send + 'static,
        R: Send + 'static,
    {
        let mut guard = self.inner.clone().lock_owned().await;
        blocking(move || f(&mut guard)).await
    }
}

/// Run engine work on the blocking pool and wait for it.
pub(crate) async fn blocking<R, F>(f: F) -> Result<R, SessionError>
where
    F: FnOnce() -> Result<R, SessionError> + Send + 'static,
    R: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => match e.try_into_panic() {
            Ok(panic) => std::panic::resume_unwind(panic),
            Err(e) => Err(SessionError::Engine(EngineError::Backend(format!(
                "engine call did not complete: {e}"
            )))),
        },
    }
}
