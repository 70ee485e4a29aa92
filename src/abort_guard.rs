use tokio::task::JoinHandle;

/// Guard that aborts a spawned fetch when dropped.
///
/// Dropping the guard before the task finishes cancels the task, which drops
/// the in-flight request and closes its connection.
///
/// # Example
/// ```
/// use llm_pipeline::AbortGuard;
/// # tokio_test::block_on(async {
/// let mut guard = AbortGuard::new(tokio::spawn(async { 42 }));
/// assert_eq!(guard.join().await.unwrap(), 42);
/// # });
/// ```
pub struct AbortGuard<T> {
    handle: JoinHandle<T>,
}

impl<T> AbortGuard<T> {
    /// Create a new guard from a [`JoinHandle`].
    pub fn new(handle: JoinHandle<T>) -> Self {
        Self { handle }
    }

    /// Waits for the task while keeping it abortable.
    ///
    /// Cancelling this future leaves the task running; dropping the guard is
    /// what stops it.
    pub async fn join(&mut self) -> Result<T, tokio::task::JoinError> {
        (&mut self.handle).await
    }
}

impl<T> Drop for AbortGuard<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
