use std::sync::{Mutex, MutexGuard};

use tokio::sync::{Notify, watch};

/// A prompt waiting in the [`Mailbox`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub prompt: String,
    /// Dispatch without waiting for the quiet window.
    pub immediate: bool,
}

/// What the worker gets back from [`Mailbox::wait_for_work`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mail {
    Work(Request),
    Shutdown,
}

/// Single-slot coalescing mailbox.
///
/// Holds at most one unprocessed [`Request`]. A new submission replaces the
/// pending one, so only the latest prompt is ever handed to the worker.
pub struct Mailbox {
    slot: Mutex<Option<Request>>,
    ready: Notify,
    closed: watch::Sender<bool>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    pub fn new() -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            slot: Mutex::new(None),
            ready: Notify::new(),
            closed,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Request>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Overwrites the pending request and wakes the waiter.
    ///
    /// Does nothing once shutdown has been requested.
    pub fn submit(&self, request: Request) {
        if self.is_closed() {
            return;
        }
        *self.slot() = Some(request);
        self.ready.notify_one();
    }

    /// Removes and returns the pending request, if any.
    pub fn take(&self) -> Option<Request> {
        self.slot().take()
    }

    /// Sets the terminal flag and wakes any waiter. Idempotent.
    pub fn request_shutdown(&self) {
        self.closed.send_replace(true);
        self.slot().take();
        self.ready.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // the sender lives as long as `self`, so this only fails after drop
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Suspends until a request is pending or shutdown is requested.
    ///
    /// Shutdown wins over a pending request.
    pub async fn wait_for_work(&self) -> Mail {
        loop {
            if self.is_closed() {
                return Mail::Shutdown;
            }
            if let Some(request) = self.take() {
                return Mail::Work(request);
            }
            tokio::select! {
                _ = self.ready.notified() => {}
                _ = self.closed() => {}
            }
        }
    }
}
