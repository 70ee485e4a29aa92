use crate::cache::Completion;

/// Host hook invoked after the cache receives a new completion.
///
/// Runs on the worker task, so implementations should return quickly. A
/// panic is caught and logged; the completion stays cached.
pub trait Notifier: Send + Sync {
    fn on_updated(&self, completion: &Completion);
}

impl<F> Notifier for F
where
    F: Fn(&Completion) + Send + Sync,
{
    fn on_updated(&self, completion: &Completion) {
        self(completion)
    }
}

/// Notifier that ignores updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn on_updated(&self, _completion: &Completion) {}
}
