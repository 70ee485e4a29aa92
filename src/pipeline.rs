use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{info, trace, warn};

use crate::cache::{Completion, ResultCache};
use crate::config::PipelineConfig;
use crate::error::ConfigError;
use crate::fetcher::{Generate, OllamaFetcher};
use crate::mailbox::{Mailbox, Request};
use crate::notifier::Notifier;
use crate::worker::DebounceWorker;

/// Lifecycle of the background worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Running,
    /// Shutdown requested, worker still unwinding.
    ShuttingDown,
    Terminated,
}

/// Debounced, single-flight text generation.
///
/// Prompts go in through [`submit`](Self::submit), which never waits on the
/// network. A background worker dispatches the latest prompt once input has
/// been quiet for the configured window and publishes successful results to
/// [`get_latest`](Self::get_latest).
///
/// Must be created inside a tokio runtime.
///
/// ```no_run
/// use llm_pipeline::{Completion, Pipeline, PipelineConfig};
/// # async fn example() -> Result<(), llm_pipeline::ConfigError> {
/// let cfg = PipelineConfig::new("http://localhost:11434/api/generate", "py3");
/// let pipeline = Pipeline::spawn(&cfg, |c: &Completion| println!("{}", c.text))?;
/// pipeline.submit("pin1yin1");
/// // ... later
/// if let Some(done) = pipeline.get_latest() {
///     println!("{} -> {}", done.prompt, done.text);
/// }
/// pipeline.shutdown().await;
/// # Ok(()) }
/// ```
pub struct Pipeline {
    mailbox: Arc<Mailbox>,
    cache: Arc<ResultCache>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Pipeline {
    /// Validates `config` and starts a pipeline backed by [`OllamaFetcher`].
    pub fn spawn<N>(config: &PipelineConfig, notifier: N) -> Result<Self, ConfigError>
    where
        N: Notifier + 'static,
    {
        config.validate()?;
        let fetcher = OllamaFetcher::new(config.endpoint.clone(), config.model.clone());
        Ok(Self::spawn_with(config, fetcher, notifier))
    }

    /// Starts a pipeline using a custom [`Generate`] backend.
    pub fn spawn_with<G, N>(config: &PipelineConfig, fetcher: G, notifier: N) -> Self
    where
        G: Generate + 'static,
        N: Notifier + 'static,
    {
        let mailbox = Arc::new(Mailbox::new());
        let cache = Arc::new(ResultCache::new());
        let worker = DebounceWorker::new(
            mailbox.clone(),
            cache.clone(),
            Arc::new(fetcher),
            Arc::new(notifier),
            config.quiet_window(),
            config.deadline(),
        );
        let handle = tokio::spawn(worker.run());
        info!(
            target: "llm",
            quiet_window_ms = config.quiet_window_ms,
            deadline_ms = config.deadline_ms,
            "pipeline started"
        );
        Self {
            mailbox,
            cache,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Queues `prompt`, replacing any prompt not yet dispatched.
    pub fn submit(&self, prompt: impl Into<String>) {
        self.enqueue(prompt.into(), false);
    }

    /// Queues `prompt` for dispatch without waiting for the quiet window.
    pub fn submit_now(&self, prompt: impl Into<String>) {
        self.enqueue(prompt.into(), true);
    }

    fn enqueue(&self, prompt: String, immediate: bool) {
        trace!(target: "llm", %prompt, immediate, "submit");
        self.mailbox.submit(Request { prompt, immediate });
    }

    /// The most recent successful completion, if any.
    pub fn get_latest(&self) -> Option<Completion> {
        self.cache.get()
    }

    /// Receiver notified whenever a new completion is cached.
    pub fn subscribe(&self) -> watch::Receiver<Option<Completion>> {
        self.cache.subscribe()
    }

    pub(crate) fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub(crate) fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    pub fn lifecycle(&self) -> Lifecycle {
        let Ok(worker) = self.worker.try_lock() else {
            return Lifecycle::ShuttingDown;
        };
        match worker.as_ref() {
            None => Lifecycle::Terminated,
            Some(handle) if handle.is_finished() => Lifecycle::Terminated,
            Some(_) if self.mailbox.is_closed() => Lifecycle::ShuttingDown,
            Some(_) => Lifecycle::Running,
        }
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// An in-flight fetch is cancelled rather than awaited. Calling this more
    /// than once is harmless.
    pub async fn shutdown(&self) {
        self.mailbox.request_shutdown();
        let mut worker = self.worker.lock().await;
        if let Some(handle) = worker.take() {
            if let Err(e) = handle.await {
                warn!(target: "llm", error = %e, "worker exited abnormally");
            }
            info!(target: "llm", "pipeline shut down");
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.mailbox.request_shutdown();
    }
}
