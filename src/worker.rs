//! Debounce loop driving the pipeline.
//!
//! The worker is an explicit state machine. Each state has at most one
//! suspension point and every suspension point also watches for shutdown.
//!
//! ```text
//! Idle -> Draining -> QuietWait -> Settled -> Fetching -> Idle
//!            ^            |           |
//!            +------------+           +-> Idle (empty or duplicate)
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::cache::{Completion, ResultCache};
use crate::deadline::run_with_deadline;
use crate::error::FetchError;
use crate::fetcher::Generate;
use crate::mailbox::{Mail, Mailbox, Request};
use crate::notifier::Notifier;

/// States of the debounce loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WorkerState {
    /// Parked until a request or shutdown arrives.
    Idle,
    /// Holding a freshly drained request.
    Draining(Request),
    /// Waiting out the quiet window for the candidate prompt.
    QuietWait(String),
    /// The quiet window elapsed; the prompt is ready to dispatch.
    Settled(String),
    /// Awaiting the deadline-bounded fetch.
    Fetching(String),
    Terminated,
}

pub(crate) struct DebounceWorker {
    mailbox: Arc<Mailbox>,
    cache: Arc<ResultCache>,
    fetcher: Arc<dyn Generate>,
    notifier: Arc<dyn Notifier>,
    quiet_window: Duration,
    deadline: Duration,
    last_processed: Option<String>,
}

impl DebounceWorker {
    pub(crate) fn new(
        mailbox: Arc<Mailbox>,
        cache: Arc<ResultCache>,
        fetcher: Arc<dyn Generate>,
        notifier: Arc<dyn Notifier>,
        quiet_window: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            mailbox,
            cache,
            fetcher,
            notifier,
            quiet_window,
            deadline,
            last_processed: None,
        }
    }

    /// Drives the state machine until shutdown.
    pub(crate) async fn run(mut self) {
        let mut state = WorkerState::Idle;
        while state != WorkerState::Terminated {
            state = self.step(state).await;
        }
        debug!(target: "llm", "worker terminated");
    }

    async fn step(&mut self, state: WorkerState) -> WorkerState {
        if self.mailbox.is_closed() {
            return WorkerState::Terminated;
        }
        match state {
            WorkerState::Idle => match self.mailbox.wait_for_work().await {
                Mail::Work(request) => WorkerState::Draining(request),
                Mail::Shutdown => WorkerState::Terminated,
            },
            WorkerState::Draining(request) => {
                trace!(target: "llm", prompt = %request.prompt, immediate = request.immediate, "drained request");
                if request.immediate {
                    WorkerState::Settled(request.prompt)
                } else {
                    WorkerState::QuietWait(request.prompt)
                }
            }
            WorkerState::QuietWait(candidate) => {
                match tokio::time::timeout(self.quiet_window, self.mailbox.wait_for_work()).await {
                    Ok(Mail::Work(newer)) => WorkerState::Draining(newer),
                    Ok(Mail::Shutdown) => WorkerState::Terminated,
                    Err(_) => WorkerState::Settled(candidate),
                }
            }
            WorkerState::Settled(prompt) => {
                if prompt.is_empty() {
                    trace!(target: "llm", "empty prompt, nothing to do");
                    WorkerState::Idle
                } else if self.last_processed.as_deref() == Some(prompt.as_str()) {
                    debug!(target: "llm", %prompt, "prompt already processed");
                    WorkerState::Idle
                } else {
                    WorkerState::Fetching(prompt)
                }
            }
            WorkerState::Fetching(prompt) => self.fetch(prompt).await,
            WorkerState::Terminated => WorkerState::Terminated,
        }
    }

    async fn fetch(&mut self, prompt: String) -> WorkerState {
        info!(target: "llm", %prompt, "dispatching generation");
        let fetcher = self.fetcher.clone();
        let request = prompt.clone();
        let attempt = run_with_deadline(self.deadline, async move {
            fetcher
                .generate(&request, &mut |fragment: &str, done: bool| {
                    trace!(target: "llm", %fragment, done, "progress");
                })
                .await
        });
        let mailbox = self.mailbox.clone();
        let result = tokio::select! {
            res = attempt => Some(res),
            _ = mailbox.closed() => None,
        };
        match result {
            Some(res) => {
                self.finish(prompt, res);
                WorkerState::Idle
            }
            None => {
                debug!(target: "llm", %prompt, "shutdown during fetch, request cancelled");
                WorkerState::Terminated
            }
        }
    }

    fn finish(&mut self, prompt: String, result: Result<String, FetchError>) {
        match result {
            Ok(text) if text.is_empty() => {
                warn!(target: "llm", %prompt, "empty response, keeping cached result");
            }
            Ok(text) => {
                let completion = Completion::new(prompt.clone(), text);
                self.cache.set(completion.clone());
                self.last_processed = Some(prompt);
                info!(target: "llm", prompt = %completion.prompt, text = %completion.text, "result updated");
                let notified = catch_unwind(AssertUnwindSafe(|| self.notifier.on_updated(&completion)));
                if notified.is_err() {
                    warn!(target: "llm", prompt = %completion.prompt, "notifier panicked");
                }
            }
            Err(e) => {
                warn!(target: "llm", %prompt, outcome = ?e.outcome(), error = %e, "generation failed, keeping cached result");
            }
        }
    }
}
