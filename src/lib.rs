//! Debounced, single-flight text generation for interactive input.
//!
//! Callers [`submit`](Pipeline::submit) prompts as fast as the user types.
//! A background worker waits for the input to go quiet, sends the latest
//! prompt to a streaming generate endpoint under a hard deadline, and
//! publishes the last successful answer for [`get_latest`](Pipeline::get_latest).
//! Failures never reach the caller; they only leave the previous answer in
//! place.

mod abort_guard;
mod blocking;
mod cache;
pub mod codec;
mod config;
mod deadline;
mod error;
mod fetcher;
mod gate;
mod mailbox;
mod notifier;
mod pipeline;
#[cfg(test)]
pub mod test_helpers;
mod worker;

pub use abort_guard::AbortGuard;
pub use blocking::BlockingPipeline;
pub use cache::{Completion, ResultCache};
pub use config::PipelineConfig;
pub use deadline::run_with_deadline;
pub use error::{ConfigError, FetchError, Outcome, PipelineError};
pub use fetcher::{Generate, OllamaFetcher, OnChunk, collect_fragments};
pub use gate::InputGate;
pub use mailbox::{Mail, Mailbox, Request};
pub use notifier::{NoopNotifier, Notifier};
pub use pipeline::{Lifecycle, Pipeline};
