use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::trace;

use crate::cache::{Completion, ResultCache};
use crate::mailbox::{Mailbox, Request};
use crate::pipeline::Pipeline;

/// Host-facing policy deciding when typed input becomes a prompt.
///
/// Short inputs are ignored and clear what the gate shows; from then on it
/// answers `None` until a completion produced after the clear arrives. Once
/// the input reaches `min_chars` its spaces are stripped and the result is
/// submitted; the keystroke that first reaches the threshold is dispatched
/// without debounce. Every call answers at once with whatever completion is
/// visible, which may belong to an older prompt.
pub struct InputGate {
    mailbox: Arc<Mailbox>,
    cache: Arc<ResultCache>,
    min_chars: usize,
    shown: Mutex<Shown>,
}

struct Shown {
    updates: watch::Receiver<Option<Completion>>,
    cleared: bool,
}

impl InputGate {
    pub fn new(pipeline: &Pipeline, min_chars: usize) -> Self {
        Self {
            mailbox: pipeline.mailbox().clone(),
            cache: pipeline.cache().clone(),
            min_chars,
            shown: Mutex::new(Shown {
                updates: pipeline.subscribe(),
                cleared: false,
            }),
        }
    }

    fn shown(&self) -> MutexGuard<'_, Shown> {
        self.shown.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Feeds the current raw input and returns the completion to display.
    pub fn query(&self, input: &str) -> Option<Completion> {
        let len = input.chars().count();
        if len < self.min_chars {
            let mut shown = self.shown();
            shown.updates.borrow_and_update();
            shown.cleared = true;
            return None;
        }
        let prompt: String = input.chars().filter(|c| *c != ' ').collect();
        if prompt.is_empty() || self.cache.prompt_matches(&prompt) {
            return self.visible();
        }
        trace!(target: "llm", %prompt, "gate submit");
        let immediate = len == self.min_chars;
        self.mailbox.submit(Request { prompt, immediate });
        self.visible()
    }

    fn visible(&self) -> Option<Completion> {
        let mut shown = self.shown();
        if shown.cleared {
            if !shown.updates.has_changed().unwrap_or(false) {
                return None;
            }
            shown.updates.borrow_and_update();
            shown.cleared = false;
        }
        self.cache.get()
    }
}
