use tokio::sync::watch;

/// The latest successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Prompt that produced `text`.
    pub prompt: String,
    /// Full generated text.
    pub text: String,
}

impl Completion {
    pub fn new(prompt: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            text: text.into(),
        }
    }
}

/// Single-writer, many-reader cell holding the last [`Completion`].
///
/// Readers always see a whole entry, either the previous one or the new one.
pub struct ResultCache {
    tx: watch::Sender<Option<Completion>>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Replaces the cached entry and wakes subscribers.
    pub fn set(&self, completion: Completion) {
        self.tx.send_replace(Some(completion));
    }

    /// Snapshot of the cached entry.
    pub fn get(&self) -> Option<Completion> {
        self.tx.borrow().clone()
    }

    /// Whether the cached entry was produced by `prompt`.
    pub fn prompt_matches(&self, prompt: &str) -> bool {
        self.tx
            .borrow()
            .as_ref()
            .is_some_and(|c| c.prompt == prompt)
    }

    /// Receiver that is notified on every [`set`](Self::set).
    pub fn subscribe(&self) -> watch::Receiver<Option<Completion>> {
        self.tx.subscribe()
    }
}
