#![cfg(test)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::fetcher::{Generate, OnChunk};

/// One scripted reaction of [`ScriptedFetcher`].
#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Fail(FetchError),
    /// Sleep before replying.
    Slow(Duration, String),
}

/// [`Generate`] fake that plays back a script and records prompts.
///
/// Once the script runs out it answers `echo:<prompt>`.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Step>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn echo() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generate for ScriptedFetcher {
    async fn generate(&self, prompt: &str, on_chunk: OnChunk<'_>) -> Result<String, FetchError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let step = self.script.lock().unwrap().pop_front();
        let text = match step {
            Some(Step::Reply(text)) => text,
            Some(Step::Fail(e)) => return Err(e),
            Some(Step::Slow(delay, text)) => {
                tokio::time::sleep(delay).await;
                text
            }
            None => format!("echo:{prompt}"),
        };
        on_chunk(&text, true);
        Ok(text)
    }
}
