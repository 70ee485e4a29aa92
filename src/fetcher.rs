use std::sync::Arc;

use async_stream::stream;
use async_trait::async_trait;
use futures_util::pin_mut;
use futures_util::stream::{Stream, StreamExt};
use once_cell::sync::OnceCell;
use tracing::{debug, trace, warn};

use crate::codec::{GenerateChunk, GenerateRequest, LineDecoder, parse_chunk};
use crate::error::FetchError;

/// Progress callback receiving each fragment and its `done` flag.
pub type OnChunk<'a> = &'a mut (dyn FnMut(&str, bool) + Send);

/// A backend that turns one prompt into generated text.
///
/// Implementations make exactly one attempt per call and never retry.
#[async_trait]
pub trait Generate: Send + Sync {
    /// Streams a completion for `prompt`, reporting each fragment to
    /// `on_chunk`, and resolves with the accumulated text once the final
    /// record arrives.
    async fn generate(&self, prompt: &str, on_chunk: OnChunk<'_>) -> Result<String, FetchError>;
}

#[async_trait]
impl<T> Generate for Arc<T>
where
    T: Generate + ?Sized,
{
    async fn generate(&self, prompt: &str, on_chunk: OnChunk<'_>) -> Result<String, FetchError> {
        (**self).generate(prompt, on_chunk).await
    }
}

/// Accumulates a fragment stream until a record with `done = true`.
///
/// Transport errors end the attempt. A stream that finishes without a done
/// record yields [`FetchError::Incomplete`].
pub async fn collect_fragments<S>(fragments: S, on_chunk: OnChunk<'_>) -> Result<String, FetchError>
where
    S: Stream<Item = Result<GenerateChunk, FetchError>>,
{
    pin_mut!(fragments);
    let mut full = String::new();
    while let Some(item) = fragments.next().await {
        let chunk = item?;
        trace!(target: "llm", fragment = %chunk.response, done = chunk.done, "stream fragment");
        full.push_str(&chunk.response);
        on_chunk(&chunk.response, chunk.done);
        if chunk.done {
            return Ok(full);
        }
    }
    Err(FetchError::Incomplete)
}

/// Client for an Ollama style `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaFetcher {
    endpoint: String,
    model: String,
    client: OnceCell<reqwest::Client>,
}

impl OllamaFetcher {
    /// Creates a fetcher posting to the full `endpoint` URL, e.g.
    /// `http://localhost:11434/api/generate`.
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            client: OnceCell::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> Result<reqwest::Client, FetchError> {
        self.client
            .get_or_try_init(|| reqwest::Client::builder().no_proxy().build())
            .cloned()
            .map_err(|e| FetchError::Init(e.to_string()))
    }

    /// Sends the request and yields every parsable record of the response.
    ///
    /// Records that fail to parse are logged and skipped.
    pub fn fragments(
        &self,
        prompt: &str,
    ) -> impl Stream<Item = Result<GenerateChunk, FetchError>> + Send + use<> {
        let client = self.client();
        let endpoint = self.endpoint.clone();
        let body = serde_json::to_value(GenerateRequest {
            model: &self.model,
            prompt,
        });
        stream! {
            let client = match client {
                Ok(c) => c,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let body = match body {
                Ok(b) => b,
                Err(e) => {
                    yield Err(FetchError::Init(e.to_string()));
                    return;
                }
            };
            trace!(target: "llm", %endpoint, %body, "generate request");
            let resp = match client.post(&endpoint).json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    yield Err(FetchError::from(e));
                    return;
                }
            };
            let resp = match resp.error_for_status() {
                Ok(r) => r,
                Err(e) => {
                    yield Err(FetchError::Transport(e.to_string()));
                    return;
                }
            };
            let mut bytes = resp.bytes_stream();
            let mut decoder = LineDecoder::new();
            while let Some(next) = bytes.next().await {
                let data = match next {
                    Ok(b) => b,
                    Err(e) => {
                        debug!(target: "llm", error = %e, "stream error");
                        yield Err(FetchError::Transport(e.to_string()));
                        return;
                    }
                };
                for line in decoder.push(&data) {
                    match parse_chunk(&line) {
                        Ok(chunk) => {
                            yield Ok(chunk);
                        }
                        Err(e) => warn!(target: "llm", error = %e, %line, "skipping malformed record"),
                    }
                }
            }
            if let Some(line) = decoder.finish() {
                match parse_chunk(&line) {
                    Ok(chunk) => {
                        yield Ok(chunk);
                    }
                    Err(e) => warn!(target: "llm", error = %e, %line, "skipping malformed record"),
                }
            }
        }
    }
}

#[async_trait]
impl Generate for OllamaFetcher {
    async fn generate(&self, prompt: &str, on_chunk: OnChunk<'_>) -> Result<String, FetchError> {
        let text = collect_fragments(self.fragments(prompt), on_chunk).await?;
        debug!(target: "llm", %prompt, response = %text, "full response");
        Ok(text)
    }
}
