use crate::cache::Completion;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fetcher::Generate;
use crate::gate::InputGate;
use crate::notifier::Notifier;
use crate::pipeline::{Lifecycle, Pipeline};

/// [`Pipeline`] with its own runtime, for hosts without an async executor.
///
/// ```no_run
/// use llm_pipeline::{BlockingPipeline, NoopNotifier, PipelineConfig};
/// let pipeline = BlockingPipeline::new(&PipelineConfig::default(), NoopNotifier).unwrap();
/// pipeline.submit("pin1yin1");
/// let _ = pipeline.get_latest();
/// pipeline.shutdown();
/// ```
pub struct BlockingPipeline {
    // dropped before the runtime
    gate: InputGate,
    pipeline: Pipeline,
    runtime: tokio::runtime::Runtime,
}

impl BlockingPipeline {
    /// Validates `config` and starts an Ollama-backed pipeline.
    pub fn new<N>(config: &PipelineConfig, notifier: N) -> Result<Self, PipelineError>
    where
        N: Notifier + 'static,
    {
        let runtime = build_runtime()?;
        let pipeline = {
            let _enter = runtime.enter();
            Pipeline::spawn(config, notifier)?
        };
        Ok(Self {
            gate: InputGate::new(&pipeline, config.min_prompt_chars),
            pipeline,
            runtime,
        })
    }

    /// Starts a pipeline with a custom backend.
    pub fn with_fetcher<G, N>(
        config: &PipelineConfig,
        fetcher: G,
        notifier: N,
    ) -> Result<Self, PipelineError>
    where
        G: Generate + 'static,
        N: Notifier + 'static,
    {
        let runtime = build_runtime()?;
        let pipeline = {
            let _enter = runtime.enter();
            Pipeline::spawn_with(config, fetcher, notifier)
        };
        Ok(Self {
            gate: InputGate::new(&pipeline, config.min_prompt_chars),
            pipeline,
            runtime,
        })
    }

    pub fn submit(&self, prompt: impl Into<String>) {
        self.pipeline.submit(prompt);
    }

    pub fn submit_now(&self, prompt: impl Into<String>) {
        self.pipeline.submit_now(prompt);
    }

    pub fn get_latest(&self) -> Option<Completion> {
        self.pipeline.get_latest()
    }

    /// Applies the [`InputGate`] policy using the configured threshold.
    pub fn query(&self, input: &str) -> Option<Completion> {
        self.gate.query(input)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.pipeline.lifecycle()
    }

    /// Blocks until the worker has exited.
    ///
    /// Must not be called from within an async context.
    pub fn shutdown(&self) {
        self.runtime.block_on(self.pipeline.shutdown());
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime, PipelineError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("llm-pipeline")
        .enable_all()
        .build()?;
    Ok(runtime)
}
