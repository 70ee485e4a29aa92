use async_trait::async_trait;
use llm_pipeline::{
    Completion, FetchError, Generate, Lifecycle, NoopNotifier, OnChunk, Pipeline, PipelineConfig,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};

/// Answers `<prompt>!` after `delay`. Prompts in `fail_once` fail on their
/// first call and `slow_prompt` never finishes.
#[derive(Default)]
struct RecordingLLM {
    calls: Mutex<Vec<String>>,
    delay: Duration,
    slow_prompt: Option<String>,
    fail_once: Mutex<Vec<String>>,
    cancelled: Arc<AtomicBool>,
}

struct MarkOnDrop(Arc<AtomicBool>, bool);

impl Drop for MarkOnDrop {
    fn drop(&mut self) {
        if !self.1 {
            self.0.store(true, Ordering::SeqCst);
        }
    }
}

impl RecordingLLM {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generate for RecordingLLM {
    async fn generate(&self, prompt: &str, on_chunk: OnChunk<'_>) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(prompt.to_string());
        let failed = {
            let mut fail = self.fail_once.lock().unwrap();
            match fail.iter().position(|p| p == prompt) {
                Some(i) => {
                    fail.remove(i);
                    true
                }
                None => false,
            }
        };
        if failed {
            return Err(FetchError::Incomplete);
        }
        let mut guard = MarkOnDrop(self.cancelled.clone(), false);
        if self.slow_prompt.as_deref() == Some(prompt) {
            sleep(Duration::from_secs(60)).await;
        } else {
            sleep(self.delay).await;
        }
        guard.1 = true;
        let text = format!("{prompt}!");
        on_chunk(&text, true);
        Ok(text)
    }
}

fn config() -> PipelineConfig {
    PipelineConfig::new("http://localhost:11434/api/generate", "py3")
        .quiet_window_ms(500)
        .deadline_ms(2000)
}

async fn next_update(pipeline: &Pipeline) -> Completion {
    let mut rx = pipeline.subscribe();
    rx.borrow_and_update();
    timeout(Duration::from_secs(30), rx.changed())
        .await
        .expect("no update")
        .unwrap();
    rx.borrow().clone().unwrap()
}

#[tokio::test(start_paused = true)]
async fn bursts_coalesce_into_the_last_prompt() {
    let llm = Arc::new(RecordingLLM::default());
    let pipeline = Pipeline::spawn_with(&config(), llm.clone(), NoopNotifier);
    let mut rx = pipeline.subscribe();

    pipeline.submit("a");
    sleep(Duration::from_millis(100)).await;
    pipeline.submit("ab");
    timeout(Duration::from_secs(5), rx.changed()).await.unwrap().unwrap();

    assert_eq!(llm.calls(), vec!["ab"]);
    assert_eq!(pipeline.get_latest(), Some(Completion::new("ab", "ab!")));
    pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn dispatch_waits_for_the_quiet_window() {
    let llm = Arc::new(RecordingLLM::default());
    let pipeline = Pipeline::spawn_with(&config(), llm.clone(), NoopNotifier);

    let start = Instant::now();
    pipeline.submit("a");
    sleep(Duration::from_millis(400)).await;
    assert!(llm.calls().is_empty());
    let done = next_update(&pipeline).await;
    assert_eq!(done.prompt, "a");
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn empty_prompt_never_fetches() {
    let llm = Arc::new(RecordingLLM::default());
    let pipeline = Pipeline::spawn_with(&config(), llm.clone(), NoopNotifier);

    pipeline.submit("");
    sleep(Duration::from_secs(3)).await;

    assert!(llm.calls().is_empty());
    assert_eq!(pipeline.get_latest(), None);
}

#[tokio::test(start_paused = true)]
async fn duplicate_of_last_success_is_skipped() {
    let llm = Arc::new(RecordingLLM::default());
    let updates = Arc::new(AtomicUsize::new(0));
    let counter = updates.clone();
    let pipeline = Pipeline::spawn_with(&config(), llm.clone(), move |_: &Completion| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    pipeline.submit("p");
    next_update(&pipeline).await;
    pipeline.submit("p");
    sleep(Duration::from_secs(3)).await;

    assert_eq!(llm.calls(), vec!["p"]);
    assert_eq!(updates.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_prompt_is_retried_on_resubmission() {
    let llm = Arc::new(RecordingLLM {
        fail_once: Mutex::new(vec!["p".into()]),
        ..Default::default()
    });
    let pipeline = Pipeline::spawn_with(&config(), llm.clone(), NoopNotifier);

    pipeline.submit("p");
    sleep(Duration::from_secs(1)).await;
    assert_eq!(pipeline.get_latest(), None);

    pipeline.submit("p");
    let done = next_update(&pipeline).await;
    assert_eq!(done, Completion::new("p", "p!"));
    assert_eq!(llm.calls(), vec!["p", "p"]);
}

#[tokio::test(start_paused = true)]
async fn timeout_keeps_previous_result_and_stays_responsive() {
    let llm = Arc::new(RecordingLLM {
        slow_prompt: Some("slow".into()),
        ..Default::default()
    });
    let pipeline = Pipeline::spawn_with(&config(), llm.clone(), NoopNotifier);

    pipeline.submit("fast");
    next_update(&pipeline).await;

    pipeline.submit("slow");
    // quiet window plus the deadline, and a little slack
    sleep(Duration::from_millis(500 + 2000 + 50)).await;
    assert_eq!(pipeline.get_latest(), Some(Completion::new("fast", "fast!")));
    assert!(llm.cancelled.load(Ordering::SeqCst));

    pipeline.submit("next");
    let done = next_update(&pipeline).await;
    assert_eq!(done, Completion::new("next", "next!"));
    assert_eq!(llm.calls(), vec!["fast", "slow", "next"]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_idempotent_and_prompt() {
    let llm = Arc::new(RecordingLLM::default());
    let pipeline = Pipeline::spawn_with(&config(), llm.clone(), NoopNotifier);

    timeout(Duration::from_millis(10), pipeline.shutdown())
        .await
        .expect("first shutdown hung");
    timeout(Duration::from_millis(10), pipeline.shutdown())
        .await
        .expect("second shutdown hung");
    assert_eq!(pipeline.lifecycle(), Lifecycle::Terminated);

    pipeline.submit("late");
    sleep(Duration::from_secs(3)).await;
    assert!(llm.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_does_not_wait_for_an_in_flight_fetch() {
    let llm = Arc::new(RecordingLLM {
        slow_prompt: Some("slow".into()),
        ..Default::default()
    });
    let pipeline = Pipeline::spawn_with(&config(), llm.clone(), NoopNotifier);

    pipeline.submit_now("slow");
    sleep(Duration::from_millis(100)).await;
    assert_eq!(llm.calls(), vec!["slow"]);

    let start = Instant::now();
    pipeline.shutdown().await;
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(pipeline.lifecycle(), Lifecycle::Terminated);
    sleep(Duration::from_millis(1)).await;
    assert!(llm.cancelled.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn immediate_submission_skips_debounce() {
    let llm = Arc::new(RecordingLLM {
        delay: Duration::from_millis(10),
        ..Default::default()
    });
    let pipeline = Pipeline::spawn_with(&config(), llm.clone(), NoopNotifier);

    let start = Instant::now();
    pipeline.submit_now("now");
    let done = next_update(&pipeline).await;
    assert_eq!(done.prompt, "now");
    assert!(start.elapsed() < Duration::from_millis(500));
}
