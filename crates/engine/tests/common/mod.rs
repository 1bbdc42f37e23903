//! Scripted in-process provider double shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use av_domain::error::{Error, Result};
use av_domain::stream::{BoxStream, StreamEvent, Usage};
use av_engine::StorySession;
use av_providers::traits::{ChatRequest, ChatResponse, LlmProvider, ModelInfo};
use av_providers::{ProviderRegistry, RetryPolicy};

/// One scripted reply, consumed in order.
pub enum Script {
    /// `complete` / `complete_with_tools` returns this content.
    Complete(String),
    /// `complete` fails with this error.
    CompleteErr(Error),
    /// `stream` opens and yields these chunks, then `Done`.
    Stream(Vec<&'static str>),
    /// `stream` fails to open.
    StreamErr(Error),
}

pub struct MockProvider {
    script: Mutex<VecDeque<Script>>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(script: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Total provider calls made so far (any operation).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self, op: &str) -> Script {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| panic!("mock provider script exhausted on `{op}`"))
    }

    fn usage() -> Usage {
        Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
            reasoning_tokens: None,
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, _req: &ChatRequest) -> Result<ChatResponse> {
        match self.next("complete") {
            Script::Complete(content) => Ok(ChatResponse {
                content,
                tool_calls: Vec::new(),
                usage: Some(Self::usage()),
                model: "mock".into(),
                finish_reason: Some("stop".into()),
            }),
            Script::CompleteErr(e) => Err(e),
            _ => panic!("script mismatch: `complete` called but a stream entry was queued"),
        }
    }

    async fn stream(&self, _req: &ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        match self.next("stream") {
            Script::Stream(chunks) => {
                let stream = async_stream::stream! {
                    for chunk in chunks {
                        tokio::time::sleep(Duration::from_millis(1)).await;
                        yield Ok(StreamEvent::Token { text: chunk.to_owned() });
                    }
                    yield Ok(StreamEvent::Done {
                        usage: Some(MockProvider::usage()),
                        finish_reason: Some("stop".into()),
                    });
                };
                Ok(Box::pin(stream))
            }
            Script::StreamErr(e) => Err(e),
            _ => panic!("script mismatch: `stream` called but a completion entry was queued"),
        }
    }

    async fn complete_with_tools(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.complete(req).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo { id: "mock".into() }])
    }

    async fn validate_credentials(&self) -> Result<()> {
        Ok(())
    }

    fn provider_id(&self) -> &str {
        "mock"
    }
}

/// Registry holding only the mock provider.
pub fn registry_with(provider: Arc<MockProvider>) -> Arc<ProviderRegistry> {
    let mut registry = ProviderRegistry::empty();
    registry.register(provider);
    Arc::new(registry)
}

/// A session wired to a scripted mock with fast retry delays.
pub fn scripted_session(
    config: av_domain::config::StoryConfig,
    script: Vec<Script>,
) -> (StorySession, Arc<MockProvider>) {
    init_tracing();
    let provider = MockProvider::new(script);
    let session =
        StorySession::with_options(config, registry_with(Arc::clone(&provider)), RetryPolicy::fast());
    (session, provider)
}

/// Install a test subscriber once so `RUST_LOG=debug` surfaces engine
/// tracing during test runs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// The smallest classification document that applies cleanly.
pub fn empty_classification() -> String {
    r#"{"entryUpdates":{},"chapterAnalysis":{"shouldCreateChapter":false}}"#.to_owned()
}
