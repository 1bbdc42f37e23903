use av_domain::error::Result;
use av_domain::message::{Message, ToolCall, ToolChoice, ToolDefinition};
use av_domain::stream::{BoxStream, StreamEvent, Usage};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sampling temperature for narration requests.
pub const NARRATION_TEMPERATURE: f32 = 0.8;
/// Sampling temperature for tool/classification requests.
pub const TOOL_TEMPERATURE: f32 = 0.7;
/// Output cap applied when a request does not set one.
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// A provider-agnostic chat completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Model identifier. `None` uses the provider's default.
    pub model: Option<String>,
    /// The conversation messages to send, in order.
    pub messages: Vec<Message>,
    /// Sampling temperature. `None` lets the provider choose.
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,
    /// Maximum tokens in the response. `None` applies
    /// [`DEFAULT_MAX_TOKENS`].
    pub max_tokens: Option<u32>,
    pub stop_sequences: Vec<String>,
    /// Tool definitions the model may invoke.
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<ToolChoice>,
    /// Opaque fields merged verbatim into the request body.
    pub extra_body: serde_json::Map<String, serde_json::Value>,
}

/// A provider-agnostic chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Textual content of the response.
    pub content: String,
    /// Tool calls emitted by the model.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage information.
    pub usage: Option<Usage>,
    /// The model that actually produced the response.
    pub model: String,
    /// The reason the model stopped generating.
    pub finish_reason: Option<String>,
}

/// One entry from the provider's models listing.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub id: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The capability interface every LLM adapter implements.
///
/// Adding a provider is implementing this trait and registering one
/// record with the [`crate::ProviderRegistry`].
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a completion request and wait for the full response.
    async fn complete(&self, req: &ChatRequest) -> Result<ChatResponse>;

    /// Send a completion request and return a lazy stream of events.
    ///
    /// Chunks arrive in order; the stream terminates exactly once with a
    /// `Done` event. Dropping the stream releases the transport.
    async fn stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    /// Send a completion request carrying tool definitions.
    async fn complete_with_tools(&self, req: &ChatRequest) -> Result<ChatResponse>;

    /// List the models available at the endpoint. Bounded at 15 s.
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Cheap credential probe.
    async fn validate_credentials(&self) -> Result<()>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
