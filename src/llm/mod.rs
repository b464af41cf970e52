//! LLM access: the completion capability, the OpenRouter client, retries
//! and multimodal helpers.

mod error;
mod multimodal;
mod openrouter;
mod retry;
mod types;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

pub use error::{ErrorKind, LlmError};
pub use multimodal::{analyze_chart, analyze_image, encode_image};
pub use openrouter::OpenRouterClient;
pub use retry::{RetryPolicy, RetryingClient};
pub use types::{
    CompletionOptions, ContentPart, Conversation, ImageUrl, Message, MessageContent, Role,
};

/// Incremental text fragments, in arrival order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// A chat completion endpoint.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Request one completion and return the assistant text.
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<String, LlmError>;

    /// Stream a completion. The default yields the full completion as a
    /// single fragment.
    async fn stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<TextStream, LlmError> {
        let text = self.complete(messages, options).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(text) })))
    }
}
