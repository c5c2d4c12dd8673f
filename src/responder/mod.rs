#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "openai")]
pub use openai::OpenAIResponder;

use async_trait::async_trait;

/// Answers one prompt with one piece of text.
///
/// Any error is treated the same way by the refiner: it is recorded for the
/// iteration and the loop moves on.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, prompt: &str) -> anyhow::Result<String>;

    fn name(&self) -> &str;
}
