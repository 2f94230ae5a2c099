pub mod gemini;
pub mod mock;

use async_trait::async_trait;

use crate::error::CalculateError;
use crate::normalize::NormalizedImage;

/// Sends the prompt and sketch to a multimodal model and returns its raw
/// completion text. Failures come back as [`CalculateError::Upstream`].
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, prompt: &str, image: &NormalizedImage) -> Result<String, CalculateError>;
}
