use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::ModelInvoker;
use crate::error::CalculateError;
use crate::normalize::NormalizedImage;

/// A scripted invoker for tests. Always gives the same reply and counts calls.
pub struct MockInvoker {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl MockInvoker {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails as an upstream error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelInvoker for MockInvoker {
    async fn invoke(&self, _prompt: &str, _image: &NormalizedImage) -> Result<String, CalculateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(CalculateError::Upstream)
    }
}
