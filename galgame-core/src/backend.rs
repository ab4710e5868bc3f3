//! The text-completion capability the game depends on.
//!
//! The core only needs "prompt in, completion out". [`CompletionBackend`] is
//! that seam; the DeepSeek client implements it for real play and
//! [`crate::testing::MockBackend`] implements it for tests.

use async_trait::async_trait;
use deepseek::{DeepSeek, Request};
use std::time::Duration;

pub use deepseek::Error as BackendError;

/// Sampling settings for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout: Duration,
}

impl CompletionParams {
    /// Settings for the per-turn analysis call.
    pub fn analysis() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: 1500,
            timeout: Duration::from_secs(45),
        }
    }

    /// Settings for the long-term memory summary call.
    pub fn summary() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 200,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Something that turns a prompt into a completion.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String, BackendError>;
}

#[async_trait]
impl CompletionBackend for DeepSeek {
    async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String, BackendError> {
        let request = Request::prompt(prompt)
            .with_temperature(params.temperature)
            .with_max_tokens(params.max_tokens)
            .with_timeout(params.timeout);

        let response = DeepSeek::complete(self, request).await?;
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let analysis = CompletionParams::analysis();
        assert_eq!(analysis.timeout, Duration::from_secs(45));
        assert_eq!(analysis.max_tokens, 1500);

        let summary = CompletionParams::summary();
        assert_eq!(summary.temperature, 0.2);
        assert_eq!(summary.timeout, Duration::from_secs(30));
    }
}
