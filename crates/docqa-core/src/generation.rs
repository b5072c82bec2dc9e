//! Answer generation trait.
//!
//! The answer synthesizer sends a composed prompt to an external
//! generative-language service and hands back the completion untouched.
//! Concrete providers live in the `docqa` app crate.

use async_trait::async_trait;

use crate::error::GenerationError;

/// Trait for generative-language backends.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-1.5-flash-latest"`).
    fn model_name(&self) -> &str;

    /// Complete `prompt` and return the generated text verbatim.
    ///
    /// Implementations must not post-process the completion: downstream
    /// consumers may parse labelled fields (such as `ID:`) out of it.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
