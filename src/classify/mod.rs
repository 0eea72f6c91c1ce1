//! Knowledge classification: prompt, model call, reconciliation.

mod client;
mod prompt;
mod reconcile;
mod retry;

#[cfg(feature = "gemini")]
pub use client::GeminiClient;
pub use client::{ModelClient, ModelRequest};
pub use prompt::{structured_appendix, Prompt, PromptBuilder};
pub use reconcile::{
    is_not_found_notice, is_placeholder, parse_lines, parse_response, parse_strict, repair,
    strip_code_fence, synthesize_detail, ParseOutcome, Reconciliation, ResponseReconciler,
    ResponseSource,
};
pub use retry::{call_with_retry, RetryPolicy};
