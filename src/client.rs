//! Generation client seam.
//!
//! The core never talks to a concrete text-generation service directly; it
//! drives this capability trait. Implementations wrap one provider and map
//! its transport errors and empty/blocked responses onto
//! [`GenerationError`]. The client never retries — retry policy belongs to
//! whichever orchestration layer invokes it.

use async_trait::async_trait;

use crate::config::GenerationParams;
use crate::errors::GenerationError;

/// A stateless, freely shareable text-generation capability.
///
/// One call, one prompt, one text response. Implementations must map a
/// response with no usable text onto [`GenerationError::EmptyOrBlocked`],
/// carrying the provider's block reason when one is reported; the
/// [`usable_text`] helper does the emptiness half of that mapping.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Submit a prompt and return the generated text.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError>;
}

/// Map raw provider output onto the client contract.
///
/// Whitespace-only text counts as empty. `block_reason` is whatever the
/// provider reported alongside the response, if anything.
pub fn usable_text(
    text: String,
    block_reason: Option<String>,
) -> Result<String, GenerationError> {
    if text.trim().is_empty() {
        return Err(GenerationError::EmptyOrBlocked {
            reason: block_reason,
        });
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usable_text_passes_real_output_through() {
        let out = usable_text("some generated text".to_string(), None).unwrap();
        assert_eq!(out, "some generated text");
    }

    #[test]
    fn usable_text_rejects_empty_output() {
        let err = usable_text(String::new(), None).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::EmptyOrBlocked { reason: None }
        ));
    }

    #[test]
    fn usable_text_rejects_whitespace_and_keeps_block_reason() {
        let err = usable_text("  \n ".to_string(), Some("SAFETY".to_string())).unwrap_err();
        match err {
            GenerationError::EmptyOrBlocked { reason } => {
                assert_eq!(reason.as_deref(), Some("SAFETY"));
            }
            other => panic!("expected EmptyOrBlocked, got {other}"),
        }
    }
}
