//! Narrator provider boundary.
//!
//! The game engine treats the text-generating service as an untrusted
//! collaborator: it hands over a system prompt, a context snapshot and the
//! player's input, and gets back free text that is *supposed* to carry an
//! embedded JSON directive. Everything transport-shaped (HTTP, keys,
//! retries) lives behind the [`Narrator`] trait; the engine only depends on
//! being able to call it with a bounded timeout.

pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use mock::MockNarrator;

/// Errors a narrator implementation may surface to the caller.
///
/// The engine maps every variant onto its canned error-reply path; none of
/// these ever propagate out of a turn as a crash.
#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("narrator call timed out")]
    Timeout,

    #[error("narrator authentication failed")]
    Auth,

    #[error("narrator quota exhausted")]
    Quota,

    #[error("narrator network failure: {0}")]
    Network(String),

    #[error("narrator provider error: {0}")]
    Provider(String),
}

/// One completed narrator call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarratorReply {
    /// Free text, expected (but not trusted) to embed a JSON directive.
    pub text: String,

    /// Wall-clock latency of the call in milliseconds.
    pub latency_ms: u64,

    /// Token count reported by the provider, when available.
    pub tokens: Option<u32>,
}

impl NarratorReply {
    /// Build a reply with zero latency and no token count.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            latency_ms: 0,
            tokens: None,
        }
    }
}

/// A text-generating narration provider.
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Generate one narration turn.
    async fn narrate(
        &self,
        system_prompt: &str,
        context: &str,
        player_input: &str,
    ) -> Result<NarratorReply, NarratorError>;
}

/// Call a narrator with a bounded timeout.
///
/// An elapsed deadline is reported as [`NarratorError::Timeout`], putting it
/// on the same recovery path as every other provider failure.
pub async fn narrate_with_timeout<N: Narrator + ?Sized>(
    narrator: &N,
    system_prompt: &str,
    context: &str,
    player_input: &str,
    limit: Duration,
) -> Result<NarratorReply, NarratorError> {
    match tokio::time::timeout(limit, narrator.narrate(system_prompt, context, player_input)).await
    {
        Ok(result) => result,
        Err(_) => Err(NarratorError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowNarrator;

    #[async_trait]
    impl Narrator for SlowNarrator {
        async fn narrate(
            &self,
            _system_prompt: &str,
            _context: &str,
            _player_input: &str,
        ) -> Result<NarratorReply, NarratorError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(NarratorReply::text("too late"))
        }
    }

    #[tokio::test]
    async fn test_timeout_maps_to_narrator_error() {
        let result = narrate_with_timeout(
            &SlowNarrator,
            "system",
            "context",
            "input",
            Duration::from_millis(10),
        )
        .await;
        assert!(matches!(result, Err(NarratorError::Timeout)));
    }
}
