//! Testing utilities.
//!
//! `ScriptedNarrator` returns canned narration in order, and `TestHarness`
//! wires one into a seeded session. Scripted replies are raw text — fenced
//! directive blocks and all — so harness turns exercise the full
//! extraction/validation/guardrail pipeline, not a shortcut around it.

use crate::engine::TurnResult;
use crate::session::{GameSession, SessionConfig};
use crate::state::GameState;
use async_trait::async_trait;
use narrator::{Narrator, NarratorError, NarratorReply};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A narrator that replays scripted responses in order.
#[derive(Default)]
pub struct ScriptedNarrator {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw reply.
    pub fn push(&self, text: impl Into<String>) {
        self.replies.lock().unwrap().push_back(text.into());
    }

    /// Format a narrative plus a fenced directive block, the way a
    /// well-behaved provider would reply.
    pub fn reply_with_directive(narrative: &str, directive: &Value) -> String {
        format!("Part A: Narrative\n{narrative}\n\nPart B: Directive JSON\n```json\n{directive:#}\n```\n")
    }
}

#[async_trait]
impl Narrator for ScriptedNarrator {
    async fn narrate(
        &self,
        _system_prompt: &str,
        _context: &str,
        _player_input: &str,
    ) -> Result<NarratorReply, NarratorError> {
        let text = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "The narrator has no more scripted lines.".to_string());
        Ok(NarratorReply::text(text))
    }
}

/// A seeded session driven by a scripted narrator.
pub struct TestHarness {
    pub narrator: Arc<ScriptedNarrator>,
    pub session: GameSession,
}

impl TestHarness {
    /// A harness with a fixed dice seed and default character.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::new("Test Hero").with_seed(7))
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let narrator = Arc::new(ScriptedNarrator::new());
        let session = GameSession::new(narrator.clone(), config);
        Self { narrator, session }
    }

    /// Queue a plain narrative reply (no directive — the pipeline falls
    /// back).
    pub fn expect_narrative(&self, text: impl Into<String>) -> &Self {
        self.narrator.push(text);
        self
    }

    /// Queue a narrative with an embedded directive.
    pub fn expect_directive(&self, narrative: &str, directive: &Value) -> &Self {
        self.narrator
            .push(ScriptedNarrator::reply_with_directive(narrative, directive));
        self
    }

    /// Send player input through the full turn pipeline.
    pub async fn input(&mut self, text: &str) -> TurnResult {
        self.session.player_action(text).await
    }

    pub fn state(&self) -> &GameState {
        self.session.state()
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        self.session.state_mut()
    }

    pub fn in_combat(&self) -> bool {
        self.session.in_combat()
    }

    /// Current and maximum HP.
    pub fn player_hp(&self) -> (i32, i32) {
        self.session.hp_status()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion helpers
// ============================================================================

/// Assert the harness is in combat.
#[track_caller]
pub fn assert_in_combat(harness: &TestHarness) {
    assert!(harness.in_combat(), "Expected to be in combat");
}

/// Assert the harness is NOT in combat.
#[track_caller]
pub fn assert_not_in_combat(harness: &TestHarness) {
    assert!(!harness.in_combat(), "Expected to NOT be in combat");
}

/// Assert player HP is at expected values.
#[track_caller]
pub fn assert_hp(harness: &TestHarness, current: i32, max: i32) {
    let (actual_current, actual_max) = harness.player_hp();
    assert_eq!(
        (actual_current, actual_max),
        (current, max),
        "Expected HP {current}/{max}, got {actual_current}/{actual_max}"
    );
}

/// Assert a story flag is present.
#[track_caller]
pub fn assert_flag(harness: &TestHarness, flag: &str) {
    assert!(
        harness.state().story.flags.iter().any(|f| f == flag),
        "Expected story flag '{flag}' to be set"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let mut harness = TestHarness::new();
        harness.expect_narrative("Response 1").expect_narrative("Response 2");

        assert_eq!(harness.input("first").await.narrative, "Response 1");
        assert_eq!(harness.input("second").await.narrative, "Response 2");
        assert!(harness
            .input("third")
            .await
            .narrative
            .contains("no more scripted"));
    }

    #[tokio::test]
    async fn test_directive_reply_goes_through_pipeline() {
        let mut harness = TestHarness::new();
        harness.expect_directive(
            "A stranger eyes your purse.",
            &json!({
                "need_check": true,
                "check": {"attribute": "Mind", "dc": 10, "reason": "notice the stranger"},
                "enter_combat": false,
                "gold_change": 100,
            }),
        );

        let result = harness.input("watch the crowd").await;
        assert!(result.narrative.contains("stranger"));
        assert!(result.check_result.is_some());
        // The polluted key never made it into the directive.
        assert!(result.directive.need_check);
    }
}
