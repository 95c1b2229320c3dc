//! Deterministic narrator for demos and tests.

use crate::{Narrator, NarratorError, NarratorReply};
use async_trait::async_trait;
use serde_json::json;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Instant;

const ACTION_BANK: [&str; 5] = [
    "Inspect nearby traces",
    "Ask a passerby",
    "Move cautiously forward",
    "Check for hidden signs",
    "Re-evaluate the clue",
];

const CHECK_KEYWORDS: [&str; 5] = ["inspect", "check", "search", "调查", "观察"];
const COMBAT_KEYWORDS: [&str; 5] = ["fight", "battle", "combat", "战斗", "开打"];

/// A narrator that answers without any remote service.
///
/// Responses are a pure function of the player input: the same input always
/// yields the same narration, the same directive and the same suggested
/// actions. The directive rides in a fenced JSON block exactly like a real
/// provider's output, so callers exercise their full extraction pipeline.
#[derive(Debug, Default, Clone)]
pub struct MockNarrator;

impl MockNarrator {
    pub fn new() -> Self {
        Self
    }

    fn stable_actions(seed_text: &str) -> Vec<String> {
        let mut hasher = DefaultHasher::new();
        seed_text.hash(&mut hasher);
        let idx = (hasher.finish() % ACTION_BANK.len() as u64) as usize;
        (0..3)
            .map(|offset| ACTION_BANK[(idx + offset) % ACTION_BANK.len()].to_string())
            .collect()
    }
}

#[async_trait]
impl Narrator for MockNarrator {
    async fn narrate(
        &self,
        _system_prompt: &str,
        _context: &str,
        player_input: &str,
    ) -> Result<NarratorReply, NarratorError> {
        let started = Instant::now();
        let lower = player_input.trim().to_lowercase();
        let actions = Self::stable_actions(&lower);

        let need_check = CHECK_KEYWORDS.iter().any(|k| lower.contains(k));
        let enter_combat = COMBAT_KEYWORDS.iter().any(|k| lower.contains(k));
        let pack_id = if enter_combat { "bandits_1" } else { "" };

        let directive = json!({
            "need_check": need_check,
            "check": {
                "attribute": "Mind",
                "dc": (if need_check { 15 } else { 10 }),
                "reason": "Mock deterministic check.",
            },
            "enter_combat": enter_combat,
            "combat": {"enemy_pack_id": pack_id},
            "grant_clue": need_check,
            "clue": (if need_check {
                json!({"title": "mock_clue", "detail": "A deterministic clue from the mock narrator."})
            } else {
                json!({"title": "", "detail": ""})
            }),
            "flags_to_add": ["scene:mock_narrator"],
            "world_tick": {"threat_delta": 0, "clock_delta": 1, "notes": "Mock world tick."},
            "npc_attitude_changes": [],
            "offer_actions": actions,
            "tone_tags": ["mock", "deterministic"],
        });

        let shown_input = if player_input.trim().is_empty() {
            "(empty action)"
        } else {
            player_input.trim()
        };
        let text = format!(
            "Part A: Narrative\nYou act: {shown_input}.\n\
             The world responds in a stable, deterministic way for demo purposes.\n\n\
             Part B: Directive JSON\n```json\n{directive:#}\n```\n"
        );

        Ok(NarratorReply {
            text,
            latency_ms: started.elapsed().as_millis() as u64,
            tokens: Some(64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_is_deterministic() {
        let mock = MockNarrator::new();
        let a = mock.narrate("sys", "ctx", "inspect the altar").await.unwrap();
        let b = mock.narrate("sys", "ctx", "inspect the altar").await.unwrap();
        assert_eq!(a.text, b.text);
        assert!(a.text.contains("```json"));
        assert!(a.text.contains("\"need_check\": true"));
    }

    #[tokio::test]
    async fn test_combat_keyword_sets_pack() {
        let mock = MockNarrator::new();
        let reply = mock.narrate("sys", "ctx", "I fight the bandits").await.unwrap();
        assert!(reply.text.contains("\"enter_combat\": true"));
        assert!(reply.text.contains("bandits_1"));
    }
}
