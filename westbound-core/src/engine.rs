//! The turn orchestrator.
//!
//! One player input becomes one fully processed turn: either a combat round
//! (no narrator involved) or a narration turn that runs the directive
//! pipeline and applies its consequences. Every branch appends event
//! records, and no branch can fail — narrator trouble lands on a canned
//! error-reply path, never on the caller.

use crate::combat::{
    apply_combat_action, combat_prompt, finalize_combat, is_combat_active, parse_combat_input,
    start_combat,
};
use crate::content::DEFAULT_PACK_ID;
use crate::dice::{outcome_tier, resolve_check, CheckResult, DiceStream, OutcomeTier, RollMode};
use crate::directive::{parse_narration, Attribute, CheckSpec, Directive};
use crate::events::{EventKind, EventLog, EventRecord};
use crate::state::GameState;
use narrator::{narrate_with_timeout, Narrator, NarratorError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on one narrator call.
pub const DEFAULT_NARRATOR_TIMEOUT: Duration = Duration::from_secs(30);

/// How many recent events ride along in the narrator context.
pub const RECENT_EVENTS_IN_CONTEXT: usize = 8;

const THREAT_LEVEL_MAX: i32 = 9;

/// Everything one processed turn produced.
#[derive(Debug, Clone)]
pub struct TurnResult {
    /// Text shown to the player.
    pub narrative: String,
    /// The sanitized directive that drove this turn.
    pub directive: Directive,
    /// The single check rolled this turn, if the directive asked for one.
    pub check_result: Option<CheckResult>,
    /// Tier of that check.
    pub outcome: Option<OutcomeTier>,
    /// Narrator latency, zero for combat turns and error replies.
    pub latency_ms: u64,
    /// Token count reported by the narrator, when available.
    pub tokens: Option<u32>,
}

/// Drives turns for one session.
pub struct GameEngine {
    narrator: Arc<dyn Narrator>,
    dice: DiceStream,
    narrator_timeout: Duration,
}

impl GameEngine {
    pub fn new(narrator: Arc<dyn Narrator>) -> Self {
        Self {
            narrator,
            dice: DiceStream::from_entropy(),
            narrator_timeout: DEFAULT_NARRATOR_TIMEOUT,
        }
    }

    /// Replace the dice stream (e.g. with a seeded one).
    pub fn with_dice(mut self, dice: DiceStream) -> Self {
        self.dice = dice;
        self
    }

    /// Bound each narrator call to the given duration.
    pub fn with_narrator_timeout(mut self, timeout: Duration) -> Self {
        self.narrator_timeout = timeout;
        self
    }

    pub fn dice_mut(&mut self) -> &mut DiceStream {
        &mut self.dice
    }

    /// Snapshot the session for the narrator: story fields plus a bounded
    /// tail of recent events. The current player input is deliberately NOT
    /// part of the tail — it travels separately, and including it here
    /// would send it twice.
    pub fn build_context(&self, state: &GameState, log: &EventLog) -> String {
        let mut lines = vec![
            format!("session_id: {}", state.session_id),
            format!("mode: {}", state.mode),
            format!("threat: {}/6", state.threat),
            format!("quest: {}", state.story.quest_title),
            format!("goal: {}", state.story.current_goal),
            format!("location: {}", state.story.location),
            format!("turn: {}", state.story.turn),
            format!("progress: {}", state.story.progress),
            format!("threat_level: {}", state.story.threat_level),
            format!("hp: {}/{}", state.player.hp, state.player.max_hp),
            format!("gold: {}", state.player.gold),
            format!("inventory: {}", state.player.inventory.join(", ")),
            "recent_events:".to_string(),
        ];
        for event in log.recent(RECENT_EVENTS_IN_CONTEXT) {
            lines.push(format!("- [{}] {}", event.kind.name(), event.content));
        }
        lines.join("\n")
    }

    /// Process one player input.
    pub async fn run_turn(
        &mut self,
        state: &mut GameState,
        log: &mut EventLog,
        player_input: &str,
        system_prompt: &str,
    ) -> TurnResult {
        if is_combat_active(state) {
            return self.run_combat_turn(state, log, player_input);
        }
        self.run_narration_turn(state, log, player_input, system_prompt).await
    }

    fn run_combat_turn(
        &mut self,
        state: &mut GameState,
        log: &mut EventLog,
        player_input: &str,
    ) -> TurnResult {
        let action = parse_combat_input(player_input);
        apply_combat_action(state, &action, &mut self.dice);
        if !is_combat_active(state) {
            finalize_combat(state, &mut self.dice);
        }
        state.advance_pacing_clock();

        let narrative = combat_prompt(state);
        let directive = self.combat_turn_directive(state);
        log.append(
            EventRecord::new(EventKind::CombatRound, player_input)
                .with_meta(json!({ "action": action })),
        );
        log.append(
            EventRecord::new(EventKind::Narration, narrative.as_str())
                .with_meta(json!({ "directive": directive, "combat": true })),
        );

        TurnResult {
            narrative,
            directive,
            check_result: None,
            outcome: None,
            latency_ms: 0,
            tokens: None,
        }
    }

    /// A benign, already-valid directive describing a combat round.
    fn combat_turn_directive(&self, state: &GameState) -> Directive {
        let enemy_pack_id = state
            .combat
            .as_ref()
            .map(|cs| cs.enemy_pack_id.clone())
            .unwrap_or_default();
        let mut directive = Directive::fallback();
        directive.check = CheckSpec {
            attribute: Attribute::Body,
            dc: 10,
            reason: "combat turn".to_string(),
        };
        directive.enter_combat = is_combat_active(state);
        directive.combat.enemy_pack_id = enemy_pack_id;
        directive.world_tick.notes = "combat_turn".to_string();
        directive.offer_actions = combat_action_menu();
        directive.tone_tags = vec!["combat".to_string(), state.mode.to_string()];
        directive
    }

    async fn run_narration_turn(
        &mut self,
        state: &mut GameState,
        log: &mut EventLog,
        player_input: &str,
        system_prompt: &str,
    ) -> TurnResult {
        state.story.turn += 1;
        let context = self.build_context(state, log);
        let reply = narrate_with_timeout(
            self.narrator.as_ref(),
            system_prompt,
            &context,
            player_input,
            self.narrator_timeout,
        )
        .await;

        // The input is recorded after the call so the narrator never sees
        // it twice; it is never discarded, whatever the narrator did.
        log.append(EventRecord::new(EventKind::Action, player_input));

        let (narrative, mut directive, latency_ms, tokens) = match reply {
            Ok(reply) => {
                let (narrative, directive) = parse_narration(&reply.text);
                (narrative, directive, reply.latency_ms, reply.tokens)
            }
            Err(err) => {
                tracing::warn!(error = %err, "narrator call failed; using canned reply");
                (error_narrative(&err), Directive::fallback(), 0, None)
            }
        };

        let mut check_result = None;
        let mut outcome = None;
        if directive.need_check {
            let score = state.player.stats.get(directive.check.attribute);
            let result = resolve_check(
                &mut self.dice,
                score,
                directive.check.dc,
                0,
                RollMode::Normal,
                false,
            );
            let tier = outcome_tier(result.total, directive.check.dc);
            match tier {
                OutcomeTier::Critical | OutcomeTier::Success => state.story.progress += 1,
                OutcomeTier::Fail | OutcomeTier::Fumble => {
                    state.story.threat_level = (state.story.threat_level + 1).min(THREAT_LEVEL_MAX);
                }
                OutcomeTier::Partial => {}
            }
            check_result = Some(result);
            outcome = Some(tier);
        }

        if directive.grant_clue {
            let title = directive.clue.title.trim();
            if !title.is_empty() {
                state.story.flags.push(format!("clue:{title}"));
            }
        }

        state.story.threat_level =
            (state.story.threat_level + directive.world_tick.threat_delta).clamp(0, THREAT_LEVEL_MAX);

        let mut narrative = narrative;
        if directive.enter_combat {
            let pack_id = {
                let requested = directive.combat.enemy_pack_id.trim();
                if requested.is_empty() {
                    DEFAULT_PACK_ID
                } else {
                    requested
                }
            }
            .to_string();
            start_combat(state, &pack_id, &mut self.dice);
            narrative = format!("{narrative}\n\n{}", combat_prompt(state))
                .trim()
                .to_string();
            directive.offer_actions = combat_action_menu();
        }

        state.advance_pacing_clock();

        log.append(
            EventRecord::new(EventKind::Narration, narrative.as_str()).with_meta(json!({
                "directive": directive,
                "latency_ms": latency_ms,
                "tokens": tokens,
            })),
        );
        if let Some(result) = &check_result {
            log.append(
                EventRecord::new(EventKind::RollResult, "directive_check")
                    .with_meta(json!(result)),
            );
        }

        TurnResult {
            narrative,
            directive,
            check_result,
            outcome,
            latency_ms,
            tokens,
        }
    }
}

fn combat_action_menu() -> Vec<String> {
    ["attack", "skill <skill_id>", "use <item_id>", "defend", "flee"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Canned narrative for a failed narrator call. The turn still completes
/// with the fallback directive.
fn error_narrative(err: &NarratorError) -> String {
    format!(
        "The narrator falls silent for a moment ({err}). \
         The road waits; try your action again."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use narrator::NarratorReply;

    struct FailingNarrator;

    #[async_trait]
    impl Narrator for FailingNarrator {
        async fn narrate(
            &self,
            _system_prompt: &str,
            _context: &str,
            _player_input: &str,
        ) -> Result<NarratorReply, NarratorError> {
            Err(NarratorError::Quota)
        }
    }

    #[tokio::test]
    async fn test_narrator_failure_recovers_with_canned_reply() {
        let mut engine =
            GameEngine::new(Arc::new(FailingNarrator)).with_dice(DiceStream::seeded(1));
        let mut state = GameState::new("sess_err");
        let mut log = EventLog::new("sess_err");

        let result = engine.run_turn(&mut state, &mut log, "look around", "sys").await;
        assert!(result.narrative.contains("narrator falls silent"));
        assert_eq!(result.directive, Directive::fallback());
        assert_eq!(state.story.turn, 1);
        // The player's input was still logged.
        assert!(log
            .events
            .iter()
            .any(|e| e.kind == EventKind::Action && e.content == "look around"));
    }

    #[tokio::test]
    async fn test_context_contains_story_fields() {
        let engine = GameEngine::new(Arc::new(FailingNarrator));
        let state = GameState::new("sess_ctx");
        let mut log = EventLog::new("sess_ctx");
        log.append(EventRecord::new(EventKind::Action, "earlier step"));

        let context = engine.build_context(&state, &log);
        assert!(context.contains("session_id: sess_ctx"));
        assert!(context.contains("hp: 12/12"));
        assert!(context.contains("- [action] earlier step"));
    }
}
