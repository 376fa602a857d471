//! **Turn-taking state machine** — hysteresis counters over VAD probabilities.
//!
//! The engine is a plain value type: it mutates counters and state and returns
//! the transition that fired, if any. Side effects (barge-in, buffer handoff,
//! wire events) belong to the caller, which keeps the machine testable on its
//! own.

use serde::Serialize;
use tracing::debug;

/// Agent state for one call. LISTENING is initial; the only exit is session
/// destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TurnState {
    /// Waiting for the caller to speak.
    Listening,
    /// Caller is actively speaking.
    Receiving,
    /// Waiting on the cognition pipeline.
    Thinking,
    /// Agent audio is being paced out.
    Speaking,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Listening => "LISTENING",
            TurnState::Receiving => "RECEIVING",
            TurnState::Thinking => "THINKING",
            TurnState::Speaking => "SPEAKING",
        }
    }
}

/// A fired transition. `from != to` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: TurnState,
    pub to: TurnState,
}

/// Turn detection thresholds. The contract is time-based; frame counts are
/// derived from the configured frame duration so a different wire cadence
/// keeps the same feel.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Wire frame duration in milliseconds.
    pub frame_ms: u64,
    /// Probability above this counts as speech.
    pub speech_gate: f32,
    /// Sustained speech required to open a turn (default 60 ms ~= 3 frames).
    pub speech_ms: u64,
    /// Sustained silence required to close a turn (default 500 ms ~= 25 frames).
    pub silence_ms: u64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            frame_ms: 20,
            speech_gate: 0.6,
            speech_ms: 60,
            silence_ms: 500,
        }
    }
}

impl TurnConfig {
    fn frames(&self, ms: u64) -> u32 {
        (ms / self.frame_ms.max(1)).max(1) as u32
    }
}

/// The finite state machine over per-frame speech probabilities.
pub struct TurnEngine {
    state: TurnState,
    speech_streak: u32,
    silence_streak: u32,
    speech_gate: f32,
    speech_frames: u32,
    silence_frames: u32,
}

impl TurnEngine {
    pub fn new(config: &TurnConfig) -> Self {
        Self {
            state: TurnState::Listening,
            speech_streak: 0,
            silence_streak: 0,
            speech_gate: config.speech_gate,
            speech_frames: config.frames(config.speech_ms),
            silence_frames: config.frames(config.silence_ms),
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Feed one smoothed probability; returns the transition fired this frame.
    pub fn process_vad_frame(&mut self, probability: f32) -> Option<Transition> {
        let is_speech = probability > self.speech_gate;
        if is_speech {
            self.speech_streak = self.speech_streak.saturating_add(1);
            self.silence_streak = 0;
        } else {
            self.silence_streak = self.silence_streak.saturating_add(1);
            self.speech_streak = 0;
        }

        match self.state {
            // Sustained speech opens a turn from idle, interrupts playback
            // (barge-in), or abandons an in-flight reply.
            TurnState::Listening | TurnState::Speaking | TurnState::Thinking
                if self.speech_streak >= self.speech_frames =>
            {
                Some(self.shift(TurnState::Receiving))
            }
            // Sustained silence closes the utterance.
            TurnState::Receiving if self.silence_streak >= self.silence_frames => {
                Some(self.shift(TurnState::Thinking))
            }
            _ => None,
        }
    }

    /// Dispatcher path: the first reply frame is about to be queued.
    /// Returns `None` when a barge-in already moved the session on.
    pub fn engage_speaking(&mut self) -> Option<Transition> {
        (self.state == TurnState::Thinking).then(|| self.shift(TurnState::Speaking))
    }

    /// Dispatcher path: the reply stream is exhausted and drained.
    pub fn complete_speaking(&mut self) -> Option<Transition> {
        (self.state == TurnState::Speaking).then(|| self.shift(TurnState::Listening))
    }

    /// Dispatcher path: the turn failed; fall back to idle from THINKING or
    /// SPEAKING. No-op in any other state.
    pub fn reset_to_listening(&mut self) -> Option<Transition> {
        matches!(self.state, TurnState::Thinking | TurnState::Speaking)
            .then(|| self.shift(TurnState::Listening))
    }

    fn shift(&mut self, to: TurnState) -> Transition {
        let from = self.state;
        self.state = to;
        debug!(from = from.as_str(), to = to.as_str(), "turn transition");
        Transition { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEECH: f32 = 0.9;
    const SILENCE: f32 = 0.1;

    fn engine() -> TurnEngine {
        TurnEngine::new(&TurnConfig::default())
    }

    #[test]
    fn initial_state_is_listening() {
        assert_eq!(engine().state(), TurnState::Listening);
    }

    #[test]
    fn sustained_speech_opens_exactly_one_turn() {
        let mut e = engine();
        let mut transitions = 0;
        for _ in 0..10 {
            if e.process_vad_frame(SPEECH).is_some() {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);
        assert_eq!(e.state(), TurnState::Receiving);
    }

    #[test]
    fn short_speech_burst_does_not_trigger() {
        let mut e = engine();
        assert!(e.process_vad_frame(SPEECH).is_none());
        assert!(e.process_vad_frame(SPEECH).is_none());
        assert!(e.process_vad_frame(SILENCE).is_none());
        assert!(e.process_vad_frame(SPEECH).is_none());
        assert_eq!(e.state(), TurnState::Listening);
    }

    #[test]
    fn silence_closes_the_utterance_after_threshold() {
        let mut e = engine();
        for _ in 0..3 {
            e.process_vad_frame(SPEECH);
        }
        assert_eq!(e.state(), TurnState::Receiving);
        let mut fired = None;
        for _ in 0..25 {
            if let Some(t) = e.process_vad_frame(SILENCE) {
                fired = Some(t);
            }
        }
        assert_eq!(
            fired,
            Some(Transition {
                from: TurnState::Receiving,
                to: TurnState::Thinking
            })
        );
    }

    #[test]
    fn silence_under_threshold_keeps_receiving() {
        let mut e = engine();
        for _ in 0..3 {
            e.process_vad_frame(SPEECH);
        }
        for _ in 0..24 {
            assert!(e.process_vad_frame(SILENCE).is_none());
        }
        assert_eq!(e.state(), TurnState::Receiving);
        // Speech resumes; the silence streak resets.
        e.process_vad_frame(SPEECH);
        for _ in 0..24 {
            assert!(e.process_vad_frame(SILENCE).is_none());
        }
        assert_eq!(e.state(), TurnState::Receiving);
    }

    #[test]
    fn barge_in_fires_from_speaking() {
        let mut e = engine();
        for _ in 0..3 {
            e.process_vad_frame(SPEECH);
        }
        for _ in 0..25 {
            e.process_vad_frame(SILENCE);
        }
        assert!(e.engage_speaking().is_some());
        assert_eq!(e.state(), TurnState::Speaking);
        let mut fired = None;
        for _ in 0..3 {
            fired = e.process_vad_frame(SPEECH).or(fired);
        }
        assert_eq!(
            fired,
            Some(Transition {
                from: TurnState::Speaking,
                to: TurnState::Receiving
            })
        );
    }

    #[test]
    fn speech_during_thinking_restarts_receiving() {
        let mut e = engine();
        for _ in 0..3 {
            e.process_vad_frame(SPEECH);
        }
        for _ in 0..25 {
            e.process_vad_frame(SILENCE);
        }
        assert_eq!(e.state(), TurnState::Thinking);
        for _ in 0..3 {
            e.process_vad_frame(SPEECH);
        }
        assert_eq!(e.state(), TurnState::Receiving);
    }

    #[test]
    fn all_silence_holds_listening_without_overflow() {
        let mut e = engine();
        for _ in 0..200_000 {
            assert!(e.process_vad_frame(SILENCE).is_none());
        }
        assert_eq!(e.state(), TurnState::Listening);
    }

    #[test]
    fn dispatcher_shifts_guard_against_races() {
        let mut e = engine();
        // Not THINKING: the job lost a race with barge-in, no event may fire.
        assert!(e.engage_speaking().is_none());
        assert!(e.complete_speaking().is_none());
        assert!(e.reset_to_listening().is_none());
    }

    #[test]
    fn thresholds_derive_from_frame_duration() {
        let config = TurnConfig {
            frame_ms: 10,
            ..TurnConfig::default()
        };
        let mut e = TurnEngine::new(&config);
        // 60 ms of speech is now 6 frames.
        for _ in 0..5 {
            assert!(e.process_vad_frame(SPEECH).is_none());
        }
        assert!(e.process_vad_frame(SPEECH).is_some());
    }

    #[test]
    fn state_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&TurnState::Listening).unwrap(),
            "\"LISTENING\""
        );
        assert_eq!(
            serde_json::to_string(&TurnState::Speaking).unwrap(),
            "\"SPEAKING\""
        );
    }
}
