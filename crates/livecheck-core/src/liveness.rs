//! Active liveness detection via blink and head-turn cues.
//!
//! A printed photograph cannot blink and cannot turn its head. The check asks
//! for both: the session is verified once a blink has been seen and the head
//! has been turned to each side, in any order and across any number of
//! frames.
//!
//! The transition is a pure function, [`reduce`], over an explicit
//! [`LivenessState`]. [`LivenessMachine`] wraps it with the session phases
//! `Idle -> Sampling -> Verified`.
//!
//! # Calibration
//!
//! The thresholds below are calibrated against the 68-point landmark model's
//! coordinate conventions. The eye thresholds form a hysteresis band: a
//! closed eye must drop below [`EYE_CLOSED_THRESHOLD`] and reopen above
//! [`EYE_OPEN_THRESHOLD`], so sensor noise around a single cut-off cannot
//! produce a blink.

use std::collections::VecDeque;

use serde::Serialize;
use thiserror::Error;

use crate::signals::FrameSample;

/// EAR below which a frame counts as eyes-closed.
pub const EYE_CLOSED_THRESHOLD: f32 = 0.28;
/// EAR above which closed eyes count as reopened.
pub const EYE_OPEN_THRESHOLD: f32 = 0.33;
/// Smoothed head position below which the right turn latches (mirrored).
pub const TURN_RIGHT_THRESHOLD: f32 = 0.35;
/// Smoothed head position above which the left turn latches (mirrored).
pub const TURN_LEFT_THRESHOLD: f32 = 0.65;
/// Number of recent head positions averaged.
pub const HEAD_WINDOW: usize = 5;
/// Consecutive closed frames must exceed this for a reopening to count.
pub const MIN_CLOSED_FRAMES: u32 = 1;

/// Tunable thresholds for the liveness check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LivenessConfig {
    pub eye_closed_threshold: f32,
    pub eye_open_threshold: f32,
    pub turn_right_threshold: f32,
    pub turn_left_threshold: f32,
    pub head_window: usize,
    pub min_closed_frames: u32,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            eye_closed_threshold: EYE_CLOSED_THRESHOLD,
            eye_open_threshold: EYE_OPEN_THRESHOLD,
            turn_right_threshold: TURN_RIGHT_THRESHOLD,
            turn_left_threshold: TURN_LEFT_THRESHOLD,
            head_window: HEAD_WINDOW,
            min_closed_frames: MIN_CLOSED_FRAMES,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum LivenessConfigError {
    #[error("eye thresholds must satisfy closed ({closed}) < open ({open})")]
    EyeBand { closed: f32, open: f32 },
    #[error("turn thresholds must satisfy right ({right}) < left ({left})")]
    TurnBand { right: f32, left: f32 },
    #[error("head window must hold at least one sample")]
    EmptyWindow,
}

impl LivenessConfig {
    pub fn validate(&self) -> Result<(), LivenessConfigError> {
        if !(self.eye_closed_threshold < self.eye_open_threshold) {
            return Err(LivenessConfigError::EyeBand {
                closed: self.eye_closed_threshold,
                open: self.eye_open_threshold,
            });
        }
        if !(self.turn_right_threshold < self.turn_left_threshold) {
            return Err(LivenessConfigError::TurnBand {
                right: self.turn_right_threshold,
                left: self.turn_left_threshold,
            });
        }
        if self.head_window == 0 {
            return Err(LivenessConfigError::EmptyWindow);
        }
        Ok(())
    }
}

/// Accumulated evidence for one verification attempt.
///
/// `blinked`, `turned_left` and `turned_right` only ever go from false to
/// true. `recent_head_positions` holds at most `head_window` entries, oldest
/// first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LivenessState {
    pub blinked: bool,
    pub turned_left: bool,
    pub turned_right: bool,
    pub closed_frame_count: u32,
    pub recent_head_positions: VecDeque<f32>,
}

impl LivenessState {
    pub fn is_verified(&self) -> bool {
        self.blinked && self.turned_left && self.turned_right
    }

    pub fn progress(&self) -> Progress {
        Progress {
            blinked: self.blinked,
            turned_left: self.turned_left,
            turned_right: self.turned_right,
        }
    }

    /// Mean of the smoothing window, `None` while it is empty.
    pub fn mean_head_position(&self) -> Option<f32> {
        if self.recent_head_positions.is_empty() {
            return None;
        }
        let sum: f32 = self.recent_head_positions.iter().sum();
        Some(sum / self.recent_head_positions.len() as f32)
    }
}

/// The three latched cues, without the bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub blinked: bool,
    pub turned_left: bool,
    pub turned_right: bool,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.blinked && self.turned_left && self.turned_right
    }
}

/// Apply one sample to `state`.
///
/// A sample without a face returns the state untouched: occlusion neither
/// advances nor resets progress.
pub fn reduce(config: &LivenessConfig, mut state: LivenessState, sample: &FrameSample) -> LivenessState {
    if !sample.face_detected {
        return state;
    }

    // Blink: count closed frames, latch on the first qualifying reopening.
    let ear = sample.eye_openness_ratio;
    if ear < config.eye_closed_threshold {
        state.closed_frame_count = state.closed_frame_count.saturating_add(1);
    } else if ear > config.eye_open_threshold
        && state.closed_frame_count > config.min_closed_frames
        && !state.blinked
    {
        state.blinked = true;
        state.closed_frame_count = 0;
    } else {
        state.closed_frame_count = 0;
    }

    // Head turn: smooth over the window, latch each side independently.
    state.recent_head_positions.push_back(sample.head_position_ratio);
    while state.recent_head_positions.len() > config.head_window {
        state.recent_head_positions.pop_front();
    }
    if let Some(mean) = state.mean_head_position() {
        // Mirrored preview: a low ratio is the user's right.
        if mean < config.turn_right_threshold {
            state.turned_right = true;
        }
        if mean > config.turn_left_threshold {
            state.turned_left = true;
        }
    }

    state
}

/// Session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Sampling,
    Verified,
}

/// Outcome of feeding one sample to a [`LivenessMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The machine is not sampling; nothing changed.
    Ignored,
    /// No face in this frame; nothing changed.
    NoFace,
    /// The sample was applied; the check is not complete yet.
    Progress(Progress),
    /// The sample completed the check. Reported exactly once per session.
    Verified(Progress),
}

/// The liveness check for one session.
#[derive(Debug, Clone)]
pub struct LivenessMachine {
    config: LivenessConfig,
    phase: Phase,
    state: LivenessState,
}

impl LivenessMachine {
    pub fn new(config: LivenessConfig) -> Result<Self, LivenessConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            phase: Phase::Idle,
            state: LivenessState::default(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &LivenessState {
        &self.state
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    /// Begin sampling with fresh state. Calling this again starts over.
    pub fn start(&mut self) {
        self.state = LivenessState {
            recent_head_positions: VecDeque::with_capacity(self.config.head_window),
            ..LivenessState::default()
        };
        self.phase = Phase::Sampling;
    }

    pub fn observe(&mut self, sample: &FrameSample) -> Step {
        if self.phase != Phase::Sampling {
            return Step::Ignored;
        }
        if !sample.face_detected {
            return Step::NoFace;
        }

        let state = std::mem::take(&mut self.state);
        self.state = reduce(&self.config, state, sample);

        let progress = self.state.progress();
        tracing::trace!(
            ear = sample.eye_openness_ratio,
            head = sample.head_position_ratio,
            closed_frames = self.state.closed_frame_count,
            ?progress,
            "liveness sample"
        );

        if progress.is_complete() {
            self.phase = Phase::Verified;
            Step::Verified(progress)
        } else {
            Step::Progress(progress)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTER: f32 = 0.5;

    fn eyes(ear: f32) -> FrameSample {
        FrameSample::new(ear, CENTER)
    }

    fn head(pos: f32) -> FrameSample {
        FrameSample::new(0.4, pos)
    }

    fn run(samples: &[FrameSample]) -> LivenessState {
        let config = LivenessConfig::default();
        samples
            .iter()
            .fold(LivenessState::default(), |s, x| reduce(&config, s, x))
    }

    fn sampling() -> LivenessMachine {
        let mut m = LivenessMachine::new(LivenessConfig::default()).unwrap();
        m.start();
        m
    }

    #[test]
    fn test_blink_after_two_closed_frames() {
        let config = LivenessConfig::default();
        let mut state = LivenessState::default();
        let seq = [0.5, 0.20, 0.20, 0.40];
        for (i, ear) in seq.iter().enumerate() {
            state = reduce(&config, state, &eyes(*ear));
            assert_eq!(state.blinked, i == 3, "after sample {i}");
        }
        assert_eq!(state.closed_frame_count, 0);
    }

    #[test]
    fn test_single_frame_dip_is_not_a_blink() {
        let state = run(&[eyes(0.5), eyes(0.20), eyes(0.40)]);
        assert!(!state.blinked);
        assert_eq!(state.closed_frame_count, 0);
    }

    #[test]
    fn test_reopening_inside_band_resets_count() {
        // 0.30 sits between the thresholds: not open enough, not closed.
        let state = run(&[eyes(0.2), eyes(0.2), eyes(0.30), eyes(0.40)]);
        assert!(!state.blinked);
    }

    #[test]
    fn test_exact_threshold_values_are_not_crossings() {
        let state = run(&[
            eyes(EYE_CLOSED_THRESHOLD),
            eyes(EYE_CLOSED_THRESHOLD),
            eyes(0.5),
        ]);
        assert!(!state.blinked);

        let state = run(&[eyes(0.2), eyes(0.2), eyes(EYE_OPEN_THRESHOLD)]);
        assert!(!state.blinked);
    }

    #[test]
    fn test_closed_count_keeps_growing_while_closed() {
        let state = run(&[eyes(0.1), eyes(0.1), eyes(0.1), eyes(0.1)]);
        assert_eq!(state.closed_frame_count, 4);
        assert!(!state.blinked);
    }

    #[test]
    fn test_right_then_left_turn_latches_both() {
        let config = LivenessConfig::default();
        let mut state = LivenessState::default();
        for _ in 0..5 {
            state = reduce(&config, state, &head(0.30));
        }
        assert!(state.turned_right);
        assert!(!state.turned_left);

        for _ in 0..5 {
            state = reduce(&config, state, &head(0.70));
        }
        assert!(state.turned_left);
        assert!(state.turned_right, "right turn must stay latched");
    }

    #[test]
    fn test_turn_uses_window_mean_not_last_sample() {
        // Four centred samples then one extreme: mean (2.0 + 0.0) / 5 = 0.4.
        let state = run(&[head(0.5), head(0.5), head(0.5), head(0.5), head(0.0)]);
        assert!(!state.turned_right);
    }

    #[test]
    fn test_window_is_capped() {
        let state = run(&vec![head(0.5); 40]);
        assert_eq!(state.recent_head_positions.len(), HEAD_WINDOW);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let seq: Vec<_> = (0..7).map(|i| head(0.4 + i as f32 * 0.01)).collect();
        let state = run(&seq);
        let first = *state.recent_head_positions.front().unwrap();
        assert!((first - 0.42).abs() < 1e-6);
    }

    #[test]
    fn test_no_face_leaves_state_untouched() {
        let before = run(&[eyes(0.2), head(0.3)]);
        let after = reduce(&LivenessConfig::default(), before.clone(), &FrameSample::no_face());
        assert_eq!(before, after);
    }

    #[test]
    fn test_machine_ignores_samples_when_idle() {
        let mut m = LivenessMachine::new(LivenessConfig::default()).unwrap();
        assert_eq!(m.observe(&eyes(0.2)), Step::Ignored);
        assert_eq!(m.phase(), Phase::Idle);
    }

    #[test]
    fn test_machine_reports_no_face() {
        let mut m = sampling();
        assert_eq!(m.observe(&FrameSample::no_face()), Step::NoFace);
        assert_eq!(m.state(), &LivenessState::default());
    }

    #[test]
    fn test_machine_end_to_end_verifies_once() {
        let mut m = sampling();
        let mut script = vec![FrameSample::new(0.4, CENTER); 3];
        script.extend([eyes(0.2), eyes(0.2), eyes(0.4)]);
        script.extend(vec![head(0.30); 5]);
        script.extend(vec![head(0.70); 5]);
        script.push(head(0.70));

        let mut verified = 0;
        for s in &script {
            if let Step::Verified(p) = m.observe(s) {
                assert!(p.is_complete());
                verified += 1;
            }
        }
        assert_eq!(verified, 1);
        assert_eq!(m.phase(), Phase::Verified);
        assert_eq!(m.observe(&head(0.70)), Step::Ignored);
    }

    #[test]
    fn test_occlusion_does_not_penalize_progress() {
        let mut m = sampling();
        for s in [eyes(0.2), eyes(0.2), eyes(0.4)] {
            m.observe(&s);
        }
        for _ in 0..20 {
            m.observe(&FrameSample::no_face());
        }
        assert!(m.state().blinked);
    }

    #[test]
    fn test_restart_resets_state() {
        let mut m = sampling();
        for s in [eyes(0.2), eyes(0.2), eyes(0.4)] {
            m.observe(&s);
        }
        m.start();
        assert_eq!(m.state(), &LivenessState::default());
        assert_eq!(m.phase(), Phase::Sampling);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = LivenessConfig {
            eye_closed_threshold: 0.4,
            ..LivenessConfig::default()
        };
        assert!(matches!(
            LivenessMachine::new(config),
            Err(LivenessConfigError::EyeBand { .. })
        ));

        let config = LivenessConfig {
            head_window: 0,
            ..LivenessConfig::default()
        };
        assert_eq!(config.validate(), Err(LivenessConfigError::EmptyWindow));
    }
}
