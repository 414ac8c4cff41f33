//! Client-side play session.
//!
//! A [`Session`] couples a [`Simulation`] with a [`ReplayRecorder`] and turns
//! variable wall-clock frame deltas into whole fixed ticks. Every control the
//! player changes is stamped with the timestamp of the next tick, recorded,
//! and applied, so replaying the finished log reproduces the session exactly.
//!
//! ```
//! use orbitfall_sim::prelude::*;
//!
//! let mut session = Session::new(Ruleset::default(), [9; 16]).unwrap();
//! session.press(Control::Start, true).unwrap();
//! session.advance(0.1);
//! session.press(Control::Thrust, true).unwrap();
//! session.advance(0.25);
//!
//! let result = session.finish();
//! assert_eq!(result.log.len(), 2);
//! assert_eq!(result.ticks, 21);
//! ```

use serde::{Deserialize, Serialize};

use crate::input::{Control, ControlEvent};
use crate::replay::{ReplayLog, ReplayRecorder};
use crate::ruleset::Ruleset;
use crate::simulation::Simulation;
use crate::world::{GamePhase, GameStats};
use crate::SimError;

/// Longest frame delta honoured by [`Session::advance`], in milliseconds.
/// Longer frames (a suspended tab, a debugger pause) are clipped.
pub const MAX_FRAME_MS: f64 = 250.0;

/// What a finished session hands to the submission step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub log: ReplayLog,
    pub stats: GameStats,
    pub phase: GamePhase,
    pub ticks: u64,
}

pub struct Session {
    sim: Simulation,
    recorder: ReplayRecorder,
    /// Wall-clock milliseconds not yet consumed by a tick.
    accumulator_ms: f64,
}

impl Session {
    pub fn new(rules: Ruleset, seed: [u8; 16]) -> Result<Self, SimError> {
        Ok(Self {
            sim: Simulation::new(rules, seed)?,
            recorder: ReplayRecorder::new(),
            accumulator_ms: 0.0,
        })
    }

    /// Record and apply a control event at the current simulated time.
    ///
    /// The event's own timestamp is replaced. Returns `Ok(false)` when the
    /// event repeats the control's current value and was dropped.
    pub fn control(&mut self, event: ControlEvent) -> Result<bool, SimError> {
        let event = ControlEvent {
            timestamp: self.sim.now_ms(),
            ..event
        };
        if !self.recorder.record(event)? {
            return Ok(false);
        }
        self.sim.apply_event(&event)?;
        Ok(true)
    }

    /// Press or release a digital control.
    pub fn press(&mut self, control: Control, pressed: bool) -> Result<bool, SimError> {
        self.control(ControlEvent::digital(control, pressed, 0))
    }

    /// Set an analog control, in thousandths of full scale.
    pub fn set_analog(&mut self, control: Control, thousandths: i32) -> Result<bool, SimError> {
        self.control(ControlEvent::analog(control, thousandths, 0))
    }

    /// Feed a wall-clock frame delta in seconds and run the whole ticks it
    /// covers. The remainder carries to the next call. Returns the number of
    /// ticks run.
    ///
    /// Nothing runs once the game is over or the ruleset's duration limit is
    /// reached; a verifier would never replay those ticks.
    pub fn advance(&mut self, frame_seconds: f64) -> u64 {
        if !frame_seconds.is_finite() || frame_seconds <= 0.0 {
            return 0;
        }
        self.accumulator_ms += (frame_seconds * 1000.0).min(MAX_FRAME_MS);

        let tick_ms = f64::from(self.sim.tick_ms());
        let limit_ms = self.sim.rules().max_duration_ms;
        let mut ran = 0;
        while self.accumulator_ms >= tick_ms {
            if self.sim.is_over() || self.sim.now_ms() >= limit_ms {
                self.accumulator_ms = 0.0;
                break;
            }
            self.sim.tick();
            self.accumulator_ms -= tick_ms;
            ran += 1;
        }
        ran
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn log(&self) -> &ReplayLog {
        self.recorder.log()
    }

    pub fn is_over(&self) -> bool {
        self.sim.is_over()
    }

    /// End the session.
    pub fn finish(self) -> SessionResult {
        tracing::debug!(
            ticks = self.sim.tick_count(),
            events = self.recorder.log().len(),
            score = self.sim.stats().score,
            "session finished"
        );
        SessionResult {
            stats: self.sim.stats().clone(),
            phase: self.sim.phase(),
            ticks: self.sim.tick_count(),
            log: self.recorder.finish(),
        }
    }
}
