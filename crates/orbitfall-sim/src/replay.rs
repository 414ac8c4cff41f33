//! Replay logs, recording and the replay driver.
//!
//! A [`ReplayLog`] is the ordered list of control transitions for one
//! session. The client records it with a [`ReplayRecorder`]; a verifier feeds
//! it back through [`replay`] with the same seed and ruleset and compares the
//! outcome with what the client claimed.
//!
//! # Wire form
//!
//! The log travels as one base-64 integer array (see `orbitfall_codec`):
//!
//! ```text
//! [LOG_FORMAT, count, dt_0, code_0, value_0, dt_1, code_1, value_1, ...]
//! ```
//!
//! `dt` is the delta from the previous event's timestamp (the first is
//! relative to 0), `code` is `control_index * 2 + analog_bit`, and `value` is
//! zigzag-encoded so negative analog values stay small.
//!
//! ```
//! use orbitfall_sim::prelude::*;
//!
//! let mut recorder = ReplayRecorder::new();
//! recorder.record(ControlEvent::digital(Control::Start, true, 0)).unwrap();
//! recorder.record(ControlEvent::analog(Control::Turn, -250, 32)).unwrap();
//! let log = recorder.finish();
//!
//! let wire = log.to_wire();
//! assert_eq!(ReplayLog::from_wire(&wire).unwrap(), log);
//! ```

use std::collections::BTreeMap;

use orbitfall_codec::{decode_int_array, encode_int_array};
use serde::{Deserialize, Serialize};

use crate::input::{Control, ControlEvent, InputKind};
use crate::ruleset::Ruleset;
use crate::simulation::Simulation;
use crate::world::{GamePhase, GameStats};
use crate::SimError;

/// Version of the wire layout, written as the first array element.
pub const LOG_FORMAT: u64 = 1;

/// Array elements before the first event.
const HEADER_LEN: usize = 2;

/// Array elements per event.
const EVENT_LEN: usize = 3;

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

/// Control transitions in non-decreasing timestamp order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayLog {
    events: Vec<ControlEvent>,
}

impl ReplayLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Fails if its value is out of range or its timestamp
    /// precedes the last event's.
    pub fn push(&mut self, event: ControlEvent) -> Result<(), SimError> {
        self.check(&event)?;
        self.events.push(event);
        Ok(())
    }

    fn check(&self, event: &ControlEvent) -> Result<(), SimError> {
        event.validate()?;
        if let Some(previous) = self.last_timestamp() {
            if event.timestamp < previous {
                return Err(SimError::OutOfOrderEvent {
                    previous,
                    timestamp: event.timestamp,
                });
            }
        }
        Ok(())
    }

    pub fn events(&self) -> &[ControlEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.events.last().map(|e| e.timestamp)
    }

    /// Encode into the base-64 integer array wire form.
    pub fn to_wire(&self) -> String {
        let mut values = Vec::with_capacity(HEADER_LEN + EVENT_LEN * self.events.len());
        values.push(LOG_FORMAT);
        values.push(self.events.len() as u64);

        let mut previous = 0;
        for event in &self.events {
            values.push(event.timestamp - previous);
            values.push(event_code(event.control, event.kind));
            values.push(zigzag(event.value));
            previous = event.timestamp;
        }
        encode_int_array(&values)
    }

    /// Decode the wire form, re-validating every event.
    pub fn from_wire(text: &str) -> Result<Self, SimError> {
        let values = decode_int_array(text)?;
        let [format, count, body @ ..] = values.as_slice() else {
            return Err(SimError::MalformedLog("missing header".into()));
        };
        if *format != LOG_FORMAT {
            return Err(SimError::MalformedLog(format!(
                "unsupported log format {format}"
            )));
        }
        let expected = usize::try_from(*count)
            .ok()
            .and_then(|count| count.checked_mul(EVENT_LEN));
        if expected != Some(body.len()) {
            return Err(SimError::MalformedLog(format!(
                "header announces {count} events but {} values follow",
                body.len()
            )));
        }

        let mut log = ReplayLog {
            events: Vec::with_capacity(body.len() / EVENT_LEN),
        };
        let mut timestamp: u64 = 0;
        for chunk in body.chunks_exact(EVENT_LEN) {
            let (dt, code, value) = (chunk[0], chunk[1], chunk[2]);
            timestamp = timestamp
                .checked_add(dt)
                .ok_or_else(|| SimError::MalformedLog("timestamp overflow".into()))?;
            let (control, kind) = decode_code(code)?;
            let value = unzigzag(value)
                .ok_or_else(|| SimError::MalformedLog(format!("value {value} out of range")))?;
            log.push(ControlEvent {
                control,
                kind,
                value,
                timestamp,
            })?;
        }
        Ok(log)
    }

    /// Decode the wire form from raw submission bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SimError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| SimError::MalformedLog("log is not ASCII".into()))?;
        Self::from_wire(text)
    }
}

fn event_code(control: Control, kind: InputKind) -> u64 {
    control.index() * 2 + u64::from(kind == InputKind::Analog)
}

fn decode_code(code: u64) -> Result<(Control, InputKind), SimError> {
    let control = Control::from_index(code / 2)
        .ok_or_else(|| SimError::MalformedLog(format!("unknown control code {code}")))?;
    let kind = if code % 2 == 1 {
        InputKind::Analog
    } else {
        InputKind::Digital
    };
    Ok((control, kind))
}

fn zigzag(value: i32) -> u64 {
    u64::from(((value << 1) ^ (value >> 31)) as u32)
}

fn unzigzag(encoded: u64) -> Option<i32> {
    let encoded = u32::try_from(encoded).ok()?;
    Some(((encoded >> 1) as i32) ^ -((encoded & 1) as i32))
}

// ---------------------------------------------------------------------------
// ReplayRecorder
// ---------------------------------------------------------------------------

/// Builds a [`ReplayLog`] from the controls a client applies.
///
/// Only transitions are kept: an event repeating the last recorded value of
/// its control is dropped, so a held key produces one entry, not one per
/// frame.
#[derive(Debug, Default)]
pub struct ReplayRecorder {
    log: ReplayLog,
    last_values: BTreeMap<Control, (InputKind, i32)>,
}

impl ReplayRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event. Returns `Ok(false)` if it was dropped as a repeat.
    ///
    /// The caller should apply the event to its simulation only when this
    /// returns `Ok(true)`, so the simulation sees exactly what a replay will.
    pub fn record(&mut self, event: ControlEvent) -> Result<bool, SimError> {
        self.log.check(&event)?;
        let current = (event.kind, event.value);
        if self.last_values.get(&event.control) == Some(&current) {
            return Ok(false);
        }
        self.last_values.insert(event.control, current);
        self.log.events.push(event);
        Ok(true)
    }

    pub fn log(&self) -> &ReplayLog {
        &self.log
    }

    /// Finish recording and return the log.
    pub fn finish(self) -> ReplayLog {
        self.log
    }
}

// ---------------------------------------------------------------------------
// replay()
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Record a state hash every this many ticks. 0 records none.
    pub checkpoint_interval: u64,
}

/// A state hash taken before the given tick ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub tick: u64,
    pub state_hash: String,
}

/// Result of re-driving a simulation from a seed and log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub stats: GameStats,
    pub phase: GamePhase,
    /// Whether the run reached game over.
    pub completed: bool,
    pub ticks: u64,
    /// Events applied before the run ended. Events after game over are never
    /// applied.
    pub events_applied: usize,
    pub checkpoints: Vec<Checkpoint>,
    /// State hash after the last tick.
    pub final_hash: String,
}

/// Re-run a session from `seed` and `log` under `ruleset`.
///
/// Before each tick every event whose timestamp is at or before that tick's
/// timestamp is applied, in log order. The run ends at game over, when the
/// simulated clock reaches `ruleset.max_duration_ms`, or when the game was
/// never started and no events remain.
///
/// # Errors
///
/// Fails only on invalid input: a ruleset that does not validate or an event
/// with an out-of-range value. A run that never reaches game over is an
/// outcome with `completed == false`, not an error.
pub fn replay(
    ruleset: &Ruleset,
    seed: [u8; 16],
    log: &ReplayLog,
    options: ReplayOptions,
) -> Result<ReplayOutcome, SimError> {
    let mut sim = Simulation::new(ruleset.clone(), seed)?;
    let events = log.events();
    let mut next = 0;
    let mut checkpoints = Vec::new();

    while !sim.is_over() && sim.now_ms() < ruleset.max_duration_ms {
        let now = sim.now_ms();
        while let Some(event) = events.get(next).filter(|e| e.timestamp <= now) {
            sim.apply_event(event)?;
            next += 1;
        }

        if options.checkpoint_interval > 0 && sim.tick_count() % options.checkpoint_interval == 0
        {
            checkpoints.push(Checkpoint {
                tick: sim.tick_count(),
                state_hash: sim.state_hash(),
            });
        }

        sim.tick();

        if sim.phase() == GamePhase::Ready && next == events.len() {
            break;
        }
    }

    let outcome = ReplayOutcome {
        stats: sim.stats().clone(),
        phase: sim.phase(),
        completed: sim.is_over(),
        ticks: sim.tick_count(),
        events_applied: next,
        checkpoints,
        final_hash: sim.state_hash(),
    };
    tracing::debug!(
        ticks = outcome.ticks,
        score = outcome.stats.score,
        completed = outcome.completed,
        "replay finished"
    );
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
