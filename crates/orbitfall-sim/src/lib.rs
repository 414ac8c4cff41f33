//! Orbitfall Sim -- deterministic simulation core for the Orbitfall arcade
//! shooter.
//!
//! Everything that decides a score lives here: the priority-ordered
//! [`TickQueue`](tick::TickQueue), the fixed-order entity integration in
//! [`physics`], the game rules, and the replay machinery that lets a verifier
//! re-run a session from its seed and control log.
//!
//! A run owns exactly one [`World`](world::World) and one scheduler. Nothing is
//! process-global, so a client session and any number of verifier replays can
//! coexist.
//!
//! # Quick Start
//!
//! ```
//! use orbitfall_sim::prelude::*;
//!
//! let ruleset = Ruleset { max_duration_ms: 30_000, ..Ruleset::default() };
//! let seed = [7u8; 16];
//!
//! let mut recorder = ReplayRecorder::new();
//! recorder.record(ControlEvent::digital(Control::Start, true, 0)).unwrap();
//! recorder.record(ControlEvent::digital(Control::Fire, true, 160)).unwrap();
//! let log = recorder.finish();
//!
//! let first = replay(&ruleset, seed, &log, ReplayOptions::default()).unwrap();
//! let second = replay(&ruleset, seed, &log, ReplayOptions::default()).unwrap();
//! assert_eq!(first.stats, second.stats);
//! assert_eq!(first.final_hash, second.final_hash);
//! ```

#![deny(unsafe_code)]

pub mod input;
pub mod physics;
pub mod replay;
pub mod rules;
pub mod ruleset;
pub mod session;
pub mod simulation;
pub mod snapshot;
pub mod tick;
pub mod world;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identity of a simulated object within one run.
///
/// Ids are allocated sequentially by the world and never reused, so an id
/// held after its object was destroyed can never alias a newer object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ObjectId(pub u64);

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the simulation core.
///
/// All variants are invalid-input errors in the sense of the submission
/// protocol: a caller handed the core something malformed. They are never
/// swallowed internally.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A physics tunable was negative, NaN, infinite or too large to sample.
    #[error("invalid input: parameter '{name}' is out of range, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    /// A ruleset failed validation for a reason other than a single tunable.
    #[error("invalid input: ruleset {0}")]
    InvalidRuleset(String),

    /// A ruleset document could not be parsed.
    #[error("invalid input: ruleset JSON: {0}")]
    RulesetJson(#[from] serde_json::Error),

    /// A control event was older than the previous event in the log.
    #[error("invalid input: event at {timestamp}ms precedes previous event at {previous}ms")]
    OutOfOrderEvent { previous: u64, timestamp: u64 },

    /// A control event carried a value outside the range for its kind.
    #[error("invalid input: {control:?} {kind:?} value {value} is out of range")]
    InvalidControlValue {
        control: input::Control,
        kind: input::InputKind,
        value: i32,
    },

    /// The wire form of a replay log was structurally invalid.
    #[error("invalid input: malformed replay log: {0}")]
    MalformedLog(String),

    /// A scalar in the wire form of a replay log failed to decode.
    #[error(transparent)]
    Codec(#[from] orbitfall_codec::CodecError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::input::{Control, ControlEvent, ControlState, InputKind};
    pub use crate::physics::{Body, Bounds, Dynamics, DynamicsTuning, Vec2};
    pub use crate::replay::{replay, ReplayLog, ReplayOptions, ReplayOutcome, ReplayRecorder};
    pub use crate::ruleset::Ruleset;
    pub use crate::session::Session;
    pub use crate::simulation::Simulation;
    pub use crate::snapshot::WorldSnapshot;
    pub use crate::tick::{Priority, QueueRequest, Registration, TickContext, TickInfo, TickQueue};
    pub use crate::world::{
        AsteroidSize, BulletSource, EntityKind, GameObject, GamePhase, GameStats, ObjectState,
        UfoSize, World,
    };
    pub use crate::{ObjectId, SimError};
}
