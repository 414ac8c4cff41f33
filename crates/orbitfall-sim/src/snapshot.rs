//! Serializable world snapshots with BLAKE3 hashing.
//!
//! A [`WorldSnapshot`] captures everything that influences future ticks
//! except the RNG stream and the registered tasks: clock, phase, counters,
//! timers, control state and every object in id order. Its `hash` is the
//! BLAKE3 hex digest of the canonical JSON of those fields, which makes it a
//! cheap way to compare two runs tick for tick.
//!
//! ```
//! use orbitfall_sim::prelude::*;
//!
//! let mut a = Simulation::new(Ruleset::default(), [5; 16]).unwrap();
//! let mut b = Simulation::new(Ruleset::default(), [5; 16]).unwrap();
//! for sim in [&mut a, &mut b] {
//!     sim.apply_event(&ControlEvent::digital(Control::Start, true, 0)).unwrap();
//!     sim.run_ticks(20);
//! }
//!
//! let snapshot = a.capture_snapshot();
//! assert_eq!(snapshot.tick, 20);
//! assert_eq!(snapshot.hash.len(), 64);
//! assert_eq!(snapshot.hash, b.state_hash());
//! ```

use serde::{Deserialize, Serialize};

use crate::input::ControlState;
use crate::physics::{Body, Dynamics};
use crate::simulation::Simulation;
use crate::world::{EntityKind, GamePhase, GameStats, ObjectState, Timers};
use crate::ObjectId;

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub id: ObjectId,
    pub kind: EntityKind,
    pub state: ObjectState,
    pub body: Body,
    pub dynamics: Option<Dynamics>,
    pub lifetime_ms: Option<i64>,
}

/// A serializable view of one simulation at a tick boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Ticks executed at the time of capture.
    pub tick: u64,
    pub now_ms: u64,
    pub phase: GamePhase,
    pub lives: u32,
    pub stats: GameStats,
    pub timers: Timers,
    pub controls: ControlState,
    pub objects: Vec<ObjectSnapshot>,
    /// BLAKE3 hex digest (64 lowercase hex chars) of the fields above.
    pub hash: String,
}

impl WorldSnapshot {
    /// Recompute the digest and compare it with the stored one.
    pub fn verify_hash(&self) -> bool {
        compute_hash(&self.hashable()) == self.hash
    }

    fn hashable(&self) -> HashableState<'_> {
        HashableState {
            tick: self.tick,
            now_ms: self.now_ms,
            phase: self.phase,
            lives: self.lives,
            stats: &self.stats,
            timers: &self.timers,
            controls: &self.controls,
            objects: &self.objects,
        }
    }
}

// ---------------------------------------------------------------------------
// Hashing helpers
// ---------------------------------------------------------------------------

/// Field-for-field mirror of [`WorldSnapshot`] without the hash.
#[derive(Serialize)]
struct HashableState<'a> {
    tick: u64,
    now_ms: u64,
    phase: GamePhase,
    lives: u32,
    stats: &'a GameStats,
    timers: &'a Timers,
    controls: &'a ControlState,
    objects: &'a [ObjectSnapshot],
}

fn compute_hash(state: &HashableState<'_>) -> String {
    let json_bytes =
        serde_json::to_vec(state).expect("snapshot state should always be JSON-serializable");
    blake3::hash(&json_bytes).to_hex().to_string()
}

// ---------------------------------------------------------------------------
// Simulation snapshot methods
// ---------------------------------------------------------------------------

impl Simulation {
    /// Capture the current state and its hash.
    pub fn capture_snapshot(&self) -> WorldSnapshot {
        let world = self.world();
        let objects = world
            .objects()
            .map(|o| ObjectSnapshot {
                id: o.id,
                kind: o.kind,
                state: o.state,
                body: o.body,
                dynamics: o.dynamics,
                lifetime_ms: o.lifetime_ms,
            })
            .collect();

        let mut snapshot = WorldSnapshot {
            tick: self.tick_count(),
            now_ms: self.now_ms(),
            phase: world.phase(),
            lives: world.lives(),
            stats: world.stats().clone(),
            timers: world.timers().clone(),
            controls: world.controls().clone(),
            objects,
            hash: String::new(),
        };
        snapshot.hash = compute_hash(&snapshot.hashable());
        snapshot
    }

    /// BLAKE3 hex digest of the current state.
    pub fn state_hash(&self) -> String {
        self.capture_snapshot().hash
    }
}
