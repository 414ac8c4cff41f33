//! One simulation run: a [`World`] plus the [`TickQueue`] that drives it.
//!
//! [`Simulation`] owns the fixed-step clock. Tick `n` runs at simulated time
//! `n * tick_ms`, computed from the counter rather than accumulated, so a
//! client session and a verifier replay agree on every timestamp.
//!
//! ```
//! use orbitfall_sim::prelude::*;
//!
//! let mut sim = Simulation::new(Ruleset::default(), [1; 16]).unwrap();
//! sim.apply_event(&ControlEvent::digital(Control::Start, true, 0)).unwrap();
//! sim.run_ticks(3);
//!
//! assert_eq!(sim.phase(), GamePhase::Playing);
//! assert_eq!(sim.now_ms(), 48);
//! assert_eq!(sim.stats().level, 1);
//! ```

use crate::input::ControlEvent;
use crate::rules;
use crate::ruleset::Ruleset;
use crate::tick::{TickContext, TickInfo, TickQueue};
use crate::world::{GamePhase, GameStats, World};
use crate::SimError;

/// A deterministic simulation run.
///
/// Two simulations built from the same ruleset and seed, fed the same control
/// events before the same ticks, stay bit-identical.
pub struct Simulation {
    world: World,
    queue: TickQueue<World>,
    /// Number of ticks executed so far.
    tick_counter: u64,
    tick_ms: u32,
}

impl Simulation {
    /// Validate `rules` and build a run in the [`GamePhase::Ready`] phase,
    /// with the run-wide tasks registered.
    pub fn new(rules: Ruleset, seed: [u8; 16]) -> Result<Self, SimError> {
        rules.validate()?;
        let tick_ms = rules.tick_ms;

        let mut queue = TickQueue::new();
        for (priority, task, func) in rules::global_tasks() {
            queue.add(priority, task, func, None);
        }

        Ok(Self {
            world: World::new(rules, seed),
            queue,
            tick_counter: 0,
            tick_ms,
        })
    }

    /// Apply a control event to the control state. It takes effect on the
    /// next tick.
    pub fn apply_event(&mut self, event: &ControlEvent) -> Result<(), SimError> {
        event.validate()?;
        self.world.controls.apply(event);
        Ok(())
    }

    /// Execute one tick.
    ///
    /// Registrations queued outside a tick (setup code using
    /// [`world_mut`](Self::world_mut)) are applied first.
    pub fn tick(&mut self) {
        let pending = self.world.take_requests();
        self.queue.apply_all(pending);

        let info = TickInfo::new(self.tick_counter, self.tick_ms);
        tracing::trace!(tick = info.tick, timestamp_ms = info.timestamp_ms, "tick");
        self.queue.tick(&mut self.world, &info);
        self.tick_counter += 1;
    }

    /// Run `count` ticks.
    pub fn run_ticks(&mut self, count: u64) {
        for _ in 0..count {
            self.tick();
        }
    }

    // -- accessors ----------------------------------------------------------

    /// The number of ticks executed so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    pub fn tick_ms(&self) -> u32 {
        self.tick_ms
    }

    /// Simulated timestamp of the next tick, in milliseconds. Events stamped
    /// with this value are applied before that tick runs.
    pub fn now_ms(&self) -> u64 {
        self.tick_counter * u64::from(self.tick_ms)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the world.
    ///
    /// Meant for setup and tests. Objects spawned here get their tasks
    /// registered at the start of the next tick.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn queue(&self) -> &TickQueue<World> {
        &self.queue
    }

    pub fn rules(&self) -> &Ruleset {
        &self.world.rules
    }

    pub fn phase(&self) -> GamePhase {
        self.world.phase
    }

    pub fn stats(&self) -> &GameStats {
        &self.world.stats
    }

    pub fn is_over(&self) -> bool {
        self.world.phase == GamePhase::GameOver
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
