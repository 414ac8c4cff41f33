//! Per-run simulation state.
//!
//! [`World`] is the context object every tick task receives. It owns the
//! objects, the seeded RNG, the control state and the running stats for one
//! run, and it is the only place objects are created or destroyed:
//! [`World::spawn`] queues registration of the object's tasks and
//! [`World::destroy`] queues their removal, so a destroyed object can never be
//! ticked again.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::input::ControlState;
use crate::physics::{Body, Dynamics};
use crate::ruleset::Ruleset;
use crate::tick::{Priority, QueueRequest, TickContext, TickFn};
use crate::ObjectId;

// ---------------------------------------------------------------------------
// Object model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsteroidSize {
    Large,
    Medium,
    Small,
}

impl AsteroidSize {
    /// The size an asteroid of this size breaks into, if any.
    pub fn fragment(self) -> Option<AsteroidSize> {
        match self {
            AsteroidSize::Large => Some(AsteroidSize::Medium),
            AsteroidSize::Medium => Some(AsteroidSize::Small),
            AsteroidSize::Small => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UfoSize {
    Large,
    Small,
}

/// Who fired a bullet. Decides scoring and what the bullet can hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BulletSource {
    Ship,
    Ufo,
}

/// The closed set of object variants the rules know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Ship,
    Asteroid(AsteroidSize),
    Ufo(UfoSize),
    Bullet(BulletSource),
}

/// Kind-specific state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ObjectState {
    Active,
    /// Freshly respawned ship; collisions are ignored until the timer runs out.
    Invulnerable { remaining_ms: i64 },
    /// UFO countdowns to its next shot and next course change.
    Hunting { fire_in_ms: i64, turn_in_ms: i64 },
}

/// A simulated object: a body, an optional steering capability and the
/// bookkeeping needed to tear it down.
#[derive(Debug, Clone)]
pub struct GameObject {
    pub id: ObjectId,
    pub kind: EntityKind,
    pub state: ObjectState,
    pub body: Body,
    pub dynamics: Option<Dynamics>,
    /// Remaining lifetime; the object is destroyed when it reaches zero.
    pub lifetime_ms: Option<i64>,
    tasks: Vec<&'static str>,
}

impl GameObject {
    /// Task names registered for this object.
    pub fn tasks(&self) -> &[&'static str] {
        &self.tasks
    }

    pub fn is_vulnerable(&self) -> bool {
        !matches!(self.state, ObjectState::Invulnerable { .. })
    }
}

/// Everything needed to create an object, minus its id.
#[derive(Clone)]
pub struct Spawn {
    pub kind: EntityKind,
    pub state: ObjectState,
    pub body: Body,
    pub dynamics: Option<Dynamics>,
    pub lifetime_ms: Option<i64>,
    pub tasks: Vec<(Priority, &'static str, TickFn<World>)>,
}

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Waiting for the start control.
    Ready,
    Playing,
    GameOver,
}

/// Outcome counters for one run. These are what a submission claims and what
/// a replay must reproduce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    pub score: u64,
    pub level: u32,
    /// Simulated time from start to game over (or to now, while playing).
    pub duration_ms: u64,
    pub shots_fired: u32,
    pub shots_hit: u32,
    pub asteroids_destroyed: u32,
    pub large_ufos_destroyed: u32,
    pub small_ufos_destroyed: u32,
}

impl GameStats {
    /// Fraction of ship bullets that hit something, 0 when none were fired.
    pub fn accuracy(&self) -> f64 {
        if self.shots_fired == 0 {
            0.0
        } else {
            f64::from(self.shots_hit) / f64::from(self.shots_fired)
        }
    }

    pub fn ufos_destroyed(&self) -> u32 {
        self.large_ufos_destroyed + self.small_ufos_destroyed
    }
}

/// Countdown timers owned by the rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timers {
    pub respawn_ms: Option<i64>,
    pub next_level_ms: Option<i64>,
    pub ufo_spawn_ms: i64,
    pub fire_cooldown_ms: i64,
    pub hyperspace_cooldown_ms: i64,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The context for one simulation run.
pub struct World {
    pub(crate) rules: Ruleset,
    rng: Pcg32,
    objects: BTreeMap<ObjectId, GameObject>,
    next_id: u64,
    pub(crate) controls: ControlState,
    pub(crate) phase: GamePhase,
    pub(crate) stats: GameStats,
    pub(crate) lives: u32,
    pub(crate) next_extra_life: u64,
    pub(crate) ship: Option<ObjectId>,
    pub(crate) timers: Timers,
    pub(crate) started_at_ms: u64,
    requests: Vec<QueueRequest<World>>,
}

impl World {
    /// Create an empty world in the [`GamePhase::Ready`] phase.
    ///
    /// The ruleset is assumed valid; [`Simulation::new`](crate::simulation::Simulation::new)
    /// validates before building a world.
    pub fn new(rules: Ruleset, seed: [u8; 16]) -> Self {
        let lives = rules.lives.starting;
        Self {
            rules,
            rng: Pcg32::from_seed(seed),
            objects: BTreeMap::new(),
            next_id: 1,
            controls: ControlState::default(),
            phase: GamePhase::Ready,
            stats: GameStats::default(),
            lives,
            next_extra_life: 0,
            ship: None,
            timers: Timers::default(),
            started_at_ms: 0,
            requests: Vec::new(),
        }
    }

    // -- lifecycle ----------------------------------------------------------

    /// Insert an object and queue registration of its tasks.
    pub fn spawn(&mut self, spawn: Spawn) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;

        let mut tasks = Vec::with_capacity(spawn.tasks.len());
        for (priority, task, func) in spawn.tasks {
            self.requests.push(QueueRequest::Add {
                priority,
                task,
                func,
                owner: Some(id),
            });
            tasks.push(task);
        }

        tracing::trace!(?id, kind = ?spawn.kind, "spawn");
        self.objects.insert(
            id,
            GameObject {
                id,
                kind: spawn.kind,
                state: spawn.state,
                body: spawn.body,
                dynamics: spawn.dynamics,
                lifetime_ms: spawn.lifetime_ms,
                tasks,
            },
        );
        id
    }

    /// Remove an object and queue removal of every task it registered.
    /// Returns `None` if the object was already gone.
    pub fn destroy(&mut self, id: ObjectId) -> Option<GameObject> {
        let object = self.objects.remove(&id)?;
        for &task in &object.tasks {
            self.requests.push(QueueRequest::Remove {
                task,
                owner: Some(id),
            });
        }
        if self.ship == Some(id) {
            self.ship = None;
        }
        tracing::trace!(?id, kind = ?object.kind, "destroy");
        Some(object)
    }

    /// Destroy every object.
    pub fn destroy_all(&mut self) {
        let ids: Vec<ObjectId> = self.objects.keys().copied().collect();
        for id in ids {
            self.destroy(id);
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn object(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    /// Objects in id (creation) order.
    pub fn objects(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.values()
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn count_where(&self, pred: impl Fn(EntityKind) -> bool) -> usize {
        self.objects.values().filter(|o| pred(o.kind)).count()
    }

    pub fn ship(&self) -> Option<&GameObject> {
        self.ship.and_then(|id| self.objects.get(&id))
    }

    pub fn rules(&self) -> &Ruleset {
        &self.rules
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn stats(&self) -> &GameStats {
        &self.stats
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn controls(&self) -> &ControlState {
        &self.controls
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    // -- randomness ---------------------------------------------------------

    /// Uniform float in `[low, high)`; returns `low` for an empty range.
    pub(crate) fn random_range(&mut self, low: f64, high: f64) -> f64 {
        if high > low {
            self.rng.gen_range(low..high)
        } else {
            low
        }
    }

    /// Uniform integer in `[low, high]`.
    pub(crate) fn random_ms(&mut self, low: u32, high: u32) -> i64 {
        i64::from(self.rng.gen_range(low..=high.max(low)))
    }

    pub(crate) fn random_chance(&mut self, probability: f64) -> bool {
        self.rng.gen::<f64>() < probability
    }

    pub(crate) fn random_sign(&mut self) -> f64 {
        if self.rng.gen::<bool>() {
            1.0
        } else {
            -1.0
        }
    }
}

impl TickContext for World {
    fn take_requests(&mut self) -> Vec<QueueRequest<Self>> {
        std::mem::take(&mut self.requests)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
