//! Versioned game rules.
//!
//! A [`Ruleset`] pins every constant the simulation reads. Replays are only
//! meaningful against the exact ruleset a log was recorded with, so the
//! `version` string travels with every submission and the verifier keys its
//! rulesets by it.
//!
//! Rulesets are plain JSON documents. Missing sections fall back to the
//! shipped defaults:
//!
//! ```
//! use orbitfall_sim::ruleset::Ruleset;
//!
//! let rules = Ruleset::from_json(r#"{ "version": "1-hard", "lives": { "starting": 1, "extra_life_every": 0 } }"#).unwrap();
//! assert_eq!(rules.version, "1-hard");
//! assert_eq!(rules.lives.starting, 1);
//! assert_eq!(rules.tick_ms, Ruleset::default().tick_ms);
//! ```

use serde::{Deserialize, Serialize};

use crate::physics::{Bounds, DynamicsTuning};
use crate::SimError;

/// Version string of the built-in ruleset.
pub const DEFAULT_RULESET_VERSION: &str = "1.0";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipRules {
    pub dynamics: DynamicsTuning,
    pub radius: f64,
    pub respawn_delay_ms: u32,
    /// Invulnerability granted after a respawn.
    pub invulnerable_ms: u32,
    pub hyperspace_cooldown_ms: u32,
    /// Respawn waits until no asteroid or UFO is closer than this to the
    /// spawn point. Also the exclusion radius for new asteroids.
    pub spawn_clearance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletRules {
    pub speed: f64,
    pub radius: f64,
    pub ship_lifetime_ms: u32,
    pub ufo_lifetime_ms: u32,
    /// Ship bullets alive at once.
    pub max_live: u32,
    pub cooldown_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AsteroidClass {
    pub radius: f64,
    pub min_speed: f64,
    pub max_speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsteroidRules {
    pub initial_count: u32,
    pub per_level: u32,
    pub max_count: u32,
    /// Fragments produced when a large or medium asteroid breaks.
    pub fragments: u32,
    /// Spin magnitude upper bound, rad/s.
    pub max_spin: f64,
    pub large: AsteroidClass,
    pub medium: AsteroidClass,
    pub small: AsteroidClass,
    /// Pause between clearing a level and spawning the next one.
    pub level_delay_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UfoClass {
    pub radius: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UfoRules {
    pub spawn_min_ms: u32,
    pub spawn_max_ms: u32,
    /// A UFO leaves the field after this long.
    pub lifetime_ms: u32,
    pub fire_interval_ms: u32,
    pub turn_interval_ms: u32,
    pub bullet_speed: f64,
    /// Probability of a small UFO on level 1.
    pub small_chance: f64,
    /// Added to `small_chance` per level after the first, capped at 1.
    pub small_chance_per_level: f64,
    /// Half-width of the random cone around a small UFO's aim, radians.
    pub aim_spread: f64,
    pub large: UfoClass,
    pub small: UfoClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub large_asteroid: u64,
    pub medium_asteroid: u64,
    pub small_asteroid: u64,
    pub large_ufo: u64,
    pub small_ufo: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeRules {
    pub starting: u32,
    /// Score step between extra lives. 0 disables extra lives.
    pub extra_life_every: u64,
}

// ---------------------------------------------------------------------------
// Ruleset
// ---------------------------------------------------------------------------

/// Every constant that shapes a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ruleset {
    pub version: String,
    /// Fixed tick length in whole milliseconds.
    pub tick_ms: u32,
    /// Replays that reach this simulated clock without a game over are
    /// abandoned.
    pub max_duration_ms: u64,
    pub world: Bounds,
    pub ship: ShipRules,
    pub bullets: BulletRules,
    pub asteroids: AsteroidRules,
    pub ufos: UfoRules,
    pub scoring: ScoringRules,
    pub lives: LifeRules,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            version: DEFAULT_RULESET_VERSION.to_owned(),
            tick_ms: 16,
            max_duration_ms: 2 * 60 * 60 * 1000,
            world: Bounds {
                width: 800.0,
                height: 600.0,
            },
            ship: ShipRules {
                dynamics: DynamicsTuning {
                    acceleration: 250.0,
                    rotation_acceleration: 24.0,
                    friction: 60.0,
                    rotation_friction: 30.0,
                    max_speed: 320.0,
                    max_rotation_speed: 5.0,
                },
                radius: 12.0,
                respawn_delay_ms: 2000,
                invulnerable_ms: 2500,
                hyperspace_cooldown_ms: 1000,
                spawn_clearance: 120.0,
            },
            bullets: BulletRules {
                speed: 500.0,
                radius: 2.0,
                ship_lifetime_ms: 900,
                ufo_lifetime_ms: 1400,
                max_live: 4,
                cooldown_ms: 200,
            },
            asteroids: AsteroidRules {
                initial_count: 4,
                per_level: 1,
                max_count: 11,
                fragments: 2,
                max_spin: 1.5,
                large: AsteroidClass {
                    radius: 40.0,
                    min_speed: 30.0,
                    max_speed: 60.0,
                },
                medium: AsteroidClass {
                    radius: 20.0,
                    min_speed: 50.0,
                    max_speed: 90.0,
                },
                small: AsteroidClass {
                    radius: 10.0,
                    min_speed: 80.0,
                    max_speed: 130.0,
                },
                level_delay_ms: 2000,
            },
            ufos: UfoRules {
                spawn_min_ms: 15_000,
                spawn_max_ms: 25_000,
                lifetime_ms: 12_000,
                fire_interval_ms: 1200,
                turn_interval_ms: 2000,
                bullet_speed: 300.0,
                small_chance: 0.2,
                small_chance_per_level: 0.1,
                aim_spread: 0.25,
                large: UfoClass {
                    radius: 18.0,
                    speed: 90.0,
                },
                small: UfoClass {
                    radius: 10.0,
                    speed: 120.0,
                },
            },
            scoring: ScoringRules {
                large_asteroid: 20,
                medium_asteroid: 50,
                small_asteroid: 100,
                large_ufo: 200,
                small_ufo: 1000,
            },
            lives: LifeRules {
                starting: 3,
                extra_life_every: 10_000,
            },
        }
    }
}

/// Largest magnitude accepted for a float tunable. Symmetric ranges such as
/// `-max_spin..max_spin` must stay sampleable without overflowing.
pub const MAX_TUNABLE: f64 = f64::MAX / 4.0;

impl Ruleset {
    /// Parse and validate a JSON ruleset document.
    pub fn from_json(text: &str) -> Result<Self, SimError> {
        let ruleset: Ruleset = serde_json::from_str(text)?;
        ruleset.validate()?;
        Ok(ruleset)
    }

    /// Reject rulesets the simulation cannot run deterministically or at all.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.version.is_empty() {
            return Err(SimError::InvalidRuleset("version must not be empty".into()));
        }
        if self.tick_ms == 0 {
            return Err(SimError::InvalidRuleset("tick_ms must be positive".into()));
        }
        if self.lives.starting == 0 {
            return Err(SimError::InvalidRuleset("lives.starting must be positive".into()));
        }
        if self.ufos.spawn_min_ms > self.ufos.spawn_max_ms {
            return Err(SimError::InvalidRuleset(
                "ufos.spawn_min_ms exceeds ufos.spawn_max_ms".into(),
            ));
        }
        if self.asteroids.max_count < self.asteroids.initial_count {
            return Err(SimError::InvalidRuleset(
                "asteroids.max_count is below asteroids.initial_count".into(),
            ));
        }

        self.ship.dynamics.validate()?;

        let mut scalars = vec![
            ("world.width", self.world.width),
            ("world.height", self.world.height),
            ("ship.radius", self.ship.radius),
            ("ship.spawn_clearance", self.ship.spawn_clearance),
            ("bullets.speed", self.bullets.speed),
            ("bullets.radius", self.bullets.radius),
            ("asteroids.max_spin", self.asteroids.max_spin),
            ("ufos.bullet_speed", self.ufos.bullet_speed),
            ("ufos.small_chance", self.ufos.small_chance),
            ("ufos.small_chance_per_level", self.ufos.small_chance_per_level),
            ("ufos.aim_spread", self.ufos.aim_spread),
            ("ufos.large.radius", self.ufos.large.radius),
            ("ufos.large.speed", self.ufos.large.speed),
            ("ufos.small.radius", self.ufos.small.radius),
            ("ufos.small.speed", self.ufos.small.speed),
        ];
        for (name, class) in [
            ("asteroids.large", &self.asteroids.large),
            ("asteroids.medium", &self.asteroids.medium),
            ("asteroids.small", &self.asteroids.small),
        ] {
            if class.min_speed > class.max_speed {
                return Err(SimError::InvalidRuleset(format!(
                    "{name}.min_speed exceeds {name}.max_speed"
                )));
            }
            scalars.push(("asteroids.*.radius", class.radius));
            scalars.push(("asteroids.*.min_speed", class.min_speed));
            scalars.push(("asteroids.*.max_speed", class.max_speed));
        }
        for (name, value) in scalars {
            if !value.is_finite() || !(0.0..=MAX_TUNABLE).contains(&value) {
                return Err(SimError::InvalidParameter { name, value });
            }
        }
        if self.world.width == 0.0 || self.world.height == 0.0 {
            return Err(SimError::InvalidRuleset("world must have a non-zero area".into()));
        }
        Ok(())
    }

    /// Large asteroids spawned at the start of `level` (1-based).
    pub fn asteroids_for_level(&self, level: u32) -> u32 {
        let extra = self.asteroids.per_level.saturating_mul(level.saturating_sub(1));
        self.asteroids
            .initial_count
            .saturating_add(extra)
            .min(self.asteroids.max_count)
    }

    /// Chance that a UFO spawned during `level` is small.
    pub fn small_ufo_chance(&self, level: u32) -> f64 {
        let bonus = self.ufos.small_chance_per_level * f64::from(level.saturating_sub(1));
        (self.ufos.small_chance + bonus).min(1.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
