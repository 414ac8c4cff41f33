//! Fixed-order entity integration.
//!
//! Every simulated object carries a [`Body`]. Objects that are steered (the
//! ship) also carry a [`Dynamics`] capability whose [`Dynamics::step`] runs the
//! full integration sequence:
//!
//! 1. Rotation speed: accelerate toward the steer input, capped at
//!    `max_rotation_speed`, or decay toward zero by `rotation_friction`.
//! 2. Linear acceleration along the heading `(sin r, -cos r)`.
//! 3. Per-axis friction, scaled by each axis's share of the speed measured
//!    *before* step 2, then a proportional clamp to `max_speed`.
//! 4. [`Body::update`]: position and rotation integration plus wrapping.
//!
//! The order and the operation order inside each step are part of the replay
//! contract. Changing either changes trajectories, so it lives here and
//! nowhere else.
//!
//! # Determinism
//!
//! Only `elapsed`, the tunables and the control inputs feed the step. Speeds
//! use `sqrt` (correctly rounded under IEEE 754); the heading uses `sin`/`cos`,
//! which are reproducible on a given platform and toolchain.

use std::f64::consts::TAU;
use std::ops::{Add, AddAssign, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::SimError;

// ---------------------------------------------------------------------------
// Vec2
// ---------------------------------------------------------------------------

/// 2D vector in world units (pixels, pixels per second).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit heading for a rotation in radians. Rotation 0 points up the
    /// screen (negative y) and positive rotation turns clockwise.
    pub fn from_rotation(rotation: f64) -> Self {
        Self::new(rotation.sin(), -rotation.cos())
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance_sq(self, other: Vec2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// The toroidal playfield. Positions wrap on every edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Wrap a position into `[0, width) x [0, height)`.
    pub fn wrap(&self, p: Vec2) -> Vec2 {
        Vec2::new(wrap_into(p.x, self.width), wrap_into(p.y, self.height))
    }
}

/// `rem_euclid` rounds tiny negatives up to `extent` itself; fold that back
/// onto zero so the result stays half-open.
fn wrap_into(value: f64, extent: f64) -> f64 {
    let wrapped = value.rem_euclid(extent);
    if wrapped >= extent {
        0.0
    } else {
        wrapped
    }
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// Kinematic state shared by every object.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Body {
    pub position: Vec2,
    /// Radians in `[0, TAU)`.
    pub rotation: f64,
    pub velocity: Vec2,
    /// Radians per second.
    pub rotation_speed: f64,
    /// Collision radius.
    pub radius: f64,
}

impl Body {
    pub fn at(position: Vec2, radius: f64) -> Self {
        Self {
            position,
            radius,
            ..Self::default()
        }
    }

    /// Integrate position and rotation over `elapsed` seconds and wrap into
    /// `bounds`.
    pub fn update(&mut self, elapsed: f64, bounds: &Bounds) {
        self.position += self.velocity * elapsed;
        self.rotation = wrap_into(self.rotation + self.rotation_speed * elapsed, TAU);
        self.position = bounds.wrap(self.position);
    }

    pub fn heading(&self) -> Vec2 {
        Vec2::from_rotation(self.rotation)
    }

    /// Circle overlap test.
    pub fn overlaps(&self, other: &Body) -> bool {
        let reach = self.radius + other.radius;
        self.position.distance_sq(other.position) < reach * reach
    }
}

// ---------------------------------------------------------------------------
// Dynamics
// ---------------------------------------------------------------------------

/// Tunables for a steered object. All values are semantic inputs, none are
/// derived from each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicsTuning {
    /// Linear acceleration at full throttle, units/s^2.
    pub acceleration: f64,
    /// Rotational acceleration at full steer, rad/s^2.
    pub rotation_acceleration: f64,
    /// Linear speed lost per second while coasting, units/s^2.
    pub friction: f64,
    /// Rotation speed lost per second without steer input, rad/s^2.
    pub rotation_friction: f64,
    pub max_speed: f64,
    pub max_rotation_speed: f64,
}

impl DynamicsTuning {
    /// Reject negative, NaN and infinite tunables.
    pub fn validate(&self) -> Result<(), SimError> {
        let fields = [
            ("acceleration", self.acceleration),
            ("rotation_acceleration", self.rotation_acceleration),
            ("friction", self.friction),
            ("rotation_friction", self.rotation_friction),
            ("max_speed", self.max_speed),
            ("max_rotation_speed", self.max_rotation_speed),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }
}

/// Steering capability attached to a [`Body`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dynamics {
    pub tuning: DynamicsTuning,
    /// Thrust input in `0.0..=1.0`.
    pub throttle: f64,
    /// Steer input in `-1.0..=1.0`; positive turns clockwise.
    pub steer: f64,
}

impl Dynamics {
    /// Build a capability with idle inputs. Fails on invalid tunables.
    pub fn new(tuning: DynamicsTuning) -> Result<Self, SimError> {
        tuning.validate()?;
        Ok(Self {
            tuning,
            throttle: 0.0,
            steer: 0.0,
        })
    }

    /// Advance `body` by one tick.
    pub fn step(&self, body: &mut Body, elapsed: f64, bounds: &Bounds) {
        let t = &self.tuning;

        // 1. Rotation speed.
        if self.steer != 0.0 {
            let limit = t.max_rotation_speed;
            body.rotation_speed = (body.rotation_speed
                + self.steer * t.rotation_acceleration * elapsed)
                .clamp(-limit, limit);
        } else {
            body.rotation_speed = toward_zero(body.rotation_speed, t.rotation_friction * elapsed);
        }

        // Friction denominator: speed before this tick's thrust.
        let speed = body.velocity.length();

        // 2. Thrust along the heading.
        if self.throttle != 0.0 {
            let heading = body.heading();
            let dv = t.acceleration * self.throttle * elapsed;
            body.velocity.x += heading.x * dv;
            body.velocity.y += heading.y * dv;
        }

        // 3. Friction, then the speed cap.
        if speed > 0.0 {
            let decay = t.friction * elapsed;
            body.velocity.x = toward_zero(body.velocity.x, decay * body.velocity.x.abs() / speed);
            body.velocity.y = toward_zero(body.velocity.y, decay * body.velocity.y.abs() / speed);
        }
        let capped = body.velocity.length();
        if capped > t.max_speed {
            let scale = t.max_speed / capped;
            body.velocity.x *= scale;
            body.velocity.y *= scale;
        }

        // 4. Base integration.
        body.update(elapsed, bounds);
    }
}

/// Move `value` toward zero by `amount` without crossing it.
fn toward_zero(value: f64, amount: f64) -> f64 {
    if value > 0.0 {
        (value - amount).max(0.0)
    } else if value < 0.0 {
        (value + amount).min(0.0)
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
