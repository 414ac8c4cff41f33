//! Game rules, expressed as tick tasks.
//!
//! | priority | task | owner | does |
//! |---|---|---|---|
//! | 0  | `ship-controls` | ship | copy controls into the ship, fire, hyperspace |
//! | 5  | `ufo-pilot`     | UFO  | course changes and shooting |
//! | 10 | `integrate`     | any  | physics step and lifetime |
//! | 20 | `collisions`    | -    | contacts, scoring, splitting, deaths |
//! | 30 | `director`      | -    | start, respawn, levels, UFO spawns |
//!
//! Collisions read positions integrated earlier in the same tick. That
//! dependency is the reason the two run at different priorities.

use std::f64::consts::TAU;

use crate::physics::{Body, Dynamics, Vec2};
use crate::tick::{Priority, TickFn, TickInfo};
use crate::world::{
    AsteroidSize, BulletSource, EntityKind, GamePhase, GameStats, ObjectState, Spawn, UfoSize,
    World,
};
use crate::ObjectId;

pub const PRIORITY_CONTROLS: Priority = 0;
pub const PRIORITY_PILOTS: Priority = 5;
pub const PRIORITY_MOTION: Priority = 10;
pub const PRIORITY_COLLISIONS: Priority = 20;
pub const PRIORITY_DIRECTOR: Priority = 30;

pub const TASK_SHIP_CONTROLS: &str = "ship-controls";
pub const TASK_UFO_PILOT: &str = "ufo-pilot";
pub const TASK_INTEGRATE: &str = "integrate";
pub const TASK_COLLISIONS: &str = "collisions";
pub const TASK_DIRECTOR: &str = "director";

/// Attempts at finding a random asteroid spawn point clear of the ship.
const SPAWN_ATTEMPTS: usize = 16;

fn task(
    priority: Priority,
    name: &'static str,
    func: TickFn<World>,
) -> (Priority, &'static str, TickFn<World>) {
    (priority, name, func)
}

/// Run-wide tasks registered once per simulation.
pub fn global_tasks() -> [(Priority, &'static str, TickFn<World>); 2] {
    [
        task(PRIORITY_COLLISIONS, TASK_COLLISIONS, resolve_collisions),
        task(PRIORITY_DIRECTOR, TASK_DIRECTOR, direct_game),
    ]
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// Spawn the player ship at the center of the field.
pub fn spawn_ship(world: &mut World, invulnerable: bool) -> ObjectId {
    let ship = &world.rules.ship;
    let state = if invulnerable && ship.invulnerable_ms > 0 {
        ObjectState::Invulnerable {
            remaining_ms: i64::from(ship.invulnerable_ms),
        }
    } else {
        ObjectState::Active
    };
    let spawn = Spawn {
        kind: EntityKind::Ship,
        state,
        body: Body::at(world.rules.world.center(), ship.radius),
        dynamics: Some(Dynamics {
            tuning: ship.dynamics,
            throttle: 0.0,
            steer: 0.0,
        }),
        lifetime_ms: None,
        tasks: vec![
            task(PRIORITY_CONTROLS, TASK_SHIP_CONTROLS, ship_controls),
            task(PRIORITY_MOTION, TASK_INTEGRATE, integrate),
        ],
    };
    let id = world.spawn(spawn);
    world.ship = Some(id);
    id
}

/// Spawn an asteroid at `position` with a random heading, speed and spin.
pub fn spawn_asteroid(world: &mut World, size: AsteroidSize, position: Vec2) -> ObjectId {
    let rules = &world.rules.asteroids;
    let class = match size {
        AsteroidSize::Large => rules.large,
        AsteroidSize::Medium => rules.medium,
        AsteroidSize::Small => rules.small,
    };
    let max_spin = rules.max_spin;

    let heading = world.random_range(0.0, TAU);
    let speed = world.random_range(class.min_speed, class.max_speed);
    let rotation = world.random_range(0.0, TAU);
    let spin = world.random_range(-max_spin, max_spin);

    world.spawn(Spawn {
        kind: EntityKind::Asteroid(size),
        state: ObjectState::Active,
        body: Body {
            position,
            rotation,
            velocity: Vec2::from_rotation(heading) * speed,
            rotation_speed: spin,
            radius: class.radius,
        },
        dynamics: None,
        lifetime_ms: None,
        tasks: vec![task(PRIORITY_MOTION, TASK_INTEGRATE, integrate)],
    })
}

/// Spawn a UFO of the given size on the left edge at height `y`, flying in
/// `direction` (+1 right, -1 left).
pub fn spawn_ufo(world: &mut World, size: UfoSize, y: f64, direction: f64) -> ObjectId {
    let ufos = &world.rules.ufos;
    let class = match size {
        UfoSize::Large => ufos.large,
        UfoSize::Small => ufos.small,
    };
    let spawn = Spawn {
        kind: EntityKind::Ufo(size),
        state: ObjectState::Hunting {
            fire_in_ms: i64::from(ufos.fire_interval_ms),
            turn_in_ms: i64::from(ufos.turn_interval_ms),
        },
        body: Body {
            velocity: Vec2::new(direction * class.speed, 0.0),
            ..Body::at(Vec2::new(0.0, y), class.radius)
        },
        dynamics: None,
        lifetime_ms: Some(i64::from(ufos.lifetime_ms)),
        tasks: vec![
            task(PRIORITY_PILOTS, TASK_UFO_PILOT, ufo_pilot),
            task(PRIORITY_MOTION, TASK_INTEGRATE, integrate),
        ],
    };
    world.spawn(spawn)
}

fn spawn_bullet(
    world: &mut World,
    source: BulletSource,
    position: Vec2,
    velocity: Vec2,
    rotation: f64,
) -> ObjectId {
    let bullets = &world.rules.bullets;
    let lifetime = match source {
        BulletSource::Ship => bullets.ship_lifetime_ms,
        BulletSource::Ufo => bullets.ufo_lifetime_ms,
    };
    let spawn = Spawn {
        kind: EntityKind::Bullet(source),
        state: ObjectState::Active,
        body: Body {
            position: world.rules.world.wrap(position),
            rotation,
            velocity,
            rotation_speed: 0.0,
            radius: bullets.radius,
        },
        dynamics: None,
        lifetime_ms: Some(i64::from(lifetime)),
        tasks: vec![task(PRIORITY_MOTION, TASK_INTEGRATE, integrate)],
    };
    world.spawn(spawn)
}

/// Spawn the large asteroids for the current level away from the ship.
fn spawn_level(world: &mut World) {
    let count = world.rules.asteroids_for_level(world.stats.level);
    for _ in 0..count {
        let position = pick_spawn_point(world);
        spawn_asteroid(world, AsteroidSize::Large, position);
    }
    tracing::debug!(level = world.stats.level, count, "level spawned");
}

fn pick_spawn_point(world: &mut World) -> Vec2 {
    let bounds = world.rules.world;
    let clearance = world.rules.ship.spawn_clearance;
    let reference = world
        .ship()
        .map_or_else(|| bounds.center(), |ship| ship.body.position);

    let mut candidate = Vec2::ZERO;
    for _ in 0..SPAWN_ATTEMPTS {
        candidate = Vec2::new(
            world.random_range(0.0, bounds.width),
            world.random_range(0.0, bounds.height),
        );
        if candidate.distance_sq(reference) >= clearance * clearance {
            return candidate;
        }
    }
    // Fall back to the top edge.
    Vec2::new(candidate.x, 0.0)
}

// ---------------------------------------------------------------------------
// Per-object tasks
// ---------------------------------------------------------------------------

/// Copy the control state into the ship and act on fire/hyperspace edges.
fn ship_controls(world: &mut World, info: &TickInfo, owner: Option<ObjectId>) {
    let Some(id) = owner else { return };
    let elapsed_ms = i64::from(info.elapsed_ms);

    let timers = &mut world.timers;
    timers.fire_cooldown_ms = (timers.fire_cooldown_ms - elapsed_ms).max(0);
    timers.hyperspace_cooldown_ms = (timers.hyperspace_cooldown_ms - elapsed_ms).max(0);

    let throttle = world.controls.throttle();
    let steer = world.controls.steer();
    let Some(ship) = world.object_mut(id) else {
        return;
    };
    if let Some(dynamics) = ship.dynamics.as_mut() {
        dynamics.throttle = throttle;
        dynamics.steer = steer;
    }
    if let ObjectState::Invulnerable { remaining_ms } = ship.state {
        let remaining_ms = remaining_ms - elapsed_ms;
        ship.state = if remaining_ms > 0 {
            ObjectState::Invulnerable { remaining_ms }
        } else {
            ObjectState::Active
        };
    }
    let body = ship.body;

    if world.controls.take_fire() {
        fire_from_ship(world, &body);
    }
    if world.controls.take_hyperspace() {
        hyperspace(world, id);
    }
}

fn fire_from_ship(world: &mut World, ship: &Body) {
    if world.timers.fire_cooldown_ms > 0 {
        return;
    }
    let live = world.count_where(|kind| kind == EntityKind::Bullet(BulletSource::Ship));
    if live >= world.rules.bullets.max_live as usize {
        return;
    }

    let heading = ship.heading();
    let position = ship.position + heading * ship.radius;
    let velocity = ship.velocity + heading * world.rules.bullets.speed;
    spawn_bullet(world, BulletSource::Ship, position, velocity, ship.rotation);

    world.timers.fire_cooldown_ms = i64::from(world.rules.bullets.cooldown_ms);
    world.stats.shots_fired += 1;
}

fn hyperspace(world: &mut World, id: ObjectId) {
    if world.timers.hyperspace_cooldown_ms > 0 {
        return;
    }
    let bounds = world.rules.world;
    let destination = Vec2::new(
        world.random_range(0.0, bounds.width),
        world.random_range(0.0, bounds.height),
    );
    if let Some(ship) = world.object_mut(id) {
        ship.body.position = destination;
        ship.body.velocity = Vec2::ZERO;
    }
    world.timers.hyperspace_cooldown_ms = i64::from(world.rules.ship.hyperspace_cooldown_ms);
}

/// Physics step and lifetime countdown for any object.
fn integrate(world: &mut World, info: &TickInfo, owner: Option<ObjectId>) {
    let Some(id) = owner else { return };
    let bounds = world.rules.world;
    let elapsed = info.elapsed();

    let Some(object) = world.object_mut(id) else {
        tracing::warn!(?id, "integrate invoked for a destroyed object");
        return;
    };
    match object.dynamics {
        Some(dynamics) => dynamics.step(&mut object.body, elapsed, &bounds),
        None => object.body.update(elapsed, &bounds),
    }
    let expired = match object.lifetime_ms.as_mut() {
        Some(remaining) => {
            *remaining -= i64::from(info.elapsed_ms);
            *remaining <= 0
        }
        None => false,
    };
    if expired {
        world.destroy(id);
    }
}

/// Course changes and shooting for a UFO.
fn ufo_pilot(world: &mut World, info: &TickInfo, owner: Option<ObjectId>) {
    let Some(id) = owner else { return };
    let elapsed_ms = i64::from(info.elapsed_ms);
    let ufos = &world.rules.ufos;
    let (fire_interval, turn_interval) = (ufos.fire_interval_ms, ufos.turn_interval_ms);
    let (bullet_speed, aim_spread) = (ufos.bullet_speed, ufos.aim_spread);
    let (large, small) = (ufos.large, ufos.small);

    let Some(ufo) = world.object_mut(id) else {
        return;
    };
    let (EntityKind::Ufo(size), ObjectState::Hunting { fire_in_ms, turn_in_ms }) =
        (ufo.kind, ufo.state)
    else {
        return;
    };
    let fire_in_ms = fire_in_ms - elapsed_ms;
    let turn_in_ms = turn_in_ms - elapsed_ms;
    let fire_due = fire_in_ms <= 0;
    let turn_due = turn_in_ms <= 0;
    ufo.state = ObjectState::Hunting {
        fire_in_ms: if fire_due { i64::from(fire_interval) } else { fire_in_ms },
        turn_in_ms: if turn_due { i64::from(turn_interval) } else { turn_in_ms },
    };
    let body = ufo.body;

    if turn_due {
        let class = match size {
            UfoSize::Large => large,
            UfoSize::Small => small,
        };
        // -1, 0 or +1: dive, level out or climb.
        let vertical = world.random_ms(0, 2) as f64 - 1.0;
        let horizontal = if body.velocity.x < 0.0 { -1.0 } else { 1.0 };
        if let Some(ufo) = world.object_mut(id) {
            ufo.body.velocity = Vec2::new(horizontal * class.speed, vertical * class.speed * 0.5);
        }
    }

    if fire_due {
        let target = world.ship().map(|ship| ship.body.position);
        let angle = match (size, target) {
            (UfoSize::Small, Some(target)) => {
                let d = target - body.position;
                d.x.atan2(-d.y) + world.random_range(-aim_spread, aim_spread)
            }
            _ => world.random_range(0.0, TAU),
        };
        let heading = Vec2::from_rotation(angle);
        spawn_bullet(
            world,
            BulletSource::Ufo,
            body.position + heading * body.radius,
            heading * bullet_speed,
            angle,
        );
    }
}

// ---------------------------------------------------------------------------
// Collisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Contact {
    id: ObjectId,
    kind: EntityKind,
    vulnerable: bool,
}

/// Pair ordering: ship, UFOs, asteroids, bullets.
fn rank(kind: EntityKind) -> u8 {
    match kind {
        EntityKind::Ship => 0,
        EntityKind::Ufo(_) => 1,
        EntityKind::Asteroid(_) => 2,
        EntityKind::Bullet(_) => 3,
    }
}

/// Resolve every overlapping pair, in id order.
fn resolve_collisions(world: &mut World, info: &TickInfo, _owner: Option<ObjectId>) {
    if world.phase != GamePhase::Playing {
        return;
    }
    let ids = world.object_ids();
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            // Either side may have been destroyed by an earlier pair.
            let (Some(oa), Some(ob)) = (world.object(a), world.object(b)) else {
                continue;
            };
            if !oa.body.overlaps(&ob.body) {
                continue;
            }
            let first = Contact {
                id: a,
                kind: oa.kind,
                vulnerable: oa.is_vulnerable(),
            };
            let second = Contact {
                id: b,
                kind: ob.kind,
                vulnerable: ob.is_vulnerable(),
            };
            if rank(first.kind) <= rank(second.kind) {
                collide(world, info, first, second);
            } else {
                collide(world, info, second, first);
            }
            if world.phase != GamePhase::Playing {
                return;
            }
        }
    }
}

/// Apply the outcome of a contact. `a` never ranks after `b`.
fn collide(world: &mut World, info: &TickInfo, a: Contact, b: Contact) {
    use BulletSource as Source;
    use EntityKind::*;

    match (a.kind, b.kind) {
        (Ship, Ufo(_)) if a.vulnerable => {
            destroy_ufo(world, b.id, true);
            kill_ship(world, a.id, info);
        }
        (Ship, Asteroid(_)) if a.vulnerable => {
            break_asteroid(world, b.id, true);
            kill_ship(world, a.id, info);
        }
        (Ship, Bullet(Source::Ufo)) if a.vulnerable => {
            world.destroy(b.id);
            kill_ship(world, a.id, info);
        }
        (Ufo(_), Asteroid(_)) => {
            destroy_ufo(world, a.id, false);
            break_asteroid(world, b.id, false);
        }
        (Ufo(_), Bullet(Source::Ship)) => {
            world.destroy(b.id);
            world.stats.shots_hit += 1;
            destroy_ufo(world, a.id, true);
        }
        (Asteroid(_), Bullet(source)) => {
            world.destroy(b.id);
            let credit = source == Source::Ship;
            if credit {
                world.stats.shots_hit += 1;
            }
            break_asteroid(world, a.id, credit);
        }
        // Invulnerable ship, own bullets, and same-kind pairs pass through.
        _ => {}
    }
}

fn break_asteroid(world: &mut World, id: ObjectId, credit: bool) {
    let Some(asteroid) = world.destroy(id) else {
        return;
    };
    let EntityKind::Asteroid(size) = asteroid.kind else {
        return;
    };
    if credit {
        let scoring = &world.rules.scoring;
        let points = match size {
            AsteroidSize::Large => scoring.large_asteroid,
            AsteroidSize::Medium => scoring.medium_asteroid,
            AsteroidSize::Small => scoring.small_asteroid,
        };
        world.stats.asteroids_destroyed += 1;
        award(world, points);
    }
    if let Some(fragment) = size.fragment() {
        for _ in 0..world.rules.asteroids.fragments {
            spawn_asteroid(world, fragment, asteroid.body.position);
        }
    }
}

fn destroy_ufo(world: &mut World, id: ObjectId, credit: bool) {
    let Some(ufo) = world.destroy(id) else {
        return;
    };
    let EntityKind::Ufo(size) = ufo.kind else {
        return;
    };
    if credit {
        let points = match size {
            UfoSize::Large => {
                world.stats.large_ufos_destroyed += 1;
                world.rules.scoring.large_ufo
            }
            UfoSize::Small => {
                world.stats.small_ufos_destroyed += 1;
                world.rules.scoring.small_ufo
            }
        };
        award(world, points);
    }
}

fn kill_ship(world: &mut World, id: ObjectId, info: &TickInfo) {
    if world.destroy(id).is_none() {
        return;
    }
    world.lives = world.lives.saturating_sub(1);
    world.timers.fire_cooldown_ms = 0;
    world.timers.hyperspace_cooldown_ms = 0;

    if world.lives == 0 {
        world.phase = GamePhase::GameOver;
        world.stats.duration_ms = info.timestamp_ms - world.started_at_ms;
        tracing::debug!(
            score = world.stats.score,
            level = world.stats.level,
            at_ms = info.timestamp_ms,
            "game over"
        );
    } else {
        world.timers.respawn_ms = Some(i64::from(world.rules.ship.respawn_delay_ms));
    }
}

/// Add points and grant any extra lives crossed.
fn award(world: &mut World, points: u64) {
    world.stats.score += points;
    let step = world.rules.lives.extra_life_every;
    if step == 0 {
        return;
    }
    while world.stats.score >= world.next_extra_life {
        world.lives += 1;
        world.next_extra_life += step;
    }
}

// ---------------------------------------------------------------------------
// Director
// ---------------------------------------------------------------------------

/// Phase transitions, respawns, level progression and UFO spawns.
fn direct_game(world: &mut World, info: &TickInfo, _owner: Option<ObjectId>) {
    let elapsed_ms = i64::from(info.elapsed_ms);
    match world.phase {
        GamePhase::Ready => {
            if world.controls.take_start() {
                start_game(world, info);
            }
        }
        GamePhase::Playing => {
            world.stats.duration_ms = info.timestamp_ms - world.started_at_ms;
            advance_respawn(world, elapsed_ms);
            advance_level(world, elapsed_ms);
            advance_ufo_spawn(world, elapsed_ms);
        }
        GamePhase::GameOver => {}
    }
    world.controls.end_tick();
}

fn start_game(world: &mut World, info: &TickInfo) {
    world.phase = GamePhase::Playing;
    world.started_at_ms = info.timestamp_ms;
    world.stats = GameStats {
        level: 1,
        ..GameStats::default()
    };
    world.lives = world.rules.lives.starting;
    world.next_extra_life = world.rules.lives.extra_life_every;

    spawn_ship(world, false);
    spawn_level(world);

    let (min, max) = (world.rules.ufos.spawn_min_ms, world.rules.ufos.spawn_max_ms);
    world.timers.ufo_spawn_ms = world.random_ms(min, max);
    tracing::debug!(at_ms = info.timestamp_ms, "game started");
}

fn advance_respawn(world: &mut World, elapsed_ms: i64) {
    let Some(remaining) = world.timers.respawn_ms else {
        return;
    };
    let remaining = remaining - elapsed_ms;
    if remaining > 0 {
        world.timers.respawn_ms = Some(remaining);
        return;
    }
    if !spawn_area_clear(world) {
        world.timers.respawn_ms = Some(0);
        return;
    }
    world.timers.respawn_ms = None;
    spawn_ship(world, true);
}

/// Whether no asteroid or UFO is within the spawn clearance of the center.
fn spawn_area_clear(world: &World) -> bool {
    let center = world.rules.world.center();
    let clearance = world.rules.ship.spawn_clearance;
    world
        .objects()
        .filter(|o| matches!(o.kind, EntityKind::Asteroid(_) | EntityKind::Ufo(_)))
        .all(|o| {
            let reach = clearance + o.body.radius;
            o.body.position.distance_sq(center) >= reach * reach
        })
}

fn advance_level(world: &mut World, elapsed_ms: i64) {
    match world.timers.next_level_ms {
        None => {
            if world.count_where(|k| matches!(k, EntityKind::Asteroid(_))) == 0 {
                world.timers.next_level_ms = Some(i64::from(world.rules.asteroids.level_delay_ms));
            }
        }
        Some(remaining) => {
            let remaining = remaining - elapsed_ms;
            if remaining > 0 {
                world.timers.next_level_ms = Some(remaining);
            } else {
                world.timers.next_level_ms = None;
                world.stats.level += 1;
                spawn_level(world);
            }
        }
    }
}

fn advance_ufo_spawn(world: &mut World, elapsed_ms: i64) {
    // One UFO at a time; the timer waits while one is on the field.
    if world.count_where(|k| matches!(k, EntityKind::Ufo(_))) > 0 {
        return;
    }
    world.timers.ufo_spawn_ms -= elapsed_ms;
    if world.timers.ufo_spawn_ms > 0 {
        return;
    }

    let small = world.random_chance(world.rules.small_ufo_chance(world.stats.level));
    let size = if small { UfoSize::Small } else { UfoSize::Large };
    let height = world.rules.world.height;
    let y = world.random_range(0.0, height);
    let direction = world.random_sign();
    spawn_ufo(world, size, y, direction);

    let (min, max) = (world.rules.ufos.spawn_min_ms, world.rules.ufos.spawn_max_ms);
    world.timers.ufo_spawn_ms = world.random_ms(min, max);
}
