//! Physics perturbation for noisy re-simulation: jittered gravity, grouped
//! layout shifts, per-object position noise with contact preservation, and
//! per-contact restitution/normal noise through the solver hooks.

use crate::error::Result;
use crate::world::{World, CONTACT_SLOP};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, StandardNormal};
use rapier2d::na::{Point2, UnitComplex, Vector2};
use rapier2d::prelude::{ContactModificationContext, PhysicsHooks};
use std::collections::BTreeSet;
use std::f32::consts::TAU;
use std::sync::Mutex;

const WALL_NAMES: [&str; 4] = ["_LeftWall", "_BottomWall", "_RightWall", "_TopWall"];

const SETTLE_MAX_ATTEMPTS: u32 = 500;
const SETTLE_SUBSTEPS: u32 = 10;
const SETTLE_DT: f32 = 0.1;

/// Standard deviations for each noise source. A zero disables that source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseParams {
    /// Shared shift applied to each group of touching objects.
    pub position_static: f32,
    /// Independent shift applied to each dynamic object.
    pub position_moving: f32,
    /// Rotation of contact normals, radians.
    pub collision_direction: f32,
    /// Additive restitution jitter per solver contact.
    pub collision_elasticity: f32,
    /// Multiplicative gravity jitter around 1.
    pub gravity: f32,
    /// Not currently applied to materials.
    pub object_friction: f32,
    /// Not currently applied to materials.
    pub object_density: f32,
    /// Not currently applied to materials.
    pub object_elasticity: f32,
}

impl Default for NoiseParams {
    fn default() -> Self {
        NoiseParams {
            position_static: 5.0,
            position_moving: 5.0,
            collision_direction: 0.2,
            collision_elasticity: 0.2,
            gravity: 0.1,
            object_friction: 0.1,
            object_density: 0.1,
            object_elasticity: 0.1,
        }
    }
}

/// How the position-noise settle phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionNoiseOutcome {
    /// All perturbed objects reached a configuration with their original
    /// contact relationships intact.
    Settled,
    /// No valid configuration was found; objects were restored to their
    /// original positions.
    FellBackToOriginal,
}

/// Sample from a normal truncated to `[lower, upper]`, by rejection.
pub fn trunc_norm<R: Rng + ?Sized>(
    rng: &mut R,
    mu: f32,
    sigma: f32,
    lower: Option<f32>,
    upper: Option<f32>,
) -> f32 {
    let lo = lower.unwrap_or(f32::NEG_INFINITY);
    let hi = upper.unwrap_or(f32::INFINITY);
    if sigma <= 0.0 {
        return mu.clamp(lo, hi);
    }
    let dist = match Normal::new(mu, sigma) {
        Ok(d) => d,
        Err(_) => return mu.clamp(lo, hi),
    };
    for _ in 0..64 {
        let v = dist.sample(rng);
        if v >= lo && v <= hi {
            return v;
        }
    }
    dist.sample(rng).clamp(lo, hi)
}

/// Sample from a normal and wrap the result into `[0, 2*pi)`.
pub fn wrapped_norm<R: Rng + ?Sized>(rng: &mut R, mu: f32, sigma: f32) -> f32 {
    let z: f32 = StandardNormal.sample(rng);
    (mu + sigma * z).rem_euclid(TAU)
}

/// Solver-level contact jitter, installed on a world's physics hooks.
pub struct ContactNoise {
    direction_sigma: f32,
    elasticity_sigma: f32,
    rng: Mutex<StdRng>,
}

impl ContactNoise {
    pub fn new(direction_sigma: f32, elasticity_sigma: f32, rng: StdRng) -> ContactNoise {
        ContactNoise { direction_sigma, elasticity_sigma, rng: Mutex::new(rng) }
    }
}

impl PhysicsHooks for ContactNoise {
    fn modify_solver_contacts(&self, ctx: &mut ContactModificationContext) {
        let Ok(mut rng) = self.rng.lock() else {
            return;
        };
        if self.elasticity_sigma > 0.0 {
            for c in ctx.solver_contacts.iter_mut() {
                c.restitution +=
                    trunc_norm(&mut *rng, 0.0, self.elasticity_sigma, Some(-c.restitution), None);
            }
        }
        if self.direction_sigma > 0.0 {
            let rot = UnitComplex::new(wrapped_norm(&mut *rng, 0.0, self.direction_sigma));
            *ctx.normal = rot * *ctx.normal;
        }
    }
}

fn shift_object(w: &mut World, idx: usize, delta: Vector2<f32>) {
    let body = w.objects[idx].body;
    if let Some(b) = w.space.bodies.get_mut(body) {
        let t = *b.translation();
        b.set_translation(t + delta, true);
    }
}

fn object_position(w: &World, idx: usize) -> Point2<f32> {
    w.objects[idx].position(&w.space)
}

fn set_object_position(w: &mut World, idx: usize, p: Point2<f32>) {
    let body = w.objects[idx].body;
    if let Some(b) = w.space.bodies.get_mut(body) {
        b.set_translation(Vector2::new(p.x, p.y), true);
    }
}

fn is_wall(name: &str) -> bool {
    WALL_NAMES.contains(&name)
}

/// Indices of objects each non-wall object is currently touching.
fn touch_set(w: &World, idx: usize) -> BTreeSet<usize> {
    (0..w.objects.len())
        .filter(|&j| j != idx && w.objects_touching(idx, j, CONTACT_SLOP))
        .collect()
}

fn group_touching_objects(w: &mut World) -> Vec<Vec<usize>> {
    w.space.refresh_queries();
    let n = w.objects.len();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for i in 0..n.saturating_sub(1) {
        if is_wall(&w.objects[i].name) {
            continue;
        }
        let gi = match groups.iter().position(|g| g.contains(&i)) {
            Some(gi) => gi,
            None => {
                groups.push(vec![i]);
                groups.len() - 1
            }
        };
        for j in (i + 1)..n {
            if w.objects_touching(i, j, CONTACT_SLOP)
                && !groups[gi].contains(&j)
                && !is_wall(&w.objects[j].name)
            {
                groups[gi].push(j);
            }
        }
    }
    groups
}

fn apply_static_noise<R: Rng + ?Sized>(w: &mut World, sigma: f32, rng: &mut R) {
    let normal = StandardNormal;
    for group in group_touching_objects(w) {
        let dx: f32 = normal.sample(rng);
        let dy: f32 = normal.sample(rng);
        let delta = Vector2::new(sigma * dx, sigma * dy);
        for idx in group {
            shift_object(w, idx, delta);
        }
    }
    w.space.refresh_queries();
}

fn apply_moving_noise<R: Rng + ?Sized>(
    w: &mut World,
    sigma: f32,
    rng: &mut R,
) -> PositionNoiseOutcome {
    let normal = StandardNormal;
    w.space.refresh_queries();

    let dynamic: Vec<usize> =
        (0..w.objects.len()).filter(|&i| !w.objects[i].is_static()).collect();
    let orig_pos: Vec<Point2<f32>> = dynamic.iter().map(|&i| object_position(w, i)).collect();
    let orig_vel: Vec<Vector2<f32>> =
        dynamic.iter().map(|&i| w.objects[i].velocity(&w.space)).collect();
    let touches: Vec<BTreeSet<usize>> = dynamic.iter().map(|&i| touch_set(w, i)).collect();
    for &i in &dynamic {
        let body = w.objects[i].body;
        if let Some(b) = w.space.bodies.get_mut(body) {
            b.set_linvel(Vector2::zeros(), true);
        }
    }

    // Objects keep their slot; `free` tracks which still need a valid spot.
    let mut free: Vec<bool> = vec![true; dynamic.len()];
    let mut attempts = 0;
    while free.iter().any(|&f| f) && attempts < SETTLE_MAX_ATTEMPTS {
        attempts += 1;
        for (k, &i) in dynamic.iter().enumerate() {
            if free[k] {
                let dx: f32 = normal.sample(rng);
                let dy: f32 = normal.sample(rng);
                shift_object(w, i, Vector2::new(sigma * dx, sigma * dy));
            }
        }
        // Short zero-gravity relaxation to resolve introduced overlaps.
        // Events still reach the goal condition so contacts standing at
        // the end of the settle phase stay registered.
        for _ in 0..SETTLE_SUBSTEPS {
            w.space.step(SETTLE_DT);
            w.process_space_events();
        }
        w.space.refresh_queries();
        for (k, &i) in dynamic.iter().enumerate() {
            if !free[k] {
                continue;
            }
            if touch_set(w, i) == touches[k] {
                free[k] = false;
                let body = w.objects[i].body;
                if let Some(b) = w.space.bodies.get_mut(body) {
                    b.sleep();
                }
            } else {
                set_object_position(w, i, orig_pos[k]);
            }
        }
    }
    debug!("position noise settled after {attempts} attempts");

    let failed = free.iter().any(|&f| f);
    for (k, &i) in dynamic.iter().enumerate() {
        let body = w.objects[i].body;
        if let Some(b) = w.space.bodies.get_mut(body) {
            b.wake_up(true);
            b.set_linvel(orig_vel[k], true);
        }
        if failed {
            set_object_position(w, i, orig_pos[k]);
        }
    }
    if failed {
        warn!("no contact-preserving configuration found in {SETTLE_MAX_ATTEMPTS} attempts, keeping original positions");
        PositionNoiseOutcome::FellBackToOriginal
    } else {
        PositionNoiseOutcome::Settled
    }
}

/// Builds a perturbed copy of `world`. The copy starts from the world's
/// descriptor, so the clock, velocities, and event log reset.
pub fn noisify_world<R: Rng + ?Sized>(
    world: &World,
    params: &NoiseParams,
    rng: &mut R,
) -> Result<(World, PositionNoiseOutcome)> {
    let mut w = world.copy()?;

    let gravity = if params.gravity > 0.0 {
        world.gravity() * trunc_norm(rng, 1.0, params.gravity, Some(0.0), None)
    } else {
        world.gravity()
    };
    // Layout noise settles without gravity.
    w.set_gravity(0.0);

    if params.position_static > 0.0 {
        apply_static_noise(&mut w, params.position_static, rng);
    }
    let outcome = if params.position_moving > 0.0 {
        apply_moving_noise(&mut w, params.position_moving, rng)
    } else {
        PositionNoiseOutcome::Settled
    };

    if params.collision_direction > 0.0 || params.collision_elasticity > 0.0 {
        w.space.contact_noise = Some(ContactNoise::new(
            params.collision_direction,
            params.collision_elasticity,
            StdRng::seed_from_u64(rng.gen()),
        ));
    }

    w.set_gravity(gravity);
    w.prime();
    Ok((w, outcome))
}
