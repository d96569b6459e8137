//! Thin wrapper around the rapier physics sets: stepping, event capture,
//! and the shape/point queries the trial layer needs.

use crate::events::{ContactInfo, ContactPoint};
use crate::noise::ContactNoise;
use rapier2d::na::{Isometry2, Point2, Vector2};
use rapier2d::parry::bounding_volume::{Aabb, BoundingVolume};
use rapier2d::parry::query::{self, Contact};
use rapier2d::prelude::*;
use std::sync::Mutex;

/// What a collider represents, for event routing and placement checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColliderRole {
    Solid,
    Goal,
    Blocker,
}

pub(crate) fn pack_user_data(index: usize, role: ColliderRole) -> u128 {
    let r = match role {
        ColliderRole::Solid => 0u128,
        ColliderRole::Goal => 1,
        ColliderRole::Blocker => 2,
    };
    (r << 64) | index as u128
}

pub(crate) fn unpack_user_data(data: u128) -> (usize, ColliderRole) {
    let role = match data >> 64 {
        1 => ColliderRole::Goal,
        2 => ColliderRole::Blocker,
        _ => ColliderRole::Solid,
    };
    (data as u64 as usize, role)
}

/// A begin or end picked up by the event collector during one sub-step.
#[derive(Debug, Clone)]
pub(crate) struct SpaceEvent {
    pub a: ColliderHandle,
    pub b: ColliderHandle,
    pub started: bool,
    pub sensor: bool,
    pub info: Option<ContactInfo>,
}

#[derive(Default)]
struct EventCollector {
    events: Mutex<Vec<SpaceEvent>>,
}

impl EventHandler for EventCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        colliders: &ColliderSet,
        event: CollisionEvent,
        pair: Option<&ContactPair>,
    ) {
        let (a, b, started, flags) = match event {
            CollisionEvent::Started(a, b, flags) => (a, b, true, flags),
            CollisionEvent::Stopped(a, b, flags) => (a, b, false, flags),
        };
        let sensor = flags.contains(CollisionEventFlags::SENSOR);
        let info = if started && !sensor {
            pair.and_then(|p| contact_info(colliders, a, b, p))
        } else {
            None
        };
        if let Ok(mut events) = self.events.lock() {
            events.push(SpaceEvent { a, b, started, sensor, info });
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

fn contact_info(
    colliders: &ColliderSet,
    a: ColliderHandle,
    b: ColliderHandle,
    pair: &ContactPair,
) -> Option<ContactInfo> {
    let ca = colliders.get(a)?;
    let cb = colliders.get(b)?;
    let manifold = pair.manifolds.first()?;
    let points = manifold
        .points
        .iter()
        .map(|pt| {
            let wa = ca.position() * pt.local_p1;
            let wb = cb.position() * pt.local_p2;
            ContactPoint { a: [wa.x, wa.y], b: [wb.x, wb.y], dist: pt.dist }
        })
        .collect();
    let n = manifold.data.normal;
    Some(ContactInfo {
        normal: [n.x, n.y],
        restitution: ca.restitution() * cb.restitution(),
        points,
    })
}

/// Owns every rapier set for one world instance.
pub(crate) struct Space {
    pub gravity: Vector2<f32>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    query_pipeline: QueryPipeline,
    events: EventCollector,
    /// When set, contact restitution and normals are jittered per solver
    /// contact through the physics hooks.
    pub contact_noise: Option<ContactNoise>,
}

impl Space {
    pub fn new(gravity: f32) -> Space {
        Space {
            gravity: Vector2::new(0.0, -gravity),
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            events: EventCollector::default(),
            contact_noise: None,
        }
    }

    /// Advances the simulation by one sub-step of `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.params.dt = dt;
        let hooks: &dyn PhysicsHooks = match &self.contact_noise {
            Some(noise) => noise,
            None => &(),
        };
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            hooks,
            &self.events,
        );
    }

    pub fn drain_events(&mut self) -> Vec<SpaceEvent> {
        match self.events.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(_) => Vec::new(),
        }
    }

    /// Rebuilds query acceleration structures after bodies were added or
    /// moved outside of a step.
    pub fn refresh_queries(&mut self) {
        self.bodies.propagate_modified_body_positions_to_colliders(&mut self.colliders);
        self.query_pipeline.update(&self.colliders);
    }

    /// All colliders (sensors included) overlapping the given shape.
    pub fn overlaps_shape(&self, shape: &dyn Shape, pos: &Isometry2<f32>) -> Vec<ColliderHandle> {
        let mut hits = Vec::new();
        self.query_pipeline.intersections_with_shape(
            &self.bodies,
            &self.colliders,
            pos,
            shape,
            QueryFilter::default(),
            |h| {
                hits.push(h);
                true
            },
        );
        hits
    }

    /// Closest-features contact between two colliders, within `prediction`.
    pub fn contact_between(
        &self,
        a: ColliderHandle,
        b: ColliderHandle,
        prediction: f32,
    ) -> Option<Contact> {
        let ca = self.colliders.get(a)?;
        let cb = self.colliders.get(b)?;
        query::contact(ca.position(), ca.shape(), cb.position(), cb.shape(), prediction)
            .ok()
            .flatten()
    }

    pub fn point_in_collider(&self, h: ColliderHandle, p: &Point2<f32>) -> bool {
        self.colliders
            .get(h)
            .map(|c| c.shape().contains_point(c.position(), p))
            .unwrap_or(false)
    }

    pub fn collider_aabb(&self, h: ColliderHandle) -> Option<Aabb> {
        self.colliders.get(h).map(|c| c.compute_aabb())
    }

    pub fn merged_aabb(&self, handles: &[ColliderHandle]) -> Option<Aabb> {
        let mut out: Option<Aabb> = None;
        for &h in handles {
            if let Some(a) = self.collider_aabb(h) {
                out = Some(match out {
                    Some(b) => b.merged(&a),
                    None => a,
                });
            }
        }
        out
    }

    pub fn distance_to_point(&self, h: ColliderHandle, p: &Point2<f32>) -> Option<f32> {
        let c = self.colliders.get(h)?;
        Some(c.shape().distance_to_point(c.position(), p, true))
    }
}
