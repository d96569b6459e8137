//! The trial world: object registry, stepping with event capture, win
//! condition bookkeeping, placement checks, and descriptor round-trips.

use crate::condition::GoalCondition;
use crate::error::{Result, WorldError};
use crate::events::{ContactPhase, RawCollisionEvent};
use crate::format::{
    BlockDesc, Color, DefaultsDesc, ObjectDesc, WorldDesc, DEFAULT_COLOR, DEFAULT_GOAL_COLOR,
};
use crate::geom;
use crate::object::{Material, ObjectKind, SceneObject};
use crate::space::{pack_user_data, unpack_user_data, ColliderRole, Space};
use rapier2d::na::{Isometry2, Point2, Vector2};
use rapier2d::prelude::{
    ActiveEvents, ColliderBuilder, ColliderHandle, RigidBodyBuilder, SharedShape,
};
use std::collections::HashMap;

pub const DEFAULT_BASIC_TIMESTEP: f32 = 0.01;

/// Separation tolerance for resting-contact queries.
pub(crate) const CONTACT_SLOP: f32 = 0.1;

/// A region where tools may not be placed. Blockers are sensors in the
/// space so placement queries see them, but they never touch the
/// simulation or the event log.
pub(crate) struct Blocker {
    pub name: String,
    pub vertices: Vec<Point2<f32>>,
    pub color: Color,
}

pub struct World {
    pub dims: [f32; 2],
    pub bts: f32,
    time: f32,
    defaults: DefaultsDesc,
    pub(crate) space: Space,
    pub(crate) objects: Vec<SceneObject>,
    index: HashMap<String, usize>,
    blockers: Vec<Blocker>,
    pub(crate) goal: Option<GoalCondition>,
    collision_log: Vec<RawCollisionEvent>,
}

impl World {
    /// A walled world with default materials and timestep.
    pub fn new(dims: [f32; 2], gravity: f32) -> Result<World> {
        World::new_with(dims, gravity, [true; 4], DEFAULT_BASIC_TIMESTEP, DefaultsDesc::default())
    }

    /// `closed_ends` adds boundary walls in (left, bottom, right, top) order.
    pub fn new_with(
        dims: [f32; 2],
        gravity: f32,
        closed_ends: [bool; 4],
        bts: f32,
        defaults: DefaultsDesc,
    ) -> Result<World> {
        if !(dims[0] > 0.0 && dims[1] > 0.0) {
            return Err(WorldError::BadBounds { width: dims[0], height: dims[1] });
        }
        let mut w = World {
            dims,
            bts,
            time: 0.0,
            defaults,
            space: Space::new(gravity),
            objects: Vec::new(),
            index: HashMap::new(),
            blockers: Vec::new(),
            goal: None,
            collision_log: Vec::new(),
        };
        let (width, height) = (dims[0], dims[1]);
        let wall_color = w.defaults.color;
        if closed_ends[0] {
            w.add_box("_LeftWall", [-1.0, -1.0, 1.0, height + 1.0], wall_color, Some(0.0), None, None)?;
        }
        if closed_ends[1] {
            w.add_box("_BottomWall", [-1.0, -1.0, width + 1.0, 1.0], wall_color, Some(0.0), None, None)?;
        }
        if closed_ends[2] {
            w.add_box("_RightWall", [width - 1.0, -1.0, width + 1.0, height + 1.0], wall_color, Some(0.0), None, None)?;
        }
        if closed_ends[3] {
            w.add_box("_TopWall", [-1.0, height - 1.0, width + 1.0, height + 1.0], wall_color, Some(0.0), None, None)?;
        }
        Ok(w)
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn gravity(&self) -> f32 {
        -self.space.gravity.y
    }

    pub fn set_gravity(&mut self, g: f32) {
        self.space.gravity = Vector2::new(0.0, -g);
    }

    pub fn defaults(&self) -> &DefaultsDesc {
        &self.defaults
    }

    fn claim_name(&mut self, name: &str) -> Result<usize> {
        if self.index.contains_key(name) {
            return Err(WorldError::DuplicateName(name.to_string()));
        }
        Ok(self.objects.len())
    }

    fn register(&mut self, obj: SceneObject) {
        self.index.insert(obj.name.clone(), self.objects.len());
        self.objects.push(obj);
    }

    fn material(
        &self,
        color: Option<Color>,
        density: Option<f32>,
        elasticity: Option<f32>,
        friction: Option<f32>,
    ) -> Material {
        Material {
            color: color.unwrap_or(self.defaults.color),
            density: density.unwrap_or(self.defaults.density),
            elasticity: elasticity.unwrap_or(self.defaults.elasticity),
            friction: friction.unwrap_or(self.defaults.friction),
        }
    }

    ////////////////////////////////////////
    // Adding things to the world
    ////////////////////////////////////////

    pub fn add_poly(
        &mut self,
        name: &str,
        vertices: &[[f32; 2]],
        color: Color,
        density: Option<f32>,
        elasticity: Option<f32>,
        friction: Option<f32>,
    ) -> Result<()> {
        let idx = self.claim_name(name)?;
        let m = self.material(Some(color), density, elasticity, friction);
        let obj = SceneObject::poly(&mut self.space, idx, name, vertices, m)?;
        self.register(obj);
        Ok(())
    }

    /// Axis-aligned box from `[left, bottom, right, top]` bounds.
    pub fn add_box(
        &mut self,
        name: &str,
        bounds: [f32; 4],
        color: Color,
        density: Option<f32>,
        elasticity: Option<f32>,
        friction: Option<f32>,
    ) -> Result<()> {
        let [l, b, r, t] = bounds;
        let vertices = [[l, b], [l, t], [r, t], [r, b]];
        self.add_poly(name, &vertices, color, density, elasticity, friction)
    }

    pub fn add_ball(
        &mut self,
        name: &str,
        position: [f32; 2],
        radius: f32,
        color: Color,
        density: Option<f32>,
        elasticity: Option<f32>,
        friction: Option<f32>,
    ) -> Result<()> {
        let idx = self.claim_name(name)?;
        let m = self.material(Some(color), density, elasticity, friction);
        let obj = SceneObject::ball(&mut self.space, idx, name, position, radius, m)?;
        self.register(obj);
        Ok(())
    }

    pub fn add_segment(
        &mut self,
        name: &str,
        p1: [f32; 2],
        p2: [f32; 2],
        width: f32,
        color: Color,
        density: Option<f32>,
        elasticity: Option<f32>,
        friction: Option<f32>,
    ) -> Result<()> {
        let idx = self.claim_name(name)?;
        let m = self.material(Some(color), density, elasticity, friction);
        let obj = SceneObject::segment(&mut self.space, idx, name, p1, p2, width, m)?;
        self.register(obj);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_container(
        &mut self,
        name: &str,
        points: &[[f32; 2]],
        width: f32,
        inner_color: Option<Color>,
        outer_color: Option<Color>,
        density: Option<f32>,
        elasticity: Option<f32>,
        friction: Option<f32>,
    ) -> Result<()> {
        let idx = self.claim_name(name)?;
        let m = self.material(outer_color, density, elasticity, friction);
        let obj = SceneObject::container(
            &mut self.space,
            idx,
            name,
            points,
            width,
            inner_color,
            outer_color,
            m,
        )?;
        self.register(obj);
        Ok(())
    }

    pub fn add_compound(
        &mut self,
        name: &str,
        polys: &[Vec<[f32; 2]>],
        color: Color,
        density: Option<f32>,
        elasticity: Option<f32>,
        friction: Option<f32>,
    ) -> Result<()> {
        let idx = self.claim_name(name)?;
        let m = self.material(Some(color), density, elasticity, friction);
        let obj = SceneObject::compound(&mut self.space, idx, name, polys, m)?;
        self.register(obj);
        Ok(())
    }

    pub fn add_poly_goal(&mut self, name: &str, vertices: &[[f32; 2]], color: Color) -> Result<()> {
        let idx = self.claim_name(name)?;
        let obj = SceneObject::goal(&mut self.space, idx, name, vertices, color)?;
        self.register(obj);
        Ok(())
    }

    pub fn add_box_goal(&mut self, name: &str, bounds: [f32; 4], color: Color) -> Result<()> {
        let [l, b, r, t] = bounds;
        let vertices = [[l, b], [l, t], [r, t], [r, b]];
        self.add_poly_goal(name, &vertices, color)
    }

    pub fn add_block(&mut self, name: &str, bounds: [f32; 4], color: Color) -> Result<()> {
        let [l, b, r, t] = bounds;
        let vertices = [[l, b], [l, t], [r, t], [r, b]];
        self.add_poly_block(name, &vertices, color)
    }

    pub fn add_poly_block(&mut self, name: &str, vertices: &[[f32; 2]], color: Color) -> Result<()> {
        if self.blockers.iter().any(|b| b.name == name) {
            return Err(WorldError::DuplicateName(name.to_string()));
        }
        let pts: Vec<Point2<f32>> = vertices.iter().map(|p| Point2::new(p[0], p[1])).collect();
        let shape = SharedShape::convex_hull(&pts).ok_or_else(|| WorldError::BadGeometry {
            name: name.to_string(),
            reason: "blocker polygon has no convex hull".to_string(),
        })?;
        let body = self.space.bodies.insert(RigidBodyBuilder::fixed());
        let collider = ColliderBuilder::new(shape)
            .sensor(true)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .user_data(pack_user_data(self.blockers.len(), ColliderRole::Blocker));
        self.space.colliders.insert_with_parent(collider, body, &mut self.space.bodies);
        self.blockers.push(Blocker { name: name.to_string(), vertices: pts, color });
        Ok(())
    }

    ////////////////////////////////////////
    // Object access
    ////////////////////////////////////////

    pub fn object(&self, name: &str) -> Result<&SceneObject> {
        self.index
            .get(name)
            .map(|&i| &self.objects[i])
            .ok_or_else(|| WorldError::UnknownObject(name.to_string()))
    }

    pub fn object_names(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(|o| o.name.as_str())
    }

    pub fn dynamic_objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(|o| !o.is_static())
    }

    fn require_dynamic(&self, name: &str, op: &'static str) -> Result<&SceneObject> {
        let obj = self.object(name)?;
        if obj.is_static() {
            return Err(WorldError::StaticObject { name: name.to_string(), op });
        }
        Ok(obj)
    }

    pub fn position_of(&self, name: &str) -> Result<Point2<f32>> {
        Ok(self.require_dynamic(name, "position")?.position(&self.space))
    }

    pub fn velocity_of(&self, name: &str) -> Result<Vector2<f32>> {
        Ok(self.require_dynamic(name, "velocity")?.velocity(&self.space))
    }

    pub fn rotation_of(&self, name: &str) -> Result<f32> {
        Ok(self.require_dynamic(name, "rotation")?.rotation(&self.space))
    }

    pub fn set_position_of(&mut self, name: &str, p: Point2<f32>) -> Result<()> {
        let body = self.require_dynamic(name, "position")?.body;
        if let Some(b) = self.space.bodies.get_mut(body) {
            b.set_translation(Vector2::new(p.x, p.y), true);
        }
        Ok(())
    }

    pub fn set_velocity_of(&mut self, name: &str, v: Vector2<f32>) -> Result<()> {
        let body = self.require_dynamic(name, "velocity")?.body;
        if let Some(b) = self.space.bodies.get_mut(body) {
            b.set_linvel(v, true);
        }
        Ok(())
    }

    pub fn set_rotation_of(&mut self, name: &str, angle: f32) -> Result<()> {
        let body = self.require_dynamic(name, "rotation")?.body;
        if let Some(b) = self.space.bodies.get_mut(body) {
            b.set_rotation(rapier2d::na::UnitComplex::new(angle), true);
        }
        Ok(())
    }

    /// Mass as computed from the object's colliders; zero for statics.
    pub fn mass_of(&self, name: &str) -> Result<f32> {
        Ok(self.object(name)?.mass(&self.space))
    }

    /// Polygon vertices in the world frame (Poly, Goal, and container paths).
    pub fn vertices_of(&self, name: &str) -> Result<Vec<[f32; 2]>> {
        let obj = self.object(name)?;
        Ok(obj.world_vertices(&self.space).iter().map(|p| [p.x, p.y]).collect())
    }

    /// Member polygons in the world frame (Container walls and Compounds).
    pub fn polys_of(&self, name: &str) -> Result<Vec<Vec<[f32; 2]>>> {
        let obj = self.object(name)?;
        Ok(obj
            .world_polys(&self.space)
            .iter()
            .map(|poly| poly.iter().map(|p| [p.x, p.y]).collect())
            .collect())
    }

    /// Whether a point falls inside the object; containers and goal
    /// regions test their sensor interior.
    pub fn point_in_object(&self, name: &str, point: [f32; 2]) -> Result<bool> {
        let obj = self.object(name)?;
        Ok(obj.point_in(&self.space, &Point2::new(point[0], point[1])))
    }

    /// World-frame bounding box as `[[min_x, min_y], [max_x, max_y]]`.
    pub fn bounds_of(&self, name: &str) -> Result<[[f32; 2]; 2]> {
        let obj = self.object(name)?;
        let handles = obj.contact_shapes();
        let aabb = self.space.merged_aabb(&handles).ok_or_else(|| WorldError::BadGeometry {
            name: name.to_string(),
            reason: "object has no colliders".to_string(),
        })?;
        Ok([[aabb.mins.x, aabb.mins.y], [aabb.maxs.x, aabb.maxs.y]])
    }

    /// Applies an impulse at a world point, which must lie on the object.
    pub fn kick(&mut self, name: &str, impulse: [f32; 2], position: [f32; 2]) -> Result<()> {
        let obj = self.require_dynamic(name, "kick")?;
        let p = Point2::new(position[0], position[1]);
        let on_object = obj.solids.iter().any(|&h| self.space.point_in_collider(h, &p));
        if !on_object {
            return Err(WorldError::KickOutsideObject {
                name: name.to_string(),
                x: p.x,
                y: p.y,
            });
        }
        self.apply_kick(name, impulse, position)
    }

    /// `kick` without the point-on-object check.
    pub fn kick_unsafe(&mut self, name: &str, impulse: [f32; 2], position: [f32; 2]) -> Result<()> {
        self.require_dynamic(name, "kick")?;
        self.apply_kick(name, impulse, position)
    }

    fn apply_kick(&mut self, name: &str, impulse: [f32; 2], position: [f32; 2]) -> Result<()> {
        let body = self.object(name)?.body;
        if let Some(b) = self.space.bodies.get_mut(body) {
            b.apply_impulse_at_point(
                Vector2::new(impulse[0], impulse[1]),
                Point2::new(position[0], position[1]),
                true,
            );
        }
        Ok(())
    }

    ////////////////////////////////////////
    // Stepping
    ////////////////////////////////////////

    /// Advances the world by `t` seconds in sub-steps of `bts`, draining
    /// collision events after each sub-step. Events carry the world clock
    /// as it reads after the full advance.
    pub fn step(&mut self, t: f32) {
        let nsteps = (t / self.bts).floor() as u32;
        let rem = t - nsteps as f32 * self.bts;
        self.time += t;
        for _ in 0..nsteps {
            self.space.step(self.bts);
            self.process_space_events();
        }
        // Sub-1% leftovers are integration dust, not a real sub-step.
        if rem / self.bts > 0.01 {
            self.space.step(rem);
            self.process_space_events();
        }
    }

    fn collider_owner(&self, h: ColliderHandle) -> Option<(usize, ColliderRole)> {
        self.space.colliders.get(h).map(|c| unpack_user_data(c.user_data))
    }

    pub(crate) fn process_space_events(&mut self) {
        let events = self.space.drain_events();
        let now = self.time;
        for ev in events {
            let (Some((ia, ra)), Some((ib, rb))) =
                (self.collider_owner(ev.a), self.collider_owner(ev.b))
            else {
                continue;
            };
            if ra == ColliderRole::Blocker || rb == ColliderRole::Blocker {
                continue;
            }
            if ev.sensor {
                // Route to the goal condition with the sensor side second.
                let (oi, si, sensor_handle) = match (ra, rb) {
                    (ColliderRole::Goal, ColliderRole::Goal) => continue,
                    (ColliderRole::Goal, _) => (ib, ia, ev.a),
                    (_, ColliderRole::Goal) => (ia, ib, ev.b),
                    _ => continue,
                };
                let obj_name = self.objects[oi].name.clone();
                let sensor_name = self.objects[si].name.clone();
                if let Some(goal) = &mut self.goal {
                    if ev.started {
                        goal.on_sensor_begin(&obj_name, &sensor_name, now);
                    } else {
                        let still_inside = {
                            let pos = self.objects[oi].position(&self.space);
                            self.space.point_in_collider(sensor_handle, &pos)
                        };
                        goal.on_sensor_end(&obj_name, &sensor_name, still_inside);
                    }
                }
            } else {
                let (a, b) = (&self.objects[ia], &self.objects[ib]);
                if a.is_static() && b.is_static() {
                    continue;
                }
                let (an, bn) = (a.name.clone(), b.name.clone());
                self.collision_log.push(RawCollisionEvent {
                    a: an.clone(),
                    b: bn.clone(),
                    phase: if ev.started { ContactPhase::Begin } else { ContactPhase::End },
                    t: now,
                    info: ev.info,
                });
                if let Some(goal) = &mut self.goal {
                    if ev.started {
                        goal.on_solid_begin(&an, &bn, now);
                    } else {
                        goal.on_solid_end(&an, &bn);
                    }
                }
            }
        }
    }

    /// One minimal sub-step that refreshes broad-phase state and delivers
    /// the begin notifications for pairs that already start in contact, so
    /// an object sitting in a goal region is registered before the first
    /// real step.
    pub(crate) fn prime(&mut self) {
        self.space.step(1.0e-6);
        self.process_space_events();
        self.space.refresh_queries();
    }

    ////////////////////////////////////////
    // Win condition
    ////////////////////////////////////////

    pub fn attach_condition(&mut self, cond: GoalCondition) -> Result<()> {
        for name in cond.referenced_names() {
            if !self.index.contains_key(name) {
                return Err(WorldError::UnknownObject(name.to_string()));
            }
        }
        self.goal = Some(cond);
        Ok(())
    }

    pub fn attach_any_in_goal(
        &mut self,
        goal: &str,
        duration: f32,
        exclusions: Vec<String>,
    ) -> Result<()> {
        self.attach_condition(GoalCondition::AnyInGoal {
            goal: goal.to_string(),
            exclusions,
            duration,
            entries: Default::default(),
        })
    }

    pub fn attach_specific_in_goal(&mut self, goal: &str, obj: &str, duration: f32) -> Result<()> {
        self.attach_condition(GoalCondition::SpecificInGoal {
            goal: goal.to_string(),
            obj: obj.to_string(),
            duration,
            since: None,
        })
    }

    pub fn attach_many_in_goal(
        &mut self,
        goal: &str,
        objlist: Vec<String>,
        duration: f32,
    ) -> Result<()> {
        self.attach_condition(GoalCondition::ManyInGoal {
            goal: goal.to_string(),
            objlist,
            duration,
            inside: Vec::new(),
            since: None,
        })
    }

    pub fn attach_any_touch(&mut self, obj: &str, duration: f32) -> Result<()> {
        self.attach_condition(GoalCondition::AnyTouch {
            goal: obj.to_string(),
            duration,
            since: None,
        })
    }

    pub fn attach_specific_touch(&mut self, a: &str, b: &str, duration: f32) -> Result<()> {
        self.attach_condition(GoalCondition::SpecificTouch {
            goal: a.to_string(),
            obj: b.to_string(),
            duration,
            since: None,
        })
    }

    pub fn goal_condition(&self) -> Option<&GoalCondition> {
        self.goal.as_ref()
    }

    pub fn check_end(&self) -> bool {
        self.goal.as_ref().map(|g| g.is_won(self.time)).unwrap_or(false)
    }

    pub fn remaining_goal_time(&self) -> Option<f32> {
        self.goal.as_ref().and_then(|g| g.remaining_time(self.time))
    }

    ////////////////////////////////////////
    // Placement and distance checks
    ////////////////////////////////////////

    /// Whether a polygon placed with its local origin at `pos` would
    /// overlap anything, goal regions and blockers included.
    pub fn check_collision(&mut self, pos: [f32; 2], verts: &[[f32; 2]]) -> Result<bool> {
        let pts: Vec<Point2<f32>> =
            verts.iter().map(|p| Point2::new(p[0], p[1])).collect();
        let shape = SharedShape::convex_hull(&pts).ok_or_else(|| WorldError::BadGeometry {
            name: "placement".to_string(),
            reason: "placement polygon has no convex hull".to_string(),
        })?;
        self.space.refresh_queries();
        let iso = Isometry2::translation(pos[0], pos[1]);
        Ok(!self.space.overlaps_shape(shape.as_ref(), &iso).is_empty())
    }

    pub fn check_circle_collision(&mut self, pos: [f32; 2], radius: f32) -> bool {
        let shape = SharedShape::ball(radius);
        self.space.refresh_queries();
        let iso = Isometry2::translation(pos[0], pos[1]);
        !self.space.overlaps_shape(shape.as_ref(), &iso).is_empty()
    }

    /// Signed distance from a point to an object's surface, through the
    /// sensor for containers and goal regions.
    fn object_distance_from_point(&self, obj: &SceneObject, p: &Point2<f32>) -> f32 {
        let handles: Vec<ColliderHandle> = match obj.sensor {
            Some(s) => vec![s],
            None => obj.solids.clone(),
        };
        handles
            .iter()
            .filter_map(|&h| self.space.distance_to_point(h, p))
            .fold(f32::INFINITY, f32::min)
    }

    fn touch_pair_distance(&self, a: &str, b: &str) -> Result<f32> {
        let origin = Point2::origin();
        let d1 = self.object_distance_from_point(self.object(a)?, &origin);
        let d2 = self.object_distance_from_point(self.object(b)?, &origin);
        Ok((d1 - d2).abs())
    }

    /// Distance from `point` to the goal region of the attached condition.
    pub fn distance_to_goal(&self, point: [f32; 2]) -> Result<f32> {
        let goal = self.goal.as_ref().ok_or(WorldError::NoGoalCondition("distance_to_goal"))?;
        if let GoalCondition::SpecificTouch { goal: a, obj: b, .. } = goal {
            return self.touch_pair_distance(&a.clone(), &b.clone());
        }
        let gname = goal.referenced_names()[0].to_string();
        let gobj = self.object(&gname)?;
        let p = Point2::new(point[0], point[1]);
        Ok(self.object_distance_from_point(gobj, &p).max(0.0))
    }

    /// Like `distance_to_goal`, but for container goals measures to the
    /// opening between the first and last wall points.
    pub fn distance_to_goal_container(&self, point: [f32; 2]) -> Result<f32> {
        let goal = self
            .goal
            .as_ref()
            .ok_or(WorldError::NoGoalCondition("distance_to_goal_container"))?;
        if let GoalCondition::SpecificTouch { goal: a, obj: b, .. } = goal {
            return self.touch_pair_distance(&a.clone(), &b.clone());
        }
        let gname = goal.referenced_names()[0].to_string();
        let gobj = self.object(&gname)?;
        let p = Point2::new(point[0], point[1]);
        if !matches!(gobj.kind, ObjectKind::Container { .. }) {
            return Ok(self.object_distance_from_point(gobj, &p));
        }
        if self.distance_to_goal(point)? == 0.0 {
            return Ok(0.0);
        }
        let walls = gobj.world_vertices(&self.space);
        match (walls.first(), walls.last()) {
            (Some(open), Some(close)) => Ok(geom::point_segment_distance(*open, *close, p)),
            _ => Ok(self.object_distance_from_point(gobj, &p)),
        }
    }

    /// Resting-contact test by object index, with separation tolerance.
    pub(crate) fn objects_touching(&self, i: usize, j: usize, slop: f32) -> bool {
        for &ha in &self.objects[i].contact_shapes() {
            for &hb in &self.objects[j].contact_shapes() {
                if let Some(c) = self.space.contact_between(ha, hb, slop) {
                    if c.dist <= slop {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Narrow-phase contact test between two named objects.
    pub fn check_contact(&self, a: &str, b: &str) -> Result<bool> {
        let oa = self.object(a)?;
        let ob = self.object(b)?;
        for &ha in &oa.contact_shapes() {
            for &hb in &ob.contact_shapes() {
                if let Some(c) = self.space.contact_between(ha, hb, 0.0) {
                    if c.dist <= 0.0 {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    ////////////////////////////////////////
    // Collision log
    ////////////////////////////////////////

    pub fn collision_events(&self) -> &[RawCollisionEvent] {
        &self.collision_log
    }

    pub fn reset_collisions(&mut self) {
        self.collision_log.clear();
    }

    ////////////////////////////////////////
    // Descriptors
    ////////////////////////////////////////

    pub fn to_desc(&self) -> WorldDesc {
        let objects = self
            .objects
            .iter()
            .map(|o| (o.name.clone(), o.to_desc(&self.space)))
            .collect();
        let blocks = self
            .blockers
            .iter()
            .map(|b| {
                (
                    b.name.clone(),
                    BlockDesc {
                        vertices: b.vertices.iter().map(|p| [p.x, p.y]).collect(),
                        color: Some(b.color),
                    },
                )
            })
            .collect();
        WorldDesc {
            dims: self.dims,
            bts: self.bts,
            gravity: self.gravity(),
            defaults: self.defaults.clone(),
            objects,
            blocks,
            gcond: self.goal.as_ref().map(|g| g.to_desc()),
        }
    }

    pub fn from_desc(desc: &WorldDesc) -> Result<World> {
        let mut w = World::new_with(
            desc.dims,
            desc.gravity,
            [false; 4],
            desc.bts,
            desc.defaults.clone(),
        )?;
        for (name, obj) in &desc.objects {
            match obj {
                ObjectDesc::Poly { vertices, material } => w.add_poly(
                    name,
                    vertices,
                    material.color.unwrap_or(desc.defaults.color),
                    material.density,
                    material.elasticity,
                    material.friction,
                )?,
                ObjectDesc::Ball { position, radius, material } => w.add_ball(
                    name,
                    *position,
                    *radius,
                    material.color.unwrap_or(desc.defaults.color),
                    material.density,
                    material.elasticity,
                    material.friction,
                )?,
                ObjectDesc::Segment { p1, p2, width, material } => w.add_segment(
                    name,
                    *p1,
                    *p2,
                    *width,
                    material.color.unwrap_or(desc.defaults.color),
                    material.density,
                    material.elasticity,
                    material.friction,
                )?,
                ObjectDesc::Container { points, width, inner_color, outer_color, material } => {
                    w.add_container(
                        name,
                        points,
                        *width,
                        inner_color.or(material.color),
                        Some(outer_color.unwrap_or(DEFAULT_COLOR)),
                        material.density,
                        material.elasticity,
                        material.friction,
                    )?
                }
                ObjectDesc::Compound { polys, material } => w.add_compound(
                    name,
                    polys,
                    material.color.unwrap_or(desc.defaults.color),
                    material.density,
                    material.elasticity,
                    material.friction,
                )?,
                ObjectDesc::Goal { vertices, material } => w.add_poly_goal(
                    name,
                    vertices,
                    material.color.unwrap_or(DEFAULT_GOAL_COLOR),
                )?,
            }
        }
        for (name, block) in &desc.blocks {
            w.add_poly_block(name, &block.vertices, block.color.unwrap_or(DEFAULT_COLOR))?;
        }
        if let Some(g) = &desc.gcond {
            w.attach_condition(GoalCondition::from_desc(g))?;
        }
        Ok(w)
    }

    pub fn from_json(json: &str) -> Result<World> {
        let desc: WorldDesc = serde_json::from_str(json)?;
        World::from_desc(&desc)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_desc())?)
    }

    /// Fresh world rebuilt from this one's descriptor. Body velocities and
    /// the event log do not carry over.
    pub fn copy(&self) -> Result<World> {
        World::from_desc(&self.to_desc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_world() -> World {
        World::new([600.0, 600.0], 200.0).unwrap()
    }

    #[test]
    fn closed_ends_create_walls() {
        let w = empty_world();
        for wall in ["_LeftWall", "_BottomWall", "_RightWall", "_TopWall"] {
            assert!(w.object(wall).is_ok(), "missing {wall}");
            assert!(w.object(wall).unwrap().is_static());
        }
        let open = World::new_with(
            [600.0, 600.0],
            200.0,
            [false; 4],
            DEFAULT_BASIC_TIMESTEP,
            DefaultsDesc::default(),
        )
        .unwrap();
        assert!(open.object("_LeftWall").is_err());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut w = empty_world();
        w.add_ball("ball", [300.0, 300.0], 20.0, DEFAULT_COLOR, None, None, None).unwrap();
        let err = w.add_poly(
            "ball",
            &[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]],
            DEFAULT_COLOR,
            None,
            None,
            None,
        );
        assert!(matches!(err, Err(WorldError::DuplicateName(_))));
    }

    #[test]
    fn bad_bounds_are_rejected() {
        assert!(matches!(
            World::new([0.0, 600.0], 200.0),
            Err(WorldError::BadBounds { .. })
        ));
    }

    #[test]
    fn static_objects_have_no_kinematics() {
        let mut w = empty_world();
        w.add_ball("rock", [300.0, 300.0], 20.0, DEFAULT_COLOR, Some(0.0), None, None).unwrap();
        assert!(matches!(
            w.position_of("rock"),
            Err(WorldError::StaticObject { .. })
        ));
        assert!(matches!(
            w.kick("rock", [1.0, 0.0], [300.0, 300.0]),
            Err(WorldError::StaticObject { .. })
        ));
    }

    #[test]
    fn gravity_pulls_a_ball_down() {
        let mut w = empty_world();
        w.add_ball("ball", [300.0, 400.0], 20.0, DEFAULT_COLOR, None, None, None).unwrap();
        let y0 = w.position_of("ball").unwrap().y;
        w.step(0.5);
        let y1 = w.position_of("ball").unwrap().y;
        assert!(y1 < y0, "ball did not fall: {y0} -> {y1}");
        assert!((w.time() - 0.5).abs() < 1.0e-6);
    }

    #[test]
    fn kick_requires_point_on_object() {
        let mut w = empty_world();
        w.add_ball("ball", [300.0, 300.0], 20.0, DEFAULT_COLOR, None, None, None).unwrap();
        assert!(matches!(
            w.kick("ball", [100.0, 0.0], [500.0, 500.0]),
            Err(WorldError::KickOutsideObject { .. })
        ));
        w.kick("ball", [0.0, 50000.0], [300.0, 300.0]).unwrap();
        assert!(w.velocity_of("ball").unwrap().y > 0.0);
    }

    #[test]
    fn attach_validates_references() {
        let mut w = empty_world();
        assert!(matches!(
            w.attach_any_in_goal("nowhere", 1.0, vec![]),
            Err(WorldError::UnknownObject(_))
        ));
        w.add_box_goal("goal", [100.0, 0.0, 200.0, 100.0], DEFAULT_GOAL_COLOR).unwrap();
        w.attach_any_in_goal("goal", 1.0, vec![]).unwrap();
        assert!(!w.check_end());
    }

    #[test]
    fn placement_check_sees_objects_goals_and_blockers() {
        let mut w = World::new_with(
            [600.0, 600.0],
            200.0,
            [false; 4],
            DEFAULT_BASIC_TIMESTEP,
            DefaultsDesc::default(),
        )
        .unwrap();
        w.add_ball("ball", [100.0, 100.0], 20.0, DEFAULT_COLOR, None, None, None).unwrap();
        w.add_box_goal("goal", [300.0, 0.0, 400.0, 100.0], DEFAULT_GOAL_COLOR).unwrap();
        w.add_block("keepout", [500.0, 0.0, 600.0, 100.0], DEFAULT_COLOR).unwrap();
        let square = [[-10.0, -10.0], [-10.0, 10.0], [10.0, 10.0], [10.0, -10.0]];
        assert!(w.check_collision([100.0, 100.0], &square).unwrap());
        assert!(w.check_collision([350.0, 50.0], &square).unwrap());
        assert!(w.check_collision([550.0, 50.0], &square).unwrap());
        assert!(!w.check_collision([200.0, 300.0], &square).unwrap());
        assert!(w.check_circle_collision([100.0, 100.0], 15.0));
        assert!(!w.check_circle_collision([200.0, 300.0], 15.0));
    }

    #[test]
    fn desc_round_trip_preserves_layout() {
        let mut w = empty_world();
        w.add_ball("ball", [300.0, 400.0], 20.0, DEFAULT_COLOR, None, None, None).unwrap();
        w.add_container(
            "cup",
            &[[200.0, 100.0], [200.0, 0.0], [300.0, 0.0], [300.0, 100.0]],
            10.0,
            None,
            None,
            Some(0.0),
            None,
            None,
        )
        .unwrap();
        w.attach_specific_in_goal("cup", "ball", 1.0).unwrap();
        let desc = w.to_desc();
        let rebuilt = World::from_desc(&desc).unwrap();
        assert_eq!(rebuilt.to_desc(), desc);
        assert!(rebuilt.goal_condition().is_some());
    }

    #[test]
    fn distance_to_goal_needs_a_condition() {
        let w = empty_world();
        assert!(matches!(
            w.distance_to_goal([0.0, 0.0]),
            Err(WorldError::NoGoalCondition(_))
        ));
    }

    #[test]
    fn distance_to_goal_decreases_toward_goal() {
        let mut w = empty_world();
        w.add_box_goal("goal", [100.0, 0.0, 200.0, 100.0], DEFAULT_GOAL_COLOR).unwrap();
        w.add_ball("ball", [300.0, 400.0], 20.0, DEFAULT_COLOR, None, None, None).unwrap();
        w.attach_any_in_goal("goal", 1.0, vec![]).unwrap();
        let far = w.distance_to_goal([500.0, 500.0]).unwrap();
        let near = w.distance_to_goal([210.0, 50.0]).unwrap();
        let inside = w.distance_to_goal([150.0, 50.0]).unwrap();
        assert!(far > near);
        assert_eq!(inside, 0.0);
    }
}
