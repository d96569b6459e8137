//! Scene objects: the shape variants a trial world can contain, their
//! construction into rapier bodies/colliders, and world-frame accessors.
//!
//! Every object owns its own rigid body (fixed when density is zero) placed
//! at the shape centroid, with collider geometry recentered into the body's
//! local frame. Concave outlines become their convex hull, matching the
//! behavior of the solvers the descriptor files were authored against.

use crate::error::{Result, WorldError};
use crate::format::{Color, MaterialDesc, ObjectDesc, DEFAULT_COLOR, DEFAULT_GOAL_COLOR};
use crate::geom;
use crate::space::{pack_user_data, ColliderRole, Space};
use rapier2d::na::{Point2, Vector2};
use rapier2d::prelude::*;

/// Material attributes resolved against the world defaults.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Material {
    pub color: Color,
    pub density: f32,
    pub elasticity: f32,
    pub friction: f32,
}

/// Shape data in the body's local frame.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    Poly {
        vertices: Vec<Point2<f32>>,
    },
    Ball {
        radius: f32,
    },
    Segment {
        a: Point2<f32>,
        b: Point2<f32>,
        r: f32,
    },
    Container {
        /// The open wall path the container was built from.
        points: Vec<Point2<f32>>,
        /// Wall quads produced by thickening the path.
        polys: Vec<Vec<Point2<f32>>>,
        r: f32,
        inner_color: Color,
        outer_color: Color,
    },
    Compound {
        polys: Vec<Vec<Point2<f32>>>,
    },
    Goal {
        vertices: Vec<Point2<f32>>,
    },
}

impl ObjectKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectKind::Poly { .. } => "Poly",
            ObjectKind::Ball { .. } => "Ball",
            ObjectKind::Segment { .. } => "Segment",
            ObjectKind::Container { .. } => "Container",
            ObjectKind::Compound { .. } => "Compound",
            ObjectKind::Goal { .. } => "Goal",
        }
    }
}

pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    pub color: Color,
    pub density: f32,
    pub elasticity: f32,
    pub friction: f32,
    pub(crate) body: RigidBodyHandle,
    pub(crate) solids: Vec<ColliderHandle>,
    /// Goal regions and container interiors.
    pub(crate) sensor: Option<ColliderHandle>,
}

fn hull(name: &str, pts: &[Point2<f32>]) -> Result<SharedShape> {
    SharedShape::convex_hull(pts).ok_or_else(|| WorldError::BadGeometry {
        name: name.to_string(),
        reason: "polygon has no convex hull".to_string(),
    })
}

fn make_body(space: &mut Space, density: f32, pos: Point2<f32>) -> RigidBodyHandle {
    let builder = if density == 0.0 {
        RigidBodyBuilder::fixed()
    } else {
        RigidBodyBuilder::dynamic()
    };
    space.bodies.insert(builder.translation(Vector2::new(pos.x, pos.y)))
}

fn attach_solid(
    space: &mut Space,
    body: RigidBodyHandle,
    shape: SharedShape,
    m: &Material,
    index: usize,
) -> ColliderHandle {
    let collider = ColliderBuilder::new(shape)
        .density(m.density)
        .friction(m.friction)
        .restitution(m.elasticity)
        .active_events(ActiveEvents::COLLISION_EVENTS)
        .active_hooks(ActiveHooks::MODIFY_SOLVER_CONTACTS)
        .user_data(pack_user_data(index, ColliderRole::Solid));
    space.colliders.insert_with_parent(collider, body, &mut space.bodies)
}

fn attach_sensor(
    space: &mut Space,
    body: RigidBodyHandle,
    shape: SharedShape,
    role: ColliderRole,
    index: usize,
) -> ColliderHandle {
    let collider = ColliderBuilder::new(shape)
        .sensor(true)
        .active_events(ActiveEvents::COLLISION_EVENTS)
        .user_data(pack_user_data(index, role));
    space.colliders.insert_with_parent(collider, body, &mut space.bodies)
}

fn to_points(raw: &[[f32; 2]]) -> Vec<Point2<f32>> {
    raw.iter().map(|p| Point2::new(p[0], p[1])).collect()
}

impl SceneObject {
    pub(crate) fn poly(
        space: &mut Space,
        index: usize,
        name: &str,
        vertices: &[[f32; 2]],
        m: Material,
    ) -> Result<SceneObject> {
        let world_pts = to_points(vertices);
        if world_pts.len() < 3 {
            return Err(WorldError::BadGeometry {
                name: name.to_string(),
                reason: "polygon needs at least 3 vertices".to_string(),
            });
        }
        let (centroid, local) = geom::recenter_poly(&world_pts);
        let shape = hull(name, &local)?;
        let body = make_body(space, m.density, centroid);
        let solid = attach_solid(space, body, shape, &m, index);
        Ok(SceneObject {
            name: name.to_string(),
            kind: ObjectKind::Poly { vertices: local },
            color: m.color,
            density: m.density,
            elasticity: m.elasticity,
            friction: m.friction,
            body,
            solids: vec![solid],
            sensor: None,
        })
    }

    pub(crate) fn ball(
        space: &mut Space,
        index: usize,
        name: &str,
        position: [f32; 2],
        radius: f32,
        m: Material,
    ) -> Result<SceneObject> {
        if radius <= 0.0 {
            return Err(WorldError::BadGeometry {
                name: name.to_string(),
                reason: "ball radius must be positive".to_string(),
            });
        }
        let body = make_body(space, m.density, Point2::new(position[0], position[1]));
        let solid = attach_solid(space, body, SharedShape::ball(radius), &m, index);
        Ok(SceneObject {
            name: name.to_string(),
            kind: ObjectKind::Ball { radius },
            color: m.color,
            density: m.density,
            elasticity: m.elasticity,
            friction: m.friction,
            body,
            solids: vec![solid],
            sensor: None,
        })
    }

    pub(crate) fn segment(
        space: &mut Space,
        index: usize,
        name: &str,
        p1: [f32; 2],
        p2: [f32; 2],
        width: f32,
        m: Material,
    ) -> Result<SceneObject> {
        if width <= 0.0 {
            return Err(WorldError::BadGeometry {
                name: name.to_string(),
                reason: "segment width must be positive".to_string(),
            });
        }
        let r = width / 2.0;
        let mid = Point2::new((p1[0] + p2[0]) / 2.0, (p1[1] + p2[1]) / 2.0);
        let a = Point2::new(p1[0] - mid.x, p1[1] - mid.y);
        let b = Point2::new(p2[0] - mid.x, p2[1] - mid.y);
        let body = make_body(space, m.density, mid);
        let solid = attach_solid(space, body, SharedShape::capsule(a, b, r), &m, index);
        Ok(SceneObject {
            name: name.to_string(),
            kind: ObjectKind::Segment { a, b, r },
            color: m.color,
            density: m.density,
            elasticity: m.elasticity,
            friction: m.friction,
            body,
            solids: vec![solid],
            sensor: None,
        })
    }

    pub(crate) fn container(
        space: &mut Space,
        index: usize,
        name: &str,
        points: &[[f32; 2]],
        width: f32,
        inner_color: Option<Color>,
        outer_color: Option<Color>,
        m: Material,
    ) -> Result<SceneObject> {
        let world_pts = to_points(points);
        if world_pts.len() < 2 {
            return Err(WorldError::BadGeometry {
                name: name.to_string(),
                reason: "container needs at least 2 path points".to_string(),
            });
        }
        let r = width / 2.0;
        let (centroid, local) = geom::recenter_poly(&world_pts);
        let body = make_body(space, m.density, centroid);
        let mut solids = Vec::new();
        for quad in geom::segs_to_poly(&local, r) {
            let shape = hull(name, &quad)?;
            solids.push(attach_solid(space, body, shape, &m, index));
        }
        // The interior region doubles as a goal sensor under the
        // container's own name.
        let sensor_shape = hull(name, &local)?;
        let sensor = attach_sensor(space, body, sensor_shape, ColliderRole::Goal, index);
        let polys = geom::segs_to_poly(&local, r).into_iter().map(|q| q.to_vec()).collect();
        Ok(SceneObject {
            name: name.to_string(),
            kind: ObjectKind::Container {
                points: local,
                polys,
                r,
                inner_color: inner_color.unwrap_or(DEFAULT_GOAL_COLOR),
                outer_color: outer_color.unwrap_or(DEFAULT_COLOR),
            },
            color: outer_color.unwrap_or(m.color),
            density: m.density,
            elasticity: m.elasticity,
            friction: m.friction,
            body,
            solids,
            sensor: Some(sensor),
        })
    }

    pub(crate) fn compound(
        space: &mut Space,
        index: usize,
        name: &str,
        polys: &[Vec<[f32; 2]>],
        m: Material,
    ) -> Result<SceneObject> {
        if polys.is_empty() {
            return Err(WorldError::BadGeometry {
                name: name.to_string(),
                reason: "compound needs at least one polygon".to_string(),
            });
        }
        // Area-weighted centroid over the member polygons.
        let mut total_area = 0.0;
        let mut gx = 0.0;
        let mut gy = 0.0;
        let mut world_polys: Vec<Vec<Point2<f32>>> = Vec::with_capacity(polys.len());
        for poly in polys {
            let pts = to_points(poly);
            if pts.len() < 3 {
                return Err(WorldError::BadGeometry {
                    name: name.to_string(),
                    reason: "compound member needs at least 3 vertices".to_string(),
                });
            }
            let a = geom::poly_area(&pts).abs();
            let c = geom::poly_centroid(&pts);
            total_area += a;
            gx += c.x * a;
            gy += c.y * a;
            world_polys.push(pts);
        }
        if total_area <= 0.0 {
            return Err(WorldError::BadGeometry {
                name: name.to_string(),
                reason: "compound has zero total area".to_string(),
            });
        }
        let centroid = Point2::new(gx / total_area, gy / total_area);
        let local_polys: Vec<Vec<Point2<f32>>> = world_polys
            .iter()
            .map(|pts| {
                pts.iter()
                    .map(|p| Point2::new(p.x - centroid.x, p.y - centroid.y))
                    .collect()
            })
            .collect();
        let body = make_body(space, m.density, centroid);
        let mut solids = Vec::new();
        for local in &local_polys {
            let shape = hull(name, local)?;
            solids.push(attach_solid(space, body, shape, &m, index));
        }
        Ok(SceneObject {
            name: name.to_string(),
            kind: ObjectKind::Compound { polys: local_polys },
            color: m.color,
            density: m.density,
            elasticity: m.elasticity,
            friction: m.friction,
            body,
            solids,
            sensor: None,
        })
    }

    pub(crate) fn goal(
        space: &mut Space,
        index: usize,
        name: &str,
        vertices: &[[f32; 2]],
        color: Color,
    ) -> Result<SceneObject> {
        let world_pts = to_points(vertices);
        if world_pts.len() < 3 {
            return Err(WorldError::BadGeometry {
                name: name.to_string(),
                reason: "goal region needs at least 3 vertices".to_string(),
            });
        }
        let (centroid, local) = geom::recenter_poly(&world_pts);
        let shape = hull(name, &local)?;
        let body = make_body(space, 0.0, centroid);
        let sensor = attach_sensor(space, body, shape, ColliderRole::Goal, index);
        Ok(SceneObject {
            name: name.to_string(),
            kind: ObjectKind::Goal { vertices: local },
            color,
            density: 0.0,
            elasticity: 0.0,
            friction: 0.0,
            body,
            solids: Vec::new(),
            sensor: Some(sensor),
        })
    }

    pub fn is_static(&self) -> bool {
        self.density == 0.0 || matches!(self.kind, ObjectKind::Goal { .. })
    }

    /// Colliders used for contact and distance checks against other
    /// objects. Goal regions expose their sensor.
    pub(crate) fn contact_shapes(&self) -> Vec<ColliderHandle> {
        if self.solids.is_empty() {
            self.sensor.into_iter().collect()
        } else {
            self.solids.clone()
        }
    }

    pub(crate) fn position(&self, space: &Space) -> Point2<f32> {
        match space.bodies.get(self.body) {
            Some(b) => {
                let t = b.translation();
                Point2::new(t.x, t.y)
            }
            None => Point2::origin(),
        }
    }

    pub(crate) fn rotation(&self, space: &Space) -> f32 {
        space.bodies.get(self.body).map(|b| b.rotation().angle()).unwrap_or(0.0)
    }

    pub(crate) fn velocity(&self, space: &Space) -> Vector2<f32> {
        space.bodies.get(self.body).map(|b| *b.linvel()).unwrap_or_else(Vector2::zeros)
    }

    pub(crate) fn mass(&self, space: &Space) -> f32 {
        space.bodies.get(self.body).map(|b| b.mass()).unwrap_or(0.0)
    }

    /// Containment through the sensor for containers and goal regions,
    /// otherwise through the solid colliders.
    pub(crate) fn point_in(&self, space: &Space, p: &Point2<f32>) -> bool {
        self.contact_shapes().iter().any(|&h| space.point_in_collider(h, p))
    }

    fn transform(&self, space: &Space, local: &Point2<f32>) -> Point2<f32> {
        match space.bodies.get(self.body) {
            Some(b) => b.position() * local,
            None => *local,
        }
    }

    /// Polygon vertices in the world frame (Poly and Goal objects).
    pub(crate) fn world_vertices(&self, space: &Space) -> Vec<Point2<f32>> {
        match &self.kind {
            ObjectKind::Poly { vertices } | ObjectKind::Goal { vertices } => {
                vertices.iter().map(|v| self.transform(space, v)).collect()
            }
            ObjectKind::Container { points, .. } => {
                points.iter().map(|v| self.transform(space, v)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Member polygons in the world frame (Container walls and Compounds).
    pub(crate) fn world_polys(&self, space: &Space) -> Vec<Vec<Point2<f32>>> {
        match &self.kind {
            ObjectKind::Container { polys, .. } | ObjectKind::Compound { polys } => polys
                .iter()
                .map(|poly| poly.iter().map(|v| self.transform(space, v)).collect())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn world_endpoints(&self, space: &Space) -> Option<(Point2<f32>, Point2<f32>)> {
        match &self.kind {
            ObjectKind::Segment { a, b, .. } => {
                Some((self.transform(space, a), self.transform(space, b)))
            }
            _ => None,
        }
    }

    pub(crate) fn to_desc(&self, space: &Space) -> ObjectDesc {
        let material = MaterialDesc {
            color: Some(self.color),
            density: Some(self.density),
            elasticity: Some(self.elasticity),
            friction: Some(self.friction),
        };
        let arr = |p: &Point2<f32>| [p.x, p.y];
        match &self.kind {
            ObjectKind::Poly { .. } => ObjectDesc::Poly {
                vertices: self.world_vertices(space).iter().map(arr).collect(),
                material,
            },
            ObjectKind::Ball { radius } => {
                let p = self.position(space);
                ObjectDesc::Ball { position: [p.x, p.y], radius: *radius, material }
            }
            ObjectKind::Segment { r, .. } => {
                let (p1, p2) = match self.world_endpoints(space) {
                    Some(pair) => pair,
                    None => (Point2::origin(), Point2::origin()),
                };
                ObjectDesc::Segment {
                    p1: [p1.x, p1.y],
                    p2: [p2.x, p2.y],
                    width: r * 2.0,
                    material,
                }
            }
            ObjectKind::Container { r, inner_color, outer_color, .. } => ObjectDesc::Container {
                points: self.world_vertices(space).iter().map(arr).collect(),
                width: r * 2.0,
                inner_color: Some(*inner_color),
                outer_color: Some(*outer_color),
                material,
            },
            ObjectKind::Compound { .. } => ObjectDesc::Compound {
                polys: self
                    .world_polys(space)
                    .iter()
                    .map(|poly| poly.iter().map(arr).collect())
                    .collect(),
                material,
            },
            ObjectKind::Goal { .. } => ObjectDesc::Goal {
                vertices: self.world_vertices(space).iter().map(arr).collect(),
                material: MaterialDesc { color: Some(self.color), ..MaterialDesc::default() },
            },
        }
    }
}
