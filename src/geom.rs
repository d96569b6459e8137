//! Pure polygon and segment helpers shared by object construction, the
//! serialization layer, and the noise injector. No physics state here.

use rapier2d::na::{Point2, Vector2};
use std::f32::consts::{FRAC_PI_4, PI};

/// Signed polygon area. Positive for clockwise vertex order (the convention
/// used by the world descriptors), negative for counter-clockwise.
pub fn poly_area(verts: &[Point2<f32>]) -> f32 {
    let mut area = 0.0;
    for i in 0..verts.len() {
        let v1 = verts[i];
        let v2 = verts[(i + 1) % verts.len()];
        area += v1.x * v2.y - v1.y * v2.x;
    }
    -area / 2.0
}

/// Area centroid of a simple polygon. Undefined for degenerate (zero-area)
/// input; callers validate via [`poly_area`] first.
pub fn poly_centroid(verts: &[Point2<f32>]) -> Point2<f32> {
    let mut tsum = 0.0;
    let mut vsum = Vector2::new(0.0, 0.0);
    for i in 0..verts.len() {
        let v1 = verts[i];
        let v2 = verts[(i + 1) % verts.len()];
        let cross = v1.x * v2.y - v1.y * v2.x;
        tsum += cross;
        vsum += (v1.coords + v2.coords) * cross;
    }
    Point2::from(vsum / (3.0 * tsum))
}

/// Translates the vertices so their centroid sits at the origin; returns the
/// removed centroid so callers can place the body frame there.
pub fn recenter_poly(verts: &[Point2<f32>]) -> (Point2<f32>, Vec<Point2<f32>>) {
    let c = poly_centroid(verts);
    (c, verts.iter().map(|v| Point2::from(v - c)).collect())
}

/// Area of a thick segment (capsule): end caps plus the rectangle between.
pub fn segment_area(a: Point2<f32>, b: Point2<f32>, r: f32) -> f32 {
    r * (PI * r + 2.0 * (b - a).norm())
}

/// Distance from `p` to the closed segment `l1..l2`.
pub fn point_segment_distance(l1: Point2<f32>, l2: Point2<f32>, p: Point2<f32>) -> f32 {
    let seg = l2 - l1;
    let len2 = seg.norm_squared();
    if len2 == 0.0 {
        return (p - l1).norm();
    }
    let t = ((p - l1).dot(&seg) / len2).clamp(0.0, 1.0);
    (l1 + seg * t - p).norm()
}

/// True when the vertex loop winds clockwise (positive signed area under the
/// descriptor convention). Used to normalize sensor polygons.
pub fn is_clockwise(verts: &[Point2<f32>]) -> bool {
    poly_area(verts) > 0.0
}

pub fn poly_bounds(verts: &[Point2<f32>]) -> (Point2<f32>, Point2<f32>) {
    let mut min = Point2::new(f32::INFINITY, f32::INFINITY);
    let mut max = Point2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
    for v in verts {
        min.x = min.x.min(v.x);
        min.y = min.y.min(v.y);
        max.x = max.x.max(v.x);
        max.y = max.y.max(v.y);
    }
    (min, max)
}

fn is_left(spt: Point2<f32>, ept: Point2<f32>, test: Point2<f32>) -> bool {
    let seg1 = ept - spt;
    let seg2 = test - spt;
    seg1.x * seg2.y - seg1.y * seg2.x > 0.0
}

/// End-cap corner pair for the first/last point of a thick path, picked by
/// the quadrant the adjoining segment points into.
fn cap_corners(pt: Point2<f32>, ang: f32, r: f32) -> (Point2<f32>, Point2<f32>) {
    if (-3.0 * FRAC_PI_4..=-FRAC_PI_4).contains(&ang) {
        // downwards
        (Point2::new(pt.x - r, pt.y), Point2::new(pt.x + r, pt.y))
    } else if (FRAC_PI_4..=3.0 * FRAC_PI_4).contains(&ang) {
        // upwards
        (Point2::new(pt.x + r, pt.y), Point2::new(pt.x - r, pt.y))
    } else if (-FRAC_PI_4..=FRAC_PI_4).contains(&ang) {
        // rightwards
        (Point2::new(pt.x, pt.y - r), Point2::new(pt.x, pt.y + r))
    } else {
        // leftwards
        (Point2::new(pt.x, pt.y + r), Point2::new(pt.x, pt.y - r))
    }
}

/// Converts an open point chain into a strip of quads of half-width `r`, one
/// per segment, with mitered interior joints. This is the wall geometry for
/// container objects. Requires at least two points.
pub fn segs_to_poly(seglist: &[Point2<f32>], r: f32) -> Vec<[Point2<f32>; 4]> {
    debug_assert!(seglist.len() >= 2);
    let iseg = seglist[1] - seglist[0];
    let (mut prev1, mut prev2) = cap_corners(seglist[0], iseg.y.atan2(iseg.x), r);

    let mut quads = Vec::with_capacity(seglist.len() - 1);
    for i in 1..seglist.len() - 1 {
        let pi = seglist[i];
        let sm = seglist[i - 1] - pi;
        let sp = seglist[i + 1] - pi;
        let angm = sm.y.atan2(sm.x);
        let angp = sp.y.atan2(sp.x);
        // Bisector of the interior joint angle, as a unit direction.
        let angi = (angm - angp).rem_euclid(2.0 * PI);
        let angn = (angp + angi / 2.0).rem_euclid(2.0 * PI);
        let unitn = Vector2::new(angn.cos(), angn.sin());
        let xdiff = if unitn.x >= 0.0 { r } else { -r };
        let ydiff = if unitn.y >= 0.0 { r } else { -r };
        let mut next3 = Point2::new(pi.x + xdiff, pi.y + ydiff);
        let mut next4 = Point2::new(pi.x - xdiff, pi.y - ydiff);
        // Keep winding consistent: next3 stays on the left of next4.
        if is_left(prev2, next3, next4) {
            std::mem::swap(&mut next3, &mut next4);
        }
        quads.push([prev1, prev2, next3, next4]);
        prev1 = next4;
        prev2 = next3;
    }

    let last = seglist[seglist.len() - 1];
    let fseg = seglist[seglist.len() - 2] - last;
    let (next3, next4) = cap_corners(last, fseg.y.atan2(fseg.x), r);
    quads.push([prev1, prev2, next3, next4]);
    quads
}
