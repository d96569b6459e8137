//! Collision event records and begin/end coalescing into touch intervals.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Slop applied when coalescing begin/end pairs: an end followed by a begin
/// within this many seconds is treated as one continuous touch.
pub const DEFAULT_COLLISION_SLOP: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    pub a: [f32; 2],
    pub b: [f32; 2],
    pub dist: f32,
}

/// Contact geometry captured at the moment a solid-solid touch begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub normal: [f32; 2],
    pub restitution: f32,
    pub points: Vec<ContactPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactPhase {
    Begin,
    End,
}

/// One begin or end event as logged by the stepper, stamped with the world
/// clock at the end of the sub-step that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCollisionEvent {
    pub a: String,
    pub b: String,
    pub phase: ContactPhase,
    pub t: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ContactInfo>,
}

/// A coalesced touch interval. `end` is `None` while the pair is still in
/// contact when the log closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionInterval {
    pub a: String,
    pub b: String,
    pub start: f32,
    pub end: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ContactInfo>,
}

fn flip(info: Option<ContactInfo>) -> Option<ContactInfo> {
    info.map(|mut i| {
        i.normal = [-i.normal[0], -i.normal[1]];
        for p in &mut i.points {
            std::mem::swap(&mut p.a, &mut p.b);
        }
        i
    })
}

/// Per-pair touch state: the open interval's start survives every `end`
/// event; ends only move the provisional close time until a begin decides
/// whether the break was real.
struct PairTouch {
    start: f32,
    info: Option<ContactInfo>,
    close: Option<f32>,
}

/// Collapses a raw begin/end log into touch intervals, merging breaks
/// shorter than `slop` seconds. Pairs are canonicalized so that the
/// lexicographically smaller name comes first; contact normals recorded
/// for the reversed order are negated to match.
pub fn coalesce_events(events: &[RawCollisionEvent], slop: f32) -> Vec<CollisionInterval> {
    let mut touches: HashMap<(String, String), PairTouch> = HashMap::new();
    let mut out: Vec<CollisionInterval> = Vec::new();

    for ev in events {
        let (key, info) = if ev.a <= ev.b {
            ((ev.a.clone(), ev.b.clone()), ev.info.clone())
        } else {
            ((ev.b.clone(), ev.a.clone()), flip(ev.info.clone()))
        };

        match ev.phase {
            ContactPhase::Begin => match touches.entry(key) {
                Entry::Occupied(mut e) => {
                    let (a, b) = e.key().clone();
                    let touch = e.get_mut();
                    match touch.close {
                        // Break was shorter than slop: the touch continues.
                        Some(c) if ev.t - c <= slop => touch.close = None,
                        Some(c) => {
                            out.push(CollisionInterval {
                                a,
                                b,
                                start: touch.start,
                                end: Some(c),
                                info: touch.info.take(),
                            });
                            *touch = PairTouch { start: ev.t, info, close: None };
                        }
                        // A duplicate begin keeps the earliest start.
                        None => {}
                    }
                }
                Entry::Vacant(e) => {
                    e.insert(PairTouch { start: ev.t, info, close: None });
                }
            },
            ContactPhase::End => {
                // A repeated end only moves the provisional close time.
                touches
                    .entry(key)
                    .and_modify(|t| t.close = Some(ev.t))
                    .or_insert(PairTouch { start: 0.0, info: None, close: Some(ev.t) });
            }
        }
    }

    out.extend(touches.into_iter().map(|((a, b), touch)| CollisionInterval {
        a,
        b,
        start: touch.start,
        end: touch.close,
        info: touch.info,
    }));
    out.sort_by(|x, y| {
        x.start
            .partial_cmp(&y.start)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (&x.a, &x.b).cmp(&(&y.a, &y.b)))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(a: &str, b: &str, phase: ContactPhase, t: f32) -> RawCollisionEvent {
        RawCollisionEvent { a: a.into(), b: b.into(), phase, t, info: None }
    }

    #[test]
    fn short_break_is_merged() {
        let log = vec![
            ev("ball", "floor", ContactPhase::Begin, 1.0),
            ev("ball", "floor", ContactPhase::End, 2.0),
            ev("ball", "floor", ContactPhase::Begin, 2.1),
            ev("ball", "floor", ContactPhase::End, 3.0),
        ];
        let ivs = coalesce_events(&log, DEFAULT_COLLISION_SLOP);
        assert_eq!(ivs.len(), 1);
        assert_eq!(ivs[0].start, 1.0);
        assert_eq!(ivs[0].end, Some(3.0));
    }

    #[test]
    fn long_break_stays_split() {
        let log = vec![
            ev("ball", "floor", ContactPhase::Begin, 1.0),
            ev("ball", "floor", ContactPhase::End, 2.0),
            ev("ball", "floor", ContactPhase::Begin, 2.5),
        ];
        let ivs = coalesce_events(&log, DEFAULT_COLLISION_SLOP);
        assert_eq!(ivs.len(), 2);
        assert_eq!(ivs[0].end, Some(2.0));
        assert_eq!(ivs[1].start, 2.5);
        assert_eq!(ivs[1].end, None);
    }

    #[test]
    fn pair_order_is_canonical() {
        let info = ContactInfo {
            normal: [0.0, 1.0],
            restitution: 0.5,
            points: vec![ContactPoint { a: [0.0, 1.0], b: [0.0, 0.0], dist: -0.1 }],
        };
        let log = vec![RawCollisionEvent {
            a: "zeta".into(),
            b: "alpha".into(),
            phase: ContactPhase::Begin,
            t: 0.5,
            info: Some(info),
        }];
        let ivs = coalesce_events(&log, DEFAULT_COLLISION_SLOP);
        assert_eq!(ivs[0].a, "alpha");
        assert_eq!(ivs[0].b, "zeta");
        let got = ivs[0].info.as_ref().unwrap();
        assert_eq!(got.normal, [0.0, -1.0]);
        assert_eq!(got.points[0].a, [0.0, 0.0]);
        assert_eq!(got.points[0].b, [0.0, 1.0]);
    }

    #[test]
    fn repeated_end_keeps_the_open_start() {
        let log = vec![
            ev("ball", "floor", ContactPhase::Begin, 1.0),
            ev("ball", "floor", ContactPhase::End, 2.0),
            ev("ball", "floor", ContactPhase::End, 2.05),
        ];
        let ivs = coalesce_events(&log, DEFAULT_COLLISION_SLOP);
        assert_eq!(ivs.len(), 1);
        assert_eq!(ivs[0].start, 1.0);
        assert_eq!(ivs[0].end, Some(2.05));
    }

    #[test]
    fn end_without_begin_starts_at_zero() {
        let log = vec![ev("a", "b", ContactPhase::End, 1.5)];
        let ivs = coalesce_events(&log, DEFAULT_COLLISION_SLOP);
        assert_eq!(ivs.len(), 1);
        assert_eq!(ivs[0].start, 0.0);
        assert_eq!(ivs[0].end, Some(1.5));
    }

    #[test]
    fn intervals_sorted_by_start() {
        let log = vec![
            ev("c", "d", ContactPhase::Begin, 2.0),
            ev("a", "b", ContactPhase::Begin, 1.0),
        ];
        let ivs = coalesce_events(&log, DEFAULT_COLLISION_SLOP);
        assert_eq!(ivs[0].a, "a");
        assert_eq!(ivs[1].a, "c");
    }
}
