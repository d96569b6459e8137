//! Whole-trial simulation drivers: run a world forward until it is won
//! or time expires, optionally recording paths, states, and coalesced
//! collision intervals.

use crate::error::Result;
use crate::events::{coalesce_events, CollisionInterval};
use crate::world::World;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_MAX_TIME: f32 = 20.0;
pub const DEFAULT_STEP_SIZE: f32 = 0.1;
/// Slop for coalescing the collision log of a full run. Slightly above two
/// outer steps so single-step separations never split an interval.
pub const DEFAULT_RUN_SLOP: f32 = 0.2001;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub goal_reached: bool,
    pub elapsed: f32,
}

/// Positions per dynamic object, one sample per outer step plus the start.
pub type PathMap = HashMap<String, Vec<[f32; 2]>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    pub position: [f32; 2],
    pub rotation: f32,
    pub velocity: [f32; 2],
}

/// A scheduled impulse for forced-motion runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KickSpec {
    pub object: String,
    pub impulse: [f32; 2],
    pub position: [f32; 2],
}

fn dynamic_names(world: &World) -> Vec<String> {
    world.dynamic_objects().map(|o| o.name.clone()).collect()
}

fn sample_positions(world: &World, names: &[String], paths: &mut PathMap) {
    for name in names {
        if let Ok(obj) = world.object(name) {
            let p = obj.position(&world.space);
            paths.entry(name.clone()).or_default().push([p.x, p.y]);
        }
    }
}

fn sample_states(
    world: &World,
    names: &[String],
    paths: &mut HashMap<String, Vec<ObjectState>>,
) {
    for name in names {
        if let Ok(obj) = world.object(name) {
            let p = obj.position(&world.space);
            let v = obj.velocity(&world.space);
            paths.entry(name.clone()).or_default().push(ObjectState {
                position: [p.x, p.y],
                rotation: obj.rotation(&world.space),
                velocity: [v.x, v.y],
            });
        }
    }
}

/// Steps the world until the goal is met or `max_time` elapses.
pub fn run_world(world: &mut World, max_time: f32, step_size: f32) -> RunResult {
    let mut t = 0.0;
    loop {
        world.step(step_size);
        t += step_size;
        if world.check_end() || t >= max_time {
            return RunResult { goal_reached: world.check_end(), elapsed: t };
        }
    }
}

/// Like `run_world`, recording each dynamic object's position per step.
pub fn run_world_path(world: &mut World, max_time: f32, step_size: f32) -> (PathMap, RunResult) {
    let names = dynamic_names(world);
    let mut paths = PathMap::new();
    sample_positions(world, &names, &mut paths);
    let mut t = 0.0;
    loop {
        world.step(step_size);
        t += step_size;
        sample_positions(world, &names, &mut paths);
        if world.check_end() || t >= max_time {
            return (paths, RunResult { goal_reached: world.check_end(), elapsed: t });
        }
    }
}

/// Full kinematic state per dynamic object per step.
pub fn run_world_state_path(
    world: &mut World,
    max_time: f32,
    step_size: f32,
) -> (HashMap<String, Vec<ObjectState>>, RunResult) {
    let names = dynamic_names(world);
    let mut paths = HashMap::new();
    sample_states(world, &names, &mut paths);
    let mut t = 0.0;
    loop {
        world.step(step_size);
        t += step_size;
        sample_states(world, &names, &mut paths);
        if world.check_end() || t >= max_time {
            return (paths, RunResult { goal_reached: world.check_end(), elapsed: t });
        }
    }
}

/// Paths plus the coalesced collision intervals of the run.
pub fn run_world_collisions(
    world: &mut World,
    max_time: f32,
    step_size: f32,
    slop: f32,
) -> (PathMap, Vec<CollisionInterval>, RunResult) {
    let (paths, result) = run_world_path(world, max_time, step_size);
    let intervals = coalesce_events(world.collision_events(), slop);
    (paths, intervals, result)
}

/// `run_world_collisions` with impulses applied at scheduled times. A kick
/// fires on the first step whose clock reaches its scheduled time.
pub fn run_world_collisions_with_kicks(
    world: &mut World,
    kicks: &[(f32, KickSpec)],
    max_time: f32,
    step_size: f32,
    slop: f32,
) -> Result<(PathMap, Vec<CollisionInterval>, RunResult)> {
    let names = dynamic_names(world);
    let mut paths = PathMap::new();
    sample_positions(world, &names, &mut paths);
    let mut pending: Vec<&(f32, KickSpec)> = kicks.iter().collect();
    let mut t = 0.0;
    let result = loop {
        world.step(step_size);
        t += step_size;
        let due: Vec<KickSpec> = {
            let (fire, keep): (Vec<_>, Vec<_>) =
                pending.into_iter().partition(|(kt, _)| *kt <= t + step_size * 1.0e-3);
            pending = keep;
            fire.into_iter().map(|(_, k)| k.clone()).collect()
        };
        for kick in due {
            world.kick(&kick.object, kick.impulse, kick.position)?;
        }
        sample_positions(world, &names, &mut paths);
        if world.check_end() || t >= max_time {
            break RunResult { goal_reached: world.check_end(), elapsed: t };
        }
    };
    let intervals = coalesce_events(world.collision_events(), slop);
    Ok((paths, intervals, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DEFAULT_COLOR;

    fn ball_world() -> World {
        let mut w = World::new([600.0, 600.0], 200.0).unwrap();
        w.add_ball("ball", [300.0, 400.0], 20.0, DEFAULT_COLOR, None, None, None).unwrap();
        w
    }

    #[test]
    fn no_goal_runs_to_max_time() {
        let mut w = ball_world();
        let result = run_world(&mut w, 2.0, DEFAULT_STEP_SIZE);
        assert!(!result.goal_reached);
        assert!((result.elapsed - 2.0).abs() < DEFAULT_STEP_SIZE);
    }

    #[test]
    fn path_tracks_dynamic_objects_only() {
        let mut w = ball_world();
        w.add_box("shelf", [0.0, 100.0, 600.0, 120.0], DEFAULT_COLOR, Some(0.0), None, None)
            .unwrap();
        let (paths, result) = run_world_path(&mut w, 1.0, DEFAULT_STEP_SIZE);
        assert!(paths.contains_key("ball"));
        assert!(!paths.contains_key("shelf"));
        assert!(!paths.contains_key("_LeftWall"));
        let track = &paths["ball"];
        let expected = (result.elapsed / DEFAULT_STEP_SIZE).round() as usize + 1;
        assert_eq!(track.len(), expected);
        assert!(track.last().unwrap()[1] < track[0][1], "ball did not fall");
    }

    #[test]
    fn state_path_records_velocity() {
        let mut w = ball_world();
        let (paths, _) = run_world_state_path(&mut w, 0.5, DEFAULT_STEP_SIZE);
        let states = &paths["ball"];
        assert!(states[0].velocity[1].abs() < 1.0e-6);
        assert!(states.last().unwrap().velocity[1] < 0.0);
    }

    #[test]
    fn collisions_run_logs_landing() {
        let mut w = ball_world();
        let (_, intervals, _) = run_world_collisions(&mut w, 5.0, DEFAULT_STEP_SIZE, DEFAULT_RUN_SLOP);
        assert!(intervals
            .iter()
            .any(|iv| (iv.a == "_BottomWall" && iv.b == "ball")
                || (iv.a == "ball" && iv.b == "_BottomWall")));
    }

    #[test]
    fn scheduled_kick_fires_once() {
        let mut w = ball_world();
        let kicks = vec![(
            0.5,
            KickSpec { object: "ball".into(), impulse: [500000.0, 0.0], position: [300.0, 400.0] },
        )];
        // Kick at the recorded position before the ball falls away from it.
        let err = run_world_collisions_with_kicks(
            &mut w,
            &kicks,
            0.4,
            DEFAULT_STEP_SIZE,
            DEFAULT_RUN_SLOP,
        );
        assert!(err.is_ok(), "run before kick time must not fire the kick");
    }
}
