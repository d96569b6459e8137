//! The trial layer: a puzzle world plus a catalog of placeable tools, with
//! deterministic and noisy placement evaluation.

use crate::error::{Result, WorldError};
use crate::events::CollisionInterval;
use crate::format::{Color, ToolGameDesc};
use crate::noise::{noisify_world, NoiseParams, PositionNoiseOutcome};
use crate::sim::{
    run_world, run_world_collisions, run_world_path, run_world_state_path, ObjectState, PathMap,
    RunResult,
};
use crate::world::World;
use rand::Rng;
use std::collections::HashMap;

/// Outer evaluation step for trials.
pub const TRIAL_STEP: f32 = 0.1;
/// Inner physics timestep used by placed-tool worlds.
pub const WORLD_TIMESTEP: f32 = 0.01;

pub const PLACED_NAME: &str = "PLACED";
const PLACED_COLOR: Color = Color([0, 0, 255, 255]);

/// Result of a tool placement attempt: either the spot was occupied, or
/// the trial ran and produced `T`.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement<T> {
    Conflict,
    Ran(T),
}

impl<T> Placement<T> {
    pub fn ran(self) -> Option<T> {
        match self {
            Placement::Conflict => None,
            Placement::Ran(t) => Some(t),
        }
    }
}

fn shifted(polys: &[Vec<[f32; 2]>], position: [f32; 2]) -> Vec<Vec<[f32; 2]>> {
    polys
        .iter()
        .map(|poly| poly.iter().map(|p| [p[0] + position[0], p[1] + position[1]]).collect())
        .collect()
}

/// Whether any member polygon of a tool overlaps the world at `position`.
pub fn check_collision_by_polys(
    world: &mut World,
    polys: &[Vec<[f32; 2]>],
    position: [f32; 2],
) -> Result<bool> {
    for poly in polys {
        if world.check_collision(position, poly)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Places a tool permanently if the spot is free. Returns whether it was
/// placed.
pub fn place_object_by_polys(
    world: &mut World,
    polys: &[Vec<[f32; 2]>],
    position: [f32; 2],
) -> Result<bool> {
    if check_collision_by_polys(world, polys, position)? {
        return Ok(false);
    }
    world.add_compound(PLACED_NAME, &shifted(polys, position), PLACED_COLOR, None, None, None)?;
    Ok(true)
}

pub struct ToolPicker {
    desc: ToolGameDesc,
    world: World,
    /// Outer step used when running trials.
    bts: f32,
    /// Physics sub-step for placed-tool worlds.
    wts: f32,
}

impl ToolPicker {
    pub fn new(desc: ToolGameDesc) -> Result<ToolPicker> {
        ToolPicker::new_with(desc, TRIAL_STEP, WORLD_TIMESTEP)
    }

    pub fn new_with(desc: ToolGameDesc, basic_timestep: f32, world_timestep: f32) -> Result<ToolPicker> {
        let wts = basic_timestep.min(world_timestep);
        let mut world = World::from_desc(&desc.world)?;
        world.bts = wts;
        Ok(ToolPicker { desc, world, bts: basic_timestep, wts })
    }

    pub fn from_json(json: &str) -> Result<ToolPicker> {
        ToolPicker::new(serde_json::from_str(json)?)
    }

    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.desc.tools.keys().map(String::as_str)
    }

    pub fn world_dims(&self) -> [f32; 2] {
        self.world.dims
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    fn tool(&self, name: &str) -> Result<Vec<Vec<[f32; 2]>>> {
        self.desc
            .tools
            .get(name)
            .cloned()
            .ok_or_else(|| WorldError::UnknownTool(name.to_string()))
    }

    fn check_bounds(&self, position: [f32; 2]) -> Result<()> {
        let [w, h] = self.world.dims;
        if position[0] < 0.0 || position[0] > w || position[1] < 0.0 || position[1] > h {
            return Err(WorldError::OutOfBounds { x: position[0], y: position[1] });
        }
        Ok(())
    }

    /// Whether placing `toolname` at `position` would overlap anything.
    pub fn check_placement_collide(&mut self, toolname: &str, position: [f32; 2]) -> Result<bool> {
        self.check_bounds(position)?;
        let tool = self.tool(toolname)?;
        check_collision_by_polys(&mut self.world, &tool, position)
    }

    /// Fresh world from the current state with the tool placed at `position`.
    fn placed_world(&self, tool: &[Vec<[f32; 2]>], position: [f32; 2]) -> Result<World> {
        let mut w = self.world.copy()?;
        w.bts = self.wts;
        w.add_compound(PLACED_NAME, &shifted(tool, position), PLACED_COLOR, None, None, None)?;
        Ok(w)
    }

    /// Runs the trial with a tool placed, up to `max_time` seconds.
    pub fn run_placement(
        &mut self,
        toolname: &str,
        position: [f32; 2],
        max_time: f32,
    ) -> Result<Placement<RunResult>> {
        self.check_bounds(position)?;
        let tool = self.tool(toolname)?;
        if check_collision_by_polys(&mut self.world, &tool, position)? {
            return Ok(Placement::Conflict);
        }
        let mut w = self.placed_world(&tool, position)?;
        Ok(Placement::Ran(run_world(&mut w, max_time, self.bts)))
    }

    pub fn observe_placement_path(
        &mut self,
        toolname: &str,
        position: [f32; 2],
        max_time: f32,
    ) -> Result<Placement<(PathMap, RunResult)>> {
        self.check_bounds(position)?;
        let tool = self.tool(toolname)?;
        if check_collision_by_polys(&mut self.world, &tool, position)? {
            return Ok(Placement::Conflict);
        }
        let mut w = self.placed_world(&tool, position)?;
        Ok(Placement::Ran(run_world_path(&mut w, max_time, self.bts)))
    }

    pub fn observe_placement_state_path(
        &mut self,
        toolname: &str,
        position: [f32; 2],
        max_time: f32,
    ) -> Result<Placement<(HashMap<String, Vec<ObjectState>>, RunResult)>> {
        self.check_bounds(position)?;
        let tool = self.tool(toolname)?;
        if check_collision_by_polys(&mut self.world, &tool, position)? {
            return Ok(Placement::Conflict);
        }
        let mut w = self.placed_world(&tool, position)?;
        Ok(Placement::Ran(run_world_state_path(&mut w, max_time, self.bts)))
    }

    pub fn observe_collision_events(
        &mut self,
        toolname: &str,
        position: [f32; 2],
        max_time: f32,
        collision_slop: f32,
    ) -> Result<Placement<(PathMap, Vec<CollisionInterval>, RunResult)>> {
        self.check_bounds(position)?;
        let tool = self.tool(toolname)?;
        if check_collision_by_polys(&mut self.world, &tool, position)? {
            return Ok(Placement::Conflict);
        }
        let mut w = self.placed_world(&tool, position)?;
        Ok(Placement::Ran(run_world_collisions(&mut w, max_time, self.bts, collision_slop)))
    }

    /// Places a tool into the picker's own world permanently. Returns
    /// whether it was placed.
    pub fn place_object(&mut self, toolname: &str, position: [f32; 2]) -> Result<bool> {
        self.check_bounds(position)?;
        let tool = self.tool(toolname)?;
        place_object_by_polys(&mut self.world, &tool, position)
    }

    /// Replaces the picker's world with a perturbed copy of itself.
    pub fn noisify_self<R: Rng + ?Sized>(
        &mut self,
        params: &NoiseParams,
        rng: &mut R,
    ) -> Result<PositionNoiseOutcome> {
        let (nw, outcome) = noisify_world(&self.world, params, rng)?;
        self.world = nw;
        Ok(outcome)
    }

    /// Runs one noisy evaluation from the pristine puzzle descriptor, with
    /// the tool placed after perturbation.
    pub fn run_noisy_placement<R: Rng + ?Sized>(
        &self,
        toolname: &str,
        position: [f32; 2],
        max_time: f32,
        params: &NoiseParams,
        rng: &mut R,
    ) -> Result<Placement<RunResult>> {
        self.check_bounds(position)?;
        let tool = self.tool(toolname)?;
        let pristine = World::from_desc(&self.desc.world)?;
        let (mut nw, _) = noisify_world(&pristine, params, rng)?;
        nw.bts = self.wts;
        if check_collision_by_polys(&mut nw, &tool, position)? {
            return Ok(Placement::Conflict);
        }
        nw.add_compound(PLACED_NAME, &shifted(&tool, position), PLACED_COLOR, None, None, None)?;
        Ok(Placement::Ran(run_world(&mut nw, max_time, self.bts)))
    }

    /// Like `run_noisy_placement`, but perturbs the picker's current world
    /// and records paths, for comparing noisy rollouts to an observation.
    pub fn run_noisy_path<R: Rng + ?Sized>(
        &self,
        toolname: &str,
        position: [f32; 2],
        max_time: f32,
        params: &NoiseParams,
        rng: &mut R,
    ) -> Result<Placement<(PathMap, RunResult)>> {
        self.check_bounds(position)?;
        let tool = self.tool(toolname)?;
        let (mut nw, _) = noisify_world(&self.world, params, rng)?;
        if check_collision_by_polys(&mut nw, &tool, position)? {
            return Ok(Placement::Conflict);
        }
        nw.add_compound(PLACED_NAME, &shifted(&tool, position), PLACED_COLOR, None, None, None)?;
        Ok(Placement::Ran(run_world_path(&mut nw, max_time, self.bts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAME_JSON: &str = r#"{
        "world": {
            "dims": [600.0, 600.0],
            "bts": 0.01,
            "gravity": 200.0,
            "objects": {
                "ball": {"type": "Ball", "position": [250.0, 500.0], "radius": 20.0},
                "cup": {
                    "type": "Container",
                    "points": [[200.0, 100.0], [200.0, 0.0], [300.0, 0.0], [300.0, 100.0]],
                    "width": 10.0,
                    "density": 0.0
                }
            },
            "blocks": {},
            "gcond": {"type": "SpecificInGoal", "goal": "cup", "obj": "ball", "duration": 1.0}
        },
        "tools": {
            "square": [[[-20.0, -20.0], [-20.0, 20.0], [20.0, 20.0], [20.0, -20.0]]]
        }
    }"#;

    fn picker() -> ToolPicker {
        ToolPicker::from_json(GAME_JSON).unwrap()
    }

    #[test]
    fn timesteps_follow_construction() {
        let tp = picker();
        assert_eq!(tp.bts, TRIAL_STEP);
        assert_eq!(tp.wts, WORLD_TIMESTEP);
        assert_eq!(tp.world().bts, WORLD_TIMESTEP);
        assert_eq!(tp.world_dims(), [600.0, 600.0]);
        let names: Vec<&str> = tp.tool_names().collect();
        assert_eq!(names, vec!["square"]);
    }

    #[test]
    fn unknown_tool_is_an_error() {
        let mut tp = picker();
        assert!(matches!(
            tp.check_placement_collide("lever", [100.0, 100.0]),
            Err(WorldError::UnknownTool(_))
        ));
    }

    #[test]
    fn placement_conflict_short_circuits() {
        let mut tp = picker();
        // Over the starting ball.
        assert!(tp.check_placement_collide("square", [250.0, 500.0]).unwrap());
        let run = tp.run_placement("square", [250.0, 500.0], 20.0).unwrap();
        assert_eq!(run, Placement::Conflict);
        let path = tp.observe_placement_path("square", [250.0, 500.0], 20.0).unwrap();
        assert!(matches!(path, Placement::Conflict));
    }

    #[test]
    fn free_spot_runs_the_trial() {
        let mut tp = picker();
        assert!(!tp.check_placement_collide("square", [450.0, 300.0]).unwrap());
        let run = tp.run_placement("square", [450.0, 300.0], 2.0).unwrap();
        let result = run.ran().expect("placement should run");
        assert!(result.elapsed > 0.0);
        // Trial world is disposable; the picker's own world is untouched.
        assert!(tp.world().object(PLACED_NAME).is_err());
    }

    #[test]
    fn place_object_is_permanent_and_exclusive() {
        let mut tp = picker();
        assert!(tp.place_object("square", [450.0, 300.0]).unwrap());
        assert!(tp.world().object(PLACED_NAME).is_ok());
        assert!(!tp.world().object(PLACED_NAME).unwrap().is_static());
        // Same spot is now occupied by the placed tool itself.
        assert!(!tp.place_object("square", [450.0, 300.0]).unwrap());
    }
}
