//! Trial evaluation for tool-placement physics puzzles: 2D worlds described
//! by JSON descriptors, win conditions over goal regions and contacts,
//! deterministic rollouts, and noisy re-simulation for modeling work.

pub mod condition;
pub mod error;
pub mod events;
pub mod format;
pub mod geom;
pub mod noise;
pub mod object;
pub mod sim;
mod space;
pub mod toolpicker;
pub mod world;

// Curated re-exports
pub use condition::GoalCondition;
pub use error::{Result, WorldError};
pub use events::{
    coalesce_events, CollisionInterval, ContactInfo, ContactPhase, RawCollisionEvent,
    DEFAULT_COLLISION_SLOP,
};
pub use format::{
    BlockDesc, Color, DefaultsDesc, GoalDesc, MaterialDesc, ObjectDesc, ToolGameDesc, WorldDesc,
};
pub use noise::{noisify_world, trunc_norm, wrapped_norm, NoiseParams, PositionNoiseOutcome};
pub use object::{ObjectKind, SceneObject};
pub use sim::{
    run_world, run_world_collisions, run_world_collisions_with_kicks, run_world_path,
    run_world_state_path, KickSpec, ObjectState, PathMap, RunResult, DEFAULT_MAX_TIME,
    DEFAULT_RUN_SLOP, DEFAULT_STEP_SIZE,
};
pub use toolpicker::{
    check_collision_by_polys, place_object_by_polys, Placement, ToolPicker, PLACED_NAME,
    TRIAL_STEP, WORLD_TIMESTEP,
};
pub use world::{World, DEFAULT_BASIC_TIMESTEP};
