//! Error taxonomy for world construction, mutation, and trial evaluation.
//!
//! Configuration problems (duplicate names, malformed bounds, unknown
//! descriptor types) and invalid operations (mutating a static body, kicking
//! outside an object) are fatal and surface here. Placement conflicts and
//! noise saturation are normal outcomes, not errors; see
//! [`crate::toolpicker::Placement`] and [`crate::noise::PositionNoiseOutcome`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorldError>;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("name already taken: {0}")]
    DuplicateName(String),

    #[error("no object by that name: {0}")]
    UnknownObject(String),

    #[error("no tool by that name: {0}")]
    UnknownTool(String),

    #[error("malformed world dimensions: {width}x{height}")]
    BadBounds { width: f32, height: f32 },

    #[error("bad geometry for {name}: {reason}")]
    BadGeometry { name: String, reason: String },

    #[error("cannot {op} static object {name}")]
    StaticObject { name: String, op: &'static str },

    #[error("impulse point ({x}, {y}) lies outside object {name}")]
    KickOutsideObject { name: String, x: f32, y: f32 },

    #[error("position ({x}, {y}) is outside the world bounds")]
    OutOfBounds { x: f32, y: f32 },

    #[error("a goal condition must be attached before calling {0}")]
    NoGoalCondition(&'static str),

    #[error("world descriptor error: {0}")]
    Format(#[from] serde_json::Error),
}
