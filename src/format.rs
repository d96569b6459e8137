//! Serialization boundary: the JSON descriptor layout for worlds, blockers,
//! goal conditions, and tool catalogs. Key names mirror the interchange
//! format consumed by the scripted physics backends
//! (`dims`/`bts`/`gravity`/`defaults`/`objects`/`blocks`/`gcond`), so
//! descriptors round-trip verbatim.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_DENSITY: f32 = 1.0;
pub const DEFAULT_ELASTICITY: f32 = 0.5;
pub const DEFAULT_FRICTION: f32 = 0.5;

/// RGBA color. Deserializes from either a component array or one of the
/// small set of color names used by the puzzle files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Color(pub [u8; 4]);

pub const DEFAULT_COLOR: Color = Color([0, 0, 0, 255]);
pub const DEFAULT_GOAL_COLOR: Color = Color([0, 255, 0, 255]);
pub const BACKGROUND_COLOR: Color = Color([255, 255, 255, 255]);

impl Color {
    pub fn from_name(name: &str) -> Option<Color> {
        let rgba = match name.to_ascii_lowercase().as_str() {
            "blue" => [0, 0, 255, 255],
            "red" => [255, 0, 0, 255],
            "green" => [0, 255, 0, 255],
            "black" => [0, 0, 0, 255],
            "white" => [255, 255, 255, 255],
            "grey" | "gray" => [127, 127, 127, 255],
            "lightgrey" | "lightgray" => [191, 191, 191, 255],
            "none" => [0, 0, 0, 0],
            _ => return None,
        };
        Some(Color(rgba))
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Components(Vec<u8>),
        }
        match Repr::deserialize(de)? {
            Repr::Name(n) => {
                Color::from_name(&n).ok_or_else(|| de::Error::custom(format!("color name not known: {n}")))
            }
            Repr::Components(c) => match c.len() {
                3 => Ok(Color([c[0], c[1], c[2], 255])),
                4 => Ok(Color([c[0], c[1], c[2], c[3]])),
                n => Err(de::Error::custom(format!("color needs 3 or 4 components, got {n}"))),
            },
        }
    }
}

/// Per-object material attributes; absent fields fall back to the world
/// defaults at load time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialDesc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friction: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectDesc {
    Poly {
        vertices: Vec<[f32; 2]>,
        #[serde(flatten)]
        material: MaterialDesc,
    },
    Ball {
        position: [f32; 2],
        radius: f32,
        #[serde(flatten)]
        material: MaterialDesc,
    },
    Segment {
        p1: [f32; 2],
        p2: [f32; 2],
        width: f32,
        #[serde(flatten)]
        material: MaterialDesc,
    },
    Container {
        points: Vec<[f32; 2]>,
        width: f32,
        #[serde(default, rename = "innerColor", skip_serializing_if = "Option::is_none")]
        inner_color: Option<Color>,
        #[serde(default, rename = "outerColor", skip_serializing_if = "Option::is_none")]
        outer_color: Option<Color>,
        #[serde(flatten)]
        material: MaterialDesc,
    },
    Compound {
        polys: Vec<Vec<[f32; 2]>>,
        #[serde(flatten)]
        material: MaterialDesc,
    },
    Goal {
        vertices: Vec<[f32; 2]>,
        #[serde(flatten)]
        material: MaterialDesc,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDesc {
    pub vertices: Vec<[f32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

fn dash() -> String {
    "-".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GoalDesc {
    AnyInGoal {
        goal: String,
        #[serde(default = "dash")]
        obj: String,
        #[serde(default)]
        exclusions: Vec<String>,
        duration: f32,
    },
    SpecificInGoal {
        goal: String,
        obj: String,
        duration: f32,
    },
    ManyInGoal {
        goal: String,
        objlist: Vec<String>,
        duration: f32,
    },
    AnyTouch {
        goal: String,
        #[serde(default = "dash")]
        obj: String,
        duration: f32,
    },
    /// `goal` and `obj` name the two touching objects.
    SpecificTouch {
        goal: String,
        obj: String,
        duration: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsDesc {
    pub density: f32,
    pub friction: f32,
    pub elasticity: f32,
    pub color: Color,
    pub bk_color: Color,
}

impl Default for DefaultsDesc {
    fn default() -> Self {
        DefaultsDesc {
            density: DEFAULT_DENSITY,
            friction: DEFAULT_FRICTION,
            elasticity: DEFAULT_ELASTICITY,
            color: DEFAULT_COLOR,
            bk_color: BACKGROUND_COLOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldDesc {
    pub dims: [f32; 2],
    pub bts: f32,
    pub gravity: f32,
    #[serde(default)]
    pub defaults: DefaultsDesc,
    #[serde(default)]
    pub objects: BTreeMap<String, ObjectDesc>,
    #[serde(default)]
    pub blocks: BTreeMap<String, BlockDesc>,
    #[serde(default)]
    pub gcond: Option<GoalDesc>,
}

/// A puzzle: a world plus the catalog of placeable tools. Each tool is a
/// list of closed polygon loops in the tool's local frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolGameDesc {
    pub world: WorldDesc,
    pub tools: BTreeMap<String, Vec<Vec<[f32; 2]>>>,
}
