//! Win conditions. A condition watches the collision callbacks from the
//! world and reports how long its success predicate has held.

use crate::format::GoalDesc;
use std::collections::BTreeMap;

/// The success predicate attached to a world. In-goal variants listen to
/// sensor enter/exit callbacks; touch variants listen to solid contacts.
#[derive(Debug, Clone, PartialEq)]
pub enum GoalCondition {
    /// Won when any non-excluded object has stayed in the goal region
    /// for `duration` seconds. `entries` maps each object currently
    /// inside to the time it first entered.
    AnyInGoal {
        goal: String,
        exclusions: Vec<String>,
        duration: f32,
        entries: BTreeMap<String, f32>,
    },
    /// Won when one named object has stayed in the goal for `duration`.
    SpecificInGoal {
        goal: String,
        obj: String,
        duration: f32,
        since: Option<f32>,
    },
    /// Won when at least one object from `objlist` has been in the goal
    /// continuously for `duration`.
    ManyInGoal {
        goal: String,
        objlist: Vec<String>,
        duration: f32,
        inside: Vec<String>,
        since: Option<f32>,
    },
    /// Won when the named object has been touching anything for `duration`.
    AnyTouch {
        goal: String,
        duration: f32,
        since: Option<f32>,
    },
    /// Won when the two named objects have been touching for `duration`.
    SpecificTouch {
        goal: String,
        obj: String,
        duration: f32,
        since: Option<f32>,
    },
}

impl GoalCondition {
    pub fn from_desc(desc: &GoalDesc) -> GoalCondition {
        match desc.clone() {
            GoalDesc::AnyInGoal { goal, obj: _, exclusions, duration } => GoalCondition::AnyInGoal {
                goal,
                exclusions,
                duration,
                entries: BTreeMap::new(),
            },
            GoalDesc::SpecificInGoal { goal, obj, duration } => {
                GoalCondition::SpecificInGoal { goal, obj, duration, since: None }
            }
            GoalDesc::ManyInGoal { goal, objlist, duration } => GoalCondition::ManyInGoal {
                goal,
                objlist,
                duration,
                inside: Vec::new(),
                since: None,
            },
            GoalDesc::AnyTouch { goal, obj: _, duration } => {
                GoalCondition::AnyTouch { goal, duration, since: None }
            }
            GoalDesc::SpecificTouch { goal, obj, duration } => {
                GoalCondition::SpecificTouch { goal, obj, duration, since: None }
            }
        }
    }

    pub fn to_desc(&self) -> GoalDesc {
        match self {
            GoalCondition::AnyInGoal { goal, exclusions, duration, .. } => GoalDesc::AnyInGoal {
                goal: goal.clone(),
                obj: "-".to_string(),
                exclusions: exclusions.clone(),
                duration: *duration,
            },
            GoalCondition::SpecificInGoal { goal, obj, duration, .. } => GoalDesc::SpecificInGoal {
                goal: goal.clone(),
                obj: obj.clone(),
                duration: *duration,
            },
            GoalCondition::ManyInGoal { goal, objlist, duration, .. } => GoalDesc::ManyInGoal {
                goal: goal.clone(),
                objlist: objlist.clone(),
                duration: *duration,
            },
            GoalCondition::AnyTouch { goal, duration, .. } => GoalDesc::AnyTouch {
                goal: goal.clone(),
                obj: "-".to_string(),
                duration: *duration,
            },
            GoalCondition::SpecificTouch { goal, obj, duration, .. } => GoalDesc::SpecificTouch {
                goal: goal.clone(),
                obj: obj.clone(),
                duration: *duration,
            },
        }
    }

    /// Names of the goal region / objects this condition refers to, so the
    /// world can validate them before attaching.
    pub fn referenced_names(&self) -> Vec<&str> {
        match self {
            GoalCondition::AnyInGoal { goal, .. } => vec![goal],
            GoalCondition::SpecificInGoal { goal, obj, .. } => vec![goal, obj],
            GoalCondition::ManyInGoal { goal, objlist, .. } => {
                let mut v: Vec<&str> = vec![goal];
                v.extend(objlist.iter().map(String::as_str));
                v
            }
            GoalCondition::AnyTouch { goal, .. } => vec![goal],
            GoalCondition::SpecificTouch { goal, obj, .. } => vec![goal, obj],
        }
    }

    /// Whether this condition needs a goal sensor region (as opposed to
    /// watching solid contacts).
    pub fn uses_goal_region(&self) -> bool {
        matches!(
            self,
            GoalCondition::AnyInGoal { .. }
                | GoalCondition::SpecificInGoal { .. }
                | GoalCondition::ManyInGoal { .. }
        )
    }

    pub fn on_sensor_begin(&mut self, obj: &str, sensor: &str, now: f32) {
        match self {
            GoalCondition::AnyInGoal { goal, exclusions, entries, .. } => {
                if sensor == goal && !exclusions.iter().any(|e| e == obj) {
                    // Re-entry without an intervening exit keeps the first time.
                    entries.entry(obj.to_string()).or_insert(now);
                }
            }
            GoalCondition::SpecificInGoal { goal, obj: target, since, .. } => {
                if sensor == goal && obj == target {
                    *since = Some(now);
                }
            }
            GoalCondition::ManyInGoal { goal, objlist, inside, since, .. } => {
                if sensor == goal
                    && objlist.iter().any(|o| o == obj)
                    && !inside.iter().any(|o| o == obj)
                {
                    inside.push(obj.to_string());
                    if inside.len() == 1 {
                        *since = Some(now);
                    }
                }
            }
            _ => {}
        }
    }

    /// `still_inside` is whether the object's center is still within the
    /// goal region; grazing exits where it is do not count as leaving.
    pub fn on_sensor_end(&mut self, obj: &str, sensor: &str, still_inside: bool) {
        match self {
            GoalCondition::AnyInGoal { goal, entries, .. } => {
                if sensor == goal && !still_inside {
                    entries.remove(obj);
                }
            }
            GoalCondition::SpecificInGoal { goal, obj: target, since, .. } => {
                if sensor == goal && obj == target && !still_inside {
                    *since = None;
                }
            }
            GoalCondition::ManyInGoal { goal, inside, since, .. } => {
                if sensor == goal {
                    inside.retain(|o| o != obj);
                    if inside.is_empty() {
                        *since = None;
                    }
                }
            }
            _ => {}
        }
    }

    pub fn on_solid_begin(&mut self, a: &str, b: &str, now: f32) {
        match self {
            GoalCondition::AnyTouch { goal, since, .. } => {
                if a == goal || b == goal {
                    *since = Some(now);
                }
            }
            GoalCondition::SpecificTouch { goal, obj, since, .. } => {
                if (a == goal && b == obj) || (a == obj && b == goal) {
                    *since = Some(now);
                }
            }
            _ => {}
        }
    }

    pub fn on_solid_end(&mut self, a: &str, b: &str) {
        match self {
            GoalCondition::AnyTouch { goal, since, .. } => {
                if a == goal || b == goal {
                    *since = None;
                }
            }
            GoalCondition::SpecificTouch { goal, obj, since, .. } => {
                if (a == goal && b == obj) || (a == obj && b == goal) {
                    *since = None;
                }
            }
            _ => {}
        }
    }

    /// The time the current success streak started, if one is running.
    pub fn satisfied_since(&self, now: f32) -> Option<f32> {
        match self {
            GoalCondition::AnyInGoal { entries, .. } => entries
                .values()
                .fold(None, |acc: Option<f32>, &t| Some(acc.map_or(t, |a| a.min(t))))
                .map(|t| t.min(now)),
            GoalCondition::SpecificInGoal { since, .. }
            | GoalCondition::ManyInGoal { since, .. }
            | GoalCondition::AnyTouch { since, .. }
            | GoalCondition::SpecificTouch { since, .. } => *since,
        }
    }

    /// Seconds of continuous satisfaction still needed before the trial is
    /// won, or `None` when the predicate does not currently hold.
    pub fn remaining_time(&self, now: f32) -> Option<f32> {
        let since = self.satisfied_since(now)?;
        let dur = match self {
            GoalCondition::AnyInGoal { duration, .. }
            | GoalCondition::SpecificInGoal { duration, .. }
            | GoalCondition::ManyInGoal { duration, .. }
            | GoalCondition::AnyTouch { duration, .. }
            | GoalCondition::SpecificTouch { duration, .. } => *duration,
        };
        Some((dur - (now - since)).max(0.0))
    }

    pub fn is_won(&self, now: f32) -> bool {
        self.remaining_time(now) == Some(0.0)
    }
}
