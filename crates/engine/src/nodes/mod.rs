//! The three non-worker graph nodes: `coordinator`, `planner`, `supervisor`.
//! Each worker node is just a [`crate::worker::Worker`] instance driven by
//! the roster; these three are singular, so they get their own module
//! instead of a roster entry.

pub mod coordinator;
pub mod planner;
pub mod supervisor;

pub const HANDOFF_TOKEN: &str = "handoff_to_planner";
