//! SkillForge: Progress bounded context.
//!
//! Progress is derived from completed challenges and evaluations, so besides
//! its own events the progress handler listens to completions published by
//! the Challenge and Evaluation contexts.

pub mod application;
pub mod domain;
