//! SkillForge: Evaluation bounded context.
//!
//! An evaluation scores one user's submission to one challenge, so its
//! events fan out to evaluation, challenge and per-user caches.

pub mod application;
pub mod domain;
