//! SkillForge: User bounded context.
//!
//! Publishes account lifecycle events and keeps user read caches consistent
//! with them.

pub mod application;
pub mod domain;
