//! SkillForge: Personality bounded context.

pub mod application;
pub mod domain;
