//! SkillForge: Challenge bounded context.
//!
//! Challenge lifecycle events (creation, edits, submissions, completion) and
//! the handler that keeps challenge read caches fresh.

pub mod application;
pub mod domain;
