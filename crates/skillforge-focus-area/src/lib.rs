//! SkillForge: Focus Area bounded context.
//!
//! Focus areas are the skills a user has chosen to practise. Selecting one
//! changes which challenges are recommended to that user.

pub mod application;
pub mod domain;
