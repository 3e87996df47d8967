//! SkillForge Core: shared event-bus, dead-letter and cache abstractions.
//!
//! This crate defines the fundamental traits and types that the event bus,
//! the cache layer and every domain registrar depend on. It contains no
//! infrastructure code.

pub mod cache;
pub mod clock;
pub mod dead_letter;
pub mod error;
pub mod event;
pub mod handler;
