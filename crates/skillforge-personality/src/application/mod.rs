//! Application layer for the Personality context.

pub mod event_handlers;
