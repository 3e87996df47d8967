//! Application layer for the Focus Area context.

pub mod event_handlers;
