//! Application layer for the Challenge context.

pub mod event_handlers;
