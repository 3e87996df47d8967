//! Application layer for the User context.

pub mod event_handlers;
