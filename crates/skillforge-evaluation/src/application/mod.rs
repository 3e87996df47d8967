//! Application layer for the Evaluation context.

pub mod event_handlers;
