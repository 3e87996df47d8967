//! Application layer for the Progress context.

pub mod event_handlers;
