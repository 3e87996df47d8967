//! Domain layer for the Progress context.

pub mod events;
