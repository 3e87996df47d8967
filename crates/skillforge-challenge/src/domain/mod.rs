//! Domain layer for the Challenge context.

pub mod events;
