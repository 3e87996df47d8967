//! Domain layer for the Focus Area context.

pub mod events;
