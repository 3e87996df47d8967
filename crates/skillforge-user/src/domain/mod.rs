//! Domain layer for the User context.

pub mod events;
