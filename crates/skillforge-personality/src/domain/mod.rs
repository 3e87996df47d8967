//! Domain layer for the Personality context.

pub mod events;
