//! Domain layer for the Evaluation context.

pub mod events;
