//! Route modules.

pub mod dlq;
pub mod events;
pub mod health;
