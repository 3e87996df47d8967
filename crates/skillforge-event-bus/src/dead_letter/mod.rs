//! Dead-letter queue: the service the bus records failures through and the
//! stores behind it.

pub mod memory;
pub mod postgres;
pub mod service;

pub use memory::InMemoryDeadLetterStore;
pub use postgres::PgDeadLetterStore;
pub use service::{DeadLetterService, DeadLetterStats, EntryLock};
