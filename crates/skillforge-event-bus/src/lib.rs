//! SkillForge Event Bus: in-process publish/subscribe with dead-letter
//! handling.
//!
//! ```text
//! publish(event)
//!   └─► handler 1 ─► handler 2 ─► ... (sequential, timeout + panic guard each)
//!          │ Err / panic / timeout
//!          └─► DeadLetterService ─► dyn DeadLetterStore (memory | PostgreSQL)
//! ```

pub mod bus;
pub mod config;
pub mod dead_letter;
pub mod history;
pub mod metrics;

pub use bus::{EventBus, PublishReport, RetryFilter, RetrySummary, SubscriptionHandle};
pub use config::EventBusConfig;
pub use dead_letter::{DeadLetterService, DeadLetterStats, InMemoryDeadLetterStore, PgDeadLetterStore};
pub use history::{HandlerOutcome, HistoryEntry, HistoryQuery};
pub use metrics::MetricsSnapshot;
