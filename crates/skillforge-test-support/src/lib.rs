//! Shared test doubles for the SkillForge backend.

mod cache;
mod clock;
mod dead_letter;
mod handler;

pub use cache::FailingCacheProvider;
pub use clock::{FixedClock, fixed_time};
pub use dead_letter::FailingDeadLetterStore;
pub use handler::{
    CallLog, FailingHandler, PanickingHandler, RecordingHandler, SlowHandler, ToggleHandler,
};

use serde_json::Value;
use skillforge_core::event::{DomainEvent, EventType};

/// Build an event stamped with [`fixed_time`].
///
/// # Panics
///
/// Panics if `data` lacks the entity identifier for `event_type`.
#[must_use]
pub fn test_event(event_type: EventType, data: Value) -> DomainEvent {
    DomainEvent::new(event_type, data, &FixedClock(fixed_time()))
        .expect("test event payload must carry an entity identifier")
}
