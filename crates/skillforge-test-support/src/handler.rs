//! `EventHandler` doubles with observable behavior.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use skillforge_core::event::DomainEvent;
use skillforge_core::handler::{EventHandler, HandlerError};

/// Ordered log of `(handler name, phase)` entries shared between handlers so
/// tests can assert invocation order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// A handler that records every event it receives and always succeeds.
#[derive(Debug)]
pub struct RecordingHandler {
    name: String,
    events: Mutex<Vec<DomainEvent>>,
    log: Option<CallLog>,
}

impl RecordingHandler {
    /// Create a recording handler.
    #[must_use]
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            events: Mutex::new(Vec::new()),
            log: None,
        })
    }

    /// Create a recording handler that appends `"<name>:start"` and
    /// `"<name>:end"` to a shared log around a yield point.
    #[must_use]
    pub fn with_log(name: &str, log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            events: Mutex::new(Vec::new()),
            log: Some(log),
        })
    }

    /// Snapshot of received events.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of received events.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        if let Some(log) = &self.log {
            log.lock().unwrap().push(format!("{}:start", self.name));
        }
        tokio::task::yield_now().await;
        self.events.lock().unwrap().push(event.clone());
        if let Some(log) = &self.log {
            log.lock().unwrap().push(format!("{}:end", self.name));
        }
        Ok(())
    }
}

/// A handler that always returns an execution error.
#[derive(Debug)]
pub struct FailingHandler {
    name: String,
    calls: AtomicU32,
}

impl FailingHandler {
    /// Create a failing handler.
    #[must_use]
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            calls: AtomicU32::new(0),
        })
    }

    /// Number of invocations.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventHandler for FailingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _event: &DomainEvent) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(HandlerError::execution(format!("{} is broken", self.name)))
    }
}

/// A handler whose outcome can be flipped between failing and succeeding.
#[derive(Debug)]
pub struct ToggleHandler {
    name: String,
    failing: AtomicBool,
    calls: AtomicU32,
}

impl ToggleHandler {
    /// Create a handler that starts out failing.
    #[must_use]
    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            failing: AtomicBool::new(true),
            calls: AtomicU32::new(0),
        })
    }

    /// Switch between failing and succeeding.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of invocations.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventHandler for ToggleHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _event: &DomainEvent) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(HandlerError::execution("downstream unavailable"))
        } else {
            Ok(())
        }
    }
}

/// A handler that sleeps before succeeding.
#[derive(Debug)]
pub struct SlowHandler {
    name: String,
    delay: Duration,
}

impl SlowHandler {
    /// Create a handler that sleeps for `delay`.
    #[must_use]
    pub fn new(name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            delay,
        })
    }
}

#[async_trait]
impl EventHandler for SlowHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _event: &DomainEvent) -> Result<(), HandlerError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// A handler that panics.
#[derive(Debug)]
pub struct PanickingHandler;

#[async_trait]
impl EventHandler for PanickingHandler {
    fn name(&self) -> &str {
        "panicking_handler"
    }

    async fn handle(&self, _event: &DomainEvent) -> Result<(), HandlerError> {
        panic!("handler blew up");
    }
}
