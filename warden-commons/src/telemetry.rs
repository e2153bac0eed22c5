use anyhow::Result;
use parking_lot::Mutex;

/// A lightweight sink used to record events emitted by warden components.
/// The `Event` type is generic so each component can define its own schema
/// (the trust broker emits decision events, for example).
pub trait TelemetrySink<Event>: Send + Sync {
    /// Record an event produced by the component.
    fn record(&self, event: &Event) -> Result<()>;

    /// Flush any buffered telemetry data to its destination.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// A telemetry sink that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl<Event> TelemetrySink<Event> for NoopTelemetry {
    fn record(&self, _event: &Event) -> Result<()> {
        Ok(())
    }
}

/// Collects events in arrival order.
#[derive(Debug)]
pub struct MemoryTelemetry<Event> {
    events: Mutex<Vec<Event>>,
}

impl<Event> Default for MemoryTelemetry<Event> {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }
}

impl<Event: Clone> MemoryTelemetry<Event> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl<Event: Clone + Send> TelemetrySink<Event> for MemoryTelemetry<Event> {
    fn record(&self, event: &Event) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
