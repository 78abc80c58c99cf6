use parking_lot::Mutex;
use tracing::warn;

/// Receives human-readable diagnostics about icons that could not be resolved.
///
/// The engine calls `report` at most once per failing icon per generation.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, message: &str);
}

/// Default sink: forwards every diagnostic to `tracing` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, message: &str) {
        warn!(target: "iconsprite", "{}", message);
    }
}

/// Keeps diagnostics in memory so hosts can summarize them after a build.
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

impl<F> DiagnosticSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}
