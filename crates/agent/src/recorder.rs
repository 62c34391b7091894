use std::sync::Arc;

use tracing::warn;

use vendy_core::domain::trace::{TraceSink, TurnTrace};
use vendy_db::repositories::TraceRepository;

/// Persists turn traces and fans them out to in-process observers. Recording
/// never fails the turn: a write error is logged and the reply still goes out.
pub struct TurnRecorder {
    repository: Arc<dyn TraceRepository>,
    observers: Vec<Arc<dyn TraceSink>>,
}

impl TurnRecorder {
    pub fn new(repository: Arc<dyn TraceRepository>) -> Self {
        Self { repository, observers: Vec::new() }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TraceSink>) -> Self {
        self.observers.push(observer);
        self
    }

    pub async fn record(&self, trace: TurnTrace) {
        if let Err(error) = self.repository.append(trace.clone()).await {
            warn!(
                event_name = "trace_append_failed",
                turn_id = %trace.id.0,
                tenant_id = %trace.tenant_id.0,
                error = %error,
                "turn trace was not persisted"
            );
        }
        for observer in &self.observers {
            observer.record(trace.clone());
        }
    }
}
