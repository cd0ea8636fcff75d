//! In-process broadcast bus for pipeline events.
//!
//! Publishing never blocks and never fails. Subscribers attach and detach independently of any
//! run; one that falls behind skips the missed events and is never replayed.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, error, info, warn};

use crate::error::PipelineError;
use crate::pipeline::Stage;
use crate::telemetry::events::{EventLevel, PipelineEvent};

pub const DEFAULT_BUS_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to every current subscriber and mirror to `tracing`.
    pub fn publish(&self, event: PipelineEvent) {
        mirror_to_tracing(&event);
        // No receivers is not an error.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
            request_id: None,
            skipped: 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn emitter(&self, request_id: impl Into<String>) -> EventEmitter {
        EventEmitter {
            bus: self.clone(),
            request_id: Arc::from(request_id.into()),
        }
    }
}

fn mirror_to_tracing(event: &PipelineEvent) {
    let request_id = event.request_id.as_str();
    let stage = event.stage.as_str();
    match event.level {
        EventLevel::Info => info!(request_id, stage, "{}", event.message),
        EventLevel::Warn => warn!(request_id, stage, "{}", event.message),
        EventLevel::Error => error!(
            request_id,
            stage,
            error_kind = event.error_kind.map(|k| k.as_str()).unwrap_or("unknown"),
            "{}",
            event.message
        ),
    }
}

/// Receiving end of the bus, optionally filtered to one request.
pub struct EventSubscriber {
    receiver: broadcast::Receiver<PipelineEvent>,
    request_id: Option<String>,
    skipped: u64,
}

impl EventSubscriber {
    pub fn for_request(bus: &EventBus, request_id: impl Into<String>) -> Self {
        let mut subscriber = bus.subscribe();
        subscriber.request_id = Some(request_id.into());
        subscriber
    }

    fn accepts(&self, event: &PipelineEvent) -> bool {
        self.request_id
            .as_deref()
            .map_or(true, |id| event.request_id == id)
    }

    /// Next matching event; `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    self.skipped += missed;
                    debug!(missed, "Event subscriber lagged; skipping missed events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already buffered, without waiting.
    pub fn try_recv(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(missed)) => self.skipped += missed,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain every buffered matching event.
    pub fn drain(&mut self) -> Vec<PipelineEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Events this subscriber lost by lagging.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

/// Publishing handle bound to a single request id.
#[derive(Clone)]
pub struct EventEmitter {
    bus: EventBus,
    request_id: Arc<str>,
}

impl EventEmitter {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn emit(&self, stage: Stage, level: EventLevel, message: impl Into<String>) {
        self.bus.publish(PipelineEvent::with_now(
            self.request_id.as_ref(),
            stage,
            level,
            message,
        ));
    }

    pub fn emit_with_data(
        &self,
        stage: Stage,
        level: EventLevel,
        message: impl Into<String>,
        data: Value,
    ) {
        self.bus.publish(
            PipelineEvent::with_now(self.request_id.as_ref(), stage, level, message)
                .with_data(data),
        );
    }

    pub fn info(&self, stage: Stage, message: impl Into<String>) {
        self.emit(stage, EventLevel::Info, message);
    }

    pub fn warn(&self, stage: Stage, message: impl Into<String>) {
        self.emit(stage, EventLevel::Warn, message);
    }

    pub fn failure(&self, failed_stage: Stage, error: &PipelineError) {
        self.bus.publish(PipelineEvent::failure(
            self.request_id.as_ref(),
            failed_stage,
            error,
        ));
    }
}
