//! Telemetry domain: typed pipeline events, the broadcast bus, and request ids.

mod types;

pub mod bus;
pub mod events;

pub use bus::{EventBus, EventEmitter, EventSubscriber, DEFAULT_BUS_CAPACITY};
pub use events::{EventLevel, PipelineEvent};
pub use types::{new_request_id, now_millis, now_rfc3339};
