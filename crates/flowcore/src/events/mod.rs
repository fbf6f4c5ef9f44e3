// crates/flowcore/src/events/mod.rs

mod base;
mod payload;

pub use base::{AuditEvent, AuditSink, AuditSinks, EventBus, LogAuditSink};
pub use payload::{
    DatafeedEvent, EventHolder, EventPayload, EventType, FormRepliedEvent, Initiator,
    MessageReceivedEvent, RequestReceivedEvent, RuntimeEvent, TypedPayload,
};
