use crate::workflow::correlation;
use crate::DeploymentId;
use crate::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable tag identifying a payload type for processor lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    RequestReceived,
    MessageReceived,
    FormReplied,
    Datafeed,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::RequestReceived => "request-received",
            EventType::MessageReceived => "message-received",
            EventType::FormReplied => "form-replied",
            EventType::Datafeed => "datafeed",
        };
        f.write_str(name)
    }
}

/// Closed family of payloads a runtime event can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventPayload {
    RequestReceived(RequestReceivedEvent),
    MessageReceived(MessageReceivedEvent),
    FormReplied(FormRepliedEvent),
    /// Envelope whose concrete type is implementation specific; its role is
    /// given by the declared payload it wraps.
    Datafeed(DatafeedEvent),
}

impl EventPayload {
    /// Concrete type of this payload, without normalization.
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::RequestReceived(_) => EventType::RequestReceived,
            EventPayload::MessageReceived(_) => EventType::MessageReceived,
            EventPayload::FormReplied(_) => EventType::FormReplied,
            EventPayload::Datafeed(_) => EventType::Datafeed,
        }
    }

    /// Replaces envelopes by the payload they declare.
    pub fn normalized(self) -> EventPayload {
        match self {
            EventPayload::Datafeed(envelope) => envelope.declared.normalized(),
            other => other,
        }
    }

    /// Correlation message this payload is delivered on.
    pub fn message_name(&self) -> Option<String> {
        match self {
            EventPayload::RequestReceived(event) => Some(correlation::request_received(&event.workflow_id)),
            EventPayload::MessageReceived(event) => event.command().map(correlation::message_received),
            EventPayload::FormReplied(event) => Some(correlation::form_replied(&event.form_id)),
            EventPayload::Datafeed(_) => None,
        }
    }
}

/// Payload types a processor can be bound to.
pub trait TypedPayload: Sized + Send + 'static {
    const EVENT_TYPE: EventType;

    fn from_payload(payload: EventPayload) -> Option<Self>;

    fn into_payload(self) -> EventPayload;
}

/// Internally synthesized when an execution request was authorized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RequestReceivedEvent {
    pub workflow_id: String,
    #[serde(default)]
    pub arguments: HashMap<String, Value>,
    #[serde(default)]
    pub token: Option<String>,
    /// Deployment the request was authorized against; new instances start there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<DeploymentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MessageReceivedEvent {
    pub stream_id: String,
    pub message_id: String,
    pub text: String,
}

impl MessageReceivedEvent {
    /// Leading token of the message, matched against `message-received` triggers.
    pub fn command(&self) -> Option<&str> {
        self.text.split_whitespace().next()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FormRepliedEvent {
    pub form_message_id: String,
    pub form_id: String,
    #[serde(default)]
    pub values: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatafeedEvent {
    /// Implementation-specific leaf type name, informational only.
    pub leaf_type: String,
    pub declared: Box<EventPayload>,
}

macro_rules! typed_payload {
    ($ty:ty, $variant:ident) => {
        impl TypedPayload for $ty {
            const EVENT_TYPE: EventType = EventType::$variant;

            fn from_payload(payload: EventPayload) -> Option<Self> {
                match payload {
                    EventPayload::$variant(event) => Some(event),
                    _ => None,
                }
            }

            fn into_payload(self) -> EventPayload {
                EventPayload::$variant(self)
            }
        }
    };
}

typed_payload!(RequestReceivedEvent, RequestReceived);
typed_payload!(MessageReceivedEvent, MessageReceived);
typed_payload!(FormRepliedEvent, FormReplied);
typed_payload!(DatafeedEvent, Datafeed);

/// User or system entity an event originates from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Initiator {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A typed payload plus the metadata of its delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeEvent<T = EventPayload> {
    #[serde(default)]
    pub initiator: Option<Initiator>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub source: T,
}

impl<T> RuntimeEvent<T> {
    pub fn new(initiator: Option<Initiator>, source: T) -> Self {
        Self {
            initiator,
            timestamp: Utc::now(),
            source,
        }
    }

    /// Event with no originating entity, e.g. a synthesized request.
    pub fn internal(source: T) -> Self {
        Self::new(None, source)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RuntimeEvent<U> {
        RuntimeEvent {
            initiator: self.initiator,
            timestamp: self.timestamp,
            source: f(self.source),
        }
    }
}

impl<T: TypedPayload> RuntimeEvent<T> {
    pub fn erase(self) -> RuntimeEvent<EventPayload> {
        self.map(TypedPayload::into_payload)
    }
}

/// What an instance keeps under the `event` variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventHolder {
    #[serde(default)]
    pub initiator: Option<Initiator>,
    pub source: EventPayload,
    /// Arguments of the execution request, empty for other events.
    #[serde(default)]
    pub args: HashMap<String, Value>,
}

impl EventHolder {
    pub fn from_event(event: &RuntimeEvent<EventPayload>) -> Self {
        let args = match &event.source {
            EventPayload::RequestReceived(request) => request.arguments.clone(),
            _ => HashMap::new(),
        };
        Self {
            initiator: event.initiator.clone(),
            source: event.source.clone(),
            args,
        }
    }
}
