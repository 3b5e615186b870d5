/**
 * Group Event System
 *
 * Events pushed to a group's subscribers after the pipeline changes what
 * that group's history looks like. Delivery is best-effort: an event is sent
 * once, after the commit it describes, to whoever is subscribed at that time.
 */
use crate::shared::error::SharedError;
use crate::shared::message::MessageRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of group event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A message was committed to the group
    Message,
    /// A message was soft-deleted
    MessageDeleted,
}

impl EventType {
    /// SSE event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::MessageDeleted => "message_deleted",
        }
    }
}

/// Event broadcast to the subscribers of one group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupEvent {
    pub event_type: EventType,
    pub group_id: Uuid,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl GroupEvent {
    /// Event carrying a freshly committed record
    pub fn message(record: &MessageRecord) -> Result<Self, SharedError> {
        Ok(Self {
            event_type: EventType::Message,
            group_id: record.group_id,
            payload: serde_json::to_value(record)?,
            timestamp: Utc::now(),
        })
    }

    /// Event announcing that a message was soft-deleted
    pub fn message_deleted(group_id: Uuid, message_id: Uuid) -> Self {
        Self {
            event_type: EventType::MessageDeleted,
            group_id,
            payload: serde_json::json!({ "id": message_id }),
            timestamp: Utc::now(),
        }
    }
}
