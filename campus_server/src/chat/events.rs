//! Websocket frames. Both directions use `{"event": "<name>", "data": {...}}`.

use campus_core::ids::{AttachmentId, ChannelId, MessageId, NotificationId, UserId};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    /// Decodes the payload. A missing or null `data` reads as `{}`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let data = match &self.data {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };
        serde_json::from_value(data)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinChat {
    #[serde(default, alias = "friendId")]
    pub friend_id: Option<UserId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Typing {
    #[serde(default)]
    pub recipient_id: Option<UserId>,
    /// Relayed as sent, e.g. `"start"` or `"stop"`.
    #[serde(default)]
    pub status: Value,
}

#[derive(Debug, Deserialize)]
pub struct DirectMessage {
    pub recipient_id: UserId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentId>,
    #[serde(default)]
    pub temp_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct GroupMessage {
    pub channel_id: ChannelId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentId>,
    #[serde(default)]
    pub temp_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ReadMessages {
    pub message_ids: Vec<MessageId>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMessage {
    pub message_id: MessageId,
}

#[derive(Debug, Deserialize)]
pub struct MarkNotificationsRead {
    pub notification_ids: Vec<NotificationId>,
}

/// An event queued for one connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerEvent {
    pub event: &'static str,
    pub data: Value,
}

impl ServerEvent {
    pub fn new(event: &'static str, data: &impl Serialize) -> Self {
        Self {
            event,
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }
}
