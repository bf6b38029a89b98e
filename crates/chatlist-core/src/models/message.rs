use serde::Deserialize;
use serde_json::{Number, Value};

use crate::constants::{PREVIEW_AUDIO, PREVIEW_IMAGE, PREVIEW_VIDEO};
use crate::error::SyncError;
use crate::remote::StorePath;

/// Raw message record as stored under `messages/{id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRecord {
    from_id: Option<String>,
    to_id: Option<String>,
    text: Option<String>,
    image_url: Option<String>,
    video_url: Option<String>,
    voice_data: Option<String>,
    timestamp: Option<Number>,
    seen: Option<bool>,
}

/// What a message carries, as summarized in the conversation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub from_id: String,
    /// Recipient, when the record names one
    pub to_id: Option<String>,
    pub text: Option<String>,
    pub image_url: Option<String>,
    /// Videos also carry `image_url` as their poster frame
    pub video_url: Option<String>,
    pub voice_data: Option<String>,
    pub timestamp: i64,
    pub seen: Option<bool>,
}

impl Message {
    /// Decode the record stored at `path`. `fromId` and `timestamp` are required.
    pub fn from_value(id: &str, path: &StorePath, value: &Value) -> Result<Self, SyncError> {
        if !value.is_object() {
            return Err(SyncError::malformed(path, "message record is not an object"));
        }

        let record: MessageRecord = serde_json::from_value(value.clone())
            .map_err(|e| SyncError::malformed(path, e.to_string()))?;

        let from_id = record
            .from_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SyncError::malformed(path, "missing fromId"))?;

        let timestamp = record
            .timestamp
            .and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)))
            .ok_or_else(|| SyncError::malformed(path, "missing timestamp"))?;

        Ok(Self {
            id: id.to_string(),
            from_id,
            to_id: record.to_id.filter(|id| !id.is_empty()),
            text: record.text,
            image_url: record.image_url,
            video_url: record.video_url,
            voice_data: record.voice_data,
            timestamp,
            seen: record.seen,
        })
    }

    /// The participant that is not the current user.
    ///
    /// Messages sent by the current user name the partner in `to_id`; when a record omits it,
    /// the partner of the roster entry the message was reached through is used.
    pub fn chat_partner_id(&self, current_user_id: &str, context_partner_id: &str) -> String {
        if self.from_id == current_user_id {
            self.to_id
                .clone()
                .unwrap_or_else(|| context_partner_id.to_string())
        } else {
            self.from_id.clone()
        }
    }

    /// Explicitly unseen and sent by someone else.
    pub fn is_unread_for(&self, current_user_id: &str) -> bool {
        self.seen == Some(false) && self.from_id != current_user_id
    }

    pub fn kind(&self) -> MessageKind {
        match (&self.image_url, &self.video_url) {
            (Some(_), None) => MessageKind::Image,
            (Some(_), Some(_)) => MessageKind::Video,
            _ if self.voice_data.is_some() => MessageKind::Audio,
            _ => MessageKind::Text,
        }
    }

    pub fn preview(&self) -> String {
        match self.kind() {
            MessageKind::Image => PREVIEW_IMAGE.to_string(),
            MessageKind::Video => PREVIEW_VIDEO.to_string(),
            MessageKind::Audio => PREVIEW_AUDIO.to_string(),
            MessageKind::Text => self.text.clone().unwrap_or_default(),
        }
    }
}
