use serde_json::Value;

use crate::error::SyncError;
use crate::remote::StorePath;

/// Per-conversation metadata for the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChatMetaData {
    /// Unread messages in this conversation
    pub badge_count: u32,
}

impl ChatMetaData {
    /// Decode the metadata record. An absent record is `Ok(None)`; an absent badge field is zero.
    pub fn from_value(
        path: &StorePath,
        value: &Value,
        badge_field: &str,
    ) -> Result<Option<Self>, SyncError> {
        if value.is_null() {
            return Ok(None);
        }
        let Some(map) = value.as_object() else {
            return Err(SyncError::malformed(path, "metadata record is not an object"));
        };

        let badge_count = match map.get(badge_field) {
            None | Some(Value::Null) => 0,
            Some(raw) => raw
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    SyncError::malformed(path, format!("{} is not a non-negative integer", badge_field))
                })?,
        };

        Ok(Some(Self { badge_count }))
    }
}
