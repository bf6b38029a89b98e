use serde_json::Value;

use crate::config::StoreSchema;
use crate::error::SyncError;
use crate::remote::StorePath;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub name: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Profile fields that are followed after the first resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Name,
    ThumbnailUrl,
}

impl ProfileField {
    /// Map a changed child key to a followed field; other keys are ignored.
    pub fn from_key(key: &str, schema: &StoreSchema) -> Option<Self> {
        if key == schema.name_field {
            Some(Self::Name)
        } else if key == schema.thumbnail_url_field {
            Some(Self::ThumbnailUrl)
        } else {
            None
        }
    }
}

impl UserProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            thumbnail_url: None,
        }
    }

    /// Decode `users/{id}`. A missing record means the partner cannot be shown yet.
    pub fn from_value(
        id: &str,
        path: &StorePath,
        value: &Value,
        schema: &StoreSchema,
    ) -> Result<Self, SyncError> {
        if value.is_null() {
            return Err(SyncError::NotFound {
                partner_id: id.to_string(),
            });
        }
        let Some(map) = value.as_object() else {
            return Err(SyncError::malformed(path, "profile record is not an object"));
        };

        let text = |field: &str| map.get(field).and_then(Value::as_str).map(str::to_string);

        Ok(Self {
            id: id.to_string(),
            name: text(&schema.name_field),
            thumbnail_url: text(&schema.thumbnail_url_field),
        })
    }

    pub fn apply_field(&mut self, field: ProfileField, value: Option<String>) {
        match field {
            ProfileField::Name => self.name = value,
            ProfileField::ThumbnailUrl => self.thumbnail_url = value,
        }
    }
}
