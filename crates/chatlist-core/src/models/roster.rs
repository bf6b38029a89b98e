use serde_json::Value;

use crate::remote::Snapshot;

/// Membership record: a conversation with `partner_id` exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub partner_id: String,
}

impl RosterEntry {
    /// Build from a roster child snapshot. Entries without a key are ignored.
    pub fn from_snapshot(snapshot: &Snapshot) -> Option<Self> {
        if snapshot.key.is_empty() {
            return None;
        }
        Some(Self {
            partner_id: snapshot.key.clone(),
        })
    }
}

/// Most recent message id in a pointer folder `{messageId: true, ...}`.
pub fn latest_pointer(value: &Value) -> Option<String> {
    value.as_object()?.keys().max().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_snapshot() {
        let entry = RosterEntry::from_snapshot(&Snapshot::new("bob", json!({}))).unwrap();
        assert_eq!(entry.partner_id, "bob");
        assert!(RosterEntry::from_snapshot(&Snapshot::new("", json!(true))).is_none());
    }

    #[test]
    fn test_latest_pointer() {
        assert_eq!(
            latest_pointer(&json!({"m1": true, "m3": true, "m2": true})),
            Some("m3".to_string())
        );
        assert_eq!(latest_pointer(&Value::Null), None);
        assert_eq!(latest_pointer(&json!({})), None);
    }
}
