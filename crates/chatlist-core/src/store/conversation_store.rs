use std::collections::HashMap;

use crate::error::SyncError;
use crate::events::ListSnapshot;
use crate::models::{Conversation, ProfileField};
use crate::search::{name_matches, normalize_query};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First conversation for this partner
    Inserted,
    Replaced,
}

/// Canonical, deduplicated conversation list and its display projections.
///
/// `all` keeps arrival order and is the tie-breaker for equal timestamps. The projections
/// hold positions into `all` and are rebuilt after every mutation.
#[derive(Debug, Default)]
pub struct ConversationStore {
    all: Vec<Conversation>,
    index: HashMap<String, usize>,
    visible: Vec<usize>,
    filtered: Vec<usize>,
    filter_text: String,
    query: Option<String>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Mutations =====

    /// Insert or replace the conversation for `conversation.user.id`.
    pub fn merge(&mut self, conversation: Conversation) -> MergeOutcome {
        let outcome = match self.index.get(conversation.partner_id()) {
            Some(&position) => {
                self.all[position] = conversation;
                MergeOutcome::Replaced
            }
            None => {
                self.index
                    .insert(conversation.partner_id().to_string(), self.all.len());
                self.all.push(conversation);
                MergeOutcome::Inserted
            }
        };
        self.refresh();
        outcome
    }

    /// Remove a partner's conversation from every collection.
    pub fn remove(&mut self, partner_id: &str) -> Option<Conversation> {
        let position = self.index.remove(partner_id)?;
        let removed = self.all.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        self.refresh();
        Some(removed)
    }

    /// Change one profile field of an existing conversation.
    pub fn patch_profile(
        &mut self,
        partner_id: &str,
        field: ProfileField,
        value: Option<String>,
    ) -> Result<(), SyncError> {
        let conversation = self.get_mut(partner_id).ok_or_else(|| SyncError::NotFound {
            partner_id: partner_id.to_string(),
        })?;
        conversation.user.apply_field(field, value);
        self.refresh();
        Ok(())
    }

    /// Replace the active filter. Blank text shows everything.
    pub fn set_filter(&mut self, text: &str) {
        self.filter_text = text.to_string();
        self.query = normalize_query(text);
        self.refresh_filtered();
    }

    /// Rebuild both projections. Needed after changes made through `get_mut`.
    pub fn refresh(&mut self) {
        let mut order: Vec<usize> = (0..self.all.len()).collect();
        order.sort_by(|a, b| {
            self.all[*b]
                .message
                .timestamp
                .cmp(&self.all[*a].message.timestamp)
        });
        self.visible = order;
        self.refresh_filtered();
    }

    fn refresh_filtered(&mut self) {
        self.filtered = match &self.query {
            Some(query) => self
                .visible
                .iter()
                .copied()
                .filter(|&i| name_matches(self.all[i].user.name.as_deref(), query))
                .collect(),
            None => self.visible.clone(),
        };
    }

    // ===== Queries =====

    pub fn get(&self, partner_id: &str) -> Option<&Conversation> {
        self.index.get(partner_id).map(|&i| &self.all[i])
    }

    pub fn get_mut(&mut self, partner_id: &str) -> Option<&mut Conversation> {
        let position = *self.index.get(partner_id)?;
        self.all.get_mut(position)
    }

    pub fn contains(&self, partner_id: &str) -> bool {
        self.index.contains_key(partner_id)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Canonical collection in arrival order
    pub fn conversations(&self) -> &[Conversation] {
        &self.all
    }

    pub fn visible(&self) -> Vec<&Conversation> {
        self.visible.iter().map(|&i| &self.all[i]).collect()
    }

    pub fn filtered(&self) -> Vec<&Conversation> {
        self.filtered.iter().map(|&i| &self.all[i]).collect()
    }

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    pub fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            visible: self.visible().into_iter().cloned().collect(),
            filtered: self.filtered().into_iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMetaData, Message, UserProfile};

    fn make_test_conversation(partner: &str, name: Option<&str>, timestamp: i64) -> Conversation {
        let mut user = UserProfile::new(partner);
        user.name = name.map(str::to_string);
        let message = Message {
            id: format!("msg-{}-{}", partner, timestamp),
            from_id: partner.to_string(),
            to_id: Some("me".to_string()),
            text: Some("hi".to_string()),
            image_url: None,
            video_url: None,
            voice_data: None,
            timestamp,
            seen: Some(true),
        };
        Conversation::new(user, message, Some(ChatMetaData::default()))
    }

    fn visible_ids(store: &ConversationStore) -> Vec<&str> {
        store.visible().into_iter().map(|c| c.partner_id()).collect()
    }

    #[test]
    fn test_merge_inserts_then_replaces() {
        let mut store = ConversationStore::new();
        assert_eq!(
            store.merge(make_test_conversation("a", Some("Ann"), 100)),
            MergeOutcome::Inserted
        );
        assert_eq!(
            store.merge(make_test_conversation("a", Some("Ann"), 300)),
            MergeOutcome::Replaced
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").map(|c| c.message.timestamp), Some(300));
    }

    #[test]
    fn test_visible_sorted_descending_with_stable_ties() {
        let mut store = ConversationStore::new();
        store.merge(make_test_conversation("a", None, 100));
        store.merge(make_test_conversation("b", None, 200));
        store.merge(make_test_conversation("c", None, 100));
        assert_eq!(visible_ids(&store), vec!["b", "a", "c"]);

        // Replacing keeps the arrival position
        store.merge(make_test_conversation("a", None, 100));
        assert_eq!(visible_ids(&store), vec!["b", "a", "c"]);

        store.merge(make_test_conversation("c", None, 500));
        assert_eq!(visible_ids(&store), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_filter_preserves_sort() {
        let mut store = ConversationStore::new();
        store.merge(make_test_conversation("j1", Some("John"), 300));
        store.merge(make_test_conversation("m", Some("Mary"), 200));
        store.merge(make_test_conversation("j2", Some("Joanna"), 100));
        store.merge(make_test_conversation("x", None, 400));

        store.set_filter("jo");
        let names: Vec<_> = store
            .filtered()
            .into_iter()
            .map(|c| c.user.name.clone().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["John", "Joanna"]);
        assert_eq!(store.filter_text(), "jo");
        assert_eq!(visible_ids(&store), vec!["x", "j1", "m", "j2"]);

        store.set_filter("");
        assert_eq!(store.filtered().len(), 4);
    }

    #[test]
    fn test_filter_matches_raw_text() {
        let mut store = ConversationStore::new();
        store.merge(make_test_conversation("j1", Some("John"), 300));
        store.merge(make_test_conversation("mj", Some("Mary Jones"), 200));

        store.set_filter(" jo");
        assert_eq!(store.filtered().len(), 1);
        assert_eq!(store.filtered()[0].partner_id(), "mj");

        store.set_filter("  ");
        assert!(store.filtered().is_empty());
    }

    #[test]
    fn test_filter_reapplied_after_merge() {
        let mut store = ConversationStore::new();
        store.set_filter("MA");
        store.merge(make_test_conversation("m", Some("Mary"), 1));
        store.merge(make_test_conversation("j", Some("John"), 2));
        assert_eq!(store.filtered().len(), 1);
        assert_eq!(store.snapshot().filtered[0].partner_id(), "m");
    }

    #[test]
    fn test_remove_updates_index_and_projections() {
        let mut store = ConversationStore::new();
        store.merge(make_test_conversation("a", Some("Ann"), 1));
        store.merge(make_test_conversation("b", Some("Bob"), 2));
        store.merge(make_test_conversation("c", Some("Cid"), 3));

        assert!(store.remove("a").is_some());
        assert!(store.remove("a").is_none());
        assert!(!store.contains("a"));
        assert_eq!(store.get("c").map(|c| c.partner_id()), Some("c"));
        assert_eq!(visible_ids(&store), vec!["c", "b"]);
        assert_eq!(store.filtered().len(), 2);
    }

    #[test]
    fn test_patch_profile() {
        let mut store = ConversationStore::new();
        store.merge(make_test_conversation("a", Some("Ann"), 1));
        store.set_filter("zed");
        assert!(store.filtered().is_empty());

        store
            .patch_profile("a", ProfileField::Name, Some("Zed".to_string()))
            .unwrap();
        assert_eq!(store.filtered().len(), 1);

        assert_eq!(
            store.patch_profile("missing", ProfileField::Name, None),
            Err(SyncError::NotFound {
                partner_id: "missing".to_string()
            })
        );
    }
}
