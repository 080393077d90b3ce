//! Broadcast chat registry.

use chrono::Utc;
use tracing::info;

use crate::database::Store;
use crate::error::Result;
use crate::models::{BroadcastChat, ChatId};

impl Store {
    /// Register a chat for announcements.  Returns false when the chat id
    /// (or handle) is already registered and active.  Saves immediately.
    pub async fn add_broadcast_chat(
        &self,
        chat_id: ChatId,
        username: Option<String>,
        title: Option<String>,
    ) -> Result<bool> {
        let mut inner = self.lock().await;
        let duplicate = inner.doc.broadcast_chats.iter().any(|c| {
            c.active
                && (c.chat_id == chat_id
                    || (username.is_some() && c.username == username))
        });
        if duplicate {
            return Ok(false);
        }

        inner.doc.broadcast_chats.push(BroadcastChat {
            chat_id,
            username,
            title,
            added_at: Utc::now(),
            active: true,
            removed_at: None,
        });
        self.persist(&mut inner)?;
        info!(chat = chat_id, "broadcast chat added");
        Ok(true)
    }

    /// Soft-remove a chat from the broadcast list.  Returns false when the
    /// chat is unknown or already inactive.  Saves immediately.
    pub async fn remove_broadcast_chat(&self, chat_id: ChatId) -> Result<bool> {
        let mut inner = self.lock().await;
        let Some(chat) = inner
            .doc
            .broadcast_chats
            .iter_mut()
            .find(|c| c.chat_id == chat_id && c.active)
        else {
            return Ok(false);
        };
        chat.active = false;
        chat.removed_at = Some(Utc::now());
        self.persist(&mut inner)?;
        info!(chat = chat_id, "broadcast chat removed");
        Ok(true)
    }

    /// Active broadcast chats.
    pub async fn broadcast_chats(&self) -> Vec<BroadcastChat> {
        self.lock()
            .await
            .doc
            .broadcast_chats
            .iter()
            .filter(|c| c.active)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_remove_and_dedupe() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_at(&dir.path().join("store.json")).unwrap();

        assert!(store
            .add_broadcast_chat(-100, Some("announcements".to_string()), None)
            .await
            .unwrap());
        // Same id is a duplicate even with a different handle.
        assert!(!store
            .add_broadcast_chat(-100, Some("renamed".to_string()), None)
            .await
            .unwrap());
        // Same handle is a duplicate even with a different id.
        assert!(!store
            .add_broadcast_chat(-200, Some("announcements".to_string()), None)
            .await
            .unwrap());

        assert_eq!(store.broadcast_chats().await.len(), 1);

        assert!(store.remove_broadcast_chat(-100).await.unwrap());
        assert!(store.broadcast_chats().await.is_empty());
        assert!(!store.remove_broadcast_chat(-100).await.unwrap());

        // The id can be registered again after a soft removal.
        assert!(store.add_broadcast_chat(-100, None, None).await.unwrap());
    }
}
