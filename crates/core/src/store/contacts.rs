use std::sync::Arc;

use crate::types::{Contact, MessageTemplates};

use super::{KvStore, StoreResult};

pub const CONTACTS_KEY: &str = "contacts";
pub const DISCONNECT_TEMPLATE_KEY: &str = "disconnect_template";
pub const CONNECT_TEMPLATE_KEY: &str = "connect_template";

/// Typed access to the contact list and templates on top of a [`KvStore`].
///
/// Loads never fail: missing or unreadable records yield the defaults and the
/// problem is logged.
#[derive(Clone)]
pub struct ContactStore {
    kv: Arc<dyn KvStore>,
    defaults: MessageTemplates,
}

impl ContactStore {
    pub fn new(kv: Arc<dyn KvStore>, defaults: MessageTemplates) -> Self {
        Self { kv, defaults }
    }

    pub fn backend(&self) -> &str {
        self.kv.name()
    }

    pub async fn load_contacts(&self) -> Vec<Contact> {
        match self.kv.get(CONTACTS_KEY).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(list) => list,
                Err(e) => {
                    tracing::warn!(error = %e, "stored contact list is not valid JSON, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, backend = self.kv.name(), "failed to load contacts");
                Vec::new()
            }
        }
    }

    pub async fn save_contacts(&self, contacts: &[Contact]) -> StoreResult<()> {
        let json = serde_json::to_string(contacts)?;
        self.kv.put(CONTACTS_KEY, &json).await
    }

    pub async fn load_templates(&self) -> MessageTemplates {
        let disconnect = self.load_or(DISCONNECT_TEMPLATE_KEY, &self.defaults.disconnect).await;
        let connect = self.load_or(CONNECT_TEMPLATE_KEY, &self.defaults.connect).await;
        MessageTemplates { disconnect, connect }
    }

    pub async fn save_templates(&self, templates: &MessageTemplates) -> StoreResult<()> {
        self.kv
            .put_many(&[
                (DISCONNECT_TEMPLATE_KEY, templates.disconnect.as_str()),
                (CONNECT_TEMPLATE_KEY, templates.connect.as_str()),
            ])
            .await
    }

    async fn load_or(&self, key: &str, default: &str) -> String {
        match self.kv.get(key).await {
            Ok(Some(v)) => v,
            Ok(None) => default.to_owned(),
            Err(e) => {
                tracing::warn!(error = %e, key, "failed to load template, using default");
                default.to_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, MemoryStore};

    fn defaults() -> MessageTemplates {
        MessageTemplates { disconnect: "Corte Energia ".into(), connect: "Energia restaurada ".into() }
    }

    fn contact(name: &str, phone: &str) -> Contact {
        Contact { name: name.into(), address: phone.into() }
    }

    #[tokio::test]
    async fn absent_data_yields_defaults() {
        let store = ContactStore::new(Arc::new(MemoryStore::new()), defaults());
        assert!(store.load_contacts().await.is_empty());
        assert_eq!(store.load_templates().await, defaults());
    }

    #[tokio::test]
    async fn contacts_round_trip_keeps_order_and_duplicates() {
        let store = ContactStore::new(Arc::new(MemoryStore::new()), defaults());
        let list = vec![
            contact("Alice", "+111"),
            contact("Bob", "+222"),
            contact("Alice", "+111"),
        ];
        store.save_contacts(&list).await.unwrap();
        assert_eq!(store.load_contacts().await, list);
    }

    #[tokio::test]
    async fn empty_list_round_trips() {
        let store = ContactStore::new(Arc::new(MemoryStore::new()), defaults());
        store.save_contacts(&[contact("Alice", "+111")]).await.unwrap();
        store.save_contacts(&[]).await.unwrap();
        assert!(store.load_contacts().await.is_empty());
    }

    #[tokio::test]
    async fn templates_round_trip_through_file() {
        let tmp = tempfile::tempdir().unwrap();
        let kv: Arc<dyn KvStore> = Arc::new(FileStore::new(tmp.path().join("state.json")));
        let store = ContactStore::new(kv, defaults());
        let t = MessageTemplates { disconnect: "Se fue la luz ".into(), connect: "".into() };
        store.save_templates(&t).await.unwrap();
        assert_eq!(store.load_templates().await, t);
    }

    #[tokio::test]
    async fn corrupt_contacts_fall_back_to_empty() {
        let kv = Arc::new(MemoryStore::new());
        kv.put(CONTACTS_KEY, "[{\"name\":").await.unwrap();
        let store = ContactStore::new(kv, defaults());
        assert!(store.load_contacts().await.is_empty());
    }
}
