use std::sync::{PoisonError, RwLock};

use crate::types::{Contact, MessageTemplates, NotificationKind};

/// Contacts and templates shared by the controller, scheduler and UIs.
///
/// Readers get owned snapshots; no lock is held past the call.
#[derive(Debug)]
pub struct AppState {
    contacts: RwLock<Vec<Contact>>,
    templates: RwLock<MessageTemplates>,
}

impl AppState {
    pub fn new(contacts: Vec<Contact>, templates: MessageTemplates) -> Self {
        Self { contacts: RwLock::new(contacts), templates: RwLock::new(templates) }
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.contacts.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn has_contacts(&self) -> bool {
        self.contact_count() > 0
    }

    pub fn templates(&self) -> MessageTemplates {
        self.templates.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn replace_contacts(&self, contacts: Vec<Contact>) {
        *self.contacts.write().unwrap_or_else(PoisonError::into_inner) = contacts;
    }

    pub fn replace_templates(&self, templates: MessageTemplates) {
        *self.templates.write().unwrap_or_else(PoisonError::into_inner) = templates;
    }

    /// Append a contact; returns the new list.
    pub fn push_contact(&self, contact: Contact) -> Vec<Contact> {
        let mut list = self.contacts.write().unwrap_or_else(PoisonError::into_inner);
        list.push(contact);
        list.clone()
    }

    /// Remove by position; returns the removed contact and the new list.
    pub fn remove_contact(&self, index: usize) -> Option<(Contact, Vec<Contact>)> {
        let mut list = self.contacts.write().unwrap_or_else(PoisonError::into_inner);
        if index >= list.len() {
            return None;
        }
        let removed = list.remove(index);
        Some((removed, list.clone()))
    }

    /// Replace one template; returns the new pair.
    pub fn set_template(&self, kind: NotificationKind, text: impl Into<String>) -> MessageTemplates {
        let mut t = self.templates.write().unwrap_or_else(PoisonError::into_inner);
        t.set(kind, text);
        t.clone()
    }
}
