//! In-process session state: the ordered message list and the single
//! optional document-context slot. Persistence happens one layer up; this
//! store only holds the live copy for the process lifetime.

use crate::types::{DocumentContext, Message};

#[derive(Default)]
pub struct SessionStore {
    messages: Vec<Message>,
    document: Option<DocumentContext>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Append a message and return the new sequence. The previous sequence
    /// is not mutated in place, so state-driven UI layers can diff against
    /// the copy they already hold.
    pub fn append(&mut self, message: Message) -> Vec<Message> {
        let mut next = self.messages.clone();
        next.push(message);
        self.messages = next.clone();
        next
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.document = None;
    }

    pub fn document(&self) -> Option<&DocumentContext> {
        self.document.as_ref()
    }

    pub fn set_document(&mut self, document: DocumentContext) {
        self.document = Some(document);
    }

    pub fn clear_document(&mut self) {
        self.document = None;
    }
}
