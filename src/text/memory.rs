use std::collections::HashMap;

use parking_lot::RwLock;

use crate::chunk::DocumentId;

use super::{TextConsumer, TextProvider};

/// One rendering instruction of a stored document
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextPart {
    Fragment(String),
    Heading(String),
    Blanks(u32),
    Section(String),
}

/// Text provider backed by a map of documents, replayed part by part
#[derive(Default)]
pub struct InMemoryTextProvider {
    documents: RwLock<HashMap<DocumentId, Vec<TextPart>>>,
}

impl InMemoryTextProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document made of a single body fragment
    pub fn insert_text(&self, doc_id: DocumentId, text: impl Into<String>) {
        self.insert(doc_id, vec![TextPart::Fragment(text.into())]);
    }

    pub fn insert(&self, doc_id: DocumentId, parts: Vec<TextPart>) {
        self.documents.write().insert(doc_id, parts);
    }

    pub fn remove(&self, doc_id: DocumentId) -> bool {
        self.documents.write().remove(&doc_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

impl TextProvider for InMemoryTextProvider {
    fn render(&self, doc_id: DocumentId, consumer: &mut dyn TextConsumer) -> bool {
        // Clone so the consumer never runs under the map lock
        let parts = match self.documents.read().get(&doc_id) {
            Some(parts) => parts.clone(),
            None => return false,
        };
        for part in &parts {
            match part {
                TextPart::Fragment(text) => consumer.add_fragment(text),
                TextPart::Heading(text) => consumer.add_heading(text),
                TextPart::Blanks(n) => consumer.increment_offset(*n),
                TextPart::Section(name) => consumer.start_section(name),
            }
        }
        true
    }
}
