//! Immutable chunk with encoded postings
//!
//! Sealed chunks never change their postings; deletes and superseded
//! versions are recorded in a roaring bitmap of dead slots and filtered at
//! query time.

use std::collections::HashMap;

use parking_lot::RwLock;
use roaring::RoaringBitmap;

use super::postings::{decode_postings, encode_postings, SlotPostings};
use super::types::{ChunkId, DocInfo, DocSlot, DocumentId};
use crate::dictionary::TermId;
use crate::error::{IndexError, Result};

pub struct SealedChunk {
    id: ChunkId,
    docs: Vec<DocInfo>,
    /// Documents live when the chunk was sealed
    slot_of: HashMap<DocumentId, DocSlot>,
    terms: HashMap<TermId, Vec<u8>>,
    deleted: RwLock<RoaringBitmap>,
    size_bytes: usize,
}

impl SealedChunk {
    pub(crate) fn build(
        id: ChunkId,
        docs: Vec<DocInfo>,
        dead: impl Iterator<Item = u32>,
        slot_of: HashMap<DocumentId, DocSlot>,
        terms: HashMap<TermId, Vec<SlotPostings>>,
    ) -> Self {
        let terms: HashMap<TermId, Vec<u8>> = terms
            .into_iter()
            .map(|(term, list)| (term, encode_postings(&list)))
            .collect();
        let size_bytes = terms.values().map(Vec::len).sum();
        Self {
            id,
            docs,
            slot_of,
            terms,
            deleted: RwLock::new(dead.collect()),
            size_bytes,
        }
    }

    pub fn id(&self) -> ChunkId {
        self.id
    }

    /// Tombstone a document; returns false if it was not live here
    pub fn delete(&self, doc_id: DocumentId) -> bool {
        match self.slot_of.get(&doc_id) {
            Some(slot) => self.deleted.write().insert(slot.as_u32()),
            None => false,
        }
    }

    pub fn contains(&self, doc_id: DocumentId) -> bool {
        match self.slot_of.get(&doc_id) {
            Some(slot) => !self.deleted.read().contains(slot.as_u32()),
            None => false,
        }
    }

    /// Decode the live postings of a term
    pub fn postings(&self, term: TermId) -> Result<Vec<(&DocInfo, Vec<u64>)>> {
        let bytes = match self.terms.get(&term) {
            Some(bytes) => bytes,
            None => return Ok(Vec::new()),
        };
        let deleted = self.deleted.read();
        let mut hits = Vec::new();
        for (slot, words) in decode_postings(bytes)? {
            if deleted.contains(slot.as_u32()) {
                continue;
            }
            let info = self.docs.get(slot.as_usize()).ok_or_else(|| {
                IndexError::data_format(format!(
                    "posting for slot {} beyond {} documents in chunk {}",
                    slot.0,
                    self.docs.len(),
                    self.id.0
                ))
            })?;
            hits.push((info, words));
        }
        Ok(hits)
    }

    pub fn live_count(&self) -> usize {
        let deleted = self.deleted.read();
        self.slot_of
            .values()
            .filter(|slot| !deleted.contains(slot.as_u32()))
            .count()
    }

    pub fn document_count(&self) -> usize {
        self.docs.len()
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}
