//! Mutable chunk receiving committed documents
//!
//! Postings stay decoded until the chunk fills up and is sealed. Removing a
//! document drops its postings at once; the slot itself is reclaimed when
//! dead slots outnumber live ones.

use std::collections::HashMap;

use tracing::trace;

use super::postings::SlotPostings;
use super::sealed::SealedChunk;
use super::types::{ChunkId, DocInfo, DocSlot, DocumentId, Posting};
use crate::dictionary::TermId;

/// Dead slots tolerated before a compaction is considered
const COMPACT_FLOOR: usize = 64;

/// In-memory chunk for recent commits
#[derive(Debug)]
pub struct OpenChunk {
    id: ChunkId,
    /// Slot to document mapping
    docs: Vec<DocInfo>,
    /// Slots whose document was superseded or deleted
    deleted: Vec<bool>,
    dead_count: usize,
    /// Live document to slot lookup
    slot_of: HashMap<DocumentId, DocSlot>,
    /// Term to postings mapping, slots ascending
    terms: HashMap<TermId, Vec<SlotPostings>>,
    /// Approximate size in bytes
    size_bytes: usize,
}

impl OpenChunk {
    pub fn new(id: ChunkId) -> Self {
        Self {
            id,
            docs: Vec::new(),
            deleted: Vec::new(),
            dead_count: 0,
            slot_of: HashMap::new(),
            terms: HashMap::new(),
            size_bytes: 0,
        }
    }

    pub fn id(&self) -> ChunkId {
        self.id
    }

    /// Add a document version; any live version must be removed first
    pub fn insert(&mut self, info: DocInfo, postings: Vec<Posting>) -> DocSlot {
        debug_assert!(!self.slot_of.contains_key(&info.doc_id));
        let slot = DocSlot(self.docs.len() as u32);

        // Group per term, keeping token order inside each group
        let mut grouped: HashMap<TermId, Vec<u64>> = HashMap::new();
        for posting in postings {
            grouped.entry(posting.term).or_default().push(posting.instance);
        }
        for (term, words) in grouped {
            self.size_bytes += std::mem::size_of::<SlotPostings>() + words.len() * 8;
            self.terms.entry(term).or_default().push((slot, words));
        }

        self.slot_of.insert(info.doc_id, slot);
        self.docs.push(info);
        self.deleted.push(false);
        slot
    }

    /// Drop the live version of a document and its postings
    pub fn remove(&mut self, doc_id: DocumentId) -> bool {
        let slot = match self.slot_of.remove(&doc_id) {
            Some(slot) => slot,
            None => return false,
        };
        if let Some(deleted) = self.deleted.get_mut(slot.as_usize()) {
            *deleted = true;
        }
        self.dead_count += 1;

        let mut freed = 0;
        self.terms.retain(|_, list| {
            if let Ok(idx) = list.binary_search_by_key(&slot, |(s, _)| *s) {
                let (_, words) = list.remove(idx);
                freed += std::mem::size_of::<SlotPostings>() + words.len() * 8;
            }
            !list.is_empty()
        });
        self.size_bytes -= freed;

        if self.dead_count >= COMPACT_FLOOR && self.dead_count > self.slot_of.len() {
            self.compact();
        }
        true
    }

    /// Renumber live slots densely, forgetting dead ones
    fn compact(&mut self) {
        let mut remap: Vec<Option<DocSlot>> = Vec::with_capacity(self.docs.len());
        let mut docs = Vec::with_capacity(self.slot_of.len());
        for (info, &deleted) in std::mem::take(&mut self.docs).into_iter().zip(&self.deleted) {
            if deleted {
                remap.push(None);
            } else {
                remap.push(Some(DocSlot(docs.len() as u32)));
                docs.push(info);
            }
        }

        for slot in self.slot_of.values_mut() {
            if let Some(Some(new)) = remap.get(slot.as_usize()) {
                *slot = *new;
            }
        }
        // Postings of dead slots are already gone, and the remap keeps order
        for list in self.terms.values_mut() {
            for (slot, _) in list.iter_mut() {
                if let Some(Some(new)) = remap.get(slot.as_usize()) {
                    *slot = *new;
                }
            }
        }

        trace!(chunk = self.id.0, reclaimed = self.dead_count, "open chunk compacted");
        self.deleted = vec![false; docs.len()];
        self.docs = docs;
        self.dead_count = 0;
    }

    pub fn contains(&self, doc_id: DocumentId) -> bool {
        self.slot_of.contains_key(&doc_id)
    }

    /// Live postings of a term
    pub fn postings(&self, term: TermId) -> impl Iterator<Item = (&DocInfo, &[u64])> + '_ {
        self.terms
            .get(&term)
            .into_iter()
            .flatten()
            .filter(move |(slot, _)| !self.is_deleted(*slot))
            .filter_map(move |(slot, words)| {
                self.docs
                    .get(slot.as_usize())
                    .map(|info| (info, words.as_slice()))
            })
    }

    pub fn is_deleted(&self, slot: DocSlot) -> bool {
        self.deleted.get(slot.as_usize()).copied().unwrap_or(false)
    }

    /// Number of live documents
    pub fn live_count(&self) -> usize {
        self.slot_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slot_of.is_empty()
    }

    /// Live documents in commit order
    pub fn document_ids(&self) -> Vec<DocumentId> {
        self.docs
            .iter()
            .zip(&self.deleted)
            .filter(|&(_, &deleted)| !deleted)
            .map(|(info, _)| info.doc_id)
            .collect()
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Slots in use, live or dead
    pub fn slot_count(&self) -> usize {
        self.docs.len()
    }

    /// Encode the postings and freeze the chunk
    pub fn seal(self) -> SealedChunk {
        let dead = self
            .deleted
            .iter()
            .enumerate()
            .filter(|&(_, &deleted)| deleted)
            .map(|(slot, _)| slot as u32);
        SealedChunk::build(self.id, self.docs, dead, self.slot_of, self.terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_SECTIONS;

    fn info(doc_id: DocumentId) -> DocInfo {
        DocInfo {
            doc_id,
            section_starts: [None; MAX_SECTIONS],
        }
    }

    fn posting(term: u32, instance: u64) -> Posting {
        Posting {
            term: TermId(term),
            instance,
        }
    }

    #[test]
    fn test_insert_and_postings() {
        let mut chunk = OpenChunk::new(ChunkId(0));
        chunk.insert(info(10), vec![posting(1, 5), posting(2, 6), posting(1, 7)]);
        chunk.insert(info(11), vec![posting(1, 8)]);

        let hits: Vec<(DocumentId, Vec<u64>)> = chunk
            .postings(TermId(1))
            .map(|(info, words)| (info.doc_id, words.to_vec()))
            .collect();
        assert_eq!(hits, vec![(10, vec![5, 7]), (11, vec![8])]);
        assert_eq!(chunk.live_count(), 2);
        assert!(chunk.size_bytes() > 0);
    }

    #[test]
    fn test_remove_hides_postings() {
        let mut chunk = OpenChunk::new(ChunkId(0));
        chunk.insert(info(10), vec![posting(1, 5)]);
        assert!(chunk.remove(10));
        assert!(!chunk.remove(10));
        assert_eq!(chunk.postings(TermId(1)).count(), 0);
        assert!(chunk.is_empty());

        // A new version takes a new slot
        chunk.insert(info(10), vec![posting(1, 9)]);
        let words: Vec<u64> = chunk.postings(TermId(1)).flat_map(|(_, w)| w.to_vec()).collect();
        assert_eq!(words, vec![9]);
        assert_eq!(chunk.document_ids(), vec![10]);
    }

    #[test]
    fn test_seal_keeps_tombstones() {
        let mut chunk = OpenChunk::new(ChunkId(3));
        chunk.insert(info(1), vec![posting(1, 1)]);
        chunk.insert(info(2), vec![posting(1, 2)]);
        chunk.remove(1);

        let sealed = chunk.seal();
        assert_eq!(sealed.id(), ChunkId(3));
        assert!(!sealed.contains(1));
        assert!(sealed.contains(2));
        let hits = sealed.postings(TermId(1)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.doc_id, 2);
    }

    #[test]
    fn test_remove_releases_postings() {
        let mut chunk = OpenChunk::new(ChunkId(0));
        chunk.insert(info(10), vec![posting(1, 5)]);
        let one_version = chunk.size_bytes();
        chunk.insert(info(11), vec![posting(1, 6), posting(2, 7)]);

        assert!(chunk.remove(11));
        assert_eq!(chunk.size_bytes(), one_version);
        assert!(chunk.terms.get(&TermId(2)).is_none());
    }

    #[test]
    fn test_reindexing_one_document_stays_bounded() {
        let mut chunk = OpenChunk::new(ChunkId(0));
        chunk.insert(info(1), vec![posting(1, 1), posting(2, 2)]);
        let one_version = chunk.size_bytes();

        for round in 0..5_000u64 {
            assert!(chunk.remove(1));
            chunk.insert(info(1), vec![posting(1, round), posting(2, round + 1)]);
        }

        assert_eq!(chunk.size_bytes(), one_version);
        assert!(chunk.slot_count() <= COMPACT_FLOOR + 1);
        assert_eq!(chunk.document_ids(), vec![1]);
        let words: Vec<u64> = chunk.postings(TermId(2)).flat_map(|(_, w)| w.to_vec()).collect();
        assert_eq!(words, vec![5_000]);
    }

    #[test]
    fn test_compaction_keeps_slot_order() {
        let mut chunk = OpenChunk::new(ChunkId(0));
        for doc in 0..200u64 {
            chunk.insert(info(doc), vec![posting(1, doc)]);
        }
        for doc in (0..200u64).filter(|d| d % 4 != 0) {
            chunk.remove(doc);
        }

        assert!(chunk.slot_count() < 200);
        let expected: Vec<u64> = (0..200).step_by(4).collect();
        assert_eq!(chunk.document_ids(), expected);
        let hits: Vec<u64> = chunk.postings(TermId(1)).map(|(info, _)| info.doc_id).collect();
        assert_eq!(hits, expected);

        let sealed = chunk.seal();
        assert!(sealed.contains(196));
        assert_eq!(sealed.postings(TermId(1)).unwrap().len(), 50);
    }
}
