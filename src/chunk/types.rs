//! Core types for the chunked posting store

use serde::{Deserialize, Serialize};

use crate::config::MAX_SECTIONS;
use crate::dictionary::TermId;
use crate::error::Result;
use crate::tokenizer::{unpack_instance, GrammarTag, Position};

/// Caller-supplied document identifier
pub type DocumentId = u64;

/// Sequence number of a chunk, starting at zero
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId(pub u32);

impl ChunkId {
    pub fn next(self) -> Self {
        ChunkId(self.0 + 1)
    }
}

/// Slot of a document version inside one chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocSlot(pub u32);

impl DocSlot {
    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Per-document data kept alongside postings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocInfo {
    pub doc_id: DocumentId,
    /// Character offset of each section's first text in the rendered document
    pub section_starts: [Option<u32>; MAX_SECTIONS],
}

impl DocInfo {
    pub fn section_start(&self, section: u8) -> u32 {
        self.section_starts
            .get(section as usize)
            .copied()
            .flatten()
            .unwrap_or(0)
    }
}

/// One occurrence of a lexeme before it is committed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Posting {
    pub term: TermId,
    /// Packed instance word, see [`crate::tokenizer::pack_instance`]
    pub instance: u64,
}

/// An occurrence of a queried term inside a document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceOffset {
    /// Offset within the token's section
    pub offset: u32,
    /// Offset within the whole rendered document
    pub normalized_offset: u32,
    pub section: u8,
    pub sentence: u16,
    pub order: u16,
    /// Dictionary id of the base lexeme
    pub base: TermId,
    pub grammar: GrammarTag,
}

impl InstanceOffset {
    pub(crate) fn decode(word: u64, base: TermId, doc: &DocInfo) -> Result<Self> {
        let (position, sentence, order) = unpack_instance(word)?;
        let section = position.section_id();
        Ok(Self {
            offset: position.offset(),
            normalized_offset: doc.section_start(section) + position.offset(),
            section,
            sentence,
            order,
            base,
            grammar: position.grammar(),
        })
    }

    pub fn position(&self) -> Position {
        Position::new(self.offset, self.section).with_grammar(self.grammar)
    }
}

/// All instances of a queried term in one document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub doc_id: DocumentId,
    /// Instances in token order
    pub instances: Vec<InstanceOffset>,
}

/// Notification that a chunk filled up (or was closed) and is now sealed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkCompleted {
    pub chunk: ChunkId,
    /// Documents finalized in the chunk, in commit order
    pub documents: Vec<DocumentId>,
}
