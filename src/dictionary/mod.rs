//! Term dictionary: bidirectional mapping between lexeme text and integer ids
//!
//! The indexing pipeline and the context reconstructor receive the
//! dictionary as an explicitly owned handle (`Arc<dyn TermDictionary>`).
//! [`TrieTermDictionary`] is the file-backed implementation.

mod trie;
mod wildcard;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use trie::TrieTermDictionary;
pub use wildcard::{literal_prefix, wildcard_regex};

/// Dictionary id of a lexeme
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermId(pub u32);

impl TermId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "term_{}", self.0)
    }
}

/// Contract the indexing pipeline and context reconstruction depend on.
///
/// Ids are stable for the lifetime of the dictionary but need not be
/// contiguous. Storage faults surface as [`crate::IndexError::DataFormat`];
/// every call after [`TermDictionary::dispose`] fails with
/// [`crate::IndexError::Disposed`].
pub trait TermDictionary: Send + Sync {
    /// Get the id of `term`, creating it on first use
    fn intern(&self, term: &str) -> Result<TermId>;

    /// Get the id of an exact term
    fn lookup(&self, term: &str) -> Result<Option<TermId>>;

    /// Get the text of an id
    fn resolve(&self, id: TermId) -> Result<Option<String>>;

    /// All terms matching a `*`/`?` pattern
    fn match_wildcard(&self, pattern: &str) -> Result<BTreeSet<String>>;

    /// Store an irregular surface form of `base`, returning its variant index,
    /// or `None` when the base has no free variant slot
    fn intern_variant(&self, base: TermId, surface: &str) -> Result<Option<u8>>;

    /// Get an irregular surface form stored by [`TermDictionary::intern_variant`]
    fn resolve_variant(&self, base: TermId, index: u8) -> Result<Option<String>>;

    /// Persist everything interned so far
    fn flush(&self) -> Result<()>;

    /// Release the dictionary; safe to call more than once
    fn dispose(&self);
}
