//! File-backed term trie using an FST (Finite State Transducer)
//!
//! Flushed terms live in an FST map `term -> id`; terms interned since the
//! last flush sit in a sorted overlay until the next flush rebuilds the FST.
//!
//! File layout:
//! - 4-byte magic `OTRI`
//! - u32 format version (little endian)
//! - u32 crc32 of the payload
//! - payload: bincode of [`TrieImage`]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use fst::automaton::{Automaton, Str};
use fst::{IntoStreamer, Map, MapBuilder, Streamer};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::wildcard::{literal_prefix, wildcard_regex};
use super::{TermDictionary, TermId};
use crate::error::{IndexError, Result};
use crate::tokenizer::MAX_VARIANTS;

const MAGIC: [u8; 4] = *b"OTRI";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 12;

/// Serialized body of the trie file
#[derive(Serialize, Deserialize)]
struct TrieImage {
    fst: Vec<u8>,
    next_id: u32,
    variants: Vec<(u32, u8, String)>,
}

struct TrieState {
    fst: Map<Vec<u8>>,
    pending: BTreeMap<String, TermId>,
    names: HashMap<TermId, String>,
    variants: HashMap<TermId, Vec<String>>,
    next_id: u32,
    dirty: bool,
}

impl TrieState {
    fn empty() -> Result<Self> {
        Ok(Self {
            fst: build_fst(std::iter::empty())?,
            pending: BTreeMap::new(),
            names: HashMap::new(),
            variants: HashMap::new(),
            next_id: 0,
            dirty: false,
        })
    }

    fn from_image(image: TrieImage) -> Result<Self> {
        let fst = Map::new(image.fst).map_err(|e| IndexError::data_format(e.to_string()))?;

        let mut names = HashMap::with_capacity(fst.len());
        let mut stream = fst.stream();
        while let Some((key, value)) = stream.next() {
            if value >= image.next_id as u64 {
                return Err(IndexError::data_format(format!(
                    "term id {} beyond next id {}",
                    value, image.next_id
                )));
            }
            let term = std::str::from_utf8(key)
                .map_err(|e| IndexError::data_format(e.to_string()))?
                .to_string();
            names.insert(TermId(value as u32), term);
        }
        drop(stream);

        let mut variants: HashMap<TermId, Vec<String>> = HashMap::new();
        for (base, index, surface) in image.variants {
            let base = TermId(base);
            if !names.contains_key(&base) {
                return Err(IndexError::data_format(format!(
                    "wordform variant for unknown {}",
                    base
                )));
            }
            let slots = variants.entry(base).or_default();
            if index as usize != slots.len() || index >= MAX_VARIANTS {
                return Err(IndexError::data_format(format!(
                    "wordform variant {} of {} out of sequence",
                    index, base
                )));
            }
            slots.push(surface);
        }

        Ok(Self {
            fst,
            pending: BTreeMap::new(),
            names,
            variants,
            next_id: image.next_id,
            dirty: false,
        })
    }

    fn lookup(&self, term: &str) -> Option<TermId> {
        self.pending
            .get(term)
            .copied()
            .or_else(|| self.fst.get(term.as_bytes()).map(|id| TermId(id as u32)))
    }

    /// Fold the overlay into a fresh FST
    fn compact(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut merged: BTreeMap<String, u64> = BTreeMap::new();
        let mut stream = self.fst.stream();
        while let Some((key, value)) = stream.next() {
            let term = std::str::from_utf8(key)
                .map_err(|e| IndexError::data_format(e.to_string()))?;
            merged.insert(term.to_string(), value);
        }
        drop(stream);
        for (term, id) in std::mem::take(&mut self.pending) {
            merged.insert(term, id.0 as u64);
        }
        self.fst = build_fst(merged.into_iter())?;
        Ok(())
    }

    fn image(&self) -> TrieImage {
        let mut variants = Vec::new();
        for (base, slots) in &self.variants {
            for (index, surface) in slots.iter().enumerate() {
                variants.push((base.0, index as u8, surface.clone()));
            }
        }
        variants.sort();
        TrieImage {
            fst: self.fst.as_fst().as_bytes().to_vec(),
            next_id: self.next_id,
            variants,
        }
    }
}

/// Build an FST from terms in lexicographic order
fn build_fst<I>(terms: I) -> Result<Map<Vec<u8>>>
where
    I: Iterator<Item = (String, u64)>,
{
    let mut builder = MapBuilder::memory();
    for (term, id) in terms {
        builder
            .insert(term.as_bytes(), id)
            .map_err(|e| IndexError::Internal(e.to_string()))?;
    }
    let bytes = builder
        .into_inner()
        .map_err(|e| IndexError::Internal(e.to_string()))?;
    Map::new(bytes).map_err(|e| IndexError::data_format(e.to_string()))
}

fn encode_file(image: &TrieImage) -> Result<Vec<u8>> {
    let payload = bincode::serialize(image)?;
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&payload);

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&hasher.finalize().to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

fn decode_file(bytes: &[u8]) -> Result<TrieImage> {
    if bytes.len() < HEADER_LEN || bytes[..4] != MAGIC {
        return Err(IndexError::data_format("term trie header is missing"));
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != FORMAT_VERSION {
        return Err(IndexError::data_format(format!(
            "unsupported term trie version {}",
            version
        )));
    }
    let stored_crc = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let payload = &bytes[HEADER_LEN..];
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    if hasher.finalize() != stored_crc {
        return Err(IndexError::data_format("term trie checksum mismatch"));
    }
    bincode::deserialize(payload).map_err(|e| IndexError::data_format(e.to_string()))
}

/// Persistent term dictionary stored in a single named file
pub struct TrieTermDictionary {
    path: Option<PathBuf>,
    state: RwLock<Option<TrieState>>,
}

impl TrieTermDictionary {
    /// Open the trie file at `path`; a missing file starts an empty dictionary
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let bytes = fs::read(&path)?;
            let state = decode_file(&bytes)
                .and_then(TrieState::from_image)
                .map_err(|e| {
                    warn!(path = %path.display(), error = %e, "term trie is corrupt");
                    e
                })?;
            info!(path = %path.display(), terms = state.names.len(), "term trie loaded");
            state
        } else {
            TrieState::empty()?
        };
        Ok(Self {
            path: Some(path),
            state: RwLock::new(Some(state)),
        })
    }

    /// Dictionary that is never written to disk
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            path: None,
            state: RwLock::new(Some(TrieState::empty()?)),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of lexemes
    pub fn len(&self) -> Result<usize> {
        self.read(|state| Ok(state.names.len()))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn is_disposed(&self) -> bool {
        self.state.read().is_none()
    }

    fn read<T>(&self, f: impl FnOnce(&TrieState) -> Result<T>) -> Result<T> {
        let guard = self.state.read();
        match guard.as_ref() {
            Some(state) => f(state),
            None => Err(IndexError::Disposed),
        }
    }

    fn write<T>(&self, f: impl FnOnce(&mut TrieState) -> Result<T>) -> Result<T> {
        let mut guard = self.state.write();
        match guard.as_mut() {
            Some(state) => f(state),
            None => Err(IndexError::Disposed),
        }
    }
}

impl TermDictionary for TrieTermDictionary {
    fn intern(&self, term: &str) -> Result<TermId> {
        if let Some(id) = self.lookup(term)? {
            return Ok(id);
        }
        self.write(|state| {
            if let Some(id) = state.lookup(term) {
                return Ok(id);
            }
            let id = TermId(state.next_id);
            state.next_id = state
                .next_id
                .checked_add(1)
                .ok_or_else(|| IndexError::data_format("term id space exhausted"))?;
            state.pending.insert(term.to_string(), id);
            state.names.insert(id, term.to_string());
            state.dirty = true;
            Ok(id)
        })
    }

    fn lookup(&self, term: &str) -> Result<Option<TermId>> {
        self.read(|state| Ok(state.lookup(term)))
    }

    fn resolve(&self, id: TermId) -> Result<Option<String>> {
        self.read(|state| Ok(state.names.get(&id).cloned()))
    }

    fn match_wildcard(&self, pattern: &str) -> Result<BTreeSet<String>> {
        let pattern = pattern.to_lowercase();
        let prefix = literal_prefix(&pattern);
        let regex = wildcard_regex(&pattern)?;
        self.read(|state| {
            let mut matches = BTreeSet::new();
            let automaton = Str::new(prefix).starts_with();
            let mut stream = state.fst.search(automaton).into_stream();
            while let Some((key, _)) = stream.next() {
                if let Ok(term) = std::str::from_utf8(key) {
                    if regex.is_match(term) {
                        matches.insert(term.to_string());
                    }
                }
            }
            for term in state.pending.range(prefix.to_string()..) {
                if !term.0.starts_with(prefix) {
                    break;
                }
                if regex.is_match(term.0) {
                    matches.insert(term.0.clone());
                }
            }
            Ok(matches)
        })
    }

    fn intern_variant(&self, base: TermId, surface: &str) -> Result<Option<u8>> {
        self.write(|state| {
            if !state.names.contains_key(&base) {
                return Err(IndexError::InvalidRequest(format!(
                    "no lexeme {} for wordform {:?}",
                    base, surface
                )));
            }
            let slots = state.variants.entry(base).or_default();
            if let Some(index) = slots.iter().position(|s| s == surface) {
                return Ok(Some(index as u8));
            }
            if slots.len() >= MAX_VARIANTS as usize {
                return Ok(None);
            }
            slots.push(surface.to_string());
            state.dirty = true;
            Ok(Some((slots.len() - 1) as u8))
        })
    }

    fn resolve_variant(&self, base: TermId, index: u8) -> Result<Option<String>> {
        self.read(|state| {
            Ok(state
                .variants
                .get(&base)
                .and_then(|slots| slots.get(index as usize))
                .cloned())
        })
    }

    fn flush(&self) -> Result<()> {
        let path = self.path.clone();
        self.write(|state| {
            state.compact()?;
            if !state.dirty {
                return Ok(());
            }
            if let Some(path) = path {
                let bytes = encode_file(&state.image())?;
                let tmp = path.with_extension("tmp");
                fs::write(&tmp, &bytes)?;
                fs::rename(&tmp, &path)?;
                debug!(path = %path.display(), terms = state.names.len(), "term trie flushed");
            }
            state.dirty = false;
            Ok(())
        })
    }

    fn dispose(&self) {
        if self.state.write().take().is_some() {
            debug!("term trie disposed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_intern_is_stable() {
        let dict = TrieTermDictionary::in_memory().unwrap();
        let a = dict.intern("apple").unwrap();
        let b = dict.intern("banana").unwrap();
        assert_ne!(a, b);
        assert_eq!(dict.intern("apple").unwrap(), a);
        assert_eq!(dict.lookup("banana").unwrap(), Some(b));
        assert_eq!(dict.lookup("cherry").unwrap(), None);
        assert_eq!(dict.resolve(a).unwrap().as_deref(), Some("apple"));
        assert_eq!(dict.len().unwrap(), 2);
    }

    #[test]
    fn test_lookup_after_compaction() {
        let dict = TrieTermDictionary::in_memory().unwrap();
        let id = dict.intern("test").unwrap();
        dict.flush().unwrap();
        assert_eq!(dict.lookup("test").unwrap(), Some(id));
        let next = dict.intern("tester").unwrap();
        assert_ne!(next, id);
    }

    #[test]
    fn test_wildcard_spans_flushed_and_pending_terms() {
        let dict = TrieTermDictionary::in_memory().unwrap();
        for term in ["test", "testing", "other"] {
            dict.intern(term).unwrap();
        }
        dict.flush().unwrap();
        dict.intern("tester").unwrap();
        dict.intern("toast").unwrap();

        let matches = dict.match_wildcard("test*").unwrap();
        let expected: BTreeSet<String> = ["test", "tester", "testing"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(matches, expected);

        let single = dict.match_wildcard("T?ST").unwrap();
        assert_eq!(single.len(), 1);
        assert!(single.contains("test"));

        assert_eq!(dict.match_wildcard("*t").unwrap().len(), 2);
    }

    #[test]
    fn test_wildcard_dots_are_literal() {
        let dict = TrieTermDictionary::in_memory().unwrap();
        dict.intern("example.org").unwrap();
        dict.intern("examplexorg").unwrap();

        let matches = dict.match_wildcard("example.*").unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches.contains("example.org"));
    }

    #[test]
    fn test_variants() {
        let dict = TrieTermDictionary::in_memory().unwrap();
        let crab = dict.intern("crab").unwrap();
        assert_eq!(dict.intern_variant(crab, "crabbing").unwrap(), Some(0));
        assert_eq!(dict.intern_variant(crab, "crabbed").unwrap(), Some(1));
        assert_eq!(dict.intern_variant(crab, "crabbing").unwrap(), Some(0));
        assert_eq!(dict.resolve_variant(crab, 1).unwrap().as_deref(), Some("crabbed"));
        assert_eq!(dict.resolve_variant(crab, 7).unwrap(), None);

        for i in 2..MAX_VARIANTS {
            assert!(dict.intern_variant(crab, &format!("crab{}", i)).unwrap().is_some());
        }
        assert_eq!(dict.intern_variant(crab, "one-too-many").unwrap(), None);
        assert!(dict.intern_variant(TermId(999), "x").is_err());
    }

    #[test]
    fn test_persist_and_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("terms.trie");

        let (apple, crab) = {
            let dict = TrieTermDictionary::open(&path).unwrap();
            let apple = dict.intern("apple").unwrap();
            let crab = dict.intern("crab").unwrap();
            dict.intern_variant(crab, "crabbing").unwrap();
            dict.flush().unwrap();
            dict.dispose();
            (apple, crab)
        };

        let dict = TrieTermDictionary::open(&path).unwrap();
        assert_eq!(dict.lookup("apple").unwrap(), Some(apple));
        assert_eq!(dict.resolve(crab).unwrap().as_deref(), Some("crab"));
        assert_eq!(dict.resolve_variant(crab, 0).unwrap().as_deref(), Some("crabbing"));
        // New ids never collide with reloaded ones
        let fresh = dict.intern("banana").unwrap();
        assert!(fresh != apple && fresh != crab);
    }

    #[test]
    fn test_corrupt_file_is_data_format_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("terms.trie");
        {
            let dict = TrieTermDictionary::open(&path).unwrap();
            dict.intern("apple").unwrap();
            dict.flush().unwrap();
        }
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let err = TrieTermDictionary::open(&path).err().unwrap();
        assert!(err.requires_rebuild());

        fs::write(&path, b"garbage").unwrap();
        assert!(TrieTermDictionary::open(&path).err().unwrap().requires_rebuild());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let dict = TrieTermDictionary::in_memory().unwrap();
        dict.intern("apple").unwrap();
        dict.dispose();
        dict.dispose();
        assert!(dict.is_disposed());
        assert!(matches!(dict.intern("pear"), Err(IndexError::Disposed)));
        assert!(matches!(dict.lookup("apple"), Err(IndexError::Disposed)));
        assert!(matches!(dict.flush(), Err(IndexError::Disposed)));
    }
}
