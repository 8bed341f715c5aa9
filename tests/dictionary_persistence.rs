//! Term trie persistence across index lifetimes

use std::fs;
use std::sync::Arc;

use omnidex::{IndexError, IndexSettings, TermDictionary, TextIndex, TrieTermDictionary};
use tempfile::TempDir;

#[test]
fn test_trie_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("lexemes.trie");

    {
        let dictionary = Arc::new(TrieTermDictionary::open(&path).unwrap());
        let index = TextIndex::new(IndexSettings::default(), dictionary.clone()).unwrap();
        index
            .add_document_fragment(1, "crabbing crabs near the prices")
            .unwrap();
        index.end_batch_update().unwrap();
        index.close_indices().unwrap();
        dictionary.dispose();
        dictionary.dispose();
    }

    let dictionary = TrieTermDictionary::open(&path).unwrap();
    let crab = dictionary.lookup("crab").unwrap().unwrap();
    assert_eq!(
        dictionary.resolve_variant(crab, 0).unwrap().as_deref(),
        Some("crabbing")
    );
    assert!(dictionary.lookup("price").unwrap().is_some());
    assert!(dictionary.lookup("prices").unwrap().is_none());
    assert_eq!(dictionary.match_wildcard("cr*").unwrap().len(), 1);
}

#[test]
fn test_corrupt_trie_requires_rebuild() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("lexemes.trie");
    {
        let dictionary = TrieTermDictionary::open(&path).unwrap();
        dictionary.intern("fourplay").unwrap();
        dictionary.flush().unwrap();
    }

    let mut bytes = fs::read(&path).unwrap();
    bytes.truncate(bytes.len() / 2);
    fs::write(&path, &bytes).unwrap();

    match TrieTermDictionary::open(&path) {
        Err(err) => {
            assert!(matches!(err, IndexError::DataFormat(_)));
            assert!(err.requires_rebuild());
        }
        Ok(_) => panic!("truncated trie must not load"),
    }
}

#[test]
fn test_disposed_dictionary_fails_indexing() {
    let dictionary = Arc::new(TrieTermDictionary::in_memory().unwrap());
    let index = TextIndex::new(IndexSettings::default(), dictionary.clone()).unwrap();
    dictionary.dispose();

    let err = index.add_document_fragment(1, "anything").unwrap_err();
    assert!(err.is_terminal());
    assert!(!err.requires_rebuild());
}
