//! Documents accumulated since the last batch commit

use std::collections::HashMap;

use tracing::trace;

use super::types::{DocInfo, DocumentId, Posting};
use crate::config::IndexSettings;
use crate::dictionary::{TermDictionary, TermId};
use crate::error::{IndexError, Result};
use crate::text::{SectionTable, SectionTracker, TextConsumer};
use crate::tokenizer::{analyze, pack_instance, GrammarTag, Token, TokenType, Tokenizer, WordForm};

/// A document version being assembled from one or more fragments
pub(crate) struct PendingDocument {
    doc_id: DocumentId,
    tokenizer: Tokenizer,
    tracker: SectionTracker,
    postings: Vec<Posting>,
}

impl PendingDocument {
    fn new(doc_id: DocumentId, settings: &IndexSettings) -> Self {
        Self {
            doc_id,
            tokenizer: Tokenizer::new(&settings.tokenizer),
            tracker: SectionTracker::new(settings.context.section_delimiter.chars().count() as u32),
            postings: Vec::new(),
        }
    }

    pub fn doc_id(&self) -> DocumentId {
        self.doc_id
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn into_parts(self) -> (DocInfo, Vec<Posting>) {
        (
            DocInfo {
                doc_id: self.doc_id,
                section_starts: self.tracker.starts(),
            },
            self.postings,
        )
    }
}

/// Pending documents in submission order
#[derive(Default)]
pub(crate) struct PendingBatch {
    docs: Vec<PendingDocument>,
    index: HashMap<DocumentId, usize>,
}

impl PendingBatch {
    /// Start a fresh pending version of `doc_id`.
    ///
    /// A version already pending for the id is discarded; the document keeps
    /// its place in the batch.
    pub fn start(&mut self, doc_id: DocumentId, settings: &IndexSettings) -> &mut PendingDocument {
        let fresh = PendingDocument::new(doc_id, settings);
        let idx = match self.index.get(&doc_id) {
            Some(&idx) => {
                trace!(doc_id, "pending version replaced");
                self.docs[idx] = fresh;
                idx
            }
            None => {
                self.docs.push(fresh);
                self.index.insert(doc_id, self.docs.len() - 1);
                self.docs.len() - 1
            }
        };
        &mut self.docs[idx]
    }

    /// Drop everything pending for `doc_id`
    pub fn remove(&mut self, doc_id: DocumentId) -> bool {
        if self.index.remove(&doc_id).is_none() {
            return false;
        }
        self.docs.retain(|doc| doc.doc_id != doc_id);
        self.index = self
            .docs
            .iter()
            .enumerate()
            .map(|(idx, doc)| (doc.doc_id, idx))
            .collect();
        true
    }

    pub fn take(&mut self) -> Vec<PendingDocument> {
        self.index.clear();
        std::mem::take(&mut self.docs)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Lexeme id and grammar mark a token is stored under.
///
/// Words go through the suffix heuristics; irregular surfaces take a
/// variant slot of their base, or become their own lexeme once the base's
/// variant table is full.
pub(crate) fn resolve_lexeme(
    dictionary: &dyn TermDictionary,
    token: &Token,
) -> Result<(TermId, GrammarTag)> {
    if token.token_type() != TokenType::Word {
        return Ok((dictionary.intern(token.text())?, GrammarTag::None));
    }

    let lemma = analyze(token.text(), |candidate| {
        Ok(dictionary.lookup(candidate)?.is_some())
    })?;
    let tag = match lemma.form {
        WordForm::Base => GrammarTag::None,
        WordForm::Plural => GrammarTag::Plural,
        WordForm::Past => GrammarTag::Past,
        WordForm::Continuous => GrammarTag::Continuous,
        WordForm::Irregular(surface) => {
            let base = dictionary.intern(&lemma.base)?;
            return match dictionary.intern_variant(base, &surface)? {
                Some(index) => Ok((base, GrammarTag::Variant(index))),
                None => Ok((dictionary.intern(&surface)?, GrammarTag::None)),
            };
        }
    };
    Ok((dictionary.intern(&lemma.base)?, tag))
}

/// [`TextConsumer`] that tokenizes rendered text into a pending document.
///
/// Callbacks cannot fail, so the first dictionary error is kept and
/// reported by [`DocumentSink::finish`].
pub(crate) struct DocumentSink<'a> {
    doc: &'a mut PendingDocument,
    dictionary: &'a dyn TermDictionary,
    sections: &'a SectionTable,
    error: Option<IndexError>,
}

impl<'a> DocumentSink<'a> {
    pub fn new(
        doc: &'a mut PendingDocument,
        dictionary: &'a dyn TermDictionary,
        sections: &'a SectionTable,
    ) -> Self {
        Self {
            doc,
            dictionary,
            sections,
            error: None,
        }
    }

    pub fn finish(self) -> Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn open_content(&mut self) {
        if let Some(boundary) = self.doc.tracker.begin_content() {
            let tokenizer = &mut self.doc.tokenizer;
            if !boundary.first {
                tokenizer.increment_sentence();
            }
            tokenizer.flush_offset();
            tokenizer.increment_offset(boundary.shift);
            tokenizer.set_section(boundary.section);
        }
    }

    fn index_tokens(&mut self) -> Result<()> {
        loop {
            let token = self.doc.tokenizer.next_word();
            if token.is_end_of_stream() {
                return Ok(());
            }
            if !token.token_type().is_indexable() {
                trace!(doc_id = self.doc.doc_id, token = token.text(), "skipping unusable token");
                continue;
            }
            let (term, tag) = resolve_lexeme(self.dictionary, &token)?;
            let position = token.position().try_with_grammar(tag)?;
            self.doc.postings.push(Posting {
                term,
                instance: pack_instance(position, token.sentence_number(), token.order()),
            });
        }
    }
}

impl TextConsumer for DocumentSink<'_> {
    fn add_fragment(&mut self, text: &str) {
        if text.is_empty() || self.error.is_some() {
            return;
        }
        self.open_content();
        self.doc.tokenizer.next_chunk(text);
        if let Err(err) = self.index_tokens() {
            self.error = Some(err);
        }
        self.doc.tracker.advance(text.chars().count() as u32);
    }

    fn add_heading(&mut self, text: &str) {
        let previous = self.doc.tracker.requested();
        self.doc.tracker.request(self.sections.subject_id());
        self.add_fragment(text);
        self.doc.tracker.request(previous);
    }

    fn increment_offset(&mut self, blanks: u32) {
        if blanks == 0 || self.error.is_some() {
            return;
        }
        self.open_content();
        self.doc.tokenizer.increment_offset(blanks);
        self.doc.tracker.advance(blanks);
    }

    fn start_section(&mut self, name: &str) {
        let id = self.sections.id_of(name);
        self.doc.tracker.request(id);
    }
}
