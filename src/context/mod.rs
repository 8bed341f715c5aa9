//! Context snippets around query hits
//!
//! [`ContextBuilder`] re-renders a document through the host's
//! [`TextProvider`], places windows around the entry's instances and
//! reports where the matched wordforms sit in the resulting snippet.
//! [`ContextBuilder::build`] returns every failure as a [`ContextError`];
//! hosts that only want something to display call
//! [`ContextBuilder::context_or_sentinel`], which substitutes the
//! configured "no context" text.

mod window;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::chunk::{DocumentId, Entry, InstanceOffset, TextIndex};
use crate::config::{ContextConfig, IndexSettings};
use crate::dictionary::{TermDictionary, TermId};
use crate::error::IndexError;
use crate::text::{RenderedText, SectionTable, TextCollector, TextProvider};
use crate::tokenizer::{inflect, GrammarTag};

use window::{open_window, Window};

/// Why no context could be built for a document
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("document {0} is no longer available")]
    DocumentUnavailable(DocumentId),

    #[error("document {0} rendered no text")]
    EmptyText(DocumentId),

    #[error("entry for document {0} has no instances")]
    NoInstances(DocumentId),

    #[error("section {section} of document {doc_id} was not rendered")]
    MissingSection { doc_id: DocumentId, section: u8 },

    #[error("offset {offset} outside rendered text of {len} characters")]
    OffsetOutOfBounds { offset: usize, len: usize },

    #[error("unknown lexeme {0}")]
    UnknownLexeme(TermId),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl ContextError {
    /// Caller-supplied offsets do not match the text
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ContextError::OffsetOutOfBounds { .. } | ContextError::MissingSection { .. }
        )
    }
}

/// Byte span of a highlighted wordform inside [`DocumentContext::text`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Highlight {
    pub start: usize,
    pub len: usize,
}

/// Snippet text with highlight spans
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentContext {
    pub doc_id: DocumentId,
    pub text: String,
    pub highlights: Vec<Highlight>,
    sentinel: bool,
}

impl DocumentContext {
    pub fn is_sentinel(&self) -> bool {
        self.sentinel
    }

    /// Highlighted substrings, in highlight order
    pub fn highlighted(&self) -> Vec<&str> {
        self.highlights
            .iter()
            .filter_map(|h| self.text.get(h.start..h.start + h.len))
            .collect()
    }
}

/// A matched wordform located in the rendered text
struct Hit {
    section: u8,
    start: usize,
    len: usize,
}

/// Builds context snippets for query entries
pub struct ContextBuilder {
    dictionary: Arc<dyn TermDictionary>,
    provider: Arc<dyn TextProvider>,
    config: ContextConfig,
    sections: SectionTable,
    index: Option<Arc<TextIndex>>,
}

impl ContextBuilder {
    pub fn new(
        dictionary: Arc<dyn TermDictionary>,
        provider: Arc<dyn TextProvider>,
        settings: &IndexSettings,
    ) -> Self {
        Self {
            dictionary,
            provider,
            config: settings.context.clone(),
            sections: SectionTable::new(&settings.sections),
            index: None,
        }
    }

    /// Check document presence against `index` and count fallbacks in its metrics
    pub fn with_index(mut self, index: Arc<TextIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// The placeholder shown when no context is available
    pub fn sentinel(&self, doc_id: DocumentId) -> DocumentContext {
        DocumentContext {
            doc_id,
            text: self.config.no_context.clone(),
            highlights: Vec::new(),
            sentinel: true,
        }
    }

    /// Build the context, substituting the sentinel on any failure
    pub fn context_or_sentinel(&self, entry: &Entry) -> DocumentContext {
        match self.build(entry) {
            Ok(context) => context,
            Err(err) => {
                if err.is_contract_violation() {
                    warn!(doc_id = entry.doc_id, error = %err, "context offsets do not match text");
                } else {
                    debug!(doc_id = entry.doc_id, error = %err, "no context available");
                }
                if let Some(index) = &self.index {
                    index.metrics().context_fallbacks.inc();
                }
                self.sentinel(entry.doc_id)
            }
        }
    }

    /// Build the context snippet for one entry
    pub fn build(&self, entry: &Entry) -> Result<DocumentContext, ContextError> {
        let doc_id = entry.doc_id;
        if entry.instances.is_empty() {
            return Err(ContextError::NoInstances(doc_id));
        }
        self.ensure_present(doc_id)?;

        let rendered = self.render(doc_id)?;
        // The document may have been deleted while it was rendering
        self.ensure_present(doc_id)?;

        let text: Vec<char> = rendered.text().chars().collect();
        let hits = self.locate_hits(entry, &rendered, text.len())?;
        let windows = self.place_windows(&text, &hits);
        let (snippet, highlights) = self.emit(&text, &windows, &hits);

        Ok(DocumentContext {
            doc_id,
            text: snippet,
            highlights,
            sentinel: false,
        })
    }

    fn ensure_present(&self, doc_id: DocumentId) -> Result<(), ContextError> {
        match &self.index {
            Some(index) if !index.is_document_present(doc_id) => {
                Err(ContextError::DocumentUnavailable(doc_id))
            }
            _ => Ok(()),
        }
    }

    fn render(&self, doc_id: DocumentId) -> Result<RenderedText, ContextError> {
        let mut collector = TextCollector::new(self.sections.clone(), &self.config.section_delimiter);
        if !self.provider.render(doc_id, &mut collector) {
            return Err(ContextError::DocumentUnavailable(doc_id));
        }
        let rendered = collector.finish();
        if rendered.is_blank() {
            return Err(ContextError::EmptyText(doc_id));
        }
        Ok(rendered)
    }

    /// Hits sorted by section, then start
    fn locate_hits(
        &self,
        entry: &Entry,
        rendered: &RenderedText,
        len: usize,
    ) -> Result<Vec<Hit>, ContextError> {
        let mut hits = Vec::with_capacity(entry.instances.len());
        for instance in &entry.instances {
            let section_start = rendered.section_start(instance.section).ok_or(
                ContextError::MissingSection {
                    doc_id: entry.doc_id,
                    section: instance.section,
                },
            )?;
            let start = section_start as usize + instance.offset as usize;
            if start >= len {
                return Err(ContextError::OffsetOutOfBounds { offset: start, len });
            }
            let word = self.wordform(instance)?;
            hits.push(Hit {
                section: instance.section,
                start,
                len: word.chars().count(),
            });
        }
        hits.sort_by_key(|h| (h.section, h.start));
        Ok(hits)
    }

    /// Surface form of an instance, rebuilt from its base lexeme and grammar mark
    fn wordform(&self, instance: &InstanceOffset) -> Result<String, ContextError> {
        let lexeme = self
            .dictionary
            .resolve(instance.base)?
            .ok_or(ContextError::UnknownLexeme(instance.base))?;
        let word = match instance.grammar {
            GrammarTag::Variant(index) => match self.dictionary.resolve_variant(instance.base, index) {
                Ok(Some(surface)) => surface,
                Ok(None) | Err(_) => {
                    debug!(base = %instance.base, index, "wordform variant missing, using lexeme");
                    lexeme
                }
            },
            tag => inflect(&lexeme, tag).unwrap_or(lexeme),
        };
        Ok(word)
    }

    /// Windows for the leading hits; every merge of overlapping windows lets
    /// one more hit open a window
    fn place_windows(&self, text: &[char], hits: &[Hit]) -> Vec<Window> {
        let total = hits.len();
        let mut limit = self.config.min_windows.max(1).min(total);
        let mut windows: Vec<Window> = Vec::new();

        let mut i = 0;
        while i < limit {
            let window = open_window(text, hits[i].start, hits[i].len, &self.config);
            match windows.last_mut() {
                Some(last) if last.overlaps(&window) => {
                    last.merge(&window);
                    if limit < total {
                        limit += 1;
                    }
                }
                _ => windows.push(window),
            }
            i += 1;
        }
        windows
    }

    /// Join the windows, collapse line breaks and tabs, and map hits to byte spans
    fn emit(&self, text: &[char], windows: &[Window], hits: &[Hit]) -> (String, Vec<Highlight>) {
        let mut out = String::new();
        let mut highlights = Vec::new();
        let mut placed = vec![false; hits.len()];

        for (n, window) in windows.iter().enumerate() {
            if n > 0 {
                out.push_str(&self.config.delimiter);
            }
            // Output byte offset of every window character, plus the end
            let mut byte_at = Vec::with_capacity(window.end - window.start + 1);
            let mut prev_cr = false;
            for &c in &text[window.start..window.end] {
                byte_at.push(out.len());
                match c {
                    '\n' if prev_cr => {}
                    '\r' | '\n' | '\t' => out.push(' '),
                    c => out.push(c),
                }
                prev_cr = c == '\r';
            }
            byte_at.push(out.len());

            for (hit, done) in hits.iter().zip(placed.iter_mut()) {
                if *done || !window.contains(hit.start) {
                    continue;
                }
                let from = hit.start - window.start;
                let to = (hit.start + hit.len).min(window.end) - window.start;
                highlights.push(Highlight {
                    start: byte_at[from],
                    len: byte_at[to] - byte_at[from],
                });
                *done = true;
            }
        }
        (out, highlights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::TrieTermDictionary;
    use crate::text::{InMemoryTextProvider, TextConsumer, TextPart};

    struct Fixture {
        provider: Arc<InMemoryTextProvider>,
        index: Arc<TextIndex>,
        builder: ContextBuilder,
    }

    fn fixture(docs: &[(DocumentId, &str)]) -> Fixture {
        let settings = IndexSettings::default();
        let dictionary: Arc<dyn TermDictionary> = Arc::new(TrieTermDictionary::in_memory().unwrap());
        let provider = Arc::new(InMemoryTextProvider::new());
        let index = Arc::new(TextIndex::new(settings.clone(), dictionary.clone()).unwrap());
        for &(doc_id, text) in docs {
            provider.insert_text(doc_id, text);
            index.index_document(doc_id, provider.as_ref()).unwrap();
        }
        index.end_batch_update().unwrap();
        let builder = ContextBuilder::new(dictionary, provider.clone(), &settings).with_index(index.clone());
        Fixture {
            provider,
            index,
            builder,
        }
    }

    fn entry(f: &Fixture, term: &str, doc_id: DocumentId) -> Entry {
        f.index
            .process_query(term)
            .unwrap()
            .unwrap()
            .into_iter()
            .find(|e| e.doc_id == doc_id)
            .unwrap()
    }

    #[test]
    fn test_short_document_whole_text() {
        let f = fixture(&[(1, "one two three fourplay")]);
        let context = f.builder.build(&entry(&f, "fourplay", 1)).unwrap();
        assert_eq!(context.text, "one two three fourplay");
        assert_eq!(context.highlights, vec![Highlight { start: 14, len: 8 }]);
        assert!(!context.is_sentinel());
    }

    #[test]
    fn test_wordforms_are_highlighted() {
        let f = fixture(&[(1, "The crab kept crabbing while prices rose.")]);
        let context = f.builder.build(&entry(&f, "crab", 1)).unwrap();
        assert_eq!(context.highlighted(), vec!["crab", "crabbing"]);

        let context = f.builder.build(&entry(&f, "price", 1)).unwrap();
        assert_eq!(context.highlighted(), vec!["prices"]);
    }

    #[test]
    fn test_web_address_highlight_skips_scheme() {
        let f = fixture(&[(1, "see http://example.org today")]);
        let context = f.builder.build(&entry(&f, "example.org", 1)).unwrap();
        assert_eq!(context.text, "see http://example.org today");
        assert_eq!(context.highlighted(), vec!["example.org"]);
    }

    #[test]
    fn test_distant_hits_get_separate_windows() {
        let filler = "lorem ipsum dolor sit amet consectetur adipiscing elit sed do eiusmod";
        let text = format!("fourplay starts here {} and fourplay ends here", filler);
        let f = fixture(&[(1, text.as_str())]);
        let context = f.builder.build(&entry(&f, "fourplay", 1)).unwrap();
        assert!(context.text.contains("..."));
        assert_eq!(context.highlighted(), vec!["fourplay", "fourplay"]);
    }

    #[test]
    fn test_line_breaks_collapsed() {
        let f = fixture(&[(1, "first line\r\nfourplay\tline\nlast")]);
        let context = f.builder.build(&entry(&f, "fourplay", 1)).unwrap();
        assert_eq!(context.text, "first line fourplay line last");
        assert_eq!(context.highlighted(), vec!["fourplay"]);
    }

    #[test]
    fn test_heading_and_body_sections() {
        let settings = IndexSettings::default();
        let dictionary: Arc<dyn TermDictionary> = Arc::new(TrieTermDictionary::in_memory().unwrap());
        let provider = Arc::new(InMemoryTextProvider::new());
        provider.insert(
            9,
            vec![
                TextPart::Heading("Fourplay tonight".to_string()),
                TextPart::Fragment("Bring fourplay cards".to_string()),
            ],
        );
        let index = Arc::new(TextIndex::new(settings.clone(), dictionary.clone()).unwrap());
        index.index_document(9, provider.as_ref()).unwrap();
        index.end_batch_update().unwrap();

        let builder = ContextBuilder::new(dictionary, provider, &settings).with_index(index.clone());
        let entry = index.process_query("fourplay").unwrap().unwrap().remove(0);
        let context = builder.build(&entry).unwrap();
        assert_eq!(context.text, "Fourplay tonight Bring fourplay cards");
        // body (section 0) hit sorts before the subject (section 1) hit
        assert_eq!(
            context.highlights,
            vec![Highlight { start: 23, len: 8 }, Highlight { start: 0, len: 8 }]
        );
    }

    #[test]
    fn test_sentinel_when_document_gone() {
        let f = fixture(&[(1, "fourplay"), (2, "fourplay too")]);
        let stale = entry(&f, "fourplay", 1);

        f.provider.remove(1);
        let context = f.builder.context_or_sentinel(&stale);
        assert!(context.is_sentinel());
        assert_eq!(context.text, "No context available");
        assert!(context.highlights.is_empty());

        f.index.delete_document(2).unwrap();
        let stale = Entry {
            doc_id: 2,
            instances: stale.instances.clone(),
        };
        assert!(matches!(
            f.builder.build(&stale),
            Err(ContextError::DocumentUnavailable(2))
        ));
        assert_eq!(f.index.metrics().context_fallbacks.get(), 1.0);
    }

    #[test]
    fn test_offset_outside_text_is_contract_violation() {
        let f = fixture(&[(1, "a long enough text with fourplay inside")]);
        let stale = entry(&f, "fourplay", 1);
        f.provider.insert_text(1, "short");

        let err = f.builder.build(&stale).unwrap_err();
        assert!(err.is_contract_violation());
        assert!(f.builder.context_or_sentinel(&stale).is_sentinel());
    }

    /// Deletes each document from the index while rendering it
    struct DeletingProvider {
        inner: InMemoryTextProvider,
        index: parking_lot::Mutex<Option<Arc<TextIndex>>>,
    }

    impl TextProvider for DeletingProvider {
        fn render(&self, doc_id: DocumentId, consumer: &mut dyn TextConsumer) -> bool {
            if let Some(index) = self.index.lock().as_ref() {
                index.delete_document(doc_id).unwrap();
            }
            self.inner.render(doc_id, consumer)
        }
    }

    #[test]
    fn test_delete_during_render_yields_sentinel() {
        let settings = IndexSettings::default();
        let dictionary: Arc<dyn TermDictionary> = Arc::new(TrieTermDictionary::in_memory().unwrap());
        let provider = Arc::new(DeletingProvider {
            inner: InMemoryTextProvider::new(),
            index: parking_lot::Mutex::new(None),
        });
        provider.inner.insert_text(1, "racing fourplay");
        provider.inner.insert_text(2, "racing fourplay again");

        let index = Arc::new(TextIndex::new(settings.clone(), dictionary.clone()).unwrap());
        index.index_document(1, provider.as_ref()).unwrap();
        index.index_document(2, provider.as_ref()).unwrap();
        index.end_batch_update().unwrap();
        *provider.index.lock() = Some(index.clone());

        let builder = ContextBuilder::new(dictionary, provider.clone(), &settings).with_index(index.clone());
        let entries = index.process_query("fourplay").unwrap().unwrap();

        assert!(matches!(
            builder.build(&entries[0]),
            Err(ContextError::DocumentUnavailable(1))
        ));
        assert!(!index.is_document_present(1));

        let context = builder.context_or_sentinel(&entries[1]);
        assert!(context.is_sentinel());
        assert!(!index.is_document_present(2));
        assert_eq!(index.metrics().context_fallbacks.get(), 1.0);
    }
}
