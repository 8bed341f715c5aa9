//! Text index combining the pending batch, the open chunk and sealed chunks
//!
//! Writers are expected to be serialized (see [`crate::indexer`]); queries
//! may run concurrently. A batch commit and a delete hold the open chunk's
//! write lock for their whole duration, and queries hold its read lock
//! while they also read the sealed chunks, so a query sees a document
//! either before or after a commit, never a mix of versions.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::buffer::OpenChunk;
use super::pending::{DocumentSink, PendingBatch, PendingDocument};
use super::sealed::SealedChunk;
use super::types::{ChunkCompleted, ChunkId, DocumentId, Entry, InstanceOffset};
use crate::config::IndexSettings;
use crate::dictionary::{TermDictionary, TermId};
use crate::error::{IndexError, Result};
use crate::metrics::IndexMetrics;
use crate::text::{SectionTable, TextConsumer, TextProvider};
use crate::tokenizer::analyze;

/// Callback run for every chunk that becomes complete
pub type ChunkHandler = Box<dyn Fn(&ChunkCompleted) + Send + Sync>;

/// The chunked full-text index
pub struct TextIndex {
    settings: IndexSettings,
    sections: SectionTable,
    dictionary: Arc<dyn TermDictionary>,
    /// Documents submitted since the last commit
    pending: Mutex<PendingBatch>,
    /// Chunk receiving commits
    open: RwLock<OpenChunk>,
    /// Sealed chunks, oldest first
    sealed: ArcSwap<Vec<Arc<SealedChunk>>>,
    handlers: RwLock<Vec<ChunkHandler>>,
    closed: AtomicBool,
    metrics: IndexMetrics,
}

impl TextIndex {
    /// Create an empty index over `dictionary`
    pub fn new(settings: IndexSettings, dictionary: Arc<dyn TermDictionary>) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            sections: SectionTable::new(&settings.sections),
            settings,
            dictionary,
            pending: Mutex::new(PendingBatch::default()),
            open: RwLock::new(OpenChunk::new(ChunkId(0))),
            sealed: ArcSwap::from_pointee(Vec::new()),
            handlers: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
            metrics: IndexMetrics::new()?,
        })
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn dictionary(&self) -> &Arc<dyn TermDictionary> {
        &self.dictionary
    }

    pub fn metrics(&self) -> &IndexMetrics {
        &self.metrics
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(IndexError::Closed);
        }
        Ok(())
    }

    /// Register a handler for chunk-completed notifications.
    ///
    /// Handlers run synchronously on the committing thread, after the
    /// index locks are released.
    pub fn on_chunk_completed<F>(&self, handler: F)
    where
        F: Fn(&ChunkCompleted) + Send + Sync + 'static,
    {
        self.handlers.write().push(Box::new(handler));
    }

    /// Tokenize `text` as the new pending version of `doc_id`.
    ///
    /// A later submission for the same id before the next commit replaces
    /// the earlier one. Use [`TextIndex::index_document`] to index a
    /// document made of several fragments.
    pub fn add_document_fragment(&self, doc_id: DocumentId, text: &str) -> Result<()> {
        self.ensure_open()?;
        let mut pending = self.pending.lock();
        let doc = pending.start(doc_id, &self.settings);
        let mut sink = DocumentSink::new(doc, self.dictionary.as_ref(), &self.sections);
        sink.add_fragment(text);
        sink.finish()?;
        self.metrics.fragments_added.inc();
        Ok(())
    }

    /// Render `doc_id` through `provider` as its new pending version.
    ///
    /// Every fragment of one rendering lands in the same version, offsets
    /// continuing across fragments. Returns false when the provider no
    /// longer knows the document. The provider must not call back into the
    /// index.
    pub fn index_document(&self, doc_id: DocumentId, provider: &dyn TextProvider) -> Result<bool> {
        self.ensure_open()?;
        let mut pending = self.pending.lock();
        let doc = pending.start(doc_id, &self.settings);
        let mut sink = DocumentSink::new(doc, self.dictionary.as_ref(), &self.sections);
        let found = provider.render(doc_id, &mut sink);
        sink.finish()?;
        if found {
            self.metrics.fragments_added.inc();
        } else {
            debug!(doc_id, "document is gone, nothing to index");
        }
        Ok(found)
    }

    /// Commit everything submitted since the previous commit.
    ///
    /// A committed document replaces any earlier version of the same id.
    /// Documents without postings are skipped. Chunks filled by this commit
    /// are sealed and notified before returning.
    pub fn end_batch_update(&self) -> Result<()> {
        self.ensure_open()?;
        let started = Instant::now();
        let completed = {
            let mut pending = self.pending.lock();
            if pending.is_empty() {
                return Ok(());
            }
            let batch = pending.take();
            let (committed, completed) = self.commit(batch)?;
            self.metrics
                .record_commit(committed, started.elapsed().as_secs_f64());
            debug!(committed, sealed = completed.len(), "batch committed");
            completed
        };
        self.notify(&completed);
        Ok(())
    }

    /// Remove every version of a document, pending or committed.
    ///
    /// Returns whether anything was removed; unknown ids are a no-op.
    pub fn delete_document(&self, doc_id: DocumentId) -> Result<bool> {
        self.ensure_open()?;
        let mut pending = self.pending.lock();
        let mut removed = pending.remove(doc_id);
        {
            let mut open = self.open.write();
            removed |= self.supersede(&mut open, doc_id);
        }
        drop(pending);

        if removed {
            self.metrics.documents_deleted.inc();
            debug!(doc_id, "document deleted");
        }
        Ok(removed)
    }

    /// Entries of every live document containing `term` or a wordform of it.
    ///
    /// Returns `None` when nothing matches.
    pub fn process_query(&self, term: &str) -> Result<Option<Vec<Entry>>> {
        self.ensure_open()?;
        self.metrics.queries_total.inc();
        let ids = self.query_terms(term)?;
        self.collect(&ids)
    }

    /// Entries for every lexeme matching a `*`/`?` pattern
    pub fn process_wildcard_query(&self, pattern: &str) -> Result<Option<Vec<Entry>>> {
        self.ensure_open()?;
        self.metrics.queries_total.inc();
        let mut ids = BTreeSet::new();
        for term in self.dictionary.match_wildcard(pattern)? {
            if let Some(id) = self.dictionary.lookup(&term)? {
                ids.insert(id);
            }
        }
        self.collect(&ids)
    }

    /// Whether a committed, non-empty version of the document is live
    pub fn is_document_present(&self, doc_id: DocumentId) -> bool {
        let open = self.open.read();
        open.contains(doc_id) || self.sealed.load().iter().any(|c| c.contains(doc_id))
    }

    /// Live committed documents
    pub fn document_count(&self) -> usize {
        let open = self.open.read();
        open.live_count()
            + self
                .sealed
                .load()
                .iter()
                .map(|c| c.live_count())
                .sum::<usize>()
    }

    /// Documents waiting for the next commit
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn sealed_chunk_count(&self) -> usize {
        self.sealed.load().len()
    }

    /// Commit pending work, seal the partial chunk and flush the dictionary.
    ///
    /// Later calls are no-ops; every other operation fails with
    /// [`IndexError::Closed`].
    pub fn close_indices(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let completed = {
            let mut pending = self.pending.lock();
            let (committed, mut completed) = self.commit(pending.take())?;
            let mut open = self.open.write();
            if !open.is_empty() {
                completed.push(self.seal_open(&mut open));
            }
            if committed > 0 {
                self.metrics.documents_committed.inc_by(committed as f64);
            }
            completed
        };
        self.notify(&completed);
        self.dictionary.flush()?;
        info!(
            documents = self.document_count(),
            chunks = self.sealed_chunk_count(),
            "index closed"
        );
        Ok(())
    }

    /// Move a batch into the open chunk, sealing it whenever it fills up
    fn commit(&self, batch: Vec<PendingDocument>) -> Result<(usize, Vec<ChunkCompleted>)> {
        let mut completed = Vec::new();
        let mut committed = 0;
        let mut open = self.open.write();

        for doc in batch {
            if doc.is_empty() {
                debug!(doc_id = doc.doc_id(), "no postings, previous version kept");
                continue;
            }
            let doc_id = doc.doc_id();
            if self.supersede(&mut open, doc_id) {
                debug!(doc_id, "document superseded");
            }
            let (info, postings) = doc.into_parts();
            open.insert(info, postings);
            committed += 1;

            if open.live_count() >= self.settings.chunk_capacity {
                completed.push(self.seal_open(&mut open));
            }
        }
        Ok((committed, completed))
    }

    /// Remove the committed version of a document wherever it lives.
    ///
    /// Callers hold the open-chunk write lock, which also guards swaps of the
    /// sealed list. A sealed chunk left without live documents is dropped.
    fn supersede(&self, open: &mut OpenChunk, doc_id: DocumentId) -> bool {
        let removed = open.remove(doc_id);
        let sealed = self.sealed.load();
        let mut emptied = false;
        let mut hit = false;
        for chunk in sealed.iter() {
            if chunk.delete(doc_id) {
                hit = true;
                emptied |= chunk.live_count() == 0;
            }
        }
        if emptied {
            let kept: Vec<Arc<SealedChunk>> = sealed
                .iter()
                .filter(|chunk| chunk.live_count() > 0)
                .cloned()
                .collect();
            debug!(dropped = sealed.len() - kept.len(), "empty sealed chunks dropped");
            self.sealed.store(Arc::new(kept));
        }
        removed || hit
    }

    fn seal_open(&self, open: &mut OpenChunk) -> ChunkCompleted {
        let next = OpenChunk::new(open.id().next());
        let chunk = std::mem::replace(open, next);
        let id = chunk.id();
        let documents = chunk.document_ids();
        let sealed = Arc::new(chunk.seal());

        let mut chunks = self.sealed.load().as_ref().clone();
        chunks.push(sealed.clone());
        self.sealed.store(Arc::new(chunks));

        info!(
            chunk = id.0,
            documents = documents.len(),
            bytes = sealed.size_bytes(),
            "chunk sealed"
        );
        ChunkCompleted { chunk: id, documents }
    }

    fn notify(&self, completed: &[ChunkCompleted]) {
        if completed.is_empty() {
            return;
        }
        let handlers = self.handlers.read();
        for event in completed {
            self.metrics.chunks_completed.inc();
            for handler in handlers.iter() {
                handler(event);
            }
        }
    }

    /// Dictionary ids a query term stands for: the surface itself and its base
    fn query_terms(&self, term: &str) -> Result<BTreeSet<TermId>> {
        let normalized = term.trim().to_lowercase();
        let mut ids = BTreeSet::new();
        if normalized.is_empty() {
            return Ok(ids);
        }
        if let Some(id) = self.dictionary.lookup(&normalized)? {
            ids.insert(id);
        }
        let lemma = analyze(&normalized, |candidate| {
            Ok(self.dictionary.lookup(candidate)?.is_some())
        })?;
        if lemma.base != normalized {
            if let Some(id) = self.dictionary.lookup(&lemma.base)? {
                ids.insert(id);
            }
        }
        Ok(ids)
    }

    fn collect(&self, terms: &BTreeSet<TermId>) -> Result<Option<Vec<Entry>>> {
        if terms.is_empty() {
            return Ok(None);
        }
        let mut docs: BTreeMap<DocumentId, Vec<InstanceOffset>> = BTreeMap::new();
        {
            let open = self.open.read();
            let sealed = self.sealed.load();
            for &term in terms {
                for (info, words) in open.postings(term) {
                    let instances = docs.entry(info.doc_id).or_default();
                    for &word in words {
                        instances.push(InstanceOffset::decode(word, term, info)?);
                    }
                }
                for chunk in sealed.iter() {
                    for (info, words) in chunk.postings(term)? {
                        let instances = docs.entry(info.doc_id).or_default();
                        for word in words {
                            instances.push(InstanceOffset::decode(word, term, info)?);
                        }
                    }
                }
            }
        }

        if docs.is_empty() {
            return Ok(None);
        }
        let entries = docs
            .into_iter()
            .map(|(doc_id, mut instances)| {
                if terms.len() > 1 {
                    instances.sort_by_key(|i| i.order);
                }
                Entry { doc_id, instances }
            })
            .collect();
        Ok(Some(entries))
    }
}
