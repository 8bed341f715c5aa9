//! Single-writer indexing queue
//!
//! All mutating calls on a [`TextIndex`] are funnelled through one worker
//! thread fed by a channel, so callers on any thread can submit work
//! without coordinating. Queries go straight to the index.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error};

use crate::chunk::{DocumentId, TextIndex};
use crate::error::{IndexError, Result};
use crate::text::TextProvider;

/// A unit of work for the indexing thread
pub enum IndexJob {
    AddFragment { doc_id: DocumentId, text: String },
    AddDocument {
        doc_id: DocumentId,
        provider: Arc<dyn TextProvider>,
    },
    EndBatch,
    Delete { doc_id: DocumentId },
    Close,
}

impl IndexJob {
    fn name(&self) -> &'static str {
        match self {
            IndexJob::AddFragment { .. } => "add_fragment",
            IndexJob::AddDocument { .. } => "add_document",
            IndexJob::EndBatch => "end_batch",
            IndexJob::Delete { .. } => "delete",
            IndexJob::Close => "close",
        }
    }
}

#[derive(Default)]
struct Progress {
    submitted: AtomicU64,
    applied: AtomicU64,
    failed: AtomicU64,
    lock: Mutex<()>,
    cv: Condvar,
}

impl Progress {
    fn mark_applied(&self) {
        self.applied.fetch_add(1, Ordering::SeqCst);
        let _g = self.lock.lock();
        self.cv.notify_all();
    }
}

/// Handle to the indexing thread
pub struct IndexingQueue {
    tx: Sender<IndexJob>,
    join: Mutex<Option<thread::JoinHandle<()>>>,
    progress: Arc<Progress>,
    /// Set once `Close` is queued; submissions hold the read side so none
    /// can land behind it
    stopped: RwLock<bool>,
}

impl IndexingQueue {
    /// Start the indexing thread for `index`
    pub fn spawn(index: Arc<TextIndex>) -> Self {
        let (tx, rx) = channel::unbounded();
        let progress = Arc::new(Progress::default());
        let worker_progress = progress.clone();
        let handle = thread::spawn(move || run(index, rx, worker_progress));
        Self {
            tx,
            join: Mutex::new(Some(handle)),
            progress,
            stopped: RwLock::new(false),
        }
    }

    /// Queue a job
    pub fn submit(&self, job: IndexJob) -> Result<()> {
        let stopped = self.stopped.read();
        if *stopped {
            return Err(IndexError::Closed);
        }
        self.send(job)
    }

    fn send(&self, job: IndexJob) -> Result<()> {
        self.progress.submitted.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job).is_err() {
            self.progress.submitted.fetch_sub(1, Ordering::SeqCst);
            return Err(IndexError::Closed);
        }
        Ok(())
    }

    pub fn add_fragment(&self, doc_id: DocumentId, text: impl Into<String>) -> Result<()> {
        self.submit(IndexJob::AddFragment {
            doc_id,
            text: text.into(),
        })
    }

    pub fn add_document(&self, doc_id: DocumentId, provider: Arc<dyn TextProvider>) -> Result<()> {
        self.submit(IndexJob::AddDocument { doc_id, provider })
    }

    pub fn end_batch(&self) -> Result<()> {
        self.submit(IndexJob::EndBatch)
    }

    pub fn delete(&self, doc_id: DocumentId) -> Result<()> {
        self.submit(IndexJob::Delete { doc_id })
    }

    /// Number of jobs that returned an error
    pub fn failed_jobs(&self) -> u64 {
        self.progress.failed.load(Ordering::SeqCst)
    }

    /// Block until every submitted job has been applied.
    ///
    /// Returns false if `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.progress.lock.lock();
        loop {
            let applied = self.progress.applied.load(Ordering::SeqCst);
            if applied >= self.progress.submitted.load(Ordering::SeqCst) {
                return true;
            }
            if self.progress.cv.wait_until(&mut guard, deadline).timed_out() {
                return self.progress.applied.load(Ordering::SeqCst)
                    >= self.progress.submitted.load(Ordering::SeqCst);
            }
        }
    }

    /// Close the index through the queue and join the thread.
    ///
    /// Jobs accepted before the call are applied first; later submissions
    /// fail with [`IndexError::Closed`]. Safe to call more than once.
    pub fn shutdown(&self) -> Result<()> {
        {
            let mut stopped = self.stopped.write();
            if !*stopped {
                *stopped = true;
                if let Err(err) = self.send(IndexJob::Close) {
                    // The worker is gone already; joining reports why
                    debug!(error = %err, "close job not queued");
                }
            }
        }
        let handle = match self.join.lock().take() {
            Some(handle) => handle,
            None => return Ok(()),
        };
        handle
            .join()
            .map_err(|_| IndexError::Internal("indexing thread panicked".to_string()))
    }
}

impl Drop for IndexingQueue {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            error!(error = %err, "indexing queue shutdown failed");
        }
    }
}

fn run(index: Arc<TextIndex>, rx: Receiver<IndexJob>, progress: Arc<Progress>) {
    while let Ok(job) = rx.recv() {
        let name = job.name();
        let stop = matches!(job, IndexJob::Close);
        let result = match job {
            IndexJob::AddFragment { doc_id, text } => index.add_document_fragment(doc_id, &text),
            IndexJob::AddDocument { doc_id, provider } => {
                index.index_document(doc_id, provider.as_ref()).map(|_| ())
            }
            IndexJob::EndBatch => index.end_batch_update(),
            IndexJob::Delete { doc_id } => index.delete_document(doc_id).map(|_| ()),
            IndexJob::Close => index.close_indices(),
        };
        if let Err(err) = result {
            progress.failed.fetch_add(1, Ordering::SeqCst);
            error!(job = name, error = %err, "indexing job failed");
        }
        progress.mark_applied();
        if stop {
            break;
        }
    }
    debug!("indexing thread stopped");
}
