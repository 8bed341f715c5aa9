use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::error::{IndexError, Result};

/// Prometheus metrics for the indexing pipeline
#[derive(Clone)]
pub struct IndexMetrics {
    // Counters
    pub fragments_added: Counter,
    pub documents_committed: Counter,
    pub documents_deleted: Counter,
    pub chunks_completed: Counter,
    pub queries_total: Counter,
    pub context_fallbacks: Counter,

    // Histograms
    pub commit_latency: Histogram,

    // Registry
    registry: Arc<Registry>,
}

impl IndexMetrics {
    /// Create a new IndexMetrics instance with its own registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let fragments_added = Counter::with_opts(Opts::new(
            "omnidex_fragments_added_total",
            "Total number of text fragments submitted for indexing",
        ))?;
        registry.register(Box::new(fragments_added.clone()))?;

        let documents_committed = Counter::with_opts(Opts::new(
            "omnidex_documents_committed_total",
            "Total number of document versions committed by batch updates",
        ))?;
        registry.register(Box::new(documents_committed.clone()))?;

        let documents_deleted = Counter::with_opts(Opts::new(
            "omnidex_documents_deleted_total",
            "Total number of documents deleted",
        ))?;
        registry.register(Box::new(documents_deleted.clone()))?;

        let chunks_completed = Counter::with_opts(Opts::new(
            "omnidex_chunks_completed_total",
            "Total number of chunks sealed and notified",
        ))?;
        registry.register(Box::new(chunks_completed.clone()))?;

        let queries_total = Counter::with_opts(Opts::new(
            "omnidex_queries_total",
            "Total number of term and wildcard queries",
        ))?;
        registry.register(Box::new(queries_total.clone()))?;

        let context_fallbacks = Counter::with_opts(Opts::new(
            "omnidex_context_fallbacks_total",
            "Context requests answered with the no-context placeholder",
        ))?;
        registry.register(Box::new(context_fallbacks.clone()))?;

        let commit_latency = Histogram::with_opts(
            HistogramOpts::new("omnidex_commit_latency_seconds", "Batch commit latency")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(commit_latency.clone()))?;

        Ok(Self {
            fragments_added,
            documents_committed,
            documents_deleted,
            chunks_completed,
            queries_total,
            context_fallbacks,
            commit_latency,
            registry: Arc::new(registry),
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Record a committed batch
    pub fn record_commit(&self, documents: usize, duration_secs: f64) {
        self.documents_committed.inc_by(documents as f64);
        self.commit_latency.observe(duration_secs);
    }

    /// Render every metric in the text exposition format
    pub fn gather_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| IndexError::Internal(e.to_string()))
    }
}
