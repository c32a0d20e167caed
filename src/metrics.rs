//! Prometheus export of arena statistics
//!
//! Metrics are refreshed from an [`ArenaStats`] snapshot, so they can be
//! published from any thread without touching the arena itself.

use crate::arena::ArenaStats;
use crate::error::{Error, Result};
use prometheus::{Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use tracing::error;

/// Arena gauges registered in their own registry
pub struct ArenaMetrics {
    registry: Registry,
    operations: IntGaugeVec,
    errors: IntGaugeVec,
    slab_classes: IntGauge,
    chunk_size: IntGaugeVec,
    chunks: IntGaugeVec,
    slabs: IntGaugeVec,
    bytes_in_use: IntGauge,
}

impl ArenaMetrics {
    /// Create and register all arena metrics under `namespace`
    pub fn new(namespace: &str) -> Result<Self> {
        let registry = Registry::new();
        let metrics_err = |e: prometheus::Error| Error::Metrics(e.to_string());

        let operations = IntGaugeVec::new(
            Opts::new("operations", "Arena operations performed, by kind").namespace(namespace),
            &["op"],
        )
        .map_err(metrics_err)?;
        let errors = IntGaugeVec::new(
            Opts::new("errors", "Refused or failed allocations, by reason").namespace(namespace),
            &["reason"],
        )
        .map_err(metrics_err)?;
        let slab_classes = IntGauge::with_opts(
            Opts::new("slab_classes", "Number of derived slab classes").namespace(namespace),
        )
        .map_err(metrics_err)?;
        let chunk_size = IntGaugeVec::new(
            Opts::new("chunk_size_bytes", "Chunk size of each slab class").namespace(namespace),
            &["class"],
        )
        .map_err(metrics_err)?;
        let chunks = IntGaugeVec::new(
            Opts::new("chunks", "Chunks per slab class, by state").namespace(namespace),
            &["class", "state"],
        )
        .map_err(metrics_err)?;
        let slabs = IntGaugeVec::new(
            Opts::new("slabs", "Slabs per slab class").namespace(namespace),
            &["class"],
        )
        .map_err(metrics_err)?;
        let bytes_in_use = IntGauge::with_opts(
            Opts::new("bytes_in_use", "Chunk bytes currently handed out").namespace(namespace),
        )
        .map_err(metrics_err)?;

        registry.register(Box::new(operations.clone())).map_err(metrics_err)?;
        registry.register(Box::new(errors.clone())).map_err(metrics_err)?;
        registry.register(Box::new(slab_classes.clone())).map_err(metrics_err)?;
        registry.register(Box::new(chunk_size.clone())).map_err(metrics_err)?;
        registry.register(Box::new(chunks.clone())).map_err(metrics_err)?;
        registry.register(Box::new(slabs.clone())).map_err(metrics_err)?;
        registry.register(Box::new(bytes_in_use.clone())).map_err(metrics_err)?;

        Ok(Self {
            registry,
            operations,
            errors,
            slab_classes,
            chunk_size,
            chunks,
            slabs,
            bytes_in_use,
        })
    }

    /// Refresh every gauge from `stats`
    pub fn update(&self, stats: &ArenaStats) {
        for (op, value) in [
            ("alloc", stats.num_allocs),
            ("add_ref", stats.num_add_refs),
            ("dec_ref", stats.num_dec_refs),
            ("dec_ref_zero", stats.num_dec_ref_zeroes),
            ("set_next", stats.num_set_nexts),
            ("get_next", stats.num_get_nexts),
            ("push_free_chunk", stats.num_push_free_chunks),
            ("pop_free_chunk", stats.num_pop_free_chunks),
        ] {
            self.operations.with_label_values(&[op]).set(value as i64);
        }
        self.errors
            .with_label_values(&["too_big"])
            .set(stats.num_too_big_errs as i64);
        self.errors
            .with_label_values(&["add_slab"])
            .set(stats.num_add_slab_errs as i64);

        self.slab_classes.set(stats.slab_classes.len() as i64);
        for class in &stats.slab_classes {
            let label = format!("{:06}", class.index);
            self.chunk_size
                .with_label_values(&[label.as_str()])
                .set(class.chunk_size as i64);
            self.chunks
                .with_label_values(&[label.as_str(), "free"])
                .set(class.num_chunks_free as i64);
            self.chunks
                .with_label_values(&[label.as_str(), "in_use"])
                .set(class.num_chunks_in_use as i64);
            self.slabs.with_label_values(&[label.as_str()]).set(class.num_slabs as i64);
        }
        self.bytes_in_use.set(stats.bytes_in_use() as i64);
    }

    /// Render in the Prometheus text exposition format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!(error = %e, "Failed to encode metrics");
            return Err(Error::Metrics(e.to_string()));
        }
        String::from_utf8(buffer).map_err(|e| Error::Metrics(e.to_string()))
    }
}

/// One-shot rendering of a snapshot
pub fn render(namespace: &str, stats: &ArenaStats) -> Result<String> {
    let metrics = ArenaMetrics::new(namespace)?;
    metrics.update(stats);
    metrics.export()
}
