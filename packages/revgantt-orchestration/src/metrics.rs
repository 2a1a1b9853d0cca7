//! Prometheus metrics for stage graph rebuilds
//!
//! Compiled in with the `metrics` feature. Without it every hook is a no-op.

use crate::dependency_ref::RefKind;

#[cfg(feature = "metrics")]
mod imp {
    use super::RefKind;
    use once_cell::sync::Lazy;
    use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

    pub struct RebuildMetrics {
        pub registry: Registry,
        pub dropped_refs: IntCounterVec,
        pub failures: IntCounter,
    }

    impl RebuildMetrics {
        fn new() -> prometheus::Result<Self> {
            let registry = Registry::new();
            let dropped_refs = IntCounterVec::new(
                Opts::new(
                    "revgantt_dropped_dependency_refs_total",
                    "Dependency references dropped during rebuild",
                ),
                &["kind"],
            )?;
            let failures = IntCounter::with_opts(Opts::new(
                "revgantt_rebuild_failures_total",
                "Stage graph rebuilds rolled back",
            ))?;
            registry.register(Box::new(dropped_refs.clone()))?;
            registry.register(Box::new(failures.clone()))?;
            Ok(Self {
                registry,
                dropped_refs,
                failures,
            })
        }
    }

    static METRICS: Lazy<Option<RebuildMetrics>> = Lazy::new(|| match RebuildMetrics::new() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            tracing::warn!("Rebuild metrics disabled: {}", e);
            None
        }
    });

    pub fn metrics() -> Option<&'static RebuildMetrics> {
        METRICS.as_ref()
    }

    pub fn record_dropped(kind: RefKind, count: usize) {
        if let Some(m) = metrics() {
            m.dropped_refs
                .with_label_values(&[kind.as_str()])
                .inc_by(count as u64);
        }
    }

    pub fn record_failure() {
        if let Some(m) = metrics() {
            m.failures.inc();
        }
    }
}

#[cfg(feature = "metrics")]
pub use imp::{metrics, RebuildMetrics};

/// Count dropped dependency references of one kind
pub fn record_dropped(kind: RefKind, count: usize) {
    if count == 0 {
        return;
    }
    #[cfg(feature = "metrics")]
    imp::record_dropped(kind, count);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Count a rolled-back rebuild
pub fn record_failure() {
    #[cfg(feature = "metrics")]
    imp::record_failure();
}
