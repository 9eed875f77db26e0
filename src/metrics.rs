use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Receiver of the reply metrics.
///
/// Counters are keyed by tenant and by the first service path of the request.
/// The reply builder only reports NGSIv1/v2 traffic.
pub trait MetricsSink: Send + Sync {
    /// A transport response could not be constructed.
    fn transport_in_error(&self, tenant: &str, service_path: &str);
    /// A non-empty answer of `bytes` bytes was sent.
    fn response_size(&self, tenant: &str, service_path: &str, bytes: usize);
}

/// Snapshot of the counters of one tenant/service path pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplyCounters {
    pub transport_in_errors: u64,
    pub responses: u64,
    pub response_bytes: u64,
}

#[derive(Default)]
struct AtomicCounters {
    transport_in_errors: AtomicU64,
    responses: AtomicU64,
    response_bytes: AtomicU64,
}

/// In-process [`MetricsSink`] built on a concurrent map of atomic counters.
#[derive(Default)]
pub struct CounterMetrics {
    counters: DashMap<(String, String), AtomicCounters>,
}

impl CounterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_counters(&self, tenant: &str, service_path: &str, f: impl FnOnce(&AtomicCounters)) {
        let key = (tenant.to_string(), service_path.to_string());
        if let Some(entry) = self.counters.get(&key) {
            f(entry.value());
            return;
        }
        let entry = self.counters.entry(key).or_default();
        f(entry.value());
    }

    /// Counters for a tenant/service path pair, if anything was recorded.
    #[must_use]
    pub fn counters(&self, tenant: &str, service_path: &str) -> Option<ReplyCounters> {
        let key = (tenant.to_string(), service_path.to_string());
        self.counters.get(&key).map(|c| ReplyCounters {
            transport_in_errors: c.transport_in_errors.load(Ordering::Relaxed),
            responses: c.responses.load(Ordering::Relaxed),
            response_bytes: c.response_bytes.load(Ordering::Relaxed),
        })
    }

    /// Sum over every tenant and service path.
    #[must_use]
    pub fn totals(&self) -> ReplyCounters {
        self.counters.iter().fold(ReplyCounters::default(), |acc, c| ReplyCounters {
            transport_in_errors: acc.transport_in_errors
                + c.transport_in_errors.load(Ordering::Relaxed),
            responses: acc.responses + c.responses.load(Ordering::Relaxed),
            response_bytes: acc.response_bytes + c.response_bytes.load(Ordering::Relaxed),
        })
    }
}

impl MetricsSink for CounterMetrics {
    fn transport_in_error(&self, tenant: &str, service_path: &str) {
        self.with_counters(tenant, service_path, |c| {
            c.transport_in_errors.fetch_add(1, Ordering::Relaxed);
        });
    }

    fn response_size(&self, tenant: &str, service_path: &str, bytes: usize) {
        self.with_counters(tenant, service_path, |c| {
            c.responses.fetch_add(1, Ordering::Relaxed);
            c.response_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        });
    }
}
