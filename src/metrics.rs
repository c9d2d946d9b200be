use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Process-wide counters, exposed on `/metrics` and `/metrics/prometheus`.
#[derive(Clone)]
pub struct Metrics {
    pub signups: Arc<AtomicU64>,
    pub logins_succeeded: Arc<AtomicU64>,
    pub logins_failed: Arc<AtomicU64>,
    pub books_created: Arc<AtomicU64>,
    pub books_deleted: Arc<AtomicU64>,
    pub reviews_upserted: Arc<AtomicU64>,
    pub reviews_moderated: Arc<AtomicU64>,
    pub rate_limited: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            signups: Arc::new(AtomicU64::new(0)),
            logins_succeeded: Arc::new(AtomicU64::new(0)),
            logins_failed: Arc::new(AtomicU64::new(0)),
            books_created: Arc::new(AtomicU64::new(0)),
            books_deleted: Arc::new(AtomicU64::new(0)),
            reviews_upserted: Arc::new(AtomicU64::new(0)),
            reviews_moderated: Arc::new(AtomicU64::new(0)),
            rate_limited: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_signups(&self) {
        self.signups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_logins(&self, succeeded: bool) {
        if succeeded {
            self.logins_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.logins_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_books_created(&self) {
        self.books_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_books_deleted(&self) {
        self.books_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reviews_upserted(&self) {
        self.reviews_upserted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reviews_moderated(&self) {
        self.reviews_moderated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            signups: self.signups.load(Ordering::Relaxed),
            logins_succeeded: self.logins_succeeded.load(Ordering::Relaxed),
            logins_failed: self.logins_failed.load(Ordering::Relaxed),
            books_created: self.books_created.load(Ordering::Relaxed),
            books_deleted: self.books_deleted.load(Ordering::Relaxed),
            reviews_upserted: self.reviews_upserted.load(Ordering::Relaxed),
            reviews_moderated: self.reviews_moderated.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub signups: u64,
    pub logins_succeeded: u64,
    pub logins_failed: u64,
    pub books_created: u64,
    pub books_deleted: u64,
    pub reviews_upserted: u64,
    pub reviews_moderated: u64,
    pub rate_limited: u64,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    /// Prometheus text exposition; every series is a counter except uptime.
    pub fn to_prometheus(&self) -> String {
        let series: [(&str, &str, &str, u64); 9] = [
            ("signups_total", "counter", "Accounts created", self.signups),
            ("logins_succeeded_total", "counter", "Successful logins", self.logins_succeeded),
            ("logins_failed_total", "counter", "Rejected logins", self.logins_failed),
            ("books_created_total", "counter", "Books added by admins", self.books_created),
            ("books_deleted_total", "counter", "Books removed by admins", self.books_deleted),
            ("reviews_upserted_total", "counter", "Reviews created or replaced", self.reviews_upserted),
            ("reviews_moderated_total", "counter", "Reviews deleted by admins", self.reviews_moderated),
            ("rate_limited_total", "counter", "Requests rejected with 429", self.rate_limited),
            ("uptime_seconds", "gauge", "Process uptime", self.uptime_seconds),
        ];
        let mut out = String::new();
        for (name, kind, help, value) in series {
            out.push_str(&format!(
                "# HELP bookshelf_{name} {help}\n# TYPE bookshelf_{name} {kind}\nbookshelf_{name} {value}\n"
            ));
        }
        out
    }
}
