use std::io::Write;

use parking_lot::Mutex;

use crate::metrics::snapshot::GenCacheMetricsSnapshot;
use crate::metrics::traits::MetricsExporter;

/// Prometheus text exporter for cache metrics snapshots.
///
/// This exporter writes in the Prometheus text exposition format so it can be
/// scraped by Prometheus or forwarded to an OpenTelemetry collector. Write
/// errors are dropped: a failing sink must not disturb the cache.
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write + Send> {
    prefix: String,
    writer: Mutex<W>,
}

impl<W: Write + Send> PrometheusTextExporter<W> {
    pub fn new(prefix: impl Into<String>, writer: W) -> Self {
        Self {
            prefix: prefix.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the exporter and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_metric(&self, kind: &str, suffix: &str, value: u64) {
        let name = self.metric_name(suffix);
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {} {}", name, kind);
        let _ = writeln!(writer, "{} {}", name, value);
    }

    fn metric_name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl<W: Write + Send> MetricsExporter<GenCacheMetricsSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &GenCacheMetricsSnapshot) {
        let counters = [
            ("get_calls_total", snapshot.get_calls),
            ("get_hits_total", snapshot.get_hits),
            ("get_misses_total", snapshot.get_misses),
            ("use_calls_total", snapshot.use_calls),
            ("promotions_total", snapshot.promotions),
            ("promotion_skips_total", snapshot.promotion_skips),
            ("inserts_total", snapshot.inserts),
            ("replaces_total", snapshot.replaces),
            ("amends_total", snapshot.amends),
            ("ignores_total", snapshot.ignores),
            ("local_evictions_total", snapshot.local_evictions),
            ("remote_evictions_total", snapshot.remote_evictions),
            ("remote_eviction_misses_total", snapshot.remote_eviction_misses),
            ("deletes_total", snapshot.deletes),
            ("tombstones_total", snapshot.tombstones),
            ("tombstones_reclaimed_total", snapshot.tombstones_reclaimed),
            ("scan_visits_total", snapshot.scan_visits),
        ];
        for (suffix, value) in counters {
            self.write_metric("counter", suffix, value);
        }
        self.write_metric("gauge", "size", snapshot.size as u64);
        self.write_metric("gauge", "limit", snapshot.limit as u64);
        self.write_metric("gauge", "shards", snapshot.shards as u64);
    }
}
