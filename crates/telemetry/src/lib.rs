//! Telemetry, metrics, and observability for the Findixi proximity surface
//!
//! This crate provides:
//! - Structured logging with tracing (compact text or JSON lines)
//! - An in-process metrics registry exportable as JSON
//! - Timers that record elapsed milliseconds into histograms
//!
//! Every value recorded in the registry is also forwarded to the `metrics`
//! facade, so an installed exporter sees the same counters.

#![warn(missing_docs)]
#![warn(clippy::all)]

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

/// Global metrics registry
static METRICS: Lazy<MetricsRegistry> = Lazy::new(MetricsRegistry::new);

/// Global session ID for correlating logs
static SESSION_ID: Lazy<String> = Lazy::new(|| Uuid::new_v4().to_string());

/// Metric names recorded by the discovery engine
pub mod names {
    /// Query rounds started
    pub const QUERIES_ISSUED: &str = "nearby.queries.issued";
    /// Query rounds dropped because a newer round was started
    pub const QUERIES_SUPERSEDED: &str = "nearby.queries.superseded";
    /// Query rounds that failed at the backend
    pub const QUERIES_FAILED: &str = "nearby.queries.failed";
    /// Travel estimates that fell back to the analytic speed buckets
    pub const ROUTING_FALLBACK: &str = "nearby.routing.fallback";
    /// Travel estimates answered by the routing service
    pub const ROUTING_ROUTED: &str = "nearby.routing.routed";
    /// Size of the last committed result set
    pub const RESULTS_COUNT: &str = "nearby.results.count";
    /// Wall time of a full query round
    pub const QUERY_DURATION_MS: &str = "nearby.query.duration_ms";
}

/// Initialize the telemetry system
pub fn init() -> anyhow::Result<()> {
    init_with_config(TelemetryConfig::default())
}

/// Initialize with custom configuration
pub fn init_with_config(config: TelemetryConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(config.show_target)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(config.show_target)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    tracing::info!(
        session_id = %session_id(),
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry initialized"
    );

    Ok(())
}

/// Get the current session ID
pub fn session_id() -> &'static str {
    &SESSION_ID
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Level used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON lines instead of compact text
    pub json: bool,
    /// Include the event target in each line
    pub show_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
            show_target: false,
        }
    }
}

impl TelemetryConfig {
    /// Override the level, e.g. from a `--verbose` flag
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

/// Samples kept per histogram; older ones are evicted first.
pub const HISTOGRAM_WINDOW: usize = 1024;

/// Metrics registry for collecting and exporting metrics
///
/// Histograms keep the latest [`HISTOGRAM_WINDOW`] samples in process;
/// every sample is still forwarded to the `metrics` facade.
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, AtomicU64>>,
    gauges: RwLock<HashMap<String, AtomicU64>>,
    histograms: RwLock<HashMap<String, VecDeque<f64>>>,
    start_time: Instant,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl MetricsRegistry {
    fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Increment a counter
    pub fn increment(&self, name: &str) {
        self.increment_by(name, 1);
    }

    /// Increment a counter by a specific amount
    pub fn increment_by(&self, name: &str, value: u64) {
        metrics::counter!(name.to_string()).increment(value);

        let counters = read(&self.counters);
        if let Some(counter) = counters.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
        } else {
            drop(counters);
            write(&self.counters)
                .entry(name.to_string())
                .or_insert_with(|| AtomicU64::new(0))
                .fetch_add(value, Ordering::Relaxed);
        }
    }

    /// Current value of a counter, zero if never incremented
    pub fn counter(&self, name: &str) -> u64 {
        read(&self.counters)
            .get(name)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Set a gauge value
    #[allow(clippy::cast_precision_loss)]
    pub fn gauge(&self, name: &str, value: u64) {
        metrics::gauge!(name.to_string()).set(value as f64);

        write(&self.gauges)
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .store(value, Ordering::Relaxed);
    }

    /// Record a histogram value
    pub fn histogram(&self, name: &str, value: f64) {
        metrics::histogram!(name.to_string()).record(value);

        let mut histograms = write(&self.histograms);
        let window = histograms.entry(name.to_string()).or_default();
        if window.len() == HISTOGRAM_WINDOW {
            window.pop_front();
        }
        window.push_back(value);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics as JSON
    pub fn export_json(&self) -> serde_json::Value {
        let counter_values: HashMap<String, u64> = read(&self.counters)
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        let gauge_values: HashMap<String, u64> = read(&self.gauges)
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        let histogram_stats: HashMap<String, HistogramStats> = read(&self.histograms)
            .iter()
            .map(|(k, v)| {
                let values: Vec<f64> = v.iter().copied().collect();
                (k.clone(), HistogramStats::from_values(&values))
            })
            .collect();

        serde_json::json!({
            "session_id": session_id(),
            "uptime_secs": self.uptime_secs(),
            "counters": counter_values,
            "gauges": gauge_values,
            "histograms": histogram_stats,
        })
    }
}

/// Histogram statistics
#[derive(Debug, Serialize)]
#[allow(missing_docs)]
pub struct HistogramStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl HistogramStats {
    #[allow(clippy::cast_precision_loss)]
    fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                count: 0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                p50: 0.0,
                p95: 0.0,
                p99: 0.0,
            };
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();

        Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean: sum / count as f64,
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        }
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Get the global metrics registry
pub fn metrics() -> &'static MetricsRegistry {
    &METRICS
}

/// Timer for measuring operation duration
///
/// Records into the named histogram exactly once, either on [`Timer::stop`]
/// or when dropped.
pub struct Timer {
    name: &'static str,
    start: Instant,
    recorded: bool,
}

impl Timer {
    /// Start a new timer
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
            recorded: false,
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        let duration = self.start.elapsed();
        if !self.recorded {
            self.recorded = true;
            metrics().histogram(self.name, duration.as_secs_f64() * 1000.0);
            tracing::debug!(
                metric = self.name,
                duration_ms = duration.as_millis(),
                "Timer completed"
            );
        }
        duration
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.record();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counter() {
        let registry = MetricsRegistry::new();
        registry.increment(names::QUERIES_ISSUED);
        registry.increment(names::QUERIES_ISSUED);
        registry.increment_by(names::QUERIES_ISSUED, 3);

        assert_eq!(registry.counter(names::QUERIES_ISSUED), 5);
        assert_eq!(registry.counter(names::QUERIES_FAILED), 0);
    }

    #[test]
    fn test_metrics_gauge() {
        let registry = MetricsRegistry::new();
        registry.gauge(names::RESULTS_COUNT, 42);
        registry.gauge(names::RESULTS_COUNT, 7);

        let gauges = read(&registry.gauges);
        assert_eq!(gauges.get(names::RESULTS_COUNT).unwrap().load(Ordering::Relaxed), 7);
    }

    #[test]
    fn test_histogram_stats() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let stats = HistogramStats::from_values(&values);

        assert_eq!(stats.count, 10);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 10.0);
        assert_eq!(stats.mean, 5.5);
    }

    #[test]
    fn test_export_json_shape() {
        let registry = MetricsRegistry::new();
        registry.increment(names::ROUTING_FALLBACK);
        registry.histogram(names::QUERY_DURATION_MS, 12.5);

        let json = registry.export_json();
        assert_eq!(json["counters"][names::ROUTING_FALLBACK], 1);
        assert_eq!(json["histograms"][names::QUERY_DURATION_MS]["count"], 1);
    }

    #[test]
    fn test_timer_records_once() {
        let timer = Timer::start("test.timer_records_once");
        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.stop();
        assert!(duration.as_millis() >= 10);

        let histograms = read(&metrics().histograms);
        assert_eq!(histograms.get("test.timer_records_once").map(VecDeque::len), Some(1));
    }

    #[test]
    fn test_histogram_window_is_bounded() {
        let registry = MetricsRegistry::new();
        for i in 0..HISTOGRAM_WINDOW + 10 {
            registry.histogram(names::QUERY_DURATION_MS, i as f64);
        }

        let json = registry.export_json();
        let stats = &json["histograms"][names::QUERY_DURATION_MS];
        assert_eq!(stats["count"], HISTOGRAM_WINDOW);
        assert_eq!(stats["min"], 10.0);
    }

    #[test]
    fn test_session_id() {
        let id = session_id();
        assert!(Uuid::parse_str(id).is_ok());
    }
}
