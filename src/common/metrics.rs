//! Probe and bootstrap metrics
//!
//! Prometheus text exposition of:
//! - probe outcome counters per probe kind
//! - probe latency histograms
//! - bootstrap outcome counters

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Histogram bucket boundaries for latency measurements (in milliseconds)
const LATENCY_BUCKETS: [f64; 10] = [
    5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0, 10000.0,
];

/// A simple histogram implementation for latency tracking
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<f64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new() -> Self {
        Self::with_buckets(&LATENCY_BUCKETS)
    }

    pub fn with_buckets(boundaries: &[f64]) -> Self {
        let buckets = (0..=boundaries.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            boundaries: boundaries.to_vec(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value in milliseconds
    pub fn observe(&self, value: f64) {
        let bucket_idx = self
            .boundaries
            .iter()
            .position(|&boundary| value <= boundary)
            .unwrap_or(self.boundaries.len());

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        // microseconds for precision
        self.sum
            .fetch_add((value * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Cumulative bucket counts, ending with +Inf
    pub fn get_buckets(&self) -> Vec<(f64, u64)> {
        let mut cumulative = 0u64;
        let mut result = Vec::with_capacity(self.boundaries.len() + 1);

        for (i, &boundary) in self.boundaries.iter().enumerate() {
            cumulative += self.buckets[i].load(Ordering::Relaxed);
            result.push((boundary, cumulative));
        }

        cumulative += self.buckets[self.boundaries.len()].load(Ordering::Relaxed);
        result.push((f64::INFINITY, cumulative));

        result
    }

    pub fn sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// How a single probe ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Pass,
    Fail,
    /// Terminal recovery marker short-circuited the check
    Skipped,
    Timeout,
}

#[derive(Debug, Default)]
pub struct ProbeMetrics {
    pub passed: Counter,
    pub failed: Counter,
    pub skipped: Counter,
    pub timed_out: Counter,
    pub latency: Histogram,
}

impl ProbeMetrics {
    fn counter(&self, outcome: ProbeOutcome) -> &Counter {
        match outcome {
            ProbeOutcome::Pass => &self.passed,
            ProbeOutcome::Fail => &self.failed,
            ProbeOutcome::Skipped => &self.skipped,
            ProbeOutcome::Timeout => &self.timed_out,
        }
    }
}

pub struct MetricsRegistry {
    probes: Mutex<BTreeMap<String, Arc<ProbeMetrics>>>,
    bootstrap: Mutex<BTreeMap<String, u64>>,
    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            probes: Mutex::new(BTreeMap::new()),
            bootstrap: Mutex::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    pub fn probe(&self, kind: &str) -> Arc<ProbeMetrics> {
        let mut probes = self.probes.lock().unwrap_or_else(|e| e.into_inner());
        probes.entry(kind.to_string()).or_default().clone()
    }

    pub fn record_probe(&self, kind: &str, outcome: ProbeOutcome, duration: Duration) {
        let metrics = self.probe(kind);
        metrics.counter(outcome).inc();
        metrics.latency.observe(duration.as_secs_f64() * 1000.0);
    }

    pub fn record_bootstrap(&self, outcome: &str) {
        let mut bootstrap = self.bootstrap.lock().unwrap_or_else(|e| e.into_inner());
        *bootstrap.entry(outcome.to_string()).or_insert(0) += 1;
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP mysql_sidecar_uptime_seconds Time since process start\n");
        out.push_str("# TYPE mysql_sidecar_uptime_seconds gauge\n");
        out.push_str(&format!(
            "mysql_sidecar_uptime_seconds {}\n",
            self.uptime_seconds()
        ));

        let probes: Vec<(String, Arc<ProbeMetrics>)> = {
            let probes = self.probes.lock().unwrap_or_else(|e| e.into_inner());
            probes.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        out.push_str("# HELP mysql_sidecar_probes_total Probe evaluations by outcome\n");
        out.push_str("# TYPE mysql_sidecar_probes_total counter\n");
        for (kind, metrics) in &probes {
            for (label, counter) in [
                ("pass", &metrics.passed),
                ("fail", &metrics.failed),
                ("skipped", &metrics.skipped),
                ("timeout", &metrics.timed_out),
            ] {
                out.push_str(&format!(
                    "mysql_sidecar_probes_total{{probe=\"{}\",outcome=\"{}\"}} {}\n",
                    kind,
                    label,
                    counter.get()
                ));
            }
        }

        out.push_str("# HELP mysql_sidecar_probe_duration_ms Probe latency\n");
        out.push_str("# TYPE mysql_sidecar_probe_duration_ms histogram\n");
        for (kind, metrics) in &probes {
            for (le, count) in metrics.latency.get_buckets() {
                let le = if le.is_infinite() {
                    "+Inf".to_string()
                } else {
                    le.to_string()
                };
                out.push_str(&format!(
                    "mysql_sidecar_probe_duration_ms_bucket{{probe=\"{}\",le=\"{}\"}} {}\n",
                    kind, le, count
                ));
            }
            out.push_str(&format!(
                "mysql_sidecar_probe_duration_ms_sum{{probe=\"{}\"}} {}\n",
                kind,
                metrics.latency.sum()
            ));
            out.push_str(&format!(
                "mysql_sidecar_probe_duration_ms_count{{probe=\"{}\"}} {}\n",
                kind,
                metrics.latency.count()
            ));
        }

        out.push_str("# HELP mysql_sidecar_bootstrap_total Bootstrap runs by outcome\n");
        out.push_str("# TYPE mysql_sidecar_bootstrap_total counter\n");
        let bootstrap = self.bootstrap.lock().unwrap_or_else(|e| e.into_inner());
        for (outcome, count) in bootstrap.iter() {
            out.push_str(&format!(
                "mysql_sidecar_bootstrap_total{{outcome=\"{}\"}} {}\n",
                outcome, count
            ));
        }

        out
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub static METRICS: once_cell::sync::Lazy<MetricsRegistry> =
    once_cell::sync::Lazy::new(MetricsRegistry::new);
