//! Process-wide service counters and host resource usage.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use sysinfo::System;

/// Latency samples kept in memory.
pub const LATENCY_HISTORY: usize = 1000;
/// Samples the reported averages are computed over.
pub const LATENCY_WINDOW: usize = 100;

#[derive(Debug, Default)]
struct Counters {
    predictions: u64,
    latencies_ms: VecDeque<f64>,
}

/// Prediction count and recent latencies, created once at startup.
#[derive(Debug)]
pub struct ServiceStats {
    started: Instant,
    counters: Mutex<Counters>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub avg_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_predictions: u64,
    #[serde(flatten)]
    pub latency: LatencySummary,
    pub uptime_seconds: f64,
}

impl Default for ServiceStats {
    fn default() -> Self {
        ServiceStats::new()
    }
}

impl ServiceStats {
    pub fn new() -> ServiceStats {
        ServiceStats { started: Instant::now(), counters: Mutex::new(Counters::default()) }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn record_prediction(&self, latency_ms: f64) {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters.predictions += 1;
        counters.latencies_ms.push_back(latency_ms);
        while counters.latencies_ms.len() > LATENCY_HISTORY {
            counters.latencies_ms.pop_front();
        }
    }

    pub fn prediction_count(&self) -> u64 {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner).predictions
    }

    /// Average, min and max over the most recent [`LATENCY_WINDOW`] samples;
    /// all zero before the first prediction.
    pub fn recent_latency(&self) -> LatencySummary {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = counters.latencies_ms.len().saturating_sub(LATENCY_WINDOW);
        let recent: Vec<f64> = counters.latencies_ms.iter().skip(skip).copied().collect();
        if recent.is_empty() {
            return LatencySummary { avg_latency_ms: 0.0, min_latency_ms: 0.0, max_latency_ms: 0.0 };
        }
        LatencySummary {
            avg_latency_ms: recent.iter().sum::<f64>() / recent.len() as f64,
            min_latency_ms: recent.iter().copied().fold(f64::INFINITY, f64::min),
            max_latency_ms: recent.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_predictions: self.prediction_count(),
            latency: self.recent_latency(),
            uptime_seconds: self.uptime().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemUsage {
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

/// Samples host CPU and memory usage.
///
/// CPU usage is a delta between refreshes, so the first sample reads 0.
pub struct SystemMonitor {
    system: Mutex<System>,
}

impl Default for SystemMonitor {
    fn default() -> Self {
        SystemMonitor::new()
    }
}

impl SystemMonitor {
    pub fn new() -> SystemMonitor {
        SystemMonitor { system: Mutex::new(System::new()) }
    }

    pub fn sample(&self) -> SystemUsage {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_cpu_usage();
        system.refresh_memory();
        let total = system.total_memory();
        let memory_percent = if total == 0 {
            0.0
        } else {
            (system.used_memory() as f64 / total as f64 * 100.0) as f32
        };
        SystemUsage { cpu_percent: system.global_cpu_usage(), memory_percent }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_report_zero_latency() {
        let stats = ServiceStats::new();
        let metrics = stats.metrics();
        assert_eq!(metrics.total_predictions, 0);
        assert_eq!(metrics.latency.avg_latency_ms, 0.0);
    }

    #[test]
    fn latency_summary_covers_only_recent_window() {
        let stats = ServiceStats::new();
        for i in 0..150 {
            stats.record_prediction(i as f64);
        }
        let latency = stats.recent_latency();
        assert_eq!(stats.prediction_count(), 150);
        assert_eq!(latency.min_latency_ms, 50.0);
        assert_eq!(latency.max_latency_ms, 149.0);
        assert!((latency.avg_latency_ms - 99.5).abs() < 1e-9);
    }

    #[test]
    fn history_is_bounded() {
        let stats = ServiceStats::new();
        for _ in 0..(LATENCY_HISTORY + 10) {
            stats.record_prediction(1.0);
        }
        let counters = stats.counters.lock().unwrap();
        assert_eq!(counters.latencies_ms.len(), LATENCY_HISTORY);
        assert_eq!(counters.predictions, (LATENCY_HISTORY + 10) as u64);
    }

    #[test]
    fn system_sample_is_in_percent_range() {
        let usage = SystemMonitor::new().sample();
        assert!((0.0..=100.0).contains(&usage.memory_percent));
        assert!(usage.cpu_percent >= 0.0);
    }
}
