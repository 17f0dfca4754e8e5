//! Batch timing counters and summary statistics.
//!
//! The orchestrator records how long each decode and render took and whether the item succeeded.
//! Callers that want a summary across batches keep one [`StatsCollector`] and hand it to every
//! controller they build.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::warn;

const DEFAULT_SAMPLE_CAPACITY: usize = 240;

#[derive(Debug, Default)]
struct SampleWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SampleWindow {
    fn new(capacity: usize) -> Self {
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    fn push(&mut self, value: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    fn percentile(&self, percentile: f32) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f32> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let rank = percentile.clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
        let index = rank.round() as usize;
        sorted.get(index).copied().unwrap_or(0.0)
    }

    fn mean(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.samples.iter().copied().sum();
        sum / self.samples.len() as f32
    }
}

#[derive(Debug)]
struct StatsInner {
    started_at: Instant,
    decode_times_ms: SampleWindow,
    render_times_ms: SampleWindow,
    batches: u64,
    items_succeeded: u64,
    items_failed: u64,
    bytes_in: u64,
    bytes_out: u64,
}

impl Default for StatsInner {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            decode_times_ms: SampleWindow::new(DEFAULT_SAMPLE_CAPACITY),
            render_times_ms: SampleWindow::new(DEFAULT_SAMPLE_CAPACITY),
            batches: 0,
            items_succeeded: 0,
            items_failed: 0,
            bytes_in: 0,
            bytes_out: 0,
        }
    }
}

/// Thread-safe counter collection fed by the batch orchestrator.
#[derive(Debug, Default)]
pub struct StatsCollector {
    inner: parking_lot::Mutex<StatsInner>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_batch_started(&self) {
        let mut guard = self.inner.lock();
        guard.batches = guard.batches.saturating_add(1);
    }

    pub fn record_decode(&self, duration: Duration) {
        let mut guard = self.inner.lock();
        guard.decode_times_ms.push(duration.as_secs_f64() as f32 * 1_000.0);
    }

    /// Record resample plus encode time for one item.
    pub fn record_render(&self, duration: Duration) {
        let mut guard = self.inner.lock();
        guard.render_times_ms.push(duration.as_secs_f64() as f32 * 1_000.0);
    }

    pub fn record_success(&self, bytes_in: usize, bytes_out: usize) {
        let mut guard = self.inner.lock();
        guard.items_succeeded = guard.items_succeeded.saturating_add(1);
        guard.bytes_in = guard.bytes_in.saturating_add(bytes_in as u64);
        guard.bytes_out = guard.bytes_out.saturating_add(bytes_out as u64);
    }

    pub fn record_failure(&self) {
        let mut guard = self.inner.lock();
        guard.items_failed = guard.items_failed.saturating_add(1);
    }

    pub fn snapshot(&self) -> BatchStatsSnapshot {
        let guard = self.inner.lock();

        let attempted = guard.items_succeeded + guard.items_failed;
        let success_ratio =
            if attempted > 0 { guard.items_succeeded as f32 / attempted as f32 } else { 0.0 };
        let compression_ratio =
            if guard.bytes_in > 0 { guard.bytes_out as f32 / guard.bytes_in as f32 } else { 0.0 };

        BatchStatsSnapshot {
            timestamp_ms: now_ms(),
            uptime_ms: guard.started_at.elapsed().as_millis() as u64,
            batches: guard.batches,
            items_succeeded: guard.items_succeeded,
            items_failed: guard.items_failed,
            success_ratio,
            decode_time_ms_mean: guard.decode_times_ms.mean(),
            decode_time_ms_p50: guard.decode_times_ms.percentile(0.50),
            decode_time_ms_p95: guard.decode_times_ms.percentile(0.95),
            render_time_ms_mean: guard.render_times_ms.mean(),
            render_time_ms_p50: guard.render_times_ms.percentile(0.50),
            render_time_ms_p95: guard.render_times_ms.percentile(0.95),
            bytes_in: guard.bytes_in,
            bytes_out: guard.bytes_out,
            compression_ratio,
        }
    }
}

fn now_ms() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(delta) => delta.as_millis() as u64,
        Err(err) => {
            warn!("system clock error: {err}");
            0
        }
    }
}

/// Immutable snapshot handed to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatsSnapshot {
    pub timestamp_ms: u64,
    pub uptime_ms: u64,
    pub batches: u64,
    pub items_succeeded: u64,
    pub items_failed: u64,
    pub success_ratio: f32,
    pub decode_time_ms_mean: f32,
    pub decode_time_ms_p50: f32,
    pub decode_time_ms_p95: f32,
    pub render_time_ms_mean: f32,
    pub render_time_ms_p50: f32,
    pub render_time_ms_p95: f32,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub compression_ratio: f32,
}
