//! Supervisor statistics.
//!
//! Counters are plain atomics. Per-run values (lines read, run duration) go
//! through a small mutex-guarded accumulator.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::Instant;

/// Summary of one per-run quantity across all tool runs so far.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    pub runs: u64,
    pub latest: f64,
    pub mean: f64,
    pub lowest: f64,
    pub highest: f64,
}

#[derive(Default)]
struct RunTotals {
    runs: u64,
    total: f64,
    latest: f64,
    lowest: f64,
    highest: f64,
}

impl RunTotals {
    fn observe(&mut self, value: f64) {
        if self.runs == 0 {
            self.lowest = value;
            self.highest = value;
        } else {
            self.lowest = self.lowest.min(value);
            self.highest = self.highest.max(value);
        }
        self.runs += 1;
        self.total += value;
        self.latest = value;
    }

    fn summary(&self) -> RunSummary {
        let mean = if self.runs == 0 {
            0.0
        } else {
            self.total / self.runs as f64
        };
        RunSummary {
            runs: self.runs,
            latest: self.latest,
            mean,
            lowest: self.lowest,
            highest: self.highest,
        }
    }
}

/// One value per finished tool run, e.g. lines read or wall time.
#[derive(Default)]
pub struct PerRunStat {
    totals: Mutex<RunTotals>,
}

impl PerRunStat {
    pub fn observe(&self, value: f64) {
        if let Ok(mut totals) = self.totals.lock() {
            totals.observe(value);
        }
    }

    pub fn summary(&self) -> RunSummary {
        self.totals
            .lock()
            .map(|totals| totals.summary())
            .unwrap_or_default()
    }
}

/// Counters describing the supervisor's life so far.
pub struct SupervisorStats {
    pub launches: AtomicU64,
    pub launch_failures: AtomicU64,
    pub restarts: AtomicU64,
    pub headers_discarded: AtomicU64,
    pub lines_parsed: AtomicU64,
    pub fields_unavailable: AtomicU64,
    pub fields_malformed: AtomicU64,
    pub lines_oversized: AtomicU64,
    pub stream_read_errors: AtomicU64,
    pub reap_failures: AtomicU64,

    /// Data lines per tool run.
    pub lines_per_run: PerRunStat,
    /// Wall time of each tool run in seconds.
    pub run_duration_seconds: PerRunStat,

    pub start_time: Instant,
    pub last_sample_time: StdRwLock<Option<Instant>>,
}

impl Default for SupervisorStats {
    fn default() -> Self {
        Self {
            launches: AtomicU64::new(0),
            launch_failures: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
            headers_discarded: AtomicU64::new(0),
            lines_parsed: AtomicU64::new(0),
            fields_unavailable: AtomicU64::new(0),
            fields_malformed: AtomicU64::new(0),
            lines_oversized: AtomicU64::new(0),
            stream_read_errors: AtomicU64::new(0),
            reap_failures: AtomicU64::new(0),
            lines_per_run: PerRunStat::default(),
            run_duration_seconds: PerRunStat::default(),
            start_time: Instant::now(),
            last_sample_time: StdRwLock::new(None),
        }
    }
}

impl SupervisorStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_launch(&self) {
        self.launches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_launch_failure(&self) {
        self.launch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_header(&self) {
        self.headers_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_line(&self, unavailable: u32, malformed: u32) {
        self.lines_parsed.fetch_add(1, Ordering::Relaxed);
        self.fields_unavailable
            .fetch_add(unavailable as u64, Ordering::Relaxed);
        self.fields_malformed
            .fetch_add(malformed as u64, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_sample_time.write() {
            *guard = Some(Instant::now());
        }
    }

    /// An over-long line was skipped; each of its fields counts as malformed.
    pub fn record_oversized_line(&self, fields: usize) {
        self.lines_oversized.fetch_add(1, Ordering::Relaxed);
        self.fields_malformed
            .fetch_add(fields as u64, Ordering::Relaxed);
    }

    pub fn record_stream_read_error(&self) {
        self.stream_read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reap_failure(&self) {
        self.reap_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run(&self, lines: u64, duration_seconds: f64) {
        self.lines_per_run.observe(lines as f64);
        self.run_duration_seconds.observe(duration_seconds);
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Seconds since the last parsed line, `None` before the first one.
    pub fn seconds_since_last_sample(&self) -> Option<f64> {
        self.last_sample_time
            .read()
            .ok()
            .and_then(|guard| guard.map(|t| t.elapsed().as_secs_f64()))
    }

    /// Percentage of parsed fields that had to be zero-filled.
    pub fn field_failure_percent(&self, fields_per_line: usize) -> f64 {
        let lines = self.lines_parsed.load(Ordering::Relaxed);
        let total = lines * fields_per_line as u64;
        if total == 0 {
            return 0.0;
        }
        let failed = self.fields_unavailable.load(Ordering::Relaxed)
            + self.fields_malformed.load(Ordering::Relaxed);
        (failed as f64 / total as f64) * 100.0
    }

    pub fn render_table(&self) -> String {
        let per_run = [
            ("lines per run", self.lines_per_run.summary()),
            ("run duration (s)", self.run_duration_seconds.summary()),
        ];

        let left_col = 22usize;
        let col_w = 10usize;

        let mut out = String::new();

        writeln!(out, "GPU SAMPLER - SUPERVISOR STATS").ok();
        writeln!(out, "==============================").ok();
        writeln!(out).ok();

        let counters = [
            ("launches", &self.launches),
            ("launch failures", &self.launch_failures),
            ("restarts", &self.restarts),
            ("headers discarded", &self.headers_discarded),
            ("lines parsed", &self.lines_parsed),
            ("fields unavailable", &self.fields_unavailable),
            ("fields malformed", &self.fields_malformed),
            ("lines oversized", &self.lines_oversized),
            ("stream read errors", &self.stream_read_errors),
            ("reap failures", &self.reap_failures),
        ];
        for (label, counter) in counters {
            writeln!(
                out,
                "{:left$} | {:>col$}",
                label,
                counter.load(Ordering::Relaxed),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(
            out,
            "{:left$} | {:>col$} | {:>col$} | {:>col$} | {:>col$}",
            "",
            "latest",
            "mean",
            "highest",
            "lowest",
            left = left_col,
            col = col_w
        )
        .ok();
        for (label, summary) in per_run {
            writeln!(
                out,
                "{:left$} | {:>col$.1} | {:>col$.1} | {:>col$.1} | {:>col$.1}",
                label,
                summary.latest,
                summary.mean,
                summary.highest,
                summary.lowest,
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        match self.seconds_since_last_sample() {
            Some(age) => writeln!(out, "last sample: {:.1}s ago", age).ok(),
            None => writeln!(out, "last sample: N/A").ok(),
        };
        writeln!(out, "uptime: {}s", self.get_uptime_seconds()).ok();

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_run_summary() {
        let stat = PerRunStat::default();
        assert_eq!(stat.summary(), RunSummary::default());

        stat.observe(2.0);
        stat.observe(4.0);
        stat.observe(0.0);
        let summary = stat.summary();
        assert_eq!(summary.runs, 3);
        assert_eq!(summary.mean, 2.0);
        assert_eq!(summary.highest, 4.0);
        assert_eq!(summary.lowest, 0.0);
        assert_eq!(summary.latest, 0.0);
    }

    #[test]
    fn test_oversized_line_counts_fields_as_malformed() {
        let stats = SupervisorStats::new();
        stats.record_oversized_line(2);
        assert_eq!(stats.lines_oversized.load(Ordering::Relaxed), 1);
        assert_eq!(stats.fields_malformed.load(Ordering::Relaxed), 2);
        assert_eq!(stats.lines_parsed.load(Ordering::Relaxed), 0);
        assert!(stats.render_table().contains("lines oversized"));
    }

    #[test]
    fn test_record_line_accumulates_failures() {
        let stats = SupervisorStats::new();
        assert!(stats.seconds_since_last_sample().is_none());

        stats.record_line(1, 0);
        stats.record_line(0, 1);
        stats.record_line(0, 0);

        assert_eq!(stats.lines_parsed.load(Ordering::Relaxed), 3);
        assert_eq!(stats.fields_unavailable.load(Ordering::Relaxed), 1);
        assert_eq!(stats.fields_malformed.load(Ordering::Relaxed), 1);
        assert!(stats.seconds_since_last_sample().is_some());
        // 2 failures out of 3 lines * 2 fields
        let pct = stats.field_failure_percent(2);
        assert!((pct - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_render_table_lists_counters() {
        let stats = SupervisorStats::new();
        stats.record_launch();
        stats.record_restart();
        stats.record_run(10, 12.5);

        let table = stats.render_table();
        assert!(table.contains("launches"));
        assert!(table.contains("restarts"));
        assert!(table.contains("lines per run"));
        assert!(table.contains("last sample: N/A"));
    }
}
