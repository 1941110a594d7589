use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use crate::summary::Summary;

/// Number of round-trip times kept for the mean deviation.
pub const MAX_PINGS: usize = 1024;

/// Plain copy of the counters and RTT figures, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatsSnapshot {
    pub transmitted: u32,
    pub received: u32,
    pub rtt_min: f64,
    pub rtt_avg: f64,
    pub rtt_max: f64,
    pub rtt_mdev: f64,
}

impl StatsSnapshot {
    pub fn summarize(&self, destination: &str, start: Instant, end: Instant) -> Summary {
        Summary::new(destination, self, end.saturating_duration_since(start))
    }
}

/// Running statistics of a probe session. Written only by the probe loop.
#[derive(Clone, Debug)]
pub struct Statistics {
    start: Instant,
    transmitted: u32,
    received: u32,
    rtt_min: f64,
    rtt_max: f64,
    rtt_avg: f64,
    rtt_mdev: f64,
    history: Vec<f64>,
}

impl Statistics {
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            transmitted: 0,
            received: 0,
            rtt_min: f64::INFINITY,
            rtt_max: 0.0,
            rtt_avg: 0.0,
            rtt_mdev: 0.0,
            history: Vec::with_capacity(MAX_PINGS),
        }
    }

    pub fn record_send(&mut self) {
        self.transmitted += 1;
    }

    /// Account for a reply that took `ms` milliseconds.
    pub fn record_rtt(&mut self, ms: f64) {
        self.received += 1;
        self.rtt_min = self.rtt_min.min(ms);
        self.rtt_max = self.rtt_max.max(ms);
        let received = self.received as f64;
        // rounding in the running mean may step just outside the extremes
        let rtt_avg = (self.rtt_avg * (received - 1.0) + ms) / received;
        self.rtt_avg = rtt_avg.clamp(self.rtt_min, self.rtt_max);
        if self.history.len() < MAX_PINGS {
            self.history.push(ms);
        }

        // Past MAX_PINGS only the retained prefix contributes to the sum.
        let sum_deviation: f64 = self.history.iter().map(|rtt| (rtt - self.rtt_avg).abs()).sum();
        self.rtt_mdev = sum_deviation / received;
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn transmitted(&self) -> u32 {
        self.transmitted
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            transmitted: self.transmitted,
            received: self.received,
            rtt_min: self.rtt_min,
            rtt_avg: self.rtt_avg,
            rtt_max: self.rtt_max,
            rtt_mdev: self.rtt_mdev,
        }
    }

    pub fn snapshot_for_summary(&self, destination: &str, end: Instant) -> Summary {
        self.snapshot().summarize(destination, self.start, end)
    }
}

/// Word-sized mirror of [`Statistics`] that the interrupt handler reads
/// without coordinating with the probe loop.
///
/// Fields are published one by one, so a reader may observe a partially
/// updated set (a send counted before its reply).
pub struct SharedStats {
    start: Instant,
    transmitted: AtomicU32,
    received: AtomicU32,
    rtt_min: AtomicU64,
    rtt_avg: AtomicU64,
    rtt_max: AtomicU64,
    rtt_mdev: AtomicU64,
}

impl SharedStats {
    pub fn new(start: Instant) -> Self {
        Self::from_statistics(&Statistics::new(start))
    }

    fn from_statistics(stats: &Statistics) -> Self {
        let snapshot = stats.snapshot();
        Self {
            start: stats.start,
            transmitted: AtomicU32::new(snapshot.transmitted),
            received: AtomicU32::new(snapshot.received),
            rtt_min: AtomicU64::new(snapshot.rtt_min.to_bits()),
            rtt_avg: AtomicU64::new(snapshot.rtt_avg.to_bits()),
            rtt_max: AtomicU64::new(snapshot.rtt_max.to_bits()),
            rtt_mdev: AtomicU64::new(snapshot.rtt_mdev.to_bits()),
        }
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    /// Copy the current values of `stats`.
    pub fn publish(&self, stats: &Statistics) {
        let snapshot = stats.snapshot();
        self.rtt_min.store(snapshot.rtt_min.to_bits(), Ordering::Relaxed);
        self.rtt_avg.store(snapshot.rtt_avg.to_bits(), Ordering::Relaxed);
        self.rtt_max.store(snapshot.rtt_max.to_bits(), Ordering::Relaxed);
        self.rtt_mdev.store(snapshot.rtt_mdev.to_bits(), Ordering::Relaxed);
        self.transmitted.store(snapshot.transmitted, Ordering::Release);
        self.received.store(snapshot.received, Ordering::Release);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        // received first: a send is always published before its reply
        let received = self.received.load(Ordering::Acquire);
        let transmitted = self.transmitted.load(Ordering::Acquire);
        StatsSnapshot {
            transmitted,
            received,
            rtt_min: f64::from_bits(self.rtt_min.load(Ordering::Relaxed)),
            rtt_avg: f64::from_bits(self.rtt_avg.load(Ordering::Relaxed)),
            rtt_max: f64::from_bits(self.rtt_max.load(Ordering::Relaxed)),
            rtt_mdev: f64::from_bits(self.rtt_mdev.load(Ordering::Relaxed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_initial_state() {
        let stats = Statistics::new(Instant::now());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.transmitted, 0);
        assert_eq!(snapshot.received, 0);
        assert!(snapshot.rtt_min.is_infinite());
        assert_eq!(snapshot.rtt_max, 0.0);
        assert_eq!(snapshot.rtt_avg, 0.0);
        assert_eq!(snapshot.rtt_mdev, 0.0);
    }

    #[test]
    fn test_three_replies() {
        let mut stats = Statistics::new(Instant::now());
        for rtt in [10.0, 20.0, 30.0] {
            stats.record_send();
            stats.record_rtt(rtt);
        }
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.rtt_min, 10.0);
        assert_eq!(snapshot.rtt_avg, 20.0);
        assert_eq!(snapshot.rtt_max, 30.0);
        assert!(approx_eq(snapshot.rtt_mdev, 20.0 / 3.0));
        assert_eq!(stats.history(), &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_single_reply_has_no_deviation() {
        let mut stats = Statistics::new(Instant::now());
        stats.record_send();
        stats.record_rtt(10.0);
        let snapshot = stats.snapshot();
        assert_eq!((snapshot.rtt_min, snapshot.rtt_avg, snapshot.rtt_max), (10.0, 10.0, 10.0));
        assert_eq!(snapshot.rtt_mdev, 0.0);
    }

    #[test]
    fn test_ordering_invariants() {
        let mut stats = Statistics::new(Instant::now());
        let rtts = [3.25, 0.5, 17.0, 4.75, 4.75, 120.0, 0.125, 9.0];
        for (i, rtt) in rtts.iter().enumerate() {
            stats.record_send();
            stats.record_send();
            stats.record_rtt(*rtt);
            let snapshot = stats.snapshot();
            assert!(snapshot.received <= snapshot.transmitted);
            assert!(snapshot.rtt_min <= snapshot.rtt_avg);
            assert!(snapshot.rtt_avg <= snapshot.rtt_max);
            let mean = rtts[..=i].iter().sum::<f64>() / (i + 1) as f64;
            assert!(approx_eq(snapshot.rtt_avg, mean), "Average must equal the mean of the history");
        }
    }

    #[test]
    fn test_average_stays_within_extremes() {
        for rtt in [0.1, 1.1, 0.3, 2.7] {
            let mut stats = Statistics::new(Instant::now());
            for n in 1..=50 {
                stats.record_send();
                stats.record_rtt(rtt);
                let snapshot = stats.snapshot();
                assert!(
                    snapshot.rtt_min <= snapshot.rtt_avg && snapshot.rtt_avg <= snapshot.rtt_max,
                    "rtt={} n={} min={} avg={} max={}",
                    rtt,
                    n,
                    snapshot.rtt_min,
                    snapshot.rtt_avg,
                    snapshot.rtt_max
                );
            }
        }

        let mut stats = Statistics::new(Instant::now());
        for rtt in [0.1, 1.1, 0.1, 1.1, 0.1] {
            stats.record_send();
            stats.record_rtt(rtt);
            let snapshot = stats.snapshot();
            assert!(snapshot.rtt_min <= snapshot.rtt_avg);
            assert!(snapshot.rtt_avg <= snapshot.rtt_max);
        }
        assert!(approx_eq(stats.snapshot().rtt_avg, 2.5 / 5.0));
    }

    #[test]
    fn test_snapshot_for_summary() {
        let start = Instant::now();
        let mut stats = Statistics::new(start);
        for _ in 0..4 {
            stats.record_send();
        }
        stats.record_rtt(10.0);
        stats.record_rtt(30.0);
        stats.record_rtt(20.0);

        let summary = stats.snapshot_for_summary("example.org", start + Duration::from_millis(3250));
        let text = summary.as_text().unwrap();
        assert!(text.contains("--- example.org ping statistics ---"));
        assert!(text.contains("4 packets transmitted, 3 received, 25% packet loss time 3250ms"));
        assert!(text.contains("rtt min/avg/max/mdev = 10.000/20.000/30.000/6.667 ms"));
        assert_eq!(stats.start(), start);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut stats = Statistics::new(Instant::now());
        for i in 0..(MAX_PINGS + 6) {
            stats.record_send();
            stats.record_rtt(if i < MAX_PINGS { 1.0 } else { 100.0 });
        }
        assert_eq!(stats.history().len(), MAX_PINGS);
        assert_eq!(stats.received() as usize, MAX_PINGS + 6);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.rtt_max, 100.0);
        assert_eq!(snapshot.rtt_min, 1.0);
        // deviation is taken over the retained prefix against the full average
        let expected = MAX_PINGS as f64 * (snapshot.rtt_avg - 1.0).abs() / (MAX_PINGS + 6) as f64;
        assert!(approx_eq(snapshot.rtt_mdev, expected));
    }

    #[test]
    fn test_shared_stats_mirror() {
        let start = Instant::now();
        let mut stats = Statistics::new(start);
        let shared = SharedStats::new(start);
        assert_eq!(shared.snapshot(), stats.snapshot());

        stats.record_send();
        stats.record_rtt(12.5);
        stats.record_send();
        shared.publish(&stats);
        assert_eq!(shared.snapshot(), stats.snapshot());
        assert_eq!(shared.start(), start);
    }
}
