use pdatastructs::tdigest::{TDigest, K1};
use rsslap_core::Histogram;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Latency aggregator shared by every agent of a run.
///
/// Callers need no locking of their own. Each `record` updates the histogram
/// and its count under one lock, so every snapshot sees bucket counts that sum
/// to the number of `record` calls it observed.
pub struct Recorder {
    inner: Mutex<Inner>,
    errors: AtomicU64,
}

struct Inner {
    histogram: Histogram,
    latency: TDigest<K1>,
}

impl Recorder {
    pub fn new(interval: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                histogram: Histogram::new(interval),
                latency: default_tdigest(),
            }),
            errors: AtomicU64::new(0),
        }
    }

    // Each record is applied in full under the lock; a poisoned lock still
    // guards consistent data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, latency: Duration) {
        let mut inner = self.lock();
        inner.histogram.record(latency);
        // Whole nanoseconds keep centroid sums exact, so centroid means stay
        // ordered and within [min, max].
        inner.latency.insert(latency.as_nanos() as f64);
    }

    pub fn count(&self) -> u64 {
        self.lock().histogram.count()
    }

    /// Running count of failed statements, for progress reporting only.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of the histogram. Only final once every agent stopped.
    pub fn snapshot(&self) -> Histogram {
        self.lock().histogram.clone()
    }

    /// Estimated latency at `quantile` (0..=1) over everything recorded.
    pub fn latency(&self, quantile: f64) -> Duration {
        let inner = self.lock();
        let (Some(min), Some(max)) = (inner.histogram.min(), inner.histogram.max()) else {
            return Duration::ZERO;
        };
        if min == max {
            return min;
        }

        let nanos = inner.latency.quantile(quantile);

        // TDigest can yield NaN for degenerate inputs.
        if !nanos.is_finite() {
            error!("Non-finite latency quantile {quantile}; reporting the minimum.");
            return min;
        }

        Duration::from_nanos(nanos.round() as u64).clamp(min, max)
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn records_into_buckets() {
        let recorder = Recorder::new(Duration::from_millis(10));
        recorder.record(Duration::from_millis(3));
        recorder.record(Duration::from_millis(12));
        recorder.record(Duration::from_millis(17));

        let snapshot = recorder.snapshot();
        let buckets: Vec<_> = snapshot.buckets().collect();
        assert_eq!(
            buckets,
            vec![(Duration::ZERO, 1), (Duration::from_millis(10), 2)]
        );
        assert_eq!(recorder.count(), 3);
    }

    #[test]
    fn quantiles_follow_recorded_latencies() {
        let recorder = Recorder::new(Duration::ZERO);
        assert_eq!(recorder.latency(0.5), Duration::ZERO);

        for ms in 1..=100 {
            recorder.record(Duration::from_millis(ms));
        }

        let p50 = recorder.latency(0.5);
        assert!(p50 > Duration::from_millis(40) && p50 < Duration::from_millis(60));
        assert!(recorder.latency(0.99) > Duration::from_millis(90));
    }

    #[test]
    fn identical_latencies_report_that_latency() {
        let latency = Duration::from_millis(10);
        for n in [150, 200, 600, 5_000] {
            let recorder = Recorder::new(Duration::from_millis(1));
            for _ in 0..n {
                recorder.record(latency);
            }

            for q in [0.5, 0.9, 0.99] {
                assert_eq!(recorder.latency(q), latency, "n = {n}, q = {q}");
            }
        }
    }

    #[test]
    fn tied_latencies_stay_within_recorded_range() {
        let fast = Duration::from_millis(10);
        let slow = Duration::from_millis(20);
        let recorder = Recorder::new(Duration::from_millis(1));
        for i in 0..2_000 {
            recorder.record(if i % 4 == 0 { slow } else { fast });
        }

        for q in [0., 0.25, 0.5, 0.9, 0.99, 1.] {
            let p = recorder.latency(q);
            assert!(p >= fast && p <= slow, "q = {q}: {p:?}");
        }
        assert!(recorder.latency(0.5) < Duration::from_millis(15));
        assert!(recorder.latency(0.99) > Duration::from_millis(15));
    }

    #[test]
    fn concurrent_writers() {
        let recorder = Arc::new(Recorder::new(Duration::from_micros(100)));
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let recorder = recorder.clone();
                std::thread::spawn(move || {
                    for i in 0..1_000u64 {
                        recorder.record(Duration::from_micros(t * 37 + i));
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.count(), 8_000);
        assert_eq!(snapshot.buckets().map(|(_, c)| c).sum::<u64>(), 8_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn snapshots_during_recording_are_consistent() {
        let recorder = Arc::new(Recorder::new(Duration::from_micros(50)));
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let recorder = recorder.clone();
                tokio::spawn(async move {
                    for i in 0..5_000u64 {
                        recorder.record(Duration::from_micros(i % 1_000));
                        if i % 500 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                })
            })
            .collect();

        let mut last = 0;
        while last < 20_000 {
            let snapshot = recorder.snapshot();
            assert_eq!(
                snapshot.buckets().map(|(_, c)| c).sum::<u64>(),
                snapshot.count()
            );
            assert!(snapshot.count() >= last);
            last = snapshot.count();
            tokio::task::yield_now().await;
        }

        for writer in writers {
            writer.await.unwrap();
        }
    }
}
