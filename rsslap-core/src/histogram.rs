use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Latency counts bucketed by a fixed interval.
///
/// A bucket is keyed by the latency rounded down to a multiple of the interval.
/// A zero interval collapses every latency into the single bucket `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    interval: Duration,
    buckets: BTreeMap<Duration, u64>,
    count: u64,
    sum: Duration,
    min: Option<Duration>,
    max: Option<Duration>,
}

impl Histogram {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            buckets: BTreeMap::new(),
            count: 0,
            sum: Duration::ZERO,
            min: None,
            max: None,
        }
    }

    /// Key of the bucket `latency` falls into.
    pub fn bucket_of(&self, latency: Duration) -> Duration {
        let width = self.interval.as_nanos();
        if width == 0 {
            return Duration::ZERO;
        }

        let floor = latency.as_nanos() / width * width;
        Duration::from_nanos(u64::try_from(floor).unwrap_or(u64::MAX))
    }

    pub fn record(&mut self, latency: Duration) {
        self.add(latency, 1);
        self.sum = self.sum.saturating_add(latency);
        self.min = Some(self.min.map_or(latency, |m| m.min(latency)));
        self.max = Some(self.max.map_or(latency, |m| m.max(latency)));
    }

    /// Fold `other` into `self`. Buckets of `other` are re-keyed onto this
    /// histogram's interval, so merging histograms of equal interval is
    /// commutative and associative.
    pub fn merge(&mut self, other: &Histogram) {
        for (&bucket, &count) in &other.buckets {
            self.add(bucket, count);
        }

        self.sum = self.sum.saturating_add(other.sum);
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    fn add(&mut self, latency: Duration, count: u64) {
        let bucket = self.bucket_of(latency);
        *self.buckets.entry(bucket).or_insert(0) += count;
        self.count += count;
    }

    /// Total number of recorded latencies; always the sum of all bucket counts.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Buckets in ascending latency order.
    pub fn buckets(&self) -> impl Iterator<Item = (Duration, u64)> + '_ {
        self.buckets.iter().map(|(k, v)| (*k, *v))
    }

    pub fn min(&self) -> Option<Duration> {
        self.min
    }

    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.count == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(
                self.sum.as_secs_f64() / self.count as f64,
            ))
        }
    }
}

impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (bucket, count) in self.buckets() {
            let share = count as f64 / self.count as f64 * 100.;
            writeln!(
                f,
                "{:>12}: {count} ({share:.2}%)",
                humantime::format_duration(bucket).to_string()
            )?;
        }
        Ok(())
    }
}
