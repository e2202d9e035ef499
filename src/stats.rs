//! Summary statistics over latency samples, in milliseconds.

/// Linear-interpolated percentile of `samples`, `p` in `0..=100`.
///
/// Works on a sorted copy, the caller's slice is left untouched. Returns `None` for an empty
/// sample.
pub fn percentile(samples: &[f64], p: f64) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let p = p.clamp(0.0, 100.0);
    let k = (sorted.len() - 1) as f64 * p / 100.0;
    let f = k.floor() as usize;
    let c = k - f as f64;
    match sorted.get(f + 1) {
        Some(next) => Some(sorted[f] + c * (next - sorted[f])),
        None => Some(sorted[f]),
    }
}

pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Sample (n - 1) standard deviation. Needs at least two points.
pub fn sample_stdev(samples: &[f64]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let m = mean(samples)?;
    let ss: f64 = samples.iter().map(|x| (x - m).powi(2)).sum();
    Some((ss / (samples.len() - 1) as f64).sqrt())
}

/// Whole-millisecond summary of one endpoint's sample. Every field is rounded up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySummary {
    pub avg: i64,
    pub p10: i64,
    pub p50: i64,
    pub p90: i64,
    pub stdev: i64,
}

impl LatencySummary {
    /// `None` for an empty sample. A single point has a stdev of 0.
    pub fn from_millis(samples: &[f64]) -> Option<Self> {
        let ceil = |v: f64| v.ceil() as i64;
        Some(Self {
            avg: ceil(mean(samples)?),
            p10: ceil(percentile(samples, 10.0)?),
            p50: ceil(percentile(samples, 50.0)?),
            p90: ceil(percentile(samples, 90.0)?),
            stdev: ceil(sample_stdev(samples).unwrap_or(0.0)),
        })
    }
}
