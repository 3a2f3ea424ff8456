use serde::Serialize;

/// Summary of a sample of `f32` values.
///
/// Mean and variance are accumulated in one pass (Welford) in `f64`, so large
/// populations of similar fitness values keep their precision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    /// Middle value; the mean of the two middle values for even counts.
    pub median: f32,
    /// Population standard deviation.
    pub std_dev: f32,
    #[serde(skip)]
    sorted: Vec<f32>,
}

impl DescriptiveStats {
    /// Summarizes `values`, ignoring NaNs. Returns `None` when nothing is left.
    ///
    /// ```
    /// # use flotilla_stats::descriptive::DescriptiveStats;
    /// let stats = DescriptiveStats::new([3.0, f32::NAN, 1.0, 2.0]).unwrap();
    /// assert_eq!(stats.count, 3);
    /// assert_eq!(stats.median, 2.0);
    /// assert!(DescriptiveStats::new([]).is_none());
    /// ```
    #[must_use]
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f32>,
    {
        let mut sorted = values
            .into_iter()
            .filter(|v| !v.is_nan())
            .collect::<Vec<_>>();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f32::total_cmp);

        let (mut mean, mut m2) = (0.0_f64, 0.0_f64);
        for (i, value) in sorted.iter().enumerate() {
            let x = f64::from(*value);
            #[expect(clippy::cast_precision_loss)]
            let n = (i + 1) as f64;
            let delta = x - mean;
            mean += delta / n;
            m2 += delta * (x - mean);
        }
        let count = sorted.len();
        #[expect(clippy::cast_precision_loss)]
        let variance = m2 / count as f64;
        let mid = count / 2;
        let median = if count % 2 == 0 {
            f32::midpoint(sorted[mid - 1], sorted[mid])
        } else {
            sorted[mid]
        };

        #[expect(clippy::cast_possible_truncation)]
        let (mean, std_dev) = (mean as f32, variance.sqrt() as f32);
        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median,
            std_dev,
            sorted,
        })
    }

    /// Linearly interpolated percentile, `p` in `[0, 100]`.
    #[must_use]
    pub fn percentile(&self, p: f32) -> f32 {
        let p = p.clamp(0.0, 100.0);
        #[expect(clippy::cast_precision_loss)]
        let rank = p / 100.0 * (self.count - 1) as f32;
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let lower = rank.floor() as usize;
        let upper = (lower + 1).min(self.count - 1);
        let frac = rank - rank.floor();
        self.sorted[lower] + (self.sorted[upper] - self.sorted[lower]) * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odd_and_even_medians() {
        let odd = DescriptiveStats::new([5.0, 1.0, 3.0]).unwrap();
        assert_eq!(odd.median, 3.0);
        assert_eq!(odd.min, 1.0);
        assert_eq!(odd.max, 5.0);

        let even = DescriptiveStats::new([4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(even.median, 2.5);
        assert_eq!(even.mean, 2.5);
    }

    #[test]
    fn test_std_dev() {
        let stats = DescriptiveStats::new([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((stats.mean - 5.0).abs() < 1e-6);
        assert!((stats.std_dev - 2.0).abs() < 1e-6);

        let flat = DescriptiveStats::new([0.3; 10]).unwrap();
        assert!(flat.std_dev.abs() < 1e-6);
    }

    #[test]
    fn test_percentiles() {
        let stats = DescriptiveStats::new((0..=10_u8).map(f32::from)).unwrap();
        assert_eq!(stats.percentile(0.0), 0.0);
        assert_eq!(stats.percentile(50.0), 5.0);
        assert_eq!(stats.percentile(100.0), 10.0);
        assert!((stats.percentile(95.0) - 9.5).abs() < 1e-5);
    }
}
