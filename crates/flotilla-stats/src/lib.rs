//! Summary statistics for training reports.
//!
//! - [`descriptive`]: min/max/mean/median/standard deviation and interpolated
//!   percentiles of a sample
//!
//! ```
//! use flotilla_stats::descriptive::DescriptiveStats;
//!
//! let stats = DescriptiveStats::new([0.2, 0.4, 0.6, 0.8]).unwrap();
//! assert!((stats.mean - 0.5).abs() < 1e-6);
//! assert!((stats.median - 0.5).abs() < 1e-6);
//! ```

pub mod descriptive;
