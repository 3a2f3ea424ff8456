//! Parameter vector operations for the genetic algorithm.
//!
//! Network parameters are plain `f32` vectors bounded to `[-max_weight, max_weight]`.
//! These operations are used by [`TournamentBreeder`](crate::evolution::TournamentBreeder)
//! for initialization, crossover and mutation.
//!
//! # Operations
//!
//! - **Initialization**: [`random`] generates uniform parameter vectors
//! - **Crossover**: [`blx_alpha`] implements the BLX-α crossover operator
//! - **Mutation**: [`mutate`] applies Gaussian mutation
//!
//! # Design Decisions
//!
//! ## BLX-α Crossover
//!
//! BLX-α (Blend Crossover) can produce offspring outside the range spanned by the
//! parents, so the population keeps exploring after the initial spread collapses. The
//! `alpha` parameter controls how far beyond the parents a child may land (typical: 0.5).
//!
//! ## Gaussian Mutation
//!
//! Small perturbations are more likely than large jumps. `sigma` controls the
//! magnitude and `rate` the share of parameters touched per child.
//!
//! ## Signed Parameters
//!
//! Unlike feature weights, network weights and biases are signed: an input may
//! inhibit an output. Vectors are clamped symmetrically and never normalized, since
//! scaling a network's weights changes its behaviour.

use rand::Rng;
use rand_distr::Normal;

/// Creates a parameter vector by applying a function to each index.
///
/// # Examples
///
/// ```
/// use flotilla_training::weights;
///
/// let ramp = weights::from_fn(|i| i as f32 * 0.5, 4);
/// assert_eq!(ramp, vec![0.0, 0.5, 1.0, 1.5]);
/// ```
pub fn from_fn<F>(f: F, len: usize) -> Vec<f32>
where
    F: FnMut(usize) -> f32,
{
    (0..len).map(f).collect()
}

/// Generates a parameter vector sampled uniformly from `[-max_weight, max_weight]`.
///
/// Used for the initial population.
pub fn random<R>(rng: &mut R, max_weight: f32, len: usize) -> Vec<f32>
where
    R: Rng + ?Sized,
{
    from_fn(|_| rng.random_range(-max_weight..=max_weight), len)
}

/// Performs BLX-α (Blend Crossover) between two parent vectors.
///
/// For parents `x1` and `x2` at position `i`:
///
/// 1. Compute `d = |x2 - x1|`
/// 2. Expand the range to `[min - α·d, max + α·d]`
/// 3. Sample the child uniformly from the expanded range
/// 4. Clamp to `[-max_weight, max_weight]`
///
/// # Panics
///
/// Panics if the parent vectors have different lengths.
pub fn blx_alpha<R>(p1: &[f32], p2: &[f32], alpha: f32, max_weight: f32, rng: &mut R) -> Vec<f32>
where
    R: Rng + ?Sized,
{
    assert_eq!(p1.len(), p2.len());
    from_fn(
        |i| {
            let min = f32::min(p1[i], p2[i]);
            let max = f32::max(p1[i], p2[i]);
            let d = max - min;
            rng.random_range((min - alpha * d)..=(max + alpha * d))
                .clamp(-max_weight, max_weight)
        },
        p1.len(),
    )
}

/// Applies Gaussian mutation in place.
///
/// Each parameter is, with probability `rate`, perturbed by a sample of `N(0, sigma)`
/// and clamped to `[-max_weight, max_weight]`. A non-positive or non-finite `sigma`
/// leaves the vector unchanged.
///
/// Typical configurations:
///
/// - **Exploration**: `sigma = 0.5`, `rate = 0.2`
/// - **Fine-tuning**: `sigma = 0.1`, `rate = 0.05`
pub fn mutate<R>(parameters: &mut [f32], sigma: f32, max_weight: f32, rate: f32, rng: &mut R)
where
    R: Rng + ?Sized,
{
    if sigma.is_nan() || sigma <= 0.0 {
        return;
    }
    let Ok(normal) = Normal::new(0.0, sigma) else {
        return;
    };
    let rate = f64::from(rate.clamp(0.0, 1.0));
    for p in parameters {
        if rng.random_bool(rate) {
            *p = (*p + rng.sample(normal)).clamp(-max_weight, max_weight);
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    use super::*;

    #[test]
    fn test_random_stays_in_bounds() {
        let mut rng = Pcg64Mcg::seed_from_u64(1);
        let params = random(&mut rng, 2.0, 500);
        assert_eq!(params.len(), 500);
        assert!(params.iter().all(|p| (-2.0..=2.0).contains(p)));
        assert!(params.iter().any(|p| *p < 0.0));
    }

    #[test]
    fn test_blx_alpha_without_expansion_stays_between_parents() {
        let mut rng = Pcg64Mcg::seed_from_u64(2);
        let p1 = [-1.0, 0.0, 0.5];
        let p2 = [1.0, 0.0, -0.5];
        for _ in 0..100 {
            let child = blx_alpha(&p1, &p2, 0.0, 2.0, &mut rng);
            assert!((-1.0..=1.0).contains(&child[0]));
            assert_eq!(child[1], 0.0);
            assert!((-0.5..=0.5).contains(&child[2]));
        }
    }

    #[test]
    fn test_blx_alpha_clamps_expansion() {
        let mut rng = Pcg64Mcg::seed_from_u64(3);
        for _ in 0..100 {
            let child = blx_alpha(&[-1.0], &[1.0], 5.0, 1.5, &mut rng);
            assert!((-1.5..=1.5).contains(&child[0]));
        }
    }

    #[test]
    fn test_mutate_rates() {
        let mut rng = Pcg64Mcg::seed_from_u64(4);
        let mut untouched = vec![0.25; 64];
        mutate(&mut untouched, 0.5, 1.0, 0.0, &mut rng);
        assert!(untouched.iter().all(|p| *p == 0.25));

        let mut all = vec![0.25; 64];
        mutate(&mut all, 0.5, 1.0, 1.0, &mut rng);
        assert!(all.iter().any(|p| *p != 0.25));
        assert!(all.iter().all(|p| (-1.0..=1.0).contains(p)));

        let mut degenerate = vec![0.25; 8];
        mutate(&mut degenerate, f32::NAN, 1.0, 1.0, &mut rng);
        assert!(degenerate.iter().all(|p| *p == 0.25));
    }
}
