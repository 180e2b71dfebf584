//! Triangular-weighted random selection (§4.4).
//!
//! Given `n` items where index 0 is most preferred, index `k` is drawn with
//! probability `(n-k) / (n(n+1)/2)`. Implemented as an explicit cumulative
//! distribution rather than the original's `for i = max; i < maxRand; i += (i
//! - 1)` prefix-sum loop, which breaks down at `n <= 1` (§9).

use rand::Rng;

/// Triangular number `n(n+1)/2`, i.e. `n + (n-1) + ... + 1`.
fn triangular(n: usize) -> u64 {
    let n = n as u64;
    n * (n + 1) / 2
}

/// Pick an index in `[0, n)` with triangular weighting favoring index 0.
/// Returns `None` for `n == 0`.
pub fn pick_triangular_weighted(n: usize, rng: &mut impl Rng) -> Option<usize> {
    if n == 0 {
        return None;
    }
    if n == 1 {
        return Some(0);
    }
    let total = triangular(n);
    let mut draw = rng.gen_range(0..total);
    for k in 0..n {
        let weight = (n - k) as u64;
        if draw < weight {
            return Some(k);
        }
        draw -= weight;
    }
    // Unreachable given total sums the full weight range, but keep a safe
    // fallback rather than panicking on a boundary off-by-one.
    Some(n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn n_zero_returns_none() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(pick_triangular_weighted(0, &mut rng), None);
    }

    #[test]
    fn n_one_always_picks_zero() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..10 {
            assert_eq!(pick_triangular_weighted(1, &mut rng), Some(0));
        }
    }

    #[test]
    fn empirical_distribution_matches_triangular_law() {
        const N: usize = 5;
        const TRIALS: u64 = 200_000;
        let mut counts = [0u64; N];
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..TRIALS {
            let k = pick_triangular_weighted(N, &mut rng).unwrap();
            counts[k] += 1;
        }
        let total = triangular(N) as f64;
        for (k, count) in counts.iter().enumerate() {
            let expected = (N - k) as f64 / total;
            let observed = *count as f64 / TRIALS as f64;
            assert!(
                (observed - expected).abs() < 0.01,
                "index {k}: expected {expected:.4}, observed {observed:.4}"
            );
        }
    }

    #[test]
    fn index_zero_is_strictly_most_likely() {
        const N: usize = 8;
        let mut counts = [0u64; N];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50_000 {
            counts[pick_triangular_weighted(N, &mut rng).unwrap()] += 1;
        }
        for k in 1..N {
            assert!(counts[0] > counts[k]);
        }
    }
}
