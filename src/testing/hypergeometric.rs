//! One-sided hypergeometric test for over-representation

use statrs::function::factorial::ln_binomial;

/// Upper-tail probability `P(X >= k)` for `X ~ Hypergeometric(N, K, n)`
///
/// - `k`: observed overlap between query and gene set
/// - `draws` (n): query size
/// - `successes` (K): gene-set size
/// - `population` (N): universe size
///
/// Terms are summed in log space (log-sum-exp) so large universes do not
/// underflow before the sum.
pub fn hypergeometric_upper_tail(k: usize, draws: usize, successes: usize, population: usize) -> f64 {
    if k == 0 {
        return 1.0;
    }
    let max_i = draws.min(successes);
    if k > max_i {
        return 0.0;
    }
    let failures = population.saturating_sub(successes);
    let log_denom = ln_binomial(population as u64, draws as u64);

    let log_terms: Vec<f64> = (k..=max_i)
        .filter(|&i| draws - i <= failures)
        .map(|i| {
            ln_binomial(successes as u64, i as u64)
                + ln_binomial(failures as u64, (draws - i) as u64)
                - log_denom
        })
        .collect();

    let Some(max_log) = log_terms.iter().cloned().reduce(f64::max) else {
        return 0.0;
    };
    let sum: f64 = log_terms.iter().map(|t| (t - max_log).exp()).sum();
    (max_log + sum.ln()).exp().clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_overlap_is_one() {
        assert_eq!(hypergeometric_upper_tail(0, 10, 20, 100), 1.0);
    }

    #[test]
    fn test_impossible_overlap_is_zero() {
        assert_eq!(hypergeometric_upper_tail(6, 5, 20, 100), 0.0);
    }

    #[test]
    fn test_small_exact_value() {
        // N=10, K=4, n=3: P(X>=2) = [C(4,2)C(6,1) + C(4,3)C(6,0)] / C(10,3) = 40/120
        let p = hypergeometric_upper_tail(2, 3, 4, 10);
        assert!((p - 40.0 / 120.0).abs() < 1e-10, "p = {}", p);
    }

    #[test]
    fn test_query_equals_universe() {
        // Drawing the whole universe always captures every set member
        let p = hypergeometric_upper_tail(15, 100, 15, 100);
        assert!((p - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_large_universe_no_underflow() {
        let p = hypergeometric_upper_tail(40, 50, 60, 20000);
        assert!(p > 0.0 && p < 1e-50);
    }
}
