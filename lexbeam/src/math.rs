//! Log-space arithmetic.

/// Differences below this contribute less than `exp(-39.14)` and are skipped.
const MINUS_LOG_THRESHOLD: f64 = -39.14;

/// `ln(exp(a) + exp(b))`, exact for `-inf` operands.
pub fn log_add(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };

    if lo == f64::NEG_INFINITY {
        return hi;
    }

    let diff = lo - hi;
    if diff < MINUS_LOG_THRESHOLD {
        hi
    } else {
        hi + diff.exp().ln_1p()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_probabilities() {
        let sum = log_add(0.5f64.ln(), 0.25f64.ln());
        assert!((sum - 0.75f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn negative_infinity_is_identity() {
        assert_eq!(log_add(-3.0, f64::NEG_INFINITY), -3.0);
        assert_eq!(log_add(f64::NEG_INFINITY, -3.0), -3.0);
        assert_eq!(
            log_add(f64::NEG_INFINITY, f64::NEG_INFINITY),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn skips_negligible_terms() {
        assert_eq!(log_add(0.0, -50.0), 0.0);
    }
}
