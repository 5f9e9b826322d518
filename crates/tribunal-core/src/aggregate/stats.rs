//! Order-independent summary statistics over per-trace scores.

/// Arithmetic mean. Values are summed in sorted order so the result does
/// not depend on the order evaluations arrived in.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.iter().sum::<f64>() / sorted.len() as f64
}

/// Population standard deviation divided by the mean.
///
/// Defined as 0 for fewer than two values, a zero mean, or identical values.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return 0.0;
    }
    let m = mean(values);
    if m == 0.0 {
        return 0.0;
    }
    let mut sq: Vec<f64> = values.iter().map(|v| (v - m).powi(2)).collect();
    sq.sort_by(f64::total_cmp);
    let variance = sq.iter().sum::<f64>() / values.len() as f64;
    variance.sqrt() / m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn mean_is_order_independent() {
        let a = [0.1, 4.7, 2.2, 3.3, 1e-9];
        let b = [3.3, 1e-9, 4.7, 0.1, 2.2];
        assert_eq!(mean(&a), mean(&b));
    }

    #[test]
    fn cv_single_and_identical_values_are_zero() {
        assert_eq!(coefficient_of_variation(&[3.0]), 0.0);
        assert_eq!(coefficient_of_variation(&[4.3, 4.3, 4.3]), 0.0);
    }

    #[test]
    fn cv_alternating_extremes() {
        // mean 3, population sd 2
        let cv = coefficient_of_variation(&[1.0, 5.0, 1.0, 5.0]);
        assert!((cv - 2.0 / 3.0).abs() < 1e-12);
    }
}
