/// Linear-interpolation percentile over ascending `sorted` values, `p` in 0..=100.
///
/// The rank is kept as an integer in hundredths so exact inputs give exact
/// outputs: `[100, 200, 300, 400, 500]` yields p50 = 300, p95 = 480, p99 = 496.
pub fn percentile(sorted: &[f64], p: u32) -> f64 {
    match sorted.len() {
        0 => return 0.0,
        1 => return sorted[0],
        _ => {}
    }
    let p = p.min(100) as usize;
    let scaled = p * (sorted.len() - 1);
    let lo = scaled / 100;
    let rem = scaled % 100;
    if rem == 0 || lo + 1 >= sorted.len() {
        return sorted[lo];
    }
    sorted[lo] + (sorted[lo + 1] - sorted[lo]) * rem as f64 / 100.0
}

/// Sorts a copy (NaN-safe) for [`percentile`].
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_interpolation() {
        let v = [100.0, 200.0, 300.0, 400.0, 500.0];
        assert_eq!(percentile(&v, 50), 300.0);
        assert_eq!(percentile(&v, 95), 480.0);
        assert_eq!(percentile(&v, 99), 496.0);
        assert_eq!(percentile(&v, 0), 100.0);
        assert_eq!(percentile(&v, 100), 500.0);
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(percentile(&[], 50), 0.0);
        assert_eq!(percentile(&[42.0], 99), 42.0);
        assert_eq!(percentile(&[1.0, 3.0], 50), 2.0);
    }

    #[test]
    fn sorted_handles_unordered_input() {
        assert_eq!(sorted(&[3.0, 1.0, 2.0]), vec![1.0, 2.0, 3.0]);
    }
}
