/// Fold the `n`-th sample `x` into a running mean over the previous `n - 1`.
///
/// `n` counts the new sample; `n == 0` returns `x` unchanged.
pub fn running_mean(previous: f64, n: u64, x: f64) -> f64 {
    if n == 0 {
        return x;
    }
    previous + (x - previous) / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_arithmetic_mean() {
        let samples = [120.0, 80.0, 95.5, 3.0, 400.25, 17.0];
        let mut avg = 0.0;
        for (i, x) in samples.iter().enumerate() {
            avg = running_mean(avg, i as u64 + 1, *x);
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((avg - mean).abs() < 1e-9);
    }

    #[test]
    fn test_agrees_with_weighted_form() {
        let mut incremental = 0.0;
        let mut weighted = 0.0;
        for (i, x) in [10.0, 20.0, 35.0, 1.0].iter().enumerate() {
            let n = i as u64 + 1;
            incremental = running_mean(incremental, n, *x);
            weighted = (weighted * (n - 1) as f64 + x) / n as f64;
            assert!((incremental - weighted).abs() < 1e-9);
        }
    }
}
