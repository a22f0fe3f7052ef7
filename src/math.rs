//! Small numeric helpers shared by the graph, temporal and fusion stages.

/// Gini coefficient of non-negative values.
///
/// `G = 2·Σ(i·x_i) / (n·Σx) − (n+1)/n` over ascending values with 1-based
/// `i`. No small-sample correction is applied. Returns 0.0 for fewer than
/// two values or an all-zero input; the result is clamped to `[0, 1]`.
pub fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let total: f64 = values.iter().map(|v| v.max(0.0)).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.iter().map(|v| v.max(0.0)).collect();
    sorted.sort_by(f64::total_cmp);

    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, v)| (i + 1) as f64 * v)
        .sum();
    let n = n as f64;
    let g = 2.0 * weighted / (n * total) - (n + 1.0) / n;
    g.clamp(0.0, 1.0)
}

/// Shannon entropy (base 2) of a count distribution. Zero counts are skipped.
pub fn entropy<I>(counts: I) -> f64
where
    I: IntoIterator,
    I::Item: Into<f64>,
{
    let counts: Vec<f64> = counts.into_iter().map(Into::into).collect();
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    counts
        .iter()
        .filter(|&&c| c > 0.0)
        .map(|&c| {
            let p = c / total;
            -p * p.log2()
        })
        .sum()
}

/// Least-squares slope of `values` against their index.
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, &v) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (v - y_mean);
        denominator += dx * dx;
    }
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Coefficient of variation (population standard deviation over mean).
///
/// 0.0 for fewer than two values or a zero mean.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    variance.sqrt() / mean
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Median (average of the two middle values for even lengths).
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_gini_equal_and_degenerate() {
        assert_eq!(gini(&[]), 0.0);
        assert_eq!(gini(&[5.0]), 0.0);
        assert_eq!(gini(&[0.0, 0.0, 0.0]), 0.0);
        assert!(approx_eq(gini(&[3.0, 3.0, 3.0, 3.0]), 0.0));
    }

    #[test]
    fn test_gini_concentrated() {
        // One holder of everything among four: (n-1)/n without correction
        assert!(approx_eq(gini(&[0.0, 0.0, 0.0, 8.0]), 0.75));
        // [1, 3]: 2*(1 + 6)/(2*4) - 3/2 = 0.25
        assert!(approx_eq(gini(&[3.0, 1.0]), 0.25));
    }

    #[test]
    fn test_entropy() {
        assert_eq!(entropy([0.0f64; 3]), 0.0);
        assert!(approx_eq(entropy([4.0, 4.0]), 1.0));
        assert!(approx_eq(entropy([1.0, 1.0, 1.0, 1.0]), 2.0));
        assert!(approx_eq(entropy([7u32, 0]), 0.0));
    }

    #[test]
    fn test_slope_and_cv() {
        assert!(approx_eq(linear_slope(&[10.0, 8.0, 6.0, 4.0]), -2.0));
        assert_eq!(linear_slope(&[3.0]), 0.0);
        assert_eq!(coefficient_of_variation(&[5.0, 5.0, 5.0]), 0.0);
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), 0.0);
        // mean 2, population std 1
        assert!(approx_eq(coefficient_of_variation(&[1.0, 3.0]), 0.5));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn test_clamp01_handles_nan() {
        assert_eq!(clamp01(f64::NAN), 0.0);
        assert_eq!(clamp01(1.7), 1.0);
        assert_eq!(clamp01(-0.2), 0.0);
    }
}
