//! Window correlation
//!
//! Pearson correlation between two equally long sample windows, the
//! similarity measure behind the loop search.

/// Pearson correlation coefficient of two windows.
///
/// Returns NaN when either window has zero variance or the windows are
/// empty. Only the common prefix is compared when lengths differ.
pub fn pearson(a: &[f32], b: &[f32]) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return f64::NAN;
    }
    let n = len as f64;

    let (sum_a, sum_b) = a[..len]
        .iter()
        .zip(&b[..len])
        .fold((0.0f64, 0.0f64), |(sa, sb), (&x, &y)| {
            (sa + x as f64, sb + y as f64)
        });
    let mean_a = sum_a / n;
    let mean_b = sum_b / n;

    let mut cov = 0.0f64;
    let mut var_a = 0.0f64;
    let mut var_b = 0.0f64;
    for (&x, &y) in a[..len].iter().zip(&b[..len]) {
        let da = x as f64 - mean_a;
        let db = y as f64 - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    // r = cov / sqrt(var_a * var_b); 0/0 stays NaN
    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

/// Correlation usable as a search score: NaN becomes -1.
#[inline]
pub fn correlation_score(a: &[f32], b: &[f32]) -> f64 {
    let r = pearson(a, b);
    if r.is_nan() {
        -1.0
    } else {
        r
    }
}
