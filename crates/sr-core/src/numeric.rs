/// Straight-line map of `x` through the points `(x0, y0)` and `(x1, y1)`,
/// evaluated slope first: `(y1 - y0) / (x1 - x0) * (x - x0) + y0`.
///
/// No clamping: values of `x` outside `[x0, x1]` extrapolate. Callers are
/// expected to have rejected `x0 == x1` when the endpoints were configured.
pub fn lerp(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    let slope = (y1 - y0) / (x1 - x0);
    slope * (x - x0) + y0
}

/// `n` evenly spaced points over `[start, stop]`, both ends included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}
