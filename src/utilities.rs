//! Interpolation and lookup helpers shared by the tabulated data types.

/// Index `i` of the interval with `x[i] <= x_new < x[i + 1]`, for sorted `x`
/// with at least two points and `x[0] <= x_new < x[last]`.
fn bracket(x: &[f64], x_new: f64) -> usize {
    let mut low = 0usize;
    let mut high = x.len() - 1;
    while high - low > 1 {
        let mid = (low + high) >> 1;
        if x[mid] <= x_new {
            low = mid;
        } else {
            high = mid;
        }
    }
    low
}

/// Linear interpolation.
///
/// If `x_new` is outside the range of `x`, returns the first or last y value.
pub fn interpolate_linear(x: &[f64], y: &[f64], x_new: f64) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    if x.len() == 1 || x_new <= x[0] {
        return y[0];
    }
    if x_new >= x[x.len() - 1] {
        return y[y.len() - 1];
    }
    let idx = bracket(x, x_new);
    let (x1, x2) = (x[idx], x[idx + 1]);
    let (y1, y2) = (y[idx], y[idx + 1]);
    y1 + (x_new - x1) * (y2 - y1) / (x2 - x1)
}

/// Linear interpolation that returns 0 outside `[x[0], x[last]]`.
///
/// Tabulated rates use this: below threshold or above the table the process
/// simply does not happen.
pub fn interpolate_or_zero(x: &[f64], y: &[f64], x_new: f64) -> f64 {
    if x.is_empty() || !(x_new >= x[0]) || x_new > x[x.len() - 1] {
        return 0.0;
    }
    if x_new == x[x.len() - 1] {
        return y[y.len() - 1];
    }
    let idx = bracket(x, x_new);
    let (x1, x2) = (x[idx], x[idx + 1]);
    let (y1, y2) = (y[idx], y[idx + 1]);
    y1 + (x_new - x1) * (y2 - y1) / (x2 - x1)
}

/// Index of the grid value nearest to `x_new` (sorted grid).
pub fn closest_index(x: &[f64], x_new: f64) -> usize {
    if x.len() < 2 || x_new <= x[0] {
        return 0;
    }
    if x_new >= x[x.len() - 1] {
        return x.len() - 1;
    }
    let idx = bracket(x, x_new);
    if x_new - x[idx] <= x[idx + 1] - x_new {
        idx
    } else {
        idx + 1
    }
}

/// Decimal digit of `value` at `place` (1, 10, 100, ...).
pub fn digit(value: i64, place: i64) -> i64 {
    (value % (place * 10)) / place
}
