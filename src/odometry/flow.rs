//! Median-displacement fallback used when no epipolar geometry is available.

/// Displacements whose |dx| + |dy| falls below this are treated as stationary.
pub const MIN_PIXEL_SHIFT: f64 = 0.5;
/// Scale from median pixel displacement to world-frame position nudge.
pub const FLOW_STEP_SCALE: f64 = 0.002;

/// Median of an unordered slice. Averages the two middle values for even
/// lengths; None for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Component-wise median displacement (current − previous) over matched
/// pixel coordinates. Returns None when the inputs are empty.
pub fn median_flow(previous: &[(f64, f64)], current: &[(f64, f64)]) -> Option<(f64, f64)> {
    let n = previous.len().min(current.len());
    if n == 0 {
        return None;
    }
    let dxs: Vec<f64> = (0..n).map(|i| current[i].0 - previous[i].0).collect();
    let dys: Vec<f64> = (0..n).map(|i| current[i].1 - previous[i].1).collect();
    Some((median(&dxs)?, median(&dys)?))
}
