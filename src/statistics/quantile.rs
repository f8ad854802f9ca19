//! Quantile computation using Type 2 quantiles (inverse empirical CDF with
//! averaging).
//!
//! Threshold calibration selects the (1 - fpr) quantile of a legitimate-only
//! score corpus. Type 2 quantiles (Hyndman & Fan 1996) average at CDF
//! discontinuities, which keeps the empirical false-positive rate close to
//! the target even on small corpora:
//!
//! ```text
//! h = n * p + 0.5
//! q = (x[floor(h)] + x[ceil(h)]) / 2
//! ```
//!
//! # Reference
//!
//! Hyndman, R. J. & Fan, Y. (1996). "Sample quantiles in statistical
//! packages." The American Statistician 50(4):361-365.

/// Compute a single quantile from a mutable slice using Type 2 quantiles.
///
/// Uses `select_nth_unstable_by` for O(n) expected time; the slice is
/// partially reordered as a side effect.
///
/// # Panics
///
/// Panics if `data` is empty or if `p` is outside [0, 1].
pub fn compute_quantile(data: &mut [f64], p: f64) -> f64 {
    assert!(!data.is_empty(), "Cannot compute quantile of empty slice");
    assert!(
        (0.0..=1.0).contains(&p),
        "Quantile probability must be in [0, 1]"
    );

    let n = data.len();
    if n == 1 {
        return data[0];
    }

    // Type 2 quantile: h = n * p + 0.5, 1-based indices.
    let h = n as f64 * p + 0.5;
    let floor_idx = (h.floor() as usize).saturating_sub(1).min(n - 1);
    let ceil_idx = (h.ceil() as usize).saturating_sub(1).min(n - 1);

    if floor_idx == ceil_idx {
        let (_, &mut val, _) = data.select_nth_unstable_by(floor_idx, |a, b| a.total_cmp(b));
        return val;
    }

    // Select the larger index first; everything before it is then <= it,
    // so the second selection stays correct.
    let (_, &mut ceil_val, _) = data.select_nth_unstable_by(ceil_idx, |a, b| a.total_cmp(b));
    let (_, &mut floor_val, _) = data.select_nth_unstable_by(floor_idx, |a, b| a.total_cmp(b));

    (floor_val + ceil_val) / 2.0
}

/// Compute a Type 2 quantile from data already sorted ascending.
///
/// Useful when several quantiles are read from one corpus: sort once, then
/// index directly.
///
/// # Panics
///
/// Panics if `sorted` is empty or if `p` is outside [0, 1]. The caller must
/// ensure the data is sorted; no verification is performed.
pub fn compute_quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    assert!(!sorted.is_empty(), "Cannot compute quantile of empty slice");
    assert!(
        (0.0..=1.0).contains(&p),
        "Quantile probability must be in [0, 1]"
    );

    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }

    let h = n as f64 * p + 0.5;
    let floor_idx = (h.floor() as usize).saturating_sub(1).min(n - 1);
    let ceil_idx = (h.ceil() as usize).saturating_sub(1).min(n - 1);

    (sorted[floor_idx] + sorted[ceil_idx]) / 2.0
}
