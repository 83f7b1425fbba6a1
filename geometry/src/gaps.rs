//! Angular sampling of an orbit.
//!
//! FDK weights each projection by the angular interval it represents. When the
//! orbit has a hole (a short scan, or an acquisition still in progress), the
//! hole must not be attributed to the projections on either side of it.

use std::f64::consts::{PI, TAU};

use ordered_float::OrderedFloat;

use units::todo::Radiansf64;

/// Gaps larger than this are holes in the orbit rather than sampling steps
pub const SHORT_SCAN_GAP: Radiansf64 = PI / 9.0;

/// Indices of `angles` sorted by their position on the circle
fn sorted_around_circle(angles: &[Radiansf64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..angles.len()).collect();
    order.sort_by_key(|&i| OrderedFloat(angles[i].rem_euclid(TAU)));
    order
}

/// Angle from each projection to the next one, going round the circle in the
/// positive direction.
pub fn angular_gaps_with_next(angles: &[Radiansf64]) -> Vec<Radiansf64> {
    let n = angles.len();
    if n < 2 { return vec![TAU; n] }
    let order = sorted_around_circle(angles);
    let mut gaps = vec![0.0; n];
    for (k, &this) in order.iter().enumerate() {
        let next = order[(k + 1) % n];
        let mut gap = angles[next].rem_euclid(TAU) - angles[this].rem_euclid(TAU);
        if k == n - 1 { gap += TAU }
        gaps[this] = gap;
    }
    gaps
}

/// The projection preceding the largest gap, and the size of that gap
pub fn largest_gap(angles: &[Radiansf64]) -> Option<(usize, Radiansf64)> {
    angular_gaps_with_next(angles)
        .into_iter()
        .enumerate()
        .max_by_key(|&(_, gap)| OrderedFloat(gap))
}

/// Angular interval represented by each projection: half the distance between
/// its neighbours. If the largest gap exceeds `SHORT_SCAN_GAP`, the two
/// projections bordering it are credited with their other gap instead.
pub fn angular_gaps(angles: &[Radiansf64]) -> Vec<Radiansf64> {
    let n = angles.len();
    if n < 2 { return vec![TAU; n] }
    let with_next = angular_gaps_with_next(angles);
    let order = sorted_around_circle(angles);
    let mut gaps = vec![0.0; n];
    for (k, &this) in order.iter().enumerate() {
        let previous = order[(k + n - 1) % n];
        gaps[this] = 0.5 * (with_next[previous] + with_next[this]);
    }

    if let Some((before, gap)) = largest_gap(angles) {
        if gap > SHORT_SCAN_GAP {
            let k = order.iter().position(|&i| i == before).unwrap_or(0);
            let previous = order[(k + n - 1) % n];
            let after    = order[(k + 1) % n];
            gaps[before] = with_next[previous];
            gaps[after]  = with_next[after];
        }
    }
    gaps
}
