use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::error::Fault;
use crate::model::{FlowId, RatePoint, RateSeries};

/// One series resampled onto a shared grid.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlignedSeries {
    pub label: String,
    #[serde(skip)]
    pub grid: Arc<[f64]>,
    pub values: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Alignment {
    pub grid: Arc<[f64]>,
    pub series: Vec<AlignedSeries>,
    pub warnings: Vec<Fault>,
}

/// Sorts by time and collapses repeated times, the last value winning.
pub fn normalize(points: &[RatePoint]) -> Vec<RatePoint> {
    let mut sorted: Vec<RatePoint> =
        points.iter().copied().filter(|p| p.time.is_finite()).collect();
    sorted.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut out: Vec<RatePoint> = Vec::with_capacity(sorted.len());
    for p in sorted {
        match out.last_mut() {
            Some(last) if last.time == p.time => *last = p,
            _ => out.push(p),
        }
    }
    out
}

/// Sorted union of every distinct time coordinate across `series`.
pub fn union_grid(series: &[Vec<RatePoint>]) -> Vec<f64> {
    let mut grid: Vec<f64> = series.iter().flatten().map(|p| p.time).collect();
    grid.sort_by(f64::total_cmp);
    grid.dedup();
    grid
}

/// Linear interpolation of a normalized series at `t`; `0` outside the
/// series' own domain.
pub fn interpolate(points: &[RatePoint], t: f64) -> f64 {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return 0.0;
    };
    if points.len() < 2 || t < first.time || t > last.time {
        return 0.0;
    }

    // first index with time >= t; in range because t <= last.time
    let hi = points.partition_point(|p| p.time < t);
    let right = points[hi];
    if right.time == t {
        return right.value;
    }
    let left = points[hi - 1];
    let frac = (t - left.time) / (right.time - left.time);
    left.value + (right.value - left.value) * frac
}

pub fn align(series: &[RateSeries]) -> Alignment {
    let normalized: Vec<Vec<RatePoint>> = series.iter().map(|s| normalize(&s.points)).collect();
    let grid: Arc<[f64]> = union_grid(&normalized).into();

    let mut warnings = Vec::new();
    let aligned = series
        .iter()
        .zip(&normalized)
        .map(|(s, points)| {
            let values = if points.len() < 2 {
                warn!(
                    flow = %s.label,
                    points = points.len(),
                    "Too few points to interpolate; contributing zero"
                );
                warnings.push(Fault::InsufficientData { flow: FlowId::new(s.label.clone()) });
                vec![0.0; grid.len()]
            } else {
                grid.iter().map(|&t| interpolate(points, t)).collect()
            };
            AlignedSeries { label: s.label.clone(), grid: Arc::clone(&grid), values }
        })
        .collect();

    Alignment { grid, series: aligned, warnings }
}
