use std::sync::Arc;

use crate::align::{AlignedSeries, Alignment};
use crate::error::AlignError;

#[derive(Clone, Debug, PartialEq)]
pub struct AggregateSeries {
    pub grid: Arc<[f64]>,
    pub values: Vec<f64>,
}

impl AggregateSeries {
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.grid.iter().copied().zip(self.values.iter().copied())
    }

    /// Time-weighted mean over the grid (trapezoidal); `0` for fewer than two
    /// grid points.
    pub fn mean(&self) -> f64 {
        let (Some(first), Some(last)) = (self.grid.first(), self.grid.last()) else {
            return 0.0;
        };
        let span = last - first;
        if span <= 0.0 {
            return 0.0;
        }
        let area: f64 = self
            .grid
            .windows(2)
            .zip(self.values.windows(2))
            .map(|(t, v)| (t[1] - t[0]) * (v[0] + v[1]) / 2.0)
            .sum();
        area / span
    }

    pub fn peak(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }
}

/// Pointwise sum of every series over `grid`.
///
/// Contributions at each grid point are added in ascending order, so the
/// result does not depend on the order of `series`.
pub fn aggregate(
    grid: &Arc<[f64]>,
    series: &[AlignedSeries],
) -> Result<AggregateSeries, AlignError> {
    for s in series {
        if !s.values.is_empty() && s.values.len() != grid.len() {
            return Err(AlignError::GridMismatch {
                label: s.label.clone(),
                expected: grid.len(),
                actual: s.values.len(),
            });
        }
    }
    let contributing: Vec<&[f64]> = series
        .iter()
        .filter(|s| !s.values.is_empty())
        .map(|s| s.values.as_slice())
        .collect();

    let mut column = Vec::with_capacity(contributing.len());
    let values = (0..grid.len())
        .map(|j| {
            column.clear();
            column.extend(contributing.iter().map(|v| v[j]));
            column.sort_by(f64::total_cmp);
            column.iter().sum()
        })
        .collect();

    Ok(AggregateSeries { grid: Arc::clone(grid), values })
}

pub fn aggregate_alignment(alignment: &Alignment) -> Result<AggregateSeries, AlignError> {
    aggregate(&alignment.grid, &alignment.series)
}
