use serde::Serialize;

use crate::aggregate::AggregateSeries;

/// Minimum relative gain over the previous configuration for adding streams
/// to count as worthwhile.
pub const MIN_GAIN: f64 = 0.05;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScalingStep {
    pub config: String,
    pub mean: f64,
    pub peak: f64,
    /// Mean relative to the previous configuration; `None` for the first.
    pub gain: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScalingSummary {
    pub experiment: String,
    pub steps: Vec<ScalingStep>,
    /// First configuration that failed to beat its predecessor by `MIN_GAIN`.
    pub saturated_at: Option<String>,
}

/// `configs` must already be in the catalog's declared order.
pub fn summarize<'a>(
    experiment: &str,
    configs: impl IntoIterator<Item = (&'a str, &'a AggregateSeries)>,
) -> ScalingSummary {
    let mut steps: Vec<ScalingStep> = Vec::new();
    let mut saturated_at = None;

    for (config, aggregate) in configs {
        let mean = aggregate.mean();
        let gain = steps.last().map(|prev| {
            if prev.mean > 0.0 {
                mean / prev.mean - 1.0
            } else if mean > 0.0 {
                f64::INFINITY
            } else {
                0.0
            }
        });
        if saturated_at.is_none() && matches!(gain, Some(g) if g <= MIN_GAIN) {
            saturated_at = Some(config.to_string());
        }
        steps.push(ScalingStep { config: config.to_string(), mean, peak: aggregate.peak(), gain });
    }

    ScalingSummary { experiment: experiment.to_string(), steps, saturated_at }
}
