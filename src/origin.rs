use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::AlignError;
use crate::model::{FlowId, RatePoint, RateSeries};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Shift every flow by its distance from the earliest start timestamp.
    EarliestStart,
    /// Treat every flow as having started at the same instant.
    AssumeCommonStart,
}

/// Offset, in seconds, of each flow from the batch origin. Returned in the
/// same order as the input.
pub fn resolve_offsets(
    starts: &[(FlowId, Option<DateTime<Utc>>)],
    policy: OriginPolicy,
) -> Result<Vec<f64>, AlignError> {
    if policy == OriginPolicy::AssumeCommonStart {
        return Ok(vec![0.0; starts.len()]);
    }

    let mut known = Vec::with_capacity(starts.len());
    for (flow, start) in starts {
        match start {
            Some(ts) => known.push(*ts),
            None => return Err(AlignError::MissingTimestamp { flow: flow.clone() }),
        }
    }

    let Some(origin) = known.iter().min().copied() else {
        return Ok(Vec::new());
    };
    debug!(origin = %origin.to_rfc3339(), flows = known.len(), "Resolved batch origin");

    Ok(known
        .into_iter()
        .map(|ts| {
            let delta = ts - origin;
            // whole microseconds are plenty for 250ms sampling
            delta.num_microseconds().map_or_else(
                || delta.num_milliseconds() as f64 / 1e3,
                |us| us as f64 / 1e6,
            )
        })
        .collect())
}

pub fn shift(series: &RateSeries, offset_secs: f64) -> RateSeries {
    RateSeries {
        label: series.label.clone(),
        points: series
            .points
            .iter()
            .map(|p| RatePoint::new(p.time + offset_secs, p.value))
            .collect(),
    }
}

/// Resolves offsets and applies them. The input series are only borrowed, so
/// on `MissingTimestamp` the caller can retry with another policy without
/// deriving again.
pub fn align_to_origin(
    series: &[RateSeries],
    starts: &[(FlowId, Option<DateTime<Utc>>)],
    policy: OriginPolicy,
) -> Result<Vec<RateSeries>, AlignError> {
    let offsets = resolve_offsets(starts, policy)?;
    Ok(series.iter().zip(offsets).map(|(s, off)| shift(s, off)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn second_flow_shifted_by_its_stagger() {
        let starts = vec![
            (FlowId::new("a"), Some(t0())),
            (FlowId::new("b"), Some(t0() + chrono::Duration::seconds(2))),
        ];
        let series = vec![
            RateSeries::new("a", vec![RatePoint::new(0.25, 1.0), RatePoint::new(0.5, 2.0)]),
            RateSeries::new("b", vec![RatePoint::new(0.25, 3.0), RatePoint::new(0.5, 4.0)]),
        ];
        let shifted = align_to_origin(&series, &starts, OriginPolicy::EarliestStart).unwrap();
        assert_eq!(shifted[0], series[0]);
        assert_eq!(shifted[1].points, vec![RatePoint::new(2.25, 3.0), RatePoint::new(2.5, 4.0)]);
    }

    #[test]
    fn origin_is_the_earliest_regardless_of_order() {
        let starts = vec![
            (FlowId::new("late"), Some(t0() + chrono::Duration::milliseconds(1500))),
            (FlowId::new("early"), Some(t0())),
        ];
        let offsets = resolve_offsets(&starts, OriginPolicy::EarliestStart).unwrap();
        assert_eq!(offsets, vec![1.5, 0.0]);
    }

    #[test]
    fn missing_timestamp_fails_the_batch() {
        let starts = vec![(FlowId::new("a"), Some(t0())), (FlowId::new("b"), None)];
        let err = resolve_offsets(&starts, OriginPolicy::EarliestStart).unwrap_err();
        assert_eq!(err, AlignError::MissingTimestamp { flow: FlowId::new("b") });
    }

    #[test]
    fn common_start_is_an_explicit_choice() {
        let starts = vec![(FlowId::new("a"), None), (FlowId::new("b"), Some(t0()))];
        let offsets = resolve_offsets(&starts, OriginPolicy::AssumeCommonStart).unwrap();
        assert_eq!(offsets, vec![0.0, 0.0]);
    }

    #[test]
    fn empty_batch_has_no_offsets() {
        assert!(resolve_offsets(&[], OriginPolicy::EarliestStart).unwrap().is_empty());
    }
}
