use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Fault;

/// One reading of a cumulative byte counter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CounterSample {
    pub elapsed: Duration,
    pub value: u64,
}

impl CounterSample {
    pub fn new(elapsed: Duration, value: u64) -> Self {
        Self { elapsed, value }
    }

    pub fn from_micros(elapsed_us: u64, value: u64) -> Self {
        Self::new(Duration::from_micros(elapsed_us), value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FlowId(String);

impl FlowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a flow's points come from: raw counters to be differenced, or a
/// series that was already turned into rates by the producer.
#[derive(Clone, Debug, PartialEq)]
pub enum FlowData {
    Counters(Vec<CounterSample>),
    Rates(Vec<RatePoint>),
}

/// One logical stream of measurements, e.g. a single TCP connection.
#[derive(Clone, Debug, PartialEq)]
pub struct Flow {
    pub id: FlowId,
    /// `None` when the record carried no parsable start timestamp.
    pub start_time: Option<DateTime<Utc>>,
    pub data: FlowData,
}

impl Flow {
    pub fn from_counters(
        id: FlowId,
        start_time: Option<DateTime<Utc>>,
        samples: Vec<CounterSample>,
    ) -> Self {
        Self { id, start_time, data: FlowData::Counters(samples) }
    }

    pub fn from_rates(
        id: FlowId,
        start_time: Option<DateTime<Utc>>,
        points: Vec<RatePoint>,
    ) -> Self {
        Self { id, start_time, data: FlowData::Rates(points) }
    }

    pub fn samples(&self) -> &[CounterSample] {
        match &self.data {
            FlowData::Counters(samples) => samples,
            FlowData::Rates(_) => &[],
        }
    }

    /// Reports every sample that goes backwards in time or in value with
    /// respect to its predecessor.
    pub fn integrity_faults(&self) -> Vec<Fault> {
        self.samples()
            .windows(2)
            .enumerate()
            .filter_map(|(i, pair)| {
                let index = i + 1;
                if pair[1].elapsed < pair[0].elapsed {
                    Some(Fault::TimeRegression { flow: self.id.clone(), index })
                } else if pair[1].value < pair[0].value {
                    Some(Fault::CounterRegression { flow: self.id.clone(), index })
                } else {
                    None
                }
            })
            .collect()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct RatePoint {
    /// Seconds since the flow (or the batch origin, once shifted) started.
    pub time: f64,
    pub value: f64,
}

impl RatePoint {
    pub fn new(time: f64, value: f64) -> Self {
        Self { time, value }
    }
}

/// A derived per-flow series with the label it is displayed under.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RateSeries {
    pub label: String,
    pub points: Vec<RatePoint>,
}

impl RateSeries {
    pub fn new(label: impl Into<String>, points: Vec<RatePoint>) -> Self {
        Self { label: label.into(), points }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RateUnit {
    BytesPerSec,
    BitsPerSec,
    MegabitsPerSec,
}

impl RateUnit {
    pub fn scale(self) -> f64 {
        match self {
            RateUnit::BytesPerSec => 1.0,
            RateUnit::BitsPerSec => 8.0,
            RateUnit::MegabitsPerSec => 8.0 / 1e6,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            RateUnit::BytesPerSec => "B/s",
            RateUnit::BitsPerSec => "b/s",
            RateUnit::MegabitsPerSec => "Mb/s",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RateKind {
    Instantaneous,
    Average,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(samples: Vec<CounterSample>) -> Flow {
        Flow::from_counters(FlowId::new("f"), None, samples)
    }

    #[test]
    fn integrity_clean_flow_has_no_faults() {
        let f = flow(vec![
            CounterSample::from_micros(0, 0),
            CounterSample::from_micros(10, 10),
            CounterSample::from_micros(10, 10),
            CounterSample::from_micros(20, 30),
        ]);
        assert!(f.integrity_faults().is_empty());
    }

    #[test]
    fn integrity_reports_regressions_with_index() {
        let f = flow(vec![
            CounterSample::from_micros(0, 0),
            CounterSample::from_micros(10, 50),
            CounterSample::from_micros(20, 40),
            CounterSample::from_micros(15, 60),
        ]);
        let faults = f.integrity_faults();
        assert_eq!(
            faults,
            vec![
                Fault::CounterRegression { flow: FlowId::new("f"), index: 2 },
                Fault::TimeRegression { flow: FlowId::new("f"), index: 3 },
            ]
        );
    }

    #[test]
    fn rate_flows_expose_no_samples() {
        let f = Flow::from_rates(FlowId::new("r"), None, vec![RatePoint::new(1.0, 2.0)]);
        assert!(f.samples().is_empty());
        assert!(f.integrity_faults().is_empty());
    }

    #[test]
    fn unit_scales() {
        assert_eq!(RateUnit::BytesPerSec.scale(), 1.0);
        assert_eq!(RateUnit::BitsPerSec.scale(), 8.0);
        assert!((RateUnit::MegabitsPerSec.scale() * 1e6 - 8.0).abs() < 1e-12);
    }
}
