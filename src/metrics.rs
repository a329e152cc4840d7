use tracing::{trace, warn};

use crate::error::Fault;
use crate::model::{CounterSample, Flow, FlowData, FlowId, RateKind, RatePoint, RateUnit};

/// Output of a rate derivation: the points that survived plus every fault
/// found along the way.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Derivation {
    pub points: Vec<RatePoint>,
    pub faults: Vec<Fault>,
}

/// Turns cumulative counter samples into rate points.
#[derive(Copy, Clone, Debug)]
pub struct RateDeriver {
    unit: RateUnit,
}

impl RateDeriver {
    pub fn new(unit: RateUnit) -> Self {
        Self { unit }
    }

    pub fn derive(&self, flow: &Flow, kind: RateKind) -> Derivation {
        match (&flow.data, kind) {
            (FlowData::Counters(samples), RateKind::Instantaneous) => {
                self.instantaneous(&flow.id, samples)
            }
            (FlowData::Counters(samples), RateKind::Average) => self.average(samples),
            (FlowData::Rates(points), RateKind::Instantaneous) => self.scaled(points),
            (FlowData::Rates(points), RateKind::Average) => self.average_of_rates(&flow.id, points),
        }
    }

    /// Finite difference between adjacent samples, stamped at the later one.
    pub fn instantaneous(&self, flow: &FlowId, samples: &[CounterSample]) -> Derivation {
        let scale = self.unit.scale();
        let mut out = Derivation::default();

        for (i, pair) in samples.windows(2).enumerate() {
            let (prev, cur) = (pair[0], pair[1]);
            let index = i + 1;

            let Some(dt) = cur.elapsed.checked_sub(prev.elapsed) else {
                warn!(flow = %flow, index, "Elapsed time went backwards; skipping point");
                out.faults.push(Fault::TimeRegression { flow: flow.clone(), index });
                continue;
            };
            let Some(dv) = cur.value.checked_sub(prev.value) else {
                warn!(
                    flow = %flow,
                    index,
                    prev = prev.value,
                    cur = cur.value,
                    "Counter regression; skipping point"
                );
                out.faults.push(Fault::CounterRegression { flow: flow.clone(), index });
                continue;
            };
            if dt.is_zero() {
                trace!(flow = %flow, index, "Zero-duration interval skipped");
                continue;
            }

            let rate = dv as f64 / dt.as_secs_f64() * scale;
            out.points.push(RatePoint::new(cur.elapsed.as_secs_f64(), rate));
        }
        out
    }

    /// Total counter value over total elapsed time since the flow started.
    pub fn average(&self, samples: &[CounterSample]) -> Derivation {
        let scale = self.unit.scale();
        let points = samples
            .iter()
            .filter(|s| !s.elapsed.is_zero())
            .map(|s| {
                let secs = s.elapsed.as_secs_f64();
                RatePoint::new(secs, s.value as f64 / secs * scale)
            })
            .collect();
        Derivation { points, faults: Vec::new() }
    }

    // Producer already differenced these, in bytes per second.
    fn scaled(&self, points: &[RatePoint]) -> Derivation {
        let scale = self.unit.scale();
        Derivation {
            points: points.iter().map(|p| RatePoint::new(p.time, p.value * scale)).collect(),
            faults: Vec::new(),
        }
    }

    /// Cumulative average of a precomputed rate series: the trapezoidal
    /// integral up to each point divided by that point's elapsed time.
    pub fn average_of_rates(&self, flow: &FlowId, points: &[RatePoint]) -> Derivation {
        let scale = self.unit.scale();
        let mut out = Derivation::default();
        let Some(first) = points.first() else {
            return out;
        };

        let mut prev = *first;
        let mut area = 0.0;
        if prev.time > 0.0 {
            out.points.push(RatePoint::new(prev.time, prev.value * scale));
            area = prev.value * prev.time;
        }
        for (i, cur) in points.iter().enumerate().skip(1) {
            let dt = cur.time - prev.time;
            if dt < 0.0 {
                warn!(flow = %flow, index = i, "Elapsed time went backwards; skipping point");
                out.faults.push(Fault::TimeRegression { flow: flow.clone(), index: i });
                continue;
            }
            area += dt * (prev.value + cur.value) / 2.0;
            prev = *cur;
            if cur.time > 0.0 {
                out.points.push(RatePoint::new(cur.time, area / cur.time * scale));
            }
        }
        out
    }
}
