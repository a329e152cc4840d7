use std::num::NonZeroUsize;
use std::thread;

use chrono::{DateTime, Utc};
use crossbeam_channel as channel;
use tracing::{debug, info};

use crate::aggregate::{aggregate_alignment, AggregateSeries};
use crate::align::{align, Alignment};
use crate::error::{AlignError, Fault};
use crate::metrics::RateDeriver;
use crate::model::{Flow, FlowId, RateKind, RateSeries, RateUnit};
use crate::origin::{align_to_origin, OriginPolicy};
use crate::state::DerivationStore;

#[derive(Copy, Clone, Debug)]
pub struct PipelineConfig {
    pub unit: RateUnit,
    pub kind: RateKind,
    pub origin: OriginPolicy,
    pub jobs: NonZeroUsize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            unit: RateUnit::BytesPerSec,
            kind: RateKind::Instantaneous,
            origin: OriginPolicy::EarliestStart,
            jobs: thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
        }
    }
}

/// A flow's derived series, still on the flow's own clock.
#[derive(Clone, Debug, PartialEq)]
pub struct DerivedFlow {
    pub id: FlowId,
    pub start_time: Option<DateTime<Utc>>,
    pub series: RateSeries,
    pub faults: Vec<Fault>,
}

#[derive(Clone, Debug)]
pub struct GroupAnalysis {
    /// Per-flow series shifted onto the batch origin.
    pub flows: Vec<RateSeries>,
    pub alignment: Alignment,
    pub aggregate: AggregateSeries,
    pub faults: Vec<Fault>,
}

/// Derives every flow on a pool of worker threads. Output order matches
/// `flows` regardless of scheduling.
pub fn derive_all(flows: &[Flow], config: &PipelineConfig) -> Vec<DerivedFlow> {
    let deriver = RateDeriver::new(config.unit);
    let workers = config.jobs.get().min(flows.len()).max(1);
    let store = DerivationStore::new();
    let (work_tx, work_rx) = channel::unbounded::<usize>();
    for index in 0..flows.len() {
        // receiver is alive until the scope below
        let _ = work_tx.send(index);
    }
    drop(work_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let work_rx = work_rx.clone();
            let store = &store;
            scope.spawn(move || {
                while let Ok(index) = work_rx.recv() {
                    let flow = &flows[index];
                    let derivation = deriver.derive(flow, config.kind);
                    debug!(flow = %flow.id, points = derivation.points.len(), "Derived flow");
                    store.insert(index, derivation);
                }
            });
        }
    });
    debug!(derived = store.completed(), workers, "Derivation finished");

    store
        .into_ordered(flows.len())
        .into_iter()
        .zip(flows)
        .map(|(derivation, flow)| DerivedFlow {
            id: flow.id.clone(),
            start_time: flow.start_time,
            series: RateSeries::new(flow.id.to_string(), derivation.points),
            faults: derivation.faults,
        })
        .collect()
}

/// Shifts, aligns and sums already-derived flows. `derived` is borrowed so a
/// `MissingTimestamp` failure can be retried with another origin policy.
pub fn analyze_derived(
    derived: &[DerivedFlow],
    origin: OriginPolicy,
) -> Result<GroupAnalysis, AlignError> {
    let starts: Vec<(FlowId, Option<DateTime<Utc>>)> =
        derived.iter().map(|d| (d.id.clone(), d.start_time)).collect();
    let series: Vec<RateSeries> = derived.iter().map(|d| d.series.clone()).collect();

    let shifted = align_to_origin(&series, &starts, origin)?;
    let alignment = align(&shifted);
    let aggregate = aggregate_alignment(&alignment)?;

    let mut faults: Vec<Fault> = derived.iter().flat_map(|d| d.faults.iter().cloned()).collect();
    faults.extend(alignment.warnings.iter().cloned());
    info!(flows = derived.len(), grid = alignment.grid.len(), "Aggregated group");

    Ok(GroupAnalysis { flows: shifted, alignment, aggregate, faults })
}

pub fn analyze(flows: &[Flow], config: &PipelineConfig) -> Result<GroupAnalysis, AlignError> {
    let derived = derive_all(flows, config);
    analyze_derived(&derived, config.origin)
}
