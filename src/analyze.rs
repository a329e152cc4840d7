use std::io;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::aggregate::AggregateSeries;
use crate::catalog::{ExperimentCatalog, Group, GroupKey};
use crate::cli::{Analyze, OutputFormat};
use crate::model::{Flow, RateUnit};
use crate::pipeline::{analyze, GroupAnalysis, PipelineConfig};
use crate::record::{check_inputs, load_file, InputError};
use crate::report::{with_shared_range, JsonSink, Line, Panel, ReportSink, TextSink};
use crate::scaling::summarize;
use crate::ui::chart::ChartView;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Series,
    Aggregate,
    Scaling,
    View,
}

pub const AGGREGATE_LABEL: &str = "aggregate";

pub fn run_analyze(mode: Mode, args: Analyze) -> Result<()> {
    let catalog = load_catalog(&args)?;
    let config = pipeline_config(&args);

    let mut results: Vec<(Group<'_, Flow>, GroupAnalysis)> = Vec::new();
    for group in catalog.groups() {
        let analysis = analyze(group.items, &config).with_context(|| {
            format!(
                "Aligning group {}/{} (use --assume-common-start to skip timestamps)",
                group.key.root, group.key.sub
            )
        })?;
        results.push((group, analysis));
    }

    let mut sink: Box<dyn ReportSink> = match (mode, args.format) {
        (Mode::View, _) => Box::new(ChartView::new()),
        (_, OutputFormat::Json) => Box::new(JsonSink::new(io::stdout().lock())),
        (_, OutputFormat::Text) => Box::new(TextSink::new(io::stdout().lock())),
    };

    if mode == Mode::Scaling {
        for (root, configs) in by_root(&results) {
            let summary = summarize(root, configs);
            info!(experiment = root, saturated_at = ?summary.saturated_at, "Scaling summary");
            sink.scaling(&summary)?;
        }
    } else {
        let unit = RateUnit::from(args.unit);
        let panels: Vec<Panel> = results
            .iter()
            .map(|(g, a)| build_panel(mode, g, a, unit, args.aligned))
            .collect();
        for panel in with_shared_range(panels) {
            sink.panel(&panel)?;
        }
    }
    sink.finish()
}

fn pipeline_config(args: &Analyze) -> PipelineConfig {
    let defaults = PipelineConfig::default();
    PipelineConfig {
        unit: args.unit.into(),
        kind: args.rate.into(),
        origin: args.origin_policy(),
        jobs: args.jobs.unwrap_or(defaults.jobs),
    }
}

/// Loads every input into the catalog. Malformed flows are reported and
/// skipped; only an input set with nothing usable fails.
pub fn load_catalog(args: &Analyze) -> Result<ExperimentCatalog<Flow>> {
    check_inputs(&args.inputs)?;
    let opts = args.record_options();
    let mut catalog = ExperimentCatalog::with_order(args.order.clone());
    let mut seen = 0usize;

    for path in &args.inputs {
        let mut key = GroupKey::from_path(path);
        if let Some(root) = &args.root {
            key.root = root.clone();
        }
        if let Some(sub) = &args.sub {
            key.sub = sub.clone();
        }
        for flow in load_file(path, &opts)? {
            seen += 1;
            match flow {
                Ok(flow) => {
                    for fault in flow.integrity_faults() {
                        debug!(%fault, "Sample integrity");
                    }
                    catalog.insert(key.clone(), flow);
                }
                Err(err) => warn!(%err, "Skipping flow"),
            }
        }
    }

    if catalog.is_empty() {
        return Err(InputError::NoUsableFlows(seen).into());
    }
    info!(flows = catalog.len(), of = seen, "Loaded flows");
    Ok(catalog)
}

fn build_panel(
    mode: Mode,
    group: &Group<'_, Flow>,
    analysis: &GroupAnalysis,
    unit: RateUnit,
    aligned: bool,
) -> Panel {
    let mut lines: Vec<Line> = Vec::new();
    if matches!(mode, Mode::Series | Mode::View) {
        if aligned {
            let grid = &analysis.alignment.grid;
            lines.extend(analysis.alignment.series.iter().map(|s| {
                Line::new(s.label.clone(), grid.iter().copied().zip(s.values.iter().copied()))
            }));
        } else {
            lines.extend(analysis.flows.iter().map(|s| {
                Line::new(s.label.clone(), s.points.iter().map(|p| (p.time, p.value)))
            }));
        }
    }
    if matches!(mode, Mode::Aggregate | Mode::View) {
        lines.push(Line::new(AGGREGATE_LABEL, analysis.aggregate.points()));
    }
    let title = format!("{}/{}", group.key.root, group.key.sub);
    let mut panel = Panel::new(title, group.cell, unit.symbol(), lines);
    if mode != Mode::Series {
        panel.mean = Some(analysis.aggregate.mean());
    }
    panel.faults = analysis.faults.iter().map(ToString::to_string).collect();
    panel
}

type RootConfigs<'a> = (&'a str, Vec<(&'a str, &'a AggregateSeries)>);

/// Aggregates per experiment, configurations in catalog order.
fn by_root<'a>(results: &'a [(Group<'a, Flow>, GroupAnalysis)]) -> Vec<RootConfigs<'a>> {
    let mut out: Vec<RootConfigs<'a>> = Vec::new();
    for (group, analysis) in results {
        let entry = (group.key.sub.as_str(), &analysis.aggregate);
        match out.last_mut() {
            Some((root, configs)) if *root == group.key.root => configs.push(entry),
            _ => out.push((group.key.root.as_str(), vec![entry])),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn write_archival(dir: &Path, name: &str, start: &str, acked: &[(u64, u64)]) -> PathBuf {
        let measurements: Vec<serde_json::Value> = acked
            .iter()
            .map(|&(t, v)| serde_json::json!({"TCPInfo": {"BytesAcked": v, "ElapsedTime": t}}))
            .collect();
        let record = serde_json::json!({
            "Download": {"UUID": name, "StartTime": start, "ServerMeasurements": measurements}
        });
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(format!("{name}.json"));
        fs::write(&path, record.to_string()).unwrap();
        path
    }

    fn args(extra: &[&str], inputs: &[PathBuf]) -> Analyze {
        let mut argv: Vec<String> = vec!["flowrate".into(), "aggregate".into()];
        argv.extend(extra.iter().map(|s| s.to_string()));
        argv.extend(inputs.iter().map(|p| p.display().to_string()));
        match Cli::try_parse_from(argv).unwrap().command {
            Some(Commands::Aggregate(a)) => a,
            _ => unreachable!(),
        }
    }

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("flowrate-{name}-{}", std::process::id()))
    }

    #[test]
    fn catalog_groups_by_directory_and_skips_malformed() {
        let base = scratch("catalog");
        let a = write_archival(
            &base.join("exp/2"),
            "a",
            "2023-03-01T12:00:00Z",
            &[(0, 0), (1_000_000, 10)],
        );
        let b = write_archival(
            &base.join("exp/1"),
            "b",
            "2023-03-01T12:00:00Z",
            &[(0, 0), (1_000_000, 10)],
        );
        let bad = base.join("exp/1/bad.json");
        fs::write(&bad, "{").unwrap();

        let catalog = load_catalog(&args(&[], &[a, b, bad])).unwrap();
        fs::remove_dir_all(&base).ok();

        let groups = catalog.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, &GroupKey::new("exp", "1"));
        assert_eq!(groups[0].items.len(), 1);
        assert_eq!(groups[1].cell.col, 1);
    }

    #[test]
    fn nothing_usable_is_an_input_error() {
        let base = scratch("unusable");
        fs::create_dir_all(&base).unwrap();
        let bad = base.join("bad.json");
        fs::write(&bad, "[1, 2]").unwrap();

        let err = load_catalog(&args(&[], &[bad])).unwrap_err();
        fs::remove_dir_all(&base).ok();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::NoUsableFlows(2))));
    }

    #[test]
    fn overrides_put_everything_in_one_group() {
        let base = scratch("override");
        let a = write_archival(
            &base.join("x"),
            "a",
            "2023-03-01T12:00:00Z",
            &[(0, 0), (1_000_000, 10)],
        );
        let b = write_archival(
            &base.join("y"),
            "b",
            "2023-03-01T12:00:01Z",
            &[(0, 0), (1_000_000, 10)],
        );
        let catalog = load_catalog(&args(&["--root", "run", "--sub", "4"], &[a, b])).unwrap();
        fs::remove_dir_all(&base).ok();

        let groups = catalog.groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, &GroupKey::new("run", "4"));
        assert_eq!(groups[0].items.len(), 2);
    }

    #[test]
    fn aggregate_panel_carries_sum_and_mean() {
        let base = scratch("panel");
        let a = write_archival(
            &base.join("exp/2"),
            "a",
            "2023-03-01T12:00:00Z",
            &[(0, 0), (1_000_000, 100), (2_000_000, 200)],
        );
        let b = write_archival(
            &base.join("exp/2"),
            "b",
            "2023-03-01T12:00:00Z",
            &[(0, 0), (1_000_000, 50), (2_000_000, 100)],
        );
        let args = args(&["--unit", "bytes"], &[a, b]);
        let catalog = load_catalog(&args).unwrap();
        fs::remove_dir_all(&base).ok();

        let group = catalog.groups().remove(0);
        let analysis = analyze(group.items, &pipeline_config(&args)).unwrap();
        let panel = build_panel(Mode::Aggregate, &group, &analysis, RateUnit::BytesPerSec, false);
        assert_eq!(panel.title, "exp/2");
        assert_eq!(panel.lines.len(), 1);
        assert_eq!(panel.lines[0].points, vec![(1.0, 150.0), (2.0, 150.0)]);
        assert_eq!(panel.mean, Some(150.0));

        let view = build_panel(Mode::View, &group, &analysis, RateUnit::BytesPerSec, false);
        assert_eq!(view.lines.len(), 3);
        assert_eq!(view.lines[2].label, AGGREGATE_LABEL);

        let series = build_panel(Mode::Series, &group, &analysis, RateUnit::BytesPerSec, true);
        assert_eq!(series.mean, None);
        assert_eq!(series.lines[1].points, vec![(1.0, 50.0), (2.0, 50.0)]);
    }

    #[test]
    fn data_faults_are_carried_on_the_panel() {
        let base = scratch("faults");
        let a = write_archival(
            &base.join("exp/1"),
            "a",
            "2023-03-01T12:00:00Z",
            &[(0, 0), (1_000_000, 100), (1_000_000, 50), (2_000_000, 150)],
        );
        let args = args(&["--unit", "bytes"], &[a]);
        let catalog = load_catalog(&args).unwrap();
        fs::remove_dir_all(&base).ok();

        let group = catalog.groups().remove(0);
        let analysis = analyze(group.items, &pipeline_config(&args)).unwrap();
        let panel = build_panel(Mode::Aggregate, &group, &analysis, RateUnit::BytesPerSec, false);
        assert_eq!(panel.faults.len(), 1);
        assert!(panel.faults[0].starts_with("counter regression in flow "));
        assert!(panel.faults[0].ends_with("at sample 2"));
    }
}
