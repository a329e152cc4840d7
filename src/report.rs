use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::catalog::Cell;
use crate::scaling::ScalingSummary;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Line {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

impl Line {
    pub fn new(label: impl Into<String>, points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self { label: label.into(), points: points.into_iter().collect() }
    }

    pub fn peak(&self) -> f64 {
        self.points.iter().map(|&(_, v)| v).fold(0.0, f64::max)
    }
}

/// One chart's worth of series, handed to a sink.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Panel {
    pub title: String,
    pub row: usize,
    pub col: usize,
    pub unit: String,
    pub lines: Vec<Line>,
    pub y_range: (f64, f64),
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    /// Data faults found while deriving and aligning this panel's flows.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub faults: Vec<String>,
}

impl Panel {
    pub fn new(
        title: impl Into<String>,
        cell: Cell,
        unit: impl Into<String>,
        lines: Vec<Line>,
    ) -> Self {
        Self {
            title: title.into(),
            row: cell.row,
            col: cell.col,
            unit: unit.into(),
            lines,
            y_range: (0.0, 0.0),
            mean: None,
            faults: Vec::new(),
        }
    }
}

/// Largest value across every line of every panel, as a `[0, max]` range.
pub fn y_range(panels: &[Panel]) -> (f64, f64) {
    let max = panels
        .iter()
        .flat_map(|p| p.lines.iter())
        .map(Line::peak)
        .fold(0.0, f64::max);
    (0.0, max)
}

/// Gives every panel the same y axis.
pub fn with_shared_range(mut panels: Vec<Panel>) -> Vec<Panel> {
    let range = y_range(&panels);
    for p in &mut panels {
        p.y_range = range;
    }
    panels
}

pub trait ReportSink {
    fn panel(&mut self, panel: &Panel) -> Result<()>;

    fn scaling(&mut self, summary: &ScalingSummary) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Newline-delimited JSON, one object per panel or summary.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn record<T: Serialize>(&mut self, value: &T) -> Result<()> {
        serde_json::to_writer(&mut self.out, value).context("Serializing report")?;
        writeln!(self.out).context("Writing report")?;
        Ok(())
    }
}

impl<W: Write> ReportSink for JsonSink<W> {
    fn panel(&mut self, panel: &Panel) -> Result<()> {
        self.record(panel)
    }

    fn scaling(&mut self, summary: &ScalingSummary) -> Result<()> {
        self.record(summary)
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush().context("Flushing report")
    }
}

/// Tab-separated tables for terminals and shell pipelines.
pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ReportSink for TextSink<W> {
    fn panel(&mut self, panel: &Panel) -> Result<()> {
        let out = &mut self.out;
        writeln!(
            out,
            "# {} [{},{}] y=[{:.3}, {:.3}] {}",
            panel.title, panel.row, panel.col, panel.y_range.0, panel.y_range.1, panel.unit
        )?;
        for line in &panel.lines {
            writeln!(out, "## {}", line.label)?;
            for (t, v) in &line.points {
                writeln!(out, "{t:.6}\t{v:.3}")?;
            }
        }
        if let Some(mean) = panel.mean {
            let peak = panel.lines.iter().map(Line::peak).fold(0.0, f64::max);
            writeln!(out, "# mean {mean:.3} {unit}, peak {peak:.3} {unit}", unit = panel.unit)?;
        }
        for fault in &panel.faults {
            writeln!(out, "# fault {fault}")?;
        }
        writeln!(out)?;
        Ok(())
    }

    fn scaling(&mut self, summary: &ScalingSummary) -> Result<()> {
        let out = &mut self.out;
        writeln!(out, "# {}", summary.experiment)?;
        writeln!(out, "config\tmean\tpeak\tgain")?;
        for step in &summary.steps {
            let gain = step.gain.map_or_else(|| "-".to_string(), |g| format!("{:+.1}%", g * 100.0));
            writeln!(out, "{}\t{:.3}\t{:.3}\t{}", step.config, step.mean, step.peak, gain)?;
        }
        match &summary.saturated_at {
            Some(config) => writeln!(out, "# saturated at {config}")?,
            None => writeln!(out, "# no saturation observed")?,
        }
        writeln!(out)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush().context("Flushing report")
    }
}
