use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::FlowError;
use crate::model::{CounterSample, Flow, FlowId, RatePoint};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("no input files given")]
    NoInputs,
    #[error("{0} is a directory; pass the flow files explicitly")]
    IsDirectory(PathBuf),
    #[error("none of the {0} flow(s) could be loaded")]
    NoUsableFlows(usize),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputFormat {
    Auto,
    /// One ndt7-style result object per file.
    Archival,
    /// Array of per-stream `{stream, elapsed, rate}` arrays.
    Rates,
}

/// Which counter of an archival record becomes the flow's samples.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MeasurementRole {
    ClientApp,
    ServerApp,
    ServerAcked,
    ServerSent,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Subtest {
    Download,
    Upload,
}

#[derive(Copy, Clone, Debug)]
pub struct RecordOptions {
    pub format: InputFormat,
    pub role: MeasurementRole,
    pub subtest: Subtest,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            format: InputFormat::Auto,
            role: MeasurementRole::ServerAcked,
            subtest: Subtest::Download,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ArchivalResult {
    start_time: Option<String>,
    download: Option<ArchivalData>,
    upload: Option<ArchivalData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ArchivalData {
    #[serde(rename = "UUID")]
    uuid: Option<String>,
    start_time: Option<String>,
    #[serde(default)]
    server_measurements: Vec<Measurement>,
    #[serde(default)]
    client_measurements: Vec<Measurement>,
}

#[derive(Debug, Deserialize)]
struct Measurement {
    #[serde(rename = "AppInfo")]
    app_info: Option<AppInfo>,
    #[serde(rename = "TCPInfo")]
    tcp_info: Option<TcpInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AppInfo {
    num_bytes: i64,
    elapsed_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TcpInfo {
    bytes_acked: Option<i64>,
    bytes_sent: Option<i64>,
    elapsed_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RateRecord {
    elapsed: f64,
    rate: f64,
}

/// Refuses directories and empty input lists; discovery is up to the caller.
pub fn check_inputs(paths: &[PathBuf]) -> Result<(), InputError> {
    if paths.is_empty() {
        return Err(InputError::NoInputs);
    }
    if let Some(dir) = paths.iter().find(|p| p.is_dir()) {
        return Err(InputError::IsDirectory(dir.clone()));
    }
    Ok(())
}

pub fn load_file(path: &Path, opts: &RecordOptions) -> Result<Vec<Result<Flow, FlowError>>> {
    let text = fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let flows = parse_records(&path.display().to_string(), &text, opts);
    debug!(path = %path.display(), flows = flows.len(), "Loaded records");
    Ok(flows)
}

/// Parses one file's worth of records. `source` names the file in flow ids.
pub fn parse_records(
    source: &str,
    text: &str,
    opts: &RecordOptions,
) -> Vec<Result<Flow, FlowError>> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => return vec![Err(malformed(source, format!("invalid JSON: {e}")))],
    };
    let format = match (opts.format, &value) {
        (InputFormat::Auto, Value::Array(_)) => InputFormat::Rates,
        (InputFormat::Auto, _) => InputFormat::Archival,
        (explicit, _) => explicit,
    };
    match format {
        InputFormat::Rates => parse_rates(source, value),
        _ => vec![parse_archival(source, value, opts)],
    }
}

fn malformed(flow: &str, reason: impl Into<String>) -> FlowError {
    FlowError::MalformedSample { flow: FlowId::new(flow), reason: reason.into() }
}

/// Go writes unset timestamps as year 1.
fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(raw?).ok()?.with_timezone(&Utc);
    (ts.year() > 1).then_some(ts)
}

fn parse_archival(source: &str, value: Value, opts: &RecordOptions) -> Result<Flow, FlowError> {
    let result: ArchivalResult =
        serde_json::from_value(value).map_err(|e| malformed(source, e.to_string()))?;
    let data = match opts.subtest {
        Subtest::Download => result.download,
        Subtest::Upload => result.upload,
    }
    .ok_or_else(|| malformed(source, format!("no {:?} data", opts.subtest)))?;

    let id = match &data.uuid {
        Some(uuid) if !uuid.is_empty() => FlowId::new(format!("{source}#{uuid}")),
        _ => FlowId::new(source),
    };
    let start_time = parse_timestamp(data.start_time.as_deref())
        .or_else(|| parse_timestamp(result.start_time.as_deref()));
    if start_time.is_none() {
        warn!(flow = %id, "No parsable start timestamp");
    }

    let measurements = match opts.role {
        MeasurementRole::ClientApp => &data.client_measurements,
        _ => &data.server_measurements,
    };
    let mut samples = Vec::with_capacity(measurements.len());
    for (index, m) in measurements.iter().enumerate() {
        let pair = match opts.role {
            MeasurementRole::ClientApp | MeasurementRole::ServerApp => {
                m.app_info.as_ref().map(|a| (Some(a.elapsed_time), Some(a.num_bytes)))
            }
            MeasurementRole::ServerAcked => {
                m.tcp_info.as_ref().map(|t| (t.elapsed_time, t.bytes_acked))
            }
            MeasurementRole::ServerSent => {
                m.tcp_info.as_ref().map(|t| (t.elapsed_time, t.bytes_sent))
            }
        };
        // other message kinds interleave with the ones we want
        let Some((elapsed, counter)) = pair else { continue };
        let (Some(elapsed), Some(counter)) = (elapsed, counter) else {
            let reason = format!("measurement {index} lacks {:?} fields", opts.role);
            return Err(malformed(id.as_str(), reason));
        };
        let (Ok(elapsed), Ok(counter)) = (u64::try_from(elapsed), u64::try_from(counter)) else {
            return Err(malformed(id.as_str(), format!("measurement {index} has a negative value")));
        };
        samples.push(CounterSample::from_micros(elapsed, counter));
    }

    Ok(Flow::from_counters(id, start_time, samples))
}

fn parse_rates(source: &str, value: Value) -> Vec<Result<Flow, FlowError>> {
    let Value::Array(streams) = value else {
        return vec![Err(malformed(source, "expected an array of streams"))];
    };
    streams
        .into_iter()
        .enumerate()
        .map(|(idx, stream)| {
            let id = FlowId::new(format!("{source}#{idx}"));
            let records: Vec<RateRecord> =
                serde_json::from_value(stream).map_err(|e| malformed(id.as_str(), e.to_string()))?;
            let mut points = Vec::with_capacity(records.len() + 1);
            // the stream has no sample at its own start
            points.push(RatePoint::new(0.0, 0.0));
            for (i, r) in records.iter().enumerate() {
                let finite = r.elapsed.is_finite() && r.rate.is_finite();
                if !finite || r.elapsed < 0.0 || r.rate < 0.0 {
                    return Err(malformed(id.as_str(), format!("record {i} is out of range")));
                }
                points.push(RatePoint::new(r.elapsed, r.rate));
            }
            Ok(Flow::from_rates(id, None, points))
        })
        .collect()
}
