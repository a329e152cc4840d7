use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::{RateKind, RateUnit};
use crate::origin::OriginPolicy;
use crate::record::{InputFormat, MeasurementRole, RecordOptions, Subtest};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print every flow's rate series, one panel per experiment group
    Series(Analyze),
    /// Print the summed throughput of each group's flows
    Aggregate(Analyze),
    /// Compare aggregate throughput across stream-count configurations
    Scaling(Analyze),
    /// Show flows and their aggregate as terminal charts
    View(Analyze),
}

#[derive(Args, Clone, Debug)]
pub struct Analyze {
    /// Flow record files (JSON)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Record layout; detected from the JSON shape by default
    #[arg(long, value_enum, default_value_t = FormatOpt::Auto)]
    pub input_format: FormatOpt,

    /// Which counter of an archival record to use
    #[arg(long, value_enum, default_value_t = RoleOpt::ServerAcked)]
    pub role: RoleOpt,

    /// Subtest of an archival record
    #[arg(long, value_enum, default_value_t = SubtestOpt::Download)]
    pub subtest: SubtestOpt,

    /// Rate definition
    #[arg(long, value_enum, default_value_t = RateOpt::Instant)]
    pub rate: RateOpt,

    /// Rate unit
    #[arg(long, value_enum, default_value_t = UnitOpt::Mbits)]
    pub unit: UnitOpt,

    /// Treat all flows of a group as started together instead of using
    /// their recorded start timestamps
    #[arg(long)]
    pub assume_common_start: bool,

    /// Resample every flow onto the group's common time grid
    #[arg(long)]
    pub aligned: bool,

    /// Explicit ordering of configuration groups (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub order: Vec<String>,

    /// Experiment group for every input, instead of the grand-parent directory
    #[arg(long)]
    pub root: Option<String>,

    /// Configuration group for every input, instead of the parent directory
    #[arg(long)]
    pub sub: Option<String>,

    /// Worker threads for rate derivation (defaults to available cores)
    #[arg(long)]
    pub jobs: Option<NonZeroUsize>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl Analyze {
    pub fn record_options(&self) -> RecordOptions {
        RecordOptions {
            format: self.input_format.into(),
            role: self.role.into(),
            subtest: self.subtest.into(),
        }
    }

    pub fn origin_policy(&self) -> OriginPolicy {
        if self.assume_common_start {
            OriginPolicy::AssumeCommonStart
        } else {
            OriginPolicy::EarliestStart
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(ValueEnum, Copy, Clone, Debug)]
pub enum FormatOpt {
    Auto,
    Archival,
    Rates,
}

impl From<FormatOpt> for InputFormat {
    fn from(v: FormatOpt) -> Self {
        match v {
            FormatOpt::Auto => InputFormat::Auto,
            FormatOpt::Archival => InputFormat::Archival,
            FormatOpt::Rates => InputFormat::Rates,
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug)]
pub enum RoleOpt {
    ClientApp,
    ServerApp,
    ServerAcked,
    ServerSent,
}

impl From<RoleOpt> for MeasurementRole {
    fn from(v: RoleOpt) -> Self {
        match v {
            RoleOpt::ClientApp => MeasurementRole::ClientApp,
            RoleOpt::ServerApp => MeasurementRole::ServerApp,
            RoleOpt::ServerAcked => MeasurementRole::ServerAcked,
            RoleOpt::ServerSent => MeasurementRole::ServerSent,
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug)]
pub enum SubtestOpt {
    Download,
    Upload,
}

impl From<SubtestOpt> for Subtest {
    fn from(v: SubtestOpt) -> Self {
        match v {
            SubtestOpt::Download => Subtest::Download,
            SubtestOpt::Upload => Subtest::Upload,
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug)]
pub enum RateOpt {
    Instant,
    Average,
}

impl From<RateOpt> for RateKind {
    fn from(v: RateOpt) -> Self {
        match v {
            RateOpt::Instant => RateKind::Instantaneous,
            RateOpt::Average => RateKind::Average,
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug)]
pub enum UnitOpt {
    Bytes,
    Bits,
    Mbits,
}

impl From<UnitOpt> for RateUnit {
    fn from(v: UnitOpt) -> Self {
        match v {
            UnitOpt::Bytes => RateUnit::BytesPerSec,
            UnitOpt::Bits => RateUnit::BitsPerSec,
            UnitOpt::Mbits => RateUnit::MegabitsPerSec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_analyze_options() {
        let cli = Cli::try_parse_from([
            "flowrate",
            "aggregate",
            "--unit",
            "bits",
            "--rate",
            "average",
            "--role",
            "client-app",
            "--order",
            "1,2,10",
            "--assume-common-start",
            "--jobs",
            "2",
            "a.json",
            "b.json",
        ])
        .unwrap();
        let Some(Commands::Aggregate(a)) = cli.command else { panic!("expected aggregate") };
        assert_eq!(a.inputs, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
        assert_eq!(RateUnit::from(a.unit), RateUnit::BitsPerSec);
        assert_eq!(RateKind::from(a.rate), RateKind::Average);
        assert_eq!(a.record_options().role, MeasurementRole::ClientApp);
        assert_eq!(a.order, vec!["1", "2", "10"]);
        assert_eq!(a.origin_policy(), OriginPolicy::AssumeCommonStart);
        assert_eq!(a.jobs.map(NonZeroUsize::get), Some(2));
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["flowrate", "series", "x.json"]).unwrap();
        let Some(Commands::Series(a)) = cli.command else { panic!("expected series") };
        assert_eq!(RateUnit::from(a.unit), RateUnit::MegabitsPerSec);
        assert_eq!(a.format, OutputFormat::Text);
        assert_eq!(a.origin_policy(), OriginPolicy::EarliestStart);
        assert_eq!(a.record_options().subtest, Subtest::Download);
    }

    #[test]
    fn inputs_are_required() {
        assert!(Cli::try_parse_from(["flowrate", "view"]).is_err());
    }
}
