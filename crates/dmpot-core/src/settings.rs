use crate::error::{DmResult, DmpotError};
use crate::graph::ReachId;
use crate::objective::{FluxVar, SeriesSpec, StatKind, TimeStep};
use clap::{parser::ValueSource, ArgMatches, Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// How the first run(s) of a campaign obtain parameter values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default,
)]
pub enum InitStrategy {
    /// Uniform-random sweeps across the full bound range for the first
    /// ~0.5% of the run budget, seeding a diverse starting population.
    #[default]
    Random,
    /// A single run with the initial values from the parameter table.
    Provided,
}

impl std::fmt::Display for InitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitStrategy::Random => write!(f, "random"),
            InitStrategy::Provided => write!(f, "provided"),
        }
    }
}

/// Calendar date as plain parts; the campaign never needs timezone-aware
/// arithmetic, only ordering at the configured resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl SimDate {
    pub fn parse(text: &str) -> DmResult<Self> {
        let parts: Vec<&str> = text.trim().split('-').collect();
        if parts.len() != 3 {
            return Err(DmpotError::Config(format!(
                "date '{}' is not in YYYY-MM-DD form",
                text
            )));
        }
        let num = |i: usize| -> DmResult<u32> {
            parts[i]
                .parse::<u32>()
                .map_err(|_| DmpotError::Config(format!("date '{}' has a non-numeric part", text)))
        };
        let date = SimDate {
            year: num(0)? as i32,
            month: num(1)?,
            day: num(2)?,
        };
        if date.month < 1 || date.month > 12 || date.day < 1 || date.day > 31 {
            return Err(DmpotError::Config(format!("date '{}' is out of range", text)));
        }
        Ok(date)
    }

    /// The date truncated to the resolution used for window comparison.
    pub fn truncate(self, step: TimeStep) -> (i32, u32, u32) {
        match step {
            TimeStep::Daily => (self.year, self.month, self.day),
            TimeStep::Monthly => (self.year, self.month, 1),
            TimeStep::Annual => (self.year, 1, 1),
        }
    }
}

/// The scoring window: simulation start shifted past the warm-up years,
/// through the simulation end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimWindow {
    pub start: SimDate,
    pub end: SimDate,
}

impl SimWindow {
    pub fn contains(&self, date: SimDate, step: TimeStep) -> bool {
        let key = date.truncate(step);
        key >= (self.start.year, self.start.month, self.start.day)
            && key <= (self.end.year, self.end.month, self.end.day)
    }
}

/// Campaign control settings. Doubles as the clap argument set of the CLI
/// (every knob is overridable on the command line) and as the JSON schema
/// of the settings file echoed to the outputs directory.
#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Neighborhood perturbation factor r of the DDS algorithm.
    #[arg(long, default_value_t = 0.2)]
    pub perturb_factor: f64,

    /// Total model evaluations in the campaign.
    #[arg(long, default_value_t = 1000)]
    pub total_runs: usize,

    #[arg(long, value_enum, default_value_t = InitStrategy::Random)]
    pub init_strategy: InitStrategy,

    /// Group subareas by outlet so each group calibrates independently.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
    pub group_subareas: bool,

    /// Campaign RNG seed; omitted means a fresh seed each campaign.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Comma-separated outlet reach ids, one per calibrated series.
    #[arg(long, default_value = "6")]
    pub outlet_list: String,

    /// Comma-separated print codes per series (1 daily, 2 monthly, 3 annual).
    #[arg(long, default_value = "2")]
    pub iprint_list: String,

    /// Comma-separated output-variable codes per series (1 = streamflow, ...).
    #[arg(long, default_value = "1")]
    pub variable_list: String,

    /// Comma-separated objective statistic codes per series
    /// (1=1-NSE, 2=PBIAS, 3=RMSE, 4=1-R2, 5=MSE).
    #[arg(long, default_value = "1")]
    pub statistic_list: String,

    /// Comma-separated objective weights per series.
    #[arg(long, default_value = "1.0")]
    pub weight_list: String,

    /// Number of leading simulation years excluded from scoring.
    #[arg(long, default_value_t = 1)]
    pub warm_up_years: u32,

    #[arg(long, default_value = "1995-01-01")]
    pub start_date: String,

    #[arg(long, default_value = "2000-12-31")]
    pub end_date: String,

    /// Simulator executable expected inside the working directory.
    #[arg(long, default_value = "swat2012.681.gfort.rel")]
    pub simulator_exe: String,

    /// Skip the simulator invocation and score whatever reach output the
    /// working directory already holds.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    pub run_simulator: bool,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            perturb_factor: 0.2,
            total_runs: 1000,
            init_strategy: InitStrategy::Random,
            group_subareas: false,
            seed: None,
            outlet_list: "6".to_string(),
            iprint_list: "2".to_string(),
            variable_list: "1".to_string(),
            statistic_list: "1".to_string(),
            weight_list: "1.0".to_string(),
            warm_up_years: 1,
            start_date: "1995-01-01".to_string(),
            end_date: "2000-12-31".to_string(),
            simulator_exe: "swat2012.681.gfort.rel".to_string(),
            run_simulator: true,
        }
    }
}

impl CalibrationSettings {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> DmResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            DmpotError::Config(format!(
                "settings file {} is unreadable: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let settings: CalibrationSettings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Writes the resolved settings into the outputs directory so every
    /// campaign leaves a record of what it actually ran with.
    pub fn echo_to(&self, outputs_dir: &Path) -> DmResult<PathBuf> {
        let path = outputs_dir.join("usrControl.json");
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    /// Grouping by outlet is meaningless with a single outlet; force it
    /// off before the grouper ever runs.
    pub fn normalize(&mut self) -> DmResult<()> {
        let outlets: BTreeSet<ReachId> = self
            .series_specs()?
            .iter()
            .map(|s| s.outlet)
            .collect();
        if outlets.len() == 1 {
            self.group_subareas = false;
        }
        Ok(())
    }

    /// Parses and cross-validates the five parallel series lists into
    /// typed series specs. Any length mismatch or unknown code is a fatal
    /// configuration error.
    pub fn series_specs(&self) -> DmResult<Vec<SeriesSpec>> {
        let outlets = parse_list::<ReachId>(&self.outlet_list, "outlet_list")?;
        let steps = parse_list::<u8>(&self.iprint_list, "iprint_list")?;
        let vars = parse_list::<u8>(&self.variable_list, "variable_list")?;
        let stats = parse_list::<u8>(&self.statistic_list, "statistic_list")?;
        let weights = parse_list::<f64>(&self.weight_list, "weight_list")?;

        let n = outlets.len();
        if n == 0 {
            return Err(DmpotError::Config(
                "at least one calibrated series must be configured".to_string(),
            ));
        }
        if steps.len() != n || vars.len() != n || stats.len() != n || weights.len() != n {
            return Err(DmpotError::Config(format!(
                "series lists must have matching lengths \
                 (outlets {}, iprint {}, variables {}, statistics {}, weights {})",
                n,
                steps.len(),
                vars.len(),
                stats.len(),
                weights.len()
            )));
        }

        let mut specs = Vec::with_capacity(n);
        for i in 0..n {
            let step = TimeStep::from_repr(steps[i]).ok_or_else(|| {
                DmpotError::Config(format!("unknown print code {}", steps[i]))
            })?;
            let var = FluxVar::from_repr(vars[i]).ok_or_else(|| {
                DmpotError::Config(format!("unknown output variable code {}", vars[i]))
            })?;
            if var.rch_column().is_none() {
                return Err(DmpotError::Config(format!(
                    "variable {} ({}) is not printed to the reach output file",
                    vars[i], var
                )));
            }
            let stat = StatKind::from_repr(stats[i]).ok_or_else(|| {
                DmpotError::Config(format!("unknown statistic code {}", stats[i]))
            })?;
            specs.push(SeriesSpec {
                outlet: outlets[i],
                step,
                var,
                stat,
                weight: weights[i],
            });
        }
        specs.sort_by_key(|s| s.sort_key());
        Ok(specs)
    }

    pub fn sim_window(&self) -> DmResult<SimWindow> {
        let start = SimDate::parse(&self.start_date)?;
        let end = SimDate::parse(&self.end_date)?;
        let scoring_start = SimDate {
            year: start.year + self.warm_up_years as i32,
            ..start
        };
        if scoring_start > end {
            return Err(DmpotError::Config(format!(
                "simulation window is empty: start {} plus {} warm-up years passes end {}",
                self.start_date, self.warm_up_years, self.end_date
            )));
        }
        Ok(SimWindow {
            start: scoring_start,
            end,
        })
    }

    /// Overlays values the user actually passed on the command line onto
    /// settings loaded from a file; file values win for untouched flags.
    pub fn merge_from_cli(&mut self, cli: &CalibrationSettings, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($field:ident, $arg_name:expr) => {
                if matches.value_source($arg_name) == Some(ValueSource::CommandLine) {
                    self.$field = cli.$field.clone();
                }
            };
        }

        update_if_present!(perturb_factor, "perturb_factor");
        update_if_present!(total_runs, "total_runs");
        update_if_present!(init_strategy, "init_strategy");
        update_if_present!(group_subareas, "group_subareas");
        update_if_present!(seed, "seed");
        update_if_present!(outlet_list, "outlet_list");
        update_if_present!(iprint_list, "iprint_list");
        update_if_present!(variable_list, "variable_list");
        update_if_present!(statistic_list, "statistic_list");
        update_if_present!(weight_list, "weight_list");
        update_if_present!(warm_up_years, "warm_up_years");
        update_if_present!(start_date, "start_date");
        update_if_present!(end_date, "end_date");
        update_if_present!(simulator_exe, "simulator_exe");
        update_if_present!(run_simulator, "run_simulator");
    }
}

fn parse_list<T: std::str::FromStr>(text: &str, name: &str) -> DmResult<Vec<T>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<T>()
                .map_err(|_| DmpotError::Config(format!("invalid value '{}' in {}", part, name)))
        })
        .collect()
}
