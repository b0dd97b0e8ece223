use crate::error::{DmResult, DmpotError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use strum_macros::{Display, EnumIter, EnumString};

/// Simulator input-file kind a parameter override targets. Basin-level
/// kinds apply once per watershed; the rest apply per subarea (or per
/// response unit within a subarea).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum FileKind {
    #[strum(serialize = ".bsn")]
    Basin,
    #[strum(serialize = "crop.dat")]
    Crop,
    #[strum(serialize = ".wwq")]
    WaterQuality,
    #[strum(serialize = ".sub")]
    Subarea,
    #[strum(serialize = ".rte")]
    Routing,
    #[strum(serialize = ".swq")]
    StreamQuality,
    #[strum(serialize = ".res")]
    Reservoir,
    #[strum(serialize = ".gw")]
    Groundwater,
    #[strum(serialize = ".hru")]
    ResponseUnit,
    #[strum(serialize = ".mgt")]
    Management,
    #[strum(serialize = ".sol")]
    Soil,
    #[strum(serialize = ".chm")]
    SoilChemistry,
}

impl FileKind {
    pub fn is_basin_level(self) -> bool {
        matches!(
            self,
            FileKind::Basin | FileKind::Crop | FileKind::WaterQuality
        )
    }
}

/// One calibratable scalar's immutable definition. Shared read-only by
/// every subarea group; the per-group mutable state lives in
/// [`ParamValues`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub symbol: String,
    pub file_kind: FileKind,
    pub unit: String,
    pub init_val: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Arena of parameter definitions for one level (basin or subarea).
#[derive(Debug, Clone, Default)]
pub struct ParamTable {
    defs: Vec<ParamDef>,
}

impl ParamTable {
    pub fn from_defs(defs: Vec<ParamDef>) -> Self {
        Self { defs }
    }

    pub fn defs(&self) -> &[ParamDef] {
        &self.defs
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.defs.iter().map(|d| d.symbol.clone()).collect()
    }
}

/// Mutable search state for one group's copy of a parameter table:
/// candidate values, accepted values, and the perturbed-this-run flags.
#[derive(Debug, Clone)]
pub struct ParamValues {
    pub test: Vec<f64>,
    pub best: Vec<f64>,
    pub modified: Vec<bool>,
}

impl ParamValues {
    pub fn new(table: &ParamTable) -> Self {
        let init: Vec<f64> = table.defs.iter().map(|d| d.init_val).collect();
        Self {
            test: init.clone(),
            best: init,
            modified: vec![false; table.len()],
        }
    }

    /// Promotes this run's candidate values to accepted-best.
    pub fn accept(&mut self) {
        self.best.copy_from_slice(&self.test);
    }
}

/// Reads the parameter-definition table: a header line plus one
/// tab-separated row per candidate parameter. Rows whose `selectFlag` is
/// not 1 are excluded from the search space entirely. Returns the
/// basin-level and subarea-level tables.
pub fn load_param_tables<P: AsRef<Path>>(path: P) -> DmResult<(ParamTable, ParamTable)> {
    let file = File::open(path.as_ref()).map_err(|e| {
        DmpotError::Config(format!(
            "parameter definition file {} is unreadable: {}",
            path.as_ref().display(),
            e
        ))
    })?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .has_headers(true)
        .from_reader(file);

    let headers = rdr.headers()?.clone();
    let col = |name: &str| -> DmResult<usize> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| {
                DmpotError::Config(format!("parameter table is missing the '{}' column", name))
            })
    };
    let c_symbol = col("Symbol")?;
    let c_file = col("File")?;
    let c_unit = col("Unit")?;
    let c_init = col("InitVal")?;
    let c_select = col("selectFlag")?;
    let c_lower = col("LowerBound")?;
    let c_upper = col("UpperBound")?;

    let mut basin = ParamTable::default();
    let mut subarea = ParamTable::default();

    for record in rdr.records() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();

        let selected = field(c_select).parse::<i64>().unwrap_or(0) == 1;
        if !selected {
            continue;
        }

        let symbol = field(c_symbol);
        let file_kind: FileKind = field(c_file).parse().map_err(|_| {
            DmpotError::Config(format!(
                "parameter {}: unknown target file kind '{}'",
                symbol,
                field(c_file)
            ))
        })?;
        let parse_num = |idx: usize, name: &str| -> DmResult<f64> {
            field(idx).parse::<f64>().map_err(|_| {
                DmpotError::Config(format!(
                    "parameter {}: '{}' is not a number ({})",
                    symbol,
                    field(idx),
                    name
                ))
            })
        };
        let init_val = parse_num(c_init, "InitVal")?;
        let lower = parse_num(c_lower, "LowerBound")?;
        let upper = parse_num(c_upper, "UpperBound")?;
        if lower > upper {
            return Err(DmpotError::Config(format!(
                "parameter {}: lower bound {} exceeds upper bound {}",
                symbol, lower, upper
            )));
        }

        let def = ParamDef {
            symbol,
            file_kind,
            unit: field(c_unit),
            init_val,
            lower,
            upper,
        };
        if file_kind.is_basin_level() {
            basin.defs.push(def);
        } else {
            subarea.defs.push(def);
        }
    }

    Ok((basin, subarea))
}
