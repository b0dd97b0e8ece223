use crate::graph::{GroupId, ReachId};
use crate::stats::GofStats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumIter, FromRepr};

/// Temporal resolution of an observed/simulated series, mirroring the
/// simulator's print codes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, FromRepr, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum TimeStep {
    #[strum(serialize = "daily")]
    Daily = 1,
    #[strum(serialize = "monthly")]
    Monthly = 2,
    #[strum(serialize = "yearly")]
    Annual = 3,
}

impl TimeStep {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Flux variable selectable for calibration. The display form is the
/// column header used by the observed-data files; variables 11-13 are
/// derived quantities present only in observed data, never in the reach
/// output file.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Display,
    FromRepr,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum FluxVar {
    #[strum(serialize = "sf(m3/s)")]
    Streamflow = 1,
    #[strum(serialize = "sed(t/ha)")]
    Sediment = 2,
    #[strum(serialize = "orgn(kg/ha)")]
    OrganicN = 3,
    #[strum(serialize = "orgp(kg/ha)")]
    OrganicP = 4,
    #[strum(serialize = "no3n(kg/ha)")]
    Nitrate = 5,
    #[strum(serialize = "nh4n(kg/ha)")]
    Ammonium = 6,
    #[strum(serialize = "no2n(kg/ha)")]
    Nitrite = 7,
    #[strum(serialize = "minp(kg/ha)")]
    MineralP = 8,
    #[strum(serialize = "solpst(mg/ha)")]
    SolublePesticide = 9,
    #[strum(serialize = "sorpst(mg/ha)")]
    SorbedPesticide = 10,
    #[strum(serialize = "tp(kg/ha)")]
    TotalP = 11,
    #[strum(serialize = "tn(kg/ha)")]
    TotalN = 12,
    #[strum(serialize = "tpst(ppb)")]
    TotalPesticide = 13,
}

impl FluxVar {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Zero-based position among the flux columns of an observed-data row
    /// (after the three date columns).
    pub fn obs_column(self) -> usize {
        self as usize - 1
    }

    /// Zero-based position among the flux columns of a reach-output row,
    /// if the simulator prints this variable at all.
    pub fn rch_column(self) -> Option<usize> {
        let code = self as usize;
        if code <= 10 {
            Some(code - 1)
        } else {
            None
        }
    }
}

/// Statistic selected as the objective for one series. Codes follow the
/// control-file convention: 1=1-NSE, 2=PBIAS, 3=RMSE, 4=1-R2, 5=MSE.
/// Every kind reads lower-is-better once applied.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, FromRepr, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum StatKind {
    #[strum(serialize = "1-NSE")]
    OneMinusNse = 1,
    #[strum(serialize = "PBIAS")]
    Pbias = 2,
    #[strum(serialize = "RMSE")]
    Rmse = 3,
    #[strum(serialize = "1-R2")]
    OneMinusR2 = 4,
    #[strum(serialize = "MSE")]
    Mse = 5,
}

impl StatKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn apply(self, stats: &GofStats) -> f64 {
        match self {
            StatKind::OneMinusNse => 1.0 - stats.nse,
            StatKind::Pbias => stats.pbias,
            StatKind::Rmse => stats.rmse,
            StatKind::OneMinusR2 => 1.0 - stats.r2,
            StatKind::Mse => stats.mse,
        }
    }
}

/// One calibration target: an outlet, a temporal resolution, a flux
/// variable, and the statistic/weight pair scoring it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub outlet: ReachId,
    pub step: TimeStep,
    pub var: FluxVar,
    pub stat: StatKind,
    pub weight: f64,
}

impl SeriesSpec {
    /// Audit-row tag, `outlet_iprint_varid_statid_weight`.
    pub fn tag(&self) -> String {
        format!(
            "{}_{}_{}_{}_{:.1}",
            self.outlet,
            self.step.code(),
            self.var.code(),
            self.stat.code(),
            self.weight
        )
    }

    /// Deterministic ordering key: ascending outlet, then resolution,
    /// variable and statistic codes. Fixes the "first series key" of the
    /// legacy tool, which depended on dict insertion order.
    pub fn sort_key(&self) -> (ReachId, u8, u8, u8) {
        (
            self.outlet,
            self.step.code(),
            self.var.code(),
            self.stat.code(),
        )
    }
}

/// Reduces a group's per-series statistics to one scalar: the selected
/// statistic of the group's first series (by `SeriesSpec::sort_key`),
/// times that series' weight. `None` when the group has no series.
pub fn group_objective(series: &[(SeriesSpec, GofStats)]) -> Option<f64> {
    series
        .first()
        .map(|(spec, stats)| spec.stat.apply(stats) * spec.weight)
}

/// Basin-level acceptance criterion: the sum of all outlet-group test
/// values. A lower sum is strictly better. The sum (rather than a
/// per-outlet gate) keeps one poorly-performing outlet from stalling
/// convergence.
pub fn basin_objective(tests: &BTreeMap<GroupId, f64>) -> f64 {
    tests
        .iter()
        .filter(|(id, _)| matches!(id, GroupId::Outlet(_)))
        .map(|(_, v)| v)
        .sum()
}
