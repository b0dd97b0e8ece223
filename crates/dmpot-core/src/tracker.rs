use crate::error::{DmResult, DmpotError};
use crate::graph::GroupId;
use crate::objective::SeriesSpec;
use crate::params::ParamValues;
use crate::stats::GofStats;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Objective values start at this sentinel so the first scored run always
/// improves on it.
pub const BEST_OBJECTIVE_SENTINEL: f64 = 1000.0;

/// Group tag recorded in ungrouped parameter audit rows.
const UNGROUPED_ROW_TAG: &str = "9999";

const OBJ_HEADER: &str =
    "RunNO,Outlet_Var_Freq_Stat_Weight,PBIAS,NSE,RMSE,R2,MSE,TestOF,BestOF,probVal,TimeThisRun";

/// Append-only audit logs: per-group parameter values, per-group
/// parameter-selection flags, per-key objective rows, and the basin-level
/// pair. One line per run, never overwritten; downstream best-run
/// selection replays these files, so writing them is a required side
/// effect of every run, accepted or not.
#[derive(Debug)]
pub struct AuditFiles {
    para: BTreeMap<GroupId, PathBuf>,
    sel: BTreeMap<GroupId, PathBuf>,
    objective: BTreeMap<GroupId, PathBuf>,
    bsn_para: PathBuf,
    bsn_sel: PathBuf,
}

impl AuditFiles {
    /// Creates (truncating) every audit file with its header row.
    pub fn create(
        outputs_dir: &Path,
        param_groups: &[GroupId],
        objective_keys: &[GroupId],
        sub_symbols: &[String],
        bsn_symbols: &[String],
    ) -> DmResult<Self> {
        let para_header = format!(
            "RunNO,Outlet_Var_Freq_Stat_Weight,{}",
            sub_symbols.join(",")
        );

        let mut para = BTreeMap::new();
        let mut sel = BTreeMap::new();
        for group in param_groups {
            let para_path = outputs_dir.join(format!("DMPOT_Para_{}.out", group));
            init_with_header(&para_path, &para_header)?;
            para.insert(*group, para_path);

            let sel_path = outputs_dir.join(format!("DMPOT_ParaSel_{}.out", group));
            init_with_header(&sel_path, &para_header)?;
            sel.insert(*group, sel_path);
        }

        let mut objective = BTreeMap::new();
        for key in objective_keys {
            let path = outputs_dir.join(format!("DMPOT_ObjFun{}.out", key));
            init_with_header(&path, OBJ_HEADER)?;
            objective.insert(*key, path);
        }

        let bsn_header = format!("RunNO,{}", bsn_symbols.join(","));
        let bsn_para = outputs_dir.join("DMPOT_Para_Bsn.out");
        init_with_header(&bsn_para, &bsn_header)?;
        let bsn_sel = outputs_dir.join("DMPOT_ParaSel_Bsn.out");
        init_with_header(&bsn_sel, &bsn_header)?;

        Ok(Self {
            para,
            sel,
            objective,
            bsn_para,
            bsn_sel,
        })
    }

    pub fn para_path(&self, group: GroupId) -> Option<&Path> {
        self.para.get(&group).map(PathBuf::as_path)
    }

    pub fn objective_path(&self, key: GroupId) -> Option<&Path> {
        self.objective.get(&key).map(PathBuf::as_path)
    }

    pub fn basin_para_path(&self) -> &Path {
        &self.bsn_para
    }

    fn group_path<'a>(
        map: &'a BTreeMap<GroupId, PathBuf>,
        group: GroupId,
        what: &str,
    ) -> DmResult<&'a Path> {
        map.get(&group)
            .map(PathBuf::as_path)
            .ok_or_else(|| {
                DmpotError::Validation(format!("no {} audit file for group {}", what, group))
            })
    }

    fn write_param_row(
        &self,
        group: GroupId,
        run_no: usize,
        row_tag: &str,
        values: &ParamValues,
    ) -> DmResult<()> {
        let vals = join_fixed(&values.test);
        append_line(
            Self::group_path(&self.para, group, "parameter")?,
            &format!("{},{},{}", run_no, row_tag, vals),
        )?;
        append_line(
            Self::group_path(&self.sel, group, "selection")?,
            &format!("{},{},{}", run_no, row_tag, join_flags(values)),
        )
    }

    fn write_objective_row(
        &self,
        key: GroupId,
        run_no: usize,
        spec: &SeriesSpec,
        stats: &GofStats,
        test: f64,
        best: f64,
        prob: f64,
        elapsed_secs: f64,
    ) -> DmResult<()> {
        append_line(
            Self::group_path(&self.objective, key, "objective")?,
            &format!(
                "{},{},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{},{:.3}",
                run_no,
                spec.tag(),
                stats.pbias,
                stats.nse,
                stats.rmse,
                stats.r2,
                stats.mse,
                test,
                best,
                prob,
                elapsed_secs
            ),
        )
    }

    fn write_other_objective_row(
        &self,
        run_no: usize,
        test: f64,
        best: f64,
        prob: f64,
        elapsed_secs: f64,
    ) -> DmResult<()> {
        append_line(
            Self::group_path(&self.objective, GroupId::Other, "objective")?,
            &format!(
                "{},Others,{:.3},{:.3},{},{:.3}",
                run_no, test, best, prob, elapsed_secs
            ),
        )
    }

    fn write_basin_rows(&self, run_no: usize, values: &ParamValues) -> DmResult<()> {
        append_line(
            &self.bsn_para,
            &format!("{},{}", run_no, join_fixed(&values.test)),
        )?;
        append_line(&self.bsn_sel, &format!("{},{}", run_no, join_flags(values)))
    }
}

fn init_with_header(path: &Path, header: &str) -> DmResult<()> {
    let mut file = File::create(path)?;
    writeln!(file, "{}", header)?;
    file.flush()?;
    Ok(())
}

// One scoped open-append-flush-close per audit write, so parallel group
// processing can never interleave partial lines.
fn append_line(path: &Path, line: &str) -> DmResult<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    writeln!(file, "{}", line)?;
    file.flush()?;
    Ok(())
}

fn join_fixed(values: &[f64]) -> String {
    values.iter().map(|v| format!("{:.3}", v)).join(",")
}

fn join_flags(values: &ParamValues) -> String {
    values
        .modified
        .iter()
        .map(|&m| if m { "1" } else { "0" })
        .join(",")
}

/// Everything one run hands to the tracker.
pub struct RunRecord {
    pub run_no: usize,
    pub prob: f64,
    pub elapsed_secs: f64,
    /// Test objective per outlet key (never contains `Other`).
    pub tests: BTreeMap<GroupId, f64>,
    pub series_stats: BTreeMap<GroupId, Vec<(SeriesSpec, GofStats)>>,
}

/// Best/test objective state machine across runs.
///
/// Grouped mode: each outlet group accepts on strict per-group
/// improvement; the `Other` group, the basin-level parameters and the
/// campaign-level best all gate on the SUM of outlet test values.
/// Ungrouped mode: everything gates on the sum criterion.
#[derive(Debug)]
pub struct BestTracker {
    grouping: bool,
    best: BTreeMap<GroupId, f64>,
    bsn_best: f64,
}

impl BestTracker {
    pub fn new(objective_keys: &[GroupId], grouping: bool) -> Self {
        let mut best = BTreeMap::new();
        for key in objective_keys {
            best.insert(*key, BEST_OBJECTIVE_SENTINEL);
        }
        if grouping {
            best.insert(GroupId::Other, BEST_OBJECTIVE_SENTINEL);
        }
        Self {
            grouping,
            best,
            bsn_best: BEST_OBJECTIVE_SENTINEL,
        }
    }

    pub fn best_objectives(&self) -> &BTreeMap<GroupId, f64> {
        &self.best
    }

    pub fn basin_best(&self) -> f64 {
        self.bsn_best
    }

    /// Applies one run's acceptance decisions, mutating the per-group and
    /// basin parameter state, and appends every audit row. Returns the
    /// run's basin-level test value (the sum criterion).
    pub fn update(
        &mut self,
        record: &RunRecord,
        group_values: &mut BTreeMap<GroupId, ParamValues>,
        bsn_values: &mut ParamValues,
        audit: &AuditFiles,
    ) -> DmResult<f64> {
        let bsn_test = crate::objective::basin_objective(&record.tests);

        if self.grouping {
            self.update_grouped(record, bsn_test, group_values, audit)?;
        } else {
            self.update_ungrouped(record, bsn_test, group_values, audit)?;
        }

        if bsn_test < self.bsn_best {
            bsn_values.accept();
        }
        audit.write_basin_rows(record.run_no, bsn_values)?;

        info!(
            "current and best sum of objective functions: {:.3}, {:.3}",
            bsn_test, self.bsn_best
        );
        if bsn_test < self.bsn_best {
            self.bsn_best = bsn_test;
        }
        Ok(bsn_test)
    }

    fn update_grouped(
        &mut self,
        record: &RunRecord,
        bsn_test: f64,
        group_values: &mut BTreeMap<GroupId, ParamValues>,
        audit: &AuditFiles,
    ) -> DmResult<()> {
        for (&key, &test) in &record.tests {
            let best = self.best.get_mut(&key).ok_or_else(|| {
                DmpotError::Validation(format!("no tracked objective for group {}", key))
            })?;
            info!(
                "current and best objective function value for outlet {}: {:.3}, {:.3}",
                key, test, best
            );
            if test < *best {
                *best = test;
                if let Some(values) = group_values.get_mut(&key) {
                    values.accept();
                }
            }
            let best_now = self.best[&key];
            if let Some(values) = group_values.get(&key) {
                audit.write_param_row(key, record.run_no, &key.to_string(), values)?;
            }
            for (spec, stats) in record.series_stats.get(&key).into_iter().flatten() {
                audit.write_objective_row(
                    key,
                    record.run_no,
                    spec,
                    stats,
                    test,
                    best_now,
                    record.prob,
                    record.elapsed_secs,
                )?;
            }
        }

        // The sentinel group has no observations of its own; it rides on
        // the basin-wide sum.
        if bsn_test < self.bsn_best {
            self.best.insert(GroupId::Other, bsn_test);
            if let Some(values) = group_values.get_mut(&GroupId::Other) {
                values.accept();
            }
        }
        if let Some(values) = group_values.get(&GroupId::Other) {
            audit.write_param_row(GroupId::Other, record.run_no, "Other", values)?;
        }
        audit.write_other_objective_row(
            record.run_no,
            bsn_test,
            self.best[&GroupId::Other],
            record.prob,
            record.elapsed_secs,
        )
    }

    fn update_ungrouped(
        &mut self,
        record: &RunRecord,
        bsn_test: f64,
        group_values: &mut BTreeMap<GroupId, ParamValues>,
        audit: &AuditFiles,
    ) -> DmResult<()> {
        for (&key, &test) in &record.tests {
            let best = self.best.get_mut(&key).ok_or_else(|| {
                DmpotError::Validation(format!("no tracked objective for outlet {}", key))
            })?;
            info!(
                "current and best objective function value for outlet {}: {:.3}, {:.3}",
                key, test, best
            );
            if bsn_test < self.bsn_best && test < *best {
                *best = test;
            }
            let best_now = self.best[&key];
            for (spec, stats) in record.series_stats.get(&key).into_iter().flatten() {
                audit.write_objective_row(
                    key,
                    record.run_no,
                    spec,
                    stats,
                    test,
                    best_now,
                    record.prob,
                    record.elapsed_secs,
                )?;
            }
        }

        if let Some(values) = group_values.get_mut(&GroupId::Ungrouped) {
            if bsn_test < self.bsn_best {
                values.accept();
            }
        }
        if let Some(values) = group_values.get(&GroupId::Ungrouped) {
            audit.write_param_row(GroupId::Ungrouped, record.run_no, UNGROUPED_ROW_TAG, values)?;
        }
        Ok(())
    }
}
