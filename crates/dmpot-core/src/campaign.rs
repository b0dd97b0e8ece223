use crate::error::{DmResult, DmpotError};
use crate::graph::{self, GroupId, ReachGraph, ReachId};
use crate::objective::{self, SeriesSpec, TimeStep};
use crate::observed::{self, ObservedSeries};
use crate::params::{self, ParamTable, ParamValues};
use crate::reachfile::{self, ReachRecord, REACH_OUTPUT_FILE};
use crate::search;
use crate::settings::{CalibrationSettings, InitStrategy, SimWindow};
use crate::simulator::Simulator;
use crate::stats::{self, GofStats};
use crate::tracker::{AuditFiles, BestTracker, RunRecord};
use crate::updater::UpdateRegistry;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// Filesystem layout of one calibration project.
#[derive(Debug, Clone)]
pub struct CampaignPaths {
    /// Simulator working directory (complete input set lives here).
    pub working_dir: PathBuf,
    /// Directory of `obs_<freq><outlet>.prn` files.
    pub observed_dir: PathBuf,
    /// Audit logs and the settings echo land here.
    pub outputs_dir: PathBuf,
    /// Reach topology edge list (FROM_NODE,TO_NODE CSV).
    pub topology_file: PathBuf,
    /// Parameter definition table.
    pub param_file: PathBuf,
}

/// Per-run progress hook; return false to stop the campaign early.
pub trait ProgressCallback: Send + Sync {
    fn on_run(&self, run_no: usize, total_runs: usize, bsn_test: f64, bsn_best: f64) -> bool;
}

pub struct CampaignResult {
    pub runs_completed: usize,
    pub basin_best: f64,
    pub best_objectives: BTreeMap<GroupId, f64>,
}

/// The run orchestrator. Owns all per-campaign state and sequences each
/// run: perturb, apply overrides, invoke the simulator, score, track.
/// Runs are strictly sequential (every DDS perturbation departs from the
/// accepted best of all prior runs); within a run, group file updates and
/// group scoring fan out across the rayon pool.
#[derive(Debug)]
pub struct Campaign {
    settings: CalibrationSettings,
    paths: CampaignPaths,
    specs: Vec<SeriesSpec>,
    observed: Vec<ObservedSeries>,
    output_step: TimeStep,
    reach_count: usize,
    groups: BTreeMap<GroupId, Vec<ReachId>>,
    objective_keys: Vec<GroupId>,
    sub_table: ParamTable,
    bsn_table: ParamTable,
    group_values: BTreeMap<GroupId, ParamValues>,
    bsn_values: ParamValues,
    tracker: BestTracker,
    audit: AuditFiles,
    registry: UpdateRegistry,
    simulator: Simulator,
    rng: fastrand::Rng,
}

impl Campaign {
    pub fn new(mut settings: CalibrationSettings, paths: CampaignPaths) -> DmResult<Self> {
        settings.normalize()?;
        let specs = settings.series_specs()?;
        let window: SimWindow = settings.sim_window()?;

        fs::create_dir_all(&paths.outputs_dir)?;
        fs::create_dir_all(&paths.working_dir)?;

        let observed: Vec<ObservedSeries> = specs
            .iter()
            .map(|spec| observed::read_observed(&paths.observed_dir, spec, &window))
            .collect::<DmResult<_>>()?;

        let graph = ReachGraph::load(&paths.topology_file)?;
        let reach_count = graph.node_count();

        let outlets: Vec<ReachId> = specs
            .iter()
            .map(|s| s.outlet)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        for &outlet in &outlets {
            if !graph.contains(outlet) {
                return Err(DmpotError::Config(format!(
                    "outlet {} does not exist in this watershed",
                    outlet
                )));
            }
        }

        let groups = if settings.group_subareas {
            let mut groups = graph::group_by_outlet(&outlets, &graph)?;
            graph::resolve_overlaps(&mut groups);
            groups
        } else {
            let mut groups = BTreeMap::new();
            groups.insert(GroupId::Ungrouped, graph.nodes().collect());
            groups
        };

        let objective_keys: Vec<GroupId> =
            outlets.iter().map(|&o| GroupId::Outlet(o)).collect();

        let (bsn_table, sub_table) = params::load_param_tables(&paths.param_file)?;
        if bsn_table.is_empty() && sub_table.is_empty() {
            return Err(DmpotError::Config(
                "no parameters are flagged for calibration".to_string(),
            ));
        }

        let group_values: BTreeMap<GroupId, ParamValues> = groups
            .keys()
            .map(|&g| (g, ParamValues::new(&sub_table)))
            .collect();
        let bsn_values = ParamValues::new(&bsn_table);

        let param_groups: Vec<GroupId> = groups.keys().copied().collect();
        let audit_objective_keys: Vec<GroupId> = if settings.group_subareas {
            param_groups.clone()
        } else {
            objective_keys.clone()
        };
        let audit = AuditFiles::create(
            &paths.outputs_dir,
            &param_groups,
            &audit_objective_keys,
            &sub_table.symbols(),
            &bsn_table.symbols(),
        )?;

        let tracker = BestTracker::new(&objective_keys, settings.group_subareas);

        let rng = match settings.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        settings.echo_to(&paths.outputs_dir)?;

        let simulator = Simulator::new(settings.simulator_exe.clone());
        let output_step = output_step(&specs);

        Ok(Self {
            settings,
            paths,
            specs,
            observed,
            output_step,
            reach_count,
            groups,
            objective_keys,
            sub_table,
            bsn_table,
            group_values,
            bsn_values,
            tracker,
            audit,
            registry: UpdateRegistry::with_default_writer(),
            simulator,
            rng,
        })
    }

    pub fn groups(&self) -> &BTreeMap<GroupId, Vec<ReachId>> {
        &self.groups
    }

    pub fn audit(&self) -> &AuditFiles {
        &self.audit
    }

    pub fn run<CB: ProgressCallback>(&mut self, callback: &CB) -> DmResult<CampaignResult> {
        let total = self.settings.total_runs;
        if total == 0 {
            return Err(DmpotError::Config(
                "total_runs must be at least 1".to_string(),
            ));
        }

        let (init_runs, dds_runs) = match self.settings.init_strategy {
            InitStrategy::Random => {
                let seeds = search::init_run_count(total).min(total);
                (seeds, total - seeds)
            }
            InitStrategy::Provided => (1, total - 1),
        };

        let campaign_start = Instant::now();
        let mut completed = 0usize;

        info!(
            "campaign start: {} total runs ({} seeding, {} DDS)",
            total, init_runs, dds_runs
        );

        for run_no in 0..init_runs {
            if self.settings.init_strategy == InitStrategy::Random {
                for values in self.group_values.values_mut() {
                    search::random_sweep(&self.sub_table, values, &mut self.rng);
                }
                search::random_sweep(&self.bsn_table, &mut self.bsn_values, &mut self.rng);
            }
            let keep_going = self.execute_run(run_no, 1.0, &campaign_start, callback)?;
            completed += 1;
            if !keep_going {
                return Ok(self.result(completed));
            }
        }

        for dds_idx in 1..=dds_runs {
            let prob = if dds_runs > 1 {
                search::acceptance_probability(dds_idx, dds_runs)
            } else {
                1.0
            };
            for values in self.group_values.values_mut() {
                search::dds_perturb(
                    &self.sub_table,
                    values,
                    prob,
                    self.settings.perturb_factor,
                    &mut self.rng,
                );
            }
            search::dds_perturb(
                &self.bsn_table,
                &mut self.bsn_values,
                prob,
                self.settings.perturb_factor,
                &mut self.rng,
            );
            let run_no = init_runs + dds_idx - 1;
            let keep_going = self.execute_run(run_no, prob, &campaign_start, callback)?;
            completed += 1;
            if !keep_going {
                break;
            }
        }

        Ok(self.result(completed))
    }

    fn result(&self, completed: usize) -> CampaignResult {
        CampaignResult {
            runs_completed: completed,
            basin_best: self.tracker.basin_best(),
            best_objectives: self.tracker.best_objectives().clone(),
        }
    }

    fn execute_run<CB: ProgressCallback>(
        &mut self,
        run_no: usize,
        prob: f64,
        campaign_start: &Instant,
        callback: &CB,
    ) -> DmResult<bool> {
        info!("..... simulation no: {} .....", run_no + 1);

        // Group file updates are independent of each other; fan out.
        {
            let registry = &self.registry;
            let working_dir = self.paths.working_dir.as_path();
            let sub_table = &self.sub_table;
            self.group_values
                .par_iter()
                .map(|(&group, values)| {
                    registry.apply_group(working_dir, group, sub_table, values)
                })
                .collect::<DmResult<Vec<()>>>()?;
        }
        self.registry
            .apply_basin(&self.paths.working_dir, &self.bsn_table, &self.bsn_values)?;

        if self.settings.run_simulator && !self.simulator.run(&self.paths.working_dir) {
            warn!("simulator run {} failed; scoring it as invalid", run_no + 1);
        }

        let rch_path = self.paths.working_dir.join(REACH_OUTPUT_FILE);
        let records: Vec<ReachRecord> =
            match reachfile::read_reach_output(&rch_path, self.output_step, self.reach_count) {
                Ok(records) => records,
                Err(e) => {
                    warn!("reach output unusable ({}); scoring run as invalid", e);
                    Vec::new()
                }
            };

        // Per-outlet scoring is independent; fan out.
        let scored: Vec<(GroupId, Vec<(SeriesSpec, GofStats)>)> = {
            let specs = &self.specs;
            let observed = &self.observed;
            let records = &records;
            self.objective_keys
                .par_iter()
                .map(|&key| {
                    let GroupId::Outlet(outlet) = key else {
                        return (key, Vec::new());
                    };
                    let series: Vec<(SeriesSpec, GofStats)> = specs
                        .iter()
                        .zip(observed.iter())
                        .filter(|(spec, _)| spec.outlet == outlet)
                        .map(|(spec, obs)| {
                            let sim = reachfile::extract_series(records, spec.outlet, spec.var);
                            (*spec, stats::compute_stats(&obs.values, &sim))
                        })
                        .collect();
                    (key, series)
                })
                .collect()
        };

        let mut tests = BTreeMap::new();
        let mut series_stats = BTreeMap::new();
        for (key, series) in scored {
            if let Some(value) = objective::group_objective(&series) {
                tests.insert(key, value);
            }
            series_stats.insert(key, series);
        }

        let record = RunRecord {
            run_no,
            prob,
            elapsed_secs: campaign_start.elapsed().as_secs_f64(),
            tests,
            series_stats,
        };
        let bsn_test = self.tracker.update(
            &record,
            &mut self.group_values,
            &mut self.bsn_values,
            &self.audit,
        )?;

        Ok(callback.on_run(
            run_no,
            self.settings.total_runs,
            bsn_test,
            self.tracker.basin_best(),
        ))
    }
}

/// Print granularity for the simulator's reach output: the finest
/// resolution any configured series needs.
fn output_step(specs: &[SeriesSpec]) -> TimeStep {
    if specs.iter().any(|s| s.step == TimeStep::Daily) {
        TimeStep::Daily
    } else if specs.iter().any(|s| s.step == TimeStep::Monthly) {
        TimeStep::Monthly
    } else {
        TimeStep::Annual
    }
}
