use crate::cmd::calibrate::resolve_settings;
use crate::reports;
use clap::{ArgMatches, Args};
use dmpot_core::campaign::CampaignPaths;
use dmpot_core::graph::{self, ReachGraph, ReachId};
use dmpot_core::settings::CalibrationSettings;
use std::collections::BTreeSet;
use std::process;
use tracing::{error, info};

#[derive(Args, Debug, Clone)]
pub struct GroupArgs {
    #[command(flatten)]
    pub settings: CalibrationSettings,
}

/// Builds the watershed graph, partitions the subareas and prints the
/// resolved groups without running any simulation.
pub fn run(
    args: GroupArgs,
    paths: CampaignPaths,
    settings_file: Option<&str>,
    matches: &ArgMatches,
) {
    let settings = resolve_settings(&args.settings, settings_file, matches);

    let graph = ReachGraph::load(&paths.topology_file).unwrap_or_else(|e| {
        error!("{}", e);
        process::exit(1);
    });
    info!("watershed graph holds {} reaches", graph.node_count());

    let specs = settings.series_specs().unwrap_or_else(|e| {
        error!("{}", e);
        process::exit(1);
    });
    let outlets: Vec<ReachId> = specs
        .iter()
        .map(|s| s.outlet)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut groups = graph::group_by_outlet(&outlets, &graph).unwrap_or_else(|e| {
        error!("{}", e);
        process::exit(1);
    });
    graph::resolve_overlaps(&mut groups);

    reports::print_group_table(&groups);
}
