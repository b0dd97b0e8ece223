use crate::reports;
use clap::{ArgMatches, Args};
use dmpot_core::campaign::{Campaign, CampaignPaths, ProgressCallback};
use dmpot_core::settings::CalibrationSettings;
use std::process;
use tracing::{error, info};

#[derive(Args, Debug, Clone)]
pub struct CalibrateArgs {
    #[command(flatten)]
    pub settings: CalibrationSettings,
}

struct CliLogger;

impl ProgressCallback for CliLogger {
    fn on_run(&self, run_no: usize, total_runs: usize, bsn_test: f64, bsn_best: f64) -> bool {
        info!(
            "run {:5}/{} | test sum {:.3} | best sum {:.3}",
            run_no + 1,
            total_runs,
            bsn_test,
            bsn_best
        );
        true
    }
}

/// Resolves settings (file base, command-line overrides) used by every
/// subcommand.
pub fn resolve_settings(
    cli_settings: &CalibrationSettings,
    settings_file: Option<&str>,
    matches: &ArgMatches,
) -> CalibrationSettings {
    match settings_file {
        Some(path) => {
            info!("loading settings from {}", path);
            let mut settings = CalibrationSettings::load_from_file(path).unwrap_or_else(|e| {
                error!("{}", e);
                process::exit(1);
            });
            settings.merge_from_cli(cli_settings, matches);
            settings
        }
        None => cli_settings.clone(),
    }
}

pub fn run(
    args: CalibrateArgs,
    paths: CampaignPaths,
    settings_file: Option<&str>,
    matches: &ArgMatches,
) {
    let settings = resolve_settings(&args.settings, settings_file, matches);

    info!("🚀 initializing calibration campaign");
    let mut campaign = Campaign::new(settings, paths).unwrap_or_else(|e| {
        error!("{}", e);
        process::exit(1);
    });

    reports::print_group_table(campaign.groups());

    let result = campaign.run(&CliLogger).unwrap_or_else(|e| {
        error!("{}", e);
        process::exit(1);
    });

    info!("🏁 campaign finished after {} runs", result.runs_completed);
    reports::print_best_table(&result);
}
