use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use dmpot_core::campaign::CampaignPaths;
use std::path::PathBuf;

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(global = true, short = 'w', long, default_value = "05workingDir")]
    working_dir: String,

    #[arg(global = true, short = 'o', long, default_value = "02observedData")]
    observed_dir: String,

    #[arg(global = true, long, default_value = "06outputFiles")]
    outputs_dir: String,

    #[arg(
        global = true,
        short = 't',
        long,
        default_value = "03gisLayers/reach_topology.csv"
    )]
    topology: String,

    #[arg(
        global = true,
        short = 'p',
        long,
        default_value = "01projSetupContPara/dmpot_Para_Combined.set"
    )]
    params: String,

    /// Settings JSON file; command-line flags override its values.
    #[arg(global = true, long)]
    settings: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Calibrate(cmd::calibrate::CalibrateArgs),
    Group(cmd::group::GroupArgs),
}

fn main() {
    tracing_subscriber::fmt::init();

    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let paths = CampaignPaths {
        working_dir: PathBuf::from(&cli.working_dir),
        observed_dir: PathBuf::from(&cli.observed_dir),
        outputs_dir: PathBuf::from(&cli.outputs_dir),
        topology_file: PathBuf::from(&cli.topology),
        param_file: PathBuf::from(&cli.params),
    };

    match cli.command {
        Commands::Calibrate(args) => {
            let sub_matches = matches.subcommand_matches("calibrate").unwrap();
            cmd::calibrate::run(args, paths, cli.settings.as_deref(), sub_matches);
        }
        Commands::Group(args) => {
            let sub_matches = matches.subcommand_matches("group").unwrap();
            cmd::group::run(args, paths, cli.settings.as_deref(), sub_matches);
        }
    }
}
