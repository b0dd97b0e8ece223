#![allow(dead_code)]

use dmpot_core::campaign::CampaignPaths;
use dmpot_core::reachfile::{format_row, ReachRecord};
use dmpot_core::settings::CalibrationSettings;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

/// Scratch calibration project: a 5-reach watershed (2 and then 3/4
/// drain into 1; reach 5 is disconnected), one selected parameter per
/// level, monthly observations at outlets 1 and 3, and a pre-baked
/// reach output file so campaigns can run without a simulator binary.
pub struct Project {
    pub dir: TempDir,
    pub paths: CampaignPaths,
}

pub const REACHES: [u32; 5] = [1, 2, 3, 4, 5];
pub const SCORED_MONTHS: u32 = 6;

pub fn build_project() -> Project {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();

    let topology_file = root.join("reach_topology.csv");
    write_topology(&topology_file);

    let param_file = root.join("dmpot_Para_Combined.set");
    write_param_table(&param_file);

    let observed_dir = root.join("observed");
    fs::create_dir(&observed_dir).unwrap();
    write_observed_monthly(&observed_dir, 1, 5.0);
    write_observed_monthly(&observed_dir, 3, 2.0);

    let working_dir = root.join("working");
    fs::create_dir(&working_dir).unwrap();
    write_reach_output_monthly(&working_dir);

    let outputs_dir = root.join("outputs");
    fs::create_dir(&outputs_dir).unwrap();

    let paths = CampaignPaths {
        working_dir,
        observed_dir,
        outputs_dir,
        topology_file,
        param_file,
    };
    Project { dir, paths }
}

pub fn test_settings() -> CalibrationSettings {
    CalibrationSettings {
        outlet_list: "1,3".to_string(),
        iprint_list: "2,2".to_string(),
        variable_list: "1,1".to_string(),
        statistic_list: "1,3".to_string(),
        weight_list: "1.0,1.0".to_string(),
        start_date: "1996-01-01".to_string(),
        end_date: "1997-06-30".to_string(),
        warm_up_years: 1,
        total_runs: 20,
        perturb_factor: 0.2,
        seed: Some(42),
        run_simulator: false,
        ..Default::default()
    }
}

pub fn write_topology(path: &Path) {
    let mut file = File::create(path).unwrap();
    writeln!(file, "FROM_NODE,TO_NODE").unwrap();
    for (from, to) in [(1, 0), (2, 1), (3, 2), (4, 2), (5, 0)] {
        writeln!(file, "{},{}", from, to).unwrap();
    }
}

pub fn write_param_table(path: &Path) {
    let mut file = File::create(path).unwrap();
    writeln!(
        file,
        "OrderNo\tSymbol\tFile\tUnit\tInitVal\tselectFlag\tLowerBound\tUpperBound"
    )
    .unwrap();
    writeln!(file, "1\tCN2\t.mgt\tnone\t60.0\t1\t35.0\t98.0").unwrap();
    writeln!(file, "2\tALPHA_BF\t.gw\tdays\t0.5\t1\t0.0\t1.0").unwrap();
    writeln!(file, "3\tSURLAG\t.bsn\tdays\t4.0\t1\t0.5\t24.0").unwrap();
    writeln!(file, "4\tESCO\t.hru\tnone\t0.9\t0\t0.0\t1.0").unwrap();
}

/// Monthly observations for 1996 (warm-up year) plus Jan-Jun 1997.
pub fn write_observed_monthly(dir: &Path, outlet: u32, base: f64) {
    let path = dir.join(format!("obs_monthly{}.prn", outlet));
    let mut file = File::create(&path).unwrap();
    writeln!(
        file,
        "yyyy\tmm\tdd\tsf(m3/s)\tsed(t/ha)\torgn(kg/ha)\torgp(kg/ha)\tno3n(kg/ha)\t\
         nh4n(kg/ha)\tno2n(kg/ha)\tminp(kg/ha)\tsolpst(mg/ha)\tsorpst(mg/ha)\t\
         tp(kg/ha)\ttn(kg/ha)\ttpst(ppb)"
    )
    .unwrap();
    for (year, months) in [(1996, 12u32), (1997, SCORED_MONTHS)] {
        for month in 1..=months {
            let flow = base + month as f64 * 0.25;
            write!(file, "{}\t{}\t1\t{:.3}", year, month, flow).unwrap();
            for _ in 0..12 {
                write!(file, "\t0.0").unwrap();
            }
            writeln!(file).unwrap();
        }
    }
}

/// Simulated flow for a reach and period in the fixture output file.
pub fn sim_flow(reach: u32, period: u32) -> f64 {
    reach as f64 + period as f64 * 0.5
}

/// Reach output covering the scored months for every reach, ending with
/// the per-reach summary block monthly output carries.
pub fn write_reach_output_monthly(working_dir: &Path) {
    let path = working_dir.join("output.rch");
    let mut file = File::create(&path).unwrap();
    for i in 0..9 {
        writeln!(file, "header line {}", i + 1).unwrap();
    }
    for period in 1..=SCORED_MONTHS {
        for &reach in &REACHES {
            writeln!(file, "{}", format_row(&record(reach, period))).unwrap();
        }
    }
    // Trailing yearly-average block; the parser must drop it.
    for &reach in &REACHES {
        writeln!(file, "{}", format_row(&record(reach, 1997))).unwrap();
    }
}

fn record(reach: u32, period: u32) -> ReachRecord {
    let mut fluxes = [0.0; 10];
    fluxes[0] = sim_flow(reach, period);
    ReachRecord {
        reach,
        gis: reach * 10,
        period,
        area_km2: 12.5 * reach as f64,
        fluxes,
    }
}

/// Loads the fixture parameter tables: (basin, subarea).
pub fn load_test_tables() -> (
    dmpot_core::params::ParamTable,
    dmpot_core::params::ParamTable,
) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("params.set");
    write_param_table(&path);
    dmpot_core::params::load_param_tables(&path).unwrap()
}

/// Reads one audit file and returns the data rows (header stripped).
pub fn audit_rows(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(str::to_string)
        .collect()
}
