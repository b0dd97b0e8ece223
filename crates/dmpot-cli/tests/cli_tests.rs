use dmpot_core::reachfile::{format_row, ReachRecord};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn binary() -> &'static str {
    env!("CARGO_BIN_EXE_dmpot")
}

struct TestProject {
    dir: TempDir,
}

impl TestProject {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();

        let mut topo = File::create(root.join("topology.csv")).unwrap();
        writeln!(topo, "FROM_NODE,TO_NODE").unwrap();
        for (from, to) in [(1, 0), (2, 1), (3, 2)] {
            writeln!(topo, "{},{}", from, to).unwrap();
        }

        let mut params = File::create(root.join("params.set")).unwrap();
        writeln!(
            params,
            "OrderNo\tSymbol\tFile\tUnit\tInitVal\tselectFlag\tLowerBound\tUpperBound"
        )
        .unwrap();
        writeln!(params, "1\tCN2\t.mgt\tnone\t60.0\t1\t35.0\t98.0").unwrap();

        let observed = root.join("observed");
        fs::create_dir(&observed).unwrap();
        write_observed(&observed.join("obs_monthly1.prn"));

        let working = root.join("working");
        fs::create_dir(&working).unwrap();
        write_reach_output(&working.join("output.rch"));

        fs::create_dir(root.join("outputs")).unwrap();

        Self { dir }
    }

    fn args(&self) -> Vec<String> {
        let root = self.dir.path();
        vec![
            "--working-dir".into(),
            root.join("working").display().to_string(),
            "--observed-dir".into(),
            root.join("observed").display().to_string(),
            "--outputs-dir".into(),
            root.join("outputs").display().to_string(),
            "--topology".into(),
            root.join("topology.csv").display().to_string(),
            "--params".into(),
            root.join("params.set").display().to_string(),
        ]
    }
}

fn write_observed(path: &Path) {
    let mut file = File::create(path).unwrap();
    writeln!(file, "yyyy\tmm\tdd\tsf(m3/s)").unwrap();
    for (year, months) in [(1996, 12u32), (1997, 6u32)] {
        for month in 1..=months {
            writeln!(file, "{}\t{}\t1\t{:.3}", year, month, 5.0 + month as f64 * 0.1).unwrap();
        }
    }
}

fn write_reach_output(path: &Path) {
    let mut file = File::create(path).unwrap();
    for i in 0..9 {
        writeln!(file, "header line {}", i + 1).unwrap();
    }
    for period in 1..=6u32 {
        for reach in 1..=3u32 {
            let mut fluxes = [0.0; 10];
            fluxes[0] = reach as f64 + period as f64 * 0.5;
            let record = ReachRecord {
                reach,
                gis: reach,
                period,
                area_km2: 10.0,
                fluxes,
            };
            writeln!(file, "{}", format_row(&record)).unwrap();
        }
    }
    for reach in 1..=3u32 {
        let record = ReachRecord {
            reach,
            gis: reach,
            period: 1997,
            area_km2: 10.0,
            fluxes: [0.0; 10],
        };
        writeln!(file, "{}", format_row(&record)).unwrap();
    }
}

#[test]
fn group_subcommand_prints_the_partition() {
    let project = TestProject::new();

    let output = Command::new(binary())
        .args(project.args())
        .args([
            "group",
            "--outlet-list",
            "1,2",
            "--iprint-list",
            "2,2",
            "--variable-list",
            "1,1",
            "--statistic-list",
            "1,1",
            "--weight-list",
            "1.0,1.0",
        ])
        .output()
        .expect("group run failed");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Other"), "missing Other group:\n{}", stdout);
}

#[test]
fn calibrate_runs_a_tiny_campaign_and_writes_audit_logs() {
    let project = TestProject::new();

    let output = Command::new(binary())
        .args(project.args())
        .args([
            "calibrate",
            "--total-runs",
            "5",
            "--seed",
            "7",
            "--outlet-list",
            "1",
            "--iprint-list",
            "2",
            "--variable-list",
            "1",
            "--statistic-list",
            "1",
            "--weight-list",
            "1.0",
            "--start-date",
            "1996-01-01",
            "--end-date",
            "1997-06-30",
            "--warm-up-years",
            "1",
            "--run-simulator",
            "false",
        ])
        .output()
        .expect("calibrate run failed");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let outputs = project.dir.path().join("outputs");
    assert!(outputs.join("usrControl.json").is_file());

    let para = fs::read_to_string(outputs.join("DMPOT_Para_NotGrouping.out")).unwrap();
    // Header plus one row per run.
    assert_eq!(para.lines().count(), 6);
}

#[test]
fn unknown_outlet_exits_nonzero() {
    let project = TestProject::new();

    let status = Command::new(binary())
        .args(project.args())
        .args([
            "group",
            "--outlet-list",
            "1,99",
            "--iprint-list",
            "2,2",
            "--variable-list",
            "1,1",
            "--statistic-list",
            "1,1",
            "--weight-list",
            "1.0,1.0",
        ])
        .status()
        .expect("group run failed");

    assert!(!status.success());
}
