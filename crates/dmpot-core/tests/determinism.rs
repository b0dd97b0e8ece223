use dmpot_core::campaign::{Campaign, ProgressCallback};
use dmpot_core::graph::GroupId;
use std::fs;

mod common;

struct Silent;

impl ProgressCallback for Silent {
    fn on_run(&self, _run_no: usize, _total: usize, _test: f64, _best: f64) -> bool {
        true
    }
}

fn run_campaign(seed: u64) -> (String, String) {
    let project = common::build_project();
    let mut settings = common::test_settings();
    settings.seed = Some(seed);

    let mut campaign = Campaign::new(settings, project.paths.clone()).unwrap();
    campaign.run(&Silent).unwrap();

    let para = fs::read_to_string(
        campaign.audit().para_path(GroupId::Ungrouped).unwrap(),
    )
    .unwrap();
    let sel =
        fs::read_to_string(project.paths.outputs_dir.join("DMPOT_ParaSel_NotGrouping.out"))
            .unwrap();
    (para, sel)
}

#[test]
fn same_seed_reproduces_the_candidate_trail_bit_for_bit() {
    let (para_a, sel_a) = run_campaign(20201008);
    let (para_b, sel_b) = run_campaign(20201008);

    assert_eq!(para_a, para_b);
    assert_eq!(sel_a, sel_b);
}

#[test]
fn different_seeds_diverge() {
    let (para_a, _) = run_campaign(1);
    let (para_b, _) = run_campaign(2);
    assert_ne!(para_a, para_b);
}
