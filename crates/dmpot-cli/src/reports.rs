use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use dmpot_core::campaign::CampaignResult;
use dmpot_core::graph::{GroupId, ReachId};
use std::collections::BTreeMap;

pub fn print_group_table(groups: &BTreeMap<GroupId, Vec<ReachId>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Group", "Subareas", "Members"]);
    for (group, members) in groups {
        let listed = members
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        table.add_row(vec![
            group.to_string(),
            members.len().to_string(),
            listed,
        ]);
    }
    println!("{table}");
}

pub fn print_best_table(result: &CampaignResult) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Group", "Best objective"]);
    for (group, best) in &result.best_objectives {
        table.add_row(vec![group.to_string(), format!("{:.3}", best)]);
    }
    table.add_row(vec![
        "Basin (sum)".to_string(),
        format!("{:.3}", result.basin_best),
    ]);
    println!("{table}");
}
