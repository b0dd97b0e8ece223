use dmpot_core::graph::{group_by_outlet, resolve_overlaps, GroupId, ReachGraph};

// Reference watershed: reach 3 drains into 2, which drains into 1.
fn chain() -> ReachGraph {
    ReachGraph::from_edges(&[(1, 0), (2, 1), (3, 2)])
}

#[test]
fn single_outlet_collects_the_whole_chain() {
    let graph = chain();
    let groups = group_by_outlet(&[1], &graph).unwrap();

    assert_eq!(groups[&GroupId::Outlet(1)], vec![1, 2, 3]);
    assert!(groups[&GroupId::Other].is_empty());
}

#[test]
fn nested_outlets_leave_disputed_reaches_with_the_smaller_group() {
    let graph = chain();
    let mut groups = group_by_outlet(&[1, 2], &graph).unwrap();
    resolve_overlaps(&mut groups);

    // Downstream group 1 loses {2, 3} to the smaller upstream group 2.
    assert_eq!(groups[&GroupId::Outlet(1)], vec![1]);
    assert_eq!(groups[&GroupId::Outlet(2)], vec![2, 3]);
    assert!(groups[&GroupId::Other].is_empty());
}

#[test]
fn unreachable_reaches_land_in_the_other_group() {
    let graph = ReachGraph::from_edges(&[(1, 0), (2, 1), (3, 2), (4, 2), (5, 0)]);
    let groups = group_by_outlet(&[1], &graph).unwrap();

    assert_eq!(groups[&GroupId::Outlet(1)], vec![1, 2, 4, 3]);
    assert_eq!(groups[&GroupId::Other], vec![5]);
}

#[test]
fn unknown_outlet_aborts_grouping() {
    let graph = chain();
    let err = group_by_outlet(&[1, 42], &graph).unwrap_err();
    assert!(err.to_string().contains("42"));
}

#[test]
fn branched_watershed_resolves_against_raw_membership() {
    // 1 <- 2 <- {3, 4}; outlets at 1 and 2.
    let graph = ReachGraph::from_edges(&[(1, 0), (2, 1), (3, 2), (4, 2)]);
    let mut groups = group_by_outlet(&[1, 2], &graph).unwrap();
    resolve_overlaps(&mut groups);

    assert_eq!(groups[&GroupId::Outlet(1)], vec![1]);
    assert_eq!(groups[&GroupId::Outlet(2)], vec![2, 4, 3]);
}

#[test]
fn equal_sized_overlapping_groups_both_strip() {
    // Reach 3 feeds both outlets, so both raw groups have two members.
    // Ties strip: each group keeps only its own outlet and the shared
    // reach belongs to neither. Deterministic, if unusual topology.
    let graph = ReachGraph::from_edges(&[(1, 0), (2, 0), (3, 1), (3, 2)]);
    let mut groups = group_by_outlet(&[1, 2], &graph).unwrap();
    resolve_overlaps(&mut groups);

    assert_eq!(groups[&GroupId::Outlet(1)], vec![1]);
    assert_eq!(groups[&GroupId::Outlet(2)], vec![2]);
}

#[test]
fn groups_are_pairwise_disjoint_after_resolution() {
    let graph = ReachGraph::from_edges(&[(1, 0), (2, 1), (3, 2), (4, 2), (5, 0)]);
    let mut groups = group_by_outlet(&[1, 2, 4], &graph).unwrap();
    resolve_overlaps(&mut groups);

    let mut seen = std::collections::BTreeSet::new();
    for members in groups.values() {
        for &m in members {
            assert!(seen.insert(m), "reach {} appears in two groups", m);
        }
    }
}
