use crate::error::{DmResult, DmpotError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::path::Path;

pub type ReachId = u32;

/// Identity of a subarea group. Replaces the string tags
/// ("Other"/"NotGrouping"/outlet-number-as-string) of the legacy tool.
/// Derived `Ord` gives outlets ascending, then `Other`, then `Ungrouped`,
/// which is the processing order everywhere a group order matters.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum GroupId {
    Outlet(ReachId),
    Other,
    Ungrouped,
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupId::Outlet(id) => write!(f, "{}", id),
            GroupId::Other => write!(f, "Other"),
            GroupId::Ungrouped => write!(f, "NotGrouping"),
        }
    }
}

/// Upstream-connectivity graph of the watershed: each reach maps to the
/// reaches draining directly into it. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ReachGraph {
    upstream: BTreeMap<ReachId, Vec<ReachId>>,
}

impl ReachGraph {
    /// Builds the graph from `(from, to)` reach pairs. Every `from` node
    /// becomes a graph node; edges pointing outside the node set (e.g. the
    /// basin outlet draining to reach 0) are dropped.
    pub fn from_edges(edges: &[(ReachId, ReachId)]) -> Self {
        let mut upstream: BTreeMap<ReachId, Vec<ReachId>> = BTreeMap::new();
        for &(from, _) in edges {
            upstream.entry(from).or_default();
        }
        for &(from, to) in edges {
            if let Some(ups) = upstream.get_mut(&to) {
                ups.push(from);
            }
        }
        ReachGraph { upstream }
    }

    /// Reads a `FROM_NODE,TO_NODE` CSV edge list (one row per reach).
    pub fn load<P: AsRef<Path>>(path: P) -> DmResult<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            DmpotError::Config(format!(
                "reach topology {} is unreadable: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(file);

        let mut edges = Vec::new();
        for record in rdr.records() {
            let record = record?;
            if record.len() < 2 {
                continue;
            }
            let from = record[0].trim().parse::<ReachId>();
            let to = record[1].trim().parse::<ReachId>();
            if let (Ok(from), Ok(to)) = (from, to) {
                edges.push((from, to));
            }
        }
        if edges.is_empty() {
            return Err(DmpotError::Validation(
                "reach topology contains no edges".to_string(),
            ));
        }
        Ok(ReachGraph::from_edges(&edges))
    }

    pub fn contains(&self, id: ReachId) -> bool {
        self.upstream.contains_key(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = ReachId> + '_ {
        self.upstream.keys().copied()
    }

    pub fn node_count(&self) -> usize {
        self.upstream.len()
    }

    /// All reaches draining (directly or transitively) to `outlet`,
    /// including the outlet itself. Iterative DFS with a visited set.
    pub fn reachable_from(&self, outlet: ReachId) -> Vec<ReachId> {
        let mut stack = vec![outlet];
        let mut visited = BTreeSet::new();
        let mut order = Vec::new();
        while let Some(reach) = stack.pop() {
            if !visited.insert(reach) {
                continue;
            }
            order.push(reach);
            if let Some(ups) = self.upstream.get(&reach) {
                stack.extend(ups.iter().copied());
            }
        }
        order
    }
}

/// Partitions the watershed into outlet-rooted groups. Reaches unreachable
/// from every configured outlet land in the `Other` sentinel group, which
/// is always present (possibly empty). An outlet absent from the node set
/// is a configuration error and aborts the campaign.
pub fn group_by_outlet(
    outlets: &[ReachId],
    graph: &ReachGraph,
) -> DmResult<BTreeMap<GroupId, Vec<ReachId>>> {
    let mut groups = BTreeMap::new();
    let mut claimed: BTreeSet<ReachId> = BTreeSet::new();

    let distinct: BTreeSet<ReachId> = outlets.iter().copied().collect();
    for outlet in distinct {
        if !graph.contains(outlet) {
            return Err(DmpotError::Config(format!(
                "outlet {} does not exist in this watershed",
                outlet
            )));
        }
        let members = graph.reachable_from(outlet);
        claimed.extend(members.iter().copied());
        groups.insert(GroupId::Outlet(outlet), members);
    }

    let other: Vec<ReachId> = graph.nodes().filter(|n| !claimed.contains(n)).collect();
    groups.insert(GroupId::Other, other);
    Ok(groups)
}

/// Strips overlap between outlet groups so membership is pairwise
/// disjoint. A group loses every reach it shares with another group that
/// is no larger (ties strip); the smallest enclosing group keeps disputed
/// tributary reaches. Groups are processed in ascending outlet id and
/// always compared against the raw pre-resolution membership, so the
/// outcome is deterministic.
pub fn resolve_overlaps(groups: &mut BTreeMap<GroupId, Vec<ReachId>>) {
    let raw: Vec<(GroupId, BTreeSet<ReachId>)> = groups
        .iter()
        .filter(|(id, _)| matches!(id, GroupId::Outlet(_)))
        .map(|(id, members)| (*id, members.iter().copied().collect()))
        .collect();

    for (id, _) in &raw {
        let mut kept = groups[id].clone();
        for (other_id, other_members) in &raw {
            if other_id == id {
                continue;
            }
            let shares = kept.iter().any(|n| other_members.contains(n));
            if shares && kept.len() >= other_members.len() {
                kept.retain(|n| !other_members.contains(n));
            }
        }
        groups.insert(*id, kept);
    }
}
