//! Name-driven restructuring of interchanges
//!
//! Every operation takes the full list and returns a new one with ids
//! renumbered densely from 1.

use log::{debug, info};
use std::collections::{HashMap, HashSet};

use interchange_common::names::{is_compound_name, UNRESOLVED_NAME};
use interchange_common::Result;

use crate::core::clustering::{create_interchange_from_ramps, group_ramps_to_interchanges};
use crate::core::model::{BranchId, Interchange, Ramp, WayId};

/// Renumber ids 1..=N in list order
pub fn renumber_interchanges(mut interchanges: Vec<Interchange>) -> Vec<Interchange> {
    for (i, ic) in interchanges.iter_mut().enumerate() {
        ic.id = i as u32 + 1;
    }
    interchanges
}

fn rebuild_named(ramps: Vec<Ramp>, id: u32, name: &str) -> Result<Interchange> {
    let mut ic = create_interchange_from_ramps(ramps, id)?;
    ic.name = name.to_string();
    Ok(ic)
}

/// Move every branch touching one of `way_ids` into its own interchange
///
/// The source interchange keeps its other branches, id and name. Isolated
/// branches inherit the name and are appended after all existing ones.
pub fn isolate_interchanges_by_branch(
    interchanges: Vec<Interchange>,
    way_ids: &HashSet<WayId>,
) -> Result<Vec<Interchange>> {
    let mut kept = Vec::with_capacity(interchanges.len());
    let mut isolated = Vec::new();

    for ic in interchanges {
        let mut branch_order: Vec<Option<BranchId>> = Vec::new();
        let mut by_branch: HashMap<Option<BranchId>, Vec<Ramp>> = HashMap::new();
        for ramp in &ic.ramps {
            if !by_branch.contains_key(&ramp.branch_id) {
                branch_order.push(ramp.branch_id);
            }
            by_branch.entry(ramp.branch_id).or_default().push(ramp.clone());
        }

        let targets: Vec<Option<BranchId>> = branch_order
            .iter()
            .copied()
            .filter(|b| by_branch[b].iter().any(|r| r.way_ids().any(|w| way_ids.contains(&w))))
            .collect();
        if targets.is_empty() {
            kept.push(ic);
            continue;
        }

        let remaining: Vec<Ramp> = ic
            .ramps
            .iter()
            .filter(|r| !targets.contains(&r.branch_id))
            .cloned()
            .collect();
        if !remaining.is_empty() {
            kept.push(rebuild_named(remaining, ic.id, &ic.name)?);
        }
        for branch in targets {
            debug!("Isolating branch {branch:?} out of '{}'", ic.name);
            if let Some(ramps) = by_branch.remove(&branch) {
                isolated.push(rebuild_named(ramps, 0, &ic.name)?);
            }
        }
    }

    kept.extend(isolated);
    Ok(renumber_interchanges(kept))
}

/// Re-cluster interchanges whose name lists several facilities
pub fn split_interchanges_by_name_marker(
    interchanges: Vec<Interchange>,
    threshold_deg: f64,
) -> Result<Vec<Interchange>> {
    let mut result = Vec::with_capacity(interchanges.len());
    for ic in interchanges {
        if is_compound_name(&ic.name) {
            let parts = group_ramps_to_interchanges(ic.ramps, threshold_deg)?;
            info!("Splitting interchange '{}' into {}", ic.name, parts.len());
            result.extend(parts);
        } else {
            result.push(ic);
        }
    }
    Ok(renumber_interchanges(result))
}

/// Merge interchanges into one, keeping the first one's id and name
pub fn merge_interchanges(group: Vec<Interchange>) -> Result<Interchange> {
    let (id, name) = match group.first() {
        Some(first) => (first.id, first.name.clone()),
        None => (0, UNRESOLVED_NAME.to_string()),
    };
    let ramps: Vec<Ramp> = group.into_iter().flat_map(|ic| ic.ramps).collect();
    rebuild_named(ramps, id, &name)
}

/// Merge interchanges sharing the exact same name
///
/// The unresolved placeholder never merges. Groups stay in order of their
/// first member.
pub fn merge_interchanges_by_name(interchanges: Vec<Interchange>) -> Result<Vec<Interchange>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Interchange>> = HashMap::new();
    for ic in interchanges {
        if !groups.contains_key(&ic.name) {
            order.push(ic.name.clone());
        }
        groups.entry(ic.name.clone()).or_default().push(ic);
    }

    let mut merged = Vec::with_capacity(order.len());
    for name in order {
        let Some(group) = groups.remove(&name) else {
            continue;
        };
        if name == UNRESOLVED_NAME || group.len() == 1 {
            merged.extend(group);
        } else {
            info!("Merging {} interchanges named '{name}'", group.len());
            merged.push(merge_interchanges(group)?);
        }
    }
    Ok(renumber_interchanges(merged))
}

/// Drop interchanges containing any of `way_ids`
pub fn delete_interchanges_containing_ways(
    interchanges: Vec<Interchange>,
    way_ids: &HashSet<WayId>,
) -> Vec<Interchange> {
    let kept = interchanges
        .into_iter()
        .filter(|ic| {
            let hit = way_ids.iter().find(|&&w| ic.contains_way(w));
            if let Some(way_id) = hit {
                info!("Deleting interchange {} ({}) containing way {way_id}", ic.id, ic.name);
            }
            hit.is_none()
        })
        .collect();
    renumber_interchanges(kept)
}

/// Force-rename interchanges containing a listed way; the first listed match wins
pub fn override_interchange_names_by_way(
    interchanges: Vec<Interchange>,
    overrides: &[(WayId, String)],
) -> Vec<Interchange> {
    let renamed = interchanges
        .into_iter()
        .map(|mut ic| {
            if let Some((_, name)) = overrides.iter().find(|(way_id, _)| ic.contains_way(*way_id)) {
                ic.name = name.clone();
            }
            ic
        })
        .collect();
    renumber_interchanges(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Node, PathSegment};

    fn ramp(id: usize, way_id: WayId, branch: BranchId, lng: f64) -> Ramp {
        let nodes = vec![
            Node::new(id as i64 * 10, 25.0, lng),
            Node::new(id as i64 * 10 + 1, 25.0, lng + 0.0001),
        ];
        let mut r = Ramp::new(id, vec![PathSegment::new(way_id, 0, nodes)]);
        r.branch_id = Some(branch);
        r
    }

    fn ic(id: u32, name: &str, ramps: Vec<Ramp>) -> Interchange {
        rebuild_named(ramps, id, name).unwrap()
    }

    fn assert_dense(interchanges: &[Interchange]) {
        let ids: Vec<u32> = interchanges.iter().map(|ic| ic.id).collect();
        let expected: Vec<u32> = (1..=interchanges.len() as u32).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_isolate_appends_branch() {
        let list = vec![
            ic(1, "A", vec![ramp(0, 100, 0, 121.0), ramp(1, 101, 1, 121.001)]),
            ic(2, "B", vec![ramp(2, 102, 2, 121.5)]),
        ];
        let isolate: HashSet<WayId> = [101].into_iter().collect();
        let out = isolate_interchanges_by_branch(list, &isolate).unwrap();

        assert_eq!(out.len(), 3);
        assert_dense(&out);
        assert_eq!(out[0].name, "A");
        assert!(out[0].contains_way(100) && !out[0].contains_way(101));
        assert_eq!(out[1].name, "B");
        assert_eq!(out[2].name, "A");
        assert!(out[2].contains_way(101));
    }

    #[test]
    fn test_isolate_whole_interchange_keeps_count() {
        let list = vec![ic(1, "A", vec![ramp(0, 100, 0, 121.0)])];
        let isolate: HashSet<WayId> = [100].into_iter().collect();
        let out = isolate_interchanges_by_branch(list, &isolate).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 1);
    }

    #[test]
    fn test_split_compound_name() {
        let list = vec![
            ic(1, "X;Y", vec![ramp(0, 100, 0, 121.0), ramp(1, 101, 1, 121.003)]),
            ic(2, "Z", vec![ramp(2, 102, 2, 121.5)]),
        ];
        let out = split_interchanges_by_name_marker(list, 0.001).unwrap();
        assert_eq!(out.len(), 3);
        assert_dense(&out);
        assert_eq!(out[0].name, UNRESOLVED_NAME);
        assert_eq!(out[2].name, "Z");
    }

    #[test]
    fn test_merge_by_name_skips_placeholder() {
        let list = vec![
            ic(1, "A", vec![ramp(0, 100, 0, 121.0)]),
            ic(2, UNRESOLVED_NAME, vec![ramp(1, 101, 1, 121.1)]),
            ic(3, "A", vec![ramp(2, 102, 2, 121.2)]),
            ic(4, UNRESOLVED_NAME, vec![ramp(3, 103, 3, 121.3)]),
        ];
        let out = merge_interchanges_by_name(list).unwrap();
        assert_eq!(out.len(), 3);
        assert_dense(&out);
        assert_eq!(out[0].name, "A");
        assert_eq!(out[0].ramps.len(), 2);
        assert!((out[0].bounds.max_lng - 121.2001).abs() < 1e-9);
        assert_eq!(out[1].name, UNRESOLVED_NAME);
        assert_eq!(out[2].name, UNRESOLVED_NAME);
    }

    #[test]
    fn test_delete_by_way() {
        let list = vec![
            ic(1, "A", vec![ramp(0, 100, 0, 121.0)]),
            ic(2, "B", vec![ramp(1, 101, 1, 121.1)]),
            ic(3, "C", vec![ramp(2, 102, 2, 121.2)]),
        ];
        let delete: HashSet<WayId> = [101].into_iter().collect();
        let out = delete_interchanges_containing_ways(list, &delete);
        assert_eq!(out.iter().map(|ic| ic.name.as_str()).collect::<Vec<_>>(), vec!["A", "C"]);
        assert_dense(&out);
    }

    #[test]
    fn test_override_first_match_wins() {
        let list = vec![
            ic(1, "A", vec![ramp(0, 100, 0, 121.0), ramp(1, 101, 1, 121.001)]),
            ic(2, "B", vec![ramp(2, 102, 2, 121.2)]),
        ];
        let overrides = vec![(101, "first".to_string()), (100, "second".to_string())];
        let out = override_interchange_names_by_way(list, &overrides);
        assert_eq!(out[0].name, "first");
        assert_eq!(out[1].name, "B");
    }
}
