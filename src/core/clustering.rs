//! Spatial clustering of branches into interchanges
//!
//! Every ramp node is a point in planar (lat, lng) degrees. Single-linkage
//! clustering with a distance threshold is the same as connected components
//! of the graph joining points closer than the threshold, which an R-tree
//! answers without the pairwise matrix. Branches then take the cluster most
//! of their nodes fell into, so no branch is ever split.

use log::debug;
use petgraph::unionfind::UnionFind;
use rayon::prelude::*;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use std::collections::HashMap;

use interchange_common::names::UNRESOLVED_NAME;
use interchange_common::{Error, Result};

use crate::core::geometry::{calculate_bounds, choose_modal_per_group};
use crate::core::model::{BranchId, Interchange, Ramp};

/// Ramp node position for the R-tree
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexedPoint {
    pub coords: [f64; 2], // [lat, lng]
    pub idx: usize,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.coords)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.coords[0] - point[0];
        let dy = self.coords[1] - point[1];
        dx * dx + dy * dy
    }

    fn contains_point(&self, point: &[f64; 2]) -> bool {
        self.coords == *point
    }
}

/// Single-linkage cluster label per point
///
/// Two points share a label iff a chain of points links them with every hop
/// strictly shorter than `threshold`. Labels are cluster representatives,
/// not dense numbers.
pub fn single_linkage_labels(points: &[[f64; 2]], threshold: f64) -> Vec<usize> {
    let indexed: Vec<IndexedPoint> = points
        .iter()
        .enumerate()
        .map(|(idx, &coords)| IndexedPoint { coords, idx })
        .collect();
    let tree = RTree::bulk_load(indexed);
    let radius_2 = threshold * threshold;

    let links: Vec<(usize, usize)> = points
        .par_iter()
        .enumerate()
        .flat_map_iter(|(i, p)| {
            tree.locate_within_distance(*p, radius_2)
                .filter(move |q| q.idx > i && q.distance_2(p) < radius_2)
                .map(move |q| (i, q.idx))
                .collect::<Vec<_>>()
        })
        .collect();

    let mut clusters = UnionFind::<usize>::new(points.len());
    for (a, b) in links {
        clusters.union(a, b);
    }
    (0..points.len()).map(|i| clusters.find(i)).collect()
}

/// Build an interchange around `ramps` with the placeholder name
pub fn create_interchange_from_ramps(ramps: Vec<Ramp>, id: u32) -> Result<Interchange> {
    let bounds = calculate_bounds(ramps.iter().flat_map(|r| r.nodes())).ok_or_else(|| {
        Error::NoBoundsComputable(format!("interchange {id} has {} ramp(s) and no nodes", ramps.len()))
    })?;
    Ok(Interchange {
        id,
        name: UNRESOLVED_NAME.to_string(),
        bounds,
        ramps,
        refs: Vec::new(),
        external_records: Vec::new(),
        wikidata_ids: Vec::new(),
    })
}

/// Group branch-tagged ramps into interchanges
///
/// Interchanges come out in the order their cluster is first chosen while
/// walking branches in first-seen order, numbered from 1.
pub fn group_ramps_to_interchanges(ramps: Vec<Ramp>, threshold_deg: f64) -> Result<Vec<Interchange>> {
    if ramps.is_empty() {
        return Ok(Vec::new());
    }

    let mut branch_order: Vec<Option<BranchId>> = Vec::new();
    let mut branch_ramps: HashMap<Option<BranchId>, Vec<Ramp>> = HashMap::new();
    let mut points: Vec<[f64; 2]> = Vec::new();
    let mut point_branch: Vec<Option<BranchId>> = Vec::new();

    for ramp in &ramps {
        for node in ramp.nodes() {
            points.push([node.lat, node.lng]);
            point_branch.push(ramp.branch_id);
        }
    }

    if points.len() < 2 {
        return Ok(vec![create_interchange_from_ramps(ramps, 1)?]);
    }

    for ramp in ramps {
        if !branch_ramps.contains_key(&ramp.branch_id) {
            branch_order.push(ramp.branch_id);
        }
        branch_ramps.entry(ramp.branch_id).or_default().push(ramp);
    }

    let labels = single_linkage_labels(&points, threshold_deg);

    let mut labels_by_branch: HashMap<Option<BranchId>, Vec<usize>> = HashMap::new();
    for (branch, label) in point_branch.iter().zip(&labels) {
        labels_by_branch.entry(*branch).or_default().push(*label);
    }
    let groups: Vec<(Option<BranchId>, Vec<usize>)> = branch_order
        .iter()
        .map(|b| (*b, labels_by_branch.remove(b).unwrap_or_default()))
        .collect();
    let assignment = choose_modal_per_group(&groups);

    let mut cluster_order: Vec<usize> = Vec::new();
    let mut cluster_branches: HashMap<usize, Vec<Option<BranchId>>> = HashMap::new();
    for (branch, label) in assignment {
        let entry = cluster_branches.entry(label).or_default();
        if entry.is_empty() {
            cluster_order.push(label);
        }
        entry.push(branch);
    }

    let mut interchanges = Vec::with_capacity(cluster_order.len());
    for label in cluster_order {
        let members: Vec<Ramp> = cluster_branches[&label]
            .iter()
            .filter_map(|b| branch_ramps.remove(b))
            .flatten()
            .collect();
        if members.is_empty() {
            continue;
        }
        let id = interchanges.len() as u32 + 1;
        interchanges.push(create_interchange_from_ramps(members, id)?);
    }

    debug!(
        "Clustered {} points from {} branches into {} interchanges",
        points.len(),
        groups.len(),
        interchanges.len()
    );
    Ok(interchanges)
}
