//! DAG projection over the ramp graph
//!
//! `dag_to` keeps a cycle-free subset of `to_ramps`. Edges are admitted in
//! breadth-first pop order and only when they join two ramps not already
//! connected (undirected) by earlier admitted edges. The result depends on
//! queue discipline, so it is pinned: FIFO, seeded with zero-indegree ramps
//! in ascending position, successors visited in ascending id order.

use log::debug;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use petgraph::unionfind::UnionFind;
use std::collections::{HashMap, VecDeque};

use interchange_common::{Error, Result};

use crate::core::model::{BranchId, Ramp, RampId};

fn positions(ramps: &[Ramp]) -> HashMap<RampId, usize> {
    ramps.iter().enumerate().map(|(i, r)| (r.id, i)).collect()
}

/// Derive `dag_to` for every ramp, leaving the full graph untouched
pub fn build_dag_edges(mut ramps: Vec<Ramp>) -> Vec<Ramp> {
    if ramps.is_empty() {
        return ramps;
    }
    let pos = positions(&ramps);

    let mut in_degree = vec![0usize; ramps.len()];
    for ramp in &ramps {
        for to in &ramp.to_ramps {
            if let Some(&p) = pos.get(to) {
                in_degree[p] += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..ramps.len()).filter(|&p| in_degree[p] == 0).collect();
    if queue.is_empty() {
        queue.extend(0..ramps.len());
    }

    let mut components = UnionFind::<usize>::new(ramps.len());
    let mut visited = vec![false; ramps.len()];
    for ramp in &mut ramps {
        ramp.dag_to.clear();
    }

    while let Some(u) = queue.pop_front() {
        if visited[u] {
            continue;
        }
        visited[u] = true;

        let successors = ramps[u].to_ramps.clone();
        let mut kept = Vec::new();
        for to in successors {
            let Some(&v) = pos.get(&to) else {
                continue;
            };
            queue.push_back(v);
            if !components.equiv(u, v) {
                kept.push(to);
                components.union(u, v);
            }
        }
        kept.sort_unstable();
        kept.dedup();
        ramps[u].dag_to = kept;
    }

    let kept: usize = ramps.iter().map(|r| r.dag_to.len()).sum();
    let total: usize = ramps.iter().map(|r| r.to_ramps.len()).sum();
    debug!("DAG keeps {kept} of {total} ramp edges");
    ramps
}

/// Number weak components of the `dag_to` graph in discovery order
pub fn assign_branch_ids(mut ramps: Vec<Ramp>) -> Vec<Ramp> {
    let pos = positions(&ramps);
    let mut components = UnionFind::<usize>::new(ramps.len());
    for (u, ramp) in ramps.iter().enumerate() {
        for to in &ramp.dag_to {
            if let Some(&v) = pos.get(to) {
                components.union(u, v);
            }
        }
    }

    let mut branch_of_root: HashMap<usize, BranchId> = HashMap::new();
    for (p, ramp) in ramps.iter_mut().enumerate() {
        let next = branch_of_root.len();
        let branch = *branch_of_root.entry(components.find(p)).or_insert(next);
        ramp.branch_id = Some(branch);
    }
    debug!("Assigned {} branches over {} ramps", branch_of_root.len(), ramps.len());
    ramps
}

/// Positions of `ramps` ordered downstream first over `dag_to`
///
/// Edges to ramps outside the slice are ignored.
pub fn reverse_topological_order(ramps: &[Ramp]) -> Result<Vec<usize>> {
    let pos = positions(ramps);
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(ramps.len(), ramps.len());
    let indices: Vec<_> = (0..ramps.len()).map(|p| graph.add_node(p)).collect();
    for (u, ramp) in ramps.iter().enumerate() {
        for to in &ramp.dag_to {
            if let Some(&v) = pos.get(to) {
                graph.add_edge(indices[u], indices[v], ());
            }
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| {
        Error::StructuralAssumption(format!(
            "dag_to contains a cycle through ramp {}",
            ramps[graph[cycle.node_id()]].id
        ))
    })?;
    Ok(order.into_iter().rev().map(|n| graph[n]).collect())
}
