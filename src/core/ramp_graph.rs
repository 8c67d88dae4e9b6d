//! Ramp graph builder
//!
//! Contracts segment chains through pass-through nodes into ramps, then
//! derives the full ramp-to-ramp adjacency from shared endpoint nodes.

use log::debug;
use std::collections::{HashMap, HashSet};

use interchange_common::{Error, Result};

use crate::core::model::{NodeId, PathSegment, Ramp, RampId, SegmentId};

/// Segments indexed by the node they leave from and the node they reach
struct EndpointIndex {
    outgoing: HashMap<NodeId, Vec<usize>>,
    incoming: HashMap<NodeId, Vec<usize>>,
    /// Start nodes in first-seen order
    start_order: Vec<NodeId>,
}

impl EndpointIndex {
    fn build(segments: &[PathSegment]) -> Self {
        let mut outgoing: HashMap<NodeId, Vec<usize>> = HashMap::new();
        let mut incoming: HashMap<NodeId, Vec<usize>> = HashMap::new();
        let mut start_order = Vec::new();

        for (idx, segment) in segments.iter().enumerate() {
            let start = segment.start().id;
            let out = outgoing.entry(start).or_default();
            if out.is_empty() {
                start_order.push(start);
            }
            out.push(idx);
            incoming.entry(segment.end().id).or_default().push(idx);
        }

        Self {
            outgoing,
            incoming,
            start_order,
        }
    }

    fn out_degree(&self, node: NodeId) -> usize {
        self.outgoing.get(&node).map_or(0, Vec::len)
    }

    fn in_degree(&self, node: NodeId) -> usize {
        self.incoming.get(&node).map_or(0, Vec::len)
    }

    /// Nodes that only ever start segments
    fn begin_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.start_order
            .iter()
            .copied()
            .filter(|n| !self.incoming.contains_key(n))
    }
}

/// Contract segments into ramps
///
/// A chain grows through its last node while that node has exactly one
/// outgoing and one incoming segment, the next segment is unused, and the
/// current one is not `ended`. Chains start from begin nodes first; a second
/// sweep in input order picks up whatever is left (pure cycles). Every
/// segment lands in exactly one ramp and ramp ids follow discovery order.
pub fn contract_segments_to_ramps(segments: &[PathSegment]) -> Result<Vec<Ramp>> {
    if let Some(bad) = segments.iter().find(|s| s.nodes.len() < 2) {
        return Err(Error::MalformedInput(format!(
            "segment {}/{} has {} node(s)",
            bad.way_id,
            bad.part,
            bad.nodes.len()
        )));
    }

    let index = EndpointIndex::build(segments);
    let mut used: HashSet<SegmentId> = HashSet::with_capacity(segments.len());
    let mut ramps: Vec<Ramp> = Vec::new();

    let extend_chain = |first: usize, used: &mut HashSet<SegmentId>| -> Vec<PathSegment> {
        let mut chain = vec![segments[first].clone()];
        used.insert(segments[first].segment_id());
        let mut current = first;

        loop {
            let last = segments[current].end().id;
            if index.out_degree(last) != 1 || index.in_degree(last) != 1 {
                break;
            }
            let next = index.outgoing[&last][0];
            if used.contains(&segments[next].segment_id()) || segments[current].ended {
                break;
            }
            chain.push(segments[next].clone());
            used.insert(segments[next].segment_id());
            current = next;
        }
        chain
    };

    for begin in index.begin_nodes() {
        for &idx in &index.outgoing[&begin] {
            if used.contains(&segments[idx].segment_id()) {
                continue;
            }
            let chain = extend_chain(idx, &mut used);
            ramps.push(Ramp::new(ramps.len(), chain));
        }
    }

    for idx in 0..segments.len() {
        if used.contains(&segments[idx].segment_id()) {
            continue;
        }
        let chain = extend_chain(idx, &mut used);
        ramps.push(Ramp::new(ramps.len(), chain));
    }

    debug!("Contracted {} segments into {} ramps", segments.len(), ramps.len());
    Ok(ramps)
}

/// Fill `to_ramps`/`from_ramps` from shared endpoint nodes
///
/// Every ramp ending at a node links to every ramp starting there. The
/// result may contain cycles; lists are sorted and deduplicated.
pub fn connect_ramps_by_nodes(mut ramps: Vec<Ramp>) -> Vec<Ramp> {
    let mut starting_at: HashMap<NodeId, Vec<RampId>> = HashMap::new();
    for ramp in &ramps {
        starting_at.entry(ramp.start_node().id).or_default().push(ramp.id);
    }

    let mut edges: Vec<(RampId, RampId)> = Vec::new();
    for ramp in &ramps {
        if let Some(next) = starting_at.get(&ramp.end_node().id) {
            edges.extend(next.iter().map(|&to| (ramp.id, to)));
        }
    }

    let position: HashMap<RampId, usize> = ramps.iter().enumerate().map(|(i, r)| (r.id, i)).collect();
    for ramp in &mut ramps {
        ramp.to_ramps.clear();
        ramp.from_ramps.clear();
    }
    for (from, to) in edges {
        ramps[position[&from]].to_ramps.push(to);
        ramps[position[&to]].from_ramps.push(from);
    }
    for ramp in &mut ramps {
        ramp.to_ramps.sort_unstable();
        ramp.to_ramps.dedup();
        ramp.from_ramps.sort_unstable();
        ramp.from_ramps.dedup();
    }
    ramps
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::model::{Node, WayId};

    pub(crate) fn seg(way_id: WayId, ids: &[NodeId]) -> PathSegment {
        let nodes = ids
            .iter()
            .map(|&id| Node::new(id, 25.0 + id as f64 * 1e-4, 121.0 + id as f64 * 1e-4))
            .collect();
        PathSegment::new(way_id, 0, nodes)
    }

    fn way_ids(ramp: &Ramp) -> Vec<WayId> {
        ramp.way_ids().collect()
    }

    #[test]
    fn test_fork_yields_three_ramps() {
        // A: n1->n2, B: n2->n3, C: n2->n4
        let segments = vec![seg(1, &[1, 2]), seg(2, &[2, 3]), seg(3, &[2, 4])];
        let ramps = connect_ramps_by_nodes(contract_segments_to_ramps(&segments).unwrap());
        assert_eq!(ramps.len(), 3);

        let a = ramps.iter().find(|r| r.contains_way(1)).unwrap();
        let b = ramps.iter().find(|r| r.contains_way(2)).unwrap();
        let c = ramps.iter().find(|r| r.contains_way(3)).unwrap();
        assert!(a.to_ramps.contains(&b.id));
        assert!(a.to_ramps.contains(&c.id));
        assert_eq!(b.from_ramps, vec![a.id]);
    }

    #[test]
    fn test_pass_through_chain_contracts() {
        let segments = vec![
            seg(3, &[3, 4]),
            seg(1, &[1, 2]),
            seg(4, &[4, 5]),
            seg(2, &[2, 3]),
        ];
        let ramps = contract_segments_to_ramps(&segments).unwrap();
        assert_eq!(ramps.len(), 1);
        assert_eq!(way_ids(&ramps[0]), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_ended_segment_stops_chain() {
        let mut first = seg(1, &[1, 2]);
        first.ended = true;
        let segments = vec![first, seg(2, &[2, 3])];
        let ramps = connect_ramps_by_nodes(contract_segments_to_ramps(&segments).unwrap());
        assert_eq!(ramps.len(), 2);
        assert_eq!(ramps[0].to_ramps, vec![1]);
    }

    #[test]
    fn test_pure_cycle_is_covered() {
        let segments = vec![seg(1, &[1, 2]), seg(2, &[2, 3]), seg(3, &[3, 1])];
        let ramps = contract_segments_to_ramps(&segments).unwrap();
        assert_eq!(ramps.len(), 1);
        assert_eq!(way_ids(&ramps[0]), vec![1, 2, 3]);
    }

    #[test]
    fn test_coverage_and_continuity() {
        let segments = vec![
            seg(1, &[1, 2]),
            seg(2, &[2, 3]),
            seg(3, &[3, 4]),
            seg(4, &[3, 5]),
            seg(5, &[6, 3]),
            seg(6, &[5, 7]),
        ];
        let ramps = contract_segments_to_ramps(&segments).unwrap();

        let mut seen: Vec<SegmentId> = ramps
            .iter()
            .flat_map(|r| r.segments.iter().map(PathSegment::segment_id))
            .collect();
        seen.sort();
        let mut expected: Vec<SegmentId> = segments.iter().map(PathSegment::segment_id).collect();
        expected.sort();
        assert_eq!(seen, expected);

        for ramp in &ramps {
            for pair in ramp.segments.windows(2) {
                assert_eq!(pair[0].end().id, pair[1].start().id);
            }
        }
    }

    #[test]
    fn test_rejects_degenerate_segment() {
        let segments = vec![seg(1, &[1])];
        assert!(matches!(
            contract_segments_to_ramps(&segments),
            Err(Error::MalformedInput(_))
        ));
    }
}
