//! Segment preparation: raw ways to path segments, cut at junctions and signals

use log::debug;
use std::collections::{HashMap, HashSet};

use interchange_common::{Error, Result};

use crate::core::model::{Node, NodeId, PathSegment, SegmentId, WayId};
use crate::core::osm::{is_accessible, is_traffic_control, is_two_way, RawNode, RawWay};

/// Convert one way into a single segment (part 0)
pub fn segment_from_way(way: &RawWay) -> Result<PathSegment> {
    if way.geometry.is_empty() {
        return Err(Error::MalformedInput(format!("way {}: geometry is empty", way.id)));
    }
    if way.nodes.is_empty() {
        return Err(Error::MalformedInput(format!("way {}: node list is empty", way.id)));
    }
    if way.geometry.len() != way.nodes.len() {
        return Err(Error::MalformedInput(format!(
            "way {}: {} coordinates for {} nodes",
            way.id,
            way.geometry.len(),
            way.nodes.len()
        )));
    }

    let nodes = way
        .geometry
        .iter()
        .zip(&way.nodes)
        .map(|(coord, &id)| Node::new(id, coord.lat, coord.lon))
        .collect();
    Ok(PathSegment::new(way.id, 0, nodes))
}

/// Drop ways closed to traffic or explicitly excluded
pub fn filter_accessible_ways<'a>(
    ways: impl IntoIterator<Item = &'a RawWay>,
    excluded: &HashSet<WayId>,
) -> Vec<&'a RawWay> {
    ways.into_iter()
        .filter(|w| is_accessible(w) && !excluded.contains(&w.id))
        .collect()
}

/// Build segments from ways
///
/// With `duplicate_two_way`, ways tagged `oneway=no` also yield a reversed
/// copy under the same way id, part 1.
pub fn segments_from_ways<'a>(
    ways: impl IntoIterator<Item = &'a RawWay>,
    duplicate_two_way: bool,
) -> Result<Vec<PathSegment>> {
    let mut segments = Vec::new();
    for way in ways {
        let segment = segment_from_way(way)?;
        if duplicate_two_way && is_two_way(way) {
            let mut reversed = segment.nodes.clone();
            reversed.reverse();
            segments.push(segment);
            segments.push(PathSegment::new(way.id, 1, reversed));
        } else {
            segments.push(segment);
        }
    }
    Ok(segments)
}

/// Per-way part counter keeping (way, part) unique across a split pass
#[derive(Default)]
struct PartAllocator {
    next: HashMap<WayId, u32>,
}

impl PartAllocator {
    fn alloc(&mut self, way_id: WayId) -> u32 {
        let slot = self.next.entry(way_id).or_insert(0);
        let part = *slot;
        *slot += 1;
        part
    }
}

/// Split segments at interior nodes listed in `node_ids`
///
/// Part indices are reassigned per way id in output order. A split piece
/// keeps the `ended` flag only when it is the tail of its source segment.
pub fn break_segments_by_nodes(segments: &[PathSegment], node_ids: &HashSet<NodeId>) -> Vec<PathSegment> {
    let mut parts = PartAllocator::default();
    let mut results = Vec::with_capacity(segments.len());

    for segment in segments {
        let way_id = segment.way_id;
        let len = segment.nodes.len();
        let break_points: Vec<usize> = if len > 2 {
            (1..len - 1)
                .filter(|&i| node_ids.contains(&segment.nodes[i].id))
                .collect()
        } else {
            Vec::new()
        };

        if break_points.is_empty() {
            results.push(PathSegment {
                way_id,
                part: parts.alloc(way_id),
                nodes: segment.nodes.clone(),
                ended: segment.ended,
            });
            continue;
        }

        let mut start = 0;
        for end in break_points.into_iter().chain(std::iter::once(len - 1)) {
            results.push(PathSegment {
                way_id,
                part: parts.alloc(way_id),
                nodes: segment.nodes[start..=end].to_vec(),
                ended: end == len - 1 && segment.ended,
            });
            start = end;
        }
    }
    results
}

/// Split segments where an interior node is another segment's endpoint
pub fn break_segments_by_endpoints(segments: &[PathSegment]) -> Vec<PathSegment> {
    let endpoints: HashSet<NodeId> = segments
        .iter()
        .filter(|s| !s.nodes.is_empty())
        .flat_map(|s| [s.start().id, s.end().id])
        .collect();
    break_segments_by_nodes(segments, &endpoints)
}

/// Split segments at traffic signals and stops, marking pieces that end on one
pub fn break_segments_by_signals(
    segments: &[PathSegment],
    nodes: &HashMap<NodeId, &RawNode>,
) -> Vec<PathSegment> {
    let signals: HashSet<NodeId> = nodes
        .values()
        .filter(|n| is_traffic_control(n))
        .map(|n| n.id)
        .collect();
    debug!("{} traffic control nodes", signals.len());

    let mut pieces = break_segments_by_nodes(segments, &signals);
    for piece in &mut pieces {
        piece.ended = signals.contains(&piece.end().id);
    }
    pieces
}

/// Append `extra` to `base`, skipping segment ids already present
pub fn concat_segments(mut base: Vec<PathSegment>, extra: &[PathSegment]) -> Vec<PathSegment> {
    let mut seen: HashSet<SegmentId> = base.iter().map(PathSegment::segment_id).collect();
    for segment in extra {
        if seen.insert(segment.segment_id()) {
            base.push(segment.clone());
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::osm::{Coordinate, Tags};

    fn way(id: WayId, nodes: &[NodeId], tags: &[(&str, &str)]) -> RawWay {
        RawWay {
            id,
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Tags>(),
            nodes: nodes.to_vec(),
            geometry: nodes
                .iter()
                .map(|&n| Coordinate {
                    lat: 25.0 + n as f64 * 1e-4,
                    lon: 121.0,
                })
                .collect(),
        }
    }

    fn node_ids(segment: &PathSegment) -> Vec<NodeId> {
        segment.nodes.iter().map(|n| n.id).collect()
    }

    #[test]
    fn test_segment_from_way_rejects_mismatch() {
        let mut w = way(1, &[1, 2, 3], &[]);
        w.geometry.pop();
        assert!(matches!(segment_from_way(&w), Err(Error::MalformedInput(_))));

        let empty = RawWay {
            id: 2,
            tags: Tags::new(),
            nodes: vec![],
            geometry: vec![],
        };
        assert!(matches!(segment_from_way(&empty), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_two_way_duplication() {
        let ways = vec![way(1, &[1, 2, 3], &[("oneway", "no")]), way(2, &[3, 4], &[])];
        let segments = segments_from_ways(&ways, true).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(node_ids(&segments[1]), vec![3, 2, 1]);
        assert_eq!(segments[1].segment_id(), SegmentId { way_id: 1, part: 1 });

        let plain = segments_from_ways(&ways, false).unwrap();
        assert_eq!(plain.len(), 2);
    }

    #[test]
    fn test_filter_accessible_ways() {
        let ways = vec![
            way(1, &[1, 2], &[("access", "no")]),
            way(2, &[2, 3], &[]),
            way(3, &[3, 4], &[]),
        ];
        let excluded: HashSet<WayId> = [3].into_iter().collect();
        let kept = filter_accessible_ways(&ways, &excluded);
        assert_eq!(kept.iter().map(|w| w.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_break_by_endpoints_unique_parts() {
        let ways = vec![way(1, &[1, 2, 3, 4, 5], &[]), way(2, &[3, 9], &[]), way(3, &[8, 4], &[])];
        let segments = segments_from_ways(&ways, false).unwrap();
        let pieces = break_segments_by_endpoints(&segments);

        let way1: Vec<_> = pieces.iter().filter(|p| p.way_id == 1).collect();
        assert_eq!(way1.len(), 3);
        assert_eq!(node_ids(way1[0]), vec![1, 2, 3]);
        assert_eq!(node_ids(way1[1]), vec![3, 4]);
        assert_eq!(node_ids(way1[2]), vec![4, 5]);

        let ids: HashSet<SegmentId> = pieces.iter().map(PathSegment::segment_id).collect();
        assert_eq!(ids.len(), pieces.len());
    }

    #[test]
    fn test_break_by_signals_sets_ended() {
        let signal = RawNode {
            id: 3,
            lat: 25.0,
            lon: 121.0,
            tags: [("highway".to_string(), "traffic_signals".to_string())]
                .into_iter()
                .collect(),
        };
        let nodes: HashMap<NodeId, &RawNode> = [(3, &signal)].into_iter().collect();
        let segments = segments_from_ways(&[way(1, &[1, 2, 3, 4], &[])], false).unwrap();
        let pieces = break_segments_by_signals(&segments, &nodes);

        assert_eq!(pieces.len(), 2);
        assert!(pieces[0].ended);
        assert!(!pieces[1].ended);
        assert_eq!(pieces[1].part, 1);
    }

    #[test]
    fn test_concat_skips_duplicates() {
        let a = segments_from_ways(&[way(1, &[1, 2], &[])], false).unwrap();
        let b = segments_from_ways(&[way(1, &[1, 2], &[]), way(2, &[2, 3], &[])], false).unwrap();
        let merged = concat_segments(a, &b);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].way_id, 2);
    }
}
