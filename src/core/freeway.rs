//! Freeway mainline pieces that join the link network
//!
//! Link ways alone leave the ends of a freeway (and the spurs of the
//! elevated road) unrepresented. Endpoint ways of a route and the ways off
//! its longest chain are added as extra segments before contraction.

use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};

use interchange_common::{Error, Result};

use crate::core::model::{NodeId, PathSegment};
use crate::core::osm::{Coordinate, ElementSet, Member, MemberKind, RawElement, RawRelation, RawWay};

/// Member ways of the `type=route` relations, geometry resolved from nodes
///
/// Order follows relation members; repeats, `highway=proposed` ways and
/// ways with unresolved nodes are skipped.
pub fn extract_route_ways(set: &ElementSet) -> Vec<RawWay> {
    let ways = set.way_index();
    let nodes = set.node_index();
    let mut seen: HashSet<i64> = HashSet::new();
    let mut result = Vec::new();

    let member_ids = set
        .relations()
        .filter(|r| r.tag("type") == Some("route"))
        .flat_map(|r| r.member_refs(MemberKind::Way));
    for way_id in member_ids {
        if !seen.insert(way_id) {
            continue;
        }
        let Some(way) = ways.get(&way_id) else {
            continue;
        };
        if way.nodes.len() < 2 || way.tags.get("highway").map(String::as_str) == Some("proposed") {
            continue;
        }
        let geometry: Option<Vec<Coordinate>> = way
            .nodes
            .iter()
            .map(|id| nodes.get(id).map(|n| Coordinate { lat: n.lat, lon: n.lon }))
            .collect();
        let Some(geometry) = geometry else {
            continue;
        };
        result.push(RawWay {
            geometry,
            ..(*way).clone()
        });
    }
    debug!("{} route member ways", result.len());
    result
}

/// Segments starting where nothing ends or ending where nothing starts
pub fn extract_endpoint_ways(segments: &[PathSegment]) -> Vec<PathSegment> {
    let mut out_count: HashMap<NodeId, usize> = HashMap::new();
    let mut in_count: HashMap<NodeId, usize> = HashMap::new();
    for s in segments {
        *out_count.entry(s.start().id).or_insert(0) += 1;
        *in_count.entry(s.end().id).or_insert(0) += 1;
    }
    segments
        .iter()
        .filter(|s| !in_count.contains_key(&s.start().id) || !out_count.contains_key(&s.end().id))
        .cloned()
        .collect()
}

/// Drop endpoints already attached to a link's entrance or exit
pub fn filter_endpoints_by_motorway_link(endpoints: Vec<PathSegment>, links: &[PathSegment]) -> Vec<PathSegment> {
    if links.is_empty() {
        return endpoints;
    }
    let link_starts: HashSet<NodeId> = links.iter().map(|l| l.start().id).collect();
    let link_ends: HashSet<NodeId> = links.iter().map(|l| l.end().id).collect();
    endpoints
        .into_iter()
        .filter(|p| !link_starts.contains(&p.end().id) && !link_ends.contains(&p.start().id))
        .collect()
}

/// Undirected adjacency between segments sharing an endpoint node
fn endpoint_adjacency(segments: &[PathSegment]) -> Vec<Vec<usize>> {
    let mut by_endpoint: HashMap<NodeId, Vec<usize>> = HashMap::new();
    for (i, s) in segments.iter().enumerate() {
        by_endpoint.entry(s.start().id).or_default().push(i);
        if s.end().id != s.start().id {
            by_endpoint.entry(s.end().id).or_default().push(i);
        }
    }
    let mut adjacency: Vec<HashSet<usize>> = vec![HashSet::new(); segments.len()];
    for members in by_endpoint.values() {
        for (k, &a) in members.iter().enumerate() {
            for &b in &members[k + 1..] {
                if a != b {
                    adjacency[a].insert(b);
                    adjacency[b].insert(a);
                }
            }
        }
    }
    adjacency
        .into_iter()
        .map(|set| {
            let mut v: Vec<usize> = set.into_iter().collect();
            v.sort_unstable();
            v
        })
        .collect()
}

/// Shortest path from `from` to `to` by BFS, as segment positions
fn bfs_path(adjacency: &[Vec<usize>], from: usize, to: usize) -> Vec<usize> {
    let mut parent: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    parent.insert(from, from);
    while let Some(u) = queue.pop_front() {
        if u == to {
            break;
        }
        for &v in &adjacency[u] {
            if let std::collections::hash_map::Entry::Vacant(e) = parent.entry(v) {
                e.insert(u);
                queue.push_back(v);
            }
        }
    }
    if !parent.contains_key(&to) {
        return Vec::new();
    }
    let mut path = vec![to];
    let mut cur = to;
    while cur != from {
        cur = parent[&cur];
        path.push(cur);
    }
    path.reverse();
    path
}

/// Longest endpoint-to-endpoint chain of every connected component
///
/// Within a component, candidates are shortest paths between segments with
/// exactly one neighbour; the first longest wins.
pub fn find_longest_connected_path(segments: &[PathSegment]) -> Result<Vec<PathSegment>> {
    if segments.len() <= 1 {
        return Ok(segments.to_vec());
    }
    let adjacency = endpoint_adjacency(segments);

    let mut component_of = vec![usize::MAX; segments.len()];
    let mut components: Vec<Vec<usize>> = Vec::new();
    for seed in 0..segments.len() {
        if component_of[seed] != usize::MAX {
            continue;
        }
        let id = components.len();
        let mut members = Vec::new();
        let mut queue = VecDeque::from([seed]);
        component_of[seed] = id;
        while let Some(u) = queue.pop_front() {
            members.push(u);
            for &v in &adjacency[u] {
                if component_of[v] == usize::MAX {
                    component_of[v] = id;
                    queue.push_back(v);
                }
            }
        }
        members.sort_unstable();
        components.push(members);
    }

    let mut longest = Vec::new();
    for members in components {
        if members.len() == 1 {
            longest.push(segments[members[0]].clone());
            continue;
        }
        let leaves: Vec<usize> = members.iter().copied().filter(|&m| adjacency[m].len() == 1).collect();
        if leaves.len() < 2 {
            return Err(Error::StructuralAssumption(format!(
                "component around way {} has {} dead end(s), need 2",
                segments[members[0]].way_id,
                leaves.len()
            )));
        }
        let mut best: Vec<usize> = Vec::new();
        for (i, &a) in leaves.iter().enumerate() {
            for &b in &leaves[i + 1..] {
                let path = bfs_path(&adjacency, a, b);
                if path.len() > best.len() {
                    best = path;
                }
            }
        }
        longest.extend(best.into_iter().map(|p| segments[p].clone()));
    }
    Ok(longest)
}

/// Segments off the longest chains: spurs and connectors of a route
pub fn extract_branch_ways(segments: &[PathSegment]) -> Result<Vec<PathSegment>> {
    let main: HashSet<i64> = find_longest_connected_path(segments)?
        .iter()
        .map(|s| s.way_id)
        .collect();
    Ok(segments
        .iter()
        .filter(|s| !main.contains(&s.way_id))
        .cloned()
        .collect())
}

/// Give a bare elevated route relation a route master
///
/// Sets that already carry a master come back unchanged. Otherwise a master
/// is synthesised over every route relation, named after the first one.
pub fn wrap_elevated_relation_as_route_master(set: &ElementSet) -> ElementSet {
    let mut wrapped = set.clone();
    if set.relations().any(|r| r.tag("type") == Some("route_master")) {
        return wrapped;
    }
    let routes: Vec<&RawRelation> = set.relations().filter(|r| r.tag("type") == Some("route")).collect();
    let Some(first) = routes.first() else {
        return wrapped;
    };

    let mut tags = HashMap::new();
    tags.insert("type".to_string(), "route_master".to_string());
    for key in ["name", "ref"] {
        if let Some(v) = first.tag(key) {
            tags.insert(key.to_string(), v.to_string());
        }
    }
    let members = routes
        .iter()
        .map(|r| Member {
            kind: MemberKind::Relation,
            ref_id: r.id,
            role: String::new(),
        })
        .collect();
    wrapped.elements.push(RawElement::Relation(RawRelation {
        id: -first.id,
        tags,
        members,
    }));
    wrapped
}

/// Whether every route master of the set has exactly two child routes
pub fn has_two_direction_masters(set: &ElementSet) -> bool {
    let routes = set.relation_index();
    let mut masters = set
        .relations()
        .filter(|r| r.tag("type") == Some("route_master"))
        .peekable();
    masters.peek().is_some()
        && masters.all(|m| {
            m.member_refs(MemberKind::Relation)
                .filter(|id| routes.get(id).is_some_and(|r| r.tag("type") == Some("route")))
                .count()
                == 2
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Node;
    use crate::core::osm::{RawNode, Tags};

    fn seg(way_id: i64, ids: &[NodeId]) -> PathSegment {
        let nodes = ids.iter().map(|&id| Node::new(id, 25.0, 121.0 + id as f64 * 1e-3)).collect();
        PathSegment::new(way_id, 0, nodes)
    }

    fn way_ids(segments: &[PathSegment]) -> Vec<i64> {
        segments.iter().map(|s| s.way_id).collect()
    }

    #[test]
    fn test_extract_route_ways_resolves_geometry() {
        let node = |id: i64| {
            RawElement::Node(RawNode {
                id,
                lat: 25.0,
                lon: 121.0 + id as f64,
                tags: Tags::new(),
            })
        };
        let way = |id: i64, nodes: &[i64], tags: &[(&str, &str)]| {
            RawElement::Way(RawWay {
                id,
                tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                nodes: nodes.to_vec(),
                geometry: vec![],
            })
        };
        let member = |id: i64| Member {
            kind: MemberKind::Way,
            ref_id: id,
            role: String::new(),
        };
        let set = ElementSet {
            elements: vec![
                node(1),
                node(2),
                node(3),
                way(10, &[1, 2], &[]),
                way(11, &[2, 3], &[("highway", "proposed")]),
                way(12, &[3, 99], &[]),
                RawElement::Relation(RawRelation {
                    id: 100,
                    tags: [("type".to_string(), "route".to_string())].into_iter().collect(),
                    members: vec![member(10), member(11), member(12), member(10)],
                }),
            ],
        };
        let ways = extract_route_ways(&set);
        assert_eq!(ways.len(), 1);
        assert_eq!(ways[0].id, 10);
        assert_eq!(ways[0].geometry.len(), 2);
        assert_eq!(ways[0].geometry[1].lon, 123.0);
    }

    #[test]
    fn test_endpoint_ways() {
        let segments = vec![seg(1, &[1, 2]), seg(2, &[2, 3]), seg(3, &[3, 4])];
        assert_eq!(way_ids(&extract_endpoint_ways(&segments)), vec![1, 3]);
    }

    #[test]
    fn test_filter_endpoints_attached_to_links() {
        let endpoints = vec![seg(1, &[1, 2]), seg(3, &[3, 4])];
        let links = vec![seg(50, &[2, 60])];
        let kept = filter_endpoints_by_motorway_link(endpoints, &links);
        assert_eq!(way_ids(&kept), vec![3]);
    }

    #[test]
    fn test_branch_ways_are_off_the_main_chain() {
        // main: 1-2-3-4-5, spur 3-9
        let segments = vec![
            seg(1, &[1, 2]),
            seg(2, &[2, 3]),
            seg(3, &[3, 4]),
            seg(4, &[4, 5]),
            seg(5, &[3, 9]),
        ];
        let branches = extract_branch_ways(&segments).unwrap();
        assert_eq!(way_ids(&branches), vec![5]);
    }

    #[test]
    fn test_ring_component_is_rejected() {
        let segments = vec![seg(1, &[1, 2]), seg(2, &[2, 3]), seg(3, &[3, 1])];
        let err = find_longest_connected_path(&segments).unwrap_err();
        assert!(matches!(err, Error::StructuralAssumption(_)));
    }

    #[test]
    fn test_wrap_elevated_relation() {
        let route = RawRelation {
            id: 9,
            tags: [
                ("type".to_string(), "route".to_string()),
                ("name".to_string(), "汐止楊梅高架".to_string()),
            ]
            .into_iter()
            .collect(),
            members: vec![],
        };
        let set = ElementSet {
            elements: vec![RawElement::Relation(route)],
        };
        let wrapped = wrap_elevated_relation_as_route_master(&set);
        let master = wrapped
            .relations()
            .find(|r| r.tag("type") == Some("route_master"))
            .unwrap();
        assert_eq!(master.tag("name"), Some("汐止楊梅高架"));
        assert_eq!(master.member_refs(MemberKind::Relation).collect::<Vec<_>>(), vec![9]);
        assert!(!has_two_direction_masters(&wrapped));
        assert_eq!(wrap_elevated_relation_as_route_master(&wrapped), wrapped);
    }
}
