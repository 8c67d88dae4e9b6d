//! Route linearization and geographic ordering of interchanges
//!
//! A route's member ways are chained into one directed node graph and walked
//! depth-first from its start, which gives every node a rank along the
//! route. Ranks of all freeway masters are merged into one index keyed by
//! node id; interchanges are then sorted by the smallest (ref, rank, name)
//! any of their nodes reaches.

use log::{debug, info, warn};
use petgraph::graphmap::DiGraphMap;
use petgraph::unionfind::UnionFind;
use petgraph::Direction;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use interchange_common::{Error, Result};

use crate::core::lifecycle::renumber_interchanges;
use crate::core::model::{Interchange, NodeId, RelationKind, RoadType, RouteRelation};
use crate::core::osm::{ElementSet, MemberKind, RawRelation, RawWay};

/// Direction tokens in preference order for picking a master's primary route
const PREFERRED_DIRECTION_TOKENS: [&str; 4] = ["南向", "南下", "順向", "東向"];

/// Position of a node along a master route
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRank {
    pub route_ref: String,
    pub rank: usize,
    pub relation: RouteRelation,
}

impl RouteRank {
    fn key(&self) -> (&str, usize, &str) {
        (&self.route_ref, self.rank, &self.relation.name)
    }
}

pub type MasterIndex = HashMap<NodeId, RouteRank>;

/// Rank every node of a route by depth-first preorder from its start
///
/// The ways must form one weakly connected graph with at least one node
/// nothing leads into; the smallest such node id is the start. Successors
/// are visited in the order their edge was first seen.
pub fn build_ordered_node_ids_for_relation(route: &str, ways: &[&RawWay]) -> Result<HashMap<NodeId, usize>> {
    let mut graph: DiGraphMap<NodeId, ()> = DiGraphMap::new();
    for way in ways {
        if way.nodes.len() < 2 {
            continue;
        }
        for pair in way.nodes.windows(2) {
            graph.add_edge(pair[0], pair[1], ());
        }
    }
    if graph.node_count() == 0 {
        return Ok(HashMap::new());
    }

    let index: HashMap<NodeId, usize> = graph.nodes().enumerate().map(|(i, n)| (n, i)).collect();
    let mut components = UnionFind::<usize>::new(index.len());
    for (a, b, _) in graph.all_edges() {
        components.union(index[&a], index[&b]);
    }
    let roots: HashSet<usize> = (0..index.len()).map(|i| components.find(i)).collect();
    if roots.len() > 1 {
        return Err(Error::ambiguous(
            route,
            format!("member ways form {} connected components", roots.len()),
        ));
    }

    let start = graph
        .nodes()
        .filter(|&n| graph.neighbors_directed(n, Direction::Incoming).next().is_none())
        .min()
        .ok_or_else(|| Error::ambiguous(route, "no start node without incoming edge"))?;

    let mut ranks: HashMap<NodeId, usize> = HashMap::new();
    ranks.insert(start, 0);
    let mut stack: Vec<(NodeId, Vec<NodeId>, usize)> =
        vec![(start, graph.neighbors(start).collect(), 0)];
    while let Some((_, children, next)) = stack.last_mut() {
        let Some(&child) = children.get(*next) else {
            stack.pop();
            continue;
        };
        *next += 1;
        if ranks.contains_key(&child) {
            continue;
        }
        ranks.insert(child, ranks.len());
        stack.push((child, graph.neighbors(child).collect(), 0));
    }
    Ok(ranks)
}

/// (ref, name) shown for a route master
pub fn display_for_master(master: &RawRelation) -> (String, String) {
    let route_ref = master
        .tag("ref")
        .or_else(|| master.tag("name"))
        .map(str::to_string)
        .unwrap_or_else(|| format!("master:{}", master.id));
    let name = master
        .tag("name")
        .map(str::to_string)
        .unwrap_or_else(|| route_ref.clone());
    (route_ref, name)
}

/// Route masters ordered by displayed ref, then id
pub fn list_master_relations(set: &ElementSet) -> Vec<&RawRelation> {
    let mut masters: Vec<&RawRelation> = set
        .relations()
        .filter(|r| r.tag("type") == Some("route_master"))
        .collect();
    masters.sort_by(|a, b| display_for_master(a).0.cmp(&display_for_master(b).0).then(a.id.cmp(&b.id)));
    masters
}

fn preferred_route_score(route: &RawRelation) -> (u8, usize) {
    let name = route.tag("name").unwrap_or_default();
    PREFERRED_DIRECTION_TOKENS
        .iter()
        .position(|token| name.contains(token))
        .map_or((1, 0), |idx| (0, idx))
}

/// Split a master's two child routes into (primary, secondary)
///
/// The primary must carry a preferred direction token and the secondary
/// must not.
pub fn get_preferred_route_for_master<'a>(
    master: &RawRelation,
    routes: &HashMap<i64, &'a RawRelation>,
) -> Result<(&'a RawRelation, &'a RawRelation)> {
    let mut candidates: Vec<&'a RawRelation> = master
        .member_refs(MemberKind::Relation)
        .filter_map(|id| routes.get(&id).copied())
        .filter(|r| r.tag("type") == Some("route"))
        .collect();
    if candidates.len() != 2 {
        return Err(Error::StructuralAssumption(format!(
            "route master {} has {} child routes, expected 2",
            master.id,
            candidates.len()
        )));
    }

    candidates.sort_by(|a, b| {
        preferred_route_score(a)
            .cmp(&preferred_route_score(b))
            .then_with(|| a.tag("name").cmp(&b.tag("name")))
    });
    let (primary, secondary) = (candidates[0], candidates[1]);
    if preferred_route_score(primary).0 == 1 || preferred_route_score(secondary).0 == 0 {
        return Err(Error::StructuralAssumption(format!(
            "route master {} has no single preferred direction",
            master.id
        )));
    }
    debug!(
        "Master {}: primary '{}', secondary '{}'",
        master.id,
        primary.tag("name").unwrap_or_default(),
        secondary.tag("name").unwrap_or_default()
    );
    Ok((primary, secondary))
}

fn route_ways<'a>(route: &RawRelation, ways: &HashMap<i64, &'a RawWay>) -> Vec<&'a RawWay> {
    route
        .member_refs(MemberKind::Way)
        .filter_map(|id| ways.get(&id).copied())
        .collect()
}

/// Rank index over every route master of `set`
///
/// Secondary-direction ranks are offset past the primary's maximum and
/// written first, so primary ranks win on shared nodes. Later masters
/// overwrite earlier ones.
pub fn build_master_order_index(set: &ElementSet) -> Result<MasterIndex> {
    let routes = set.relation_index();
    let ways = set.way_index();
    let mut index = MasterIndex::new();

    for master in list_master_relations(set) {
        let (primary, secondary) = get_preferred_route_for_master(master, &routes)?;
        let (route_ref, name) = display_for_master(master);
        let relation = RouteRelation::new(master.id, name.as_str(), RoadType::Freeway, RelationKind::Relation);

        let primary_ways = route_ways(primary, &ways);
        if primary_ways.is_empty() {
            return Err(Error::MalformedInput(format!("primary route {} has no ways", primary.id)));
        }
        let secondary_ways = route_ways(secondary, &ways);
        if secondary_ways.is_empty() {
            return Err(Error::MalformedInput(format!("secondary route {} has no ways", secondary.id)));
        }

        let ordered = build_ordered_node_ids_for_relation(&name, &primary_ways)?;
        let ordered_secondary = build_ordered_node_ids_for_relation(&name, &secondary_ways)?;
        if ordered.is_empty() || ordered_secondary.is_empty() {
            return Err(Error::MalformedInput(format!("route master {} has no ordered nodes", master.id)));
        }

        let offset = ordered.values().copied().max().unwrap_or(0) + 1;
        for (node, rank) in ordered_secondary {
            index.insert(
                node,
                RouteRank {
                    route_ref: route_ref.clone(),
                    rank: rank + offset,
                    relation: relation.clone(),
                },
            );
        }
        for (node, rank) in ordered {
            index.insert(
                node,
                RouteRank {
                    route_ref: route_ref.clone(),
                    rank,
                    relation: relation.clone(),
                },
            );
        }
    }
    debug!("Master index covers {} nodes", index.len());
    Ok(index)
}

/// Overlay `preferred` on `base`; `preferred` wins on shared nodes
pub fn merge_master_indices(mut base: MasterIndex, preferred: MasterIndex) -> MasterIndex {
    base.extend(preferred);
    base
}

/// Tag interchanges with the masters they touch and sort them along the routes
///
/// Interchanges touching no ranked node keep their relative order at the end.
pub fn reorder_interchanges(interchanges: Vec<Interchange>, index: &MasterIndex) -> Vec<Interchange> {
    if interchanges.is_empty() || index.is_empty() {
        if index.is_empty() {
            warn!("Empty route index, keeping interchange order");
        }
        return interchanges;
    }

    let mut keyed: Vec<(Option<(String, usize, String)>, Interchange)> = Vec::with_capacity(interchanges.len());
    for mut ic in renumber_interchanges(interchanges) {
        let mut ref_names: HashSet<String> = ic.refs.iter().map(|r| r.name.clone()).collect();
        let mut best: Option<&RouteRank> = None;
        let mut touched: Vec<RouteRelation> = Vec::new();
        for node in ic.nodes() {
            let Some(rank) = index.get(&node.id) else {
                continue;
            };
            if ref_names.insert(rank.relation.name.clone()) {
                touched.push(rank.relation.clone());
            }
            if best.map_or(true, |b| rank.key() < b.key()) {
                best = Some(rank);
            }
        }
        let key = best.map(|b| (b.route_ref.clone(), b.rank, b.relation.name.clone()));
        ic.refs.extend(touched);
        keyed.push((key, ic));
    }

    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    let unranked = keyed.iter().filter(|(k, _)| k.is_none()).count();
    info!("Ordered {} interchanges, {unranked} off any route", keyed.len());
    renumber_interchanges(keyed.into_iter().map(|(_, ic)| ic).collect())
}
