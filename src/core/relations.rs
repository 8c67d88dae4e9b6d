//! Relation maps: which named road a node or way belongs to
//!
//! Every map is first-writer-wins. Builders walk their inputs in element
//! order so the winner is deterministic.

use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::core::geometry::haversine_km;
use crate::core::model::{NodeId, Ramp, RelationKind, Relation, RoadType, WayId};
use crate::core::osm::{
    is_motorway_junction, ElementSet, MemberKind, RawElement, RawNode, RawRelation, RawWay,
};

pub type NodeRelationMap = HashMap<NodeId, Relation>;
pub type WayRelationMap = HashMap<WayId, Relation>;

fn is_route(relation: &RawRelation) -> bool {
    relation.tag("type") == Some("route")
}

fn is_route_master(relation: &RawRelation) -> bool {
    relation.tag("type") == Some("route_master")
}

/// Map every node of every member way of the selected relations
fn relations_to_node_map<'a>(
    set: &ElementSet,
    relations: impl Iterator<Item = (&'a RawRelation, String)>,
    road_type: RoadType,
) -> NodeRelationMap {
    let ways = set.way_index();
    let mut map = NodeRelationMap::new();
    for (relation, name) in relations {
        let label = Relation::new(relation.id, name, road_type, RelationKind::Relation);
        for way_id in relation.member_refs(MemberKind::Way) {
            let Some(way) = ways.get(&way_id) else {
                continue;
            };
            for node_id in &way.nodes {
                map.entry(*node_id).or_insert_with(|| label.clone());
            }
        }
    }
    map
}

/// Node map over route relations, labelled with their master's name when they have one
pub fn build_exit_relation(set: &ElementSet, road_type: RoadType) -> NodeRelationMap {
    let mut master_name: HashMap<i64, String> = HashMap::new();
    for master in set.relations().filter(|r| is_route_master(r)) {
        let Some(name) = master.tag("name").or_else(|| master.tag("ref")) else {
            continue;
        };
        for child in master.member_refs(MemberKind::Relation) {
            master_name.entry(child).or_insert_with(|| name.to_string());
        }
    }

    let routes = set.relations().filter(|r| is_route(r)).filter_map(|r| {
        let name = master_name
            .get(&r.id)
            .cloned()
            .or_else(|| r.tag("name").map(str::to_string))?;
        Some((r, name))
    });
    let map = relations_to_node_map(set, routes, road_type);
    debug!("{} nodes on {road_type:?} routes", map.len());
    map
}

/// Node map over named `route=road` relations around link nodes
pub fn wrap_adjacent_road_relations(set: &ElementSet) -> NodeRelationMap {
    let roads = set
        .relations()
        .filter(|r| r.tag("route") == Some("road"))
        .filter_map(|r| Some((r, r.tag("name")?.to_string())));
    relations_to_node_map(set, roads, RoadType::Normal)
}

/// Way map over ways carrying a `name` tag
pub fn wrap_ways_as_relation<'a>(
    ways: impl IntoIterator<Item = &'a RawWay>,
    road_type: RoadType,
) -> WayRelationMap {
    let mut map = WayRelationMap::new();
    for way in ways {
        let Some(name) = way.tags.get("name").filter(|n| !n.is_empty()) else {
            continue;
        };
        map.entry(way.id)
            .or_insert_with(|| Relation::new(way.id, name.as_str(), road_type, RelationKind::Way));
    }
    map
}

/// Signposted targets of a way: `exit_to` and `destination` values, else `ref`
pub fn extract_to_destination(way: &RawWay) -> Vec<String> {
    let mut destinations: Vec<String> = Vec::new();
    for key in ["exit_to", "destination"] {
        if let Some(value) = way.tags.get(key) {
            destinations.extend(value.split(';').map(str::trim).filter(|s| !s.is_empty()).map(String::from));
        }
    }
    if destinations.is_empty() {
        if let Some(r) = way.tags.get("ref").filter(|r| !r.trim().is_empty()) {
            destinations.push(r.trim().to_string());
        }
    }
    destinations
}

/// Way map over signposted destination tags, joined with `;`
pub fn wrap_way_destinations<'a>(ways: impl IntoIterator<Item = &'a RawWay>) -> WayRelationMap {
    let mut map = WayRelationMap::new();
    for way in ways {
        let tokens = extract_to_destination(way);
        if tokens.is_empty() {
            continue;
        }
        map.entry(way.id).or_insert_with(|| {
            Relation::new(way.id, tokens.join(";"), RoadType::Destination, RelationKind::Way)
        });
    }
    map
}

/// Named weigh station reduced to one reference point
#[derive(Debug, Clone, PartialEq)]
pub struct WeighStation {
    pub id: i64,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub kind: RelationKind,
}

/// Named weigh stations with a usable position
///
/// Ways use their first geometry point, nodes their own position.
pub fn filter_weigh_stations(set: &ElementSet) -> Vec<WeighStation> {
    let mut stations = Vec::new();
    for element in &set.elements {
        match element {
            RawElement::Way(way) => {
                let (Some(name), Some(first)) = (way.tags.get("name"), way.geometry.first()) else {
                    continue;
                };
                stations.push(WeighStation {
                    id: way.id,
                    name: name.clone(),
                    lat: first.lat,
                    lng: first.lon,
                    kind: RelationKind::Way,
                });
            }
            RawElement::Node(node) => {
                let Some(name) = node.tags.get("name") else {
                    continue;
                };
                stations.push(WeighStation {
                    id: node.id,
                    name: name.clone(),
                    lat: node.lat,
                    lng: node.lon,
                    kind: RelationKind::Node,
                });
            }
            RawElement::Relation(_) => {}
        }
    }
    stations
}

/// Way map of link ways lying within `threshold_km` of a weigh station
///
/// Every `max(1, n / 10)`-th geometry point is sampled; the nearest station
/// over the samples wins.
pub fn build_weigh_way_relations<'a>(
    ways: impl IntoIterator<Item = &'a RawWay>,
    stations: &[WeighStation],
    threshold_km: f64,
) -> WayRelationMap {
    let mut map = WayRelationMap::new();
    if stations.is_empty() {
        return map;
    }

    for way in ways {
        if way.geometry.is_empty() {
            continue;
        }
        let step = (way.geometry.len() / 10).max(1);
        let mut closest: Option<(&WeighStation, f64)> = None;
        for station in stations {
            let d = way
                .geometry
                .iter()
                .step_by(step)
                .map(|p| haversine_km(p.lat, p.lon, station.lat, station.lng))
                .fold(f64::INFINITY, f64::min);
            if closest.map_or(true, |(_, best)| d < best) {
                closest = Some((station, d));
            }
        }
        if let Some((station, d)) = closest {
            if d <= threshold_km {
                map.entry(way.id).or_insert_with(|| {
                    Relation::new(station.id, station.name.as_str(), RoadType::Weigh, station.kind)
                });
            }
        }
    }
    debug!("{} link ways next to a weigh station", map.len());
    map
}

/// Node map of named motorway junctions, minus ignored nodes
pub fn wrap_junction_name_relation<'a>(
    nodes: impl IntoIterator<Item = &'a RawNode>,
    ignored: &HashSet<NodeId>,
) -> NodeRelationMap {
    let mut map = NodeRelationMap::new();
    for node in nodes {
        if !is_motorway_junction(node) || ignored.contains(&node.id) {
            continue;
        }
        if let Some(name) = node.tags.get("name") {
            map.entry(node.id).or_insert_with(|| {
                Relation::new(node.id, name.as_str(), RoadType::Junction, RelationKind::Node)
            });
        }
    }
    map
}

/// Junction names supplied by configuration
pub fn add_manual_junction_names(overrides: &BTreeMap<NodeId, String>) -> NodeRelationMap {
    overrides
        .iter()
        .map(|(&id, name)| {
            (
                id,
                Relation::new(id, name.as_str(), RoadType::Junction, RelationKind::Node),
            )
        })
        .collect()
}

/// Node map of `wikidata` ids on junction nodes; the id is the relation name
pub fn extract_wikidata_ids_from_nodes<'a>(
    nodes: impl IntoIterator<Item = &'a RawNode>,
    ignored: &HashSet<NodeId>,
) -> NodeRelationMap {
    let mut map = NodeRelationMap::new();
    for node in nodes {
        if !is_motorway_junction(node) || ignored.contains(&node.id) {
            continue;
        }
        if let Some(qid) = node.tags.get("wikidata").filter(|q| !q.is_empty()) {
            map.entry(node.id).or_insert_with(|| {
                Relation::new(node.id, qid.as_str(), RoadType::Wikidata, RelationKind::Node)
            });
        }
    }
    map
}

fn push_unique<'a>(found: &mut Vec<&'a Relation>, relation: &'a Relation) {
    if !found.iter().any(|r| r.id == relation.id && r.name == relation.name) {
        found.push(relation);
    }
}

/// Relation of the ramp's end node
pub fn relations_by_end_node<'a>(ramp: &Ramp, map: &'a NodeRelationMap) -> Vec<&'a Relation> {
    map.get(&ramp.end_node().id).into_iter().collect()
}

/// Relation of the ramp's start node
pub fn relations_by_start_node<'a>(ramp: &Ramp, map: &'a NodeRelationMap) -> Vec<&'a Relation> {
    map.get(&ramp.start_node().id).into_iter().collect()
}

/// Relations of any node on the ramp, deduplicated in first-seen order
pub fn relations_by_nodes<'a>(ramp: &Ramp, map: &'a NodeRelationMap) -> Vec<&'a Relation> {
    let mut found = Vec::new();
    for node in ramp.nodes() {
        if let Some(relation) = map.get(&node.id) {
            push_unique(&mut found, relation);
        }
    }
    found
}

/// Relations of the ramp's ways, deduplicated in first-seen order
pub fn relations_by_ways<'a>(ramp: &Ramp, map: &'a WayRelationMap) -> Vec<&'a Relation> {
    let mut found = Vec::new();
    for way_id in ramp.way_ids() {
        if let Some(relation) = map.get(&way_id) {
            push_unique(&mut found, relation);
        }
    }
    found
}
