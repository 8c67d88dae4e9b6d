//! Raw OSM element sets as handed over by the fetch layer
//!
//! The shape follows Overpass JSON (`out body` / `out geom`). Fetching and
//! caching happen outside this crate; what arrives here is already
//! deduplicated and geometry-resolved.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use interchange_common::{Error, Result};

use crate::core::model::{ExternalRecord, NodeId, WayId};

pub type Tags = HashMap<String, String>;

/// Coordinate as Overpass spells it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    #[serde(alias = "lng")]
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub id: NodeId,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWay {
    pub id: WayId,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub nodes: Vec<NodeId>,
    #[serde(default)]
    pub geometry: Vec<Coordinate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "type")]
    pub kind: MemberKind,
    #[serde(rename = "ref")]
    pub ref_id: i64,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRelation {
    pub id: i64,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub members: Vec<Member>,
}

impl RawRelation {
    /// Member ids of the given kind, in member order
    pub fn member_refs(&self, kind: MemberKind) -> impl Iterator<Item = i64> + '_ {
        self.members
            .iter()
            .filter(move |m| m.kind == kind)
            .map(|m| m.ref_id)
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RawElement {
    Node(RawNode),
    Way(RawWay),
    Relation(RawRelation),
}

/// One fetched element set (one Overpass response)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementSet {
    #[serde(default)]
    pub elements: Vec<RawElement>,
}

impl ElementSet {
    pub fn ways(&self) -> impl Iterator<Item = &RawWay> {
        self.elements.iter().filter_map(|e| match e {
            RawElement::Way(w) => Some(w),
            _ => None,
        })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &RawNode> {
        self.elements.iter().filter_map(|e| match e {
            RawElement::Node(n) => Some(n),
            _ => None,
        })
    }

    pub fn relations(&self) -> impl Iterator<Item = &RawRelation> {
        self.elements.iter().filter_map(|e| match e {
            RawElement::Relation(r) => Some(r),
            _ => None,
        })
    }

    pub fn node_index(&self) -> HashMap<NodeId, &RawNode> {
        self.nodes().map(|n| (n.id, n)).collect()
    }

    pub fn way_index(&self) -> HashMap<WayId, &RawWay> {
        self.ways().map(|w| (w.id, w)).collect()
    }

    pub fn relation_index(&self) -> HashMap<i64, &RawRelation> {
        self.relations().map(|r| (r.id, r)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Everything the core consumes for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputBundle {
    /// `highway=motorway_link` ways with geometry, plus junction nodes
    pub motorway_links: ElementSet,
    /// Freeway route relations and route masters (`network=TW:freeway`)
    #[serde(default)]
    pub freeway_routes: ElementSet,
    #[serde(default)]
    pub provincial_routes: ElementSet,
    /// Elevated freeway route relation(s) and their ways
    #[serde(default)]
    pub elevated_routes: ElementSet,
    /// Weigh-station buildings with geometry
    #[serde(default)]
    pub weigh_stations: ElementSet,
    /// Named `route=road` relations around link nodes, with their ways
    #[serde(default)]
    pub adjacent_roads: ElementSet,
    #[serde(default)]
    pub external_records: Vec<ExternalRecord>,
}

impl InputBundle {
    /// Read a bundle from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let bundle: InputBundle = serde_json::from_reader(BufReader::new(file))?;
        if bundle.motorway_links.is_empty() {
            return Err(Error::MalformedInput(format!(
                "{}: no motorway link elements",
                path.display()
            )));
        }
        Ok(bundle)
    }
}

/// Traffic signal or stop control point
pub fn is_traffic_control(node: &RawNode) -> bool {
    let tags = &node.tags;
    matches!(tags.get("highway").map(String::as_str), Some("traffic_signals") | Some("stop"))
        || tags.contains_key("traffic_signals")
        || tags.contains_key("stop")
}

/// Ways not closed to general traffic
pub fn is_accessible(way: &RawWay) -> bool {
    !matches!(
        way.tags.get("access").map(String::as_str),
        Some("private") | Some("no") | Some("emergency") | Some("permissive")
    )
}

pub fn is_motorway_link(way: &RawWay) -> bool {
    way.tags.get("highway").map(String::as_str) == Some("motorway_link")
}

/// Links explicitly drivable both ways
pub fn is_two_way(way: &RawWay) -> bool {
    way.tags.get("oneway").map(String::as_str) == Some("no")
}

pub fn is_motorway_junction(node: &RawNode) -> bool {
    node.tags.get("highway").map(String::as_str) == Some("motorway_junction")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_overpass_elements() {
        let json = r#"{
            "elements": [
                {"type": "node", "id": 1, "lat": 25.0, "lon": 121.0,
                 "tags": {"highway": "traffic_signals"}},
                {"type": "way", "id": 10, "nodes": [1, 2],
                 "geometry": [{"lat": 25.0, "lon": 121.0}, {"lat": 25.1, "lon": 121.1}],
                 "tags": {"highway": "motorway_link", "oneway": "no"}},
                {"type": "relation", "id": 100,
                 "members": [{"type": "way", "ref": 10, "role": ""},
                             {"type": "relation", "ref": 101}],
                 "tags": {"type": "route_master", "ref": "1"}}
            ]
        }"#;
        let set: ElementSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.nodes().count(), 1);
        assert_eq!(set.ways().count(), 1);
        let rel = set.relations().next().unwrap();
        assert_eq!(rel.member_refs(MemberKind::Way).collect::<Vec<_>>(), vec![10]);
        assert_eq!(rel.member_refs(MemberKind::Relation).collect::<Vec<_>>(), vec![101]);
        assert_eq!(rel.tag("ref"), Some("1"));

        let node = set.nodes().next().unwrap();
        assert!(is_traffic_control(node));
        let way = set.ways().next().unwrap();
        assert!(is_motorway_link(way));
        assert!(is_two_way(way));
        assert!(is_accessible(way));
    }

    #[test]
    fn test_access_filter() {
        let mut way = RawWay {
            id: 1,
            tags: Tags::new(),
            nodes: vec![],
            geometry: vec![],
        };
        assert!(is_accessible(&way));
        way.tags.insert("access".to_string(), "private".to_string());
        assert!(!is_accessible(&way));
        way.tags.insert("access".to_string(), "yes".to_string());
        assert!(is_accessible(&way));
    }

    #[test]
    fn test_load_rejects_empty_links() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{"motorway_links": {"elements": []}}"#).unwrap();
        let err = InputBundle::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
    }
}
