//! Data model shared by every pipeline stage
//!
//! Segments are produced once and never change. Ramps live in an arena
//! addressed by [`RampId`]; connectivity, branch ids and destinations are
//! filled in by later stages. Interchanges own their ramps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// OSM node id
pub type NodeId = i64;

/// OSM way id
pub type WayId = i64;

/// Ramp index, unique within one contraction pass
pub type RampId = usize;

/// Weak component id over the DAG projection
pub type BranchId = usize;

/// Geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

/// A junction point shared by the segments that touch it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub lat: f64,
    pub lng: f64,
    pub id: NodeId,
}

impl Node {
    pub fn new(id: NodeId, lat: f64, lng: f64) -> Self {
        Self { lat, lng, id }
    }

    pub fn point(&self) -> Point {
        Point {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// Identity of a segment: the source way and the piece of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId {
    pub way_id: WayId,
    pub part: u32,
}

/// Ordered run of nodes cut from one way
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    #[serde(rename = "id")]
    pub way_id: WayId,
    pub part: u32,
    pub nodes: Vec<Node>,
    /// Hard break at the last node (traffic signal, stop); contraction never crosses it
    #[serde(default)]
    pub ended: bool,
}

impl PathSegment {
    pub fn new(way_id: WayId, part: u32, nodes: Vec<Node>) -> Self {
        Self {
            way_id,
            part,
            nodes,
            ended: false,
        }
    }

    pub fn segment_id(&self) -> SegmentId {
        SegmentId {
            way_id: self.way_id,
            part: self.part,
        }
    }

    /// First node. Segments always hold at least two nodes once built.
    pub fn start(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn end(&self) -> &Node {
        &self.nodes[self.nodes.len() - 1]
    }
}

/// Road classification of a naming source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadType {
    Freeway,
    Provincial,
    Elevated,
    Weigh,
    Normal,
    Destination,
    Way,
    Junction,
    Wikidata,
}

/// Which kind of OSM object a relation-like label came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationKind {
    Relation,
    Way,
    Node,
}

/// Named road (or road-like object) a ramp or interchange can refer to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Relation {
    pub id: i64,
    pub name: String,
    pub road_type: RoadType,
    pub relation_kind: RelationKind,
}

impl Relation {
    pub fn new(id: i64, name: impl Into<String>, road_type: RoadType, relation_kind: RelationKind) -> Self {
        Self {
            id,
            name: name.into(),
            road_type,
            relation_kind,
        }
    }
}

/// Route relation used for linearization (freeway, elevated road)
pub type RouteRelation = Relation;

/// Direction guarantee carried by a destination label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DirectionType {
    /// Leaves the freeway
    Exit,
    /// Leads onto another freeway or provincial road
    Enter,
    /// No directional guarantee
    Generic,
}

/// Signage label attached to a ramp
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Destination {
    pub source_id: i64,
    pub name: String,
    pub road_type: RoadType,
    pub relation_kind: RelationKind,
    pub direction: DirectionType,
}

impl Destination {
    pub fn from_relation(relation: &Relation, direction: DirectionType) -> Self {
        Self {
            source_id: relation.id,
            name: relation.name.clone(),
            road_type: relation.road_type,
            relation_kind: relation.relation_kind,
            direction,
        }
    }

    /// Deduplication key: a ramp never holds two destinations sharing it
    pub fn key(&self) -> (&str, DirectionType) {
        (&self.name, self.direction)
    }
}

/// One physical connector: a contiguous chain of segments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ramp {
    pub id: RampId,
    #[serde(default)]
    pub destinations: Vec<Destination>,
    /// Full graph, may contain cycles
    #[serde(default)]
    pub from_ramps: Vec<RampId>,
    #[serde(default)]
    pub to_ramps: Vec<RampId>,
    /// Cycle-free subset of `to_ramps`
    #[serde(default)]
    pub dag_to: Vec<RampId>,
    pub segments: Vec<PathSegment>,
    #[serde(default)]
    pub branch_id: Option<BranchId>,
}

impl Ramp {
    pub fn new(id: RampId, segments: Vec<PathSegment>) -> Self {
        Self {
            id,
            destinations: Vec::new(),
            from_ramps: Vec::new(),
            to_ramps: Vec::new(),
            dag_to: Vec::new(),
            segments,
            branch_id: None,
        }
    }

    /// All nodes of all segments, in order (shared endpoints repeat)
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.segments.iter().flat_map(|s| s.nodes.iter())
    }

    /// Start node of the first segment
    pub fn start_node(&self) -> &Node {
        self.segments[0].start()
    }

    /// End node of the last segment
    pub fn end_node(&self) -> &Node {
        self.segments[self.segments.len() - 1].end()
    }

    pub fn way_ids(&self) -> impl Iterator<Item = WayId> + '_ {
        self.segments.iter().map(|s| s.way_id)
    }

    pub fn contains_way(&self, way_id: WayId) -> bool {
        self.segments.iter().any(|s| s.way_id == way_id)
    }
}

/// Whether any segment of any ramp comes from `way_id`
pub fn ramps_contain_way(ramps: &[Ramp], way_id: WayId) -> bool {
    ramps.iter().any(|r| r.contains_way(way_id))
}

/// Axis-aligned bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

/// Interchange record from a non-OSM source (wiki, government tables)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRecord {
    /// Source label, e.g. `wiki` or `gov`
    pub source: String,
    pub display_name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Named junction complex made of one or more branches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interchange {
    pub id: u32,
    pub name: String,
    pub bounds: Bounds,
    pub ramps: Vec<Ramp>,
    /// Route memberships, deduplicated by name
    #[serde(default)]
    pub refs: Vec<RouteRelation>,
    #[serde(default)]
    pub external_records: Vec<ExternalRecord>,
    #[serde(default)]
    pub wikidata_ids: Vec<String>,
}

impl Interchange {
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.ramps.iter().flat_map(|r| r.nodes())
    }

    pub fn contains_way(&self, way_id: WayId) -> bool {
        ramps_contain_way(&self.ramps, way_id)
    }
}
