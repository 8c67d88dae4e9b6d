//! Interchange naming from junction nodes and nearby weigh stations

use interchange_common::names::{join_names, normalize_weigh_station_name};

use crate::core::model::Interchange;
use crate::core::relations::{relations_by_nodes, relations_by_ways, NodeRelationMap, WayRelationMap};

/// Name an interchange after the junctions and weigh stations its ramps touch
///
/// Names are sorted, deduplicated and joined with `;`. Without any source
/// the current name stays.
pub fn annotate_interchange_name(
    mut interchange: Interchange,
    junctions: &NodeRelationMap,
    weigh_ways: &WayRelationMap,
) -> Interchange {
    let mut names: Vec<String> = Vec::new();
    for ramp in &interchange.ramps {
        names.extend(relations_by_nodes(ramp, junctions).into_iter().map(|r| r.name.clone()));
    }
    for ramp in &interchange.ramps {
        names.extend(
            relations_by_ways(ramp, weigh_ways)
                .into_iter()
                .map(|r| normalize_weigh_station_name(&r.name)),
        );
    }

    let combined = join_names(&names);
    if !combined.is_empty() {
        interchange.name = combined;
    }
    interchange
}

/// Name every interchange in turn
pub fn annotate_interchange_names(
    interchanges: Vec<Interchange>,
    junctions: &NodeRelationMap,
    weigh_ways: &WayRelationMap,
) -> Vec<Interchange> {
    interchanges
        .into_iter()
        .map(|ic| annotate_interchange_name(ic, junctions, weigh_ways))
        .collect()
}
