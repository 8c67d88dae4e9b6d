//! End-to-end catalog build
//!
//! Link ways become segments, segments become ramps, ramps become
//! interchanges. Naming and the curated corrections run in a fixed order
//! because later passes depend on names produced by earlier ones.

use log::{debug, info, warn};
use std::collections::HashSet;

use interchange_common::Result;

use crate::core::annotate::{annotate_interchange_ramps, DestinationSources};
use crate::core::clustering::group_ramps_to_interchanges;
use crate::core::config::PipelineConfig;
use crate::core::dag::{assign_branch_ids, build_dag_edges};
use crate::core::external::{build_external_name_map, map_external_records, map_wikidata_ids};
use crate::core::freeway::{
    extract_branch_ways, extract_endpoint_ways, extract_route_ways, filter_endpoints_by_motorway_link,
    has_two_direction_masters, wrap_elevated_relation_as_route_master,
};
use crate::core::lifecycle::{
    delete_interchanges_containing_ways, isolate_interchanges_by_branch, merge_interchanges_by_name,
    override_interchange_names_by_way, split_interchanges_by_name_marker,
};
use crate::core::linearize::{build_master_order_index, merge_master_indices, reorder_interchanges, MasterIndex};
use crate::core::model::{Interchange, PathSegment, RoadType};
use crate::core::naming::annotate_interchange_names;
use crate::core::osm::{is_motorway_link, ElementSet, InputBundle, RawWay};
use crate::core::ramp_graph::{connect_ramps_by_nodes, contract_segments_to_ramps};
use crate::core::relations::{
    add_manual_junction_names, build_exit_relation, build_weigh_way_relations, extract_wikidata_ids_from_nodes,
    filter_weigh_stations, wrap_adjacent_road_relations, wrap_junction_name_relation, wrap_way_destinations,
    wrap_ways_as_relation,
};
use crate::core::segments::{
    break_segments_by_endpoints, break_segments_by_signals, concat_segments, filter_accessible_ways,
    segments_from_ways,
};

/// Pipeline stages, reported to progress callbacks as they start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Segments,
    Ramps,
    Clustering,
    Lifecycle,
    Destinations,
    Ordering,
    ExternalData,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Segments => "Preparing segments",
            Stage::Ramps => "Building ramp graph",
            Stage::Clustering => "Clustering interchanges",
            Stage::Lifecycle => "Naming and correcting interchanges",
            Stage::Destinations => "Annotating destinations",
            Stage::Ordering => "Ordering along routes",
            Stage::ExternalData => "Attaching external records",
        }
    }
}

/// Build the interchange catalog from one input bundle
pub fn run_pipeline(bundle: &InputBundle, config: &PipelineConfig) -> Result<Vec<Interchange>> {
    run_pipeline_with_progress(bundle, config, |_| {})
}

/// Same as [`run_pipeline`], calling `on_stage` as each stage starts
pub fn run_pipeline_with_progress<F>(
    bundle: &InputBundle,
    config: &PipelineConfig,
    mut on_stage: F,
) -> Result<Vec<Interchange>>
where
    F: FnMut(Stage),
{
    config.validate()?;
    let links = &bundle.motorway_links;
    let link_ways: Vec<&RawWay> =
        filter_accessible_ways(links.ways().filter(|w| is_motorway_link(w)), &config.excluded_ways());

    on_stage(Stage::Segments);
    let segments = prepare_segments(bundle, config, &link_ways)?;

    on_stage(Stage::Ramps);
    let ramps = contract_segments_to_ramps(&segments)?;
    let ramps = connect_ramps_by_nodes(ramps);
    let ramps = build_dag_edges(ramps);
    let ramps = assign_branch_ids(ramps);
    info!("Grouped into {} ramps", ramps.len());

    on_stage(Stage::Clustering);
    let interchanges = group_ramps_to_interchanges(ramps, config.cluster_threshold_deg)?;
    info!("Identified {} interchanges", interchanges.len());

    on_stage(Stage::Lifecycle);
    let ignored = config.ignored_junction_nodes();
    let stations = filter_weigh_stations(&bundle.weigh_stations);
    debug!("{} weigh stations", stations.len());
    let weigh_ways = build_weigh_way_relations(link_ways.iter().copied(), &stations, config.weigh_station_threshold_km);
    let mut junctions = wrap_junction_name_relation(links.nodes(), &ignored);
    junctions.extend(add_manual_junction_names(&config.node_name_overrides));

    let interchanges = isolate_interchanges_by_branch(interchanges, &config.isolate_branch_ways())?;
    let interchanges = annotate_interchange_names(interchanges, &junctions, &weigh_ways);
    let interchanges = split_interchanges_by_name_marker(interchanges, config.split_threshold_deg)?;
    let interchanges = override_interchange_names_by_way(interchanges, &config.way_name_overrides);
    let interchanges = merge_interchanges_by_name(interchanges)?;
    info!("After merge: {} interchanges", interchanges.len());
    let interchanges = annotate_interchange_names(interchanges, &junctions, &weigh_ways);
    let interchanges = merge_interchanges_by_name(interchanges)?;
    let interchanges = delete_interchanges_containing_ways(interchanges, &config.delete_interchange_ways());
    info!("Final: {} interchanges", interchanges.len());

    on_stage(Stage::Destinations);
    let freeway_nodes = build_exit_relation(&bundle.freeway_routes, RoadType::Freeway);
    let provincial_nodes = build_exit_relation(&bundle.provincial_routes, RoadType::Provincial);
    let adjacent_nodes = wrap_adjacent_road_relations(&bundle.adjacent_roads);
    let mut generic_ways = wrap_way_destinations(link_ways.iter().copied());
    for (way_id, relation) in wrap_ways_as_relation(link_ways.iter().copied(), RoadType::Way) {
        generic_ways.entry(way_id).or_insert(relation);
    }
    debug!(
        "Destination sources: {} freeway, {} provincial, {} adjacent nodes; {} weigh, {} named ways",
        freeway_nodes.len(),
        provincial_nodes.len(),
        adjacent_nodes.len(),
        weigh_ways.len(),
        generic_ways.len()
    );
    let sources = DestinationSources {
        weigh_ways: &weigh_ways,
        freeway_nodes: &freeway_nodes,
        provincial_nodes: &provincial_nodes,
        adjacent_nodes: &adjacent_nodes,
        junction_nodes: &junctions,
        generic_ways: &generic_ways,
    };
    let cascade = sources.cascade();
    let interchanges = interchanges
        .into_iter()
        .map(|ic| annotate_interchange_ramps(ic, &cascade))
        .collect::<Result<Vec<_>>>()?;
    info!("Annotated {} interchanges", interchanges.len());

    on_stage(Stage::Ordering);
    let index = route_index(bundle)?;
    let interchanges = reorder_interchanges(interchanges, &index);

    on_stage(Stage::ExternalData);
    let interchanges = if bundle.external_records.is_empty() {
        interchanges
    } else {
        let name_map = build_external_name_map(&bundle.external_records, &config.external_name_mapping);
        map_external_records(interchanges, &name_map)
    };
    let wikidata = extract_wikidata_ids_from_nodes(links.nodes(), &ignored);
    debug!("{} wikidata ids on junction nodes", wikidata.len());
    Ok(map_wikidata_ids(interchanges, &wikidata))
}

/// Link segments plus the freeway and elevated pieces they attach to,
/// broken at shared endpoints and traffic controls
fn prepare_segments(bundle: &InputBundle, config: &PipelineConfig, link_ways: &[&RawWay]) -> Result<Vec<PathSegment>> {
    let links = segments_from_ways(link_ways.iter().copied(), true)?;
    info!("{} link segments from {} ways", links.len(), link_ways.len());

    let elevated = elevated_segments(&bundle.elevated_routes)?;

    let freeway_ways = extract_route_ways(&bundle.freeway_routes);
    let freeway = segments_from_ways(&freeway_ways, false)?;
    let endpoints = filter_endpoints_by_motorway_link(extract_endpoint_ways(&freeway), &links);
    info!("Added {} freeway endpoint ways", endpoints.len());

    let mut segments = concat_segments(links, &endpoints);
    if !elevated.is_empty() {
        segments = concat_segments(segments, &elevated);
        info!("Added {} elevated ways", elevated.len());
    }
    let preserved_ids: HashSet<_> = config.preserved_endpoint_way_ids.iter().copied().collect();
    let preserved: Vec<PathSegment> = freeway
        .into_iter()
        .filter(|s| preserved_ids.contains(&s.way_id))
        .collect();
    segments = concat_segments(segments, &preserved);
    info!("{} segments after adding endpoints", segments.len());

    let segments = break_segments_by_endpoints(&segments);
    let segments = break_segments_by_signals(&segments, &bundle.motorway_links.node_index());
    debug!("{} segments after breaking", segments.len());
    Ok(segments)
}

/// Branch and endpoint ways of the elevated road
fn elevated_segments(set: &ElementSet) -> Result<Vec<PathSegment>> {
    if set.is_empty() {
        return Ok(Vec::new());
    }
    let ways = extract_route_ways(set);
    let segments = segments_from_ways(&ways, false)?;
    let branches = extract_branch_ways(&segments)?;
    let endpoints = extract_endpoint_ways(&segments);
    Ok(concat_segments(branches, &endpoints))
}

/// Freeway master ranks overlaid on the elevated road's
fn route_index(bundle: &InputBundle) -> Result<MasterIndex> {
    let freeway = build_master_order_index(&bundle.freeway_routes)?;
    if bundle.elevated_routes.is_empty() {
        return Ok(freeway);
    }
    let wrapped = wrap_elevated_relation_as_route_master(&bundle.elevated_routes);
    if !has_two_direction_masters(&wrapped) {
        warn!("Elevated road has no two-direction master, ordering by freeway routes only");
        return Ok(freeway);
    }
    let elevated = build_master_order_index(&wrapped)?;
    Ok(merge_master_indices(elevated, freeway))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::osm::{Coordinate, RawElement, RawNode, Tags};

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn node(id: i64, lng: f64, extra: &[(&str, &str)]) -> RawElement {
        RawElement::Node(RawNode {
            id,
            lat: 25.0,
            lon: lng,
            tags: tags(extra),
        })
    }

    fn link(id: i64, nodes: &[(i64, f64)], extra: &[(&str, &str)]) -> RawElement {
        let mut t = tags(&[("highway", "motorway_link")]);
        t.extend(tags(extra));
        RawElement::Way(RawWay {
            id,
            tags: t,
            nodes: nodes.iter().map(|(n, _)| *n).collect(),
            geometry: nodes.iter().map(|&(_, lon)| Coordinate { lat: 25.0, lon }).collect(),
        })
    }

    fn bundle() -> InputBundle {
        InputBundle {
            motorway_links: ElementSet {
                elements: vec![
                    node(1, 121.0, &[]),
                    node(2, 121.0005, &[]),
                    node(3, 121.001, &[("highway", "motorway_junction"), ("name", "五股交流道"), ("wikidata", "Q1")]),
                    node(11, 121.5, &[]),
                    node(12, 121.5005, &[("highway", "motorway_junction"), ("name", "林口交流道")]),
                    link(100, &[(1, 121.0), (2, 121.0005)], &[("destination", "五股")]),
                    link(101, &[(2, 121.0005), (3, 121.001)], &[]),
                    link(200, &[(11, 121.5), (12, 121.5005)], &[("access", "private")]),
                    link(201, &[(11, 121.5), (12, 121.5005)], &[("name", "林口匝道")]),
                ],
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_pipeline_on_two_interchanges() {
        let mut stages = Vec::new();
        let out = run_pipeline_with_progress(&bundle(), &PipelineConfig::default(), |s| stages.push(s)).unwrap();

        assert_eq!(stages.first(), Some(&Stage::Segments));
        assert_eq!(stages.last(), Some(&Stage::ExternalData));
        assert_eq!(out.len(), 2);
        assert_eq!(out.iter().map(|ic| ic.id).collect::<Vec<_>>(), vec![1, 2]);

        let wugu = out.iter().find(|ic| ic.name == "五股交流道").unwrap();
        assert_eq!(wugu.ramps.len(), 1);
        assert_eq!(wugu.wikidata_ids, vec!["Q1".to_string()]);
        assert_eq!(wugu.ramps[0].destinations[0].name, "五股");

        let linkou = out.iter().find(|ic| ic.name == "林口交流道").unwrap();
        assert!(!linkou.contains_way(200));
        assert_eq!(linkou.ramps[0].destinations[0].name, "林口匝道");
    }

    #[test]
    fn test_delete_and_override_from_config() {
        let config = PipelineConfig {
            delete_interchange_way_ids: vec![201],
            way_name_overrides: vec![(101, "新五股交流道".to_string())],
            ..Default::default()
        };
        let out = run_pipeline(&bundle(), &config).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 1);
        // renaming runs again after the override and the junction name wins
        assert_eq!(out[0].name, "五股交流道");
    }

    #[test]
    fn test_invalid_config_aborts() {
        let config = PipelineConfig {
            cluster_threshold_deg: 0.0,
            ..Default::default()
        };
        assert!(run_pipeline(&bundle(), &config).is_err());
    }
}
