//! Destination annotation
//!
//! Each ramp first takes the labels of the highest-priority source that
//! knows anything about it. Labels then flow upstream along `dag_to`,
//! downstream ramps first. When a ramp's successors disagree between
//! leaving the freeway and entering another road, the exit labels win.

use log::debug;
use std::collections::{HashMap, HashSet};

use interchange_common::Result;

use crate::core::dag::reverse_topological_order;
use crate::core::model::{Destination, DirectionType, Interchange, Ramp, Relation};
use crate::core::relations::{
    relations_by_end_node, relations_by_start_node, relations_by_ways, NodeRelationMap,
    WayRelationMap,
};

type Lookup<'a> = Box<dyn Fn(&Ramp) -> Vec<&'a Relation> + 'a>;

/// One naming source of the cascade
pub struct CascadeTier<'a> {
    pub source: &'static str,
    pub direction: DirectionType,
    lookup: Lookup<'a>,
}

impl<'a> CascadeTier<'a> {
    pub fn new(
        source: &'static str,
        direction: DirectionType,
        lookup: impl Fn(&Ramp) -> Vec<&'a Relation> + 'a,
    ) -> Self {
        Self {
            source,
            direction,
            lookup: Box::new(lookup),
        }
    }

    fn destinations(&self, ramp: &Ramp) -> Vec<Destination> {
        (self.lookup)(ramp)
            .into_iter()
            .map(|rel| Destination::from_relation(rel, self.direction))
            .collect()
    }
}

/// Relation maps feeding the destination cascade
pub struct DestinationSources<'a> {
    pub weigh_ways: &'a WayRelationMap,
    pub freeway_nodes: &'a NodeRelationMap,
    pub provincial_nodes: &'a NodeRelationMap,
    pub adjacent_nodes: &'a NodeRelationMap,
    pub junction_nodes: &'a NodeRelationMap,
    pub generic_ways: &'a WayRelationMap,
}

impl<'a> DestinationSources<'a> {
    /// Tiers in priority order
    pub fn cascade(&self) -> Vec<CascadeTier<'a>> {
        let weigh = self.weigh_ways;
        let freeway = self.freeway_nodes;
        let provincial = self.provincial_nodes;
        let adjacent = self.adjacent_nodes;
        let junction = self.junction_nodes;
        let generic = self.generic_ways;
        vec![
            CascadeTier::new("weigh-station", DirectionType::Exit, move |r| {
                relations_by_ways(r, weigh)
            }),
            CascadeTier::new("freeway", DirectionType::Enter, move |r| {
                relations_by_end_node(r, freeway)
            }),
            CascadeTier::new("provincial", DirectionType::Enter, move |r| {
                relations_by_end_node(r, provincial)
            }),
            CascadeTier::new("adjacent-road", DirectionType::Exit, move |r| {
                relations_by_end_node(r, adjacent)
            }),
            CascadeTier::new("junction", DirectionType::Generic, move |r| {
                relations_by_start_node(r, junction)
            }),
            CascadeTier::new("way", DirectionType::Generic, move |r| {
                relations_by_ways(r, generic)
            }),
        ]
    }
}

/// Merge `incoming` into `target`, skipping (name, direction) pairs already held
fn merge_unique(target: &mut Vec<Destination>, incoming: impl IntoIterator<Item = Destination>) {
    let mut seen: HashSet<(String, DirectionType)> = target
        .iter()
        .map(|d| (d.name.clone(), d.direction))
        .collect();
    for d in incoming {
        if seen.insert((d.name.clone(), d.direction)) {
            target.push(d);
        }
    }
}

/// Label one ramp from the first tier with a hit; no mixing across tiers
pub fn annotate_ramp(mut ramp: Ramp, cascade: &[CascadeTier<'_>]) -> Ramp {
    let mut destinations = Vec::new();
    for tier in cascade {
        let found = tier.destinations(&ramp);
        if !found.is_empty() {
            merge_unique(&mut destinations, found);
            break;
        }
    }
    ramp.destinations = destinations;
    ramp
}

/// Destinations collected from a ramp's successors, exits winning over enters
fn downstream_destinations(ramps: &[Ramp], successors: &[usize]) -> Vec<Destination> {
    let collected: Vec<Destination> = successors
        .iter()
        .flat_map(|&v| ramps[v].destinations.iter().cloned())
        .collect();
    let has_exit = collected.iter().any(|d| d.direction == DirectionType::Exit);
    let has_enter = collected.iter().any(|d| d.direction == DirectionType::Enter);
    if has_exit && has_enter {
        collected
            .into_iter()
            .filter(|d| d.direction != DirectionType::Enter)
            .collect()
    } else {
        collected
    }
}

/// Push destinations upstream in reverse topological order over `dag_to`
pub fn propagate_destinations(mut ramps: Vec<Ramp>) -> Result<Vec<Ramp>> {
    let order = reverse_topological_order(&ramps)?;
    let position: HashMap<_, _> =
        ramps.iter().enumerate().map(|(i, r)| (r.id, i)).collect();

    for u in order {
        let successors: Vec<usize> = ramps[u]
            .dag_to
            .iter()
            .filter_map(|id| position.get(id).copied())
            .collect();
        let collected = downstream_destinations(&ramps, &successors);
        if !collected.is_empty() {
            merge_unique(&mut ramps[u].destinations, collected);
        }
    }
    Ok(ramps)
}

/// Label and propagate every ramp of an interchange
pub fn annotate_interchange_ramps(
    mut interchange: Interchange,
    cascade: &[CascadeTier<'_>],
) -> Result<Interchange> {
    let ramps: Vec<Ramp> = std::mem::take(&mut interchange.ramps)
        .into_iter()
        .map(|r| annotate_ramp(r, cascade))
        .collect();
    interchange.ramps = propagate_destinations(ramps)?;

    let labelled = interchange.ramps.iter().filter(|r| !r.destinations.is_empty()).count();
    debug!(
        "'{}': {labelled}/{} ramps labelled",
        interchange.name,
        interchange.ramps.len()
    );
    Ok(interchange)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Node, PathSegment, RelationKind, RoadType};

    fn ramp(id: usize, way_id: i64, nodes: &[i64], dag_to: &[usize]) -> Ramp {
        let nodes = nodes.iter().map(|&n| Node::new(n, 25.0, 121.0)).collect();
        let mut r = Ramp::new(id, vec![PathSegment::new(way_id, 0, nodes)]);
        r.dag_to = dag_to.to_vec();
        r.to_ramps = dag_to.to_vec();
        r
    }

    fn dest(name: &str, direction: DirectionType) -> Destination {
        let rel = Relation::new(1, name, RoadType::Normal, RelationKind::Relation);
        Destination::from_relation(&rel, direction)
    }

    fn keys(ramp: &Ramp) -> Vec<(String, DirectionType)> {
        let mut k: Vec<_> = ramp.destinations.iter().map(|d| (d.name.clone(), d.direction)).collect();
        k.sort();
        k
    }

    #[test]
    fn test_exit_wins_over_enter() {
        let mut enter = ramp(1, 11, &[2, 3], &[]);
        enter.destinations = vec![dest("Taipei", DirectionType::Enter)];
        let mut exit = ramp(2, 12, &[2, 4], &[]);
        exit.destinations = vec![dest("205出口", DirectionType::Exit)];
        let upstream = ramp(0, 10, &[1, 2], &[1, 2]);

        let ramps = propagate_destinations(vec![upstream, enter, exit]).unwrap();
        assert_eq!(keys(&ramps[0]), vec![("205出口".to_string(), DirectionType::Exit)]);
        assert_eq!(ramps[1].destinations.len(), 1);
    }

    #[test]
    fn test_propagation_chains_and_is_idempotent() {
        let mut tail = ramp(2, 12, &[3, 4], &[]);
        tail.destinations = vec![dest("Taipei", DirectionType::Enter)];
        let mut middle = ramp(1, 11, &[2, 3], &[2]);
        middle.destinations = vec![dest("Local", DirectionType::Generic)];
        let head = ramp(0, 10, &[1, 2], &[1]);

        let once = propagate_destinations(vec![head, middle, tail]).unwrap();
        assert_eq!(keys(&once[0]).len(), 2);
        assert_eq!(keys(&once[1]).len(), 2);

        let twice = propagate_destinations(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_cascade_first_hit_wins() {
        let weigh = WayRelationMap::new();
        let freeway: NodeRelationMap = [(2, Relation::new(5, "國道1號", RoadType::Freeway, RelationKind::Relation))]
            .into_iter()
            .collect();
        let provincial: NodeRelationMap = [(2, Relation::new(6, "台1線", RoadType::Provincial, RelationKind::Relation))]
            .into_iter()
            .collect();
        let empty_nodes = NodeRelationMap::new();
        let generic: WayRelationMap = [(10, Relation::new(10, "匝道", RoadType::Way, RelationKind::Way))]
            .into_iter()
            .collect();
        let sources = DestinationSources {
            weigh_ways: &weigh,
            freeway_nodes: &freeway,
            provincial_nodes: &provincial,
            adjacent_nodes: &empty_nodes,
            junction_nodes: &empty_nodes,
            generic_ways: &generic,
        };
        let cascade = sources.cascade();
        assert_eq!(cascade[0].source, "weigh-station");

        let labelled = annotate_ramp(ramp(0, 10, &[1, 2], &[]), &cascade);
        assert_eq!(labelled.destinations.len(), 1);
        assert_eq!(labelled.destinations[0].name, "國道1號");
        assert_eq!(labelled.destinations[0].direction, DirectionType::Enter);

        let fallback = annotate_ramp(ramp(1, 10, &[7, 8], &[]), &cascade);
        assert_eq!(fallback.destinations[0].name, "匝道");
        assert_eq!(fallback.destinations[0].direction, DirectionType::Generic);

        let nothing = annotate_ramp(ramp(2, 99, &[7, 8], &[]), &cascade);
        assert!(nothing.destinations.is_empty());
    }
}
