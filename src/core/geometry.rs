//! Geometry helpers: distances, bounds, modal votes

use std::collections::HashMap;
use std::hash::Hash;

use crate::core::model::{Bounds, Node};

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Compute haversine distance between two points in meters
pub fn haversine_distance(lat1_deg: f64, lon1_deg: f64, lat2_deg: f64, lon2_deg: f64) -> f64 {
    let lat1 = lat1_deg.to_radians();
    let lat2 = lat2_deg.to_radians();
    let delta_lat = (lat2_deg - lat1_deg).to_radians();
    let delta_lon = (lon2_deg - lon1_deg).to_radians();

    let a =
        (delta_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Haversine distance in kilometers
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    haversine_distance(lat1, lng1, lat2, lng2) / 1000.0
}

/// Min/max lat/lng over `nodes`, `None` when there are no nodes
pub fn calculate_bounds<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Option<Bounds> {
    let mut bounds: Option<Bounds> = None;
    for n in nodes {
        bounds = Some(match bounds {
            None => Bounds {
                min_lat: n.lat,
                max_lat: n.lat,
                min_lng: n.lng,
                max_lng: n.lng,
            },
            Some(b) => Bounds {
                min_lat: b.min_lat.min(n.lat),
                max_lat: b.max_lat.max(n.lat),
                min_lng: b.min_lng.min(n.lng),
                max_lng: b.max_lng.max(n.lng),
            },
        });
    }
    bounds
}

/// Modal value per group
///
/// Ties go to the value that occurs first in the group's list. Groups with
/// no values are skipped. Output keeps the group order of the input.
pub fn choose_modal_per_group<K, V>(groups: &[(K, Vec<V>)]) -> Vec<(K, V)>
where
    K: Copy,
    V: Copy + Eq + Hash,
{
    let mut result = Vec::with_capacity(groups.len());
    for (key, values) in groups {
        let mut counts: HashMap<V, usize> = HashMap::new();
        for v in values {
            *counts.entry(*v).or_insert(0) += 1;
        }
        let Some(max_count) = counts.values().copied().max() else {
            continue;
        };
        if let Some(modal) = values.iter().find(|v| counts[v] == max_count) {
            result.push((*key, *modal));
        }
    }
    result
}
