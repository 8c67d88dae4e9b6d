//! Attaching external records and wikidata ids to interchanges

use log::{debug, info};
use std::collections::{BTreeMap, HashMap};

use interchange_common::names::{name_match_keys, split_name_components, suggest_name};

use crate::core::model::{ExternalRecord, Interchange};
use crate::core::relations::{relations_by_nodes, NodeRelationMap};

/// Interchange name → records known under that name
pub type ExternalNameMap = HashMap<String, Vec<ExternalRecord>>;

/// Index records by the interchange name they should match
///
/// A mapped display name goes in under its target only. Anything else goes
/// in under its trimmed name and the `交流道`-suffixed form.
pub fn build_external_name_map(
    records: &[ExternalRecord],
    mapping: &BTreeMap<String, String>,
) -> ExternalNameMap {
    let mut map = ExternalNameMap::new();
    for record in records {
        let keys = match mapping.get(record.display_name.trim()) {
            Some(target) => vec![target.clone()],
            None => name_match_keys(&record.display_name),
        };
        for key in keys {
            map.entry(key).or_default().push(record.clone());
        }
    }
    map
}

/// Records matching any `;`-component of each interchange name
pub fn map_external_records(interchanges: Vec<Interchange>, name_map: &ExternalNameMap) -> Vec<Interchange> {
    let mut matched = 0usize;
    let result: Vec<Interchange> = interchanges
        .into_iter()
        .map(|mut ic| {
            let mut records: Vec<ExternalRecord> = Vec::new();
            for component in split_name_components(&ic.name) {
                match name_map.get(component) {
                    Some(found) => {
                        for record in found {
                            if !records.contains(record) {
                                records.push(record.clone());
                            }
                        }
                    }
                    None => {
                        let suggestion = suggest_name(component, name_map.keys().map(String::as_str));
                        debug!("No external record for '{component}' (closest: {suggestion:?})");
                    }
                }
            }
            if !records.is_empty() {
                matched += 1;
            }
            ic.external_records = records;
            ic
        })
        .collect();
    info!("External records matched {matched}/{} interchanges", result.len());
    result
}

/// Wikidata ids over all ramp nodes, sorted and deduplicated
pub fn map_wikidata_ids(interchanges: Vec<Interchange>, wikidata: &NodeRelationMap) -> Vec<Interchange> {
    interchanges
        .into_iter()
        .map(|mut ic| {
            let mut ids: Vec<String> = ic
                .ramps
                .iter()
                .flat_map(|r| relations_by_nodes(r, wikidata))
                .map(|rel| rel.name.clone())
                .collect();
            ids.sort();
            ids.dedup();
            ic.wikidata_ids = ids;
            ic
        })
        .collect()
}
