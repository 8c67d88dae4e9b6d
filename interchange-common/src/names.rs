//! Name utilities shared by naming, lifecycle and external matching
//!
//! Interchange names are plain display strings. A name holding several
//! facilities joins them with `;`, which is also the marker the lifecycle
//! pass uses to decide whether an interchange should be re-split.

use strsim::{jaro_winkler, normalized_levenshtein};

/// Placeholder name of an interchange no naming source has resolved yet
pub const UNRESOLVED_NAME: &str = "Unknown Interchange";

/// Separator between facility names inside one interchange name
pub const NAME_SEPARATOR: char = ';';

/// Suffix Taiwanese sources use for interchanges, present or not depending on source
pub const INTERCHANGE_SUFFIX: &str = "交流道";

const WEIGH_STATION_SUFFIX: &str = "地磅站";

/// Whether a name lists more than one facility
pub fn is_compound_name(name: &str) -> bool {
    name.contains(NAME_SEPARATOR)
}

/// Split a (possibly compound) name into trimmed, non-empty components
pub fn split_name_components(name: &str) -> Vec<&str> {
    name.split(NAME_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Join names sorted and deduplicated into one compound name
pub fn join_names<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut all: Vec<String> = names
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    all.sort();
    all.dedup();
    all.join(&NAME_SEPARATOR.to_string())
}

/// Lookup keys for an external display name: the trimmed name, plus the
/// `交流道`-suffixed form when the source omitted it
pub fn name_match_keys(display_name: &str) -> Vec<String> {
    let clean = display_name.trim();
    let mut keys = vec![clean.to_string()];
    if !clean.ends_with(INTERCHANGE_SUFFIX) {
        keys.push(format!("{clean}{INTERCHANGE_SUFFIX}"));
    }
    keys
}

/// Drop the direction from a weigh-station name
///
/// `頭城南向地磅站` becomes `頭城地磅站`; names without a direction come back unchanged.
pub fn normalize_weigh_station_name(station_name: &str) -> String {
    let Some(stem) = station_name.strip_suffix(WEIGH_STATION_SUFFIX) else {
        return station_name.to_string();
    };
    let Some(stem) = stem.strip_suffix('向') else {
        return station_name.to_string();
    };
    for direction in ['東', '西', '南', '北'] {
        if let Some(place) = stem.strip_suffix(direction) {
            if !place.is_empty() {
                return format!("{place}{WEIGH_STATION_SUFFIX}");
            }
        }
    }
    station_name.to_string()
}

/// Closest candidate to an unmatched name, used for match diagnostics
///
/// Scores 70% Jaro-Winkler plus 30% normalized Levenshtein, ignoring the
/// interchange suffix on both sides. Returns `None` below 0.65.
pub fn suggest_name<'a>(name: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let min_threshold = 0.65;
    let input = name.trim().trim_end_matches(INTERCHANGE_SUFFIX);
    if input.is_empty() {
        return None;
    }

    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let stem = candidate.trim().trim_end_matches(INTERCHANGE_SUFFIX);
        if stem.is_empty() {
            continue;
        }
        let score = jaro_winkler(input, stem) * 0.7 + normalized_levenshtein(input, stem) * 0.3;
        if score >= min_threshold && best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }
    best.map(|(c, _)| c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name_components() {
        assert_eq!(
            split_name_components("五股交流道; 泰山轉接道"),
            vec!["五股交流道", "泰山轉接道"]
        );
        assert_eq!(split_name_components("樹林交流道"), vec!["樹林交流道"]);
        assert!(split_name_components(" ; ").is_empty());
    }

    #[test]
    fn test_join_names_sorted_dedup() {
        let joined = join_names(["b", "a", "b", " "]);
        assert_eq!(joined, "a;b");
        assert!(is_compound_name(&joined));
        assert!(!is_compound_name("a"));
    }

    #[test]
    fn test_name_match_keys() {
        assert_eq!(name_match_keys(" 樹林 "), vec!["樹林", "樹林交流道"]);
        assert_eq!(name_match_keys("樹林交流道"), vec!["樹林交流道"]);
    }

    #[test]
    fn test_normalize_weigh_station_name() {
        assert_eq!(normalize_weigh_station_name("頭城南向地磅站"), "頭城地磅站");
        assert_eq!(normalize_weigh_station_name("岡山北向地磅站"), "岡山地磅站");
        assert_eq!(normalize_weigh_station_name("頭城地磅站"), "頭城地磅站");
        assert_eq!(normalize_weigh_station_name("南向地磅站"), "南向地磅站");
        assert_eq!(normalize_weigh_station_name("樹林交流道"), "樹林交流道");
    }

    #[test]
    fn test_suggest_name() {
        let candidates = ["Shulin Interchange", "Sanchong Interchange", "Wugu"];
        assert_eq!(
            suggest_name("Shulin Interchang", candidates),
            Some("Shulin Interchange")
        );
        assert_eq!(suggest_name("zzzzzzzz", candidates), None);
        assert_eq!(suggest_name("", candidates), None);
    }
}
