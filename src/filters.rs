use crate::types::FirePerimeter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Fixed burned-area buckets offered by the dashboard sidebar.
///
/// Bounds are half-open `[lo, hi)` with the top bucket unbounded, so the six
/// named buckets partition the non-negative area domain without overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AreaBucket {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "under-100")]
    Under100,
    #[serde(rename = "100-500")]
    From100To500,
    #[serde(rename = "500-1000")]
    From500To1000,
    #[serde(rename = "1000-5000")]
    From1000To5000,
    #[serde(rename = "5000-10000")]
    From5000To10000,
    #[serde(rename = "over-10000")]
    Over10000,
}

impl AreaBucket {
    pub const ALL_BUCKETS: [AreaBucket; 7] = [
        AreaBucket::All,
        AreaBucket::Under100,
        AreaBucket::From100To500,
        AreaBucket::From500To1000,
        AreaBucket::From1000To5000,
        AreaBucket::From5000To10000,
        AreaBucket::Over10000,
    ];

    /// Bucket bounds in hectares.
    pub fn bounds(self) -> (f64, f64) {
        match self {
            AreaBucket::All => (0.0, f64::INFINITY),
            AreaBucket::Under100 => (0.0, 100.0),
            AreaBucket::From100To500 => (100.0, 500.0),
            AreaBucket::From500To1000 => (500.0, 1000.0),
            AreaBucket::From1000To5000 => (1000.0, 5000.0),
            AreaBucket::From5000To10000 => (5000.0, 10_000.0),
            AreaBucket::Over10000 => (10_000.0, f64::INFINITY),
        }
    }

    pub fn contains(self, area_ha: f64) -> bool {
        let (lo, hi) = self.bounds();
        area_ha >= lo && area_ha < hi
    }

    /// Display label matching the sidebar text.
    pub fn label(self) -> &'static str {
        match self {
            AreaBucket::All => "All",
            AreaBucket::Under100 => "< 100 ha",
            AreaBucket::From100To500 => "100 - 500 ha",
            AreaBucket::From500To1000 => "500 - 1000 ha",
            AreaBucket::From1000To5000 => "1000 - 5000 ha",
            AreaBucket::From5000To10000 => "5000 - 10000 ha",
            AreaBucket::Over10000 => "> 10000 ha",
        }
    }
}

/// User-selected filters. Every field is optional; an unset field never
/// filters, so the default criteria are the identity.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub bucket: AreaBucket,
    pub name_substring: Option<String>,
    pub causes: Vec<String>,
    pub year: Option<i32>,
}

/// Find the attribute that looks like a fire-cause column.
///
/// Source schemas disagree on naming (CAUSE, FIRE_CAUSE, cause_desc, ...),
/// so any attribute whose name contains "cause" is accepted.
pub fn detect_cause_attribute(records: &[FirePerimeter]) -> Option<String> {
    records
        .iter()
        .flat_map(|r| r.properties.keys())
        .find(|key| key.to_lowercase().contains("cause"))
        .cloned()
}

pub fn cause_of<'a>(record: &'a FirePerimeter, attribute: &str) -> Option<&'a str> {
    record.properties.get(attribute).and_then(Value::as_str)
}

/// Distinct cause values present in the collection, sorted for the multiselect.
pub fn distinct_causes(records: &[FirePerimeter], attribute: &str) -> Vec<String> {
    let mut values: Vec<String> = records
        .iter()
        .filter_map(|r| cause_of(r, attribute))
        .map(str::to_owned)
        .collect();
    values.sort();
    values.dedup();
    values
}

/// Apply all active filters as a conjunction, returning a new collection.
/// The input collection is never mutated.
pub fn apply(records: &[FirePerimeter], criteria: &FilterCriteria) -> Vec<FirePerimeter> {
    let cause_attribute = if criteria.causes.is_empty() {
        None
    } else {
        let attribute = detect_cause_attribute(records);
        if attribute.is_none() {
            warn!("cause filter requested but no cause attribute detected; skipping");
        }
        attribute
    };

    let needle = criteria
        .name_substring
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    records
        .iter()
        .filter(|rec| {
            if !criteria.bucket.contains(rec.area_ha) {
                return false;
            }
            if let Some(needle) = &needle {
                match &rec.fire_name {
                    Some(name) if name.to_lowercase().contains(needle) => {}
                    _ => return false,
                }
            }
            if let Some(attribute) = &cause_attribute {
                match cause_of(rec, attribute) {
                    Some(cause) if criteria.causes.iter().any(|c| c == cause) => {}
                    _ => return false,
                }
            }
            if let Some(year) = criteria.year {
                if rec.year != Some(year) {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};
    use serde_json::Map;

    fn record(area_ha: f64, name: Option<&str>, props: &[(&str, &str)]) -> FirePerimeter {
        let mut properties = Map::new();
        for (key, value) in props {
            properties.insert((*key).to_string(), Value::String((*value).to_string()));
        }
        FirePerimeter {
            geometry: MultiPolygon::new(vec![polygon![
                (x: -119.00, y: 37.00),
                (x: -118.99, y: 37.00),
                (x: -118.99, y: 37.01),
                (x: -119.00, y: 37.01),
            ]]),
            area_ha,
            year: Some(2016),
            fire_name: name.map(str::to_owned),
            properties,
        }
    }

    #[test]
    fn unset_criteria_are_the_identity() {
        let records = vec![
            record(50.0, Some("Lake Fire"), &[]),
            record(150.0, None, &[]),
            record(1200.0, Some("Canyon Fire"), &[]),
        ];
        let filtered = apply(&records, &FilterCriteria::default());
        assert_eq!(filtered.len(), records.len());
    }

    #[test]
    fn bucket_selects_only_matching_areas() {
        let records = vec![
            record(50.0, None, &[]),
            record(150.0, None, &[]),
            record(1200.0, None, &[]),
        ];
        let criteria = FilterCriteria {
            bucket: AreaBucket::From100To500,
            ..Default::default()
        };
        let filtered = apply(&records, &criteria);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].area_ha, 150.0);
    }

    #[test]
    fn named_buckets_partition_the_area_domain() {
        let samples = [
            0.0, 50.0, 99.9, 100.0, 499.9, 500.0, 999.9, 1000.0, 4999.9, 5000.0, 9999.9,
            10_000.0, 10_000.1, 1_000_000.0,
        ];
        for area in samples {
            let matches = AreaBucket::ALL_BUCKETS
                .iter()
                .filter(|b| **b != AreaBucket::All && b.contains(area))
                .count();
            assert_eq!(matches, 1, "area {} matched {} buckets", area, matches);
            assert!(AreaBucket::All.contains(area));
        }
    }

    #[test]
    fn name_filter_is_case_insensitive_substring() {
        let records = vec![
            record(10.0, Some("Lake Fire"), &[]),
            record(10.0, Some("Canyon Fire"), &[]),
        ];
        let criteria = FilterCriteria {
            name_substring: Some("lake".to_string()),
            ..Default::default()
        };
        let filtered = apply(&records, &criteria);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].fire_name.as_deref(), Some("Lake Fire"));
    }

    #[test]
    fn nameless_records_survive_only_when_name_filter_is_inactive() {
        let records = vec![record(10.0, None, &[])];
        assert_eq!(apply(&records, &FilterCriteria::default()).len(), 1);

        let criteria = FilterCriteria {
            name_substring: Some("lake".to_string()),
            ..Default::default()
        };
        assert!(apply(&records, &criteria).is_empty());
    }

    #[test]
    fn blank_name_filter_does_not_filter() {
        let records = vec![record(10.0, None, &[])];
        let criteria = FilterCriteria {
            name_substring: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(apply(&records, &criteria).len(), 1);
    }

    #[test]
    fn cause_attribute_is_detected_fuzzily() {
        let records = vec![record(10.0, None, &[("FIRE_CAUSE", "Lightning")])];
        assert_eq!(
            detect_cause_attribute(&records).as_deref(),
            Some("FIRE_CAUSE")
        );
    }

    #[test]
    fn cause_filter_keeps_only_selected_causes() {
        let records = vec![
            record(10.0, None, &[("cause", "Lightning")]),
            record(10.0, None, &[("cause", "Campfire")]),
            record(10.0, None, &[]),
        ];
        let criteria = FilterCriteria {
            causes: vec!["Lightning".to_string()],
            ..Default::default()
        };
        let filtered = apply(&records, &criteria);
        assert_eq!(filtered.len(), 1);
        assert_eq!(cause_of(&filtered[0], "cause"), Some("Lightning"));
    }

    #[test]
    fn cause_filter_degrades_to_noop_without_a_cause_attribute() {
        let records = vec![record(10.0, None, &[])];
        let criteria = FilterCriteria {
            causes: vec!["Lightning".to_string()],
            ..Default::default()
        };
        assert_eq!(apply(&records, &criteria).len(), 1);
    }

    #[test]
    fn year_filter_matches_coerced_years_exactly() {
        let mut other_year = record(10.0, None, &[]);
        other_year.year = Some(2017);
        let mut no_year = record(10.0, None, &[]);
        no_year.year = None;
        let records = vec![record(10.0, None, &[]), other_year, no_year];

        let criteria = FilterCriteria {
            year: Some(2016),
            ..Default::default()
        };
        let filtered = apply(&records, &criteria);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].year, Some(2016));
    }

    #[test]
    fn distinct_causes_are_sorted_and_deduped() {
        let records = vec![
            record(10.0, None, &[("cause", "Lightning")]),
            record(10.0, None, &[("cause", "Campfire")]),
            record(10.0, None, &[("cause", "Lightning")]),
        ];
        assert_eq!(distinct_causes(&records, "cause"), vec!["Campfire", "Lightning"]);
    }
}
