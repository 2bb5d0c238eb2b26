use crate::types::FirePerimeter;
use serde::Serialize;
use std::collections::BTreeMap;

/// One row of the per-year summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub year: Option<i32>,
    pub total_fires: usize,
    pub avg_area_ha: f64,
    pub max_area_ha: f64,
}

/// Scalar metric cards for the filtered view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_fires: usize,
    pub avg_area_ha: f64,
    pub max_area_ha: f64,
}

/// Group the full collection by year, computing count / mean / max of the
/// burned area. Records with no usable year are kept as their own group and
/// sorted after the labelled years rather than dropped.
pub fn summarize(records: &[FirePerimeter]) -> Vec<SummaryRow> {
    let mut groups: BTreeMap<Option<i32>, Vec<f64>> = BTreeMap::new();
    for rec in records {
        groups.entry(rec.year).or_default().push(rec.area_ha);
    }

    let mut rows: Vec<SummaryRow> = groups
        .into_iter()
        .map(|(year, areas)| {
            let sum: f64 = areas.iter().sum();
            let max = areas.iter().copied().fold(0.0_f64, f64::max);
            SummaryRow {
                year,
                total_fires: areas.len(),
                avg_area_ha: round2(sum / areas.len() as f64),
                max_area_ha: round2(max),
            }
        })
        .collect();

    // BTreeMap sorts None first; the table reads better with unknown years last.
    rows.sort_by_key(|row| (row.year.is_none(), row.year));
    rows
}

/// Metric cards for whatever collection survived filtering; an empty
/// collection reports zeros instead of NaN.
pub fn metrics(records: &[FirePerimeter]) -> Metrics {
    if records.is_empty() {
        return Metrics {
            total_fires: 0,
            avg_area_ha: 0.0,
            max_area_ha: 0.0,
        };
    }
    let sum: f64 = records.iter().map(|r| r.area_ha).sum();
    let max = records.iter().map(|r| r.area_ha).fold(0.0_f64, f64::max);
    Metrics {
        total_fires: records.len(),
        avg_area_ha: round2(sum / records.len() as f64),
        max_area_ha: round2(max),
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
