use geo::MultiPolygon;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A single wildfire perimeter with its derived burned area.
#[derive(Debug, Clone)]
pub struct FirePerimeter {
    /// Display geometry, geographic coordinates (WGS84).
    pub geometry: MultiPolygon<f64>,
    /// Burned area in hectares, measured in an equal-area projection at load time.
    pub area_ha: f64,
    /// Year label, coerced to integer-or-null during loading.
    pub year: Option<i32>,
    pub fire_name: Option<String>,
    /// Raw attributes from the source file, kept for cause detection and display.
    pub properties: Map<String, Value>,
}

/// Which dataset the user selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetLabel {
    Year(i32),
    Cumulative,
    Uploaded,
}

impl DatasetLabel {
    pub fn year(&self) -> Option<i32> {
        match self {
            DatasetLabel::Year(year) => Some(*year),
            _ => None,
        }
    }
}

impl fmt::Display for DatasetLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetLabel::Year(year) => write!(f, "{}", year),
            DatasetLabel::Cumulative => write!(f, "Cumulative"),
            DatasetLabel::Uploaded => write!(f, "Uploaded"),
        }
    }
}

impl FromStr for DatasetLabel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("cumulative") {
            return Ok(DatasetLabel::Cumulative);
        }
        if trimmed.eq_ignore_ascii_case("uploaded") {
            return Ok(DatasetLabel::Uploaded);
        }
        trimmed
            .parse::<i32>()
            .map(DatasetLabel::Year)
            .map_err(|_| anyhow::anyhow!("unknown dataset selection: '{}'", s))
    }
}
