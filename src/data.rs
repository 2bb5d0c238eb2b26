use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::projection::AlbersEqualArea;
use crate::types::{DatasetLabel, FirePerimeter};
use anyhow::{anyhow, Context, Result};
use geo::{HasDimensions, MultiPolygon, Validation};
use geojson::GeoJson;
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;
use tracing::{info, warn};

/// Load and prepare the dataset behind a year / cumulative selection.
///
/// Returns the normalized collection: geometry in geographic coordinates,
/// `area_ha` measured, year coerced to integer-or-null, invalid records gone.
pub fn load_dataset(
    config: &AppConfig,
    label: &DatasetLabel,
) -> Result<Vec<FirePerimeter>, PipelineError> {
    let Some(path) = config.input.dataset_path(label) else {
        return Err(PipelineError::Load {
            label: label.to_string(),
            reason: "no dataset file configured for this selection".to_string(),
        });
    };
    read_perimeters(&path, label).map_err(|e| PipelineError::Load {
        label: label.to_string(),
        reason: format!("{:#}", e),
    })
}

/// Same pipeline over an arbitrary reader; used for uploaded GeoJSON blobs.
pub fn load_from_reader<R: Read>(
    reader: R,
    label: &DatasetLabel,
) -> Result<Vec<FirePerimeter>, PipelineError> {
    parse_geojson(reader, label).map_err(|e| PipelineError::Load {
        label: label.to_string(),
        reason: format!("{:#}", e),
    })
}

/// Load a dataset, degrading to an empty collection instead of failing the
/// page. The error, if any, travels alongside so the caller can surface it.
pub fn load_or_empty(
    config: &AppConfig,
    label: &DatasetLabel,
) -> (Vec<FirePerimeter>, Option<PipelineError>) {
    outcome(label, load_dataset(config, label))
}

/// Upload counterpart of [`load_or_empty`].
pub fn upload_or_empty(bytes: &[u8]) -> (Vec<FirePerimeter>, Option<PipelineError>) {
    let label = DatasetLabel::Uploaded;
    outcome(&label, load_from_reader(Cursor::new(bytes), &label))
}

fn outcome(
    label: &DatasetLabel,
    result: Result<Vec<FirePerimeter>, PipelineError>,
) -> (Vec<FirePerimeter>, Option<PipelineError>) {
    match result {
        Ok(records) if records.is_empty() => {
            warn!("dataset {} loaded but contains no valid perimeters", label);
            (
                Vec::new(),
                Some(PipelineError::EmptyResult {
                    label: label.to_string(),
                }),
            )
        }
        Ok(records) => {
            info!("loaded {} perimeters for dataset {}", records.len(), label);
            (records, None)
        }
        Err(err) => {
            warn!("{}", err);
            (Vec::new(), Some(err))
        }
    }
}

fn read_perimeters(path: &Path, label: &DatasetLabel) -> Result<Vec<FirePerimeter>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .ok_or_else(|| anyhow!("dataset file has no extension: {:?}", path))?;

    match extension.as_str() {
        "json" | "geojson" => {
            let file =
                File::open(path).with_context(|| format!("failed to open {:?}", path))?;
            parse_geojson(BufReader::new(file), label)
        }
        "shp" => read_shapefile(path, label),
        other => Err(anyhow!("unsupported dataset format: {}", other)),
    }
}

fn parse_geojson<R: Read>(reader: R, label: &DatasetLabel) -> Result<Vec<FirePerimeter>> {
    let geojson = GeoJson::from_reader(reader).context("failed to parse GeoJSON")?;
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("dataset must be a GeoJSON FeatureCollection")),
    };

    let mut records = Vec::new();
    for feature in collection.features {
        let Some(geom) = feature.geometry else {
            continue;
        };
        let geometry = match geo::Geometry::<f64>::try_from(geom.value) {
            Ok(geo::Geometry::MultiPolygon(mp)) => mp,
            Ok(geo::Geometry::Polygon(p)) => MultiPolygon::new(vec![p]),
            // Points and lines are not fire perimeters.
            Ok(_) => continue,
            Err(e) => return Err(anyhow!("failed to convert feature geometry: {:?}", e)),
        };
        records.push(FirePerimeter {
            geometry,
            area_ha: 0.0,
            year: None,
            fire_name: None,
            properties: feature.properties.unwrap_or_default(),
        });
    }

    Ok(prepare(records, label))
}

fn read_shapefile(path: &Path, label: &DatasetLabel) -> Result<Vec<FirePerimeter>> {
    let mut reader = shapefile::Reader::from_path(path)
        .with_context(|| format!("failed to open shapefile: {:?}", path))?;

    let mut records = Vec::new();
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("failed to convert polygon: {:?}", e))?,
            shapefile::Shape::PolygonM(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("failed to convert polygonM: {:?}", e))?,
            shapefile::Shape::PolygonZ(polygon) => polygon
                .try_into()
                .map_err(|e| anyhow!("failed to convert polygonZ: {:?}", e))?,
            _ => continue,
        };

        let mut properties = Map::new();
        for (name, value) in record {
            properties.insert(name, dbase_value(value));
        }

        records.push(FirePerimeter {
            geometry,
            area_ha: 0.0,
            year: None,
            fire_name: None,
            properties,
        });
    }

    Ok(prepare(records, label))
}

fn dbase_value(value: shapefile::dbase::FieldValue) -> Value {
    use shapefile::dbase::FieldValue;
    match value {
        FieldValue::Character(s) => s.map(Value::String).unwrap_or(Value::Null),
        FieldValue::Numeric(n) => n
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Float(f) => f
            .and_then(|f| serde_json::Number::from_f64(f as f64))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Double(d) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Integer(i) => Value::Number(i.into()),
        FieldValue::Logical(b) => b.map(Value::Bool).unwrap_or(Value::Null),
        FieldValue::Date(d) => d
            .map(|d| Value::String(format!("{:?}", d)))
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Measure areas, pull out the typed attributes, tag years, and normalize.
fn prepare(mut records: Vec<FirePerimeter>, label: &DatasetLabel) -> Vec<FirePerimeter> {
    let projection = AlbersEqualArea::california();
    records.par_iter_mut().for_each(|rec| {
        rec.area_ha = projection.area_ha(&rec.geometry);
    });

    // A year attribute anywhere in the collection means the source supplies
    // years itself; otherwise a specific-year selection stamps every record.
    let has_year = records.iter().any(|r| r.properties.contains_key("year"));
    for rec in &mut records {
        rec.fire_name = rec
            .properties
            .get("fire_name")
            .and_then(Value::as_str)
            .map(str::to_owned);
        rec.year = if has_year {
            rec.properties.get("year").and_then(coerce_year)
        } else {
            label.year()
        };
    }

    normalize(records)
}

/// Coerce a raw year attribute to an integer, treating anything unparseable
/// as null rather than a load failure.
pub fn coerce_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|v| i32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

/// Drop records whose geometry is empty or topologically invalid. Idempotent.
pub fn normalize(records: Vec<FirePerimeter>) -> Vec<FirePerimeter> {
    records
        .into_iter()
        .filter(|r| !r.geometry.is_empty() && r.geometry.is_valid())
        .collect()
}
