use crate::config::AppConfig;
use crate::data;
use crate::error::PipelineError;
use crate::filters::{self, AreaBucket, FilterCriteria};
use crate::summary::{self, Metrics, SummaryRow};
use crate::types::{DatasetLabel, FirePerimeter};
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use geo::{coord, BoundingRect, Contains, Point, Rect};
use geojson::{Feature, FeatureCollection};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

pub struct AppState {
    pub config: AppConfig,
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let assets_dir = config.server.assets_dir.clone();
    let port = config.server.port;
    let state = Arc::new(AppState { config });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("starting dashboard server on http://{}", addr);

    let app = Router::new()
        .route("/api/config", get(config_handler))
        .route("/api/fires", get(fires_handler))
        .route("/api/fires/uploaded", post(upload_handler))
        .route("/api/summary", get(summary_handler))
        .route("/api/summary.csv", get(summary_csv_handler))
        .route("/api/causes", get(causes_handler))
        .route("/api/compare", get(compare_handler))
        .route("/api/locate", get(locate_handler))
        .fallback_service(ServeDir::new(assets_dir))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Request / response shapes

#[derive(Debug, Deserialize)]
pub struct FiresQuery {
    pub dataset: String,
    #[serde(default)]
    pub bucket: AreaBucket,
    pub name: Option<String>,
    /// Comma-separated list of allowed cause values.
    pub causes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub bucket: AreaBucket,
    pub name: Option<String>,
    pub causes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DatasetQuery {
    pub dataset: String,
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Deserialize)]
pub struct LocateQuery {
    pub dataset: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Serialize)]
pub struct FiresResponse {
    pub dataset: String,
    pub count: usize,
    pub metrics: Metrics,
    pub features: FeatureCollection,
    pub warning: Option<String>,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub dataset: String,
    pub rows: Vec<SummaryRow>,
    pub warning: Option<String>,
}

#[derive(Serialize)]
pub struct CausesResponse {
    pub dataset: String,
    pub attribute: Option<String>,
    pub values: Vec<String>,
    pub warning: Option<String>,
}

#[derive(Serialize)]
pub struct CompareResponse {
    pub left: FiresResponse,
    pub right: FiresResponse,
}

#[derive(Serialize)]
pub struct LocateResponse {
    pub fire_name: Option<String>,
    pub year: Option<i32>,
    pub area_ha: f64,
    pub properties: Map<String, Value>,
}

#[derive(Serialize)]
pub struct DashboardConfig {
    pub datasets: Vec<String>,
    pub styles: Vec<String>,
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: f64,
    pub buckets: Vec<BucketInfo>,
}

#[derive(Serialize)]
pub struct BucketInfo {
    pub id: AreaBucket,
    pub label: &'static str,
}

type HandlerError = (StatusCode, String);

// ---------------------------------------------------------------------------
// Handlers

async fn config_handler(State(state): State<Arc<AppState>>) -> Json<DashboardConfig> {
    Json(DashboardConfig {
        datasets: state
            .config
            .dataset_labels()
            .iter()
            .map(ToString::to_string)
            .collect(),
        styles: state.config.map.styles.clone(),
        center_lat: state.config.map.center_lat,
        center_lon: state.config.map.center_lon,
        zoom: state.config.map.zoom,
        buckets: AreaBucket::ALL_BUCKETS
            .iter()
            .map(|bucket| BucketInfo {
                id: *bucket,
                label: bucket.label(),
            })
            .collect(),
    })
}

async fn fires_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FiresQuery>,
) -> Result<Json<FiresResponse>, HandlerError> {
    let label = parse_label(&query.dataset)?;
    let (records, error) = load_blocking(state.config.clone(), label).await?;
    let criteria = FilterCriteria {
        bucket: query.bucket,
        name_substring: query.name.clone(),
        causes: query.causes.as_deref().map(split_causes).unwrap_or_default(),
        // Per-year selections re-filter on the coerced year; the cumulative
        // view shows everything.
        year: label.year(),
    };
    Ok(Json(dataset_response(&label, &records, &criteria, error.as_ref())))
}

async fn upload_handler(
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<FiresResponse>, HandlerError> {
    let (records, error) =
        tokio::task::spawn_blocking(move || data::upload_or_empty(&body))
            .await
            .map_err(internal)?;
    let label = DatasetLabel::Uploaded;
    let criteria = FilterCriteria {
        bucket: query.bucket,
        name_substring: query.name.clone(),
        causes: query.causes.as_deref().map(split_causes).unwrap_or_default(),
        year: None,
    };
    Ok(Json(dataset_response(&label, &records, &criteria, error.as_ref())))
}

async fn summary_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DatasetQuery>,
) -> Result<Json<SummaryResponse>, HandlerError> {
    let label = parse_label(&query.dataset)?;
    let (records, error) = load_blocking(state.config.clone(), label).await?;
    Ok(Json(SummaryResponse {
        dataset: label.to_string(),
        rows: summary::summarize(&records),
        warning: error.map(|e| e.to_string()),
    }))
}

async fn summary_csv_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DatasetQuery>,
) -> Result<Response, HandlerError> {
    let label = parse_label(&query.dataset)?;
    let (records, _) = load_blocking(state.config.clone(), label).await?;
    let rows = summary::summarize(&records);

    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in &rows {
        writer.serialize(row).map_err(internal)?;
    }
    let bytes = writer.into_inner().map_err(internal)?;
    Ok(([(header::CONTENT_TYPE, "text/csv")], bytes).into_response())
}

async fn causes_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DatasetQuery>,
) -> Result<Json<CausesResponse>, HandlerError> {
    let label = parse_label(&query.dataset)?;
    let (records, error) = load_blocking(state.config.clone(), label).await?;

    let attribute = filters::detect_cause_attribute(&records);
    let values = attribute
        .as_deref()
        .map(|attr| filters::distinct_causes(&records, attr))
        .unwrap_or_default();
    let warning = error.map(|e| e.to_string()).or_else(|| {
        if attribute.is_none() {
            Some(
                PipelineError::MissingAttribute {
                    attribute: "cause".to_string(),
                }
                .to_string(),
            )
        } else {
            None
        }
    });

    Ok(Json(CausesResponse {
        dataset: label.to_string(),
        attribute,
        values,
        warning,
    }))
}

async fn compare_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<CompareResponse>, HandlerError> {
    let left = parse_label(&query.left)?;
    let right = parse_label(&query.right)?;
    let config_left = state.config.clone();
    let config_right = state.config.clone();

    // The two loads share nothing, so they can run side by side.
    let (left_outcome, right_outcome) = tokio::task::spawn_blocking(move || {
        rayon::join(
            move || data::load_or_empty(&config_left, &left),
            move || data::load_or_empty(&config_right, &right),
        )
    })
    .await
    .map_err(internal)?;

    // Comparison maps show the full datasets, unfiltered.
    let criteria = FilterCriteria::default();
    Ok(Json(CompareResponse {
        left: dataset_response(&left, &left_outcome.0, &criteria, left_outcome.1.as_ref()),
        right: dataset_response(&right, &right_outcome.0, &criteria, right_outcome.1.as_ref()),
    }))
}

// Wrapper for RTree indexing
struct PerimeterIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for PerimeterIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

async fn locate_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LocateQuery>,
) -> Result<Json<Option<LocateResponse>>, HandlerError> {
    let label = parse_label(&query.dataset)?;
    let (records, _) = load_blocking(state.config.clone(), label).await?;

    let items: Vec<PerimeterIndex> = records
        .iter()
        .enumerate()
        .map(|(index, rec)| {
            let rect = rec.geometry.bounding_rect().unwrap_or(Rect::new(
                coord! { x: 0.0, y: 0.0 },
                coord! { x: 0.0, y: 0.0 },
            ));
            PerimeterIndex {
                index,
                aabb: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            }
        })
        .collect();
    let tree = RTree::bulk_load(items);

    let point = Point::new(query.lon, query.lat);
    let envelope = AABB::from_point([query.lon, query.lat]);
    for candidate in tree.locate_in_envelope_intersecting(&envelope) {
        if let Some(rec) = records.get(candidate.index) {
            if rec.geometry.contains(&point) {
                return Ok(Json(Some(LocateResponse {
                    fire_name: rec.fire_name.clone(),
                    year: rec.year,
                    area_ha: rec.area_ha,
                    properties: rec.properties.clone(),
                })));
            }
        }
    }

    Ok(Json(None))
}

// ---------------------------------------------------------------------------
// Shared plumbing

fn parse_label(raw: &str) -> Result<DatasetLabel, HandlerError> {
    DatasetLabel::from_str(raw).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

async fn load_blocking(
    config: AppConfig,
    label: DatasetLabel,
) -> Result<(Vec<FirePerimeter>, Option<PipelineError>), HandlerError> {
    tokio::task::spawn_blocking(move || data::load_or_empty(&config, &label))
        .await
        .map_err(internal)
}

fn internal<E: std::fmt::Display>(e: E) -> HandlerError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn split_causes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn dataset_response(
    label: &DatasetLabel,
    records: &[FirePerimeter],
    criteria: &FilterCriteria,
    error: Option<&PipelineError>,
) -> FiresResponse {
    let filtered = filters::apply(records, criteria);
    let metrics = summary::metrics(&filtered);
    FiresResponse {
        dataset: label.to_string(),
        count: filtered.len(),
        metrics,
        features: to_feature_collection(&filtered),
        warning: error.map(|e| e.to_string()),
    }
}

fn to_feature_collection(records: &[FirePerimeter]) -> FeatureCollection {
    let features = records
        .iter()
        .map(|rec| {
            let mut properties = rec.properties.clone();
            properties.insert("area_ha".to_string(), json_number(summary::round2(rec.area_ha)));
            properties.insert(
                "year".to_string(),
                rec.year.map(Value::from).unwrap_or(Value::Null),
            );
            if let Some(name) = &rec.fire_name {
                properties.insert("fire_name".to_string(), Value::String(name.clone()));
            }
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&rec.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    #[test]
    fn causes_param_splits_on_commas() {
        assert_eq!(
            split_causes("Lightning, Campfire ,,Debris Burning"),
            vec!["Lightning", "Campfire", "Debris Burning"]
        );
        assert!(split_causes("").is_empty());
    }

    #[test]
    fn feature_collection_carries_derived_attributes() {
        let rec = FirePerimeter {
            geometry: MultiPolygon::new(vec![polygon![
                (x: -119.00, y: 37.00),
                (x: -118.99, y: 37.00),
                (x: -118.99, y: 37.01),
                (x: -119.00, y: 37.01),
            ]]),
            area_ha: 123.456,
            year: Some(2016),
            fire_name: Some("Lake Fire".to_string()),
            properties: Map::new(),
        };
        let fc = to_feature_collection(&[rec]);
        assert_eq!(fc.features.len(), 1);
        let props = fc.features[0].properties.as_ref().unwrap();
        assert_eq!(props.get("area_ha"), Some(&Value::from(123.46)));
        assert_eq!(props.get("year"), Some(&Value::from(2016)));
        assert_eq!(props.get("fire_name"), Some(&Value::from("Lake Fire")));
    }
}
