use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::category::Category;
use crate::location::Coordinate;
use crate::pipeline::PointPrediction;
use crate::provider::Provider;
use crate::row::parse_observation_date;
use crate::rules::{tags_for, NativeTag};

use super::state::AppState;

/// Default search radius around a point, in metres.
pub const DEFAULT_RADIUS_M: u32 = 150;
const MAX_RADIUS_M: u32 = 50_000;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

#[derive(Debug)]
pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

// ─── GET /api/predict ────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct PredictQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius: Option<u32>,
    /// `m/d/Y` or `Y-m-d`; defaults to today.
    pub date: Option<String>,
}

#[derive(Serialize)]
pub struct PredictResponse {
    pub lat: f64,
    pub lon: f64,
    pub radius: u32,
    pub date: NaiveDate,
    pub providers: PointPrediction,
}

fn validate(params: &PredictQuery) -> Result<(Coordinate, u32, NaiveDate), ApiError> {
    let (lat, lon) = match (params.lat, params.lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(api_error(StatusCode::BAD_REQUEST, "Missing 'lat' or 'lon' parameter")),
    };
    let center = Coordinate::new(lat, lon);
    if !center.is_valid() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Invalid coordinates. Lat: -90..90, Lon: -180..180",
        ));
    }

    let radius = params.radius.unwrap_or(DEFAULT_RADIUS_M);
    if radius == 0 || radius > MAX_RADIUS_M {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Radius must be 1-{} metres", MAX_RADIUS_M),
        ));
    }

    let date = match params.date.as_deref() {
        Some(d) => parse_observation_date(d)
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("Invalid date '{}'", d)))?,
        None => Utc::now().date_naive(),
    };
    Ok((center, radius, date))
}

pub(super) async fn predict(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PredictQuery>,
) -> Result<Json<PredictResponse>, ApiError> {
    let start = Instant::now();
    let (center, radius, date) = validate(&params)?;

    let providers = tokio::task::spawn_blocking(move || {
        let pipeline = state
            .pipeline
            .lock()
            .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "pipeline unavailable"))?;
        Ok::<_, ApiError>(pipeline.predict_point(center, radius, date))
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;

    tracing::info!(
        lat = center.lat,
        lon = center.lon,
        radius,
        places = providers.values().map(Vec::len).sum::<usize>(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/predict"
    );

    Ok(Json(PredictResponse {
        lat: center.lat,
        lon: center.lon,
        radius,
        date,
        providers,
    }))
}

// ─── GET /api/categories ─────────────────────────────────────────

#[derive(Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<Category>,
    pub fallback: Category,
    /// Native tags per category and provider, e.g. `amenity=cafe` for OSM.
    pub tags: BTreeMap<Category, BTreeMap<Provider, Vec<String>>>,
}

fn describe(tag: NativeTag) -> String {
    match tag {
        NativeTag::KeyValue(key, value) => format!("{}={}", key, value),
        NativeTag::Label(label) => label.to_string(),
    }
}

fn tag_listing() -> BTreeMap<Category, BTreeMap<Provider, Vec<String>>> {
    let mut out = BTreeMap::new();
    for category in Category::ALL {
        let per_provider: BTreeMap<_, _> = Provider::ORDER
            .into_iter()
            .map(|p| (p, tags_for(p, category).into_iter().map(describe).collect::<Vec<_>>()))
            .filter(|(_, tags)| !tags.is_empty())
            .collect();
        if !per_provider.is_empty() {
            out.insert(category, per_provider);
        }
    }
    out
}

pub(super) async fn categories() -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        categories: Category::ALL.to_vec(),
        fallback: Category::FALLBACK,
        tags: tag_listing(),
    })
}
