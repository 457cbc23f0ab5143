//! JSON query service over stored METAR reports and station coordinates.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metar_core::geo::{bounding_box, haversine_distance, GeoPoint};
use metar_core::{ParsedReport, TimeRange};
use metar_storage::{MetarStore, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const CRATE_NAME: &str = "metar-web";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MetarStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn MetarStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ReportsQuery {
    name: String,
    start: Option<i64>,
    end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeoQuery {
    lat: f64,
    lon: f64,
    /// Meters.
    rad: f64,
    start: Option<i64>,
    end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct CoordinatesQuery {
    name: String,
}

/// A stored report plus its station's great-circle distance from the query point, in meters.
#[derive(Debug, Clone, Serialize)]
pub struct GeoReport {
    #[serde(flatten)]
    pub report: ParsedReport,
    pub distance: f64,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/id", get(reports_handler))
        .route("/geo", get(geo_handler))
        .route("/count_reports", get(count_reports_handler))
        .route("/last_report", get(last_report_handler))
        .route("/coordinates", get(coordinates_handler))
        .with_state(Arc::new(state))
}

/// Binds the query service port on all interfaces.
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding query service to port {port}"))
}

/// Serves [`app`] on `0.0.0.0:port` until `shutdown` fires.
pub async fn serve(state: AppState, port: u16, shutdown: CancellationToken) -> anyhow::Result<()> {
    serve_on(bind(port).await?, state, shutdown).await
}

/// Serves [`app`] on an already bound listener until `shutdown` fires.
pub async fn serve_on(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let port = listener.local_addr().map(|addr| addr.port()).ok();
    info!(?port, "query service listening");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("query service stopped")?;
    Ok(())
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn reports_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportsQuery>,
) -> Response {
    let range = TimeRange::from_unix(query.start, query.end);
    match state.store.reports_for_station(&query.name, range).await {
        Ok(reports) => Json(reports).into_response(),
        Err(err) => server_error(err),
    }
}

async fn geo_handler(State(state): State<Arc<AppState>>, Query(query): Query<GeoQuery>) -> Response {
    if !(query.rad >= 0.0 && query.rad.is_finite()) {
        return bad_request("rad must be a non-negative number of meters");
    }
    if !(query.lat.is_finite() && query.lon.is_finite()) {
        return bad_request("lat and lon must be finite");
    }

    let center = GeoPoint::new(query.lat, query.lon);
    let range = TimeRange::from_unix(query.start, query.end);
    match reports_near(state.store.as_ref(), center, query.rad, range).await {
        Ok(reports) => Json(reports).into_response(),
        Err(err) => server_error(err),
    }
}

/// Bounding-box prefilter on station coordinates, then exact distance refinement.
async fn reports_near(
    store: &dyn MetarStore,
    center: GeoPoint,
    radius_m: f64,
    range: Option<TimeRange>,
) -> Result<Vec<GeoReport>, StoreError> {
    let bbox = bounding_box(center, radius_m);
    let distances: BTreeMap<String, f64> = store
        .coordinates_within(&bbox)
        .await?
        .into_iter()
        .filter_map(|station| {
            let distance = haversine_distance(center, GeoPoint::new(station.lat, station.long));
            (distance <= radius_m).then_some((station.name, distance))
        })
        .collect();

    if distances.is_empty() {
        return Ok(Vec::new());
    }

    let names: Vec<String> = distances.keys().cloned().collect();
    let reports = store.reports_for_stations(&names, range).await?;
    Ok(reports
        .into_iter()
        .filter_map(|report| {
            let distance = *distances.get(&report.name)?;
            Some(GeoReport { report, distance })
        })
        .collect())
}

async fn count_reports_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.store.count_reports().await {
        Ok(count) => Json(json!({ "count": count })).into_response(),
        Err(err) => server_error(err),
    }
}

async fn last_report_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.store.load_cursor().await {
        Ok(Some(cursor)) => Json(cursor).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no report processed yet" })),
        )
            .into_response(),
        Err(err) => server_error(err),
    }
}

async fn coordinates_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CoordinatesQuery>,
) -> Response {
    match state.store.coordinates_for(&query.name).await {
        Ok(records) => Json(records).into_response(),
        Err(err) => server_error(err),
    }
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn server_error(err: StoreError) -> Response {
    error!(error = %err, "query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": format!("Server error: {err}") })),
    )
        .into_response()
}
