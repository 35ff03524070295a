#![cfg(feature = "web")]

use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{Path, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::Query;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::benefits::{BenefitColumns, BenefitDataset, BenefitRecord, FilterOptions};
use crate::cache::SheetCache;
use crate::config::{DashboardConfig, SheetConfig};
use crate::downloader::{matrix_to_csv, matrix_to_xlsx};
use crate::efficiency::{ConsultationDataset, EfficiencyRow, efficiency_map};
use crate::error::{DashboardError, Result};
use crate::filter::{FilterState, SearchResult, search};
use crate::graph::{ChartKind, empty_chart, render_chart};
use crate::kpi::Kpis;
use crate::loader::load_table;
use crate::login::{CredentialStore, handle_login, handle_logout, require_auth, serve_login_page};
use crate::pivot::Matrix;
use crate::view::{
    DashboardPage, DashboardQuery, EFFICIENCY_COLUMNS_MISSING, EfficiencySection, LoadedPage, Tab,
    missing_measure, render_dashboard,
};

const LOAD_FAILED: &str = "Não foi possível carregar os dados";

/// Shared state of the web server.
pub struct AppState {
    pub config: DashboardConfig,
    pub cache: SheetCache,
    pub client: reqwest::Client,
    pub credentials: CredentialStore,
}

impl AppState {
    /// Build the HTTP client, the cache and the credential store.
    pub fn new(config: DashboardConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DashboardError::Config(format!("HTTP client: {}", e)))?;
        let cache = SheetCache::new(config.cache_ttl_secs.map(Duration::from_secs));
        let credentials = CredentialStore::from_users(&config.users)?;

        Ok(AppState {
            config,
            cache,
            client,
            credentials,
        })
    }

    async fn load_sheet(&self, name: &str, sheet: &SheetConfig) -> Result<crate::cache::CachedSheet> {
        let location = sheet
            .location()
            .ok_or_else(|| DashboardError::Config(format!("no source for sheet `{}`", name)))?;

        self.cache
            .get_or_load(&sheet.cache_key(), || load_table(&self.client, name, &location))
            .await
    }

    /// The benefits dataset and when its sheet was fetched.
    pub async fn benefits(&self) -> Result<(BenefitDataset, DateTime<Local>)> {
        let cached = self.load_sheet("beneficios", &self.config.benefits).await?;
        Ok((BenefitDataset::from_table(cached.table), cached.fetched_at))
    }

    /// The consultations dataset; `None` when no sheet is configured.
    pub async fn consultations(&self) -> Option<Result<ConsultationDataset>> {
        let sheet = self.config.consultations_location()?;
        Some(
            self.load_sheet("consultas", sheet)
                .await
                .and_then(|cached| ConsultationDataset::from_table(&cached.table)),
        )
    }

    async fn efficiency(
        &self,
        columns: &BenefitColumns,
        filters: &FilterState,
        records: &[BenefitRecord],
    ) -> EfficiencySection {
        if !ChartKind::Efficiency.is_available(columns) {
            return EfficiencySection::MissingColumns;
        }
        match self.consultations().await {
            None => EfficiencySection::NotConfigured,
            Some(Err(e)) => {
                log::warn!("Consultations sheet unavailable: {}", e);
                EfficiencySection::Unavailable(e.to_string())
            }
            Some(Ok(consultations)) => {
                let feed = consultations.for_filters(filters, records);
                EfficiencySection::Rows(efficiency_map(records, &feed))
            }
        }
    }
}

/// Build the router
///
/// Everything except the login pages, static files and the health check
/// goes through [`require_auth`].
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/", get(dashboard))
        .route("/api/summary", get(api_summary))
        .route("/api/matrix", get(api_matrix))
        .route("/api/matrix.csv", get(api_matrix_csv))
        .route("/api/matrix.xlsx", get(api_matrix_xlsx))
        .route("/api/efficiency", get(api_efficiency))
        .route("/api/search", get(api_search))
        .route("/api/refresh", post(refresh))
        .route("/chart/:file", get(chart))
        .route_layer(middleware::from_fn(require_auth));

    Router::new()
        .merge(protected)
        .route("/login", get(serve_login_page).post(handle_login))
        .route("/logout", get(handle_logout))
        .route("/health", get(health))
        .nest_service("/static", ServeDir::new("static"))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

pub async fn run(config: DashboardConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config)?);
    let app = router(state);

    let listener = TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;
    log::info!(
        "{} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
}

fn unprocessable(message: impl Into<String>) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            status: "error",
            message: message.into(),
        }),
    )
        .into_response()
}

fn unavailable(message: impl Into<String>) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            status: "error",
            message: message.into(),
        }),
    )
        .into_response()
}

/// Load the benefits sheet, or the 503 every API endpoint answers with.
async fn benefits_or_unavailable(
    state: &AppState,
) -> std::result::Result<(BenefitDataset, DateTime<Local>), Response> {
    state.benefits().await.map_err(|e| {
        log::warn!("Benefits sheet unavailable: {}", e);
        unavailable(LOAD_FAILED)
    })
}

fn format_fetched_at(at: &DateTime<Local>) -> String {
    at.format("%d/%m/%Y %H:%M").to_string()
}

async fn health() -> &'static str {
    "ok"
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
    Query(query): Query<DashboardQuery>,
) -> Html<String> {
    let mut page = DashboardPage {
        username,
        query,
        fetched_at: None,
        loaded: None,
    };

    match state.benefits().await {
        Ok((dataset, fetched_at)) => {
            page.fetched_at = Some(format_fetched_at(&fetched_at));
            page.loaded = Some(build_page(&state, &page.query, &dataset).await);
        }
        Err(e) => log::warn!("Benefits sheet unavailable: {}", e),
    }

    Html(render_dashboard(&page))
}

async fn build_page(state: &AppState, query: &DashboardQuery, dataset: &BenefitDataset) -> LoadedPage {
    let filters = query.filters();
    let records = filters.apply(&dataset.records);
    let mut page = LoadedPage {
        options: dataset.options(),
        warnings: dataset.warnings(),
        columns: dataset.columns.clone(),
        filtered_records: records.len(),
        filtered_table: (Vec::new(), Vec::new()),
        kpis: Kpis::compute(&records, dataset.columns.id.is_some(), state.config.annual_budget),
        matrix: None,
        efficiency: None,
        search: None,
    };

    match query.tab() {
        Tab::Overview => {
            let rows = records
                .iter()
                .filter_map(|r| dataset.table.rows.get(r.row).cloned())
                .collect();
            page.filtered_table = (dataset.table.headers.clone(), rows);
        }
        Tab::Matrix => {
            let (rows, cols, measure) = query.matrix_axes();
            if dataset.columns.has_measure(measure) {
                page.matrix = Some(Matrix::build(&records, rows, cols, measure));
            }
        }
        Tab::Efficiency => {
            page.efficiency = Some(state.efficiency(&dataset.columns, &filters, &records).await)
        }
        Tab::Search => page.search = Some(search(dataset, query.search_text())),
    }
    page
}

#[derive(Serialize)]
struct SummaryResponse {
    status: &'static str,
    fetched_at: String,
    columns: BenefitColumns,
    filters: FilterState,
    options: FilterOptions,
    warnings: Vec<String>,
    kpis: Kpis,
}

async fn api_summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let (dataset, fetched_at) = match benefits_or_unavailable(&state).await {
        Ok(loaded) => loaded,
        Err(response) => return response,
    };

    let filters = query.filters();
    let records = filters.apply(&dataset.records);
    let kpis = Kpis::compute(&records, dataset.columns.id.is_some(), state.config.annual_budget);

    Json(SummaryResponse {
        status: "ok",
        fetched_at: fetched_at.to_rfc3339(),
        options: dataset.options(),
        warnings: dataset.warnings(),
        columns: dataset.columns,
        filters,
        kpis,
    })
    .into_response()
}

/// Build the matrix for the query, or the error response to send instead.
async fn matrix_for(state: &AppState, query: &DashboardQuery) -> std::result::Result<Matrix, Response> {
    let (dataset, _) = benefits_or_unavailable(state).await?;
    let (rows, cols, measure) = query.matrix_axes();

    if !dataset.columns.has_measure(measure) {
        return Err(unprocessable(missing_measure(measure)));
    }

    let records = query.filters().apply(&dataset.records);
    Ok(Matrix::build(&records, rows, cols, measure))
}

async fn api_matrix(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    match matrix_for(&state, &query).await {
        Ok(matrix) => Json(matrix).into_response(),
        Err(response) => response,
    }
}

fn attachment(content_type: &str, filename: &str, bytes: Vec<u8>) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from(bytes))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn export_failed(e: DashboardError) -> Response {
    log::error!("Matrix export failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "Falha ao exportar a matriz").into_response()
}

async fn api_matrix_csv(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let matrix = match matrix_for(&state, &query).await {
        Ok(matrix) => matrix,
        Err(response) => return response,
    };

    match matrix_to_csv(&matrix) {
        Ok(bytes) => attachment("text/csv; charset=utf-8", "matriz.csv", bytes),
        Err(e) => export_failed(e),
    }
}

async fn api_matrix_xlsx(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let matrix = match matrix_for(&state, &query).await {
        Ok(matrix) => matrix,
        Err(response) => return response,
    };

    match matrix_to_xlsx(&matrix) {
        Ok(bytes) => attachment(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "matriz.xlsx",
            bytes,
        ),
        Err(e) => export_failed(e),
    }
}

#[derive(Serialize)]
struct EfficiencyResponse {
    status: &'static str,
    rows: Vec<EfficiencyRow>,
}

async fn api_efficiency(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let (dataset, _) = match benefits_or_unavailable(&state).await {
        Ok(loaded) => loaded,
        Err(response) => return response,
    };

    let filters = query.filters();
    let records = filters.apply(&dataset.records);
    match state.efficiency(&dataset.columns, &filters, &records).await {
        EfficiencySection::Rows(rows) => Json(EfficiencyResponse { status: "ok", rows }).into_response(),
        EfficiencySection::MissingColumns => unprocessable(EFFICIENCY_COLUMNS_MISSING),
        EfficiencySection::NotConfigured => unavailable("Nenhuma planilha de consultas configurada"),
        EfficiencySection::Unavailable(_) => unavailable(LOAD_FAILED),
    }
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct SearchResponse {
    status: &'static str,
    #[serde(flatten)]
    result: SearchResult,
}

async fn api_search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Response {
    match benefits_or_unavailable(&state).await {
        Ok((dataset, _)) => Json(SearchResponse {
            status: "ok",
            result: search(&dataset, &query.q),
        })
        .into_response(),
        Err(response) => response,
    }
}

async fn refresh(State(state): State<Arc<AppState>>) -> Redirect {
    log::info!("Clearing cached sheets");
    state.cache.clear();
    Redirect::to("/")
}

async fn chart(
    State(state): State<Arc<AppState>>,
    Path(file): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let Some(kind) = file.strip_suffix(".svg").and_then(ChartKind::parse) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let svg = match state.benefits().await {
        Ok((dataset, _)) => {
            let filters = query.filters();
            let records = filters.apply(&dataset.records);
            let efficiency = match kind {
                ChartKind::Efficiency => {
                    match state.efficiency(&dataset.columns, &filters, &records).await {
                        EfficiencySection::Rows(rows) => rows,
                        _ => Vec::new(),
                    }
                }
                _ => Vec::new(),
            };
            render_chart(kind, &dataset.columns, &records, &efficiency)
        }
        Err(e) => {
            log::warn!("Benefits sheet unavailable: {}", e);
            empty_chart(kind.title())
        }
    };

    match svg {
        Ok(svg) => ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response(),
        Err(e) => {
            log::error!("Chart `{}` failed: {}", kind.name(), e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
