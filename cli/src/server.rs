use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use totum_core::models::{
    DailySummary, JournalEntry, MealType, Profile, WeeklySummary, validate_profile,
    validate_quantity,
};
use totum_core::search::{DEFAULT_LIMIT, SearchHit, SearchOptions};
use totum_core::service::Session;
use totum_core::targets::DailyTargets;

const BODY_LIMIT: usize = 64 * 1024; // 64 KB

#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<Session>>,
    api_key: Option<String>,
}

impl AppState {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    limit: Option<i64>,
    page: Option<i64>,
}

#[derive(Deserialize)]
struct LogRequest {
    food_name: String,
    quantity_g: f64,
    meal: Option<String>,
    date: Option<String>,
}

#[derive(Serialize)]
struct ProfileResponse {
    profile: Profile,
    targets: DailyTargets,
}

#[derive(Serialize)]
struct FavoriteResponse {
    name: String,
    favorite: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

fn parse_date_param(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{raw}'. Use YYYY-MM-DD")))
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            warn!(path = %request.uri().path(), "rejected request without valid API key");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Food search ---

async fn search_foods(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<SearchHit>> {
    let options = SearchOptions {
        limit: params.limit.unwrap_or(DEFAULT_LIMIT),
        page: params.page.unwrap_or(1),
    };
    Json(state.session().search(&params.q, options))
}

// --- Journal ---

async fn create_entry(
    State(state): State<AppState>,
    Json(req): Json<LogRequest>,
) -> Result<(StatusCode, Json<JournalEntry>), ApiError> {
    validate_quantity(req.quantity_g).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let meal = match req.meal.as_deref() {
        Some(m) => m
            .parse::<MealType>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => MealType::Snack,
    };
    let date = match req.date.as_deref() {
        Some(d) => parse_date_param(d)?,
        None => Local::now().date_naive(),
    };

    let mut session = state.session();
    if session.find_food(&req.food_name).is_none() {
        return Err(ApiError::NotFound(format!(
            "Unknown food '{}'",
            req.food_name
        )));
    }
    let entry = session.log_food(date, meal, &req.food_name, req.quantity_g)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_entries(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Vec<JournalEntry>>, ApiError> {
    let date = parse_date_param(&date)?;
    let entries = state.session().entries_for_date(date)?;
    Ok(Json(entries))
}

async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid entry id '{id}'")))?;
    if state.session().delete_entry(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Entry {id} not found")))
    }
}

async fn undo_last_entry(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<StatusCode, ApiError> {
    let date = parse_date_param(&date)?;
    if state.session().undo_last(date)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("No entries on {date}")))
    }
}

// --- Summaries ---

async fn get_daily_summary(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DailySummary>, ApiError> {
    let date = parse_date_param(&date)?;
    let summary = state.session().daily_report(date)?;
    Ok(Json(summary))
}

async fn get_weekly_summary(
    State(state): State<AppState>,
    Path(end): Path<String>,
) -> Result<Json<WeeklySummary>, ApiError> {
    let end = parse_date_param(&end)?;
    let summary = state.session().weekly_report(end)?;
    Ok(Json(summary))
}

// --- Profile ---

async fn get_profile(State(state): State<AppState>) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state.session().profile()?;
    let targets = DailyTargets::from_profile(&profile);
    Ok(Json(ProfileResponse { profile, targets }))
}

async fn put_profile(
    State(state): State<AppState>,
    Json(profile): Json<Profile>,
) -> Result<Json<ProfileResponse>, ApiError> {
    validate_profile(&profile).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.session().save_profile(&profile)?;
    let targets = DailyTargets::from_profile(&profile);
    Ok(Json(ProfileResponse { profile, targets }))
}

// --- Favorites ---

async fn list_favorites(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.session().favorites()?))
}

async fn add_favorite(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<FavoriteResponse>, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    state.session().add_favorite(&name)?;
    Ok(Json(FavoriteResponse {
        name: name.trim().to_string(),
        favorite: true,
    }))
}

async fn remove_favorite(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.session().remove_favorite(&name)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("'{name}' is not a favorite")))
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/foods/search", get(search_foods))
        .route("/api/journal", post(create_entry))
        // one segment serves both: a date for GET, an entry id for DELETE
        .route("/api/journal/{key}", get(get_entries).delete(delete_entry))
        .route("/api/journal/{date}/undo", post(undo_last_entry))
        .route("/api/summary/{date}", get(get_daily_summary))
        .route("/api/summary/week/{end}", get(get_weekly_summary))
        .route("/api/profile", get(get_profile).put(put_profile))
        .route("/api/favorites", get(list_favorites))
        .route(
            "/api/favorites/{name}",
            put(add_favorite).delete(remove_favorite),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    session: Session,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let foods = session.foods().len();
    let state = AppState {
        session: Arc::new(Mutex::new(session)),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        let head: String = key.chars().take(4).collect();
        let tail: String = key.chars().skip(key.chars().count().saturating_sub(4)).collect();
        eprintln!("API key: {head}...{tail} (see api_key file in data directory)");
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    info!(bind, port, foods, "server started");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
