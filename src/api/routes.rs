use crate::config::Config;
use crate::db::{
    BadgeRow, DailyPointsRow, Database, EarnedBadgeRow, HabitBreakdownRow, HabitRow,
    LeaderboardRow, RecentLogRow, UserRow,
};
use crate::ledger::{self, LedgerError, LogOutcome};
use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const MAX_NOTES_LEN: usize = 500;
const RECENT_LOGS_LIMIT: usize = 10;
const ANALYTICS_WINDOW_DAYS: i64 = 7;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/habits", get(habits))
        .route("/api/v1/badges", get(badges))
        .route("/api/v1/users", post(create_user))
        .route("/api/v1/users/:id/dashboard", get(dashboard))
        .route("/api/v1/users/:id/badges", get(user_badges))
        .route("/api/v1/users/:id/analytics", get(analytics))
        .route("/api/v1/leaderboard", get(leaderboard))
        .route("/api/v1/activity/log", post(log_activity))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct LogActivityPayload {
    user_id: i64,
    habit_id: i64,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateUserPayload {
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    user_count: i64,
    habit_count: i64,
    log_count: i64,
    last_logged_at: Option<i64>,
    api_port: u16,
}

#[derive(Debug, Serialize)]
struct HabitsPayload {
    habits: Vec<HabitRow>,
}

#[derive(Debug, Serialize)]
struct BadgesPayload {
    badges: Vec<BadgeRow>,
}

#[derive(Debug, Serialize)]
struct UserBadgesPayload {
    badges: Vec<EarnedBadgeRow>,
}

#[derive(Debug, Serialize)]
struct DashboardPayload {
    id: i64,
    name: String,
    email: String,
    total_points: i64,
    current_streak: i64,
    last_logged_date: Option<NaiveDate>,
    recent_logs: Vec<RecentLogRow>,
    badges: Vec<EarnedBadgeRow>,
}

#[derive(Debug, Serialize)]
struct LeaderboardPayload {
    users: Vec<LeaderboardRow>,
}

#[derive(Debug, Serialize)]
struct AnalyticsPayload {
    from: String,
    to: String,
    daily_points: Vec<DailyPointsRow>,
    habit_breakdown: Vec<HabitBreakdownRow>,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let database = Database::open(&state.config.db_path)?;

    let payload = StatusPayload {
        user_count: database.count_users()?,
        habit_count: database.count_habits()?,
        log_count: database.count_logs()?,
        last_logged_at: database.latest_log_timestamp()?,
        api_port: state.config.api_port,
    };

    Ok(Json(payload))
}

async fn habits(State(state): State<ApiState>) -> ApiResult<Json<HabitsPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let habits = database.list_habits()?;

    Ok(Json(HabitsPayload { habits }))
}

async fn badges(State(state): State<ApiState>) -> ApiResult<Json<BadgesPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let badges = database.list_badges()?;

    Ok(Json(BadgesPayload { badges }))
}

async fn create_user(
    State(state): State<ApiState>,
    Json(payload): Json<CreateUserPayload>,
) -> ApiResult<(StatusCode, Json<UserRow>)> {
    let name = payload.name.trim();
    let email = payload.email.trim().to_lowercase();

    if name.is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest("a valid email is required".to_string()));
    }

    let database = Database::open(&state.config.db_path)?;
    if database.find_user_by_email(&email)?.is_some() {
        return Err(ApiError::Conflict(format!(
            "a user already exists with email: {email}"
        )));
    }

    let user = database.create_user(name, &email, Utc::now().timestamp())?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn dashboard(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<DashboardPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let user = require_user(&database, user_id)?;

    let payload = DashboardPayload {
        id: user.id,
        name: user.name,
        email: user.email,
        total_points: user.total_points,
        current_streak: user.current_streak,
        last_logged_date: user.last_logged_date,
        recent_logs: database.recent_logs_for_user(user_id, RECENT_LOGS_LIMIT)?,
        badges: database.badges_for_user(user_id)?,
    };

    Ok(Json(payload))
}

async fn user_badges(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<UserBadgesPayload>> {
    let database = Database::open(&state.config.db_path)?;
    require_user(&database, user_id)?;

    let badges = database.badges_for_user(user_id)?;
    Ok(Json(UserBadgesPayload { badges }))
}

async fn analytics(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<AnalyticsPayload>> {
    let database = Database::open(&state.config.db_path)?;
    require_user(&database, user_id)?;

    let today = Utc::now().date_naive();
    let from_date = today - Duration::days(ANALYTICS_WINDOW_DAYS - 1);
    let from_ts = from_date
        .and_hms_opt(0, 0, 0)
        .context("Failed to build analytics window start")?
        .and_utc()
        .timestamp();

    let logged = database.daily_points_since(user_id, from_ts)?;

    // Zero-fill the window so every day appears, logged or not.
    let daily_points = (0..ANALYTICS_WINDOW_DAYS)
        .map(|offset| {
            let date = (from_date + Duration::days(offset))
                .format("%Y-%m-%d")
                .to_string();
            let points = logged
                .iter()
                .find(|row| row.date == date)
                .map(|row| row.points)
                .unwrap_or(0);

            DailyPointsRow { date, points }
        })
        .collect();

    let payload = AnalyticsPayload {
        from: from_date.format("%Y-%m-%d").to_string(),
        to: today.format("%Y-%m-%d").to_string(),
        daily_points,
        habit_breakdown: database.habit_breakdown_since(user_id, from_ts)?,
    };

    Ok(Json(payload))
}

async fn leaderboard(
    State(state): State<ApiState>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<LeaderboardPayload>> {
    let limit = query
        .limit
        .unwrap_or(state.config.leaderboard_size)
        .clamp(1, 100);

    let database = Database::open(&state.config.db_path)?;
    let users = database.top_users(limit)?;

    Ok(Json(LeaderboardPayload { users }))
}

async fn log_activity(
    State(state): State<ApiState>,
    Json(payload): Json<LogActivityPayload>,
) -> ApiResult<Json<LogOutcome>> {
    let notes = normalize_notes(payload.notes.as_deref())?;

    let mut database = Database::open(&state.config.db_path)?;
    let now = Utc::now();
    let outcome = ledger::log_activity(
        &mut database,
        payload.user_id,
        payload.habit_id,
        notes.as_deref(),
        now.date_naive(),
        now.timestamp(),
    )?;

    Ok(Json(outcome))
}

fn require_user(database: &Database, user_id: i64) -> Result<UserRow, ApiError> {
    database
        .get_user(user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("user not found with id {user_id}")))
}

fn normalize_notes(raw: Option<&str>) -> Result<Option<String>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(trimmed) if trimmed.chars().count() > MAX_NOTES_LEN => Err(ApiError::BadRequest(
            format!("notes must be at most {MAX_NOTES_LEN} characters"),
        )),
        Some(trimmed) => Ok(Some(trimmed.to_string())),
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<LedgerError> for ApiError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::Persistence(error) => Self::Internal(error),
            not_found => Self::NotFound(not_found.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_notes;

    #[test]
    fn notes_are_trimmed_and_bounded() {
        assert_eq!(normalize_notes(None).unwrap(), None);
        assert_eq!(normalize_notes(Some("   ")).unwrap(), None);
        assert_eq!(
            normalize_notes(Some("  rode the long way  ")).unwrap(),
            Some("rode the long way".to_string())
        );

        let too_long = "x".repeat(501);
        assert!(normalize_notes(Some(&too_long)).is_err());
    }
}
