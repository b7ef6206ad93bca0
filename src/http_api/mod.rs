use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    Assignment, BulkAssignment, DaySiteStatus, HolidayWeekdays, Member, MemberId, Roster,
    RosterError, RosterGrid, StaticAuthorizer, WorkLine, format_date, parse_date,
};

/// Header carrying the caller's role; `admin` grants mutations.
pub const ROLE_HEADER: &str = "x-roster-role";

#[derive(Clone)]
pub struct AppState {
    roster: Arc<Roster>,
    default_holidays: HolidayWeekdays,
}

impl AppState {
    pub fn new(roster: Roster) -> Self {
        Self::with_shared(Arc::new(roster))
    }

    pub fn with_shared(roster: Arc<Roster>) -> Self {
        Self {
            roster,
            default_holidays: HolidayWeekdays::none(),
        }
    }

    pub fn with_default_holidays(mut self, holidays: HolidayWeekdays) -> Self {
        self.default_holidays = holidays;
        self
    }

    fn roster(&self) -> Arc<Roster> {
        self.roster.clone()
    }
}

fn caller(headers: &HeaderMap) -> StaticAuthorizer {
    let admin = headers
        .get(ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|role| role.trim().eq_ignore_ascii_case("admin"));
    StaticAuthorizer::new(admin)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cells: Vec<String>,
}

#[derive(Debug)]
struct ApiError(RosterError);

impl From<RosterError> for ApiError {
    fn from(value: RosterError) -> Self {
        ApiError(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = match &err {
            RosterError::InvalidRange { .. }
            | RosterError::InvalidDate { .. }
            | RosterError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            RosterError::CellLocked { .. } => StatusCode::CONFLICT,
            RosterError::Permission { .. } => StatusCode::FORBIDDEN,
            RosterError::NotFound { .. } => StatusCode::NOT_FOUND,
            RosterError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let cells = match &err {
            RosterError::CellLocked {
                work_line_id,
                dates,
            } => dates
                .iter()
                .map(|date| DaySiteStatus::locked(work_line_id.as_str(), *date).id())
                .collect(),
            _ => Vec::new(),
        };
        let body = Json(ErrorBody {
            error: err.kind(),
            message: err.to_string(),
            cells,
        });
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct CellPayload {
    #[serde(default)]
    member_ids: Vec<MemberId>,
    #[serde(default)]
    is_holiday: Option<bool>,
    /// When given, the holiday flag follows the cell's weekday instead.
    #[serde(default)]
    holiday_weekdays: Option<HolidayWeekdays>,
}

#[derive(Debug, Deserialize)]
struct BulkPayload {
    member_ids: Vec<MemberId>,
    start: String,
    end: String,
    #[serde(default)]
    holiday_weekdays: Option<HolidayWeekdays>,
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
struct NamePayload {
    name: String,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LockState {
    pub work_line_id: String,
    pub date: NaiveDate,
    pub locked: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/members", get(list_members))
        .route("/members/:id", put(put_member).delete(delete_member))
        .route("/work-lines", get(list_work_lines))
        .route("/work-lines/:id", put(put_work_line))
        .route(
            "/work-lines/:id/cells/:date",
            get(get_cell).put(put_cell),
        )
        .route("/work-lines/:id/bulk", post(bulk_assign))
        .route(
            "/work-lines/:id/locks/:date",
            get(get_lock).put(put_lock).delete(delete_lock),
        )
        .route("/grid", get(get_grid))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "crew-roster HTTP API listening");
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_members(State(state): State<AppState>) -> Result<Json<Vec<Member>>, ApiError> {
    Ok(Json(state.roster().members()?))
}

async fn put_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(member_id): Path<String>,
    Json(payload): Json<NamePayload>,
) -> Result<Json<Member>, ApiError> {
    let member = Member::new(member_id, payload.name);
    state.roster().upsert_member(&caller(&headers), &member)?;
    Ok(Json(member))
}

async fn delete_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(member_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state.roster().delete_member(&caller(&headers), &member_id)?;
    if !removed {
        return Err(RosterError::NotFound {
            kind: "member",
            id: member_id,
        }
        .into());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_work_lines(State(state): State<AppState>) -> Result<Json<Vec<WorkLine>>, ApiError> {
    Ok(Json(state.roster().work_lines()?))
}

async fn put_work_line(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(work_line_id): Path<String>,
    Json(payload): Json<NamePayload>,
) -> Result<Json<WorkLine>, ApiError> {
    let work_line = WorkLine {
        id: work_line_id,
        project_id: payload.project_id,
        name: payload.name,
        color: payload.color,
    };
    state
        .roster()
        .upsert_work_line(&caller(&headers), &work_line)?;
    Ok(Json(work_line))
}

async fn get_cell(
    State(state): State<AppState>,
    Path((work_line_id, date)): Path<(String, String)>,
) -> Result<Json<Vec<Assignment>>, ApiError> {
    let date = parse_date(&date)?;
    Ok(Json(state.roster().cell_assignments(&work_line_id, date)?))
}

async fn put_cell(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((work_line_id, date)): Path<(String, String)>,
    Json(payload): Json<CellPayload>,
) -> Result<Json<Vec<Assignment>>, ApiError> {
    let date = parse_date(&date)?;
    let auth = caller(&headers);
    let roster = state.roster();
    let records = match &payload.holiday_weekdays {
        Some(holidays) => {
            roster.apply_cell_with_policy(&auth, &work_line_id, date, &payload.member_ids, holidays)?
        }
        None => roster.apply_cell(
            &auth,
            &work_line_id,
            date,
            &payload.member_ids,
            payload.is_holiday.unwrap_or(false),
        )?,
    };
    Ok(Json(records))
}

async fn bulk_assign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(work_line_id): Path<String>,
    Json(payload): Json<BulkPayload>,
) -> Result<(StatusCode, Json<Vec<Assignment>>), ApiError> {
    let request = BulkAssignment::new(
        work_line_id,
        payload.member_ids,
        parse_date(&payload.start)?,
        parse_date(&payload.end)?,
    )
    .with_holidays(
        payload
            .holiday_weekdays
            .unwrap_or_else(|| state.default_holidays.clone()),
    );
    let records = state.roster().bulk_assign(&caller(&headers), &request)?;
    Ok((StatusCode::CREATED, Json(records)))
}

async fn get_lock(
    State(state): State<AppState>,
    Path((work_line_id, date)): Path<(String, String)>,
) -> Result<Json<LockState>, ApiError> {
    let date = parse_date(&date)?;
    let locked = state.roster().is_locked(&work_line_id, date)?;
    Ok(Json(LockState {
        work_line_id,
        date,
        locked,
    }))
}

async fn put_lock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((work_line_id, date)): Path<(String, String)>,
) -> Result<Json<LockState>, ApiError> {
    let date = parse_date(&date)?;
    state.roster().lock(&caller(&headers), &work_line_id, date)?;
    Ok(Json(LockState {
        work_line_id,
        date,
        locked: true,
    }))
}

async fn delete_lock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((work_line_id, date)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let date = parse_date(&date)?;
    state
        .roster()
        .unlock(&caller(&headers), &work_line_id, date)?;
    info!(work_line = %work_line_id, date = %format_date(date), "unlock requested over http");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_grid(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<RosterGrid>, ApiError> {
    let start = parse_date(&range.start)?;
    let end = parse_date(&range.end)?;
    Ok(Json(state.roster().grid(start, end)?))
}
