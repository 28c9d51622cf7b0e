use axum::extract::rejection::JsonRejection;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cases::CaseSummary;
use super::json_body;
use crate::error::AppResult;
use crate::pipeline::to_iso;
use crate::registry;
use crate::state::AppState;
use crate::validation::parse_id;

#[derive(Deserialize)]
pub struct RegisterAdvocateRequest {
    pub name: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct RegisterAdvocateResponse {
    pub advocate_id: Uuid,
}

#[derive(Serialize)]
pub struct AdvocateResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: String,
}

pub async fn register_advocate(
    State(state): State<AppState>,
    payload: Result<Json<RegisterAdvocateRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RegisterAdvocateResponse>)> {
    let payload = json_body(payload)?;
    let mut conn = state.db()?;
    let advocate_id = registry::register_advocate(&mut conn, &payload.name, &payload.email)?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterAdvocateResponse { advocate_id }),
    ))
}

pub async fn get_advocate(
    State(state): State<AppState>,
    Path(advocate_id): Path<String>,
) -> AppResult<Json<AdvocateResponse>> {
    let advocate_id = parse_id("advocate_id", &advocate_id)?;
    let mut conn = state.db()?;
    let advocate = registry::find_advocate(&mut conn, advocate_id)?;
    Ok(Json(AdvocateResponse {
        id: advocate.id,
        name: advocate.name,
        email: advocate.email,
        created_at: to_iso(advocate.created_at),
    }))
}

pub async fn list_advocate_cases(
    State(state): State<AppState>,
    Path(advocate_id): Path<String>,
) -> AppResult<Json<Vec<CaseSummary>>> {
    let advocate_id = parse_id("advocate_id", &advocate_id)?;
    let mut conn = state.db()?;
    registry::find_advocate(&mut conn, advocate_id)?;
    let cases = registry::list_cases_for_advocate(&mut conn, advocate_id)?;
    Ok(Json(cases.into_iter().map(CaseSummary::from).collect()))
}
