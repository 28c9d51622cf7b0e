use axum::extract::rejection::JsonRejection;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::json_body;
use crate::error::AppResult;
use crate::models::Case;
use crate::pipeline::{self, to_iso, DocumentSummary};
use crate::registry::{self, CaseRegistration};
use crate::state::AppState;
use crate::validation::{parse_filing_date, parse_id};

#[derive(Deserialize)]
pub struct RegisterCaseRequest {
    #[serde(alias = "case_name")]
    pub name: String,
    pub case_type: String,
    pub client_id: String,
    pub advocate_id: String,
    #[serde(default, alias = "case_description")]
    pub description: Option<String>,
    #[serde(default)]
    pub filing_date: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterCaseResponse {
    pub case_id: Uuid,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct CaseSummary {
    pub case_id: Uuid,
    pub name: String,
    pub case_type: String,
    pub description: Option<String>,
    pub filing_date: String,
    pub client_id: Uuid,
}

impl From<Case> for CaseSummary {
    fn from(case: Case) -> Self {
        Self {
            case_id: case.id,
            name: case.name,
            case_type: case.case_type,
            description: case.description,
            filing_date: to_iso(case.filing_date),
            client_id: case.client_id,
        }
    }
}

#[derive(Serialize)]
pub struct CaseDetailResponse {
    #[serde(flatten)]
    pub case: CaseSummary,
    pub advocate_ids: Vec<Uuid>,
}

pub async fn register_case(
    State(state): State<AppState>,
    payload: Result<Json<RegisterCaseRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RegisterCaseResponse>)> {
    let payload = json_body(payload)?;
    let registration = CaseRegistration {
        advocate_id: parse_id("advocate_id", &payload.advocate_id)?,
        client_id: parse_id("client_id", &payload.client_id)?,
        filing_date: payload
            .filing_date
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(parse_filing_date)
            .transpose()?,
        name: payload.name,
        case_type: payload.case_type,
        description: payload.description,
    };

    let mut conn = state.db()?;
    let case_id = registry::register_case(&mut conn, registration)?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterCaseResponse {
            case_id,
            message: "Case registered successfully",
        }),
    ))
}

pub async fn get_case(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> AppResult<Json<CaseDetailResponse>> {
    let case_id = parse_id("case_id", &case_id)?;
    let mut conn = state.db()?;
    let case = registry::find_case(&mut conn, case_id)?;
    let advocate_ids = registry::list_advocates_for_case(&mut conn, case_id)?;
    Ok(Json(CaseDetailResponse {
        case: CaseSummary::from(case),
        advocate_ids,
    }))
}

pub async fn list_case_documents(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> AppResult<Json<Vec<DocumentSummary>>> {
    Ok(Json(pipeline::list_case_documents(&state, &case_id)?))
}
