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
use crate::pipeline::to_iso;
use crate::registry;
use crate::state::AppState;
use crate::validation::parse_id;

#[derive(Deserialize)]
pub struct RegisterClientRequest {
    pub name: String,
    pub contact_number: String,
    pub address: String,
}

#[derive(Serialize)]
pub struct RegisterClientResponse {
    pub client_id: Uuid,
}

#[derive(Serialize)]
pub struct ClientResponse {
    pub id: Uuid,
    pub name: String,
    pub contact_number: String,
    pub address: String,
    pub created_at: String,
}

pub async fn register_client(
    State(state): State<AppState>,
    payload: Result<Json<RegisterClientRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RegisterClientResponse>)> {
    let payload = json_body(payload)?;
    let mut conn = state.db()?;
    let client_id = registry::register_client(
        &mut conn,
        &payload.name,
        &payload.contact_number,
        &payload.address,
    )?;
    Ok((StatusCode::CREATED, Json(RegisterClientResponse { client_id })))
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> AppResult<Json<ClientResponse>> {
    let client_id = parse_id("client_id", &client_id)?;
    let mut conn = state.db()?;
    let client = registry::find_client(&mut conn, client_id)?;
    Ok(Json(ClientResponse {
        id: client.id,
        name: client.name,
        contact_number: client.contact_number,
        address: client.address,
        created_at: to_iso(client.created_at),
    }))
}
