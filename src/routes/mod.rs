use axum::extract::rejection::JsonRejection;
use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub mod advocates;
pub mod cases;
pub mod clients;
pub mod documents;
pub mod health;

/// Multipart envelope ceiling. The file part itself is capped while it is
/// spooled, so this only bounds what gets drained from the socket.
const REQUEST_BODY_LIMIT: usize = 1024 * 1024 * 512;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .filter_map(|value| match value.parse::<HeaderValue>() {
                Ok(header) => Some(header),
                Err(_) => {
                    warn!(origin = %value, "ignoring invalid CORS allowed origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
    };

    let advocate_routes = Router::new()
        .route("/", post(advocates::register_advocate))
        .route("/:id", get(advocates::get_advocate))
        .route("/:id/cases", get(advocates::list_advocate_cases));

    let client_routes = Router::new()
        .route("/", post(clients::register_client))
        .route("/:id", get(clients::get_client));

    let case_routes = Router::new()
        .route("/", post(cases::register_case))
        .route("/:id", get(cases::get_case))
        .route("/:id/documents", get(cases::list_case_documents));

    let document_routes = Router::new()
        .route("/", post(documents::upload_document))
        .route(
            "/:id",
            get(documents::get_document).delete(documents::delete_document),
        );

    Router::new()
        .nest("/api/advocates", advocate_routes)
        .nest("/api/clients", client_routes)
        .nest("/api/cases", case_routes)
        .nest("/api/documents", document_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(REQUEST_BODY_LIMIT))
}

/// Turns axum's plain-text JSON rejection into a categorized error body.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::invalid_input(rejection.body_text()))
}
