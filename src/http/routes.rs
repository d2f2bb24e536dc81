//! HTTP routes: landing page, room page (create/join), health.

use askama::Template;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::room::hub::HubHandle;
use crate::util::id::new_room_token;

#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate;

#[derive(Template)]
#[template(path = "room.html")]
struct RoomTemplate {
    token: String,
    name: String,
}

pub async fn index() -> impl IntoResponse {
    IndexTemplate
}

pub async fn healthz() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
pub struct RoomQuery {
    pub name: String,
    #[serde(default)]
    pub token: String,
}

/// Room page. An empty token mints a fresh code and opens the room; a given
/// token must name a live room.
pub async fn room_page(
    State(state): State<AppState>,
    Query(RoomQuery { name, token }): Query<RoomQuery>,
) -> impl IntoResponse {
    if name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "name required").into_response();
    }

    if token.is_empty() {
        let token = loop {
            let candidate = new_room_token();
            if !state.hub.room_exists(&candidate) {
                break candidate;
            }
        };
        if let Err(e) = state.hub.create_or_get(&token).await {
            tracing::error!(error = %e, "room registry unavailable");
            return (StatusCode::SERVICE_UNAVAILABLE, "registry unavailable").into_response();
        }
        tracing::info!(%token, "room created");
        return RoomTemplate { token, name }.into_response();
    }

    if !state.hub.room_exists(&token) {
        return (StatusCode::NOT_FOUND, "no such room").into_response();
    }
    RoomTemplate { token, name }.into_response()
}
