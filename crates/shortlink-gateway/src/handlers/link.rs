use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use jiff::Timestamp;
use shortlink_core::{Link, LinkVisit, ShortCode};
use shortlink_service::LinkError;
use tracing::debug;

use crate::error::Result;
use crate::extract::{CallerIdentity, VisitContext};
use crate::model::{LinkRequest, LinkResponse};
use crate::state::AppState;

/// Path segments that cannot be a short code answer 404 without a lookup.
fn parse_code(hash: String) -> Result<ShortCode> {
    Ok(ShortCode::parse(hash).map_err(LinkError::from)?)
}

fn link_response(state: &AppState, link: Link) -> Json<LinkResponse> {
    let short_url = state.short_url(&link.hash);
    Json(LinkResponse { link, short_url })
}

pub async fn resolve_handler(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    visit: VisitContext,
) -> Result<Response> {
    let code = parse_code(hash)?;
    let original_url = state.links().resolve(&code).await?;
    debug!(code = %code, "redirecting");

    state.visits().record(LinkVisit {
        hash: code,
        original_url: original_url.clone(),
        client_addr: visit.client_addr,
        referer: visit.referer,
        user_agent: visit.user_agent,
        agent: visit.agent,
        accept_language: visit.accept_language,
        accessed_at: Timestamp::now(),
    });

    Ok((StatusCode::FOUND, [(header::LOCATION, original_url)]).into_response())
}

pub async fn create_link_handler(
    State(state): State<AppState>,
    CallerIdentity(owner_id): CallerIdentity,
    Json(request): Json<LinkRequest>,
) -> Result<(StatusCode, Json<LinkResponse>)> {
    let link = state
        .links()
        .create(&request.original_url, &owner_id)
        .await?;
    Ok((StatusCode::CREATED, link_response(&state, link)))
}

pub async fn update_link_handler(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    CallerIdentity(owner_id): CallerIdentity,
    Json(request): Json<LinkRequest>,
) -> Result<Json<LinkResponse>> {
    let code = parse_code(hash)?;
    let link = state
        .links()
        .update(&code, &request.original_url, &owner_id)
        .await?;
    Ok(link_response(&state, link))
}

pub async fn delete_link_handler(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    CallerIdentity(owner_id): CallerIdentity,
) -> Result<StatusCode> {
    let code = parse_code(hash)?;
    state.links().delete(&code, &owner_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
