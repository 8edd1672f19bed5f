// handlers.rs
use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use http::StatusCode;
use serde_json::json;

use crate::{
    accounts::{self, Credentials, Registration},
    context::RequestContext,
    error::{AppError, AppResult},
    extract::{JsonBody, PathParam},
    models::PollId,
    poll::{self, ListScope},
    results,
    state::AppState,
    store::{AccountStore, Store},
    validation::{Ballot, PollDraft, PollUpdate},
    vote,
};

type AppStateRef<S> = State<Arc<AppState<S>>>;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Register a new user
pub async fn register<S: Store>(
    State(state): AppStateRef<S>,
    JsonBody(registration): JsonBody<Registration>,
) -> AppResult<impl IntoResponse> {
    let user = accounts::register(&state.store, &registration, Utc::now()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": user,
        })),
    ))
}

/// Exchange email and password for a bearer token
pub async fn login<S: Store>(
    State(state): AppStateRef<S>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> AppResult<impl IntoResponse> {
    let ttl = Duration::hours(state.config.session_ttl_hours);
    let session = accounts::login(&state.store, &credentials, Utc::now(), ttl).await?;
    Ok(Json(session))
}

/// The authenticated user's own profile
pub async fn me<S: Store>(
    State(state): AppStateRef<S>,
    ctx: RequestContext,
) -> AppResult<impl IntoResponse> {
    let user = state
        .store
        .find_user(ctx.actor)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token.".to_string()))?;
    Ok(Json(user))
}

/// All active polls
pub async fn list_polls<S: Store>(
    State(state): AppStateRef<S>,
    ctx: RequestContext,
) -> AppResult<impl IntoResponse> {
    Ok(Json(poll::list_polls(&state.store, &ctx, ListScope::All).await?))
}

/// Polls created by the requester, including deactivated ones
pub async fn my_polls<S: Store>(
    State(state): AppStateRef<S>,
    ctx: RequestContext,
) -> AppResult<impl IntoResponse> {
    Ok(Json(poll::list_polls(&state.store, &ctx, ListScope::Mine).await?))
}

pub async fn create_poll<S: Store>(
    State(state): AppStateRef<S>,
    ctx: RequestContext,
    JsonBody(draft): JsonBody<PollDraft>,
) -> AppResult<impl IntoResponse> {
    let view = poll::create_poll(&state.store, &ctx, &draft).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_poll<S: Store>(
    State(state): AppStateRef<S>,
    ctx: RequestContext,
    PathParam(id): PathParam<PollId>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(poll::get_poll(&state.store, &ctx, id).await?))
}

pub async fn update_poll<S: Store>(
    State(state): AppStateRef<S>,
    ctx: RequestContext,
    PathParam(id): PathParam<PollId>,
    JsonBody(update): JsonBody<PollUpdate>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(poll::update_poll(&state.store, &ctx, id, &update).await?))
}

/// Soft delete
pub async fn delete_poll<S: Store>(
    State(state): AppStateRef<S>,
    ctx: RequestContext,
    PathParam(id): PathParam<PollId>,
) -> AppResult<StatusCode> {
    poll::deactivate_poll(&state.store, &ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_visibility<S: Store>(
    State(state): AppStateRef<S>,
    ctx: RequestContext,
    PathParam(id): PathParam<PollId>,
) -> AppResult<impl IntoResponse> {
    let visibility = poll::toggle_visibility(&state.store, &ctx, id).await?;
    Ok(Json(json!({ "result_visibility": visibility })))
}

pub async fn cast_vote<S: Store>(
    State(state): AppStateRef<S>,
    ctx: RequestContext,
    PathParam(id): PathParam<PollId>,
    JsonBody(ballot): JsonBody<Ballot>,
) -> AppResult<impl IntoResponse> {
    let vote = vote::cast_vote(&state.store, &ctx, id, &ballot).await?;
    Ok((StatusCode::CREATED, Json(vote)))
}

pub async fn poll_results<S: Store>(
    State(state): AppStateRef<S>,
    ctx: RequestContext,
    PathParam(id): PathParam<PollId>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(results::get_results(&state.store, &ctx, id).await?))
}
