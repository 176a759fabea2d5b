//! Story endpoint handlers: snapshots, readiness, advancing, choosing.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::api::{
    error::ApiResult,
    handlers::books::owned_book,
    middleware::auth::AuthUser,
    models::{NextRequest, ReadyQuery, ReadyResponse},
    routes::AppState,
};
use engine::{ChoiceRequest, Snapshot};

/// Story snapshot, starting the story transparently when no pages exist.
///
/// GET /api/books/:id/story
pub async fn get_story(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(book_id): Path<String>,
) -> ApiResult<Json<Snapshot>> {
    owned_book(&state, &user_id, &book_id).await?;
    Ok(Json(state.engine.story(&book_id).await?))
}

/// Start the story; returns the existing one when already underway.
///
/// POST /api/books/:id/story/start
pub async fn start_story(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(book_id): Path<String>,
) -> ApiResult<Json<Snapshot>> {
    owned_book(&state, &user_id, &book_id).await?;
    Ok(Json(state.engine.start(&book_id).await?))
}

/// Readiness gate for the client's Next/choice buttons. Blocks on the
/// linear continuation (generating it if nobody else is), never on the
/// options.
///
/// GET /api/books/:id/story/ready?index=N
pub async fn ready(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(book_id): Path<String>,
    Query(query): Query<ReadyQuery>,
) -> ApiResult<Json<ReadyResponse>> {
    owned_book(&state, &user_id, &book_id).await?;
    let ready = state.engine.readiness(&book_id, query.index).await?;
    Ok(Json(ReadyResponse { ready }))
}

/// Advance linearly from the given page.
///
/// POST /api/books/:id/story/next
pub async fn next_page(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(book_id): Path<String>,
    Json(body): Json<NextRequest>,
) -> ApiResult<Json<Snapshot>> {
    owned_book(&state, &user_id, &book_id).await?;
    Ok(Json(state.engine.next(&book_id, body.index).await?))
}

/// Commit a reader choice.
///
/// POST /api/books/:id/story/choose
pub async fn choose(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(book_id): Path<String>,
    Json(body): Json<ChoiceRequest>,
) -> ApiResult<Json<Snapshot>> {
    owned_book(&state, &user_id, &book_id).await?;
    Ok(Json(state.engine.choose(&book_id, &body).await?))
}
