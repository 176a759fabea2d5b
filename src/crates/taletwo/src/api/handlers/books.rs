//! Book CRUD endpoint handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::api::{
    error::{ApiError, ApiResult},
    middleware::auth::AuthUser,
    models::{BookResponse, BookSummary, CreatedResponse},
    routes::AppState,
};
use engine::models::{Book, BookConfig};

/// Load a book and enforce ownership.
pub(crate) async fn owned_book(
    state: &AppState,
    user_id: &str,
    book_id: &str,
) -> ApiResult<Book> {
    let book = state.engine.load_book(book_id).await?;
    if book.owner_id != user_id {
        return Err(ApiError::Forbidden("not your book".to_string()));
    }
    Ok(book)
}

/// Create an empty book.
///
/// POST /api/books
pub async fn create_book(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<impl axum::response::IntoResponse> {
    let book = state.engine.create_book(&user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse { id: book.id }),
    ))
}

/// List the caller's books.
///
/// GET /api/books
pub async fn list_books(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<BookSummary>>> {
    let books = state.engine.list_books(&user_id).await?;
    Ok(Json(books.iter().map(BookSummary::from_book).collect()))
}

/// Fetch one book.
///
/// GET /api/books/:id
pub async fn get_book(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(book_id): Path<String>,
) -> ApiResult<Json<BookResponse>> {
    let book = owned_book(&state, &user_id, &book_id).await?;
    let story = book.story.is_some().then(|| state.engine.snapshot(&book));
    Ok(Json(BookResponse::from_book(&book, story)))
}

/// Replace the book's free-text configuration.
///
/// PUT /api/books/:id
pub async fn update_book(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(book_id): Path<String>,
    Json(config): Json<BookConfig>,
) -> ApiResult<Json<BookResponse>> {
    owned_book(&state, &user_id, &book_id).await?;
    let book = state.engine.update_config(&book_id, config).await?;
    let story = book.story.is_some().then(|| state.engine.snapshot(&book));
    Ok(Json(BookResponse::from_book(&book, story)))
}
