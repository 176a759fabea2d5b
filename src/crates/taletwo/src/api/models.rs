//! Request and response bodies for the API surface.

use engine::models::{Book, BookConfig};
use engine::Snapshot;
use serde::{Deserialize, Serialize};

/// `POST /api/books` response.
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

/// One entry of `GET /api/books`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: String,
    pub config: BookConfig,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BookSummary {
    pub fn from_book(book: &Book) -> Self {
        Self {
            id: book.id.clone(),
            config: book.config.clone(),
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// Full book document as exposed to its owner. The story rides along as a
/// snapshot projection, so coordination state stays internal.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: String,
    pub owner_id: String,
    pub config: BookConfig,
    pub created_at: i64,
    pub updated_at: i64,
    pub plan_updating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story: Option<Snapshot>,
}

impl BookResponse {
    pub fn from_book(book: &Book, story: Option<Snapshot>) -> Self {
        Self {
            id: book.id.clone(),
            owner_id: book.owner_id.clone(),
            config: book.config.clone(),
            created_at: book.created_at,
            updated_at: book.updated_at,
            plan_updating: book.plan_updating,
            story,
        }
    }
}

/// `POST /story/next` body.
#[derive(Debug, Deserialize)]
pub struct NextRequest {
    pub index: i64,
}

/// `GET /story/ready` query.
#[derive(Debug, Deserialize)]
pub struct ReadyQuery {
    pub index: i64,
}

/// `GET /story/ready` response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: engine::Readiness,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_response_omits_empty_story() {
        let book = Book::new("user-1");
        let response = BookResponse::from_book(&book, None);
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("story").is_none());
        assert_eq!(json["ownerId"], "user-1");
        assert_eq!(json["planUpdating"], false);
    }
}
