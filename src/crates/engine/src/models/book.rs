//! Book document model.

use crate::models::plan::Plan;
use crate::models::story::StoryState;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-text authoring configuration for a book.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookConfig {
    /// First source-book title the story draws tone from.
    #[serde(default)]
    pub book_one: String,

    /// Second source-book title.
    #[serde(default)]
    pub book_two: String,

    /// World description.
    #[serde(default)]
    pub world: String,

    /// Main character description.
    #[serde(default)]
    pub main_character: String,

    /// Genre.
    #[serde(default)]
    pub genre: String,
}

/// One narrative under authoring; the unit of ownership and coordination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Unique book identifier (UUID string).
    pub id: String,

    /// Owning user id.
    pub owner_id: String,

    #[serde(default)]
    pub config: BookConfig,

    /// Creation timestamp (Unix millis).
    pub created_at: i64,

    /// Last update timestamp (Unix millis).
    pub updated_at: i64,

    /// Narrative outline, created lazily on first generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,

    /// Story progress, created on first page commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story: Option<StoryState>,

    /// True while a background plan adaptation is running. New generations
    /// are refused for the book until it clears.
    #[serde(default)]
    pub plan_updating: bool,
}

impl Book {
    /// Create a new empty book for the given owner.
    pub fn new(owner_id: impl Into<String>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            config: BookConfig::default(),
            created_at: now,
            updated_at: now,
            plan: None,
            story: None,
            plan_updating: false,
        }
    }

    /// Index of the most recently committed page, or -1 before the first.
    pub fn head_index(&self) -> i64 {
        self.story.as_ref().map(|s| s.index).unwrap_or(-1)
    }
}
