//! Story runtime: the thin API surface over plan, generator and coordinator.

use crate::branch::{cache_at_path, cache_path};
use crate::error::{EngineError, Result};
use crate::generator::GenerateSpec;
use crate::models::{
    branch_key, Book, BookConfig, Candidate, Page, PendingVerify, StoryState, NEXT_BRANCH,
};
use crate::Engine;
use serde::{Deserialize, Serialize};
use store::{Filter, Update};
use tracing::info;

/// Read-only projection of a story handed to clients. Coordination state
/// (branch cache, pendings, verification records) is never exposed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub pages: Vec<Page>,
    pub index: i64,
    pub notes: Vec<String>,
    pub summary: String,
    pub turn: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_plan: Option<DebugPlan>,
}

/// Plan projection included in snapshots for authoring tools.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugPlan {
    pub cur_point: usize,
    pub cur_sub: usize,
    pub points: Vec<crate::models::Point>,
}

/// A `choose` call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceRequest {
    pub index: i64,
    #[serde(default)]
    pub option_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl Engine {
    /// Create an empty book owned by the given user.
    pub async fn create_book(&self, owner_id: &str) -> Result<Book> {
        let book = Book::new(owner_id);
        self.store.insert_one(serde_json::to_value(&book)?).await?;
        info!(book_id = %book.id, owner_id = %owner_id, "book created");
        Ok(book)
    }

    /// Load a book document.
    pub async fn load_book(&self, book_id: &str) -> Result<Book> {
        let doc = self
            .store
            .find_one(book_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("book {book_id}")))?;
        Ok(serde_json::from_value(doc)?)
    }

    /// All books owned by a user, newest first.
    pub async fn list_books(&self, owner_id: &str) -> Result<Vec<Book>> {
        self.store
            .list_for_owner(owner_id)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(EngineError::from))
            .collect()
    }

    /// Replace the book's free-text configuration.
    pub async fn update_config(&self, book_id: &str, config: BookConfig) -> Result<Book> {
        let matched = self
            .store
            .update_one(
                book_id,
                Filter::new(),
                Update::new()
                    .set("config", serde_json::to_value(&config)?)
                    .set("updatedAt", Self::now_ms()),
            )
            .await?;
        if matched == 0 {
            return Err(EngineError::NotFound(format!("book {book_id}")));
        }
        self.load_book(book_id).await
    }

    /// Project a book into its client-facing snapshot.
    pub fn snapshot(&self, book: &Book) -> Snapshot {
        let story = book.story.clone().unwrap_or_else(StoryState::new);
        Snapshot {
            pages: story.pages,
            index: story.index,
            notes: story.notes,
            summary: story.summary,
            turn: story.turn,
            debug_plan: book.plan.as_ref().map(|plan| DebugPlan {
                cur_point: plan.cur_point,
                cur_sub: plan.cur_sub,
                points: plan.points.clone(),
            }),
        }
    }

    /// Snapshot of the story, starting it transparently when no pages exist.
    pub async fn story(&self, book_id: &str) -> Result<Snapshot> {
        let book = self.load_book(book_id).await?;
        match &book.story {
            Some(story) if !story.pages.is_empty() => Ok(self.snapshot(&book)),
            _ => self.start(book_id).await,
        }
    }

    /// Generate and commit the opening page, then warm the caches.
    /// Returns the existing story when one is already underway.
    pub async fn start(&self, book_id: &str) -> Result<Snapshot> {
        let book = self.load_book(book_id).await?;
        if let Some(story) = &book.story {
            if !story.pages.is_empty() {
                return Ok(self.snapshot(&book));
            }
        }

        self.ensure_plan_ready(book_id).await?;
        self.store
            .update_one(
                book_id,
                Filter::new().exists("story", false),
                Update::new().set("story", serde_json::to_value(StoryState::new())?),
            )
            .await?;

        let book = self.load_book(book_id).await?;
        if book
            .story
            .as_ref()
            .map(|s| !s.pages.is_empty())
            .unwrap_or(false)
        {
            // A racing start committed the opening page first.
            return Ok(self.snapshot(&book));
        }

        let candidate = self
            .generate_page(
                &book,
                &GenerateSpec {
                    up_to_index: -1,
                    option_base_index: 0,
                    next_choice: None,
                    allow_options: true,
                },
            )
            .await?;
        let book = self.commit_page(book_id, -1, candidate, None).await?;
        info!(book_id = %book_id, "story started");

        self.spawn_precompute_next(book_id, 0);
        self.spawn_options_precompute(book_id, 0);
        Ok(self.snapshot(&book))
    }

    /// Advance linearly from `index`: commit the cached continuation when
    /// present, otherwise generate (joining or claiming through the
    /// coordinator) and commit.
    pub async fn next(&self, book_id: &str, index: i64) -> Result<Snapshot> {
        let book = self.load_book(book_id).await?;
        let story = book
            .story
            .as_ref()
            .ok_or_else(|| EngineError::bad_request("story not started"))?;
        if index < -1 || index > story.index {
            return Err(EngineError::bad_request(format!(
                "index {index} out of range"
            )));
        }

        let key = branch_key(index, NEXT_BRANCH);
        let book = match story.branch_cache.get(&key).cloned() {
            Some(candidate) => self.commit_page(book_id, index, candidate, Some(&key)).await?,
            None => {
                if !self.ensure_ready(book_id, index).await? {
                    return Err(EngineError::bad_request(
                        "plan is being updated, retry shortly",
                    ));
                }
                let book = self.load_book(book_id).await?;
                let cached = book
                    .story
                    .as_ref()
                    .and_then(|s| s.branch_cache.get(&key))
                    .cloned();
                match cached {
                    Some(candidate) => {
                        self.commit_page(book_id, index, candidate, Some(&key)).await?
                    }
                    None => {
                        // The entry vanished between readiness and commit;
                        // generate in the foreground.
                        self.verify_pending_before_next(book_id).await;
                        let book = self.ensure_plan_ready(book_id).await?;
                        let candidate = self
                            .generate_page(
                                &book,
                                &GenerateSpec {
                                    up_to_index: index,
                                    option_base_index: index + 1,
                                    next_choice: None,
                                    allow_options: true,
                                },
                            )
                            .await?;
                        self.commit_page(book_id, index, candidate, None).await?
                    }
                }
            }
        };

        let head = book.head_index();
        self.spawn_precompute_next(book_id, head);
        self.spawn_options_precompute(book_id, head);
        Ok(self.snapshot(&book))
    }

    /// Commit a reader choice at `index`, then adapt the plan in the
    /// background and only afterwards warm the caches for the new head.
    pub async fn choose(&self, book_id: &str, req: &ChoiceRequest) -> Result<Snapshot> {
        let index = req.index;
        let book = self.load_book(book_id).await?;
        let story = book
            .story
            .as_ref()
            .ok_or_else(|| EngineError::bad_request("story not started"))?;
        if index < 0 || index > story.index {
            return Err(EngineError::bad_request(format!(
                "index {index} out of range"
            )));
        }
        let page = story
            .page_at(index)
            .ok_or_else(|| EngineError::bad_request(format!("no page at index {index}")))?;

        // Resolve the choice text: a matching option id wins, free text is
        // the fallback.
        let by_id = req.option_id.as_ref().and_then(|option_id| {
            let position = page
                .option_ids
                .as_ref()?
                .iter()
                .position(|id| id == option_id)?;
            page.options.as_ref()?.get(position).cloned()
        });
        let choice = by_id
            .or_else(|| req.text.clone())
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| EngineError::bad_request("choice resolves to nothing"))?;

        let key = req.option_id.as_ref().map(|id| branch_key(index, id));
        let cached = key
            .as_ref()
            .and_then(|k| story.branch_cache.get(k))
            .cloned();
        let book = match cached {
            Some(candidate) => {
                self.commit_page(book_id, index, candidate, key.as_deref())
                    .await?
            }
            None => {
                self.verify_pending_before_next(book_id).await;
                let book = self.ensure_plan_ready(book_id).await?;
                let candidate = self
                    .generate_page(
                        &book,
                        &GenerateSpec {
                            up_to_index: index,
                            option_base_index: index + 1,
                            next_choice: Some(choice.clone()),
                            allow_options: true,
                        },
                    )
                    .await?;
                self.commit_page(book_id, index, candidate, None).await?
            }
        };

        let head = book.head_index();
        let committed = book.story.as_ref().and_then(|s| s.page_at(head)).cloned();

        // One adaptation at a time; precompute for the new head waits until
        // it finishes so the next generation sees the adapted plan.
        let claimed = self
            .store
            .update_one(
                book_id,
                Filter::new().eq("planUpdating", false),
                Update::new().set("planUpdating", true),
            )
            .await?;
        if claimed == 1 {
            if let Some(committed) = committed {
                let engine = self.clone();
                let book_id = book_id.to_string();
                tokio::spawn(async move {
                    engine
                        .adapt_plan_after_choice(&book_id, &choice, &committed)
                        .await;
                    engine.spawn_precompute_next(&book_id, head);
                    engine.spawn_options_precompute(&book_id, head);
                });
            }
        }

        Ok(self.snapshot(&book))
    }

    /// Commit a candidate as the page after `from_index`.
    ///
    /// Forward pages are discarded (single live timeline), the consumed
    /// cache entry retires, notes merge in order without duplicates, and
    /// any sub-step focus becomes the next pending verification.
    pub(crate) async fn commit_page(
        &self,
        book_id: &str,
        from_index: i64,
        candidate: Candidate,
        consumed_key: Option<&str>,
    ) -> Result<Book> {
        let book = self.load_book(book_id).await?;
        let story = book.story.clone().unwrap_or_else(StoryState::new);

        let keep = (from_index + 1).max(0) as usize;
        let mut pages: Vec<Page> = story.pages.into_iter().take(keep).collect();
        let page = candidate.page.clone();
        pages.push(page.clone());

        let mut notes = story.notes;
        for note in candidate.notes_delta {
            if !notes.contains(&note) {
                notes.push(note);
            }
        }

        let mut update = Update::new()
            .set("story.pages", serde_json::to_value(&pages)?)
            .set("story.index", from_index + 1)
            .set("story.summary", page.summary.clone())
            .set("story.notes", serde_json::to_value(&notes)?)
            .set("story.turn", story.turn + 1)
            .set("updatedAt", Self::now_ms());
        update = match &candidate.sub_to_check {
            Some(sub) => update.set(
                "story.pendingVerify",
                serde_json::to_value(PendingVerify {
                    passage: page.passage.clone(),
                    sub_text: sub.text.clone(),
                    point_index: sub.point_index,
                    sub_index: sub.sub_index,
                })?,
            ),
            None => update.unset("story.pendingVerify"),
        };
        if let Some(key) = consumed_key {
            update = update.unset(cache_path(key)).unset(cache_at_path(key));
        }

        let matched = self.store.update_one(book_id, Filter::new(), update).await?;
        if matched == 0 {
            return Err(EngineError::NotFound(format!("book {book_id}")));
        }

        self.prune_forward(book_id).await?;
        self.load_book(book_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Plan;

    #[test]
    fn test_snapshot_hides_coordination_state() {
        let snapshot = Snapshot {
            pages: vec![],
            index: -1,
            notes: vec![],
            summary: String::new(),
            turn: 0,
            debug_plan: Some(DebugPlan {
                cur_point: 0,
                cur_sub: 1,
                points: vec![],
            }),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("branchCache").is_none());
        assert!(json.get("branchCacheAt").is_none());
        assert!(json.get("branchPending").is_none());
        assert!(json.get("pendingVerify").is_none());
        assert_eq!(json["debugPlan"]["curSub"], 1);
    }

    #[test]
    fn test_choice_request_deserializes_camel_case() {
        let req: ChoiceRequest =
            serde_json::from_str(r#"{"index": 1, "optionId": "1-deadbeef"}"#).unwrap();
        assert_eq!(req.index, 1);
        assert_eq!(req.option_id.as_deref(), Some("1-deadbeef"));
        assert!(req.text.is_none());
    }

    #[test]
    fn test_plan_projection_fields() {
        let plan = Plan {
            overall_idea: "i".to_string(),
            conflict: "c".to_string(),
            points: vec![],
            cur_point: 2,
            cur_sub: 0,
        };
        let debug = DebugPlan {
            cur_point: plan.cur_point,
            cur_sub: plan.cur_sub,
            points: plan.points.clone(),
        };
        let json = serde_json::to_value(&debug).unwrap();
        assert_eq!(json["curPoint"], 2);
    }
}
