//! Plan lifecycle: generate, expand, intro-insert, advance, adapt.

use crate::error::{EngineError, Result};
use crate::models::{Book, Page, Plan, Point};
use crate::prompts;
use crate::schema::{self, PlanRevision, PlannerDraft, SubstepBatch};
use crate::Engine;
use llm::ReasoningEffort;
use store::{Filter, Update};
use tracing::{debug, warn};

/// Substep count bounds after expansion, and the ceiling intro insertion
/// aims to stay under.
const MAX_SUBSTEPS: usize = 7;

impl Engine {
    /// Make sure the book has a usable plan: points exist, every point has
    /// at least one sub-step, introductions have been inserted.
    ///
    /// Idempotent; every generator calls this before producing a page.
    pub async fn ensure_plan_ready(&self, book_id: &str) -> Result<Book> {
        let book = self.load_book(book_id).await?;
        if let Some(plan) = &book.plan {
            if !plan.points.is_empty() && plan.points.iter().all(|p| !p.substeps.is_empty()) {
                return Ok(book);
            }
        }

        if book.plan.is_none() {
            self.generate_points(&book).await?;
        }

        let book = self.load_book(book_id).await?;
        let plan = book
            .plan
            .clone()
            .ok_or_else(|| EngineError::schema("plan generation produced no plan"))?;

        if plan.points.iter().any(|p| p.substeps.is_empty()) {
            self.expand_substeps(&book, &plan).await?;
            self.insert_intro_substeps(book_id).await;
        }

        self.load_book(book_id).await
    }

    /// Planner call: overall idea, conflict, 6–9 points. First writer wins.
    async fn generate_points(&self, book: &Book) -> Result<()> {
        let messages = prompts::planner_points(&book.config);
        let opts = self.chat_opts(
            "planner.points",
            self.config.planner_model.as_ref(),
            ReasoningEffort::Medium,
        );
        let reply = self.chat.chat(&messages, opts).await?;
        let draft: PlannerDraft = schema::parse_reply(&reply)?;

        let points: Vec<Point> = draft
            .points
            .into_iter()
            .filter(|p| !p.title.trim().is_empty())
            .map(|p| Point {
                title: p.title,
                brief: p.brief,
                substeps: Vec::new(),
            })
            .collect();
        if points.len() < 3 {
            return Err(EngineError::schema(format!(
                "planner returned {} usable points, need at least 3",
                points.len()
            )));
        }

        let plan = Plan {
            overall_idea: draft.overall_idea,
            conflict: draft.conflict,
            points,
            cur_point: 0,
            cur_sub: 0,
        };

        let matched = self
            .store
            .update_one(
                &book.id,
                Filter::new().exists("plan", false),
                Update::new()
                    .set("plan", serde_json::to_value(&plan)?)
                    .set("updatedAt", Self::now_ms()),
            )
            .await?;
        if matched == 0 {
            debug!(book_id = %book.id, "another worker generated the plan first");
        }
        Ok(())
    }

    /// Expand all points to 3–6 sub-steps in a single call.
    async fn expand_substeps(&self, book: &Book, plan: &Plan) -> Result<()> {
        let messages = prompts::expand_substeps(&book.config, plan);
        let opts = self.chat_opts(
            "planner.substeps",
            self.config.planner_model.as_ref(),
            ReasoningEffort::Low,
        );
        let reply = self.chat.chat(&messages, opts).await?;
        let batch: SubstepBatch = schema::parse_reply(&reply)?;

        let mut points = plan.points.clone();
        for item in batch.items {
            let Some(point) = points.get_mut(item.index) else {
                continue;
            };
            let substeps = clean_substeps(item.substeps);
            if !substeps.is_empty() {
                point.substeps = substeps;
            }
        }
        if points.iter().any(|p| p.substeps.is_empty()) {
            return Err(EngineError::schema(
                "sub-step expansion left a point without sub-steps",
            ));
        }

        self.store
            .update_one(
                &book.id,
                Filter::new().exists("plan", true),
                Update::new().set("plan.points", serde_json::to_value(&points)?),
            )
            .await?;
        Ok(())
    }

    /// Ask the model to insert minimal introduction sub-steps.
    ///
    /// Non-destructive: a point's list is only replaced by a non-empty
    /// returned list. Failures are logged and swallowed.
    pub(crate) async fn insert_intro_substeps(&self, book_id: &str) {
        if let Err(err) = self.try_insert_intros(book_id).await {
            debug!(book_id = %book_id, error = %err, "intro insertion skipped");
        }
    }

    async fn try_insert_intros(&self, book_id: &str) -> Result<()> {
        let book = self.load_book(book_id).await?;
        let plan = book
            .plan
            .clone()
            .ok_or_else(|| EngineError::schema("no plan to insert intros into"))?;

        let messages = prompts::insert_intros(&book.config, &plan);
        let opts = self.chat_opts(
            "planner.intro",
            self.config.planner_model.as_ref(),
            ReasoningEffort::Low,
        );
        let reply = self.chat.chat(&messages, opts).await?;
        let batch: SubstepBatch = schema::parse_reply(&reply)?;

        let mut points = plan.points.clone();
        let mut changed = false;
        for item in batch.items {
            let Some(point) = points.get_mut(item.index) else {
                continue;
            };
            let substeps = clean_substeps(item.substeps);
            if !substeps.is_empty() {
                point.substeps = substeps;
                changed = true;
            }
        }
        if changed {
            self.store
                .update_one(
                    book_id,
                    Filter::new().exists("plan", true),
                    Update::new().set("plan.points", serde_json::to_value(&points)?),
                )
                .await?;
        }
        Ok(())
    }

    /// Advance the cursor past a verified sub-step.
    ///
    /// Conditional on the cursor still sitting at the verified position, so
    /// a concurrent plan adaptation wins and the cursor never moves
    /// backward.
    pub(crate) async fn advance_cursor(
        &self,
        book_id: &str,
        plan: &Plan,
        point_index: usize,
        sub_index: usize,
    ) -> Result<()> {
        let (next_point, next_sub) = plan.advanced_from(point_index, sub_index);
        self.store
            .update_one(
                book_id,
                Filter::new()
                    .eq("plan.curPoint", point_index as i64)
                    .eq("plan.curSub", sub_index as i64),
                Update::new()
                    .set("plan.curPoint", next_point as i64)
                    .set("plan.curSub", next_sub as i64),
            )
            .await?;
        Ok(())
    }

    /// Background plan adaptation after a choice commit.
    ///
    /// The caller has already set `planUpdating`; this always clears it.
    /// On any failure the prior plan stays in place.
    pub(crate) async fn adapt_plan_after_choice(
        &self,
        book_id: &str,
        choice: &str,
        committed_page: &Page,
    ) {
        if let Err(err) = self.try_adapt(book_id, choice, committed_page).await {
            warn!(book_id = %book_id, error = %err, "plan adaptation failed, keeping prior plan");
        }
        let cleared = self
            .store
            .update_one(
                book_id,
                Filter::new(),
                Update::new().set("planUpdating", false),
            )
            .await;
        if let Err(err) = cleared {
            warn!(book_id = %book_id, error = %err, "failed to clear planUpdating");
        }
    }

    async fn try_adapt(&self, book_id: &str, choice: &str, committed_page: &Page) -> Result<()> {
        let book = self.load_book(book_id).await?;
        let plan = book
            .plan
            .clone()
            .ok_or_else(|| EngineError::schema("no plan to adapt"))?;

        let messages = prompts::adapt_plan(&book.config, &plan, committed_page, choice);
        let opts = self.chat_opts(
            "plan.adapt",
            self.config.planner_model.as_ref(),
            ReasoningEffort::Medium,
        );
        let reply = self.chat.chat(&messages, opts).await?;
        let revision: PlanRevision = schema::parse_reply(&reply)?;

        let points: Vec<Point> = revision
            .points
            .into_iter()
            .filter(|p| !p.title.trim().is_empty())
            .map(|p| Point {
                title: p.title,
                brief: p.brief,
                substeps: clean_substeps(p.substeps),
            })
            .collect();
        if points.len() < 3 {
            return Err(EngineError::schema("adapted plan has fewer than 3 points"));
        }
        if points.iter().any(|p| p.substeps.is_empty()) {
            return Err(EngineError::schema("adapted plan has a point without sub-steps"));
        }

        let cur_point = revision.cur_point.min(points.len());
        let cur_sub = match points.get(cur_point) {
            Some(point) => revision.cur_sub.min(point.substeps.len() - 1),
            None => 0,
        };
        let revised = Plan {
            overall_idea: revision.overall_idea,
            conflict: revision.conflict,
            points,
            cur_point,
            cur_sub,
        };

        self.store
            .update_one(
                book_id,
                Filter::new(),
                Update::new()
                    .set("plan", serde_json::to_value(&revised)?)
                    .set("updatedAt", Self::now_ms()),
            )
            .await?;

        self.insert_intro_substeps(book_id).await;
        Ok(())
    }
}

fn clean_substeps(substeps: Vec<String>) -> Vec<String> {
    substeps
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_SUBSTEPS)
        .collect()
}
