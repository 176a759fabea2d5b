//! Branch cache coordination.
//!
//! Speculative continuations live in `story.branchCache` keyed by
//! `"{index}:{branch}"`. The right to populate a key is a claim in
//! `story.branchPending`, taken and released purely through conditional
//! updates on the book document, so foreground readers and background
//! precompute workers in any process coordinate without locks. A claim
//! whose timestamp ages past the staleness threshold is abandoned work and
//! may be taken over on a CAS of the observed timestamp.

use crate::error::{EngineError, Result};
use crate::generator::GenerateSpec;
use crate::models::{branch_key, branch_key_index, StoryState, NEXT_BRANCH};
use crate::Engine;
use serde::Serialize;
use std::collections::BTreeMap;
use store::{Filter, Update};
use tracing::{debug, warn};

pub(crate) fn cache_path(key: &str) -> String {
    format!("story.branchCache.{key}")
}

pub(crate) fn cache_at_path(key: &str) -> String {
    format!("story.branchCacheAt.{key}")
}

pub(crate) fn pending_path(key: &str) -> String {
    format!("story.branchPending.{key}")
}

/// Client-facing readiness report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    /// The linear continuation is cached and fresh.
    pub next: bool,
    /// Per-option readiness for the page's choices.
    pub options: BTreeMap<String, bool>,
}

impl Engine {
    fn is_fresh(&self, story: &StoryState, key: &str, now: i64) -> bool {
        story.branch_cache.contains_key(key)
            && story
                .branch_cache_at
                .get(key)
                .map(|at| now - at <= self.config.stale_ms())
                .unwrap_or(false)
    }

    /// Blocking readiness primitive for the linear continuation of `index`.
    ///
    /// Returns `Ok(true)` once the cache holds a fresh candidate — either
    /// found, generated by this caller under a claim, or produced by
    /// another worker we waited on. Returns `Ok(false)` without waiting
    /// while a plan adaptation is running. Waiting on someone else's
    /// generation gives up with [`EngineError::Timeout`].
    pub async fn ensure_ready(&self, book_id: &str, index: i64) -> Result<bool> {
        let key = branch_key(index, NEXT_BRANCH);
        let deadline = tokio::time::Instant::now() + self.config.wait_timeout;

        loop {
            let book = self.load_book(book_id).await?;
            if book.plan_updating {
                return Ok(false);
            }
            let story = book
                .story
                .as_ref()
                .ok_or_else(|| EngineError::bad_request("story not started"))?;
            if index < -1 || index > story.index {
                return Err(EngineError::bad_request(format!(
                    "index {index} out of range"
                )));
            }

            let now = Self::now_ms();
            if let Some(at) = story.branch_cache_at.get(&key).copied() {
                if story.branch_cache.contains_key(&key) {
                    if now - at <= self.config.stale_ms() {
                        return Ok(true);
                    }
                    // Stale entry: clear it, conditional on its timestamp.
                    self.store
                        .update_one(
                            book_id,
                            Filter::new().eq(cache_at_path(&key), at),
                            Update::new()
                                .unset(cache_path(&key))
                                .unset(cache_at_path(&key)),
                        )
                        .await?;
                    continue;
                }
            }

            if self.try_claim(book_id, &key, now).await? {
                match self.generate_into_cache(book_id, index, &key, None, now).await {
                    Ok(true) => return Ok(true),
                    Ok(false) => continue,
                    Err(err) => {
                        self.release_claim(book_id, &key).await;
                        return Err(err);
                    }
                }
            }

            // Someone else holds the claim; take over once it goes stale.
            if let Some(ts) = story.branch_pending.get(&key).copied() {
                if now - ts > self.config.stale_ms() {
                    let matched = self
                        .store
                        .update_one(
                            book_id,
                            Filter::new().eq(pending_path(&key), ts),
                            Update::new().set(pending_path(&key), now),
                        )
                        .await?;
                    if matched == 1 {
                        match self
                            .generate_into_cache(book_id, index, &key, None, now)
                            .await
                        {
                            Ok(true) => return Ok(true),
                            Ok(false) => continue,
                            Err(err) => {
                                self.release_claim(book_id, &key).await;
                                return Err(err);
                            }
                        }
                    }
                    continue;
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(EngineError::Timeout(key));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Claim the pending slot: only when the cache entry is absent, nobody
    /// else is generating, and no plan adaptation is running.
    async fn try_claim(&self, book_id: &str, key: &str, now: i64) -> Result<bool> {
        let matched = self
            .store
            .update_one(
                book_id,
                Filter::new()
                    .exists(cache_path(key), false)
                    .exists(pending_path(key), false)
                    .eq("planUpdating", false),
                Update::new().set(pending_path(key), now),
            )
            .await?;
        Ok(matched == 1)
    }

    async fn release_claim(&self, book_id: &str, key: &str) {
        let released = self
            .store
            .update_one(
                book_id,
                Filter::new(),
                Update::new().unset(pending_path(key)),
            )
            .await;
        if let Err(err) = released {
            warn!(book_id = %book_id, key = %key, error = %err, "failed to release claim");
        }
    }

    /// Owner-side generation: run the deferred verifier, generate, publish
    /// the candidate, release the claim — all keyed to the claim timestamp
    /// so a takeover's overwrite wins and our late result is discarded.
    ///
    /// Returns `Ok(false)` when the publish lost the claim.
    async fn generate_into_cache(
        &self,
        book_id: &str,
        index: i64,
        key: &str,
        choice: Option<&str>,
        claim_ts: i64,
    ) -> Result<bool> {
        self.verify_pending_before_next(book_id).await;
        let book = self.ensure_plan_ready(book_id).await?;

        let candidate = self
            .generate_page(
                &book,
                &GenerateSpec {
                    up_to_index: index,
                    option_base_index: index + 1,
                    next_choice: choice.map(str::to_string),
                    allow_options: true,
                },
            )
            .await?;

        let matched = self
            .store
            .update_one(
                book_id,
                Filter::new().eq(pending_path(key), claim_ts),
                Update::new()
                    .set(cache_path(key), serde_json::to_value(&candidate)?)
                    .set(cache_at_path(key), Self::now_ms())
                    .unset(pending_path(key)),
            )
            .await?;
        Ok(matched == 1)
    }

    /// Fire-and-forget precompute of the linear continuation of `index`.
    pub fn spawn_precompute_next(&self, book_id: &str, index: i64) {
        let engine = self.clone();
        let book_id = book_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = engine
                .precompute_branch(&book_id, index, NEXT_BRANCH, None)
                .await
            {
                debug!(book_id = %book_id, index, error = %err, "next-precompute failed");
            }
        });
    }

    /// Fire-and-forget precompute of per-option continuations.
    pub fn spawn_precompute_branches(
        &self,
        book_id: &str,
        index: i64,
        options: Vec<(String, String)>,
    ) {
        for (option_id, text) in options {
            let engine = self.clone();
            let book_id = book_id.to_string();
            tokio::spawn(async move {
                if let Err(err) = engine
                    .precompute_branch(&book_id, index, &option_id, Some(text))
                    .await
                {
                    debug!(
                        book_id = %book_id,
                        index,
                        option_id = %option_id,
                        error = %err,
                        "option-precompute failed"
                    );
                }
            });
        }
    }

    /// Claim-and-generate for one branch; silently declines when the entry
    /// is fresh, someone else is generating, or the plan is being adapted.
    /// A stale entry is refreshed: cleared on its timestamp, then claimed.
    async fn precompute_branch(
        &self,
        book_id: &str,
        index: i64,
        branch: &str,
        choice: Option<String>,
    ) -> Result<()> {
        let key = branch_key(index, branch);
        let book = self.load_book(book_id).await?;
        if book.plan_updating {
            return Ok(());
        }
        let Some(story) = &book.story else {
            return Ok(());
        };

        let now = Self::now_ms();
        if let Some(at) = story.branch_cache_at.get(&key).copied() {
            if self.is_fresh(story, &key, now) {
                return Ok(());
            }
            self.store
                .update_one(
                    book_id,
                    Filter::new().eq(cache_at_path(&key), at),
                    Update::new()
                        .unset(cache_path(&key))
                        .unset(cache_at_path(&key)),
                )
                .await?;
        }

        if !self.try_claim(book_id, &key, now).await? {
            return Ok(());
        }
        match self
            .generate_into_cache(book_id, index, &key, choice.as_deref(), now)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                self.release_claim(book_id, &key).await;
                Err(err)
            }
        }
    }

    /// Spawn option precompute for the page at `index` without blocking.
    pub fn spawn_options_precompute(&self, book_id: &str, index: i64) {
        let engine = self.clone();
        let book_id = book_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = engine.ensure_options_precompute(&book_id, index).await {
                debug!(book_id = %book_id, index, error = %err, "options precompute failed");
            }
        });
    }

    /// Kick off precompute for every option of `pages[index]` whose cache
    /// entry is absent or stale.
    pub(crate) async fn ensure_options_precompute(
        &self,
        book_id: &str,
        index: i64,
    ) -> Result<()> {
        let book = self.load_book(book_id).await?;
        let Some(story) = &book.story else {
            return Ok(());
        };
        let Some(page) = story.page_at(index) else {
            return Ok(());
        };
        let (Some(options), Some(option_ids)) = (&page.options, &page.option_ids) else {
            return Ok(());
        };

        let now = Self::now_ms();
        let missing: Vec<(String, String)> = option_ids
            .iter()
            .zip(options.iter())
            .filter(|(id, _)| !self.is_fresh(story, &branch_key(index, id), now))
            .map(|(id, text)| (id.clone(), text.clone()))
            .collect();

        self.spawn_precompute_branches(book_id, index, missing);
        Ok(())
    }

    /// Readiness report: blocks on the linear continuation, never on the
    /// options — their precompute is spawned and their state just read.
    pub async fn readiness(&self, book_id: &str, index: i64) -> Result<Readiness> {
        self.spawn_options_precompute(book_id, index);

        let next = self.ensure_ready(book_id, index).await?;

        let book = self.load_book(book_id).await?;
        let mut options = BTreeMap::new();
        if let Some(story) = &book.story {
            if let Some(option_ids) = story.page_at(index).and_then(|p| p.option_ids.as_ref()) {
                let now = Self::now_ms();
                for id in option_ids {
                    let fresh = self.is_fresh(story, &branch_key(index, id), now);
                    options.insert(id.clone(), fresh);
                }
            }
        }

        Ok(Readiness { next, options })
    }

    /// Retire every cache entry strictly ahead of the committed head.
    /// Historical entries stay; siblings at the head index stay too and are
    /// re-pruned by later commits.
    pub(crate) async fn prune_forward(&self, book_id: &str) -> Result<()> {
        let book = self.load_book(book_id).await?;
        let Some(story) = &book.story else {
            return Ok(());
        };

        let mut update = Update::new();
        for key in story.branch_cache.keys().chain(story.branch_cache_at.keys()) {
            if branch_key_index(key)
                .map(|i| i > story.index)
                .unwrap_or(false)
            {
                update = update.unset(cache_path(key)).unset(cache_at_path(key));
            }
        }
        if !update.is_empty() {
            self.store.update_one(book_id, Filter::new(), update).await?;
        }
        Ok(())
    }
}
