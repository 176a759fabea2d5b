//! Deferred sub-step verification.
//!
//! A commit that dramatized a sub-step leaves a `pendingVerify` record on
//! the story; the record is judged immediately before the book's next
//! generation, whoever runs it. The record is claimed with a conditional
//! unset first, so concurrent generators run the check exactly once, and
//! every outcome (including model failure) leaves it cleared.

use crate::models::PendingVerify;
use crate::prompts;
use crate::schema::{self, Verdict};
use crate::Engine;
use llm::ReasoningEffort;
use store::{Filter, Update};
use tracing::debug;

/// How many preceding passages the verifier sees.
const CONTEXT_PAGES: usize = 3;

impl Engine {
    /// Run the pending verification for the book, if any. Never fails; a
    /// verdict the model refuses to give counts as not-done and the cursor
    /// simply stays put this turn.
    pub(crate) async fn verify_pending_before_next(&self, book_id: &str) {
        let Ok(book) = self.load_book(book_id).await else {
            return;
        };
        let Some(story) = &book.story else {
            return;
        };
        let Some(pending) = story.pending_verify.clone() else {
            return;
        };

        // Claim the record; a losing racer just skips.
        let claimed = self
            .store
            .update_one(
                book_id,
                Filter::new().exists("story.pendingVerify", true),
                Update::new().unset("story.pendingVerify"),
            )
            .await;
        if !matches!(claimed, Ok(1)) {
            return;
        }

        let done = self.judge(&book, &pending).await;
        debug!(
            book_id = %book_id,
            point = pending.point_index,
            sub = pending.sub_index,
            done,
            "sub-step verification"
        );
        if !done {
            return;
        }

        if let Some(plan) = &book.plan {
            if let Err(err) = self
                .advance_cursor(book_id, plan, pending.point_index, pending.sub_index)
                .await
            {
                debug!(book_id = %book_id, error = %err, "cursor advance failed");
            }
        }
    }

    async fn judge(&self, book: &crate::models::Book, pending: &PendingVerify) -> bool {
        let story = match &book.story {
            Some(story) => story,
            None => return false,
        };
        // The verified passage is the latest page; context is what preceded it.
        let recent: Vec<&str> = story
            .pages
            .iter()
            .rev()
            .skip(1)
            .take(CONTEXT_PAGES)
            .map(|p| p.passage.as_str())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let messages =
            prompts::verify_substep(&pending.passage, &pending.sub_text, &recent, &story.notes);
        let opts = self.chat_opts(
            "verify.substep",
            self.config.verifier_model.as_ref(),
            ReasoningEffort::Low,
        );

        match self.chat.chat(&messages, opts).await {
            Ok(reply) => schema::parse_reply::<Verdict>(&reply)
                .map(|verdict| verdict.done)
                .unwrap_or(false),
            Err(err) => {
                debug!(book_id = %book.id, error = %err, "verifier call failed");
                false
            }
        }
    }
}
