//! Page generation: focus selection, prompt composition, output processing.

use crate::error::{EngineError, Result};
use crate::models::{make_option_id, Book, Candidate, Page, SubRef, SubToCheck};
use crate::prompts::{self, Focus, PagePrompt};
use crate::schema::{self, PageDraft};
use crate::Engine;
use llm::ReasoningEffort;
use rand::Rng;

/// How many prior passages ride along in the generation prompt.
const RECENT_PAGES: usize = 3;

/// A transition window covers the last this-many sub-steps of a point.
const TRANSITION_WINDOW: usize = 2;

/// Parameters for one page generation.
#[derive(Debug, Clone)]
pub struct GenerateSpec {
    /// Index of the page this continuation starts from; -1 for the opening.
    pub up_to_index: i64,

    /// Page index any generated options will appear on.
    pub option_base_index: i64,

    /// The player's choice, when this continuation follows one.
    pub next_choice: Option<String>,

    /// Whether the model may offer options on this page.
    pub allow_options: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusMode {
    Substep,
    World,
    Character,
}

fn roll_focus<R: Rng>(rng: &mut R, has_substep: bool) -> FocusMode {
    match rng.gen_range(0..3) {
        0 if has_substep => FocusMode::Substep,
        // No cursor to dramatize; split the odds between the others.
        0 => {
            if rng.gen_bool(0.5) {
                FocusMode::World
            } else {
                FocusMode::Character
            }
        }
        1 => FocusMode::World,
        _ => FocusMode::Character,
    }
}

impl Engine {
    /// Produce a candidate page. Never advances the plan cursor; when the
    /// turn dramatizes a sub-step the candidate carries `sub_to_check` and
    /// verification is deferred to the commit's successor generation.
    pub async fn generate_page(&self, book: &Book, spec: &GenerateSpec) -> Result<Candidate> {
        let plan = book
            .plan
            .as_ref()
            .ok_or_else(|| EngineError::bad_request("book has no plan"))?;

        let empty: &[Page] = &[];
        let pages = book.story.as_ref().map(|s| s.pages.as_slice()).unwrap_or(empty);
        let notes = book
            .story
            .as_ref()
            .map(|s| s.notes.as_slice())
            .unwrap_or_default();

        let previous_summary = if spec.up_to_index >= 0 {
            pages
                .get(spec.up_to_index as usize)
                .map(|p| p.summary.as_str())
                .filter(|s| !s.is_empty())
        } else {
            None
        };

        let recent_passages: Vec<&str> = if spec.up_to_index >= 0 {
            let end = ((spec.up_to_index as usize) + 1).min(pages.len());
            let start = end.saturating_sub(RECENT_PAGES);
            pages[start..end].iter().map(|p| p.passage.as_str()).collect()
        } else {
            Vec::new()
        };

        let sub = plan.current_substep();

        // First page of the story, or the tail of a point with another one
        // following: force sub-step focus and build toward what comes next.
        let first_page = spec.up_to_index < 0
            && spec.next_choice.is_none()
            && plan.cur_point == 0
            && plan.cur_sub == 0;
        let transition =
            (first_page || plan.nearing_point_end(TRANSITION_WINDOW)) && sub.is_some();

        let mode = if transition {
            FocusMode::Substep
        } else {
            roll_focus(&mut rand::thread_rng(), sub.is_some())
        };

        let subref: Option<SubRef> = match mode {
            FocusMode::Substep => sub,
            _ => None,
        };
        let focus = match &subref {
            Some(sub) => Focus::Substep {
                text: &sub.text,
                buildup: if transition { plan.next_point() } else { None },
            },
            None if mode == FocusMode::World => Focus::World,
            None => Focus::Character,
        };

        let payload = PagePrompt {
            focus,
            allow_options: spec.allow_options,
            previous_summary,
            notes,
            recent_passages,
            next_choice: spec.next_choice.as_deref(),
        };
        let messages = prompts::page(&book.config, &payload);
        let opts = self.chat_opts("page.generate", None, ReasoningEffort::Low);
        let reply = self.chat.chat(&messages, opts).await?;
        let draft: PageDraft = schema::parse_reply(&reply)?;

        if draft.passage.trim().is_empty() {
            return Err(EngineError::schema("generated page has no passage"));
        }

        // Options are honored only when requested and exactly three came back.
        let options = draft
            .options
            .filter(|options| spec.allow_options && options.len() == 3);
        let option_ids = options.as_ref().map(|options| {
            options
                .iter()
                .map(|text| make_option_id(spec.option_base_index, text))
                .collect::<Vec<_>>()
        });

        let notes_delta: Vec<String> = draft
            .notes
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .take(2)
            .collect();

        Ok(Candidate {
            page: Page {
                passage: draft.passage,
                summary: draft.summary,
                options,
                option_ids,
            },
            notes_delta,
            sub_to_check: subref.map(|sub| SubToCheck {
                point_index: sub.point_index,
                sub_index: sub.sub_index,
                text: sub.text,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roll_focus_without_substep_never_picks_it() {
        let mut rng = rand::thread_rng();
        for _ in 0..64 {
            assert_ne!(roll_focus(&mut rng, false), FocusMode::Substep);
        }
    }

    #[test]
    fn test_roll_focus_covers_all_modes() {
        let mut rng = rand::thread_rng();
        let mut seen = [false; 3];
        for _ in 0..256 {
            match roll_focus(&mut rng, true) {
                FocusMode::Substep => seen[0] = true,
                FocusMode::World => seen[1] = true,
                FocusMode::Character => seen[2] = true,
            }
        }
        assert_eq!(seen, [true, true, true]);
    }
}
