//! Story progress, pages, and the branch cache representation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The linear "advance without a choice" branch name.
pub const NEXT_BRANCH: &str = "__next__";

/// One committed chapter of prose.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub passage: String,
    pub summary: String,
    /// Exactly three short choice texts when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Stable ids parallel to `options`, minted at commit time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_ids: Option<Vec<String>>,
}

/// A sub-step a candidate page was asked to dramatize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubToCheck {
    pub point_index: usize,
    pub sub_index: usize,
    pub text: String,
}

/// A speculatively generated page held in the branch cache until consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub page: Page,
    /// Up to two new memory-note bullets.
    #[serde(default)]
    pub notes_delta: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_to_check: Option<SubToCheck>,
}

/// Deferred verification record written at commit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingVerify {
    pub passage: String,
    pub sub_text: String,
    pub point_index: usize,
    pub sub_index: usize,
}

/// Story progress for a book.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryState {
    /// Committed pages, append-only in the forward direction.
    #[serde(default)]
    pub pages: Vec<Page>,

    /// Index of the most recently committed page; -1 before the first.
    #[serde(default = "default_index")]
    pub index: i64,

    /// Deduplicated ordered list of short factual bullets.
    #[serde(default)]
    pub notes: Vec<String>,

    /// One-line recap of the latest committed page.
    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub turn: u32,

    /// Speculative continuations keyed by `"{index}:{branch}"`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub branch_cache: BTreeMap<String, Candidate>,

    /// Write timestamps parallel to `branch_cache` (Unix millis).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub branch_cache_at: BTreeMap<String, i64>,

    /// Claim timestamps for in-flight generations (Unix millis).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub branch_pending: BTreeMap<String, i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_verify: Option<PendingVerify>,
}

fn default_index() -> i64 {
    -1
}

impl StoryState {
    /// Empty story positioned before the first page.
    pub fn new() -> Self {
        Self {
            index: -1,
            ..Self::default()
        }
    }

    /// The page at a committed index.
    pub fn page_at(&self, index: i64) -> Option<&Page> {
        if index < 0 {
            return None;
        }
        self.pages.get(index as usize)
    }
}

/// Compose a branch cache key from a page index and branch name.
pub fn branch_key(index: i64, branch: &str) -> String {
    format!("{index}:{branch}")
}

/// The page-index portion of a branch key.
pub fn branch_key_index(key: &str) -> Option<i64> {
    key.split_once(':').and_then(|(index, _)| index.parse().ok())
}

/// Mint the stable id for an option offered on the page at `base_index`.
///
/// FNV-1a over the option text, with the basis perturbed by the page index
/// so identical texts on different pages get distinct ids. Pure; ids are
/// computed once at commit and never recomputed.
pub fn make_option_id(base_index: i64, text: &str) -> String {
    let mut hash: u32 = 0x811c_9dc5 ^ (base_index as u32).wrapping_mul(0x9e37_79b9);
    for byte in text.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    format!("{base_index}-{hash:08x}")
}
