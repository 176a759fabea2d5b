//! Persistent data model.
//!
//! Every struct here serializes with camelCase field names; the dotted
//! paths used by conditional updates (`story.branchCache.<key>`,
//! `planUpdating`, …) address exactly these serialized forms.

pub mod book;
pub mod plan;
pub mod story;

pub use book::{Book, BookConfig};
pub use plan::{Plan, Point, SubRef};
pub use story::{
    branch_key, branch_key_index, make_option_id, Candidate, Page, PendingVerify, StoryState,
    SubToCheck, NEXT_BRANCH,
};
