//! Narrative plan model and cursor arithmetic.

use serde::{Deserialize, Serialize};

/// One major narrative point, expanded into dramatizable sub-steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub title: String,
    pub brief: String,
    #[serde(default)]
    pub substeps: Vec<String>,
}

/// Reference to a single sub-step of the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRef {
    pub point_index: usize,
    pub sub_index: usize,
    pub text: String,
}

/// High-level outline steering page generation.
///
/// `(cur_point, cur_sub)` identifies the next unperformed sub-step; when
/// `cur_point == points.len()` the plan is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub overall_idea: String,
    pub conflict: String,
    pub points: Vec<Point>,
    #[serde(default)]
    pub cur_point: usize,
    #[serde(default)]
    pub cur_sub: usize,
}

impl Plan {
    /// The sub-step under the cursor, if the plan is not exhausted.
    pub fn current_substep(&self) -> Option<SubRef> {
        let point = self.points.get(self.cur_point)?;
        let text = point.substeps.get(self.cur_sub)?;
        Some(SubRef {
            point_index: self.cur_point,
            sub_index: self.cur_sub,
            text: text.clone(),
        })
    }

    /// The major point after the current one, if any.
    pub fn next_point(&self) -> Option<&Point> {
        self.points.get(self.cur_point + 1)
    }

    /// Cursor position after completing the sub-step at `(point, sub)`.
    ///
    /// Steps to the next sub-step of the same point, or to the start of the
    /// following point, clamping at `points.len()` when exhausted.
    pub fn advanced_from(&self, point_index: usize, sub_index: usize) -> (usize, usize) {
        let substep_count = self
            .points
            .get(point_index)
            .map(|p| p.substeps.len())
            .unwrap_or(0);
        if sub_index + 1 < substep_count {
            (point_index, sub_index + 1)
        } else {
            ((point_index + 1).min(self.points.len()), 0)
        }
    }

    /// Whether the cursor sits within the last `window` sub-steps of the
    /// current point while another point follows.
    pub fn nearing_point_end(&self, window: usize) -> bool {
        let Some(point) = self.points.get(self.cur_point) else {
            return false;
        };
        if self.cur_point + 1 >= self.points.len() {
            return false;
        }
        point.substeps.len().saturating_sub(self.cur_sub) <= window
    }
}
