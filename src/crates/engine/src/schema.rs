//! Typed model-reply payloads and schema validation.
//!
//! Every model reply is untrusted free-form text. Each call site names one
//! of these target shapes; a mismatch is an error, never a coercion.

use crate::error::{EngineError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Planner reply: idea, conflict, and the major points.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerDraft {
    pub overall_idea: String,
    pub conflict: String,
    pub points: Vec<PointDraft>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointDraft {
    pub title: String,
    #[serde(default)]
    pub brief: String,
}

/// Substep expansion / intro insertion reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstepBatch {
    #[serde(default)]
    pub items: Vec<SubstepItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstepItem {
    pub index: usize,
    #[serde(default)]
    pub substeps: Vec<String>,
}

/// Page generation reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDraft {
    pub passage: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

/// Verifier reply.
#[derive(Debug, Clone, Deserialize)]
pub struct Verdict {
    pub done: bool,
}

/// Plan adaptation reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRevision {
    pub overall_idea: String,
    pub conflict: String,
    pub points: Vec<RevisedPoint>,
    #[serde(default)]
    pub cur_point: usize,
    #[serde(default)]
    pub cur_sub: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisedPoint {
    pub title: String,
    #[serde(default)]
    pub brief: String,
    #[serde(default)]
    pub substeps: Vec<String>,
}

/// Parse a model reply into the target shape.
///
/// The gateway already guarantees JSON-ness for structured calls; what
/// remains here is shape validation, surfaced as [`EngineError::Schema`].
pub fn parse_reply<T: DeserializeOwned>(reply: &str) -> Result<T> {
    serde_json::from_str(llm::strip_code_fence(reply))
        .map_err(|e| EngineError::Schema(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_planner_draft() {
        let draft: PlannerDraft = parse_reply(
            r#"{"overallIdea": "i", "conflict": "c",
                "points": [{"title": "t1", "brief": "b1"}, {"title": "t2"}]}"#,
        )
        .unwrap();
        assert_eq!(draft.points.len(), 2);
        assert_eq!(draft.points[1].brief, "");
    }

    #[test]
    fn test_parse_page_requires_passage() {
        let result: Result<PageDraft> = parse_reply(r#"{"summary": "s"}"#);
        assert!(matches!(result, Err(EngineError::Schema(_))));

        let draft: PageDraft =
            parse_reply(r#"{"passage": "prose", "summary": "s", "notes": []}"#).unwrap();
        assert!(draft.options.is_none());
    }

    #[test]
    fn test_parse_tolerates_code_fence() {
        let verdict: Verdict = parse_reply("```json\n{\"done\": true}\n```").unwrap();
        assert!(verdict.done);
    }

    #[test]
    fn test_parse_rejects_prose() {
        let result: Result<Verdict> = parse_reply("sure, the step is done");
        assert!(matches!(result, Err(EngineError::Schema(_))));
    }

    #[test]
    fn test_parse_revision_defaults_cursor() {
        let revision: PlanRevision = parse_reply(
            r#"{"overallIdea": "i", "conflict": "c",
                "points": [{"title": "t", "substeps": ["s1"]}]}"#,
        )
        .unwrap();
        assert_eq!(revision.cur_point, 0);
        assert_eq!(revision.cur_sub, 0);
    }
}
