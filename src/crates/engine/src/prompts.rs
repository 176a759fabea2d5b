//! Prompt builders.
//!
//! Pure functions assembling the system and user messages for each model
//! task from a configuration snapshot and a task payload. No I/O happens
//! here; the output schema each prompt demands is validated by the caller
//! through [`crate::schema`].

use crate::models::{BookConfig, Page, Plan, Point};
use llm::ChatMessage;
use std::fmt::Write;

/// Per-turn focus for page generation.
#[derive(Debug, Clone)]
pub enum Focus<'a> {
    /// Dramatize one plan sub-step; optionally build toward the next major
    /// point without revealing it.
    Substep {
        text: &'a str,
        buildup: Option<&'a Point>,
    },
    /// Deepen the world: places, customs, texture.
    World,
    /// Deepen a character: voice, interiority, relationships.
    Character,
}

/// Payload for the page-generation prompt.
#[derive(Debug, Clone)]
pub struct PagePrompt<'a> {
    pub focus: Focus<'a>,
    pub allow_options: bool,
    pub previous_summary: Option<&'a str>,
    pub notes: &'a [String],
    pub recent_passages: Vec<&'a str>,
    pub next_choice: Option<&'a str>,
}

fn config_block(config: &BookConfig) -> String {
    let mut block = String::from("Story configuration:\n");
    let _ = writeln!(block, "- Inspired by: {} and {}", config.book_one, config.book_two);
    let _ = writeln!(block, "- World: {}", config.world);
    let _ = writeln!(block, "- Main character: {}", config.main_character);
    let _ = writeln!(block, "- Genre: {}", config.genre);
    block
}

fn plan_outline(plan: &Plan, with_substeps: bool) -> String {
    let mut outline = String::new();
    let _ = writeln!(outline, "Overall idea: {}", plan.overall_idea);
    let _ = writeln!(outline, "Central conflict: {}", plan.conflict);
    for (i, point) in plan.points.iter().enumerate() {
        let _ = writeln!(outline, "{i}. {} — {}", point.title, point.brief);
        if with_substeps {
            for (j, sub) in point.substeps.iter().enumerate() {
                let _ = writeln!(outline, "   {i}.{j} {sub}");
            }
        }
    }
    outline
}

/// Planner: overall idea, conflict, and 6–9 major points.
pub fn planner_points(config: &BookConfig) -> Vec<ChatMessage> {
    let system = "You are a story architect for an interactive branching novel. \
Design the spine of the story: a one-paragraph overall idea, the central dramatic \
conflict, and 6 to 9 major plot points that carry the story from its opening image \
to its resolution. Points must be concrete events, not themes. \
Return strictly JSON: {\"overallIdea\": string, \"conflict\": string, \
\"points\": [{\"title\": string, \"brief\": string}]}.";

    vec![
        ChatMessage::system(system),
        ChatMessage::user(format!(
            "{}\nInvent the plan now. Return strictly the JSON object, nothing else.",
            config_block(config)
        )),
    ]
}

/// Expand every point into 3–6 dramatizable sub-steps, in one call.
pub fn expand_substeps(config: &BookConfig, plan: &Plan) -> Vec<ChatMessage> {
    let system = "You break story points into playable sub-steps. For every plot \
point given, produce 3 to 6 sub-steps: each one a single dramatizable beat, one \
sentence, in chronological order. \
Return strictly JSON: {\"items\": [{\"index\": number, \"substeps\": [string]}]} \
covering every point index you were given.";

    vec![
        ChatMessage::system(system),
        ChatMessage::user(format!(
            "{}\nPlan:\n{}\nExpand every point. Return strictly the JSON object.",
            config_block(config),
            plan_outline(plan, false)
        )),
    ]
}

/// Insert minimal introduction sub-steps where a character, item or concept
/// would otherwise appear unexplained.
pub fn insert_intros(config: &BookConfig, plan: &Plan) -> Vec<ChatMessage> {
    let system = "You review a story plan for missing introductions. Wherever a \
sub-step relies on a character, item, place or concept a reader would not yet \
know, insert a minimal introduction sub-step before its first use. Change nothing \
else; keep every existing sub-step. Only return points you modified, with their \
full new sub-step list. \
Return strictly JSON: {\"items\": [{\"index\": number, \"substeps\": [string]}]}.";

    vec![
        ChatMessage::system(system),
        ChatMessage::user(format!(
            "{}\nPlan:\n{}\nReturn strictly the JSON object.",
            config_block(config),
            plan_outline(plan, true)
        )),
    ]
}

const STYLE_DIRECTIVES: &str = "You write one page of an interactive novel. \
Style: lean prose; short paragraphs; concrete sensory detail over abstraction. \
Keep a tight third-person limited point of view on the main character and never \
break it. Let dialogue carry tension and character; people interrupt, deflect, \
leave things unsaid. Use figurative language sparingly; one striking image \
outweighs five ornaments. Write 6 to 8 short paragraphs.";

fn focus_directive(focus: &Focus<'_>) -> String {
    match focus {
        Focus::Substep { text, buildup } => {
            let mut directive = format!(
                "This page must dramatize the following story beat, fully and on the \
page (not as recollection): {text}"
            );
            if let Some(point) = buildup {
                let _ = write!(
                    directive,
                    "\nQuietly build toward what comes next — {} ({}) — through mood \
and foreshadowing only. Do not reveal or name the upcoming event; the reader must \
never sense an outline behind the story.",
                    point.title, point.brief
                );
            }
            directive
        }
        Focus::World => "This page deepens the world: a place, a custom, a texture of \
daily life the story has touched but not explored. Advance the present scene while \
doing it; no lore dumps."
            .to_string(),
        Focus::Character => "This page deepens a character: voice, interiority, a \
relationship under strain. Stay inside the present scene; reveal through behavior, \
not explanation."
            .to_string(),
    }
}

const OPTIONS_ALLOWED: &str = "If this page ends at a genuine decision for the main \
character, you MAY include an \"options\" field with exactly three short strings, \
each a distinct action the reader can choose. Omit the field otherwise.";

const OPTIONS_FORBIDDEN: &str = "Do NOT include an \"options\" field.";

const PAGE_SCHEMA: &str = "Return strictly JSON: {\"passage\": string, \
\"summary\": string (one line recapping this page), \"notes\": [string] (at most 2 \
short new factual bullets worth remembering), \"options\"?: [string, string, string]}.";

/// Page generation.
pub fn page(config: &BookConfig, payload: &PagePrompt<'_>) -> Vec<ChatMessage> {
    let system = format!(
        "{STYLE_DIRECTIVES}\n\n{}\n\n{}\n\n{PAGE_SCHEMA}",
        focus_directive(&payload.focus),
        if payload.allow_options {
            OPTIONS_ALLOWED
        } else {
            OPTIONS_FORBIDDEN
        },
    );

    let mut user = config_block(config);
    if let Some(summary) = payload.previous_summary {
        let _ = writeln!(user, "\nPreviously: {summary}");
    }
    if !payload.notes.is_empty() {
        let _ = writeln!(user, "\nEstablished facts (keep consistent):");
        for note in payload.notes {
            let _ = writeln!(user, "- {note}");
        }
    }
    if !payload.recent_passages.is_empty() {
        let _ = writeln!(user, "\nThe last pages, oldest first:");
        for passage in &payload.recent_passages {
            let _ = writeln!(user, "---\n{passage}");
        }
    }
    if let Some(choice) = payload.next_choice {
        let _ = writeln!(
            user,
            "\nThe reader chose: \"{choice}\". This page follows directly from that choice."
        );
    }
    let _ = write!(user, "\nWrite the next page. Return strictly the JSON object.");

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Verifier: did the committed passage accomplish the sub-step?
pub fn verify_substep(
    passage: &str,
    sub_text: &str,
    recent_passages: &[&str],
    notes: &[String],
) -> Vec<ChatMessage> {
    let system = "You check whether a story beat was dramatized. Answer whether the \
passage accomplishes the given beat, on the page, in substance. Partial but clear \
accomplishment counts; err on the side of done. \
Return strictly JSON: {\"done\": boolean}.";

    let mut user = String::new();
    let _ = writeln!(user, "Beat: {sub_text}");
    if !notes.is_empty() {
        let _ = writeln!(user, "\nEstablished facts:");
        for note in notes {
            let _ = writeln!(user, "- {note}");
        }
    }
    if !recent_passages.is_empty() {
        let _ = writeln!(user, "\nPreceding pages, oldest first:");
        for prior in recent_passages {
            let _ = writeln!(user, "---\n{prior}");
        }
    }
    let _ = write!(
        user,
        "\nPassage to judge:\n---\n{passage}\n---\nReturn strictly the JSON object."
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Plan adaptation after a reader choice.
pub fn adapt_plan(
    config: &BookConfig,
    plan: &Plan,
    committed_page: &Page,
    choice: &str,
) -> Vec<ChatMessage> {
    let system = "The reader steered an interactive story off its planned course. \
Revise the plan so it stays coherent with what has actually happened, preserving \
as much of the remaining arc as still makes sense. Keep at least 3 points; every \
point keeps 3 to 6 sub-steps; already-performed material must not be replanned. \
Set curPoint and curSub to the next unperformed sub-step of the revised plan. \
Return strictly JSON: {\"overallIdea\": string, \"conflict\": string, \
\"points\": [{\"title\": string, \"brief\": string, \"substeps\": [string]}], \
\"curPoint\": number, \"curSub\": number}.";

    let user = format!(
        "{}\nCurrent plan (cursor at {}.{}):\n{}\nThe reader chose: \"{choice}\"\n\
The page that resulted:\n---\n{}\n---\nRevise the plan. Return strictly the JSON object.",
        config_block(config),
        plan.cur_point,
        plan.cur_sub,
        plan_outline(plan, true),
        committed_page.passage,
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}
