//! Shared fixtures for engine integration tests.
#![allow(dead_code)]

use engine::{Engine, EngineConfig};
use llm::ScriptedChat;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use store::{DocumentStore, Filter, MemoryStore, Update};

pub fn test_config() -> EngineConfig {
    EngineConfig {
        wait_timeout: Duration::from_secs(3),
        poll_interval: Duration::from_millis(10),
        ..EngineConfig::default()
    }
}

/// A scripted chat with the whole plan pipeline pre-loaded: six points,
/// three sub-steps each, no-op intro insertion, verifier always satisfied.
pub fn scripted_base() -> ScriptedChat {
    let chat = ScriptedChat::new();
    chat.push("planner.points", points_json());
    chat.push("planner.substeps", substeps_json());
    chat.sticky("planner.intro", r#"{"items": []}"#);
    chat.sticky("verify.substep", r#"{"done": true}"#);
    chat
}

pub fn engine_with(chat: &ScriptedChat) -> (Engine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(
        Arc::new(chat.clone()),
        store.clone() as Arc<dyn DocumentStore>,
        test_config(),
    );
    (engine, store)
}

pub fn points_json() -> String {
    let points: Vec<Value> = (0..6)
        .map(|i| json!({"title": format!("Point {i}"), "brief": format!("brief {i}")}))
        .collect();
    json!({"overallIdea": "idea", "conflict": "conflict", "points": points}).to_string()
}

pub fn substeps_json() -> String {
    let items: Vec<Value> = (0..6)
        .map(|i| {
            json!({
                "index": i,
                "substeps": [format!("s{i}0"), format!("s{i}1"), format!("s{i}2")]
            })
        })
        .collect();
    json!({"items": items}).to_string()
}

pub fn page_json(passage: &str, summary: &str, notes: &[&str], options: Option<[&str; 3]>) -> String {
    let mut page = json!({"passage": passage, "summary": summary, "notes": notes});
    if let Some(options) = options {
        page["options"] = json!(options);
    }
    page.to_string()
}

pub fn adapt_json() -> String {
    let points: Vec<Value> = (0..3)
        .map(|i| {
            json!({
                "title": format!("Adapted {i}"),
                "brief": format!("adapted brief {i}"),
                "substeps": [format!("a{i}0"), format!("a{i}1"), format!("a{i}2")]
            })
        })
        .collect();
    json!({
        "overallIdea": "idea2",
        "conflict": "conflict2",
        "points": points,
        "curPoint": 1,
        "curSub": 0
    })
    .to_string()
}

/// Poll the stored document until the predicate holds.
pub async fn wait_for_doc<P>(store: &MemoryStore, id: &str, pred: P) -> Value
where
    P: Fn(&Value) -> bool,
{
    for _ in 0..500 {
        if let Some(doc) = store.find_one(id).await.unwrap() {
            if pred(&doc) {
                return doc;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("document never reached the expected state");
}

pub async fn doc(store: &MemoryStore, id: &str) -> Value {
    store.find_one(id).await.unwrap().expect("document exists")
}

/// Unconditional patch helper for seeding coordination state.
pub async fn patch(store: &MemoryStore, id: &str, update: Update) {
    assert_eq!(store.update_one(id, Filter::new(), update).await.unwrap(), 1);
}

pub fn cache_keys(doc: &Value) -> Vec<String> {
    doc.pointer("/story/branchCache")
        .and_then(Value::as_object)
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}
