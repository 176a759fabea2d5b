//! Branch cache coordination: claims, takeover, pruning, exclusion.

mod common;

use common::*;
use engine::{EngineConfig, EngineError};
use llm::ScriptedChat;
use std::sync::Arc;
use std::time::Duration;
use store::{DocumentStore, MemoryStore, Update};

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// Start a story and wait until its initial precompute settles.
async fn started_book(chat: &ScriptedChat) -> (engine::Engine, Arc<MemoryStore>, String) {
    let (engine, store) = engine_with(chat);
    let book = engine.create_book("user-1").await.unwrap();
    engine.start(&book.id).await.unwrap();
    wait_for_doc(&store, &book.id, |d| {
        d.pointer("/story/branchCache/0:__next__").is_some()
    })
    .await;
    (engine, store, book.id)
}

#[tokio::test]
async fn at_most_one_writer_per_branch_key() {
    let chat = scripted_base();
    chat.push("page.generate", page_json("P0", "s0", &[], None));
    chat.sticky("page.generate", page_json("PX", "sx", &[], None));
    let (engine, store, book_id) = started_book(&chat).await;

    // Two generations so far: the opening page and the initial precompute.
    assert_eq!(chat.call_count("page.generate"), 2);

    // Clear the entry and race a pack of readiness callers at it.
    patch(
        &store,
        &book_id,
        Update::new()
            .unset("story.branchCache.0:__next__")
            .unset("story.branchCacheAt.0:__next__"),
    )
    .await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        let book_id = book_id.clone();
        handles.push(tokio::spawn(
            async move { engine.ensure_ready(&book_id, 0).await },
        ));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }

    // Exactly one of them generated; the rest observed or waited.
    assert_eq!(chat.call_count("page.generate"), 3);
}

#[tokio::test]
async fn plan_updating_blocks_new_generation() {
    let chat = scripted_base();
    chat.push("page.generate", page_json("P0", "s0", &[], None));
    chat.sticky("page.generate", page_json("PX", "sx", &[], None));
    let (engine, store, book_id) = started_book(&chat).await;

    let generations = chat.call_count("page.generate");
    patch(
        &store,
        &book_id,
        Update::new()
            .set("planUpdating", true)
            .unset("story.branchCache.0:__next__")
            .unset("story.branchCacheAt.0:__next__"),
    )
    .await;

    // Readiness reports not-ready immediately instead of generating.
    let ready = engine.readiness(&book_id, 0).await.unwrap();
    assert!(!ready.next);

    // A fired precompute declines as well.
    engine.spawn_precompute_next(&book_id, 0);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let doc = doc(&store, &book_id).await;
    assert!(doc.pointer("/story/branchCache/0:__next__").is_none());
    assert!(doc.pointer("/story/branchPending/0:__next__").is_none());
    assert_eq!(chat.call_count("page.generate"), generations);
}

#[tokio::test]
async fn commit_prunes_forward_entries() {
    let chat = scripted_base();
    chat.push("page.generate", page_json("P0", "s0", &[], None));
    chat.sticky("page.generate", page_json("PX", "sx", &[], None));
    let (engine, store, book_id) = started_book(&chat).await;

    // Seed forward entries a rewound reader would have left behind.
    patch(
        &store,
        &book_id,
        Update::new()
            .set(
                "story.branchCache.2:zzz",
                serde_json::json!({"page": {"passage": "junk", "summary": "junk"}}),
            )
            .set("story.branchCacheAt.2:zzz", now_ms())
            .set(
                "story.branchCache.3:__next__",
                serde_json::json!({"page": {"passage": "junk", "summary": "junk"}}),
            )
            .set("story.branchCacheAt.3:__next__", now_ms()),
    )
    .await;

    let snapshot = engine.next(&book_id, 0).await.unwrap();
    assert_eq!(snapshot.index, 1);

    let doc = doc(&store, &book_id).await;
    for key in cache_keys(&doc) {
        let index: i64 = key.split(':').next().unwrap().parse().unwrap();
        assert!(index <= 1, "forward entry {key} survived the prune");
    }
}

#[tokio::test]
async fn stale_pending_is_taken_over() {
    let chat = scripted_base();
    chat.push("page.generate", page_json("P0", "s0", &[], None));
    chat.sticky("page.generate", page_json("PX", "sx", &[], None));
    let (engine, store, book_id) = started_book(&chat).await;

    // An abandoned claim from a crashed worker, 130s old, and no cache.
    patch(
        &store,
        &book_id,
        Update::new()
            .unset("story.branchCache.0:__next__")
            .unset("story.branchCacheAt.0:__next__")
            .set("story.branchPending.0:__next__", now_ms() - 130_000),
    )
    .await;

    let ready = engine.readiness(&book_id, 0).await.unwrap();
    assert!(ready.next);

    let doc = doc(&store, &book_id).await;
    assert!(doc.pointer("/story/branchPending/0:__next__").is_none());
    assert!(doc.pointer("/story/branchCache/0:__next__").is_some());
}

#[tokio::test]
async fn stale_cache_entry_is_refreshed() {
    let chat = scripted_base();
    chat.push("page.generate", page_json("P0", "s0", &[], None));
    chat.sticky("page.generate", page_json("PX", "sx", &[], None));
    let (engine, store, book_id) = started_book(&chat).await;

    chat.push("page.generate", page_json("P9", "s9", &[], None));
    patch(
        &store,
        &book_id,
        Update::new().set("story.branchCacheAt.0:__next__", now_ms() - 130_000),
    )
    .await;

    assert!(engine.ensure_ready(&book_id, 0).await.unwrap());

    let doc = doc(&store, &book_id).await;
    assert_eq!(
        doc.pointer("/story/branchCache/0:__next__/page/passage"),
        Some(&"P9".into())
    );
    let at = doc
        .pointer("/story/branchCacheAt/0:__next__")
        .and_then(serde_json::Value::as_i64)
        .unwrap();
    assert!(now_ms() - at < 120_000);
}

#[tokio::test]
async fn waiting_on_a_live_claim_times_out() {
    let chat = scripted_base();
    chat.push("page.generate", page_json("P0", "s0", &[], None));
    chat.sticky("page.generate", page_json("PX", "sx", &[], None));

    let store = Arc::new(MemoryStore::new());
    let engine = engine::Engine::new(
        Arc::new(chat.clone()),
        store.clone() as Arc<dyn DocumentStore>,
        EngineConfig {
            wait_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
            ..EngineConfig::default()
        },
    );
    let book = engine.create_book("user-1").await.unwrap();
    engine.start(&book.id).await.unwrap();
    wait_for_doc(&store, &book.id, |d| {
        d.pointer("/story/branchCache/0:__next__").is_some()
    })
    .await;

    // A fresh foreign claim that never completes.
    patch(
        &store,
        &book.id,
        Update::new()
            .unset("story.branchCache.0:__next__")
            .unset("story.branchCacheAt.0:__next__")
            .set("story.branchPending.0:__next__", now_ms()),
    )
    .await;

    let result = engine.ensure_ready(&book.id, 0).await;
    assert!(matches!(result, Err(EngineError::Timeout(_))));
}

#[tokio::test]
async fn failed_generation_releases_the_claim() {
    let chat = ScriptedChat::new();
    chat.push("planner.points", points_json());
    chat.push("planner.substeps", substeps_json());
    chat.sticky("planner.intro", r#"{"items": []}"#);
    chat.sticky("verify.substep", r#"{"done": true}"#);
    // Opening page and the initial precompute only; the next generation
    // finds the queue empty and fails.
    chat.push("page.generate", page_json("P0", "s0", &[], None));
    chat.push("page.generate", page_json("P1", "s1", &[], None));
    let (engine, store, book_id) = started_book(&chat).await;

    patch(
        &store,
        &book_id,
        Update::new()
            .unset("story.branchCache.0:__next__")
            .unset("story.branchCacheAt.0:__next__"),
    )
    .await;

    let result = engine.ensure_ready(&book_id, 0).await;
    assert!(matches!(result, Err(EngineError::Llm(_))));

    let doc = doc(&store, &book_id).await;
    assert!(
        doc.pointer("/story/branchPending/0:__next__").is_none(),
        "failed owner must release its claim"
    );

    // With a reply available again the same caller succeeds.
    chat.push("page.generate", page_json("P2", "s2", &[], None));
    assert!(engine.ensure_ready(&book_id, 0).await.unwrap());
}

#[tokio::test]
async fn next_validates_index_bounds() {
    let chat = scripted_base();
    chat.push("page.generate", page_json("P0", "s0", &[], None));
    chat.sticky("page.generate", page_json("PX", "sx", &[], None));
    let (engine, _store, book_id) = started_book(&chat).await;

    let result = engine.next(&book_id, -2).await;
    assert!(matches!(result, Err(EngineError::BadRequest(_))));

    let result = engine.next(&book_id, 5).await;
    assert!(matches!(result, Err(EngineError::BadRequest(_))));
}

#[tokio::test]
async fn option_ids_are_stable_across_generations() {
    let chat = scripted_base();
    chat.push(
        "page.generate",
        page_json("P0", "s0", &[], Some(["go left", "go right", "wait"])),
    );
    chat.sticky("page.generate", page_json("PX", "sx", &[], None));
    let (engine, _store) = engine_with(&chat);

    let book = engine.create_book("user-1").await.unwrap();
    let snapshot = engine.start(&book.id).await.unwrap();
    let ids = snapshot.pages[0].option_ids.clone().unwrap();

    // Same index, same texts, same order: identical ids.
    assert_eq!(
        ids,
        vec![
            engine::models::make_option_id(0, "go left"),
            engine::models::make_option_id(0, "go right"),
            engine::models::make_option_id(0, "wait"),
        ]
    );
}
