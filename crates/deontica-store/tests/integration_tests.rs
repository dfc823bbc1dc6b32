//! Integration tests for deontica-store
//!
//! These tests cover the clause document lifecycle, the chat log, and the
//! local index rebuilt from a database file.

use deontica_domain::traits::{ChatLog, ClauseFilter, ClauseStore, IndexRecord, VectorIndex};
use deontica_domain::{ChatRole, ChatTurn, Clause, ClauseId, Modality, RetrievedContext};
use deontica_store::{LocalIndex, SqliteStore, StoreError};
use serde_json::json;
use tempfile::TempDir;

fn clause(text: &str, article: &str, modality: Modality, actor: &str) -> Clause {
    let mut c = Clause::new(text).with_article(Some(article.to_string()));
    c.modality = Some(modality);
    c.actor = Some(actor.to_string());
    c
}

#[test]
fn test_store_initialization() {
    let store = SqliteStore::new(":memory:");
    assert!(store.is_ok(), "Store should initialize successfully");
}

#[test]
fn test_upsert_and_get_clause() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let mut c = clause(
        "Providers of high-risk AI systems shall keep logs.",
        "Art 12",
        Modality::Obligation,
        "provider",
    );
    c.set_deontic_formula(Some("O(provider -> keep_logs)".to_string()));
    c.set_confidence("classify", 0.9);

    let id = store.upsert_clause(&c).unwrap();
    assert_eq!(id, c.clause_id);

    let stored = store.get_clause(id).unwrap().expect("clause should exist");
    assert_eq!(stored.text, c.text);
    assert_eq!(stored.modality, Some(Modality::Obligation));
    assert_eq!(stored.deontic_formula(), Some("O(provider -> keep_logs)"));
    assert_eq!(stored.confidence.get("classify"), Some(&0.9));
}

#[test]
fn test_get_unknown_clause() {
    let store = SqliteStore::new(":memory:").unwrap();
    assert!(store.get_clause(ClauseId::new()).unwrap().is_none());
}

#[test]
fn test_upsert_keyed_by_text_and_article() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let first = clause("Deployers shall monitor.", "Art 26", Modality::Obligation, "deployer");
    let first_id = store.upsert_clause(&first).unwrap();

    // Same key, new extraction: one document, original id, new content
    let mut second =
        clause("Deployers shall monitor.", "Art 26", Modality::Recommendation, "deployer");
    second.actor_canonical = Some("AI_Act.Deployer".to_string());
    let second_id = store.upsert_clause(&second).unwrap();

    assert_eq!(first_id, second_id);
    assert_eq!(store.clause_count().unwrap(), 1);

    let stored = store.get_clause(first_id).unwrap().unwrap();
    assert_eq!(stored.clause_id, first_id);
    assert_eq!(stored.modality, Some(Modality::Recommendation));
    assert_eq!(stored.actor_canonical.as_deref(), Some("AI_Act.Deployer"));

    // Same text under another article is a separate document
    let other = clause("Deployers shall monitor.", "Art 29", Modality::Obligation, "deployer");
    store.upsert_clause(&other).unwrap();
    assert_eq!(store.clause_count().unwrap(), 2);
}

#[test]
fn test_query_filters() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    store
        .upsert_clause(&clause(
            "Providers shall keep logs.",
            "Art 12",
            Modality::Obligation,
            "provider",
        ))
        .unwrap();
    store
        .upsert_clause(&clause(
            "Social scoring is prohibited.",
            "Art 5",
            Modality::Prohibition,
            "provider",
        ))
        .unwrap();
    store
        .upsert_clause(&clause(
            "Deployers may rely on documentation.",
            "Art 26",
            Modality::Permission,
            "deployer",
        ))
        .unwrap();

    let all = store.query_clauses(&ClauseFilter::default()).unwrap();
    assert_eq!(all.len(), 3);
    // Newest first
    assert_eq!(all[0].text, "Deployers may rely on documentation.");

    let obligations = store
        .query_clauses(&ClauseFilter {
            modality: Some(Modality::Obligation),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(obligations.len(), 1);

    let by_article = store
        .query_clauses(&ClauseFilter {
            article_id: Some("Art 5".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_article[0].modality, Some(Modality::Prohibition));

    let by_actor = store
        .query_clauses(&ClauseFilter {
            actor: Some("provider".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_actor.len(), 2);

    let search = store
        .query_clauses(&ClauseFilter {
            search: Some("LOGS".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(search.len(), 1);
    assert_eq!(search[0].article_id.as_deref(), Some("Art 12"));

    let limited = store
        .query_clauses(&ClauseFilter {
            limit: Some(2),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(limited.len(), 2);
}

#[test]
fn test_patch_clause() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let id = store
        .upsert_clause(&clause(
            "Providers shall register.",
            "Art 49",
            Modality::Obligation,
            "provider",
        ))
        .unwrap();

    let patch =
        json!({"actor_canonical": "AI_Act.Provider", "modality": "RECOMMENDATION", "bogus": 1});
    assert!(store.patch_clause(id, patch.as_object().unwrap()).unwrap());

    let stored = store.get_clause(id).unwrap().unwrap();
    assert_eq!(stored.actor_canonical.as_deref(), Some("AI_Act.Provider"));
    assert_eq!(stored.modality, Some(Modality::Recommendation));

    // Column copies follow the document
    let filtered = store
        .query_clauses(&ClauseFilter {
            actor_canonical: Some("AI_Act.Provider".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(filtered.len(), 1);

    assert!(!store.patch_clause(ClauseId::new(), patch.as_object().unwrap()).unwrap());
}

#[test]
fn test_patch_into_existing_key_is_a_conflict() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    store
        .upsert_clause(&clause(
            "Providers shall keep logs.",
            "Art 12",
            Modality::Obligation,
            "provider",
        ))
        .unwrap();
    let id = store
        .upsert_clause(&clause(
            "Deployers shall monitor.",
            "Art 12",
            Modality::Obligation,
            "deployer",
        ))
        .unwrap();

    let patch = json!({"text": "Providers shall keep logs.", "actor": "provider"});
    let result = store.patch_clause(id, patch.as_object().unwrap());
    assert!(matches!(result, Err(StoreError::Conflict(_))));

    // Nothing was written
    let stored = store.get_clause(id).unwrap().unwrap();
    assert_eq!(stored.text, "Deployers shall monitor.");
    assert_eq!(stored.actor.as_deref(), Some("deployer"));
    assert_eq!(store.clause_count().unwrap(), 2);

    // Moving to a free article is fine
    let patch = json!({"article_id": "Art 26"});
    assert!(store.patch_clause(id, patch.as_object().unwrap()).unwrap());
    let moved = store
        .query_clauses(&ClauseFilter {
            article_id: Some("Art 26".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(moved.len(), 1);
}

#[test]
fn test_search_folds_non_ascii_case() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    store
        .upsert_clause(&clause(
            "ÄNDERUNGEN sind zu melden.",
            "Art 3",
            Modality::Obligation,
            "provider",
        ))
        .unwrap();
    store
        .upsert_clause(&clause("Änderungen am System.", "Art 4", Modality::Obligation, "provider"))
        .unwrap();
    store
        .upsert_clause(&clause(
            "Providers shall keep logs.",
            "Art 12",
            Modality::Obligation,
            "provider",
        ))
        .unwrap();

    let hits = store
        .query_clauses(&ClauseFilter {
            search: Some("änderungen".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(hits.len(), 2);

    // The limit counts matches, not scanned rows
    let limited = store
        .query_clauses(&ClauseFilter {
            search: Some("ÄNDERUNGEN".to_string()),
            limit: Some(1),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].article_id.as_deref(), Some("Art 4"));
}

#[test]
fn test_chat_log_keeps_order_per_thread() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    store
        .append_turn(
            &ChatTurn::new("t1", ChatRole::User, "Who must keep logs?")
                .with_retrieval_log(json!({"doc_hits": ["eurlex:ai_act"]})),
        )
        .unwrap();
    store
        .append_turn(&ChatTurn::new("t2", ChatRole::User, "Other thread").at(5))
        .unwrap();
    store
        .append_turn(
            &ChatTurn::new("t1", ChatRole::Assistant, "Providers must keep logs.")
                .with_retrieval_log(json!({"citations": ["Art 12"]})),
        )
        .unwrap();

    let thread = store.thread("t1").unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0].role, ChatRole::User);
    assert_eq!(thread[0].retrieval_log["doc_hits"][0], "eurlex:ai_act");
    assert!(thread[0].created_at > 0);
    assert_eq!(thread[1].role, ChatRole::Assistant);
    assert_eq!(thread[1].retrieval_log["citations"][0], "Art 12");

    assert_eq!(store.thread("t2").unwrap()[0].created_at, 5);
    assert!(store.thread("missing").unwrap().is_empty());
}

#[test]
fn test_store_persists_to_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("deontica.db");

    let id = {
        let mut store = SqliteStore::new(&path).unwrap();
        store
            .upsert_clause(&clause(
                "Providers shall keep logs.",
                "Art 12",
                Modality::Obligation,
                "provider",
            ))
            .unwrap()
    };

    let store = SqliteStore::new(&path).unwrap();
    assert!(store.get_clause(id).unwrap().is_some());
}

#[test]
fn test_local_index_rebuilds_from_chunks() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("deontica.db");

    {
        let index = LocalIndex::open(&path).unwrap();
        assert!(index.is_empty());
        let written = index
            .upsert(&[
                IndexRecord {
                    id: "doc:0".to_string(),
                    doc_id: "doc".to_string(),
                    values: vec![1.0, 0.0, 0.0],
                    context: RetrievedContext::new("Article 12 Record-keeping")
                        .with_article("Article 12")
                        .with_source("eurlex:ai_act", "v1"),
                },
                IndexRecord {
                    id: "doc:1".to_string(),
                    doc_id: "doc".to_string(),
                    values: vec![0.0, 1.0, 0.0],
                    context: RetrievedContext::new("Article 5 Prohibited practices")
                        .with_article("Article 5"),
                },
            ])
            .unwrap();
        assert_eq!(written, 2);
    }

    let store = SqliteStore::new(&path).unwrap();
    assert_eq!(store.load_chunks().unwrap().len(), 2);

    let reopened = LocalIndex::open(&path).unwrap();
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.dimension(), Some(3));

    let hits = reopened.query(&[1.0, 0.0, 0.0], 1).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].article_id.as_deref(), Some("Article 12"));
    assert_eq!(hits[0].source_uri.as_deref(), Some("eurlex:ai_act"));
}
