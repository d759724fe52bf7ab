use chrono::{Duration, Utc};
use ragcore::{Envelope, ExecutionResult, NodeExecution, NodeStatus, NodeType, RunStatus};
use ragruntime::{ResultsStore, SqliteResults};
use uuid::Uuid;

fn sample_result(workflow_id: Uuid, age_minutes: i64) -> ExecutionResult {
    let mut input = Envelope::new();
    input.insert("message", "Apa itu RAG?");
    let mut output = input.clone();
    output.insert("intent", "question");
    output.insert("route", "retrieval");

    ExecutionResult {
        id: Uuid::new_v4(),
        workflow_id,
        test_input: "Apa itu RAG?".to_string(),
        status: RunStatus::Partial,
        node_executions: vec![NodeExecution {
            node_id: Uuid::new_v4(),
            node_name: "Intent Router".to_string(),
            node_type: NodeType::Router,
            input,
            output: output.clone(),
            processing_time_seconds: 0.004,
            status: NodeStatus::Success,
            error: None,
        }],
        final_output: output,
        total_time_seconds: 0.004,
        error_message: None,
        created_at: Utc::now() - Duration::minutes(age_minutes),
    }
}

#[tokio::test]
async fn save_and_get_round_trip() {
    let store = SqliteResults::in_memory().unwrap();
    let result = sample_result(Uuid::new_v4(), 0);

    store.save(&result).await.unwrap();
    let loaded = store.get(result.id).await.unwrap().unwrap();

    assert_eq!(loaded.id, result.id);
    assert_eq!(loaded.status, RunStatus::Partial);
    assert_eq!(loaded.node_executions.len(), 1);
    assert_eq!(loaded.node_executions[0].node_type, NodeType::Router);
    // Envelope field order survives the serialize-at-boundary path
    let keys: Vec<&str> = loaded.final_output.keys().collect();
    assert_eq!(keys, vec!["message", "intent", "route"]);
}

#[tokio::test]
async fn get_missing_execution_returns_none() {
    let store = SqliteResults::in_memory().unwrap();
    assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn list_for_workflow_is_newest_first() {
    let store = SqliteResults::in_memory().unwrap();
    let workflow_id = Uuid::new_v4();

    let older = sample_result(workflow_id, 10);
    let newer = sample_result(workflow_id, 1);
    let unrelated = sample_result(Uuid::new_v4(), 0);
    store.save(&older).await.unwrap();
    store.save(&newer).await.unwrap();
    store.save(&unrelated).await.unwrap();

    let listed = store.list_for_workflow(workflow_id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, newer.id);
    assert_eq!(listed[1].id, older.id);
}

#[tokio::test]
async fn open_creates_the_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs").join("executions.db");

    let store = SqliteResults::open(&path).unwrap();
    let result = sample_result(Uuid::new_v4(), 0);
    store.save(&result).await.unwrap();
    drop(store);

    // Reopen and read back
    let store = SqliteResults::open(&path).unwrap();
    let loaded = store.get(result.id).await.unwrap().unwrap();
    assert_eq!(loaded.test_input, "Apa itu RAG?");
}
