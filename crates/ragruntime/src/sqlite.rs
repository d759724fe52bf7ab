use crate::store::ResultsStore;
use async_trait::async_trait;
use ragcore::{ExecutionId, ExecutionResult, StoreError, WorkflowId};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// SQLite-backed results store.
///
/// Results are serialized to JSON only at this boundary; the engine loop
/// never carries serialized forms. A few columns are duplicated out of the
/// body for querying without deserializing.
pub struct SqliteResults {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS executions (
        id TEXT PRIMARY KEY,
        workflow_id TEXT NOT NULL,
        status TEXT NOT NULL,
        total_time_seconds REAL NOT NULL,
        created_at TEXT NOT NULL,
        body TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_executions_workflow
        ON executions(workflow_id, created_at);
";

impl SqliteResults {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).map_err(db_err)?;

        // WAL keeps concurrent appends from serializing on the whole file
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "sqlite results store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

#[async_trait]
impl ResultsStore for SqliteResults {
    async fn save(&self, result: &ExecutionResult) -> Result<(), StoreError> {
        let body = serde_json::to_string(result)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO executions (id, workflow_id, status, total_time_seconds, created_at, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                result.id.to_string(),
                result.workflow_id.to_string(),
                result.status.as_str(),
                result.total_time_seconds,
                result.created_at.to_rfc3339(),
                body,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: ExecutionId) -> Result<Option<ExecutionResult>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT body FROM executions WHERE id = ?1")
            .map_err(db_err)?;
        let mut rows = stmt
            .query_map(params![id.to_string()], |row| row.get::<_, String>(0))
            .map_err(db_err)?;

        match rows.next() {
            Some(body) => {
                let body = body.map_err(db_err)?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    async fn list_for_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<ExecutionResult>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT body FROM executions
                 WHERE workflow_id = ?1
                 ORDER BY created_at DESC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![workflow_id.to_string()], |row| {
                row.get::<_, String>(0)
            })
            .map_err(db_err)?;

        let mut results = Vec::new();
        for body in rows {
            let body = body.map_err(db_err)?;
            results.push(serde_json::from_str(&body)?);
        }
        Ok(results)
    }
}
