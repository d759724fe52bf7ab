use actix_cors::Cors;
use actix_web::{
    get, post, web, App, HttpResponse, HttpServer, Responder, Result as ActixResult,
};
use ragcore::{
    EngineError, Envelope, ExecutionResult, NodeExecution, RunStatus, ValidationError, Workflow,
};
use ragnodes::{HttpDocumentIndex, HttpTextGenerator};
use ragruntime::{
    EngineConfig, ExecutionEngine, ExecutorRegistry, MemoryDefinitions, ResultsStore,
    SqliteResults,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Application state shared across handlers
struct AppState {
    engine: Arc<ExecutionEngine>,
    definitions: Arc<MemoryDefinitions>,
    results: Arc<dyn ResultsStore>,
}

/// Request body for workflow execution
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest {
    test_input: String,
    #[serde(default)]
    stop_at_node: Option<Uuid>,
}

/// Response for workflow execution
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteResponse {
    execution_id: Uuid,
    status: RunStatus,
    execution_flow: Vec<NodeExecution>,
    final_output: Envelope,
    total_time_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl From<ExecutionResult> for ExecuteResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            execution_id: result.id,
            status: result.status,
            execution_flow: result.node_executions,
            final_output: result.final_output,
            total_time_seconds: result.total_time_seconds,
            error_message: result.error_message,
        }
    }
}

/// Error response; `executionFlow` stays empty because validation failures
/// surface before any node runs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: String,
    execution_flow: Vec<NodeExecution>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            execution_flow: Vec::new(),
        }
    }
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "ragserver"
    }))
}

/// List loaded workflows
#[get("/api/workflows")]
async fn list_workflows(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    let workflows = data.definitions.list().await;
    let summaries: Vec<_> = workflows
        .iter()
        .map(|w| {
            serde_json::json!({
                "id": w.id,
                "name": w.name,
                "mode": w.mode,
                "isActive": w.is_active,
                "nodes": w.nodes.len(),
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(summaries))
}

/// List registered node types
#[get("/api/nodes")]
async fn list_node_types(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    let types: Vec<&str> = data
        .engine
        .registry()
        .registered_types()
        .iter()
        .map(|t| t.as_str())
        .collect();
    Ok(HttpResponse::Ok().json(types))
}

/// Execute a workflow (full run, or partial when `stopAtNode` is supplied)
#[post("/api/workflows/{id}/execute")]
async fn execute_workflow(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<ExecuteRequest>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let req = req.into_inner();

    info!(workflow_id = %workflow_id, "executing workflow");

    let request = ragruntime::RunRequest {
        workflow_id,
        test_input: req.test_input,
        stop_at_node: req.stop_at_node,
    };

    match data.engine.run(request).await {
        Ok(result) => Ok(HttpResponse::Ok().json(ExecuteResponse::from(result))),
        Err(EngineError::Validation(e @ ValidationError::WorkflowNotFound(_))) => {
            Ok(HttpResponse::NotFound().json(ErrorResponse::new(e.to_string())))
        }
        Err(EngineError::Validation(e)) => {
            Ok(HttpResponse::UnprocessableEntity().json(ErrorResponse::new(e.to_string())))
        }
        Err(e) => {
            error!(workflow_id = %workflow_id, error = %e, "execution failed");
            Ok(HttpResponse::InternalServerError().json(ErrorResponse::new(e.to_string())))
        }
    }
}

/// Inspect a persisted run
#[get("/api/executions/{id}")]
async fn get_execution(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<impl Responder> {
    let execution_id = path.into_inner();
    match data.results.get(execution_id).await {
        Ok(Some(result)) => Ok(HttpResponse::Ok().json(result)),
        Ok(None) => Ok(HttpResponse::NotFound().json(ErrorResponse::new(format!(
            "execution {execution_id} not found"
        )))),
        Err(e) => {
            error!(execution_id = %execution_id, error = %e, "results store read failed");
            Ok(HttpResponse::InternalServerError().json(ErrorResponse::new(e.to_string())))
        }
    }
}

/// List persisted runs for a workflow, newest first
#[get("/api/workflows/{id}/executions")]
async fn list_executions(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    match data.results.list_for_workflow(workflow_id).await {
        Ok(results) => Ok(HttpResponse::Ok().json(results)),
        Err(e) => {
            error!(workflow_id = %workflow_id, error = %e, "results store read failed");
            Ok(HttpResponse::InternalServerError().json(ErrorResponse::new(e.to_string())))
        }
    }
}

/// Load workflow definition files from a directory into the store.
async fn load_workflows(dir: &Path, definitions: &MemoryDefinitions) -> anyhow::Result<usize> {
    let mut loaded = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let body = std::fs::read_to_string(&path)?;
        let workflow: Workflow = match serde_json::from_str(&body) {
            Ok(w) => w,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unparseable workflow file");
                continue;
            }
        };
        if let Err(e) = workflow.validate() {
            warn!(file = %path.display(), error = %e, "skipping invalid workflow");
            continue;
        }
        info!(workflow = %workflow.name, id = %workflow.id, "loaded workflow");
        definitions.insert(workflow).await;
        loaded += 1;
    }
    Ok(loaded)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("starting rag workflow server");

    let index_url =
        std::env::var("DOCUMENT_INDEX_URL").unwrap_or_else(|_| "http://127.0.0.1:9001".to_string());
    let generation_url =
        std::env::var("GENERATION_URL").unwrap_or_else(|_| "http://127.0.0.1:9002".to_string());

    let mut registry = ExecutorRegistry::new();
    ragnodes::register_builtin(
        &mut registry,
        Arc::new(HttpDocumentIndex::new(index_url)),
        Arc::new(HttpTextGenerator::new(generation_url)),
    );

    let definitions = Arc::new(MemoryDefinitions::new());
    if let Ok(dir) = std::env::var("WORKFLOWS_DIR") {
        let count = load_workflows(Path::new(&dir), &definitions).await?;
        info!(count, dir = %dir, "workflow definitions loaded");
    }

    let db_path = std::env::var("RESULTS_DB").unwrap_or_else(|_| "data/executions.db".to_string());
    let results: Arc<dyn ResultsStore> = Arc::new(SqliteResults::open(&PathBuf::from(db_path))?);

    let engine = Arc::new(ExecutionEngine::new(
        Arc::new(registry),
        definitions.clone(),
        results.clone(),
        EngineConfig::default(),
    ));

    let app_state = web::Data::new(AppState {
        engine,
        definitions,
        results,
    });

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    info!(address = %bind_address, "server listening");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .service(health_check)
            .service(list_workflows)
            .service(list_node_types)
            .service(execute_workflow)
            .service(get_execution)
            .service(list_executions)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
