mod error;

use actix_cors::Cors;
use actix_web::{delete, get, post, web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use actix_ws::Message;
use error::ApiError;
use flowcore::{EventPayload, RuntimeEvent, Value, WorkflowDefinition};
use flowruntime::{EngineConfig, ExecutionRequest, WorkflowEngine, WorkflowLoader};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Header carrying the caller's workflow token.
const TOKEN_HEADER: &str = "X-Workflow-Token";

/// Application state shared across handlers
struct AppState {
    engine: Arc<WorkflowEngine>,
}

/// Request body for workflow execution
#[derive(Debug, Default, Deserialize)]
struct ExecuteBody {
    #[serde(default)]
    args: HashMap<String, Value>,
}

/// Response for workflow deployment
#[derive(Debug, Serialize)]
struct DeploymentResponse {
    deployment_id: Uuid,
    workflow_id: String,
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "flowserver"
    }))
}

/// Translate and deploy a workflow
#[post("/v1/workflows")]
async fn deploy_workflow(
    data: web::Data<AppState>,
    workflow: web::Json<WorkflowDefinition>,
) -> Result<HttpResponse, ApiError> {
    let workflow = workflow.into_inner();
    info!("Deploying workflow: {}", workflow.id);

    let deployment_id = data.engine.deploy_workflow(&workflow).await?;
    Ok(HttpResponse::Created().json(DeploymentResponse {
        deployment_id,
        workflow_id: workflow.id,
    }))
}

/// List active deployments
#[get("/v1/deployments")]
async fn list_deployments(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.engine.active_deployments().await?))
}

/// Graph of the active deployment of a workflow
#[get("/v1/workflows/{name}")]
async fn get_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let graph = data.engine.active_graph(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(graph.as_ref()))
}

/// Undeploy every deployment of a workflow
#[delete("/v1/workflows/{name}")]
async fn undeploy_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    data.engine.undeploy_by_workflow_id(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[delete("/v1/deployments/{id}")]
async fn undeploy_deployment(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    data.engine.undeploy_by_deployment_id(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Execute a workflow
#[post("/v1/workflows/{name}/execute")]
async fn execute_workflow(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: Option<web::Json<ExecuteBody>>,
) -> Result<HttpResponse, ApiError> {
    let workflow_id = path.into_inner();
    let args = body.map(|b| b.into_inner().args).unwrap_or_default();

    let mut request = ExecutionRequest::new(&workflow_id).with_arguments(args);
    if let Some(token) = req
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        request = request.with_token(token);
    }

    info!("Executing workflow: {}", workflow_id);
    data.engine.execute(request).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Accept a runtime event, routed in the background
#[post("/v1/events")]
async fn post_event(
    data: web::Data<AppState>,
    event: web::Json<RuntimeEvent<EventPayload>>,
) -> impl Responder {
    let event = event.into_inner();
    tracing::debug!("Received {} event", event.source.event_type());
    data.engine.on_event(event);
    HttpResponse::Accepted().finish()
}

/// Current state of every instance
#[get("/v1/instances")]
async fn list_instances(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.engine.backend().instances().await)
}

/// List available activity kinds
#[get("/v1/executors")]
async fn list_executors(data: web::Data<AppState>) -> impl Responder {
    let registry = data.engine.executors();
    let kinds: Vec<_> = registry
        .list_kinds()
        .into_iter()
        .map(|kind| {
            let metadata = registry.get_metadata(&kind);
            serde_json::json!({
                "kind": kind,
                "description": metadata.as_ref().map(|m| m.description.clone()).unwrap_or_default(),
                "category": metadata.as_ref().map(|m| m.category.clone()).unwrap_or_default(),
            })
        })
        .collect();

    HttpResponse::Ok().json(kinds)
}

/// WebSocket stream of audit events
#[get("/v1/audit")]
async fn audit_stream(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> actix_web::Result<HttpResponse> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    info!("Audit client connected");
    let mut events = data.engine.subscribe_audit();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            if let Ok(json) = serde_json::to_string(&event) {
                                if session.text(json).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!("Audit client lagging, skipped {} events", skipped);
                        }
                        Err(_) => break,
                    }
                }

                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }

                else => break,
            }
        }

        info!("Audit client disconnected");
        let _ = session.close(None).await;
    });

    Ok(res)
}

async fn deploy_directory(engine: &WorkflowEngine, config: &EngineConfig) -> anyhow::Result<()> {
    let Some(dir) = &config.workflows_dir else {
        return Ok(());
    };
    for workflow in WorkflowLoader::new(dir).load_all().await? {
        let deployment_id = engine.deploy_workflow(&workflow).await?;
        info!("Deployed {} from {} as {}", workflow.id, dir.display(), deployment_id);
    }
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting flow server");

    let config = EngineConfig::from_env()?;
    let engine = WorkflowEngine::builder()
        .config(config.clone())
        .executors(flownodes::register_all)
        .build()?;
    deploy_directory(&engine, &config).await?;

    let app_state = web::Data::new(AppState {
        engine: Arc::new(engine),
    });

    info!("Server starting on http://{}", config.bind_address);

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
            .service(deploy_workflow)
            .service(list_deployments)
            .service(execute_workflow)
            .service(get_workflow)
            .service(undeploy_workflow)
            .service(undeploy_deployment)
            .service(post_event)
            .service(list_instances)
            .service(list_executors)
            .service(audit_stream)
    })
    .bind(&config.bind_address)?
    .run()
    .await?;

    Ok(())
}
