//! HTTP route handlers
//!
//! Routine CRUD plumbing over the session store plus the process endpoints
//! that drive the dispatcher and orchestrator. Authentication is a pluggable
//! external capability and is not wired here.

use crate::core::batch::{progress, AbortHandle};
use crate::core::types::{BatchSummary, TransformationSettings, UnitSettlement, UnitStatus};
use crate::server::state::AppState;
use crate::storage::sessions::{NewEditRecord, NewWorkUnit, WorkUnitPatch};
use crate::storage::ObjectAcl;
use crate::utils::error::EngineError;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

/// Register all gateway routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .service(
            web::scope("/api")
                .route("/sessions", web::post().to(create_session))
                .route("/sessions", web::get().to(list_sessions))
                .route("/sessions/batch/{batch_id}", web::get().to(batch_snapshot))
                .route(
                    "/sessions/batch/{batch_id}/progress",
                    web::get().to(batch_progress),
                )
                .route("/sessions/{id}", web::get().to(get_session))
                .route("/sessions/{id}", web::patch().to(update_session))
                .route("/sessions/{id}/history", web::get().to(session_history))
                .route("/templates", web::get().to(list_templates))
                .route("/templates/{id}", web::get().to(get_template))
                .route("/process", web::post().to(process_session))
                .route("/process/batch", web::post().to(process_batch))
                .route("/objects/upload", web::post().to(upload_object)),
        )
        .route("/objects/{path:.*}", web::get().to(serve_object))
        .route("/public-objects/{path:.*}", web::get().to(serve_public_object));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn create_session(
    state: web::Data<AppState>,
    body: web::Json<NewWorkUnit>,
) -> Result<HttpResponse, EngineError> {
    let unit = state.sessions.create(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(unit))
}

async fn list_sessions(state: web::Data<AppState>) -> Result<HttpResponse, EngineError> {
    let units = state.sessions.list_all().await?;
    Ok(HttpResponse::Ok().json(units))
}

async fn get_session(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    let unit = state
        .sessions
        .get(&path)
        .await?
        .ok_or_else(|| EngineError::NotFound("Session not found".to_string()))?;
    Ok(HttpResponse::Ok().json(unit))
}

#[derive(Debug, Deserialize)]
struct UpdateSessionRequest {
    prompt: Option<String>,
    settings: Option<TransformationSettings>,
    status: Option<UnitStatus>,
}

async fn update_session(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateSessionRequest>,
) -> Result<HttpResponse, EngineError> {
    let body = body.into_inner();
    let patch = WorkUnitPatch {
        prompt: body.prompt,
        settings: body.settings,
        status: body.status,
        ..Default::default()
    };
    let unit = state
        .sessions
        .update(&path, patch)
        .await?
        .ok_or_else(|| EngineError::NotFound("Session not found".to_string()))?;
    Ok(HttpResponse::Ok().json(unit))
}

async fn session_history(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    let history = state.sessions.history_for(&path).await?;
    Ok(HttpResponse::Ok().json(history))
}

/// Unit-status snapshot for a batch; the polling read surface
async fn batch_snapshot(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    let units = state.sessions.list_by_batch(&path).await?;
    Ok(HttpResponse::Ok().json(units))
}

async fn batch_progress(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    let units = state.sessions.list_by_batch(&path).await?;
    Ok(HttpResponse::Ok().json(progress::project(&units)))
}

#[derive(Debug, Deserialize)]
struct TemplateQuery {
    category: Option<String>,
}

async fn list_templates(
    state: web::Data<AppState>,
    query: web::Query<TemplateQuery>,
) -> Result<HttpResponse, EngineError> {
    let templates = match &query.category {
        Some(category) => state.templates.list_by_category(category).await?,
        None => state.templates.list_active().await?,
    };
    Ok(HttpResponse::Ok().json(templates))
}

async fn get_template(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    let template = state
        .templates
        .get(&path)
        .await?
        .ok_or_else(|| EngineError::NotFound("Template not found".to_string()))?;
    Ok(HttpResponse::Ok().json(template))
}

#[derive(Debug, Deserialize)]
struct ProcessRequest {
    session_id: String,
    prompt: String,
    #[serde(default)]
    settings: Option<TransformationSettings>,
}

/// Single-unit flow: mark processing, dispatch, persist the terminal state
async fn process_session(
    state: web::Data<AppState>,
    body: web::Json<ProcessRequest>,
) -> Result<HttpResponse, EngineError> {
    let body = body.into_inner();
    if body.session_id.trim().is_empty() || body.prompt.trim().is_empty() {
        return Err(EngineError::Validation(
            "Missing required fields: session_id, prompt".to_string(),
        ));
    }

    let unit = state
        .sessions
        .get(&body.session_id)
        .await?
        .ok_or_else(|| EngineError::NotFound("Session not found".to_string()))?;
    let settings = body.settings.unwrap_or_else(|| unit.settings.clone());

    state
        .sessions
        .update(
            &unit.id,
            WorkUnitPatch {
                status: Some(UnitStatus::Processing),
                prompt: Some(body.prompt.clone()),
                processing_started_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await?;

    let started = std::time::Instant::now();
    match state.dispatcher.dispatch(&unit, &body.prompt, &settings).await {
        Ok(output) => {
            let processing_time_ms = started.elapsed().as_millis() as u64;
            let updated = state
                .sessions
                .update(
                    &unit.id,
                    WorkUnitPatch {
                        status: Some(UnitStatus::Completed),
                        result_image: Some(Some(output.url.clone())),
                        processing_completed_at: Some(Utc::now()),
                        ..Default::default()
                    },
                )
                .await?;
            state
                .sessions
                .add_history(NewEditRecord {
                    session_id: unit.id.clone(),
                    image_url: output.url.clone(),
                    prompt: body.prompt,
                    processing_time_ms: Some(processing_time_ms),
                })
                .await?;

            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "session": updated,
                "result": output.url,
                "processing_time_ms": processing_time_ms,
            })))
        }
        Err(e) => {
            error!(unit = %unit.id, error = %e, "processing failed");
            state
                .sessions
                .update(
                    &unit.id,
                    WorkUnitPatch {
                        status: Some(UnitStatus::Error),
                        result_image: Some(None),
                        processing_completed_at: Some(Utc::now()),
                        ..Default::default()
                    },
                )
                .await?;
            Err(EngineError::Provider(e))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProcessBatchRequest {
    batch_id: String,
    prompt: String,
    #[serde(default)]
    settings: Option<TransformationSettings>,
}

#[derive(Debug, Serialize)]
struct SettlementView {
    unit_id: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<UnitSettlement> for SettlementView {
    fn from(settlement: UnitSettlement) -> Self {
        match settlement.outcome {
            Ok(output) => Self {
                unit_id: settlement.unit_id,
                status: "fulfilled",
                result: Some(output.url),
                error: None,
            },
            Err(e) => Self {
                unit_id: settlement.unit_id,
                status: "rejected",
                result: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Run the orchestrator over every unit of a batch.
///
/// The response reports counts only; whether the batch "passed" is the
/// caller's policy.
async fn process_batch(
    state: web::Data<AppState>,
    body: web::Json<ProcessBatchRequest>,
) -> Result<HttpResponse, EngineError> {
    let body = body.into_inner();
    let units = state.sessions.list_by_batch(&body.batch_id).await?;
    if units.is_empty() {
        return Err(EngineError::NotFound(format!(
            "No sessions for batch {}",
            body.batch_id
        )));
    }

    let settings = body.settings.unwrap_or_default();
    let settlements = state
        .orchestrator
        .run_batch(&units, &body.prompt, &settings, &AbortHandle::new())
        .await?;
    let summary = BatchSummary::from_settlements(&settlements);

    Ok(HttpResponse::Ok().json(json!({
        "batch_id": body.batch_id,
        "summary": summary,
        "settlements": settlements
            .into_iter()
            .map(SettlementView::from)
            .collect::<Vec<_>>(),
    })))
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    visibility: Option<String>,
}

async fn upload_object(
    state: web::Data<AppState>,
    request: HttpRequest,
    query: web::Query<UploadQuery>,
    bytes: web::Bytes,
) -> Result<HttpResponse, EngineError> {
    if bytes.is_empty() {
        return Err(EngineError::Validation("empty upload body".to_string()));
    }
    let content_type = request
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");
    let acl = match query.visibility.as_deref() {
        Some("public") => ObjectAcl::Public,
        Some("private") | None => ObjectAcl::Private,
        Some(other) => {
            return Err(EngineError::Validation(format!(
                "unknown visibility: {}",
                other
            )))
        }
    };

    let reference = state.objects.put(bytes, content_type, acl).await?;
    Ok(HttpResponse::Ok().json(json!({ "reference": reference })))
}

/// Stream a stored object; the dereference target of proxy-resolved URLs.
///
/// Serves objects of either visibility; ownership enforcement is a
/// pluggable external capability.
async fn serve_object(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    let reference = format!("/objects/{}", path.as_str());
    let object = state
        .objects
        .get(&reference)
        .await?
        .ok_or_else(|| EngineError::NotFound("Object not found".to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type(object.content_type)
        .body(object.bytes))
}

/// Unauthenticated serving surface: only objects stored with the public
/// ACL are reachable here; private objects 404.
async fn serve_public_object(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    let reference = format!("/objects/{}", path.as_str());
    let object = state
        .objects
        .get(&reference)
        .await?
        .filter(|o| o.acl == ObjectAcl::Public)
        .ok_or_else(|| EngineError::NotFound("File not found".to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type(object.content_type)
        .body(object.bytes))
}
