use crate::config::AppConfig;
use crate::ef::EfCoreManager;
use crate::error::{AppError, AppResult};
use crate::models::{ActionQueuedResponse, ProjectFilesResponse, ServerStatus, SettingsResponse};
use crate::prompt::PromptRegistry;
use crate::websocket::PanelRequest;
use actix_web::{web, HttpResponse, Result};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::warn;

/// Shared state for every HTTP handler and socket session.
pub struct AppState {
    pub manager: Arc<EfCoreManager>,
    pub prompts: Arc<PromptRegistry>,
    pub actions: mpsc::Sender<PanelRequest>,
    pub config: Arc<AppConfig>,
    pub start_time: SystemTime,
}

pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse> {
    let uptime = state
        .start_time
        .elapsed()
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Ok(HttpResponse::Ok().json(ServerStatus {
        status: "running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime,
    }))
}

/// Current workspace settings, `null` when not yet configured.
pub async fn get_settings(state: web::Data<AppState>) -> Result<HttpResponse> {
    let workspace = state
        .manager
        .workspace_root()
        .map(|p| p.to_string_lossy().into_owned());

    Ok(HttpResponse::Ok().json(SettingsResponse {
        workspace,
        settings: state.manager.settings_snapshot(),
        storage_path: state.config.storage.path.to_string_lossy().into_owned(),
    }))
}

pub async fn get_projects(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let projects = state.manager.find_csproj_files()?;
    Ok(HttpResponse::Ok().json(ProjectFilesResponse { projects }))
}

/// Queue a panel action from outside the panel, e.g. `curl -d
/// '{"type":"listMigrations"}'`. The action worker runs it exactly as if a
/// panel button had been clicked; prompts still go to connected panels.
pub async fn enqueue_action(
    state: web::Data<AppState>,
    request: web::Json<PanelRequest>,
) -> AppResult<HttpResponse> {
    let request = request.into_inner();

    if matches!(request, PanelRequest::PromptReply { .. }) {
        return Err(AppError::InvalidRequest(
            "promptReply is only valid on the panel socket".to_string(),
        ));
    }

    state.actions.try_send(request).map_err(|e| {
        warn!("Action inbox full: {}", e);
        AppError::Internal("Action queue is full, try again shortly".to_string())
    })?;

    Ok(HttpResponse::Accepted().json(ActionQueuedResponse {
        status: "queued".to_string(),
    }))
}
