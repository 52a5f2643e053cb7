use crate::ef::EfCoreManager;
use crate::websocket::{PanelRequest, WsBroadcaster};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Backpressure limit for queued panel actions. A full inbox means the user
/// is clicking faster than `dotnet ef` flows can start; senders drop the
/// request and report instead of blocking.
pub const INBOX_CAPACITY: usize = 64;

pub fn action_channel() -> (mpsc::Sender<PanelRequest>, mpsc::Receiver<PanelRequest>) {
    mpsc::channel(INBOX_CAPACITY)
}

/// Spawn the worker that drains the action inbox one request at a time.
/// Sequential on purpose: a prompt-driven flow like configure-projects must
/// finish (or be dismissed) before the next action starts. Prompt replies
/// never pass through here; the socket session resolves them directly, which
/// is what keeps an in-flight flow from deadlocking against its own answer.
pub fn spawn(
    manager: Arc<EfCoreManager>,
    ws: Arc<WsBroadcaster>,
    mut inbox: mpsc::Receiver<PanelRequest>,
) {
    tokio::spawn(async move {
        info!("Action worker started");
        while let Some(request) = inbox.recv().await {
            if let Err(e) = dispatch(&manager, &request).await {
                error!("Action failed: {}", e);
                ws.error(e.to_string());
            }
            // Every action, failed or not, may have changed the settings.
            ws.update_settings(manager.settings_snapshot());
        }
        info!("Action worker stopped");
    });
}

async fn dispatch(manager: &EfCoreManager, request: &PanelRequest) -> crate::error::AppResult<()> {
    match request {
        PanelRequest::ConfigureProjects => manager.configure_projects().await,
        PanelRequest::CreateMigration { value } => manager.create_migration(value).await,
        PanelRequest::UpdateDatabase => manager.update_database().await,
        PanelRequest::RemoveMigration => manager.remove_last_migration().await,
        PanelRequest::ListMigrations => manager.list_migrations().await,
        PanelRequest::RollbackMigration => manager.rollback_to_migration().await,
        PanelRequest::ScaffoldDbContext => manager.scaffold_db_context().await,
        // A refresh only wants the snapshot pushed after dispatch.
        PanelRequest::Refresh => Ok(()),
        // Stale reply for a prompt that already timed out; nothing to do.
        PanelRequest::PromptReply { .. } => Ok(()),
    }
}
