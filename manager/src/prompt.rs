use crate::websocket::{PanelEvent, PromptKind, WsBroadcaster};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

/// How long a prompt may sit unanswered before it counts as dismissed.
const PROMPT_TIMEOUT: Duration = Duration::from_secs(300);

/// The dialog surface the editor used to provide. Every question a flow asks
/// goes through this trait; dismissal is always a silent cancellation, never
/// an error.
#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// Yes/no confirmation. Dismissal counts as "no".
    async fn confirm(&self, message: &str) -> bool;

    /// Free-text input. `None` means the user dismissed the box.
    async fn input(&self, message: &str, placeholder: &str) -> Option<String>;

    /// Single selection out of `items`. `None` means dismissed.
    async fn pick(&self, message: &str, items: Vec<String>) -> Option<String>;

    /// Informational notice, fire and forget.
    fn notify(&self, message: &str);
}

/// Pending prompt replies keyed by prompt id.
#[derive(Default)]
pub struct PromptRegistry {
    pending: Mutex<HashMap<Uuid, oneshot::Sender<Option<String>>>>,
}

impl PromptRegistry {
    pub fn register(&self, id: Uuid) -> oneshot::Receiver<Option<String>> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(id, tx);
        }
        rx
    }

    /// Resolve a prompt with the panel's reply. Unknown ids are stale
    /// (already answered or timed out) and are dropped.
    pub fn resolve(&self, id: Uuid, value: Option<String>) {
        let sender = self
            .pending
            .lock()
            .ok()
            .and_then(|mut pending| pending.remove(&id));
        match sender {
            Some(tx) => {
                let _ = tx.send(value);
            }
            None => tracing::debug!("Stale prompt reply: {}", id),
        }
    }

    fn discard(&self, id: Uuid) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&id);
        }
    }
}

/// Prompts routed through the panel: broadcast a `prompt` event carrying a
/// correlation id and await the matching `promptReply`.
pub struct PanelPrompt {
    ws: Arc<WsBroadcaster>,
    registry: Arc<PromptRegistry>,
}

impl PanelPrompt {
    pub fn new(ws: Arc<WsBroadcaster>, registry: Arc<PromptRegistry>) -> Self {
        Self { ws, registry }
    }

    async fn ask(
        &self,
        kind: PromptKind,
        message: &str,
        placeholder: Option<String>,
        items: Vec<String>,
    ) -> Option<String> {
        let id = Uuid::new_v4();
        let rx = self.registry.register(id);

        self.ws.send(PanelEvent::Prompt {
            id,
            kind,
            message: message.to_string(),
            placeholder,
            items,
        });

        match tokio::time::timeout(PROMPT_TIMEOUT, rx).await {
            Ok(Ok(value)) => value,
            _ => {
                self.registry.discard(id);
                None
            }
        }
    }
}

#[async_trait]
impl UserPrompt for PanelPrompt {
    async fn confirm(&self, message: &str) -> bool {
        self.ask(PromptKind::Confirm, message, None, Vec::new())
            .await
            .is_some()
    }

    async fn input(&self, message: &str, placeholder: &str) -> Option<String> {
        self.ask(
            PromptKind::Input,
            message,
            Some(placeholder.to_string()),
            Vec::new(),
        )
        .await
    }

    async fn pick(&self, message: &str, items: Vec<String>) -> Option<String> {
        self.ask(PromptKind::Pick, message, None, items).await
    }

    fn notify(&self, message: &str) {
        self.ws.notice(message);
    }
}
