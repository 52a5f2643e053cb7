use crate::ef::EfCoreManager;
use crate::handlers::AppState;
use crate::models::ProjectSettings;
use crate::prompt::PromptRegistry;
use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(90);

/// Requests the panel (or the HTTP action endpoint) may send. A closed set:
/// anything that fails to parse is logged and ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PanelRequest {
    ConfigureProjects,
    CreateMigration { value: String },
    UpdateDatabase,
    RemoveMigration,
    ListMigrations,
    RollbackMigration,
    ScaffoldDbContext,
    Refresh,
    PromptReply { id: Uuid, value: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PromptKind {
    Confirm,
    Input,
    Pick,
}

/// Events pushed from the daemon to the panel.
#[derive(Debug, Clone, Serialize, Deserialize, Message)]
#[serde(tag = "type", rename_all = "camelCase")]
#[rtype(result = "()")]
pub enum PanelEvent {
    UpdateSettings {
        settings: Option<ProjectSettings>,
    },
    Notice {
        message: String,
    },
    Error {
        message: String,
    },
    Prompt {
        id: Uuid,
        kind: PromptKind,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        items: Vec<String>,
    },
    TerminalOutput {
        content: String,
    },
    ShowTerminal,
}

/// One connected panel.
pub struct WsSession {
    client_id: Uuid,
    /// Last heartbeat time
    hb: Instant,
    server: Addr<WsServer>,
    manager: Arc<EfCoreManager>,
    prompts: Arc<PromptRegistry>,
    actions: mpsc::Sender<PanelRequest>,
}

impl WsSession {
    pub fn new(
        server: Addr<WsServer>,
        manager: Arc<EfCoreManager>,
        prompts: Arc<PromptRegistry>,
        actions: mpsc::Sender<PanelRequest>,
    ) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            hb: Instant::now(),
            server,
            manager,
            prompts,
            actions,
        }
    }

    fn hb(&self, ctx: &mut <Self as Actor>::Context) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(
                    "Panel client {} failed heartbeat, disconnecting",
                    act.client_id
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn send_event(&self, ctx: &mut ws::WebsocketContext<Self>, event: &PanelEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            ctx.text(json);
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("Panel connected: {}", self.client_id);

        self.hb(ctx);

        self.server.do_send(Connect {
            client_id: self.client_id,
            addr: ctx.address(),
        });

        // Push the current snapshot so the panel renders without asking.
        let snapshot = PanelEvent::UpdateSettings {
            settings: self.manager.settings_snapshot(),
        };
        self.send_event(ctx, &snapshot);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        tracing::info!("Panel disconnected: {}", self.client_id);
        self.server.do_send(Disconnect {
            client_id: self.client_id,
        });
        Running::Stop
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                match serde_json::from_str::<PanelRequest>(&text) {
                    // Prompt replies resolve a waiting flow and must bypass
                    // the action inbox, or that flow would never drain it.
                    Ok(PanelRequest::PromptReply { id, value }) => {
                        self.prompts.resolve(id, value);
                    }
                    Ok(request) => {
                        tracing::debug!("Panel request: {:?}", request);
                        if self.actions.try_send(request).is_err() {
                            tracing::warn!("Action inbox full, dropping panel request");
                            self.send_event(
                                ctx,
                                &PanelEvent::Error {
                                    message: "Too many pending actions".to_string(),
                                },
                            );
                        }
                    }
                    Err(e) => {
                        // Unrecognized tags are ignored, not answered.
                        tracing::warn!("Ignoring unrecognized panel message: {}", e);
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::debug!("Binary message received (ignored)");
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => {
                ctx.stop();
            }
        }
    }
}

impl Handler<PanelEvent> for WsSession {
    type Result = ();

    fn handle(&mut self, event: PanelEvent, ctx: &mut Self::Context) {
        self.send_event(ctx, &event);
    }
}

/// Registry of connected panels.
#[derive(Debug, Default)]
pub struct WsServer {
    connections: HashMap<Uuid, Addr<WsSession>>,
}

impl Actor for WsServer {
    type Context = Context<Self>;
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub client_id: Uuid,
    pub addr: Addr<WsSession>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub client_id: Uuid,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Broadcast {
    pub event: PanelEvent,
}

impl Handler<Connect> for WsServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Self::Context) {
        self.connections.insert(msg.client_id, msg.addr);
    }
}

impl Handler<Disconnect> for WsServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Self::Context) {
        self.connections.remove(&msg.client_id);
    }
}

impl Handler<Broadcast> for WsServer {
    type Result = ();

    fn handle(&mut self, msg: Broadcast, _: &mut Self::Context) {
        let mut to_remove = Vec::new();
        for (client_id, addr) in &self.connections {
            if addr.try_send(msg.event.clone()).is_err() {
                tracing::warn!("Failed to send event to panel {}", client_id);
                to_remove.push(*client_id);
            }
        }
        for client_id in to_remove {
            self.connections.remove(&client_id);
        }
    }
}

/// Fire-and-forget event fan-out to every connected panel.
pub struct WsBroadcaster {
    server: Addr<WsServer>,
}

impl WsBroadcaster {
    pub fn new(server: Addr<WsServer>) -> Self {
        Self { server }
    }

    pub fn send(&self, event: PanelEvent) {
        self.server.do_send(Broadcast { event });
    }

    pub fn update_settings(&self, settings: Option<ProjectSettings>) {
        self.send(PanelEvent::UpdateSettings { settings });
    }

    pub fn notice(&self, message: impl Into<String>) {
        self.send(PanelEvent::Notice {
            message: message.into(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(PanelEvent::Error {
            message: message.into(),
        });
    }

    pub fn terminal_output(&self, content: String) {
        self.send(PanelEvent::TerminalOutput { content });
    }

    pub fn show_terminal(&self) {
        self.send(PanelEvent::ShowTerminal);
    }
}

/// WebSocket endpoint handler
pub async fn websocket_handler(
    req: HttpRequest,
    stream: web::Payload,
    srv: web::Data<Addr<WsServer>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    ws::start(
        WsSession::new(
            srv.get_ref().clone(),
            Arc::clone(&state.manager),
            Arc::clone(&state.prompts),
            state.actions.clone(),
        ),
        &req,
        stream,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_tags_parse() {
        let cases = [
            r#"{"type":"configureProjects"}"#,
            r#"{"type":"createMigration","value":"AddUser"}"#,
            r#"{"type":"updateDatabase"}"#,
            r#"{"type":"removeMigration"}"#,
            r#"{"type":"listMigrations"}"#,
            r#"{"type":"rollbackMigration"}"#,
            r#"{"type":"scaffoldDbContext"}"#,
            r#"{"type":"refresh"}"#,
        ];
        for case in cases {
            assert!(
                serde_json::from_str::<PanelRequest>(case).is_ok(),
                "failed to parse {case}"
            );
        }
    }

    #[test]
    fn create_migration_carries_its_value() {
        let request: PanelRequest =
            serde_json::from_str(r#"{"type":"createMigration","value":"AddUser"}"#).unwrap();
        match request {
            PanelRequest::CreateMigration { value } => assert_eq!(value, "AddUser"),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn prompt_reply_round_trips() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"type":"promptReply","id":"{id}","value":null}}"#);
        let request: PanelRequest = serde_json::from_str(&json).unwrap();
        match request {
            PanelRequest::PromptReply { id: parsed, value } => {
                assert_eq!(parsed, id);
                assert_eq!(value, None);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn unknown_tags_do_not_parse() {
        assert!(serde_json::from_str::<PanelRequest>(r#"{"type":"dropDatabase"}"#).is_err());
    }

    #[test]
    fn update_settings_event_shape() {
        let event = PanelEvent::UpdateSettings {
            settings: Some(ProjectSettings::new(
                "A/A.csproj".to_string(),
                "B/B.csproj".to_string(),
            )),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "updateSettings");
        assert_eq!(json["settings"]["startupProjectPath"], "A/A.csproj");
        assert_eq!(json["settings"]["migrationProjectPath"], "B/B.csproj");
    }

    #[test]
    fn unconfigured_snapshot_serializes_null_settings() {
        let event = PanelEvent::UpdateSettings { settings: None };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["settings"].is_null());
    }

    #[test]
    fn prompt_event_shape() {
        let event = PanelEvent::Prompt {
            id: Uuid::new_v4(),
            kind: PromptKind::Pick,
            message: "Select database provider".to_string(),
            placeholder: None,
            items: vec!["Npgsql.EntityFrameworkCore.PostgreSQL".to_string()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "prompt");
        assert_eq!(json["kind"], "pick");
        assert_eq!(json["items"][0], "Npgsql.EntityFrameworkCore.PostgreSQL");
        assert!(json.get("placeholder").is_none());
    }
}
