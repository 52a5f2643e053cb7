use actix::Actor;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use efcore_manager::bridge;
use efcore_manager::config::AppConfig;
use efcore_manager::ef::EfCoreManager;
use efcore_manager::handlers::{self, AppState};
use efcore_manager::panel;
use efcore_manager::prompt::{PanelPrompt, PromptRegistry, UserPrompt};
use efcore_manager::store::SettingsStore;
use efcore_manager::terminal::{Terminal, TerminalRunner};
use efcore_manager::websocket::{self, WsBroadcaster, WsServer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "efcore-manager",
    version,
    about = "EF Core Manager - project configuration and migration daemon"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Workspace directory to manage (overrides the configured one)
    #[arg(short, long, value_name = "DIR")]
    workspace: Option<PathBuf>,
}

/// The workspace may come from the command line, the config file, or nowhere
/// at all. No workspace is a valid state; commands then fail with the
/// no-workspace message instead of guessing a directory.
fn resolve_workspace(cli: Option<PathBuf>, config: &AppConfig) -> anyhow::Result<Option<PathBuf>> {
    let configured = config
        .workspace
        .as_ref()
        .and_then(|w| w.path.clone());

    match cli.or(configured) {
        Some(path) => {
            let canonical = path
                .canonicalize()
                .with_context(|| format!("Workspace directory not found: {}", path.display()))?;
            Ok(Some(canonical))
        }
        None => Ok(None),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("efcore_manager=info".parse().unwrap()))
        .init();

    tracing::info!("Starting EF Core Manager daemon");

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load()?,
    };

    let workspace = resolve_workspace(cli.workspace, &config)?;
    match &workspace {
        Some(path) => tracing::info!("Managing workspace {}", path.display()),
        None => tracing::warn!("No workspace configured; pass --workspace to manage one"),
    }

    let store = Arc::new(SettingsStore::load(&config.storage.path)?);
    tracing::info!("Settings store loaded from {:?}", config.storage.path);

    let ws_server = WsServer::default().start();
    let ws_server_data = web::Data::new(ws_server.clone());
    let broadcaster = Arc::new(WsBroadcaster::new(ws_server));

    let prompts = Arc::new(PromptRegistry::default());
    let prompt: Arc<dyn UserPrompt> = Arc::new(PanelPrompt::new(
        Arc::clone(&broadcaster),
        Arc::clone(&prompts),
    ));
    let terminal: Arc<dyn Terminal> = Arc::new(TerminalRunner::new(Arc::clone(&broadcaster)));

    let manager = Arc::new(EfCoreManager::new(store, workspace, terminal, prompt));

    let (actions, inbox) = bridge::action_channel();
    bridge::spawn(Arc::clone(&manager), Arc::clone(&broadcaster), inbox);

    let app_state = web::Data::new(AppState {
        manager,
        prompts,
        actions,
        config: Arc::new(config.clone()),
        start_time: SystemTime::now(),
    });

    let server_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Starting HTTP server on {}", server_addr);
    tracing::info!("Panel available at http://{}/", server_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(ws_server_data.clone())
            .wrap(Logger::default())
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health_check))
                    .route("/settings", web::get().to(handlers::get_settings))
                    .route("/projects", web::get().to(handlers::get_projects))
                    .route("/actions", web::post().to(handlers::enqueue_action)),
            )
            .route("/ws", web::get().to(websocket::websocket_handler))
            .route("/", web::get().to(panel::panel_page))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
