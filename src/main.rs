use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use shark_bot::application::errors::BotError;
use shark_bot::application::messaging::CommandDispatcher;
use shark_bot::application::services::{spawn_sweeper, SessionStore, UsageLog, SWEEP_INTERVAL};
use shark_bot::commands::builtin_registry;
use shark_bot::domain::entities::{CommandRegistry, Community, Destination, Permissions, User};
use shark_bot::domain::traits::Gateway;
use shark_bot::infrastructure::adapters::console::{run_console, ConsoleGateway};
use shark_bot::infrastructure::adapters::discord::{DiscordClient, GatewayRunner};
use shark_bot::infrastructure::config::Config;
use shark_bot::infrastructure::web::{self, AppState, Credentials};

#[derive(Parser)]
#[command(name = "shark-bot")]
#[command(about = "🦈 Discord slash-command bot with a web dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Dashboard port (overrides config and PORT)
    #[arg(short, long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and serve the dashboard
    Run,
    /// Dispatch commands typed on stdin, without Discord
    Console,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() -> ExitCode {
    let started_at = Instant::now();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok()))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run => with_runtime(run_bot(&cli.config, cli.port, started_at)),
        Commands::Console => with_runtime(run_console_mode(&cli.config, cli.port, started_at)),
        Commands::Version => {
            println!("shark-bot v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::InitConfig => init_config(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` replaces the info default entirely when it parses
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn with_runtime<F>(future: F) -> Result<(), BotError>
where
    F: std::future::Future<Output = Result<(), BotError>>,
{
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| BotError::Internal(format!("failed to start runtime: {}", e)))?;
    rt.block_on(future)
}

fn load_config(path: &Path, port: Option<u16>) -> Result<Config, BotError> {
    let mut config = Config::from_sources(path)?;
    if let Some(port) = port {
        config.web.port = port;
    }
    if config.uses_default_password() {
        tracing::warn!("WEB_PASSWORD is the default; set it before exposing the dashboard");
    }
    Ok(config)
}

/// Everything both modes share: registry, usage log, sessions and the sweeper
struct Core {
    registry: Arc<CommandRegistry>,
    usage: Arc<UsageLog>,
    sessions: Arc<SessionStore>,
    dispatcher: Arc<CommandDispatcher>,
    started_at: Instant,
}

impl Core {
    fn build(config: &Config, started_at: Instant) -> Result<Self, BotError> {
        let registry = Arc::new(builtin_registry().map_err(|e| BotError::Internal(e.to_string()))?);
        let usage = Arc::new(UsageLog::new());
        let sessions = Arc::new(SessionStore::new());
        let dispatcher = Arc::new(CommandDispatcher::new(
            registry.clone(),
            usage.clone(),
            config.discord.owner_id.clone(),
        ));
        if config.discord.owner_id.is_none() {
            tracing::warn!("OWNER_ID is not set; owner-only commands will refuse everyone");
        }
        Ok(Self {
            registry,
            usage,
            sessions,
            dispatcher,
            started_at,
        })
    }

    async fn start_web(
        &self,
        config: &Config,
        gateway: Arc<dyn Gateway>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<tokio::task::JoinHandle<()>, BotError> {
        let state = AppState {
            sessions: self.sessions.clone(),
            usage: self.usage.clone(),
            registry: self.registry.clone(),
            gateway,
            credentials: Arc::new(Credentials::new(&config.web.username, &config.web.password)),
            started_at: self.started_at,
        };

        let listener = TcpListener::bind(("0.0.0.0", config.web.port))
            .await
            .map_err(|e| BotError::Network(format!("cannot bind port {}: {}", config.web.port, e)))?;
        tracing::info!("🌊 Webserver is live at http://localhost:{}", config.web.port);
        tracing::info!("🔐 Login with the configured dashboard credentials");

        let router = web::create_router(state);
        Ok(tokio::spawn(async move {
            if let Err(e) = web::serve(listener, router, shutdown).await {
                tracing::error!("{}", e);
            }
        }))
    }
}

fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down...");
        }
        let _ = tx.send(true);
    });
    rx
}

async fn run_bot(config_path: &Path, port: Option<u16>, started_at: Instant) -> Result<(), BotError> {
    let config = load_config(config_path, port)?;
    let token = config.token()?.to_string();
    let core = Core::build(&config, started_at)?;
    tracing::info!("Loaded {} command(s)", core.registry.len());

    let client = Arc::new(DiscordClient::new(token, &config.discord));
    let shutdown = shutdown_on_ctrl_c();
    let sweeper = spawn_sweeper(core.sessions.clone(), SWEEP_INTERVAL);
    let web = core.start_web(&config, client.clone(), shutdown.clone()).await?;

    let me = client.fetch_current_user().await?;
    tracing::info!("Token accepted for {}", me.tag());

    let runner = GatewayRunner::new(client, core.dispatcher.clone(), config.discord.gateway_url.clone());
    let result = runner.run(shutdown).await;

    sweeper.abort();
    web.abort();
    result
}

async fn run_console_mode(config_path: &Path, port: Option<u16>, started_at: Instant) -> Result<(), BotError> {
    let config = load_config(config_path, port)?;
    let core = Core::build(&config, started_at)?;

    let gateway = Arc::new(ConsoleGateway::new().with_echo());
    gateway.set_communities(vec![Community {
        id: "console-guild".to_string(),
        name: "Console Reef".to_string(),
        destinations: vec![Destination {
            id: "console-general".to_string(),
            name: "general".to_string(),
            text_based: true,
            permissions: Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES,
        }],
    }]);

    let shutdown = shutdown_on_ctrl_c();
    let sweeper = spawn_sweeper(core.sessions.clone(), SWEEP_INTERVAL);
    let web = core.start_web(&config, gateway.clone(), shutdown.clone()).await?;

    let user_id = config
        .discord
        .owner_id
        .clone()
        .unwrap_or_else(|| "console-user".to_string());
    let user = User::new(user_id, "console");

    let mut shutdown = shutdown;
    let result = tokio::select! {
        result = run_console(gateway, core.dispatcher.clone(), user) => result,
        _ = shutdown.changed() => Ok(()),
    };

    sweeper.abort();
    web.abort();
    result
}

fn init_config() -> Result<(), BotError> {
    let yaml = Config::default().to_yaml()?;
    println!("{}", yaml);
    println!("\nSave this to config.yaml and adjust as needed.");
    Ok(())
}
