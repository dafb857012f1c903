//! CEC Remote - Raspberry Pi HDMI-CEC bridge binary
//!
//! Runs the button monitor and web API, or sends a single command and exits.

use anyhow::Context;
use cec_remote::{
    channel_from_config,
    config::ChannelMode,
    input::DefaultInputSource,
    start_web_server, AppConfig, AppState, BroadcastSink, ButtonMonitor, CommandKind, Dispatcher,
    LogSink, Source, DEFAULT_WEB_PORT, EVENT_BROADCAST_CAPACITY, PRESS_QUEUE_CAPACITY,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "cec_remote")]
#[command(about = "📺 CEC Remote - HDMI-CEC power control from buttons and the web")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Forwards GPIO button presses and HTTP requests to cec-client as HDMI-CEC commands")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Web server bind address
    #[arg(long)]
    host: Option<String>,

    /// Web server port
    #[arg(short, long)]
    port: Option<u16>,

    /// How to drive cec-client
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Disable button monitoring (useful for non-Pi systems)
    #[arg(long)]
    no_gpio: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Keep one cec-client running
    Persistent,
    /// Start cec-client per command
    Oneshot,
}

impl From<ModeArg> for ChannelMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Persistent => ChannelMode::Persistent,
            ModeArg::Oneshot => ChannelMode::Oneshot,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the button monitor and web server (default)
    Serve(ServeArgs),

    /// Send one raw command and print the response
    Send {
        /// Command text, e.g. "tx 10:04"
        #[arg(required = true, num_args = 1..)]
        command: Vec<String>,
    },

    /// Scan the CEC bus and print the devices
    Scan,

    /// Print the TV power status
    Status,
}

#[derive(Args)]
struct ServeArgs {
    /// Directory with a custom index.html
    #[arg(long)]
    static_dir: Option<String>,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,

    /// Maximum live event connections
    #[arg(long)]
    max_connections: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let config = load_config(&cli)?;

    match &cli.command {
        Some(Commands::Serve(_)) | None => serve_command(config).await,
        Some(Commands::Send { command }) => {
            one_command(config, CommandKind::Custom(command.join(" "))).await
        }
        Some(Commands::Scan) => one_command(config, CommandKind::Scan).await,
        Some(Commands::Status) => one_command(config, CommandKind::Status).await,
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(cli, &directives))
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// `RUST_LOG` directives win; otherwise the level comes from `-v`/`-d`.
fn log_filter(cli: &Cli, directives: &str) -> EnvFilter {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .parse_lossy(directives)
}

/// Read the config file, if any, then apply command line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AppConfig::default(),
    };

    if let Some(host) = &cli.host {
        config.web.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(mode) = cli.mode {
        config.cec.mode = mode.into();
    }
    if cli.no_gpio {
        config.inputs.enabled = false;
    }
    if let Some(Commands::Serve(args)) = &cli.command {
        if let Some(dir) = &args.static_dir {
            config.web.static_path = Some(dir.clone());
        }
        if args.no_cors {
            config.web.enable_cors = false;
        }
        if let Some(max) = args.max_connections {
            config.web.max_websocket_connections = max;
        }
    }

    config.validate()?;
    Ok(config)
}

fn print_banner(config: &AppConfig) {
    println!("📺 CEC Remote - HDMI-CEC Bridge");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "   Buttons: ON=BCM{} OFF=BCM{} ({})",
        config.inputs.on_pin,
        config.inputs.off_pin,
        if config.inputs.enabled { "enabled" } else { "disabled" }
    );
    println!("   Channel: {} ({:?})", config.cec.program, config.cec.mode);
    println!();
}

async fn serve_command(config: AppConfig) -> anyhow::Result<()> {
    print_banner(&config);
    info!("Starting CEC remote...");

    let events = BroadcastSink::new(EVENT_BROADCAST_CAPACITY);
    let dispatcher = Arc::new(
        Dispatcher::new(channel_from_config(&config.cec), &config.dispatch)
            .with_sink(Arc::new(LogSink))
            .with_sink(Arc::new(events.clone())),
    );

    // Bring cec-client up before the first press needs it.
    {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            if let Err(e) = dispatcher.channel().ensure_connected().await {
                warn!("CEC client not ready yet: {}", e);
            }
        });
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut tasks = Vec::new();
    let gpio_enabled = if config.inputs.enabled {
        match DefaultInputSource::new(&config.inputs) {
            Ok(source) => {
                let (press_tx, press_rx) = mpsc::channel(PRESS_QUEUE_CAPACITY);
                tasks.push(dispatcher.spawn_press_handler(press_rx));
                let monitor = ButtonMonitor::new(
                    source,
                    config.inputs.sample_interval(),
                    config.inputs.debounce(),
                );
                tasks.push(monitor.spawn(press_tx, stop_rx));
                true
            }
            Err(e) => {
                warn!("Button monitoring unavailable, continuing web-only: {}", e);
                false
            }
        }
    } else {
        info!("Button monitoring disabled");
        false
    };

    debug!("Configuration: {:?}", config);

    let state = AppState::new(
        Arc::clone(&dispatcher),
        events,
        gpio_enabled,
        config.web.max_websocket_connections,
    );
    let served = start_web_server(config.web.clone(), state, shutdown_signal()).await;

    let _ = stop_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            error!("Background task failed: {}", e);
        }
    }
    dispatcher.shutdown().await;
    info!("CEC remote stopped");

    served.context("web server failed")
}

/// Send one command through a fresh dispatcher and print the response.
async fn one_command(config: AppConfig, kind: CommandKind) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::new(channel_from_config(&config.cec), &config.dispatch)
        .with_sink(Arc::new(LogSink));
    let outcome = dispatcher.dispatch(kind, Source::Api).await;
    dispatcher.shutdown().await;

    println!("{}", outcome.text().trim_end());
    if outcome.is_success() {
        Ok(())
    } else {
        anyhow::bail!("command {}", outcome)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown requested");
}
