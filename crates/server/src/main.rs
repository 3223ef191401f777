use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokgrab_core::{
    load_config, validate_config, AcquisitionBackend, BroadcastSink, DownloadOrchestrator,
    DownloadStore, FanoutSink, NotificationSink, ProfileScraper, SessionFactory, SiteBackend,
    SqliteDownloadStore, TracingSink, WebDriverProfileScraper, WebDriverSessionFactory,
};

use tokgrab_server::api::create_router;
use tokgrab_server::state::AppState;
use tokgrab_server::telegram::{ChatTransport, HttpTransport, NotifyRoute, TelegramBot, TelegramSink};

/// Buffer size for the run event channel
const EVENT_BUFFER_SIZE: usize = 256;

/// How long shutdown waits for a cancelled run to finish its in-flight items
const SHUTDOWN_GRACE: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("TOKGRAB_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Download path: {:?}", config.downloads.download_path);
    info!(
        "Workers: {}, delay between downloads: {}s",
        config.downloads.max_workers, config.downloads.delay_between_downloads
    );

    // Create SQLite download store
    let store: Arc<dyn DownloadStore> = Arc::new(
        SqliteDownloadStore::new(&config.database.path)
            .context("Failed to create download store")?,
    );
    info!("Download store initialized");

    // Browser sessions go through the WebDriver endpoint
    let sessions: Arc<dyn SessionFactory> =
        Arc::new(WebDriverSessionFactory::new().context("Failed to create WebDriver client")?);
    info!("Using WebDriver at {}", config.browser.webdriver_url);

    let backend: Arc<dyn AcquisitionBackend> =
        Arc::new(SiteBackend::new(config.acquisition.clone()));

    let scraper: Arc<dyn ProfileScraper> = Arc::new(WebDriverProfileScraper::new(
        Arc::clone(&sessions),
        config.browser.clone(),
        config.scraper.clone(),
    ));

    // Notification sinks: WebSocket broadcast, log, and Telegram when enabled
    let events = BroadcastSink::new(EVENT_BUFFER_SIZE);
    let mut sinks = FanoutSink::new()
        .with(Arc::new(events.clone()))
        .with(Arc::new(TracingSink));

    let telegram = if config.telegram.telegram_enabled {
        let transport: Arc<dyn ChatTransport> = Arc::new(
            HttpTransport::new(&config.telegram).context("Failed to create Telegram client")?,
        );
        let route = NotifyRoute::new();
        sinks = sinks.with(Arc::new(TelegramSink::new(
            Arc::clone(&transport),
            route.clone(),
        )));
        Some((transport, route))
    } else {
        info!("Telegram bot disabled in config");
        None
    };

    let sink: Arc<dyn NotificationSink> = Arc::new(sinks);

    let orchestrator = Arc::new(DownloadOrchestrator::new(
        &config,
        Arc::clone(&store),
        sessions,
        backend,
        sink,
    ));
    info!("Download orchestrator ready");

    // Start the Telegram front-end
    let bot_handle = telegram.map(|(transport, route)| {
        let bot = TelegramBot::new(
            transport,
            Arc::clone(&orchestrator),
            Arc::clone(&store),
            Arc::clone(&scraper),
            route,
            config.telegram.poll_timeout_secs,
        );
        tokio::spawn(async move { bot.run().await })
    });

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&orchestrator),
        store,
        scraper,
        events,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    if let Some(handle) = bot_handle {
        handle.abort();
        info!("Telegram bot stopped");
    }

    // Let an in-flight run drain so its browser sessions are closed
    if orchestrator.is_busy() {
        info!("Cancelling in-progress download run");
        orchestrator.cancel();
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while orchestrator.is_busy() {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        })
        .await;
        if drained.is_err() {
            warn!("Download run still active after {:?}, exiting anyway", SHUTDOWN_GRACE);
        }
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
}
