//! mcpanel: Minecraft content manager for game-server panels.
//!
//! Каталоги модов, плагинов, модпаков, миров и датапаков, фоновые установки
//! через демон ноды, смена ядра, редактор конфигов и иконка сервера.

pub mod api;
pub mod config;
pub mod configs;
pub mod gateway;
pub mod http;
pub mod jobs;
pub mod progress;
pub mod redirect;
pub mod server;
pub mod utils;

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::api::cache::ApiCache;
use crate::api::mcjars::McjarsClient;
use crate::api::vanillatweaks::VanillaTweaksClient;
use crate::api::ProviderRegistry;
use crate::config::AddonConfig;
use crate::configs::{ConfigCatalog, ConfigService};
use crate::gateway::panel::PanelApi;
use crate::gateway::wings::WingsGateway;
use crate::gateway::{PanelServers, ServerGateway};
use crate::http::AppState;
use crate::jobs::{JobContext, JobQueue, JobTimings};
use crate::progress::MemoryProgressStore;
use crate::redirect::{HeadProbe, HttpHeadProbe};
use crate::server::{VersionService, WorldService};

/// User agent for every outbound request except VanillaTweaks
pub const USER_AGENT: &str = "Pterodactyl Panel/v2 (https://pterodactyl.io)";

const PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// Настраивает fern: stdout + файл сессии. Возвращает путь к файлу, если его удалось открыть.
pub fn init_logging(log_dir: &Path) -> Option<PathBuf> {
    let session_id = Local::now().timestamp();
    let log_file = log_dir.join(format!("mcpanel_{}.log", session_id));

    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .level_for("hyper", log::LevelFilter::Warn)
        .level_for("hyper_util", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn)
        .chain(std::io::stdout());

    let file = fs::create_dir_all(log_dir).and_then(|_| fern::log_file(&log_file));
    let (dispatch, opened) = match file {
        Ok(file) => (dispatch.chain(file), true),
        Err(e) => {
            eprintln!("Failed to open log file {:?}: {}", log_file, e);
            (dispatch, false)
        }
    };

    if let Err(e) = dispatch.apply() {
        eprintln!("Failed to initialize logger: {}", e);
        return None;
    }

    log::info!("=== mcpanel {} started ===", env!("CARGO_PKG_VERSION"));
    log::info!("Session ID: {}", session_id);
    opened.then(|| {
        log::info!("Log file: {:?}", log_file);
        log_file
    })
}

/// Собирает все сервисы по конфигурации и запускает очередь задач
pub fn build_state(config: &AddonConfig, shutdown: &CancellationToken) -> anyhow::Result<Arc<AppState>> {
    let cache = ApiCache::default();
    let registry = Arc::new(ProviderRegistry::minecraft(config)?);
    let gateway: Arc<dyn ServerGateway> = Arc::new(WingsGateway::new(&config.daemon)?);
    let panel: Arc<dyn PanelServers> = Arc::new(PanelApi::new(&config.panel)?);
    let progress = Arc::new(MemoryProgressStore::default());
    let probe: Arc<dyn HeadProbe> = Arc::new(HttpHeadProbe::new()?);
    let vanillatweaks = VanillaTweaksClient::new(cache.clone())?;
    let mcjars = McjarsClient::new()?;
    let timings = JobTimings::default();

    let ctx = JobContext {
        registry: registry.clone(),
        gateway: gateway.clone(),
        panel: panel.clone(),
        progress: progress.clone(),
        probe: probe.clone(),
        packs: Arc::new(vanillatweaks.clone()),
        timings,
    };
    let queue = JobQueue::start(Arc::new(ctx), config.job_workers);

    let installer_egg = match config.installer_egg() {
        Ok(id) => Some(id),
        Err(e) => {
            log::warn!("Modpack installs are disabled: {}", e);
            None
        }
    };

    let state = AppState {
        registry: registry.clone(),
        gateway: gateway.clone(),
        panel: panel.clone(),
        queue,
        progress: progress.clone(),
        history: mcpanel_db::HistoryLedger::new(&config.database_path),
        configs: ConfigService::new(gateway.clone(), ConfigCatalog::minecraft()),
        worlds: WorldService::new(gateway.clone(), registry, probe, cache),
        versions: VersionService::new(
            gateway,
            panel,
            Arc::new(mcjars.clone()),
            mcpanel_db::ServerVersionStore::new(&config.database_path),
            timings,
        ),
        mcjars,
        vanillatweaks,
        installer_egg,
        curseforge_api_key: config.curseforge_api_key.clone(),
    };

    spawn_progress_purge(progress, shutdown.clone());
    Ok(Arc::new(state))
}

fn spawn_progress_purge(progress: Arc<MemoryProgressStore>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let purged = progress.purge_expired().await;
                    if purged > 0 {
                        log::debug!("Purged {} expired progress records", purged);
                    }
                }
            }
        }
    });
}

/// Точка входа сервиса
pub async fn run() -> anyhow::Result<()> {
    let config = AddonConfig::load()?;
    init_logging(&config.log_dir);

    mcpanel_db::init_db(&config.database_path)?;
    log::info!("Database path: {:?}", config.database_path);

    let shutdown = CancellationToken::new();
    let state = build_state(&config, &shutdown)?;
    let router = http::router(state);

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        log::info!("Shutdown requested");
        signal.cancel();
    });

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    log::info!("Listening on {}", config.bind);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    log::info!("=== mcpanel stopped ===");
    Ok(())
}
