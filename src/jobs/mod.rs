//! Фоновые установки: очередь, общий контекст и запуск задач.
//!
//! HTTP-обработчик только кладёт задачу в очередь и сразу отвечает id.
//! Итог задачи пишется в хранилище прогресса один раз.

pub mod content;
pub mod datapack;
pub mod modpack;
pub mod world;

use mcpanel_core::{
    ContentKind, JobKind, JobPhase, JobStatus, PackType, ProgressRecord, ProviderKind, Result,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

use crate::api::ProviderRegistry;
use crate::gateway::{PanelServers, PowerSignal, ProcessState, ServerGateway};
use crate::progress::ProgressStore;
use crate::redirect::HeadProbe;
use crate::utils::gen_short_id;
pub use datapack::PackArchiveSource;

/// Интервалы и пределы ожиданий. В тестах заменяются на миллисекунды.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTimings {
    pub offline_poll: Duration,
    pub offline_attempts: u32,
    pub archive_poll: Duration,
    pub archive_timeout: Duration,
    pub reinstall_grace: Duration,
    pub revert_interval: Duration,
    pub revert_attempts: u32,
}

impl Default for JobTimings {
    fn default() -> Self {
        Self {
            offline_poll: Duration::from_secs(1),
            offline_attempts: 60,
            archive_poll: Duration::from_secs(3),
            archive_timeout: Duration::from_secs(120),
            reinstall_grace: Duration::from_secs(10),
            revert_interval: Duration::from_secs(10),
            revert_attempts: 120,
        }
    }
}

impl JobTimings {
    #[cfg(test)]
    pub fn fast() -> Self {
        Self {
            offline_poll: Duration::from_millis(1),
            offline_attempts: 5,
            archive_poll: Duration::from_millis(5),
            archive_timeout: Duration::from_millis(30),
            reinstall_grace: Duration::from_millis(1),
            revert_interval: Duration::from_millis(1),
            revert_attempts: 5,
        }
    }
}

/// Что именно устанавливается
#[derive(Debug, Clone, PartialEq)]
pub enum JobRequest {
    /// Мод или плагин: файл скачивается демоном прямо в `mods`/`plugins`
    Content {
        domain: ContentKind,
        provider: ProviderKind,
        item_id: String,
        version_id: String,
    },
    Modpack {
        provider: ProviderKind,
        modpack_id: String,
        version_id: String,
        delete_server_files: bool,
        installer_egg: u64,
        curseforge_api_key: String,
    },
    World {
        provider: ProviderKind,
        world_id: String,
        version_id: String,
    },
    Datapack {
        version: String,
        pack_type: PackType,
        packs: serde_json::Map<String, serde_json::Value>,
        world: String,
    },
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Content {
                domain: ContentKind::Plugin,
                ..
            } => JobKind::Plugin,
            Self::Content { .. } => JobKind::Mod,
            Self::Modpack { .. } => JobKind::Modpack,
            Self::World { .. } => JobKind::World,
            Self::Datapack { .. } => JobKind::Datapack,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstallJob {
    pub id: String,
    pub server_id: String,
    pub request: JobRequest,
}

impl InstallJob {
    pub fn new(server_id: impl Into<String>, request: JobRequest) -> Self {
        Self {
            id: format!("{}_{}", request.kind().as_str(), gen_short_id(13)),
            server_id: server_id.into(),
            request,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.request.kind()
    }

    pub fn progress_key(&self) -> String {
        self.kind().progress_key(&self.id)
    }

    fn record(&self, filename: &str, status: JobStatus) -> ProgressRecord {
        ProgressRecord::new(&self.id, &self.server_id, filename, status)
    }
}

/// Ключ прогресса по одному id: вид задачи зашит в префикс id
pub fn progress_key_for(job_id: &str) -> String {
    let kind = [JobKind::Modpack, JobKind::Datapack, JobKind::World, JobKind::Plugin]
        .into_iter()
        .find(|kind| job_id.starts_with(&format!("{}_", kind.as_str())))
        .unwrap_or(JobKind::Mod);
    kind.progress_key(job_id)
}

/// Итог задачи
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub filename: String,
    pub decompressed: bool,
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn completed(filename: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            filename: filename.into(),
            decompressed: false,
            error: None,
        }
    }

    pub fn failed(filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            filename: filename.into(),
            decompressed: false,
            error: Some(error.into()),
        }
    }

    pub fn timeout(filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Timeout,
            ..Self::failed(filename, error)
        }
    }

    pub fn decompressed(mut self) -> Self {
        self.decompressed = true;
        self
    }
}

/// Всё, что нужно задачам для работы
pub struct JobContext {
    pub registry: Arc<ProviderRegistry>,
    pub gateway: Arc<dyn ServerGateway>,
    pub panel: Arc<dyn PanelServers>,
    pub progress: Arc<dyn ProgressStore>,
    pub probe: Arc<dyn HeadProbe>,
    pub packs: Arc<dyn PackArchiveSource>,
    pub timings: JobTimings,
}

impl JobContext {
    pub(crate) fn phase(&self, job: &InstallJob, phase: JobPhase) {
        log::info!("[{}] {} job for server {}: {}", job.id, job.kind().as_str(), job.server_id, phase.as_str());
    }

    /// Промежуточный статус `downloading`
    pub(crate) async fn report_downloading(&self, job: &InstallJob, filename: &str) {
        self.progress
            .put(&job.progress_key(), job.record(filename, JobStatus::Downloading))
            .await;
    }
}

/// Выполняет задачу до конца и пишет итог
pub async fn run_job(ctx: &JobContext, job: InstallJob) -> JobOutcome {
    ctx.phase(&job, JobPhase::Preparing);

    let outcome = match &job.request {
        JobRequest::Content { .. } => content::run(ctx, &job).await,
        JobRequest::Modpack { .. } => modpack::run(ctx, &job).await,
        JobRequest::World { .. } => world::run(ctx, &job).await,
        JobRequest::Datapack { .. } => datapack::run(ctx, &job).await,
    };

    let phase = match outcome.status {
        JobStatus::Completed => JobPhase::Completed,
        JobStatus::Timeout => JobPhase::Timeout,
        _ => JobPhase::Failed,
    };
    ctx.phase(&job, phase);
    if let Some(error) = &outcome.error {
        log::warn!("[{}] finished with {}: {}", job.id, outcome.status.as_str(), error);
    }

    let mut record = job.record(&outcome.filename, outcome.status);
    record.decompressed = outcome.decompressed;
    record.error = outcome.error.clone();
    ctx.progress.put(&job.progress_key(), record).await;
    outcome
}

/// Очередь задач: канал + диспетчер, число одновременных задач ограничено семафором
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<InstallJob>,
    progress: Arc<dyn ProgressStore>,
}

impl JobQueue {
    pub fn start(ctx: Arc<JobContext>, workers: usize) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<InstallJob>();
        let progress = ctx.progress.clone();

        tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(workers.max(1)));
            while let Some(job) = receiver.recv().await {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        log::error!("Job semaphore closed: {}", e);
                        break;
                    }
                };
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    run_job(&ctx, job).await;
                });
            }
            log::info!("Job queue stopped");
        });

        Self { sender, progress }
    }

    /// Кладёт задачу в очередь и возвращает её id
    pub async fn enqueue(&self, job: InstallJob) -> Result<String> {
        let id = job.id.clone();
        self.progress
            .put(&job.progress_key(), job.record("", JobStatus::Downloading))
            .await;
        log::info!("[{}] queued {} job for server {}", id, job.kind().as_str(), job.server_id);

        let key = job.progress_key();
        if let Err(mpsc::error::SendError(job)) = self.sender.send(job) {
            log::error!("[{}] job queue is not running, job dropped", id);
            let mut record = job.record("", JobStatus::Failed);
            record.error = Some("Job queue is not running".to_string());
            self.progress.put(&key, record).await;
            return Err(mcpanel_core::AddonError::Join("job queue is not running".into()));
        }
        Ok(id)
    }
}

// ============================================================================
// Shared steps
// ============================================================================

/// Посылает kill и ждёт offline. По истечении попыток идёт дальше.
pub(crate) async fn stop_server(gateway: &dyn ServerGateway, server: &str, timings: &JobTimings) -> bool {
    if let Err(e) = gateway.send_power(server, PowerSignal::Kill).await {
        log::warn!("Failed to kill server {}: {}", server, e);
    }

    for _ in 0..timings.offline_attempts {
        match gateway.get_state(server).await {
            Ok(ProcessState::Offline) => return true,
            Ok(_) => {}
            Err(e) => log::debug!("State poll for {} failed: {}", server, e),
        }
        tokio::time::sleep(timings.offline_poll).await;
    }
    log::warn!("Server {} did not report offline, continuing anyway", server);
    false
}

/// Удаляет всё из корня сервера. Ошибки только логируются.
pub(crate) async fn wipe_server_files(gateway: &dyn ServerGateway, server: &str) {
    let names = match crate::gateway::root_file_names(gateway, server).await {
        Ok(names) => names,
        Err(e) => {
            log::warn!("Failed to list files of {} for wipe: {}", server, e);
            return;
        }
    };
    if names.is_empty() {
        return;
    }
    if let Err(e) = gateway.delete_files(server, "/", &names).await {
        log::warn!("Failed to wipe files of {}: {}", server, e);
    }
}

/// Последний сегмент URL без query
pub(crate) fn url_filename(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("download")
        .to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::api::testing::StaticProvider;
    use crate::gateway::testing::{FakeGateway, FakePanel};
    use crate::progress::MemoryProgressStore;
    use crate::redirect::testing::ScriptedProbe;
    use async_trait::async_trait;

    pub struct StaticPacks {
        pub archive: std::result::Result<Vec<u8>, String>,
    }

    #[async_trait]
    impl PackArchiveSource for StaticPacks {
        async fn build_archive(
            &self,
            _version: &str,
            _pack_type: PackType,
            _packs: &serde_json::Map<String, serde_json::Value>,
        ) -> Result<Vec<u8>> {
            self.archive
                .clone()
                .map_err(|reason| mcpanel_core::AddonError::resolution("vanillatweaks", reason))
        }
    }

    pub struct Harness {
        pub gateway: Arc<FakeGateway>,
        pub panel: Arc<FakePanel>,
        pub progress: Arc<MemoryProgressStore>,
        pub ctx: JobContext,
    }

    pub fn harness(
        gateway: FakeGateway,
        panel: FakePanel,
        registry: ProviderRegistry,
        probe: ScriptedProbe,
    ) -> Harness {
        let gateway = Arc::new(gateway);
        let panel = Arc::new(panel);
        let progress = Arc::new(MemoryProgressStore::default());
        let ctx = JobContext {
            registry: Arc::new(registry),
            gateway: gateway.clone(),
            panel: panel.clone(),
            progress: progress.clone(),
            probe: Arc::new(probe),
            packs: Arc::new(StaticPacks {
                archive: Ok(b"PK\x03\x04".to_vec()),
            }),
            timings: JobTimings::fast(),
        };
        Harness {
            gateway,
            panel,
            progress,
            ctx,
        }
    }

    pub fn registry_with(domain: ContentKind, provider: StaticProvider) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(domain, Arc::new(provider));
        registry
    }
}
