use mcpanel_core::{ContentKind, JobPhase};
use tokio::time::Instant;

use super::{url_filename, InstallJob, JobContext, JobOutcome, JobRequest};
use crate::gateway::PullOptions;
use crate::redirect::{resolve_final_url, DEFAULT_MAX_HOPS};

const DOWNLOAD_FAILED: &str = "Download failed";
const DECOMPRESSION_FAILED: &str = "Decompression failed";
const DOWNLOAD_TIMEOUT: &str = "File download timeout";

/// Мир: архив скачивается в корень сервера, распаковывается и удаляется
pub(crate) async fn run(ctx: &JobContext, job: &InstallJob) -> JobOutcome {
    let JobRequest::World {
        provider,
        world_id,
        version_id,
    } = &job.request
    else {
        return JobOutcome::failed("unknown", "not a world job");
    };

    let spec = match ctx.registry.resolve(ContentKind::World, *provider) {
        Ok(p) => p.get_download_url(world_id, version_id).await,
        Err(e) => Err(e),
    };
    let spec = match spec {
        Ok(spec) => spec,
        Err(e) => {
            log::error!("[{}] Failed to resolve world {}@{}: {}", job.id, world_id, version_id, e);
            return JobOutcome::failed("unknown", DOWNLOAD_FAILED);
        }
    };
    let filename = spec
        .filename
        .clone()
        .unwrap_or_else(|| url_filename(&spec.url));

    let final_url = resolve_final_url(ctx.probe.as_ref(), &spec.url, DEFAULT_MAX_HOPS).await;
    ctx.report_downloading(job, &filename).await;

    ctx.phase(job, JobPhase::Transferring);
    let options = PullOptions {
        filename: Some(filename.clone()),
        use_header: false,
        foreground: true,
        headers: Default::default(),
    };
    if let Err(e) = ctx.gateway.pull(&job.server_id, &final_url, "/", &options).await {
        log::error!("[{}] pull of {} failed: {}", job.id, final_url, e);
        return JobOutcome::failed(filename, DOWNLOAD_FAILED);
    }

    if !wait_for_archive(ctx, job, &filename).await {
        return JobOutcome::timeout(filename, DOWNLOAD_TIMEOUT);
    }

    ctx.phase(job, JobPhase::Decompressing);
    let extracted = async {
        ctx.gateway
            .decompress_file(&job.server_id, "/", &filename)
            .await?;
        ctx.gateway
            .delete_files(&job.server_id, "/", std::slice::from_ref(&filename))
            .await
    }
    .await;

    match extracted {
        Ok(()) => JobOutcome::completed(filename).decompressed(),
        Err(e) => {
            log::error!("[{}] Failed to decompress {}: {}", job.id, filename, e);
            if let Err(e) = ctx
                .gateway
                .delete_files(&job.server_id, "/", std::slice::from_ref(&filename))
                .await
            {
                log::warn!("[{}] Cleanup of {} failed: {}", job.id, filename, e);
            }
            JobOutcome::failed(filename, DECOMPRESSION_FAILED)
        }
    }
}

/// Ждёт, пока архив появится в корне с ненулевым размером
async fn wait_for_archive(ctx: &JobContext, job: &InstallJob, filename: &str) -> bool {
    let deadline = Instant::now() + ctx.timings.archive_timeout;
    loop {
        match ctx.gateway.get_directory(&job.server_id, "/").await {
            Ok(entries) => {
                if entries.iter().any(|e| e.name == filename && e.size > 0) {
                    return true;
                }
            }
            Err(e) => log::warn!("[{}] Listing while waiting for {} failed: {}", job.id, filename, e),
        }

        if Instant::now() + ctx.timings.archive_poll > deadline {
            log::warn!("[{}] {} did not appear within {:?}", job.id, filename, ctx.timings.archive_timeout);
            return false;
        }
        tokio::time::sleep(ctx.timings.archive_poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::{run_job, InstallJob, JobRequest};
    use super::*;
    use crate::api::testing::StaticProvider;
    use crate::gateway::testing::{FakeGateway, FakePanel};
    use crate::progress::ProgressStore;
    use crate::redirect::testing::ScriptedProbe;
    use mcpanel_core::{DownloadSpec, JobStatus, ProviderKind};

    const CF_URL: &str = "https://www.curseforge.com/api/v1/mods/1/files/2/download";
    const CDN_URL: &str = "https://mediafilez.forgecdn.net/files/2/skyblock.zip";

    fn world_job() -> InstallJob {
        InstallJob::new(
            "srv",
            JobRequest::World {
                provider: ProviderKind::CurseForge,
                world_id: "1".into(),
                version_id: "2".into(),
            },
        )
    }

    fn curseforge_worlds() -> crate::api::ProviderRegistry {
        let mut provider = StaticProvider::serving(ProviderKind::CurseForge, CF_URL);
        provider.download = Ok(DownloadSpec::direct(CF_URL).with_filename("world_1_2.zip"));
        registry_with(ContentKind::World, provider)
    }

    #[tokio::test]
    async fn test_world_install_follows_redirect_and_extracts() {
        let h = harness(
            FakeGateway::new(),
            FakePanel::new(1),
            curseforge_worlds(),
            ScriptedProbe::default().redirect(CF_URL, CDN_URL),
        );
        let job = world_job();
        let key = job.progress_key();
        let outcome = run_job(&h.ctx, job).await;

        assert_eq!(outcome.status, JobStatus::Completed);
        assert!(outcome.decompressed);
        assert!(h.gateway.called(&format!("pull {} -> /", CDN_URL)));
        assert!(h.gateway.called("decompress /world_1_2.zip"));
        assert!(!h.gateway.has("world_1_2.zip"));

        let record = h.progress.get(&key).await.unwrap();
        assert_eq!(record.filename, "world_1_2.zip");
        assert!(record.decompressed);
    }

    #[tokio::test]
    async fn test_archive_never_appears_times_out_without_retry() {
        let h = harness(
            FakeGateway::new().with_pull_size(0),
            FakePanel::new(1),
            curseforge_worlds(),
            ScriptedProbe::default(),
        );
        let outcome = run_job(&h.ctx, world_job()).await;

        assert_eq!(outcome.status, JobStatus::Timeout);
        assert_eq!(outcome.error.as_deref(), Some(DOWNLOAD_TIMEOUT));
        let pulls = h.gateway.calls().iter().filter(|c| c.starts_with("pull")).count();
        assert_eq!(pulls, 1);
        assert!(!h.gateway.called("decompress"));
    }

    #[tokio::test]
    async fn test_decompression_failure_cleans_up() {
        let h = harness(
            FakeGateway::new().failing_on("decompress"),
            FakePanel::new(1),
            curseforge_worlds(),
            ScriptedProbe::default(),
        );
        let outcome = run_job(&h.ctx, world_job()).await;

        assert_eq!(outcome.status, JobStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some(DECOMPRESSION_FAILED));
        assert!(h.gateway.called("delete / [\"world_1_2.zip\"]"));
        assert!(!h.gateway.has("world_1_2.zip"));
    }

    #[tokio::test]
    async fn test_pull_failure() {
        let h = harness(
            FakeGateway::new().failing_on("pull"),
            FakePanel::new(1),
            curseforge_worlds(),
            ScriptedProbe::default(),
        );
        let outcome = run_job(&h.ctx, world_job()).await;
        assert_eq!(outcome.status, JobStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some(DOWNLOAD_FAILED));
    }
}
