use async_trait::async_trait;
use mcpanel_core::{JobPhase, PackType, Result};

use super::{InstallJob, JobContext, JobOutcome, JobRequest};
use crate::api::vanillatweaks::VanillaTweaksClient;

/// Источник собранного архива паков
#[async_trait]
pub trait PackArchiveSource: Send + Sync {
    async fn build_archive(
        &self,
        version: &str,
        pack_type: PackType,
        packs: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Vec<u8>>;
}

#[async_trait]
impl PackArchiveSource for VanillaTweaksClient {
    async fn build_archive(
        &self,
        version: &str,
        pack_type: PackType,
        packs: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Vec<u8>> {
        let link = self.generate_link(version, pack_type, packs).await?;
        self.download_zip(&link, pack_type).await
    }
}

/// Каталог назначения: датапаки лежат в мире, ресурспаки в корне
pub fn target_dir(pack_type: PackType, world: &str) -> String {
    match pack_type {
        PackType::Datapacks | PackType::Craftingtweaks => {
            format!("/{}/datapacks", world.trim_matches('/'))
        }
        PackType::Resourcepacks => "/resourcepacks".to_string(),
    }
}

fn split_dir(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some(("", name)) => ("/", name),
        Some((parent, name)) => (parent, name),
        None => ("/", path),
    }
}

pub(crate) async fn run(ctx: &JobContext, job: &InstallJob) -> JobOutcome {
    let JobRequest::Datapack {
        version,
        pack_type,
        packs,
        world,
    } = &job.request
    else {
        return JobOutcome::failed("", "not a datapack job");
    };

    let archive = match ctx.packs.build_archive(version, *pack_type, packs).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("[{}] VanillaTweaks archive failed: {}", job.id, e);
            return JobOutcome::failed("", "Failed to generate download link from VanillaTweaks.");
        }
    };

    let dir = target_dir(*pack_type, world);
    let temp_name = format!("vt-install-{}.zip", job.id);
    ctx.report_downloading(job, &temp_name).await;

    let (parent, name) = split_dir(&dir);
    if let Err(e) = ctx.gateway.create_directory(&job.server_id, name, parent).await {
        log::warn!("[{}] create_directory {} failed (ignored): {}", job.id, dir, e);
    }

    ctx.phase(job, JobPhase::Transferring);
    let path = format!("{}/{}", dir, temp_name);
    if let Err(e) = ctx.gateway.put_content(&job.server_id, &path, archive).await {
        remove_archive(ctx, job, &dir, &temp_name).await;
        return JobOutcome::failed(temp_name, format!("Failed to upload archive: {}", e));
    }

    ctx.phase(job, JobPhase::Decompressing);
    if let Err(e) = ctx.gateway.decompress_file(&job.server_id, &dir, &temp_name).await {
        remove_archive(ctx, job, &dir, &temp_name).await;
        return JobOutcome::failed(temp_name, format!("Decompression failed: {}", e));
    }

    if let Err(e) = ctx
        .gateway
        .delete_files(&job.server_id, &dir, std::slice::from_ref(&temp_name))
        .await
    {
        log::error!("[{}] Failed to remove {}: {}", job.id, path, e);
        return JobOutcome::failed(temp_name, format!("Failed to remove archive: {}", e)).decompressed();
    }

    JobOutcome::completed(temp_name).decompressed()
}

/// Уборка временного архива после сбоя
async fn remove_archive(ctx: &JobContext, job: &InstallJob, dir: &str, temp_name: &str) {
    if let Err(e) = ctx
        .gateway
        .delete_files(&job.server_id, dir, &[temp_name.to_string()])
        .await
    {
        log::warn!("[{}] Cleanup of {}/{} failed: {}", job.id, dir, temp_name, e);
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::{run_job, InstallJob, JobRequest};
    use super::*;
    use crate::api::ProviderRegistry;
    use crate::gateway::testing::{FakeGateway, FakePanel};
    use crate::redirect::testing::ScriptedProbe;
    use mcpanel_core::JobStatus;
    use std::sync::Arc;

    fn datapack_job(pack_type: PackType, world: &str) -> InstallJob {
        let packs = serde_json::json!({"survival": ["graves", "multiplayer sleep"]});
        InstallJob::new(
            "srv",
            JobRequest::Datapack {
                version: "1.21".into(),
                pack_type,
                packs: packs.as_object().cloned().unwrap_or_default(),
                world: world.into(),
            },
        )
    }

    #[test]
    fn test_target_dir() {
        assert_eq!(target_dir(PackType::Datapacks, "world"), "/world/datapacks");
        assert_eq!(target_dir(PackType::Craftingtweaks, "/hardcore/"), "/hardcore/datapacks");
        assert_eq!(target_dir(PackType::Resourcepacks, "world"), "/resourcepacks");
        assert_eq!(split_dir("/world/datapacks"), ("/world", "datapacks"));
        assert_eq!(split_dir("/resourcepacks"), ("/", "resourcepacks"));
    }

    #[tokio::test]
    async fn test_datapack_install_into_world() {
        let h = harness(
            FakeGateway::new().with_dir("world"),
            FakePanel::new(1),
            ProviderRegistry::new(),
            ScriptedProbe::default(),
        );
        let job = datapack_job(PackType::Datapacks, "world");
        let temp = format!("vt-install-{}.zip", job.id);
        let outcome = run_job(&h.ctx, job).await;

        assert_eq!(outcome.status, JobStatus::Completed);
        assert!(h.gateway.has("world/datapacks"));
        assert!(h.gateway.called(&format!("write /world/datapacks/{}", temp)));
        assert!(h.gateway.called(&format!("decompress /world/datapacks/{}", temp)));
        assert!(!h.gateway.has(&format!("world/datapacks/{}", temp)));
    }

    #[tokio::test]
    async fn test_link_failure_aborts() {
        let mut h = harness(
            FakeGateway::new(),
            FakePanel::new(1),
            ProviderRegistry::new(),
            ScriptedProbe::default(),
        );
        h.ctx.packs = Arc::new(StaticPacks {
            archive: Err("status: error".into()),
        });
        let outcome = run_job(&h.ctx, datapack_job(PackType::Resourcepacks, "world")).await;

        assert_eq!(outcome.status, JobStatus::Failed);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Failed to generate download link from VanillaTweaks.")
        );
        assert!(h.gateway.calls().is_empty());
    }

    async fn run_failing(operation: &str) -> (Harness, String, JobOutcome) {
        let h = harness(
            FakeGateway::new().with_dir("world").failing_on(operation),
            FakePanel::new(1),
            ProviderRegistry::new(),
            ScriptedProbe::default(),
        );
        let job = datapack_job(PackType::Datapacks, "world");
        let temp = format!("vt-install-{}.zip", job.id);
        let outcome = run_job(&h.ctx, job).await;
        (h, temp, outcome)
    }

    #[tokio::test]
    async fn test_upload_failure_cleans_up() {
        let (h, temp, outcome) = run_failing("write").await;

        assert_eq!(outcome.status, JobStatus::Failed);
        assert!(outcome.error.unwrap().starts_with("Failed to upload archive"));
        assert!(!h.gateway.called("decompress"));
        assert!(h.gateway.called(&format!("delete /world/datapacks [\"{}\"]", temp)));
    }

    #[tokio::test]
    async fn test_decompress_failure_removes_archive() {
        let (h, temp, outcome) = run_failing("decompress").await;

        assert_eq!(outcome.status, JobStatus::Failed);
        assert!(!outcome.decompressed);
        assert!(outcome.error.unwrap().starts_with("Decompression failed"));
        assert!(h.gateway.called(&format!("delete /world/datapacks [\"{}\"]", temp)));
        assert!(!h.gateway.has(&format!("world/datapacks/{}", temp)));
    }

    #[tokio::test]
    async fn test_archive_removal_failure_fails_job() {
        let (h, temp, outcome) = run_failing("delete").await;

        assert_eq!(outcome.status, JobStatus::Failed);
        assert!(outcome.decompressed);
        assert!(outcome.error.unwrap().starts_with("Failed to remove archive"));
        assert!(h.gateway.called(&format!("decompress /world/datapacks/{}", temp)));
        assert!(h.gateway.called("delete /world/datapacks"));
    }
}
