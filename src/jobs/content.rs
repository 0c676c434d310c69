use mcpanel_core::{AddonError, JobPhase};

use super::{url_filename, InstallJob, JobContext, JobOutcome, JobRequest};
use crate::gateway::PullOptions;

/// Мод или плагин: демон скачивает файл прямо в каталог назначения
pub(crate) async fn run(ctx: &JobContext, job: &InstallJob) -> JobOutcome {
    let JobRequest::Content {
        domain,
        provider,
        item_id,
        version_id,
    } = &job.request
    else {
        return JobOutcome::failed("", "not a content job");
    };

    let Some(dir) = domain.install_dir() else {
        return JobOutcome::failed("", format!("{}s are not installed as single files", domain.as_str()));
    };

    let spec = match ctx.registry.resolve(*domain, *provider) {
        Ok(p) => p.get_download_url(item_id, version_id).await,
        Err(e) => Err(e),
    };
    let spec = match spec {
        Ok(spec) => spec,
        Err(e) => {
            log::error!("[{}] Failed to resolve {} {}@{}: {}", job.id, provider, item_id, version_id, e);
            return JobOutcome::failed("", e.to_string());
        }
    };
    let filename = spec
        .filename
        .clone()
        .unwrap_or_else(|| url_filename(&spec.url));
    ctx.report_downloading(job, &filename).await;

    // Каталог может уже существовать
    if let Err(e) = ctx.gateway.create_directory(&job.server_id, dir, "/").await {
        log::warn!("[{}] create_directory {} failed (ignored): {}", job.id, dir, e);
    }

    ctx.phase(job, JobPhase::Transferring);
    let options = PullOptions {
        filename: spec.filename.clone(),
        use_header: spec.use_header,
        foreground: spec.foreground,
        headers: spec.headers.clone(),
    };
    match ctx
        .gateway
        .pull(&job.server_id, &spec.url, &format!("/{}", dir), &options)
        .await
    {
        Ok(()) => JobOutcome::completed(filename),
        Err(AddonError::NotFound(detail)) => {
            JobOutcome::failed(filename, format!("Download not found: {}", detail))
        }
        Err(e) => JobOutcome::failed(filename, format!("Download failed: {}", e)),
    }
}
