//! Модпак ставится через отдельный egg-установщик: сервер временно
//! переводится на него, переустанавливается и возвращается на исходный профиль.

use mcpanel_core::JobPhase;
use std::collections::BTreeMap;

use super::{stop_server, wipe_server_files, InstallJob, JobContext, JobOutcome, JobRequest};
use crate::gateway::StartupProfile;

pub(crate) async fn run(ctx: &JobContext, job: &InstallJob) -> JobOutcome {
    let JobRequest::Modpack {
        provider,
        modpack_id,
        version_id,
        delete_server_files,
        installer_egg,
        curseforge_api_key,
    } = &job.request
    else {
        return JobOutcome::failed("", "not a modpack job");
    };
    let label = format!("{}:{}", provider.as_str(), modpack_id);

    stop_server(ctx.gateway.as_ref(), &job.server_id, &ctx.timings).await;
    if *delete_server_files {
        wipe_server_files(ctx.gateway.as_ref(), &job.server_id).await;
    }

    let original = match ctx.panel.startup_profile(&job.server_id).await {
        Ok(profile) => profile,
        Err(e) => {
            return JobOutcome::failed(label, format!("Failed to read startup profile: {}", e));
        }
    };

    ctx.phase(job, JobPhase::Finalizing);
    let environment = BTreeMap::from([
        ("MODPACK_PROVIDER".to_string(), provider.as_str().to_string()),
        ("MODPACK_ID".to_string(), modpack_id.clone()),
        ("MODPACK_VERSION_ID".to_string(), version_id.clone()),
        (
            "DELETE_SERVER_FILES".to_string(),
            if *delete_server_files { "1" } else { "0" }.to_string(),
        ),
        ("CURSEFORGE_API_KEY".to_string(), curseforge_api_key.clone()),
    ]);

    let install = async {
        ctx.panel
            .switch_egg(&job.server_id, *installer_egg, &environment)
            .await?;
        ctx.panel.reinstall(&job.server_id).await
    }
    .await;
    if let Err(e) = &install {
        log::error!("[{}] Installer profile run failed: {}", job.id, e);
    }

    tokio::time::sleep(ctx.timings.reinstall_grace).await;

    // Откат выполняется всегда, даже если переустановка упала
    let reverted = revert_profile(ctx, job, &original).await;

    match (install, reverted) {
        (Ok(()), true) => JobOutcome::completed(label),
        (Err(e), _) => JobOutcome::failed(label, format!("Modpack installation failed: {}", e)),
        (Ok(()), false) => JobOutcome::failed(label, "Failed to restore the original startup profile"),
    }
}

/// Ждёт конца установки и возвращает исходный egg, команду и образ
async fn revert_profile(ctx: &JobContext, job: &InstallJob, original: &StartupProfile) -> bool {
    for attempt in 1..=ctx.timings.revert_attempts {
        match ctx.panel.is_installing(&job.server_id).await {
            Ok(true) => {
                log::debug!("[{}] Server still installing (attempt {})", job.id, attempt);
            }
            Ok(false) => match ctx.panel.restore_profile(&job.server_id, original).await {
                Ok(()) => {
                    log::info!(
                        "[{}] Modpack installation finished for server {}, reverted to egg {}",
                        job.id,
                        job.server_id,
                        original.egg_id
                    );
                    return true;
                }
                Err(e) => log::warn!("[{}] Revert attempt {} failed: {}", job.id, attempt, e),
            },
            Err(e) => log::warn!("[{}] Install status check failed: {}", job.id, e),
        }
        tokio::time::sleep(ctx.timings.revert_interval).await;
    }

    log::error!(
        "[{}] Gave up reverting server {} to egg {} after {} attempts",
        job.id,
        job.server_id,
        original.egg_id,
        ctx.timings.revert_attempts
    );
    false
}
