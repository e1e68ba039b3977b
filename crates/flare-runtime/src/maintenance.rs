//! Daily background upkeep: user directory refresh and static image uploads.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::flare_context::FlareContext;

pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

const SKIPPED_IMAGE_FILES: [&str; 1] = ["README.md"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub users_refreshed: Option<usize>,
    pub uploaded_files: Vec<String>,
    pub failures: usize,
}

/// Runs [`run_maintenance_iteration`] forever, sleeping `interval` between runs.
pub async fn run_directory_maintenance(context: Arc<FlareContext>, interval: Duration) {
    loop {
        let report = run_maintenance_iteration(&context).await;
        info!(
            users_refreshed = report.users_refreshed.unwrap_or_default(),
            uploaded_files = report.uploaded_files.len(),
            failures = report.failures,
            "maintenance-iteration-finished"
        );
        tokio::time::sleep(interval).await;
    }
}

/// One pass of every maintenance task. Each task's failure is logged on its own.
pub async fn run_maintenance_iteration(context: &FlareContext) -> MaintenanceReport {
    let mut report = MaintenanceReport::default();

    match context.users.refresh(context.messaging.as_ref()).await {
        Ok(count) => report.users_refreshed = Some(count),
        Err(error) => {
            report.failures += 1;
            warn!(task = "refresh_users", error = %error, "maintenance-iteration-failed");
        }
    }

    if let Some(images_dir) = context.config.images_dir.as_deref() {
        match upload_missing_images(context, images_dir).await {
            Ok(uploaded) => report.uploaded_files = uploaded,
            Err(error) => {
                report.failures += 1;
                warn!(
                    task = "upload_images",
                    images_dir = %images_dir.display(),
                    error = %format!("{error:#}"),
                    "maintenance-iteration-failed"
                );
            }
        }
    }
    report
}

/// Uploads every file in `images_dir` the bot has not uploaded yet, in name order.
pub async fn upload_missing_images(context: &FlareContext, images_dir: &Path) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(images_dir)
        .await
        .with_context(|| format!("failed to read {}", images_dir.display()))?;
    let mut file_names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            file_names.push(name.to_string());
        }
    }
    file_names.sort();

    let existing = context
        .messaging
        .list_bot_files(&context.config.bot_user_id)
        .await?
        .into_iter()
        .collect::<HashSet<_>>();

    let mut uploaded = Vec::new();
    for name in file_names {
        if SKIPPED_IMAGE_FILES.contains(&name.as_str()) || existing.contains(&name) {
            continue;
        }
        let path = images_dir.join(&name);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        context
            .messaging
            .upload_file(&name, bytes)
            .await
            .with_context(|| format!("Failed to upload file {name}"))?;
        uploaded.push(name);
    }
    Ok(uploaded)
}
