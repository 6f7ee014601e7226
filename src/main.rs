use anyhow::{Context, Result, bail};
use futures::TryStreamExt;
use object_store_sim::{
    BackupService, ObjectRepository, StorageMonitor,
    config::{AppConfig, Command},
    models::backup::BackupSource,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    // stdout carries JSON results, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config + command ---
    let (cfg, command) = AppConfig::from_env_and_args()?;
    tracing::debug!("Starting objsim with config: {:?}", cfg);

    let repo = ObjectRepository::open(&cfg.root)
        .await
        .with_context(|| format!("opening store at {}", cfg.root.display()))?;

    match command {
        Command::Backup {
            files,
            category,
            publish_report,
            verify,
        } => {
            let service = BackupService::new(repo, cfg.bucket.clone()).with_workers(cfg.workers);
            let sources: Vec<BackupSource> = files
                .into_iter()
                .map(|path| BackupSource::new(path, category.clone()))
                .collect();

            let report = service.run(&sources).await;
            print_json(&report)?;

            if publish_report {
                let meta = service
                    .publish_report(&report)
                    .await
                    .context("publishing backup report")?;
                tracing::info!("report stored at {}", meta.location);
            }
            if verify {
                let results = service.verify_report(&report).await;
                print_json(&results)?;
                ensure_verified(results.iter().filter(|r| !r.is_verified()).count(), results.len())?;
            }
        }
        Command::Put { file, key } => {
            let meta = repo
                .put_file(&cfg.bucket, &key, &file)
                .await
                .with_context(|| format!("storing {}", file.display()))?;
            print_json(&meta)?;
        }
        Command::List { prefix } => {
            let listing = repo.list_objects(&cfg.bucket, &prefix).await?;
            print_json(&listing)?;
        }
        Command::Head { key } => {
            let summary = repo.head_object(&cfg.bucket, &key).await?;
            print_json(&summary)?;
        }
        Command::Verify { prefix } => {
            let service = BackupService::new(repo, cfg.bucket.clone());
            let results = service.verify_prefix(&prefix).await?;
            print_json(&results)?;
            ensure_verified(results.iter().filter(|r| !r.is_verified()).count(), results.len())?;
        }
        Command::Stats => {
            let snapshot = StorageMonitor::new(repo).snapshot(&cfg.bucket).await?;
            print_json(&snapshot)?;
        }
        Command::History { failed_only } => {
            let mut entries = repo.audit_log().entries();
            while let Some(entry) = entries.try_next().await? {
                if failed_only && entry.is_success() {
                    continue;
                }
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn ensure_verified(failures: usize, total: usize) -> Result<()> {
    if failures > 0 {
        bail!("{} of {} objects failed verification", failures, total);
    }
    tracing::info!("all {} objects verified", total);
    Ok(())
}
