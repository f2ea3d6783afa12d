use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::{AppContext, Result, SubfeedError};
use crate::daemon::{format_interval, parse_interval, WatchConfig, Watcher};
use crate::domain::{CaptionRecord, ScheduleRecord};
use crate::downloader::{self, classify, ArchiveFormat, SourceKind};
use crate::poller::ItemOutcome;
use crate::store::Store;

pub async fn poll(ctx: &AppContext) -> Result<()> {
    let report = ctx.reconciler.run().await?;

    for outcome in &report.outcomes {
        match outcome {
            ItemOutcome::Persisted {
                item_id,
                episode,
                caption_created: true,
                ..
            } => {
                let title = ctx
                    .store
                    .find_schedule(*item_id)?
                    .map(|s| s.title)
                    .unwrap_or_default();
                println!("  + {} episode {}", title, episode);
            }
            other => {
                if let Some(e) = other.error() {
                    eprintln!("  ! item {}: {}", other.item_id(), e);
                }
            }
        }
    }

    println!("Cycle complete: {}", report.summary());
    Ok(())
}

pub async fn watch(ctx: &AppContext, interval: Option<&str>, no_initial_run: bool) -> Result<()> {
    let mut config = WatchConfig::from_poller(&ctx.config.poller)?;
    if let Some(interval) = interval {
        config.interval = Duration::from_secs(parse_interval(interval)?);
    }
    if no_initial_run {
        config.update_on_start = false;
    }

    println!(
        "Watching every {} (Ctrl-C to stop)",
        format_interval(config.interval.as_secs())
    );
    Watcher::new(ctx.reconciler.clone(), config).run().await
}

pub async fn fetch(ctx: &AppContext, urls: &[String]) -> Result<()> {
    let results = ctx.downloader.acquire_all(urls.to_vec()).await;

    let mut files = 0;
    let mut errors = 0;

    for (page, result) in results {
        match result {
            Ok(report) => {
                println!("{} [{}]: {} files", page, report.kind, report.files.len());
                for file in &report.files {
                    let shown = file.unpacked_to.as_ref().unwrap_or(&file.path);
                    println!("  + {}", shown.display());
                }
                files += report.files.len();
            }
            Err(e) => {
                eprintln!("  ! {}: {}", page, e);
                errors += 1;
            }
        }
    }

    println!("Fetch complete: {} files, {} failed pages", files, errors);
    Ok(())
}

pub fn resolve(url: &str) -> Result<()> {
    let kind = classify(url);
    println!("kind: {}", kind);

    if kind.is_archive_link() {
        let target = downloader::resolve(url)?;
        println!("download: {}", target.canonical_url);
        println!("file name: {}", target.suggested_file_name);
    } else if kind == SourceKind::Unsupported {
        return Err(SubfeedError::InvalidFormat(format!("unsupported url: {}", url)));
    }

    Ok(())
}

pub fn unpack(archive: &Path, dest: Option<&Path>) -> Result<()> {
    let dest = match dest {
        Some(dest) => dest.to_path_buf(),
        None => default_unpack_dest(archive)?,
    };

    downloader::unpack(archive, &dest)?;
    println!("Unpacked {} into {}", archive.display(), dest.display());
    Ok(())
}

/// `dir/name.zip` → `dir/name`.
fn default_unpack_dest(archive: &Path) -> Result<PathBuf> {
    let name = ArchiveFormat::unpack_dir_name(archive).ok_or_else(|| {
        SubfeedError::UnsupportedFormat(format!("unrecognized archive: {}", archive.display()))
    })?;
    let parent = archive.parent().unwrap_or_else(|| Path::new("."));
    Ok(parent.join(name))
}

pub fn list_schedules(ctx: &AppContext) -> Result<()> {
    let schedules = ctx.store.get_all_schedules()?;

    if schedules.is_empty() {
        println!("No schedules");
        return Ok(());
    }

    for schedule in &schedules {
        println!("{}", format_schedule(schedule));
    }

    Ok(())
}

pub fn list_captions(ctx: &AppContext) -> Result<()> {
    let schedules = ctx.store.get_all_schedules()?;
    let mut printed = 0;

    for schedule in &schedules {
        let captions = ctx.store.get_captions_by_item(schedule.item_id)?;
        if captions.is_empty() {
            continue;
        }

        println!("{}", schedule.title);
        for caption in &captions {
            println!("{}", format_caption(caption));
        }
        printed += captions.len();
    }

    if printed == 0 {
        println!("No captions");
    }

    Ok(())
}

fn format_schedule(schedule: &ScheduleRecord) -> String {
    format!(
        "[{:<5}] {:>5} {} (#{}, latest: {})",
        schedule.week.as_str(),
        schedule.air_time,
        schedule.title,
        schedule.item_id,
        schedule.recent_episode.as_deref().unwrap_or("-")
    )
}

fn format_caption(caption: &CaptionRecord) -> String {
    format!(
        "  {:>6} {} {}\n         {}",
        caption.episode,
        caption.updated_at.format("%Y-%m-%d"),
        caption.author_name,
        caption.source_site
    )
}
