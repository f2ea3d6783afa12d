//! # subfeed
//!
//! Tracks currently airing titles from a public schedule feed, records the
//! newest caption release for each, and turns caption pages into unpacked
//! subtitle files on disk.
//!
//! ## Architecture
//!
//! Two independent pipelines share the transport and configuration:
//!
//! ```text
//! poller:     schedule buckets → eligible items → captions → latest → Store
//! downloader: page → classify → extract links → resolve → download → unpack
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # One reconciliation cycle
//! subfeed poll
//!
//! # Re-run every ten minutes until interrupted
//! subfeed watch --interval 10m
//!
//! # Download the caption archives linked from a post
//! subfeed fetch https://blog.naver.com/someone/223268954039
//!
//! # Show what was recorded
//! subfeed list --captions
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// config, store, fetcher, reconciler, downloader.
pub mod app;

/// TOML configuration loaded from `~/.config/subfeed/config.toml`.
pub mod config;

/// Periodic trigger that runs the reconciler on an interval.
pub mod daemon;

/// Command-line interface using clap.
///
/// - `poll` - Run one reconciliation cycle
/// - `watch [--interval]` - Run cycles until interrupted
/// - `fetch <url>...` - Download and unpack caption archives
/// - `resolve <url>` - Classify a URL and show its download form
/// - `unpack <archive>` - Unpack a local archive
/// - `list [--captions]` - List stored rows
pub mod cli;

/// Core domain models.
///
/// - [`ScheduleEntry`](domain::ScheduleEntry) / [`ScheduleRecord`](domain::ScheduleRecord): one airing title
/// - [`CaptionEntry`](domain::CaptionEntry) / [`CaptionRecord`](domain::CaptionRecord): one caption release
/// - [`WeekBucket`](domain::WeekBucket): schedule partition
pub mod domain;

/// Page classification, link extraction, download resolution and archive
/// unpacking.
pub mod downloader;

/// HTTP fetching.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait injected into both pipelines
/// - [`HttpFetcher`](fetcher::HttpFetcher): reqwest-based implementation
pub mod fetcher;

/// Schedule and caption reconciliation.
pub mod poller;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
