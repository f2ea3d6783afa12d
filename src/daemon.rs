//! Periodic trigger for the reconciler.
//!
//! Runs a cycle every tick until SIGINT/SIGTERM. A failed cycle is logged and
//! the next tick starts over; nothing carries between cycles.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::app::{Result, SubfeedError};
use crate::config::PollerConfig;
use crate::poller::Reconciler;

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub interval: Duration,
    /// Run a cycle immediately instead of waiting for the first tick.
    pub update_on_start: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            update_on_start: true,
        }
    }
}

impl WatchConfig {
    pub fn from_poller(config: &PollerConfig) -> Result<Self> {
        Ok(Self {
            interval: Duration::from_secs(parse_interval(&config.interval)?),
            update_on_start: config.update_on_start,
        })
    }
}

/// Parse an interval like "10m", "1h", "30s", "1d" or bare seconds.
pub fn parse_interval(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();
    let invalid = |what: &str| SubfeedError::Config(format!("Invalid {}: {}", what, s));

    let scaled = |digits: &str, factor: u64, what: &str| {
        digits
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(factor))
            .ok_or_else(|| invalid(what))
    };

    let secs = if let Some(hours) = s.strip_suffix('h') {
        scaled(hours, 3600, "hours")
    } else if let Some(minutes) = s.strip_suffix('m') {
        scaled(minutes, 60, "minutes")
    } else if let Some(days) = s.strip_suffix('d') {
        scaled(days, 86400, "days")
    } else if let Some(secs) = s.strip_suffix('s') {
        scaled(secs, 1, "seconds")
    } else {
        scaled(&s, 1, "interval (use a format like '10m', '1h', '1d')")
    }?;

    if secs == 0 {
        return Err(invalid("interval (must be positive)"));
    }
    Ok(secs)
}

pub fn format_interval(secs: u64) -> String {
    if secs >= 86400 && secs.is_multiple_of(86400) {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs.is_multiple_of(3600) {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs.is_multiple_of(60) {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

pub struct Watcher {
    reconciler: Arc<Reconciler>,
    config: WatchConfig,
    running: Arc<AtomicBool>,
    cycles: AtomicU64,
}

impl Watcher {
    pub fn new(reconciler: Arc<Reconciler>, config: WatchConfig) -> Self {
        Self {
            reconciler,
            config,
            running: Arc::new(AtomicBool::new(true)),
            cycles: AtomicU64::new(0),
        }
    }

    /// Cycles started so far, failed ones included.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run until a shutdown signal arrives or [`stop`](Self::stop) is called.
    pub async fn run(&self) -> Result<()> {
        self.listen_for_shutdown();

        info!(
            interval = %format_interval(self.config.interval.as_secs()),
            "watching schedule"
        );

        if self.config.update_on_start {
            self.run_cycle().await;
        }

        let mut timer = interval(self.config.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick
        timer.tick().await;

        while self.running.load(Ordering::SeqCst) {
            timer.tick().await;

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            self.run_cycle().await;
        }

        info!(cycles = self.cycles(), "watcher shutting down");
        Ok(())
    }

    fn listen_for_shutdown(&self) {
        let running = self.running.clone();

        #[cfg(unix)]
        {
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};

                let (mut sigterm, mut sigint) =
                    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                        (Ok(term), Ok(int)) => (term, int),
                        (Err(e), _) | (_, Err(e)) => {
                            warn!("Failed to install signal handlers: {}", e);
                            return;
                        }
                    };

                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv() => {},
                }
                running.store(false, Ordering::SeqCst);
            });
        }

        #[cfg(not(unix))]
        {
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                running.store(false, Ordering::SeqCst);
            });
        }
    }

    async fn run_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::SeqCst);

        match self.reconciler.run().await {
            Ok(report) if report.failed() > 0 => {
                warn!(failed = report.failed(), "cycle finished with item errors");
            }
            Ok(_) => {}
            Err(e) => error!("Cycle failed, retrying next tick: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::domain::WeekBucket;
    use crate::fetcher::fake::FakeFetcher;
    use crate::store::{SqliteStore, Store};

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("1h").unwrap(), 3600);
        assert_eq!(parse_interval("10m").unwrap(), 600);
        assert_eq!(parse_interval("1d").unwrap(), 86400);
        assert_eq!(parse_interval("60s").unwrap(), 60);
        assert_eq!(parse_interval("3600").unwrap(), 3600);
        assert_eq!(parse_interval(" 1M ").unwrap(), 60);
        assert!(parse_interval("invalid").is_err());
        assert!(parse_interval("0m").is_err());
        assert!(matches!(parse_interval("m"), Err(SubfeedError::Config(_))));
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(3600), "1h");
        assert_eq!(format_interval(600), "10m");
        assert_eq!(format_interval(86400), "1d");
        assert_eq!(format_interval(90), "90s");
        assert_eq!(format_interval(7200), "2h");
    }

    #[test]
    fn test_config_from_poller() {
        let poller = PollerConfig {
            interval: "1m".into(),
            update_on_start: false,
            workers: 1,
        };
        let config = WatchConfig::from_poller(&poller).unwrap();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert!(!config.update_on_start);
    }

    fn feed() -> FakeFetcher {
        let mut fake = FakeFetcher::new();
        for bucket in WeekBucket::POLLED {
            fake = fake.with_page(
                &format!("http://feed.test/schedule/{}", bucket.index()),
                r#"{"code":"ok","data":[]}"#,
            );
        }
        fake.with_page(
            "http://feed.test/schedule/1",
            r#"{"code":"ok","data":[{"animeNo":5,"status":"ON","subject":"S","captionCount":1}]}"#,
        )
        .with_page(
            "http://feed.test/caption/5",
            r#"{"code":"ok","data":[{"episode":"3","updDt":"2023-11-15T20:00:00","website":"https://s.example.com","name":"n"}]}"#,
        )
    }

    fn api() -> ApiConfig {
        ApiConfig {
            schedule_url: "http://feed.test/schedule/{week}".into(),
            caption_url: "http://feed.test/caption/{item}".into(),
        }
    }

    #[tokio::test]
    async fn test_watcher_runs_until_stopped() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let reconciler = Arc::new(Reconciler::new(Arc::new(feed()), store.clone(), api()));
        let watcher = Arc::new(Watcher::new(
            reconciler,
            WatchConfig {
                interval: Duration::from_millis(10),
                update_on_start: true,
            },
        ));

        let handle = tokio::spawn({
            let watcher = watcher.clone();
            async move { watcher.run().await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        watcher.stop();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(watcher.cycles() >= 2);
        // Repeated cycles converge on the same rows
        assert_eq!(store.count_schedules().unwrap(), 1);
        assert_eq!(store.count_captions().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_cycle_is_not_fatal() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        // No routes: every schedule request is a 404
        let reconciler = Arc::new(Reconciler::new(
            Arc::new(FakeFetcher::new()),
            store.clone(),
            api(),
        ));
        let watcher = Arc::new(Watcher::new(
            reconciler,
            WatchConfig {
                interval: Duration::from_millis(10),
                update_on_start: true,
            },
        ));

        let handle = tokio::spawn({
            let watcher = watcher.clone();
            async move { watcher.run().await }
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        watcher.stop();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        tokio_test::assert_ok!(result);
        assert!(watcher.cycles() >= 2);
        assert_eq!(store.count_schedules().unwrap(), 0);
    }
}
