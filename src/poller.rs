use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::{Duration, MissedTickBehavior};

use crate::aggregator::Aggregator;
use crate::client::Client;
use crate::config::Config;
use crate::detector::MatchTracker;
use crate::lfg::{LfgNotification, LfgQueue};
use crate::model::Snapshot;

/// Admin-set status mode. `Automatic` derives the status from the snapshot;
/// the rest pin it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusOverride {
    Automatic,
    Online,
    Offline,
    Unknown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalStatus {
    Online,
    Offline,
    Unknown,
}

/// Status shared between the poller and the HTTP surface.
pub struct StatusBoard {
    pub override_mode: StatusOverride,
    derived: GlobalStatus,
    pub total_online: Option<u32>,
    /// Most recent LFG notifications, for the chat layer to pick up.
    pub notifications: Vec<LfgNotification>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            override_mode: StatusOverride::Automatic,
            derived: GlobalStatus::Unknown,
            total_online: None,
            notifications: Vec::new(),
        }
    }

    pub fn effective(&self) -> GlobalStatus {
        match self.override_mode {
            StatusOverride::Automatic => self.derived,
            StatusOverride::Online => GlobalStatus::Online,
            StatusOverride::Offline => GlobalStatus::Offline,
            StatusOverride::Unknown => GlobalStatus::Unknown,
        }
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// The single polling task. Owns the tracker and aggregator, so ticks are
/// strictly sequential and a match can never be aggregated twice.
pub struct Poller {
    client: Arc<Client>,
    config: Arc<RwLock<Config>>,
    tracker: MatchTracker,
    aggregator: Aggregator,
    lfg: Arc<Mutex<LfgQueue>>,
    status: Arc<Mutex<StatusBoard>>,
    shutdown: watch::Receiver<bool>,
}

impl Poller {
    pub fn new(
        client: Arc<Client>,
        config: Arc<RwLock<Config>>,
        aggregator: Aggregator,
        lfg: Arc<Mutex<LfgQueue>>,
        status: Arc<Mutex<StatusBoard>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            client,
            config,
            tracker: MatchTracker::new(),
            aggregator,
            lfg,
            status,
            shutdown,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let period = {
            let config = self.config.read().await;
            Duration::from_secs(config.poll_interval_secs.max(1))
        };
        log::info!("poller started ({}s interval)", period.as_secs());
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.shutdown.changed() => {
                    log::info!("poller stopping");
                    return Ok(());
                }
            }
            // a failed tick skips this update and retries on the next one
            if let Err(err) = self.tick().await {
                log::error!("tick failed: {err:#}");
            }
        }
    }

    async fn tick(&mut self) -> anyhow::Result<()> {
        let stats_config = {
            let config = self.config.read().await;
            config.player_stats.clone()
        };

        let servers = match self.client.live_servers().await {
            Ok(servers) => servers,
            Err(err) => {
                log::warn!("snapshot unavailable: {err}");
                let mut status = self.status.lock().await;
                status.total_online = None;
                if status.override_mode == StatusOverride::Automatic {
                    status.derived = GlobalStatus::Unknown;
                }
                return Ok(());
            }
        };
        let snapshot = Snapshot::new(servers);

        {
            let mut status = self.status.lock().await;
            status.total_online = Some(snapshot.total_players());
            if status.override_mode == StatusOverride::Automatic {
                status.derived = if snapshot.servers.is_empty() {
                    GlobalStatus::Offline
                } else {
                    GlobalStatus::Online
                };
            }
        }

        let finished = self.tracker.observe(&snapshot, stats_config.match_min_players);
        for finished_match in &finished {
            self.aggregator.record(finished_match, &stats_config).await?;
        }

        let notifications = self.lfg.lock().await.check(&snapshot);
        if !notifications.is_empty() {
            let mut status = self.status.lock().await;
            status.notifications = notifications;
        }

        Ok(())
    }
}
