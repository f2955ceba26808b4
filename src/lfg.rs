use serde::{Deserialize, Serialize};

use crate::model::{GameMode, ServerInfo, Snapshot};

/// Gamemode(s) a waiting user is willing to play.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePreference {
    Conquest,
    CaptureTheFlag,
    Both,
}

/// One opt-in. Process-memory only; lost on restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LfgEntry {
    pub uid: u64,
    pub name: String,
    pub preference: GamePreference,
    pub min_players: u32,
}

/// Emitted when a waiting user's fill estimate is met. Delivery belongs to
/// the chat layer; the queue only decides who to notify.
#[derive(Debug, Clone, Serialize)]
pub struct LfgNotification {
    pub uid: u64,
    pub name: String,
    pub hostname: String,
    pub mode: GameMode,
    pub live_players: u32,
    pub theoretical_players: u32,
}

#[derive(Default)]
pub struct LfgQueue {
    entries: Vec<LfgEntry>,
}

impl LfgQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user, or update their preferences in place if already waiting.
    /// Returns true when the user is new to the queue.
    pub fn join(&mut self, entry: LfgEntry) -> bool {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.uid == entry.uid) {
            existing.preference = entry.preference;
            existing.min_players = entry.min_players;
            log::info!("[LFG] updated preferences for {}", existing.name);
            return false;
        }
        log::info!(
            "[LFG] added {} ({} total waiting)",
            entry.name,
            self.entries.len() + 1
        );
        self.entries.push(entry);
        true
    }

    /// Returns true if the user was waiting.
    pub fn leave(&mut self, uid: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.uid != uid);
        let removed = self.entries.len() < before;
        if removed {
            log::info!("[LFG] removed user {uid} ({} still waiting)", self.entries.len());
        }
        removed
    }

    pub fn entries(&self) -> &[LfgEntry] {
        &self.entries
    }

    /// Estimate fill for every waiting user against the busiest public
    /// server of their preferred gamemode, notify those whose threshold is
    /// met, and drop them from the queue. Heuristic: "theoretical" players
    /// are other waiting users with the same preference whose own minimum is
    /// not stricter, none of whom are obligated to actually join.
    pub fn check(&mut self, snapshot: &Snapshot) -> Vec<LfgNotification> {
        if self.entries.is_empty() {
            return Vec::new();
        }

        let busiest = |mode: GameMode| -> Option<&ServerInfo> {
            snapshot
                .servers
                .iter()
                .filter(|s| s.gametype == mode && s.is_public() && s.has_room())
                .max_by_key(|s| s.numplayers)
        };
        let cq = busiest(GameMode::Conquest);
        let ctf = busiest(GameMode::CaptureTheFlag);

        let mut notifications = Vec::new();
        for entry in &self.entries {
            let theoretical = self
                .entries
                .iter()
                .filter(|other| {
                    other.uid != entry.uid
                        && other.preference == entry.preference
                        && other.min_players <= entry.min_players
                })
                .count() as u32;

            let candidate = match entry.preference {
                GamePreference::Conquest => cq,
                GamePreference::CaptureTheFlag => ctf,
                GamePreference::Both => match (cq, ctf) {
                    (Some(a), Some(b)) => Some(if a.numplayers >= b.numplayers { a } else { b }),
                    (a, b) => a.or(b),
                },
            };
            let Some(server) = candidate else { continue };

            if server.numplayers + theoretical >= entry.min_players {
                log::info!(
                    "[LFG] {} -> \"{}\" ({} live + {} theoretical)",
                    entry.name,
                    server.hostname,
                    server.numplayers,
                    theoretical
                );
                notifications.push(LfgNotification {
                    uid: entry.uid,
                    name: entry.name.clone(),
                    hostname: server.hostname.clone(),
                    mode: server.gametype,
                    live_players: server.numplayers,
                    theoretical_players: theoretical,
                });
            }
        }

        if !notifications.is_empty() {
            let notified: Vec<u64> = notifications.iter().map(|n| n.uid).collect();
            self.entries.retain(|e| !notified.contains(&e.uid));
            log::info!(
                "[LFG] matched {} users ({} still waiting)",
                notified.len(),
                self.entries.len()
            );
        }
        notifications
    }
}
