use std::collections::HashMap;

use crate::model::{ServerInfo, Snapshot};

/// Lifecycle of a match on one tracked server.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ServerPhase {
    /// No match underway yet (elapsed time still at zero).
    Waiting,
    InProgress,
    /// Match over and recorded; stays here while the server idles at zero
    /// elapsed time so the same match is never counted twice.
    Completed,
}

/// A match inferred to have ended, carrying the last server state observed
/// before the elapsed-time reset (or before the server went offline).
#[derive(Debug, Clone)]
pub struct FinishedMatch {
    pub server: ServerInfo,
}

struct Tracked {
    phase: ServerPhase,
    last: ServerInfo,
}

/// Compares consecutive snapshots per server and emits finished matches.
/// Owned by the single polling loop; never shared.
pub struct MatchTracker {
    servers: HashMap<u64, Tracked>,
}

impl MatchTracker {
    pub fn new() -> Self {
        Self {
            servers: HashMap::new(),
        }
    }

    /// Feed one snapshot; returns matches that finished since the previous
    /// tick. Matches with fewer than `min_players` participants are
    /// discarded. The first observation of a server never emits.
    pub fn observe(&mut self, snapshot: &Snapshot, min_players: u32) -> Vec<FinishedMatch> {
        let mut finished = Vec::new();

        for server in &snapshot.servers {
            match self.servers.get_mut(&server.id) {
                None => {
                    self.servers.insert(
                        server.id,
                        Tracked {
                            phase: Self::initial_phase(server),
                            last: server.clone(),
                        },
                    );
                }
                Some(tracked) => {
                    if server.timeelapsed < tracked.last.timeelapsed {
                        // elapsed reset: the previous tick's data is the
                        // final state of a just-finished match
                        if tracked.phase == ServerPhase::InProgress {
                            Self::emit(&mut finished, &tracked.last, min_players);
                        }
                        tracked.phase = if server.timeelapsed > 0 {
                            ServerPhase::InProgress
                        } else {
                            ServerPhase::Completed
                        };
                    } else if server.timeelapsed > tracked.last.timeelapsed {
                        tracked.phase = ServerPhase::InProgress;
                    }
                    tracked.last = server.clone();
                }
            }
        }

        // servers present previously but absent now: flush once, drop tracking
        let current: std::collections::HashSet<u64> =
            snapshot.servers.iter().map(|s| s.id).collect();
        self.servers.retain(|id, tracked| {
            if current.contains(id) {
                return true;
            }
            log::info!("server {id} went offline");
            if tracked.phase == ServerPhase::InProgress {
                Self::emit(&mut finished, &tracked.last, min_players);
            }
            false
        });

        finished
    }

    fn initial_phase(server: &ServerInfo) -> ServerPhase {
        if server.timeelapsed > 0 {
            ServerPhase::InProgress
        } else {
            ServerPhase::Waiting
        }
    }

    fn emit(finished: &mut Vec<FinishedMatch>, last: &ServerInfo, min_players: u32) {
        if last.numplayers < min_players {
            log::debug!(
                "discarding match on {} ({} players < minimum {})",
                last.hostname,
                last.numplayers,
                min_players
            );
            return;
        }
        log::info!(
            "match finished on {} ({} on {})",
            last.hostname,
            last.gametype,
            last.map
        );
        finished.push(FinishedMatch {
            server: last.clone(),
        });
    }
}

impl Default for MatchTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::{player, server};
    use crate::model::GameMode;

    fn populated(id: u64, elapsed: u32, numplayers: u32) -> crate::model::ServerInfo {
        let mut s = server(id, GameMode::Conquest, elapsed);
        s.numplayers = numplayers;
        s.players = (0..numplayers)
            .map(|i| player(&format!("p{i}"), i as i32, 0, (i % 2) as i8))
            .collect();
        s
    }

    fn snap(servers: Vec<crate::model::ServerInfo>) -> Snapshot {
        Snapshot::new(servers)
    }

    #[test]
    fn first_tick_emits_nothing() {
        let mut tracker = MatchTracker::new();
        let finished = tracker.observe(&snap(vec![populated(1, 600, 8)]), 4);
        assert!(finished.is_empty());
    }

    #[test]
    fn elapsed_reset_emits_previous_tick_data() {
        let mut tracker = MatchTracker::new();
        tracker.observe(&snap(vec![populated(1, 600, 8)]), 4);
        let finished = tracker.observe(&snap(vec![populated(1, 30, 8)]), 4);
        assert_eq!(finished.len(), 1);
        // it is the pre-reset state that gets recorded
        assert_eq!(finished[0].server.timeelapsed, 600);
    }

    #[test]
    fn monotonic_elapsed_never_emits() {
        let mut tracker = MatchTracker::new();
        tracker.observe(&snap(vec![populated(1, 100, 8)]), 4);
        assert!(tracker.observe(&snap(vec![populated(1, 200, 8)]), 4).is_empty());
        assert!(tracker.observe(&snap(vec![populated(1, 200, 8)]), 4).is_empty());
        assert!(tracker.observe(&snap(vec![populated(1, 350, 8)]), 4).is_empty());
    }

    #[test]
    fn completed_idle_does_not_double_count() {
        let mut tracker = MatchTracker::new();
        tracker.observe(&snap(vec![populated(1, 600, 8)]), 4);
        // reset straight to 0: match over, server idling
        let finished = tracker.observe(&snap(vec![populated(1, 0, 8)]), 4);
        assert_eq!(finished.len(), 1);
        // idles at 0 for several ticks; nothing further
        assert!(tracker.observe(&snap(vec![populated(1, 0, 8)]), 4).is_empty());
        assert!(tracker.observe(&snap(vec![populated(1, 0, 8)]), 4).is_empty());
        // next match starts and later resets: exactly one more emission
        assert!(tracker.observe(&snap(vec![populated(1, 90, 8)]), 4).is_empty());
        let finished = tracker.observe(&snap(vec![populated(1, 5, 8)]), 4);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].server.timeelapsed, 90);
    }

    #[test]
    fn offline_server_flushes_once_then_drops() {
        let mut tracker = MatchTracker::new();
        tracker.observe(&snap(vec![populated(1, 400, 8), populated(2, 10, 6)]), 4);
        let finished = tracker.observe(&snap(vec![populated(2, 50, 6)]), 4);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].server.id, 1);
        // server 1 no longer tracked: nothing more to flush
        assert!(tracker.observe(&snap(vec![populated(2, 80, 6)]), 4).is_empty());
    }

    #[test]
    fn offline_waiting_server_is_not_flushed() {
        let mut tracker = MatchTracker::new();
        tracker.observe(&snap(vec![populated(1, 0, 2)]), 4);
        assert!(tracker.observe(&snap(vec![]), 4).is_empty());
    }

    #[test]
    fn small_matches_are_silently_discarded() {
        let mut tracker = MatchTracker::new();
        tracker.observe(&snap(vec![populated(1, 600, 3)]), 4);
        assert!(tracker.observe(&snap(vec![populated(1, 10, 3)]), 4).is_empty());
    }

    #[test]
    fn reappearing_server_starts_fresh() {
        let mut tracker = MatchTracker::new();
        tracker.observe(&snap(vec![populated(1, 400, 8)]), 4);
        tracker.observe(&snap(vec![]), 4); // flushes
        // comes back mid-match; first observation never emits
        assert!(tracker.observe(&snap(vec![populated(1, 900, 8)]), 4).is_empty());
    }
}
