use std::sync::Arc;

use crate::config::{PlayerStatsConfig, PphConfig};
use crate::database::Database;
use crate::detector::FinishedMatch;
use crate::model::{GameMode, Outcome, PlayerRecord, TeamCountry};

/// One player's share of a finished match.
#[derive(Debug, Clone)]
pub struct RoundContribution {
    pub nickname: String,
    pub profile_id: u32,
    pub score: i32,
    pub deaths: u32,
    pub team: TeamCountry,
    pub mode: GameMode,
    pub outcome: Outcome,
    pub mvp: bool,
    pub duration_secs: u32,
}

impl FinishedMatch {
    /// Break a finished match into per-player contributions. Players without
    /// a team slot, and players who neither scored nor died, did not
    /// participate and are skipped.
    pub fn contributions(&self) -> Vec<RoundContribution> {
        let server = &self.server;
        let participants: Vec<_> = server
            .players
            .iter()
            .filter(|p| p.team == 0 || p.team == 1)
            .filter(|p| p.score != 0 || p.deaths != 0)
            .collect();

        // top scorer, ties broken by fewest deaths
        let mvp = participants
            .iter()
            .max_by_key(|p| (p.score, std::cmp::Reverse(p.deaths)))
            .map(|p| p.name.clone());

        participants
            .into_iter()
            .map(|p| {
                let (team, team_score, other_score) = if p.team == 0 {
                    (server.team0, server.score0, server.score1)
                } else {
                    (server.team1, server.score1, server.score0)
                };
                let outcome = match team_score.cmp(&other_score) {
                    std::cmp::Ordering::Greater => Outcome::Win,
                    std::cmp::Ordering::Less => Outcome::Loss,
                    std::cmp::Ordering::Equal => Outcome::Draw,
                };
                RoundContribution {
                    nickname: p.name.clone(),
                    profile_id: p.pid,
                    score: p.score,
                    deaths: p.deaths,
                    team,
                    mode: server.gametype,
                    outcome,
                    mvp: mvp.as_deref() == Some(p.name.as_str()),
                    duration_secs: server.timeelapsed,
                }
            })
            .collect()
    }
}

impl PlayerRecord {
    /// Additively merge one round into the running totals. There is no
    /// decrement path; totals only ever grow.
    pub fn apply(&mut self, c: &RoundContribution, pph: &PphConfig, history_len: usize) {
        if self.profile_id == 0 {
            self.profile_id = c.profile_id;
        }
        self.score += i64::from(c.score);
        self.deaths += u64::from(c.deaths);
        self.games += 1;
        match c.outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Loss => self.losses += 1,
            Outcome::Draw => {}
        }
        if c.mvp {
            self.mvp += 1;
        }
        match c.team {
            TeamCountry::Us => self.us_games += 1,
            TeamCountry::Ch => self.ch_games += 1,
            TeamCountry::Ac => self.ac_games += 1,
            TeamCountry::Eu => self.eu_games += 1,
        }
        match c.mode {
            GameMode::Conquest => self.cq_games += 1,
            GameMode::CaptureTheFlag => self.ctf_games += 1,
        }

        self.blend_pph(c, pph);
        self.playtime_secs += u64::from(c.duration_secs);

        // fixed-length ring of W/L/D letters, oldest dropped first
        while self.history.len() >= history_len.max(1) {
            self.history.remove(0);
        }
        self.history.push(c.outcome.letter());
    }

    /// Decaying points-per-hour: the prior figure weighted by accumulated
    /// playtime (capped at the window) blended with the round's own rate,
    /// then clamped to the configured floor/ceiling.
    fn blend_pph(&mut self, c: &RoundContribution, pph: &PphConfig) {
        let round_hours = f64::from(c.duration_secs) / 3600.0;
        if round_hours <= 0.0 {
            return;
        }
        let round_pph = f64::from(c.score) / round_hours;
        let prior_hours = (self.playtime_secs as f64 / 3600.0).min(pph.window_hours);
        let blended =
            (self.pph * prior_hours + round_pph * round_hours) / (prior_hours + round_hours);
        self.pph = blended.clamp(pph.floor, pph.ceiling);
    }
}

/// Merges finished matches into persisted player and map totals. Single
/// caller: the polling loop.
pub struct Aggregator {
    db: Arc<Database>,
}

impl Aggregator {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn record(
        &self,
        finished: &FinishedMatch,
        settings: &PlayerStatsConfig,
    ) -> anyhow::Result<()> {
        let blacklist = self.db.blacklist().await?;
        let mut recorded = 0usize;
        for contribution in finished.contributions() {
            if blacklist.contains(&contribution.nickname) {
                log::debug!("skipping blacklisted player {}", contribution.nickname);
                continue;
            }
            let mut record = match self.db.player(&contribution.nickname).await? {
                Some(record) => record,
                None => {
                    log::info!("first sighting of player {}", contribution.nickname);
                    PlayerRecord::new(&contribution.nickname, contribution.profile_id)
                }
            };
            record.apply(&contribution, &settings.pph, settings.history_len);
            self.db.upsert_player(&record).await?;
            recorded += 1;
        }
        self.db
            .bump_map(&finished.server.map, finished.server.gametype)
            .await?;
        log::info!(
            "recorded match on {}: {} player contributions",
            finished.server.hostname,
            recorded
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::{player, server};
    use crate::model::Snapshot;

    fn settings() -> PlayerStatsConfig {
        PlayerStatsConfig::default()
    }

    /// A conquest match on US (team 0) vs CH (team 1), team scores 48 vs 50.
    fn finished() -> FinishedMatch {
        let mut s = server(1, GameMode::Conquest, 1200);
        s.score0 = 48;
        s.score1 = 50;
        s.numplayers = 4;
        s.players = vec![
            player("Vet1", 10, 2, 0),
            player("Ace", 15, 1, 1),
            player("Idler", 0, 0, 1),
            player("Lost", 3, 9, 0),
            player("Spectator", 5, 1, -1),
        ];
        FinishedMatch { server: s }
    }

    #[test]
    fn participation_filter_skips_idlers_and_teamless() {
        let contributions = finished().contributions();
        let names: Vec<_> = contributions.iter().map(|c| c.nickname.as_str()).collect();
        assert_eq!(names, vec!["Vet1", "Ace", "Lost"]);
    }

    #[test]
    fn exactly_one_mvp_ties_broken_by_fewest_deaths() {
        let mut m = finished();
        m.server.players = vec![
            player("A", 15, 4, 0),
            player("B", 15, 1, 1),
            player("C", 2, 0, 0),
        ];
        let contributions = m.contributions();
        let mvps: Vec<_> = contributions
            .iter()
            .filter(|c| c.mvp)
            .map(|c| c.nickname.as_str())
            .collect();
        assert_eq!(mvps, vec!["B"]);
    }

    #[test]
    fn first_match_creates_expected_record() {
        // the worked example: Vet1, score 10, deaths 2, team US, conquest, lost
        let contribution = finished()
            .contributions()
            .into_iter()
            .find(|c| c.nickname == "Vet1")
            .expect("Vet1 participates");
        let mut record = PlayerRecord::new("Vet1", contribution.profile_id);
        record.apply(&contribution, &settings().pph, settings().history_len);

        assert_eq!(record.score, 10);
        assert_eq!(record.deaths, 2);
        assert_eq!(record.us_games, 1);
        assert_eq!(record.cq_games, 1);
        assert_eq!(record.losses, 1);
        assert_eq!(record.wins, 0);
        assert!(record.history.ends_with('L'));
    }

    #[test]
    fn outcome_counters_are_mutually_exclusive() {
        let mut m = finished();
        m.server.score1 = 48; // draw
        for c in m.contributions() {
            let mut record = PlayerRecord::new(&c.nickname, 0);
            record.apply(&c, &settings().pph, settings().history_len);
            assert_eq!(record.wins + record.losses, 0);
            assert_eq!(record.games, 1);
            assert!(record.history.ends_with('D'));
        }
    }

    #[test]
    fn totals_are_order_independent() {
        let contributions: Vec<RoundContribution> = (0..6)
            .map(|i| RoundContribution {
                nickname: "Vet1".into(),
                profile_id: 7,
                score: 5 * i,
                deaths: i as u32,
                team: TeamCountry::Eu,
                mode: GameMode::CaptureTheFlag,
                outcome: if i % 2 == 0 { Outcome::Win } else { Outcome::Loss },
                mvp: false,
                duration_secs: 900,
            })
            .collect();

        let mut forward = PlayerRecord::new("Vet1", 7);
        for c in &contributions {
            forward.apply(c, &settings().pph, settings().history_len);
        }
        let mut backward = PlayerRecord::new("Vet1", 7);
        for c in contributions.iter().rev() {
            backward.apply(c, &settings().pph, settings().history_len);
        }

        assert_eq!(forward.score, backward.score);
        assert_eq!(forward.score, 5 * (0 + 1 + 2 + 3 + 4 + 5));
        assert_eq!(forward.deaths, backward.deaths);
        assert_eq!(forward.wins, backward.wins);
        assert_eq!(forward.losses, backward.losses);
        assert_eq!(forward.eu_games, 6);
        assert_eq!(forward.ctf_games, 6);
        assert_eq!(forward.playtime_secs, backward.playtime_secs);
    }

    #[test]
    fn history_is_a_bounded_fifo() {
        let c = RoundContribution {
            nickname: "Vet1".into(),
            profile_id: 0,
            score: 1,
            deaths: 0,
            team: TeamCountry::Us,
            mode: GameMode::Conquest,
            outcome: Outcome::Win,
            mvp: false,
            duration_secs: 600,
        };
        let mut loss = c.clone();
        loss.outcome = Outcome::Loss;

        let mut record = PlayerRecord::new("Vet1", 0);
        record.apply(&loss, &settings().pph, settings().history_len);
        for _ in 0..15 {
            record.apply(&c, &settings().pph, settings().history_len);
        }
        assert_eq!(record.history.len(), settings().history_len);
        // the early loss has been dropped from the front
        assert_eq!(record.history, "W".repeat(10));
    }

    #[test]
    fn pph_blend_is_clamped_and_weighted() {
        let pph = PphConfig {
            window_hours: 10.0,
            floor: 0.0,
            ceiling: 200.0,
        };
        let mut record = PlayerRecord::new("Vet1", 0);
        let c = RoundContribution {
            nickname: "Vet1".into(),
            profile_id: 0,
            score: 60,
            deaths: 0,
            team: TeamCountry::Us,
            mode: GameMode::Conquest,
            outcome: Outcome::Win,
            mvp: true,
            duration_secs: 3600,
        };
        record.apply(&c, &pph, 10);
        // no prior playtime: pph equals the round's own rate
        assert_eq!(record.pph, 60.0);

        let mut monster = c.clone();
        monster.score = 100_000;
        record.apply(&monster, &pph, 10);
        assert_eq!(record.pph, 200.0); // ceiling

        // one poor hour against a capped prior does not wipe the figure
        let mut quiet = c.clone();
        quiet.score = 0;
        record.apply(&quiet, &pph, 10);
        assert!(record.pph > 90.0 && record.pph < 200.0);
    }

    #[test]
    fn zero_duration_match_leaves_pph_untouched() {
        let mut record = PlayerRecord::new("Vet1", 0);
        record.pph = 42.0;
        let c = RoundContribution {
            nickname: "Vet1".into(),
            profile_id: 0,
            score: 9,
            deaths: 1,
            team: TeamCountry::Ch,
            mode: GameMode::Conquest,
            outcome: Outcome::Win,
            mvp: false,
            duration_secs: 0,
        };
        record.apply(&c, &settings().pph, 10);
        assert_eq!(record.pph, 42.0);
        assert_eq!(record.score, 9);
    }

    #[test]
    fn snapshot_filter_and_contributions_compose() {
        // a server that is not verified never produces contributions
        let mut s = finished().server;
        s.verified = false;
        let snap = Snapshot::new(vec![s]);
        assert!(snap.servers.is_empty());
    }
}
