use std::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};

use clickhouse::Row;
use serde::{Deserialize, Serialize};

/// Gamemodes reported by the stats API.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    #[serde(rename = "conquest")]
    Conquest,
    #[serde(rename = "capturetheflag")]
    CaptureTheFlag,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Conquest => "conquest",
            GameMode::CaptureTheFlag => "capturetheflag",
        }
    }
}

impl Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Team countries a side can play as.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamCountry {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "CH")]
    Ch,
    #[serde(rename = "AC")]
    Ac,
    #[serde(rename = "EU")]
    Eu,
}

impl Display for TeamCountry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TeamCountry::Us => "US",
            TeamCountry::Ch => "CH",
            TeamCountry::Ac => "AC",
            TeamCountry::Eu => "EU",
        };
        f.write_str(name)
    }
}

/// Result of one match from a single player's perspective.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    /// Single-letter encoding used in the rolling match history.
    pub fn letter(&self) -> char {
        match self {
            Outcome::Win => 'W',
            Outcome::Loss => 'L',
            Outcome::Draw => 'D',
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PlayerInfo {
    #[serde(default)]
    pub pid: u32,
    pub name: String,
    pub score: i32,
    pub deaths: u32,
    /// 0 or 1 for a real team slot, -1 when the player has not picked a side.
    pub team: i8,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ServerInfo {
    pub id: u64,
    pub hostname: String,
    #[serde(default)]
    pub region: String,
    pub map: String,
    pub gametype: GameMode,
    pub timeelapsed: u32,
    pub timelimit: u32,
    pub numplayers: u32,
    pub maxplayers: u32,
    pub score0: i32,
    pub score1: i32,
    pub team0: TeamCountry,
    pub team1: TeamCountry,
    #[serde(default)]
    pub c0: u32,
    #[serde(default)]
    pub c1: u32,
    #[serde(default)]
    pub n0: String,
    #[serde(default)]
    pub n1: String,
    pub is_alive: bool,
    pub verified: bool,
    pub players: Vec<PlayerInfo>,
}

impl ServerInfo {
    /// A server is public when neither side carries a clan tag.
    pub fn is_public(&self) -> bool {
        self.n0.is_empty() && self.n1.is_empty()
    }

    pub fn has_room(&self) -> bool {
        self.numplayers < self.maxplayers
    }
}

/// One polled read of all live server state.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub servers: Vec<ServerInfo>,
}

impl Snapshot {
    /// Dead or unverified servers never make it into a snapshot.
    pub fn new(servers: Vec<ServerInfo>) -> Self {
        let servers = servers
            .into_iter()
            .filter(|s| s.is_alive && s.verified)
            .collect();
        Self { servers }
    }

    pub fn total_players(&self) -> u32 {
        self.servers.iter().map(|s| s.numplayers).sum()
    }
}

/// Cumulative per-player totals. One row per nickname; rows are only ever
/// superseded by rows with strictly larger totals (no decrement path).
#[derive(Row, Serialize, Deserialize, Clone, Debug, Default)]
pub struct PlayerRecord {
    pub nickname: String,
    pub profile_id: u32,
    /// Days since the Unix epoch.
    pub first_seen: u32,
    pub score: i64,
    pub deaths: u64,
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub mvp: u32,
    pub us_games: u32,
    pub ch_games: u32,
    pub ac_games: u32,
    pub eu_games: u32,
    pub cq_games: u32,
    pub ctf_games: u32,
    pub playtime_secs: u64,
    pub pph: f64,
    /// Earned medals, bit per medal.
    pub medals: u64,
    /// Rolling W/L/D letters, oldest first.
    pub history: String,
    /// Seconds since the Unix epoch; version column for the replacing merge.
    pub updated_at: u64,
}

impl PlayerRecord {
    pub fn new(nickname: &str, profile_id: u32) -> Self {
        Self {
            nickname: nickname.to_string(),
            profile_id,
            first_seen: epoch_days_now(),
            ..Self::default()
        }
    }
}

/// Per-map, per-gamemode play counter row.
#[derive(Row, Serialize, Deserialize, Clone, Debug)]
pub struct MapStatRow {
    pub map: String,
    pub mode: String,
    pub games: u64,
}

#[derive(Row, Serialize, Deserialize, Clone, Debug)]
pub struct AccountLink {
    pub nickname: String,
    pub chat_uid: u64,
    pub updated_at: u64,
}

#[derive(Row, Serialize, Deserialize, Clone, Debug)]
pub struct ProfileColor {
    pub nickname: String,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub updated_at: u64,
}

#[derive(Row, Serialize, Deserialize, Clone, Debug)]
pub struct BlacklistRow {
    pub nickname: String,
}

pub fn epoch_secs_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub fn epoch_days_now() -> u32 {
    (epoch_secs_now() / 86_400) as u32
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_drops_dead_and_unverified_servers() {
        let mut dead = testing::server(1, GameMode::Conquest, 100);
        dead.is_alive = false;
        let mut unverified = testing::server(2, GameMode::Conquest, 100);
        unverified.verified = false;
        let mut live = testing::server(3, GameMode::CaptureTheFlag, 100);
        live.numplayers = 7;

        let snap = Snapshot::new(vec![dead, unverified, live]);
        assert_eq!(snap.servers.len(), 1);
        assert_eq!(snap.servers[0].id, 3);
        assert_eq!(snap.total_players(), 7);
    }

    #[test]
    fn server_wire_format_round_trips() {
        let json = r#"{
            "id": 9, "hostname": "[VET] 24/7 Conquest", "region": "EU",
            "map": "dammage", "gametype": "conquest",
            "timeelapsed": 312, "timelimit": 1200,
            "numplayers": 2, "maxplayers": 24,
            "score0": 48, "score1": 50, "team0": "US", "team1": "AC",
            "is_alive": true, "verified": true,
            "players": [
                {"pid": 101, "name": "Vet1", "score": 10, "deaths": 2, "team": 0},
                {"name": "Drifter", "score": 0, "deaths": 0, "team": -1}
            ]
        }"#;
        let server: ServerInfo = serde_json::from_str(json).expect("decode");
        assert_eq!(server.gametype, GameMode::Conquest);
        assert_eq!(server.team1, TeamCountry::Ac);
        assert!(server.is_public());
        assert!(server.has_room());
        assert_eq!(server.players[1].team, -1);
    }
}
