use std::path::Path;

use serde::Deserialize;

/// Service configuration, read from a single JSON file at startup and
/// reloadable through the admin surface.
#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub player_stats: PlayerStatsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub clickhouse: ClickhouseConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApiConfig {
    pub endpoint_url: String,
    /// Password required by the admin endpoints of the stats API.
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct PlayerStatsConfig {
    /// Matches with fewer participants than this are not recorded.
    #[serde(default = "default_min_players")]
    pub match_min_players: u32,
    /// Fixed length of the rolling W/L/D history.
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    #[serde(default)]
    pub pph: PphConfig,
}

impl Default for PlayerStatsConfig {
    fn default() -> Self {
        Self {
            match_min_players: default_min_players(),
            history_len: default_history_len(),
            pph: PphConfig::default(),
        }
    }
}

/// Constants of the points-per-hour blend.
#[derive(Deserialize, Clone, Copy, Debug)]
pub struct PphConfig {
    /// Prior playtime is capped at this many hours when weighing the blend.
    #[serde(default = "default_pph_window")]
    pub window_hours: f64,
    #[serde(default)]
    pub floor: f64,
    #[serde(default = "default_pph_ceiling")]
    pub ceiling: f64,
}

impl Default for PphConfig {
    fn default() -> Self {
        Self {
            window_hours: default_pph_window(),
            floor: 0.0,
            ceiling: default_pph_ceiling(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct HttpConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Value of the `x-admin-token` header required on /admin routes.
    #[serde(default)]
    pub admin_token: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            admin_token: String::new(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct ClickhouseConfig {
    #[serde(default = "default_clickhouse_server")]
    pub server: String,
    #[serde(default = "default_clickhouse_database")]
    pub database: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for ClickhouseConfig {
    fn default() -> Self {
        Self {
            server: default_clickhouse_server(),
            database: default_clickhouse_database(),
            user: None,
            password: None,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }
}

fn default_poll_interval() -> u64 {
    78
}

fn default_api_timeout() -> u64 {
    10
}

fn default_min_players() -> u32 {
    4
}

fn default_history_len() -> usize {
    10
}

fn default_pph_window() -> f64 {
    10.0
}

fn default_pph_ceiling() -> f64 {
    200.0
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_clickhouse_server() -> String {
    "http://127.0.0.1:8123".to_string()
}

fn default_clickhouse_database() -> String {
    "backstab".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"api": {"endpoint_url": "https://stats.example.net/api"}}"#,
        )
        .expect("decode");
        assert_eq!(config.poll_interval_secs, 78);
        assert_eq!(config.player_stats.match_min_players, 4);
        assert_eq!(config.player_stats.history_len, 10);
        assert_eq!(config.player_stats.pph.ceiling, 200.0);
        assert_eq!(config.http.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.clickhouse.database, "backstab");
    }

    #[test]
    fn full_config_overrides_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "api": {"endpoint_url": "https://stats.example.net/api", "password": "hunter2", "timeout_secs": 3},
                "poll_interval_secs": 30,
                "player_stats": {"match_min_players": 6, "history_len": 5, "pph": {"window_hours": 4.0, "floor": 1.0, "ceiling": 150.0}},
                "http": {"bind_addr": "0.0.0.0:9000", "admin_token": "secret"},
                "clickhouse": {"server": "http://db:8123", "database": "bf2", "user": "stats"}
            }"#,
        )
        .expect("decode");
        assert_eq!(config.api.password, "hunter2");
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.player_stats.match_min_players, 6);
        assert_eq!(config.player_stats.pph.window_hours, 4.0);
        assert_eq!(config.http.admin_token, "secret");
        assert_eq!(config.clickhouse.user.as_deref(), Some("stats"));
    }
}
