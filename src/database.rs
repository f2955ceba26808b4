use std::collections::HashSet;
use std::str::FromStr;

use clickhouse::{error::Error, Client};

use crate::config::ClickhouseConfig;
use crate::model::{
    epoch_secs_now, AccountLink, BlacklistRow, GameMode, MapStatRow, PlayerRecord, ProfileColor,
};

/// Stats a leaderboard can be ordered by.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LeaderboardStat {
    Score,
    Wins,
    Mvp,
    Pph,
    Playtime,
}

impl LeaderboardStat {
    /// Column name; the allow-list that keeps user input out of the query.
    pub fn column(&self) -> &'static str {
        match self {
            LeaderboardStat::Score => "score",
            LeaderboardStat::Wins => "wins",
            LeaderboardStat::Mvp => "mvp",
            LeaderboardStat::Pph => "pph",
            LeaderboardStat::Playtime => "playtime_secs",
        }
    }
}

impl FromStr for LeaderboardStat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "score" => Ok(LeaderboardStat::Score),
            "wins" => Ok(LeaderboardStat::Wins),
            "mvp" => Ok(LeaderboardStat::Mvp),
            "pph" => Ok(LeaderboardStat::Pph),
            "playtime" => Ok(LeaderboardStat::Playtime),
            _ => Err(()),
        }
    }
}

pub struct Database {
    database: String,
    client: Client,
}

impl Database {
    pub async fn new(config: &ClickhouseConfig) -> Result<Self, Error> {
        let database = config.database.clone();
        let client = Client::default().with_url(&config.server);

        let client = match &config.user {
            Some(user) => client.with_user(user),
            _ => client,
        };
        let client = match &config.password {
            Some(password) => client.with_password(password),
            _ => client,
        };

        // create database if not exists
        let query = format!("CREATE DATABASE IF NOT EXISTS {};", database);
        client.query(&query).execute().await?;

        let client = client.with_database(&database);

        // player totals: rows are only ever superseded by newer versions
        let query = format!(
            "CREATE TABLE IF NOT EXISTS {}.players (
                    nickname String,
                    profile_id UInt32,
                    first_seen UInt32,
                    score Int64,
                    deaths UInt64,
                    games UInt32,
                    wins UInt32,
                    losses UInt32,
                    mvp UInt32,
                    us_games UInt32,
                    ch_games UInt32,
                    ac_games UInt32,
                    eu_games UInt32,
                    cq_games UInt32,
                    ctf_games UInt32,
                    playtime_secs UInt64,
                    pph Float64,
                    medals UInt64,
                    history String,
                    updated_at UInt64
                )
                ENGINE = ReplacingMergeTree(updated_at)
                ORDER BY nickname;",
            &database
        );
        client.query(&query).execute().await?;

        let query = format!(
            "CREATE TABLE IF NOT EXISTS {}.map_stats (
                    map String,
                    mode String,
                    games UInt64
                )
                ENGINE = SummingMergeTree()
                ORDER BY (map, mode);",
            &database
        );
        client.query(&query).execute().await?;

        let query = format!(
            "CREATE TABLE IF NOT EXISTS {}.account_links (
                    nickname String,
                    chat_uid UInt64,
                    updated_at UInt64
                )
                ENGINE = ReplacingMergeTree(updated_at)
                ORDER BY nickname;",
            &database
        );
        client.query(&query).execute().await?;

        let query = format!(
            "CREATE TABLE IF NOT EXISTS {}.profile_colors (
                    nickname String,
                    red UInt8,
                    green UInt8,
                    blue UInt8,
                    updated_at UInt64
                )
                ENGINE = ReplacingMergeTree(updated_at)
                ORDER BY nickname;",
            &database
        );
        client.query(&query).execute().await?;

        let query = format!(
            "CREATE TABLE IF NOT EXISTS {}.blacklist (
                    nickname String
                )
                ENGINE = MergeTree()
                ORDER BY nickname;",
            &database
        );
        client.query(&query).execute().await?;

        Ok(Self { database, client })
    }

    pub async fn player(&self, nickname: &str) -> Result<Option<PlayerRecord>, Error> {
        let query = format!(
            "SELECT ?fields FROM {}.players FINAL WHERE nickname = ? LIMIT 1",
            self.database
        );
        self.client
            .query(&query)
            .bind(nickname)
            .fetch_optional::<PlayerRecord>()
            .await
    }

    /// Insert-if-absent, else additive update: the caller merges into the
    /// latest row and we insert the superseding version.
    pub async fn upsert_player(&self, record: &PlayerRecord) -> Result<(), Error> {
        let mut record = record.clone();
        record.updated_at = epoch_secs_now();
        let mut insert = self.client.insert("players")?;
        insert.write(&record).await?;
        insert.end().await
    }

    pub async fn leaderboard(
        &self,
        stat: LeaderboardStat,
        limit: usize,
    ) -> Result<Vec<PlayerRecord>, Error> {
        let query = format!(
            "SELECT ?fields FROM {}.players FINAL
             ORDER BY {} DESC
             LIMIT {}",
            self.database,
            stat.column(),
            limit
        );
        self.client.query(&query).fetch_all::<PlayerRecord>().await
    }

    pub async fn bump_map(&self, map: &str, mode: GameMode) -> Result<(), Error> {
        let row = MapStatRow {
            map: map.to_string(),
            mode: mode.as_str().to_string(),
            games: 1,
        };
        let mut insert = self.client.insert("map_stats")?;
        insert.write(&row).await?;
        insert.end().await
    }

    pub async fn map_stats(&self) -> Result<Vec<MapStatRow>, Error> {
        let query = format!(
            "SELECT map, mode, sum(games) AS games FROM {}.map_stats
             GROUP BY map, mode
             ORDER BY games DESC",
            self.database
        );
        self.client.query(&query).fetch_all::<MapStatRow>().await
    }

    pub async fn blacklist(&self) -> Result<HashSet<String>, Error> {
        let query = format!("SELECT ?fields FROM {}.blacklist", self.database);
        let rows = self.client.query(&query).fetch_all::<BlacklistRow>().await?;
        Ok(rows.into_iter().map(|r| r.nickname).collect())
    }

    pub async fn add_to_blacklist(&self, nickname: &str) -> Result<(), Error> {
        let row = BlacklistRow {
            nickname: nickname.to_string(),
        };
        let mut insert = self.client.insert("blacklist")?;
        insert.write(&row).await?;
        insert.end().await
    }

    pub async fn link_account(&self, nickname: &str, chat_uid: u64) -> Result<(), Error> {
        let row = AccountLink {
            nickname: nickname.to_string(),
            chat_uid,
            updated_at: epoch_secs_now(),
        };
        let mut insert = self.client.insert("account_links")?;
        insert.write(&row).await?;
        insert.end().await
    }

    pub async fn owner_of(&self, nickname: &str) -> Result<Option<AccountLink>, Error> {
        let query = format!(
            "SELECT ?fields FROM {}.account_links FINAL WHERE nickname = ? LIMIT 1",
            self.database
        );
        self.client
            .query(&query)
            .bind(nickname)
            .fetch_optional::<AccountLink>()
            .await
    }

    pub async fn links_for(&self, chat_uid: u64) -> Result<Vec<AccountLink>, Error> {
        let query = format!(
            "SELECT ?fields FROM {}.account_links FINAL WHERE chat_uid = ?",
            self.database
        );
        self.client
            .query(&query)
            .bind(chat_uid)
            .fetch_all::<AccountLink>()
            .await
    }

    pub async fn set_color(&self, nickname: &str, rgb: (u8, u8, u8)) -> Result<(), Error> {
        let row = ProfileColor {
            nickname: nickname.to_string(),
            red: rgb.0,
            green: rgb.1,
            blue: rgb.2,
            updated_at: epoch_secs_now(),
        };
        let mut insert = self.client.insert("profile_colors")?;
        insert.write(&row).await?;
        insert.end().await
    }

    pub async fn color(&self, nickname: &str) -> Result<Option<ProfileColor>, Error> {
        let query = format!(
            "SELECT ?fields FROM {}.profile_colors FINAL WHERE nickname = ? LIMIT 1",
            self.database
        );
        self.client
            .query(&query)
            .bind(nickname)
            .fetch_optional::<ProfileColor>()
            .await
    }
}
