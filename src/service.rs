use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, RwLock};

use crate::awards;
use crate::client::Client;
use crate::config::Config;
use crate::database::{Database, LeaderboardStat};
use crate::lfg::{GamePreference, LfgEntry, LfgNotification, LfgQueue};
use crate::model::{MapStatRow, PlayerRecord};
use crate::poller::{GlobalStatus, StatusBoard, StatusOverride};

pub struct AppState {
    pub db: Arc<Database>,
    pub client: Arc<Client>,
    pub config: Arc<RwLock<Config>>,
    pub config_path: String,
    pub lfg: Arc<Mutex<LfgQueue>>,
    pub status: Arc<Mutex<StatusBoard>>,
    pub shutdown: watch::Sender<bool>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/players/:nick", get(get_player))
        .route("/leaderboard/:stat", get(get_leaderboard))
        .route("/maps", get(get_maps))
        .route("/lfg", get(get_lfg).post(join_lfg))
        .route("/lfg/:uid", delete(leave_lfg))
        .route("/admin/status", post(set_status))
        .route("/admin/message", post(admin_message))
        .route("/admin/kick", post(admin_kick))
        .route("/admin/blacklist", post(admin_blacklist))
        .route("/admin/link", post(admin_link))
        .route("/admin/color", post(admin_color))
        .route("/admin/reload", post(reload_config))
        .route("/admin/shutdown", post(shutdown))
        .with_state(state)
}

async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let token = {
        let config = state.config.read().await;
        config.http.admin_token.clone()
    };
    // an unset token disables the admin surface entirely
    if token.is_empty() {
        return Err(StatusCode::FORBIDDEN);
    }
    let presented = headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented == token {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

fn internal(err: impl std::fmt::Display) -> StatusCode {
    log::error!("request failed: {err}");
    StatusCode::INTERNAL_SERVER_ERROR
}

#[derive(Serialize)]
struct StatusResponse {
    status: GlobalStatus,
    mode: StatusOverride,
    total_online: Option<u32>,
    lfg_waiting: usize,
    last_notifications: Vec<LfgNotification>,
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let board = state.status.lock().await;
    let lfg_waiting = state.lfg.lock().await.entries().len();
    Json(StatusResponse {
        status: board.effective(),
        mode: board.override_mode,
        total_online: board.total_online,
        lfg_waiting,
        last_notifications: board.notifications.clone(),
    })
}

#[derive(Serialize)]
struct PlayerProfile {
    #[serde(flatten)]
    record: PlayerRecord,
    rank: &'static str,
    ribbons: Vec<&'static str>,
    medal_names: Vec<&'static str>,
    medal_count: u32,
    owner_uid: Option<u64>,
    color: Option<(u8, u8, u8)>,
}

async fn get_player(
    State(state): State<Arc<AppState>>,
    Path(nick): Path<String>,
) -> Result<Json<PlayerProfile>, StatusCode> {
    let record = state
        .db
        .player(&nick)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    let owner = state.db.owner_of(&nick).await.map_err(internal)?;
    let color = state.db.color(&nick).await.map_err(internal)?;

    let (_, rank) = awards::rank(record.score, record.pph);
    let ribbons = awards::ribbons(&record).iter().map(|r| r.name()).collect();
    let medal_names = awards::medal_names(record.medals);
    let medal_count = awards::medals_earned(record.medals);
    Ok(Json(PlayerProfile {
        rank,
        ribbons,
        medal_names,
        medal_count,
        owner_uid: owner.map(|o| o.chat_uid),
        color: color.map(|c| (c.red, c.green, c.blue)),
        record,
    }))
}

#[derive(Serialize)]
struct LeaderboardRow {
    position: usize,
    nickname: String,
    value: f64,
}

async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(stat): Path<String>,
) -> Result<Json<Vec<Vec<LeaderboardRow>>>, StatusCode> {
    let stat: LeaderboardStat = stat.parse().map_err(|()| StatusCode::BAD_REQUEST)?;
    let records = state.db.leaderboard(stat, 50).await.map_err(internal)?;

    // pages of 10
    let rows = records.into_iter().enumerate().map(|(i, r)| LeaderboardRow {
        position: i + 1,
        value: match stat {
            LeaderboardStat::Score => r.score as f64,
            LeaderboardStat::Wins => f64::from(r.wins),
            LeaderboardStat::Mvp => f64::from(r.mvp),
            LeaderboardStat::Pph => r.pph,
            LeaderboardStat::Playtime => r.playtime_secs as f64,
        },
        nickname: r.nickname,
    });
    let chunked = rows.chunks(10);
    let pages = chunked.into_iter().map(|chunk| chunk.collect()).collect();
    Ok(Json(pages))
}

async fn get_maps(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MapStatRow>>, StatusCode> {
    let stats = state.db.map_stats().await.map_err(internal)?;
    Ok(Json(stats))
}

async fn get_lfg(State(state): State<Arc<AppState>>) -> Json<Vec<LfgEntry>> {
    let queue = state.lfg.lock().await;
    Json(queue.entries().to_vec())
}

#[derive(Deserialize)]
struct LfgJoinRequest {
    uid: u64,
    name: String,
    gamemode: GamePreference,
    min_players: u32,
}

#[derive(Serialize)]
struct LfgJoinResponse {
    joined: bool,
    updated: bool,
}

async fn join_lfg(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LfgJoinRequest>,
) -> Result<Json<LfgJoinResponse>, StatusCode> {
    if !(1..=27).contains(&req.min_players) {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let mut queue = state.lfg.lock().await;
    let joined = queue.join(LfgEntry {
        uid: req.uid,
        name: req.name,
        preference: req.gamemode,
        min_players: req.min_players,
    });
    Ok(Json(LfgJoinResponse {
        joined,
        updated: !joined,
    }))
}

async fn leave_lfg(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<u64>,
) -> Result<StatusCode, StatusCode> {
    let mut queue = state.lfg.lock().await;
    if queue.leave(uid) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

#[derive(Deserialize)]
struct SetStatusRequest {
    mode: StatusOverride,
}

async fn set_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SetStatusRequest>,
) -> Result<StatusCode, StatusCode> {
    authorize(&state, &headers).await?;
    let mut board = state.status.lock().await;
    board.override_mode = req.mode;
    log::info!("global status override set to {:?}", req.mode);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct AdminMessageRequest {
    /// Omit (or "all") to message every online player.
    nickname: Option<String>,
    message: String,
}

#[derive(Serialize)]
struct AdminRelayResponse {
    result: String,
}

async fn resolve_profile_id(state: &AppState, nickname: &str) -> Result<u32, StatusCode> {
    let record = state
        .db
        .player(nickname)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(record.profile_id)
}

async fn admin_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AdminMessageRequest>,
) -> Result<Json<AdminRelayResponse>, StatusCode> {
    authorize(&state, &headers).await?;
    let profile_id = match req.nickname.as_deref() {
        None | Some("all") => None,
        Some(nick) => Some(resolve_profile_id(&state, nick).await?),
    };
    let response = state
        .client
        .admin_message(profile_id, &req.message)
        .await
        .map_err(internal)?;
    log::info!(
        "admin message relayed to {}: {}",
        req.nickname.as_deref().unwrap_or("all"),
        response.result
    );
    Ok(Json(AdminRelayResponse {
        result: response.result,
    }))
}

#[derive(Deserialize)]
struct AdminKickRequest {
    nickname: String,
}

async fn admin_kick(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AdminKickRequest>,
) -> Result<Json<AdminRelayResponse>, StatusCode> {
    authorize(&state, &headers).await?;
    let profile_id = resolve_profile_id(&state, &req.nickname).await?;
    let response = state.client.admin_kick(profile_id).await.map_err(internal)?;
    log::info!("admin kick for {}: {}", req.nickname, response.result);
    Ok(Json(AdminRelayResponse {
        result: response.result,
    }))
}

#[derive(Deserialize)]
struct AdminBlacklistRequest {
    nickname: String,
}

async fn admin_blacklist(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AdminBlacklistRequest>,
) -> Result<StatusCode, StatusCode> {
    authorize(&state, &headers).await?;
    state
        .db
        .add_to_blacklist(&req.nickname)
        .await
        .map_err(internal)?;
    log::info!("{} blacklisted from future aggregation", req.nickname);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct AdminLinkRequest {
    nickname: String,
    chat_uid: u64,
}

async fn admin_link(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AdminLinkRequest>,
) -> Result<StatusCode, StatusCode> {
    authorize(&state, &headers).await?;
    // nickname must exist before it can be owned
    resolve_profile_id(&state, &req.nickname).await?;
    state
        .db
        .link_account(&req.nickname, req.chat_uid)
        .await
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct AdminColorRequest {
    nickname: String,
    red: u8,
    green: u8,
    blue: u8,
}

async fn admin_color(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AdminColorRequest>,
) -> Result<StatusCode, StatusCode> {
    authorize(&state, &headers).await?;
    resolve_profile_id(&state, &req.nickname).await?;
    state
        .db
        .set_color(&req.nickname, (req.red, req.green, req.blue))
        .await
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reload_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, StatusCode> {
    authorize(&state, &headers).await?;
    let fresh = Config::load(&state.config_path).map_err(internal)?;
    *state.config.write().await = fresh;
    log::info!("config reloaded from {}", state.config_path);
    Ok(StatusCode::NO_CONTENT)
}

async fn shutdown(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, StatusCode> {
    authorize(&state, &headers).await?;
    log::info!("shutdown requested over HTTP");
    let _ = state.shutdown.send(true);
    Ok(StatusCode::NO_CONTENT)
}
