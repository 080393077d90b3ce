//! HTTP operations API.
//!
//! The conversational frontend (or any other adapter) drives the engine
//! through these routes.  Join refusals are ordinary `200` responses with
//! a stable reason code; HTTP error statuses are reserved for malformed
//! requests and real failures.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use tombola_engine::{clock, DenyReason, EndOutcome, GiveawayService, Verdict};
use tombola_store::{
    BanRecord, BroadcastChat, Giveaway, LogEntry, LogFilter, NewGiveaway, Participant,
    PrizeKind, ProfileSnapshot, Store, StoreStats, UserId, UserStats, Winner, WinnerOutcome,
};

use crate::config::ServerConfig;
use crate::error::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub service: Arc<GiveawayService>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    fn display_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.config.display_offset_minutes * 60)
            .unwrap_or_else(|| clock::default_display_offset())
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/giveaways", post(create_giveaway).get(list_giveaways))
        .route("/giveaways/:id", get(get_giveaway).delete(delete_giveaway))
        .route("/giveaways/:id/join", post(join_giveaway))
        .route("/giveaways/:id/end", post(end_giveaway))
        .route("/giveaways/:id/cancel", post(cancel_giveaway))
        .route("/giveaways/:id/participants", get(list_participants))
        .route(
            "/giveaways/:id/participants/:user_id",
            delete(remove_participant),
        )
        .route(
            "/giveaways/:id/winners",
            get(list_winners).post(add_manual_winner),
        )
        .route("/giveaways/:id/winners/:user_id/claim", post(claim_prize))
        .route("/bans", post(ban_user))
        .route("/bans/:user_id", get(get_ban).delete(unban_user))
        .route("/broadcasts", post(add_broadcast).get(list_broadcasts))
        .route("/broadcasts/:chat_id", delete(remove_broadcast))
        .route("/users/top", get(top_participants))
        .route("/users/:user_id/stats", get(get_user_stats))
        .route("/users/:user_id/participations", get(list_participations))
        .route("/users/:user_id/cooldowns", delete(clear_cooldowns))
        .route("/stats", get(get_store_stats))
        .route("/logs", get(recent_logs))
        .route("/backup", post(export_backup))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the task is cancelled.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "operations API listening");
    axum::serve(listener, router).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct CreateGiveawayRequest {
    event_name: String,
    prize_kind: PrizeKind,
    prize_details: String,
    winner_count: u32,
    /// Wall-clock time in the configured display offset,
    /// e.g. `2026-03-01 07:30 PM`.  Defaults to now.
    start_time: Option<String>,
    /// Wall-clock time in the configured display offset.
    end_time: String,
    created_by: UserId,
}

#[derive(Serialize)]
struct GiveawayResponse {
    #[serde(flatten)]
    giveaway: Giveaway,
    time_remaining: String,
}

impl GiveawayResponse {
    fn from(giveaway: Giveaway) -> Self {
        let time_remaining = clock::time_remaining(giveaway.end_time, Utc::now());
        Self {
            giveaway,
            time_remaining,
        }
    }
}

#[derive(Deserialize)]
struct JoinRequest {
    user_id: UserId,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

#[derive(Serialize)]
struct JoinResponse {
    joined: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<DenyReason>,
}

#[derive(Serialize)]
struct EndResponse {
    outcome: &'static str,
    participants: usize,
    winners: Vec<UserId>,
}

#[derive(Serialize)]
struct ChangedResponse {
    changed: bool,
}

#[derive(Deserialize)]
struct ManualWinnerRequest {
    user_id: UserId,
    #[serde(default)]
    prize_note: Option<String>,
    added_by: UserId,
}

#[derive(Serialize)]
struct ManualWinnerResponse {
    outcome: &'static str,
}

#[derive(Deserialize)]
struct BanRequest {
    user_id: UserId,
    #[serde(default = "default_ban_reason")]
    reason: String,
    #[serde(default)]
    banned_by: Option<UserId>,
}

fn default_ban_reason() -> String {
    "No reason provided".to_string()
}

#[derive(Deserialize)]
struct BroadcastRequest {
    chat_id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize)]
struct ActorQuery {
    #[serde(default)]
    actor: Option<UserId>,
}

#[derive(Deserialize)]
struct ListQuery {
    /// Exact event name to look up instead of listing active giveaways.
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct CooldownQuery {
    /// Specific action to clear; omitted clears every cooldown the user
    /// holds.
    #[serde(default)]
    action: Option<String>,
}

#[derive(Deserialize)]
struct LogQuery {
    #[serde(default = "default_log_limit")]
    limit: usize,
    #[serde(default)]
    giveaway_id: Option<String>,
}

fn default_log_limit() -> usize {
    100
}

#[derive(Serialize)]
struct BackupResponse {
    path: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn create_giveaway(
    State(state): State<AppState>,
    Json(req): Json<CreateGiveawayRequest>,
) -> Result<Json<GiveawayResponse>, ServerError> {
    let offset = state.display_offset();

    let start_time = match &req.start_time {
        Some(raw) => clock::parse_wall_clock(raw, offset).ok_or_else(|| {
            ServerError::BadRequest(format!("start_time does not match {}", clock::WALL_CLOCK_FORMAT))
        })?,
        None => Utc::now(),
    };
    let end_time = clock::parse_wall_clock(&req.end_time, offset).ok_or_else(|| {
        ServerError::BadRequest(format!("end_time does not match {}", clock::WALL_CLOCK_FORMAT))
    })?;

    let giveaway = state
        .service
        .create(NewGiveaway {
            id: None,
            event_name: req.event_name,
            prize_kind: req.prize_kind,
            prize_details: req.prize_details,
            winner_count: req.winner_count,
            start_time,
            end_time,
            created_by: req.created_by,
        })
        .await?;

    Ok(Json(GiveawayResponse::from(giveaway)))
}

async fn list_giveaways(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<GiveawayResponse>> {
    let giveaways = match &query.name {
        Some(name) => state
            .store
            .giveaway_by_name(name)
            .await
            .into_iter()
            .collect(),
        None => state.store.active_giveaways().await,
    };
    Json(giveaways.into_iter().map(GiveawayResponse::from).collect())
}

async fn get_giveaway(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GiveawayResponse>, ServerError> {
    let giveaway = state
        .store
        .giveaway(&id)
        .await
        .ok_or_else(|| ServerError::NotFound(format!("giveaway {id}")))?;
    Ok(Json(GiveawayResponse::from(giveaway)))
}

async fn join_giveaway(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, ServerError> {
    let profile = ProfileSnapshot {
        username: req.username,
        first_name: req.first_name,
        last_name: req.last_name,
    };
    let verdict = state.service.join(req.user_id, profile, &id).await?;
    let response = match verdict {
        Verdict::Allowed => JoinResponse {
            joined: true,
            reason: None,
        },
        Verdict::Denied(reason) => JoinResponse {
            joined: false,
            reason: Some(reason),
        },
    };
    Ok(Json(response))
}

async fn end_giveaway(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EndResponse>, ServerError> {
    let response = match state.service.end_now(&id).await? {
        EndOutcome::Ended {
            participants,
            winners,
        } => EndResponse {
            outcome: "ended",
            participants,
            winners,
        },
        EndOutcome::AlreadyEnded => EndResponse {
            outcome: "already_ended",
            participants: 0,
            winners: Vec::new(),
        },
        EndOutcome::NotFound => {
            return Err(ServerError::NotFound(format!("giveaway {id}")));
        }
    };
    Ok(Json(response))
}

async fn cancel_giveaway(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(actor): Query<ActorQuery>,
) -> Result<Json<ChangedResponse>, ServerError> {
    let changed = state.service.cancel(&id, actor.actor.unwrap_or(0)).await?;
    Ok(Json(ChangedResponse { changed }))
}

async fn delete_giveaway(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(actor): Query<ActorQuery>,
) -> Result<Json<ChangedResponse>, ServerError> {
    let changed = state.service.delete(&id, actor.actor.unwrap_or(0)).await?;
    Ok(Json(ChangedResponse { changed }))
}

async fn list_participants(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<Participant>> {
    Json(state.store.active_participants(&id).await)
}

async fn remove_participant(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(String, UserId)>,
    Query(actor): Query<ActorQuery>,
) -> Result<Json<ChangedResponse>, ServerError> {
    let changed = state
        .service
        .remove_participant(&id, user_id, actor.actor.unwrap_or(0))
        .await?;
    Ok(Json(ChangedResponse { changed }))
}

async fn list_winners(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<Winner>> {
    Json(state.store.winners(&id).await)
}

async fn add_manual_winner(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ManualWinnerRequest>,
) -> Result<Json<ManualWinnerResponse>, ServerError> {
    let outcome = state
        .service
        .add_manual_winner(&id, req.user_id, req.prize_note, req.added_by)
        .await?;
    let outcome = match outcome {
        WinnerOutcome::Added => "added",
        WinnerOutcome::AlreadyWinner => "already_winner",
        WinnerOutcome::NotParticipant => "not_participant",
    };
    Ok(Json(ManualWinnerResponse { outcome }))
}

async fn claim_prize(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(String, UserId)>,
) -> Result<Json<ChangedResponse>, ServerError> {
    let changed = state.store.mark_prize_claimed(&id, user_id).await?;
    Ok(Json(ChangedResponse { changed }))
}

async fn ban_user(
    State(state): State<AppState>,
    Json(req): Json<BanRequest>,
) -> Result<Json<ChangedResponse>, ServerError> {
    let changed = state
        .store
        .ban_user(req.user_id, req.reason, req.banned_by)
        .await?;
    Ok(Json(ChangedResponse { changed }))
}

async fn get_ban(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<BanRecord>, ServerError> {
    state
        .store
        .ban_info(user_id)
        .await
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("no active ban for user {user_id}")))
}

async fn unban_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(actor): Query<ActorQuery>,
) -> Result<Json<ChangedResponse>, ServerError> {
    let changed = state.store.unban_user(user_id, actor.actor).await?;
    Ok(Json(ChangedResponse { changed }))
}

async fn add_broadcast(
    State(state): State<AppState>,
    Json(req): Json<BroadcastRequest>,
) -> Result<Json<ChangedResponse>, ServerError> {
    let changed = state
        .store
        .add_broadcast_chat(req.chat_id, req.username, req.title)
        .await?;
    Ok(Json(ChangedResponse { changed }))
}

async fn list_broadcasts(State(state): State<AppState>) -> Json<Vec<BroadcastChat>> {
    Json(state.store.broadcast_chats().await)
}

async fn remove_broadcast(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
) -> Result<Json<ChangedResponse>, ServerError> {
    let changed = state.store.remove_broadcast_chat(chat_id).await?;
    Ok(Json(ChangedResponse { changed }))
}

async fn get_user_stats(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<UserStats>, ServerError> {
    state
        .store
        .user_stats(user_id)
        .await
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("no stats for user {user_id}")))
}

async fn top_participants(State(state): State<AppState>) -> Json<Vec<UserStats>> {
    Json(state.store.top_participants(10).await)
}

async fn get_store_stats(State(state): State<AppState>) -> Json<StoreStats> {
    Json(state.store.store_stats().await)
}

async fn list_participations(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Json<Vec<String>> {
    Json(state.store.participations_of(user_id).await)
}

async fn clear_cooldowns(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<CooldownQuery>,
) -> Result<Json<ChangedResponse>, ServerError> {
    state
        .store
        .clear_cooldowns(user_id, query.action.as_deref())
        .await?;
    Ok(Json(ChangedResponse { changed: true }))
}

async fn recent_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Json<Vec<LogEntry>> {
    let filter = LogFilter {
        giveaway_id: query.giveaway_id,
        ..Default::default()
    };
    Json(state.store.recent_logs(query.limit, filter).await)
}

async fn export_backup(
    State(state): State<AppState>,
) -> Result<Json<BackupResponse>, ServerError> {
    let dir = state
        .store
        .path()
        .parent()
        .map(|p| p.join("backups"))
        .unwrap_or_else(|| std::path::PathBuf::from("backups"));
    let path = state.store.backup_to(&dir).await?;
    Ok(Json(BackupResponse {
        path: path.display().to_string(),
    }))
}
