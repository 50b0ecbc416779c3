use crate::{
    AppState,
    auth::AuthUser,
    errors::AppError,
    services::duels::{self, NewDuel},
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct StartDuelRequest {
    pub meme1: Uuid,
    pub meme2: Uuid,
    pub timer: DateTime<Utc>,
    pub host: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DuelVoteRequest {
    #[serde(alias = "memeId")]
    pub meme_id: Uuid,
}

pub async fn start_duel(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    payload: Result<Json<StartDuelRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let duel = duels::start_duel(
        &state,
        NewDuel {
            meme1: request.meme1,
            meme2: request.meme2,
            timer: request.timer,
            host: request.host,
        },
        &user.username,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": duel }))))
}

pub async fn list_duels(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let duels = duels::list_duels(&state).await?;
    Ok(Json(json!({ "success": true, "data": duels })))
}

pub async fn end_duel(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let duel_id = Uuid::parse_str(&id_str)?;
    let duel = duels::end_duel(&state, duel_id).await?;
    Ok(Json(json!({ "success": true, "data": duel, "message": "Duel ended" })))
}

pub async fn vote_duel(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id_str): Path<String>,
    payload: Result<Json<DuelVoteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let duel_id = Uuid::parse_str(&id_str)?;
    let Json(request) = payload?;
    let duel = duels::vote_duel(&state, duel_id, request.meme_id).await?;
    Ok(Json(json!({ "success": true, "data": duel })))
}
