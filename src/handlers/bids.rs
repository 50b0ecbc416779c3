use crate::{
    AppState,
    auth::AuthUser,
    errors::AppError,
    services::bids,
    validation,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct PlaceBidRequest {
    pub credits: i64,
}

pub async fn place_bid(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(meme_id): Path<String>,
    payload: Result<Json<PlaceBidRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let meme_id = Uuid::parse_str(&meme_id)?;
    let Json(request) = payload?;
    let credits = validation::validate_bid_credits(request.credits)?;

    let (bid, meme) = bids::place_bid(&state, meme_id, credits, &user).await?;
    let remaining = state.users.find(user.id).map(|u| u.credits);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": {
                "bid": bid,
                "remaining_credits": remaining,
                "message": format!("{} bid {} credits on {}", user.username, credits, meme.title),
            },
        })),
    ))
}

pub async fn bids_for_meme(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(meme_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let meme_id = Uuid::parse_str(&meme_id)?;
    let (bids, total_credits) = bids::bids_for_meme(&state, meme_id).await?;
    Ok(Json(json!({
        "success": true,
        "total": bids.len(),
        "total_credits": total_credits,
        "data": bids,
    })))
}

pub async fn my_bids(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let bids = bids::user_bids(&state, user.id).await?;
    Ok(Json(json!({ "success": true, "data": bids })))
}
