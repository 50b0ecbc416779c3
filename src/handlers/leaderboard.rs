use crate::{
    AppState,
    errors::AppError,
    models::{Category, Timeframe},
    services::{bids, leaderboard},
    validation,
};
use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const DEFAULT_TOP: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct TopMemesQuery {
    pub top: Option<u32>,
    pub timeframe: Option<Timeframe>,
    pub category: Option<Category>,
}

#[derive(Debug, Deserialize)]
pub struct TopBiddersQuery {
    pub limit: Option<u32>,
    pub timeframe: Option<Timeframe>,
}

pub async fn top_memes(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TopMemesQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let top = validation::validate_top(query.top.unwrap_or(DEFAULT_TOP))?;
    let timeframe = query.timeframe.unwrap_or_default();
    let category = query.category.unwrap_or_default();

    let ranked = leaderboard::top_memes(&state, top, timeframe, category).await?;
    Ok(Json(json!({
        "success": true,
        "data": ranked,
        "filters": { "top": top, "timeframe": timeframe, "category": category },
        "generated_at": Utc::now(),
    })))
}

pub async fn top_bidders(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TopBiddersQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let limit = validation::validate_top(query.limit.unwrap_or(DEFAULT_TOP))?;
    let timeframe = query.timeframe.unwrap_or_default();

    let ranked = bids::top_bidders(&state, limit, timeframe).await?;
    Ok(Json(json!({
        "success": true,
        "data": ranked,
        "filters": { "limit": limit, "timeframe": timeframe },
        "generated_at": Utc::now(),
    })))
}
