use crate::{
    AppState,
    auth::AuthUser,
    errors::AppError,
    models::{MemeSort, SortOrder, UserId, VoteType},
    services::memes::{self, MemeFilters, NewMeme},
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CreateMemeRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListMemesQuery {
    /// Comma separated; a meme matches when it carries any of them.
    pub tags: Option<String>,
    pub owner_id: Option<UserId>,
    pub search: Option<String>,
    pub sort_by: Option<MemeSort>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    /// The requested limit clamped to `1..=100`.
    fn resolve(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    #[serde(rename = "type")]
    pub vote_type: VoteType,
}

pub async fn create_meme(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateMemeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let meme = memes::create_meme(
        &state,
        NewMeme {
            title: request.title,
            image_url: request.image_url,
            tags: request.tags,
            description: request.description,
        },
        &user,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": meme, "message": "Meme created successfully" })),
    ))
}

pub async fn list_memes(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    query: Result<Query<ListMemesQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let filters = MemeFilters {
        tags: query
            .tags
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        owner_id: query.owner_id,
        search: query.search.filter(|s| !s.is_empty()),
        sort_by: query.sort_by.unwrap_or_default(),
        sort_order: query.sort_order.unwrap_or_default(),
    };

    let memes = memes::list_memes(&state, &filters).await?;
    tracing::debug!("Listed {} memes", memes.len());
    Ok(Json(json!({ "success": true, "data": memes, "filters": filters })))
}

pub async fn get_meme(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let meme_id = Uuid::parse_str(&id_str)?;
    tracing::debug!(%meme_id, "Fetching meme details");
    let meme = memes::get_meme(&state, meme_id).await?;
    Ok(Json(json!({ "success": true, "data": meme })))
}

pub async fn vote(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id_str): Path<String>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let meme_id = Uuid::parse_str(&id_str)?;
    let Json(request) = payload?;
    let meme = memes::vote(&state, meme_id, request.vote_type, user.id).await?;
    Ok(Json(json!({ "success": true, "data": meme, "message": "Vote registered" })))
}

pub async fn trending(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let limit = query.resolve();
    let memes = memes::trending(&state, limit).await?;
    Ok(Json(json!({ "success": true, "data": memes, "filters": { "limit": limit } })))
}

pub async fn regenerate_caption(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let meme_id = Uuid::parse_str(&id_str)?;
    let caption = memes::regenerate_caption(&state, meme_id).await?;
    Ok(Json(json!({
        "success": true,
        "data": caption,
        "message": "Caption regenerated successfully",
    })))
}

pub async fn trending_tags(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let tags = memes::trending_tags(&state, query.resolve()).await?;
    Ok(Json(json!({
        "success": true,
        "data": tags,
        "message": "Trending tags retrieved successfully",
    })))
}
