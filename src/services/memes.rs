use super::bid_counts;
use crate::{
    AppState,
    auth::User,
    errors::AppError,
    models::{Meme, MemeDetail, MemeSort, MemeSummary, SortOrder, TrendingTag, UserId, VoteType},
    realtime::ServerEvent,
    validation,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::{cmp::Ordering, collections::HashMap};
use uuid::Uuid;

const TRENDING_TAGS_WINDOW_DAYS: i64 = 7;
const TRENDING_TAGS_TTL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct NewMeme {
    pub title: String,
    pub image_url: String,
    pub tags: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MemeFilters {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    pub sort_by: MemeSort,
    pub sort_order: SortOrder,
}

pub async fn create_meme(state: &AppState, input: NewMeme, user: &User) -> Result<Meme, AppError> {
    validation::validate_meme(&input.title, &input.image_url, &input.tags, input.description.as_deref())?;

    let tags: Vec<String> = input.tags.iter().map(|t| t.trim().to_string()).collect();
    let title = input.title.trim().to_string();
    let generated = state.ai.generate_both(&tags, &title).await;

    let meme = Meme {
        id: Uuid::new_v4(),
        title,
        image_url: input.image_url,
        description: input.description,
        tags,
        owner_id: user.id,
        author: user.username.clone(),
        author_avatar: user.avatar.clone(),
        upvotes: 0,
        downvotes: 0,
        ai_caption: generated.caption,
        vibe_analysis: generated.vibe,
        created_at: Utc::now(),
    };
    state.memes.create(&meme).await?;

    state.cache.invalidate_leaderboard().await;
    state.hub.emit_leaderboard_update();

    tracing::info!(meme_id = %meme.id, title = %meme.title, user_id = user.id, "Created meme");
    Ok(meme)
}

pub async fn list_memes(state: &AppState, filters: &MemeFilters) -> Result<Vec<MemeSummary>, AppError> {
    let memes = state.memes.list_all().await?;
    let bids = state.bids.list_all().await?;
    let counts = bid_counts(&bids);

    let mut memes = filter_memes(memes, filters);
    sort_memes(&mut memes, filters.sort_by, filters.sort_order);

    Ok(memes
        .into_iter()
        .map(|meme| MemeSummary {
            bid_count: counts.get(&meme.id).copied().unwrap_or(0),
            meme,
        })
        .collect())
}

fn filter_memes(memes: Vec<Meme>, filters: &MemeFilters) -> Vec<Meme> {
    let search = filters.search.as_ref().map(|s| s.to_lowercase());
    memes
        .into_iter()
        .filter(|m| filters.owner_id.is_none_or(|owner| m.owner_id == owner))
        .filter(|m| filters.tags.is_empty() || m.tags.iter().any(|t| filters.tags.contains(t)))
        .filter(|m| {
            search
                .as_ref()
                .is_none_or(|needle| m.title.to_lowercase().contains(needle.as_str()))
        })
        .collect()
}

fn sort_memes(memes: &mut [Meme], sort_by: MemeSort, order: SortOrder) {
    memes.sort_by(|a, b| {
        let ordering = match sort_by {
            MemeSort::CreatedAt => a.created_at.cmp(&b.created_at),
            MemeSort::Upvotes => a.upvotes.cmp(&b.upvotes),
            MemeSort::Downvotes => a.downvotes.cmp(&b.downvotes),
            MemeSort::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

pub async fn get_meme(state: &AppState, id: Uuid) -> Result<MemeDetail, AppError> {
    let meme = state
        .memes
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Meme with ID {}", id)))?;
    let mut bids = state.bids.list_for_meme(id).await?;
    bids.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(MemeDetail { meme, bids })
}

/// Nothing stops a user from voting repeatedly.
pub async fn vote(state: &AppState, id: Uuid, vote_type: VoteType, user_id: UserId) -> Result<Meme, AppError> {
    let meme = state.memes.apply_vote(id, vote_type).await?;
    state.cache.invalidate_leaderboard().await;

    state.hub.emit(ServerEvent::VoteUpdate {
        meme_id: meme.id,
        vote_type,
        upvotes: meme.upvotes,
        downvotes: meme.downvotes,
    });
    state.hub.emit_leaderboard_update();

    tracing::info!(meme_id = %id, user_id, vote = ?vote_type, "Vote registered");
    Ok(meme)
}

/// Memes ordered by upvotes, highest first.
pub async fn trending(state: &AppState, limit: usize) -> Result<Vec<Meme>, AppError> {
    let mut memes = state.memes.list_all().await?;
    memes.sort_by(|a, b| b.upvotes.cmp(&a.upvotes).then_with(|| b.created_at.cmp(&a.created_at)));
    memes.truncate(limit);
    tracing::debug!("Retrieved {} memes for trending list", memes.len());
    Ok(memes)
}

pub async fn regenerate_caption(state: &AppState, id: Uuid) -> Result<String, AppError> {
    let meme = state
        .memes
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Meme with ID {}", id)))?;

    let caption = state.ai.generate_caption(&meme.tags, &meme.title).await;
    state.memes.update_caption(id, &caption).await?;

    tracing::info!(meme_id = %id, %caption, "Regenerated caption");
    Ok(caption)
}

pub async fn trending_tags(state: &AppState, limit: usize) -> Result<Vec<TrendingTag>, AppError> {
    let cache_key = format!("trending_tags_{}", limit);
    if let Some(cached) = state.cache.get::<Vec<TrendingTag>>(&cache_key).await {
        return Ok(cached);
    }

    let memes = state.memes.list_all().await?;
    let since = Utc::now() - Duration::days(TRENDING_TAGS_WINDOW_DAYS);
    let tags = count_tags(&memes, since, limit);

    state.cache.set(&cache_key, &tags, Some(TRENDING_TAGS_TTL)).await;
    Ok(tags)
}

fn count_tags(memes: &[Meme], since: DateTime<Utc>, limit: usize) -> Vec<TrendingTag> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for meme in memes.iter().filter(|m| m.created_at >= since) {
        for tag in &meme.tags {
            *counts.entry(tag.as_str()).or_insert(0) += 1;
        }
    }

    let mut tags: Vec<TrendingTag> = counts
        .into_iter()
        .map(|(tag, count)| TrendingTag {
            tag: tag.to_string(),
            count,
        })
        .collect();
    tags.sort_by(|a, b| match b.count.cmp(&a.count) {
        Ordering::Equal => a.tag.cmp(&b.tag),
        other => other,
    });
    tags.truncate(limit);
    tags
}
