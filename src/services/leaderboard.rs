use super::bid_counts;
use crate::{
    AppState,
    errors::AppError,
    models::{Bid, Category, Meme, RankedMeme, Timeframe},
};
use chrono::{DateTime, Utc};

pub fn top_memes_cache_key(top: usize, timeframe: Timeframe, category: Category) -> String {
    format!("top_memes_{}_{}_{}", top, timeframe.as_str(), category.as_str())
}

pub async fn top_memes(
    state: &AppState,
    top: usize,
    timeframe: Timeframe,
    category: Category,
) -> Result<Vec<RankedMeme>, AppError> {
    let cache_key = top_memes_cache_key(top, timeframe, category);
    if let Some(cached) = state.cache.get_leaderboard::<Vec<RankedMeme>>(&cache_key).await {
        tracing::debug!(%cache_key, "Serving leaderboard from cache");
        return Ok(cached);
    }

    let memes = state.memes.list_all().await?;
    let bids = state.bids.list_all().await?;
    let ranked = rank_memes(memes, &bids, Utc::now(), top, timeframe, category);

    state.cache.set_leaderboard(&cache_key, &ranked).await;
    Ok(ranked)
}

/// Ranks the memes inside `timeframe`. Ranking covers the whole window before `top` is applied.
pub fn rank_memes(
    memes: Vec<Meme>,
    bids: &[Bid],
    now: DateTime<Utc>,
    top: usize,
    timeframe: Timeframe,
    category: Category,
) -> Vec<RankedMeme> {
    let cutoff = timeframe.cutoff(now);
    let counts = bid_counts(bids);

    let mut entries: Vec<(Meme, usize)> = memes
        .into_iter()
        .filter(|m| cutoff.is_none_or(|c| m.created_at >= c))
        .map(|m| {
            let count = counts.get(&m.id).copied().unwrap_or(0);
            (m, count)
        })
        .collect();

    entries.sort_by(|(a, a_bids), (b, b_bids)| match category {
        Category::Upvotes => b.upvotes.cmp(&a.upvotes).then_with(|| b.created_at.cmp(&a.created_at)),
        Category::Bids => b_bids.cmp(a_bids).then_with(|| b.upvotes.cmp(&a.upvotes)),
        Category::Recent => b.created_at.cmp(&a.created_at),
    });
    entries.truncate(top);

    entries
        .into_iter()
        .enumerate()
        .map(|(index, (meme, bid_count))| RankedMeme {
            meme,
            rank: index + 1,
            bid_count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn meme(title: &str, upvotes: i64, age_hours: i64) -> Meme {
        Meme {
            id: Uuid::new_v4(),
            title: title.to_string(),
            image_url: "https://picsum.photos/200".to_string(),
            description: None,
            tags: vec!["test".to_string()],
            owner_id: 1,
            author: "mememaster".to_string(),
            author_avatar: String::new(),
            upvotes,
            downvotes: 0,
            ai_caption: String::new(),
            vibe_analysis: String::new(),
            created_at: Utc::now() - Duration::hours(age_hours),
        }
    }

    fn bids_on(meme: &Meme, n: usize) -> Vec<Bid> {
        (0..n)
            .map(|_| Bid {
                id: Uuid::new_v4(),
                meme_id: meme.id,
                user_id: 2,
                credits: 10,
                username: "vibelord".to_string(),
                created_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn upvotes_rank_highest_first() {
        let memes = vec![meme("low", 1, 1), meme("high", 50, 2), meme("mid", 10, 3)];
        let ranked = rank_memes(memes, &[], Utc::now(), 2, Timeframe::All, Category::Upvotes);
        assert_eq!(ranked.len(), 2);
        assert_eq!((ranked[0].meme.title.as_str(), ranked[0].rank), ("high", 1));
        assert_eq!((ranked[1].meme.title.as_str(), ranked[1].rank), ("mid", 2));
    }

    #[test]
    fn bid_category_ranks_over_the_whole_window() {
        // The most-bid meme has the fewest upvotes and must still win.
        let popular = meme("popular", 0, 1);
        let memes = vec![meme("a", 90, 1), meme("b", 80, 1), popular.clone()];
        let mut bids = bids_on(&popular, 3);
        bids.extend(bids_on(&memes[0], 1));

        let ranked = rank_memes(memes, &bids, Utc::now(), 1, Timeframe::All, Category::Bids);
        assert_eq!(ranked[0].meme.title, "popular");
        assert_eq!(ranked[0].bid_count, 3);
    }

    #[test]
    fn timeframe_and_recent_ordering() {
        let memes = vec![meme("yesterday", 5, 30), meme("now", 1, 0), meme("hour", 3, 1)];

        let ranked = rank_memes(memes.clone(), &[], Utc::now(), 10, Timeframe::Day, Category::Recent);
        assert_eq!(
            ranked.iter().map(|r| r.meme.title.as_str()).collect::<Vec<_>>(),
            vec!["now", "hour"]
        );

        let ranked = rank_memes(memes, &[], Utc::now(), 10, Timeframe::All, Category::Recent);
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn cache_key_names_every_dimension() {
        assert_eq!(
            top_memes_cache_key(10, Timeframe::Week, Category::Bids),
            "top_memes_10_week_bids"
        );
    }
}
