use crate::{
    AppState,
    auth::{User, UserDirectory},
    errors::AppError,
    models::{Bid, BidWithMeme, Meme, MemePreview, Timeframe, TopBidder, UserId},
    realtime::ServerEvent,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Places a bid, charging the bidder's credits and notifying the meme's owner.
pub async fn place_bid(state: &AppState, meme_id: Uuid, credits: u32, user: &User) -> Result<(Bid, Meme), AppError> {
    let meme = state
        .memes
        .get_by_id(meme_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Meme with ID {}", meme_id)))?;

    state.users.spend_credits(user.id, credits)?;

    let bid = Bid {
        id: Uuid::new_v4(),
        meme_id,
        user_id: user.id,
        credits,
        username: user.username.clone(),
        created_at: Utc::now(),
    };
    if let Err(e) = state.bids.create(&bid).await {
        state.users.refund_credits(user.id, credits);
        return Err(e.into());
    }

    state.cache.invalidate_leaderboard().await;
    state.hub.emit(ServerEvent::BidUpdate {
        meme_id,
        bid_amount: credits,
        user_id: user.id,
        username: user.username.clone(),
    });
    state.hub.emit_bid_placed(&bid, &meme);

    tracing::info!(bid_id = %bid.id, meme_id = %meme_id, user_id = user.id, credits, "Bid placed");
    Ok((bid, meme))
}

/// Bids on one meme, newest first, with their credit total.
pub async fn bids_for_meme(state: &AppState, meme_id: Uuid) -> Result<(Vec<Bid>, u64), AppError> {
    let mut bids = state.bids.list_for_meme(meme_id).await?;
    bids.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let total = bids.iter().map(|b| u64::from(b.credits)).sum();
    Ok((bids, total))
}

pub async fn user_bids(state: &AppState, user_id: UserId) -> Result<Vec<BidWithMeme>, AppError> {
    let mut bids = state.bids.list_for_user(user_id).await?;
    bids.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let memes: HashMap<Uuid, Meme> = state
        .memes
        .list_all()
        .await?
        .into_iter()
        .map(|m| (m.id, m))
        .collect();

    Ok(bids
        .into_iter()
        .map(|bid| BidWithMeme {
            meme: memes.get(&bid.meme_id).map(MemePreview::from),
            bid,
        })
        .collect())
}

pub async fn top_bidders(state: &AppState, limit: usize, timeframe: Timeframe) -> Result<Vec<TopBidder>, AppError> {
    let cache_key = format!("top_bidders_{}_{}", limit, timeframe.as_str());
    if let Some(cached) = state.cache.get_leaderboard::<Vec<TopBidder>>(&cache_key).await {
        return Ok(cached);
    }

    let bids = state.bids.list_all().await?;
    let ranked = aggregate_bidders(&bids, &state.users, Utc::now(), limit, timeframe);

    state.cache.set_leaderboard(&cache_key, &ranked).await;
    Ok(ranked)
}

fn aggregate_bidders(
    bids: &[Bid],
    users: &UserDirectory,
    now: DateTime<Utc>,
    limit: usize,
    timeframe: Timeframe,
) -> Vec<TopBidder> {
    let cutoff = timeframe.cutoff(now);
    let mut totals: HashMap<UserId, u64> = HashMap::new();
    for bid in bids.iter().filter(|b| cutoff.is_none_or(|c| b.created_at >= c)) {
        *totals.entry(bid.user_id).or_insert(0) += u64::from(bid.credits);
    }

    let mut totals: Vec<(UserId, u64)> = totals.into_iter().collect();
    totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    totals.truncate(limit);

    totals
        .into_iter()
        .enumerate()
        .map(|(index, (user_id, total_credits))| TopBidder {
            rank: index + 1,
            user_id,
            username: users.find(user_id).map(|u| u.username),
            total_credits,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn bid(user_id: UserId, credits: u32, age_days: i64) -> Bid {
        Bid {
            id: Uuid::new_v4(),
            meme_id: Uuid::new_v4(),
            user_id,
            credits,
            username: String::new(),
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[test]
    fn bidders_are_ranked_by_total_credits() {
        let users = UserDirectory::default();
        let bids = vec![bid(1, 100, 0), bid(2, 300, 0), bid(1, 250, 0), bid(42, 10, 0)];

        let ranked = aggregate_bidders(&bids, &users, Utc::now(), 10, Timeframe::All);
        assert_eq!(ranked.len(), 3);
        assert_eq!((ranked[0].user_id, ranked[0].total_credits, ranked[0].rank), (1, 350, 1));
        assert_eq!(ranked[0].username.as_deref(), Some("mememaster"));
        assert_eq!((ranked[1].user_id, ranked[1].total_credits), (2, 300));
        assert_eq!(ranked[2].username, None);
    }

    #[test]
    fn timeframe_excludes_old_bids() {
        let users = UserDirectory::default();
        let bids = vec![bid(1, 100, 0), bid(2, 900, 10)];

        let ranked = aggregate_bidders(&bids, &users, Utc::now(), 10, Timeframe::Week);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].user_id, 1);

        let ranked = aggregate_bidders(&bids, &users, Utc::now(), 1, Timeframe::All);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].user_id, 2);
    }
}
