//! Business operations shared by the HTTP handlers and the websocket hub.

pub mod bids;
pub mod duels;
pub mod leaderboard;
pub mod memes;

use crate::models::Bid;
use std::collections::HashMap;
use uuid::Uuid;

fn bid_counts(bids: &[Bid]) -> HashMap<Uuid, usize> {
    let mut counts = HashMap::new();
    for bid in bids {
        *counts.entry(bid.meme_id).or_insert(0) += 1;
    }
    counts
}
