use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = u32;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Meme {
    pub id: Uuid,
    pub title: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub owner_id: UserId,
    pub author: String,
    pub author_avatar: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub ai_caption: String,
    pub vibe_analysis: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Bid {
    pub id: Uuid,
    pub meme_id: Uuid,
    pub user_id: UserId,
    pub credits: u32,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Duel {
    pub id: Uuid,
    pub meme1: Uuid,
    pub meme2: Uuid,
    /// End of the duel. Ending a duel early moves it to the moment it was ended.
    pub timer: DateTime<Utc>,
    #[serde(rename = "meme1Upvotes")]
    pub meme1_upvotes: i64,
    #[serde(rename = "meme2Upvotes")]
    pub meme2_upvotes: i64,
    pub host: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelSide {
    First,
    Second,
}

impl Duel {
    pub fn side_of(&self, meme_id: Uuid) -> Option<DuelSide> {
        if self.meme1 == meme_id {
            Some(DuelSide::First)
        } else if self.meme2 == meme_id {
            Some(DuelSide::Second)
        } else {
            None
        }
    }

    pub fn is_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.timer
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.timer - now).max(Duration::zero())
    }

    pub fn view(self, now: DateTime<Utc>) -> DuelView {
        DuelView {
            ended: self.is_ended(now),
            remaining_seconds: self.remaining(now).num_seconds(),
            duel: self,
        }
    }
}

/// A duel as served to clients, with the countdown resolved at read time.
#[derive(Serialize, Debug, Clone)]
pub struct DuelView {
    #[serde(flatten)]
    pub duel: Duel,
    pub ended: bool,
    pub remaining_seconds: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Day,
    Week,
    Month,
    #[default]
    All,
}

impl Timeframe {
    /// Earliest creation time still inside the window, `None` for `all`.
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let days = match self {
            Timeframe::Day => 1,
            Timeframe::Week => 7,
            Timeframe::Month => 30,
            Timeframe::All => return None,
        };
        Some(now - Duration::days(days))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::Day => "day",
            Timeframe::Week => "week",
            Timeframe::Month => "month",
            Timeframe::All => "all",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Upvotes,
    Bids,
    Recent,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Upvotes => "upvotes",
            Category::Bids => "bids",
            Category::Recent => "recent",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemeSort {
    #[default]
    CreatedAt,
    Upvotes,
    Downvotes,
    Title,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RankedMeme {
    #[serde(flatten)]
    pub meme: Meme,
    pub rank: usize,
    pub bid_count: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TopBidder {
    pub rank: usize,
    pub user_id: UserId,
    pub username: Option<String>,
    pub total_credits: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrendingTag {
    pub tag: String,
    pub count: usize,
}

#[derive(Serialize, Debug, Clone)]
pub struct MemeSummary {
    #[serde(flatten)]
    pub meme: Meme,
    pub bid_count: usize,
}

#[derive(Serialize, Debug, Clone)]
pub struct MemeDetail {
    #[serde(flatten)]
    pub meme: Meme,
    pub bids: Vec<Bid>,
}

#[derive(Serialize, Debug, Clone)]
pub struct MemePreview {
    pub id: Uuid,
    pub title: String,
    pub image_url: String,
    pub upvotes: i64,
}

impl From<&Meme> for MemePreview {
    fn from(meme: &Meme) -> Self {
        Self {
            id: meme.id,
            title: meme.title.clone(),
            image_url: meme.image_url.clone(),
            upvotes: meme.upvotes,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct BidWithMeme {
    #[serde(flatten)]
    pub bid: Bid,
    pub meme: Option<MemePreview>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duel_ending_at(timer: DateTime<Utc>) -> Duel {
        Duel {
            id: Uuid::new_v4(),
            meme1: Uuid::new_v4(),
            meme2: Uuid::new_v4(),
            timer,
            meme1_upvotes: 0,
            meme2_upvotes: 0,
            host: "mememaster".to_string(),
            created_at: timer - Duration::minutes(5),
        }
    }

    #[test]
    fn remaining_time_never_goes_negative() {
        let now = Utc::now();
        let running = duel_ending_at(now + Duration::seconds(90));
        assert_eq!(running.remaining(now).num_seconds(), 90);
        assert!(!running.is_ended(now));

        let finished = duel_ending_at(now - Duration::seconds(10));
        assert_eq!(finished.remaining(now), Duration::zero());
        assert!(finished.is_ended(now));
    }

    #[test]
    fn side_of_matches_either_meme() {
        let duel = duel_ending_at(Utc::now());
        assert_eq!(duel.side_of(duel.meme1), Some(DuelSide::First));
        assert_eq!(duel.side_of(duel.meme2), Some(DuelSide::Second));
        assert_eq!(duel.side_of(Uuid::new_v4()), None);
    }

    #[test]
    fn duel_view_uses_camel_case_counters() {
        let now = Utc::now();
        let view = duel_ending_at(now + Duration::seconds(30)).view(now);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["meme1Upvotes"], 0);
        assert_eq!(json["ended"], false);
        assert_eq!(json["remaining_seconds"], 30);
    }

    #[test]
    fn timeframe_cutoffs() {
        let now = Utc::now();
        assert_eq!(Timeframe::Week.cutoff(now), Some(now - Duration::days(7)));
        assert_eq!(Timeframe::All.cutoff(now), None);
    }
}
