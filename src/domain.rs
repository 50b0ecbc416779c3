use crate::errors::{AiError, RepoError};
use crate::models::{Bid, Duel, DuelSide, Meme, UserId, VoteType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Storage for meme records.
#[async_trait]
pub trait MemeRepository: Send + Sync + 'static { // Send+Sync+'static required for Arc<dyn>
    async fn create(&self, meme: &Meme) -> Result<(), RepoError>;

    /// Returns Ok(None) if the meme is not found.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Meme>, RepoError>;

    async fn list_all(&self) -> Result<Vec<Meme>, RepoError>;

    /// Atomically increments one vote counter and returns the updated meme.
    async fn apply_vote(&self, id: Uuid, vote: VoteType) -> Result<Meme, RepoError>;

    async fn update_caption(&self, id: Uuid, caption: &str) -> Result<Meme, RepoError>;
}

/// Append-only storage for bids.
#[async_trait]
pub trait BidRepository: Send + Sync + 'static {
    async fn create(&self, bid: &Bid) -> Result<(), RepoError>;

    async fn list_all(&self) -> Result<Vec<Bid>, RepoError>;

    async fn list_for_meme(&self, meme_id: Uuid) -> Result<Vec<Bid>, RepoError>;

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Bid>, RepoError>;
}

#[async_trait]
pub trait DuelRepository: Send + Sync + 'static {
    async fn create(&self, duel: &Duel) -> Result<(), RepoError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Duel>, RepoError>;

    async fn list_all(&self) -> Result<Vec<Duel>, RepoError>;

    /// Atomically increments the counter for `side`.
    async fn record_vote(&self, id: Uuid, side: DuelSide) -> Result<Duel, RepoError>;

    /// Moves the duel's end timestamp to `at`.
    async fn end(&self, id: Uuid, at: DateTime<Utc>) -> Result<Duel, RepoError>;
}

/// A text-generation backend used for captions and vibe analysis.
#[async_trait]
pub trait TextGenerator: Send + Sync + 'static {
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;
}
