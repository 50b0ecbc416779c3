//! In-process repositories for local runs and tests.

use crate::{
    domain::{BidRepository, DuelRepository, MemeRepository},
    errors::RepoError,
    models::{Bid, Duel, DuelSide, Meme, UserId, VoteType},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryMemeRepository {
    memes: RwLock<HashMap<Uuid, Meme>>,
}

#[async_trait]
impl MemeRepository for InMemoryMemeRepository {
    async fn create(&self, meme: &Meme) -> Result<(), RepoError> {
        self.memes.write().await.insert(meme.id, meme.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Meme>, RepoError> {
        Ok(self.memes.read().await.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Meme>, RepoError> {
        Ok(self.memes.read().await.values().cloned().collect())
    }

    async fn apply_vote(&self, id: Uuid, vote: VoteType) -> Result<Meme, RepoError> {
        let mut memes = self.memes.write().await;
        let meme = memes.get_mut(&id).ok_or(RepoError::NotFound("Meme", id))?;
        match vote {
            VoteType::Up => meme.upvotes += 1,
            VoteType::Down => meme.downvotes += 1,
        }
        Ok(meme.clone())
    }

    async fn update_caption(&self, id: Uuid, caption: &str) -> Result<Meme, RepoError> {
        let mut memes = self.memes.write().await;
        let meme = memes.get_mut(&id).ok_or(RepoError::NotFound("Meme", id))?;
        meme.ai_caption = caption.to_string();
        Ok(meme.clone())
    }
}

#[derive(Default)]
pub struct InMemoryBidRepository {
    bids: RwLock<Vec<Bid>>,
}

#[async_trait]
impl BidRepository for InMemoryBidRepository {
    async fn create(&self, bid: &Bid) -> Result<(), RepoError> {
        self.bids.write().await.push(bid.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Bid>, RepoError> {
        Ok(self.bids.read().await.clone())
    }

    async fn list_for_meme(&self, meme_id: Uuid) -> Result<Vec<Bid>, RepoError> {
        Ok(self
            .bids
            .read()
            .await
            .iter()
            .filter(|bid| bid.meme_id == meme_id)
            .cloned()
            .collect())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Bid>, RepoError> {
        Ok(self
            .bids
            .read()
            .await
            .iter()
            .filter(|bid| bid.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryDuelRepository {
    duels: RwLock<HashMap<Uuid, Duel>>,
}

#[async_trait]
impl DuelRepository for InMemoryDuelRepository {
    async fn create(&self, duel: &Duel) -> Result<(), RepoError> {
        self.duels.write().await.insert(duel.id, duel.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Duel>, RepoError> {
        Ok(self.duels.read().await.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Duel>, RepoError> {
        Ok(self.duels.read().await.values().cloned().collect())
    }

    async fn record_vote(&self, id: Uuid, side: DuelSide) -> Result<Duel, RepoError> {
        let mut duels = self.duels.write().await;
        let duel = duels.get_mut(&id).ok_or(RepoError::NotFound("Duel", id))?;
        match side {
            DuelSide::First => duel.meme1_upvotes += 1,
            DuelSide::Second => duel.meme2_upvotes += 1,
        }
        Ok(duel.clone())
    }

    async fn end(&self, id: Uuid, at: DateTime<Utc>) -> Result<Duel, RepoError> {
        let mut duels = self.duels.write().await;
        let duel = duels.get_mut(&id).ok_or(RepoError::NotFound("Duel", id))?;
        duel.timer = at;
        Ok(duel.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meme() -> Meme {
        Meme {
            id: Uuid::new_v4(),
            title: "Galaxy brain".to_string(),
            image_url: "https://picsum.photos/200".to_string(),
            description: None,
            tags: vec!["brain".to_string()],
            owner_id: 1,
            author: "mememaster".to_string(),
            author_avatar: "https://i.pravatar.cc/150?u=1".to_string(),
            upvotes: 0,
            downvotes: 0,
            ai_caption: String::new(),
            vibe_analysis: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn votes_accumulate_on_the_right_counter() {
        let repo = InMemoryMemeRepository::default();
        let meme = meme();
        repo.create(&meme).await.unwrap();

        repo.apply_vote(meme.id, VoteType::Up).await.unwrap();
        repo.apply_vote(meme.id, VoteType::Up).await.unwrap();
        let updated = repo.apply_vote(meme.id, VoteType::Down).await.unwrap();

        assert_eq!(updated.upvotes, 2);
        assert_eq!(updated.downvotes, 1);
    }

    #[tokio::test]
    async fn voting_on_unknown_meme_is_not_found() {
        let repo = InMemoryMemeRepository::default();
        let id = Uuid::new_v4();
        let err = repo.apply_vote(id, VoteType::Up).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound("Meme", missing) if missing == id));
    }

    #[tokio::test]
    async fn bids_filter_by_meme_and_user() {
        let repo = InMemoryBidRepository::default();
        let meme_id = Uuid::new_v4();
        for (user_id, target) in [(1, meme_id), (2, meme_id), (1, Uuid::new_v4())] {
            repo.create(&Bid {
                id: Uuid::new_v4(),
                meme_id: target,
                user_id,
                credits: 10,
                username: format!("user{}", user_id),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }

        assert_eq!(repo.list_for_meme(meme_id).await.unwrap().len(), 2);
        assert_eq!(repo.list_for_user(1).await.unwrap().len(), 2);
        assert_eq!(repo.list_all().await.unwrap().len(), 3);
    }
}
