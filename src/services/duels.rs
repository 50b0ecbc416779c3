use crate::{
    AppState,
    errors::AppError,
    models::{Duel, DuelView},
    realtime::ServerEvent,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewDuel {
    pub meme1: Uuid,
    pub meme2: Uuid,
    pub timer: DateTime<Utc>,
    pub host: Option<String>,
}

pub async fn start_duel(state: &AppState, input: NewDuel, default_host: &str) -> Result<DuelView, AppError> {
    let now = Utc::now();
    if input.meme1 == input.meme2 {
        return Err(AppError::InvalidInput("A duel needs two different memes".to_string()));
    }
    if input.timer <= now {
        return Err(AppError::InvalidInput("Duel timer must be in the future".to_string()));
    }
    for id in [input.meme1, input.meme2] {
        if state.memes.get_by_id(id).await?.is_none() {
            return Err(AppError::NotFound(format!("Meme with ID {}", id)));
        }
    }

    let duel = Duel {
        id: Uuid::new_v4(),
        meme1: input.meme1,
        meme2: input.meme2,
        timer: input.timer,
        meme1_upvotes: 0,
        meme2_upvotes: 0,
        host: input
            .host
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| default_host.to_string()),
        created_at: now,
    };
    state.duels.create(&duel).await?;
    tracing::info!(duel_id = %duel.id, meme1 = %duel.meme1, meme2 = %duel.meme2, "Duel started");

    broadcast_duels(state).await;
    Ok(duel.view(now))
}

pub async fn list_duels(state: &AppState) -> Result<Vec<DuelView>, AppError> {
    let mut duels = state.duels.list_all().await?;
    duels.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let now = Utc::now();
    Ok(duels.into_iter().map(|d| d.view(now)).collect())
}

pub async fn end_duel(state: &AppState, id: Uuid) -> Result<DuelView, AppError> {
    let now = Utc::now();
    let view = state.duels.end(id, now).await?.view(now);
    tracing::info!(duel_id = %id, "Duel ended");

    state.hub.emit(ServerEvent::BattleUpdate(view.clone()));
    Ok(view)
}

/// Votes are accepted after the timer has passed.
pub async fn vote_duel(state: &AppState, id: Uuid, meme_id: Uuid) -> Result<DuelView, AppError> {
    let duel = state
        .duels
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Duel with ID {}", id)))?;
    let side = duel
        .side_of(meme_id)
        .ok_or_else(|| AppError::InvalidInput(format!("Meme {} is not part of duel {}", meme_id, id)))?;

    let view = state.duels.record_vote(id, side).await?.view(Utc::now());
    tracing::debug!(duel_id = %id, meme_id = %meme_id, ?side, "Duel vote recorded");

    broadcast_duels(state).await;
    Ok(view)
}

/// Pushes the full duel list to every client.
async fn broadcast_duels(state: &AppState) {
    match list_duels(state).await {
        Ok(duels) => state.hub.emit(ServerEvent::BattlesUpdate(duels)),
        Err(e) => tracing::warn!(error = %e, "Could not load duels for broadcast"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, models::Meme};
    use chrono::Duration;

    async fn seeded() -> (AppState, Uuid, Uuid) {
        let state = AppState::in_memory(Config::default());
        let mut ids = Vec::new();
        for title in ["left", "right"] {
            let meme = Meme {
                id: Uuid::new_v4(),
                title: title.into(),
                image_url: "https://picsum.photos/200".into(),
                description: None,
                tags: vec!["duel".into()],
                owner_id: 1,
                author: "mememaster".into(),
                author_avatar: String::new(),
                upvotes: 0,
                downvotes: 0,
                ai_caption: String::new(),
                vibe_analysis: String::new(),
                created_at: Utc::now(),
            };
            state.memes.create(&meme).await.unwrap();
            ids.push(meme.id);
        }
        (state, ids[0], ids[1])
    }

    fn new_duel(meme1: Uuid, meme2: Uuid) -> NewDuel {
        NewDuel {
            meme1,
            meme2,
            timer: Utc::now() + Duration::minutes(1),
            host: None,
        }
    }

    #[tokio::test]
    async fn votes_broadcast_the_duel_list() {
        let (state, left, right) = seeded().await;
        let duel = start_duel(&state, new_duel(left, right), "mememaster").await.unwrap();
        assert_eq!(duel.duel.host, "mememaster");

        let mut events = state.hub.subscribe();
        let view = vote_duel(&state, duel.duel.id, left).await.unwrap();
        assert_eq!(view.duel.meme1_upvotes, 1);

        match events.recv().await.unwrap().event {
            ServerEvent::BattlesUpdate(duels) => assert_eq!(duels[0].duel.meme1_upvotes, 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn duels_need_existing_memes() {
        let (state, left, _) = seeded().await;
        let err = start_duel(&state, new_duel(left, Uuid::new_v4()), "host").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn ending_emits_the_final_state() {
        let (state, left, right) = seeded().await;
        let duel = start_duel(&state, new_duel(left, right), "host").await.unwrap();
        let mut events = state.hub.subscribe();

        let ended = end_duel(&state, duel.duel.id).await.unwrap();
        assert!(ended.ended);
        assert!(matches!(events.recv().await.unwrap().event, ServerEvent::BattleUpdate(v) if v.ended));
    }
}
