pub mod ai;
pub mod auth;
pub mod aws_clients;
pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod realtime;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod startup;
pub mod validation;

use crate::{
    ai::AiService,
    auth::UserDirectory,
    cache::CacheService,
    config::Config,
    domain::{BidRepository, DuelRepository, MemeRepository, TextGenerator},
    memory::{InMemoryBidRepository, InMemoryDuelRepository, InMemoryMemeRepository},
    realtime::RealtimeHub,
};
use std::{sync::Arc, time::Instant};

/// Shared resources for the web server and the websocket hub.
pub struct AppState {
    pub config: Config,
    pub memes: Arc<dyn MemeRepository>,
    pub bids: Arc<dyn BidRepository>,
    pub duels: Arc<dyn DuelRepository>,
    pub users: UserDirectory,
    pub cache: CacheService,
    pub ai: AiService,
    pub hub: RealtimeHub,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        memes: Arc<dyn MemeRepository>,
        bids: Arc<dyn BidRepository>,
        duels: Arc<dyn DuelRepository>,
        generator: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        let cache = CacheService::new(config.leaderboard_cache_ttl, config.cache_ttl);
        let ai = AiService::new(generator, cache.clone());
        let hub = RealtimeHub::new(config.allowed_events.clone());
        Self {
            config,
            memes,
            bids,
            duels,
            users: UserDirectory::default(),
            cache,
            ai,
            hub,
            started_at: Instant::now(),
        }
    }

    /// State backed by in-memory storage with no AI provider.
    pub fn in_memory(config: Config) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryMemeRepository::default()),
            Arc::new(InMemoryBidRepository::default()),
            Arc::new(InMemoryDuelRepository::default()),
            None,
        )
    }
}
