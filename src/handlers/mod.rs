//! Axum handlers. Successful responses use the `{success, data, ...}` envelope.

pub mod auth;
pub mod bids;
pub mod duels;
pub mod health;
pub mod leaderboard;
pub mod memes;
