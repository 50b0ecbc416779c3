use crate::{AppState, handlers, realtime::socket};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Ignoring invalid CORS_ORIGIN, allowing any origin");
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/users", get(handlers::auth::list_users))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/docs", get(handlers::auth::docs))
        .route("/memes", post(handlers::memes::create_meme).get(handlers::memes::list_memes))
        .route("/memes/leaderboard", get(handlers::memes::trending))
        .route("/memes/tags/trending", get(handlers::memes::trending_tags))
        .route("/memes/{id}", get(handlers::memes::get_meme))
        .route("/memes/{id}/vote", post(handlers::memes::vote))
        .route("/memes/{id}/regenerate-caption", post(handlers::memes::regenerate_caption))
        .route("/bids/me", get(handlers::bids::my_bids))
        .route("/bids/meme/{meme_id}", get(handlers::bids::bids_for_meme))
        .route("/bids/{meme_id}", post(handlers::bids::place_bid))
        .route("/leaderboard/memes", get(handlers::leaderboard::top_memes))
        .route("/leaderboard/bidders", get(handlers::leaderboard::top_bidders))
        .route("/memeDuel", get(handlers::duels::list_duels))
        .route("/memeDuel/start", post(handlers::duels::start_duel))
        .route("/memeDuel/{id}/end", post(handlers::duels::end_duel))
        .route("/memeDuel/{id}/vote", post(handlers::duels::vote_duel))
}

/// Creates the Axum router and associates routes with handlers.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.config.cors_origin.as_deref());
    Router::new()
        .route("/", get(handlers::health::health))
        .route("/ws", get(socket::ws_handler))
        .nest("/api", api_routes())
        .fallback(handlers::health::not_found)
        // Middleware Layers
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(state)
}
