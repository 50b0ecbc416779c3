use super::{Broadcast, ClientEvent, RealtimeHub, ServerEvent, Target, rooms};
use crate::{
    AppState,
    errors::AppError,
    services::{bids, duels, memes},
    validation,
};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use chrono::Utc;
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (socket_id, direct_rx) = state.hub.register().await;
    let events = state.hub.subscribe();
    tracing::info!(%socket_id, "Client connected");

    state
        .hub
        .reply(
            socket_id,
            ServerEvent::Connected {
                message: "Connected to MemeHustle real-time server".to_string(),
                socket_id,
                timestamp: Utc::now(),
            },
        )
        .await;

    let (sender, receiver) = socket.split();
    let mut send_task = tokio::spawn(send_events(sender, direct_rx, events, socket_id, state.hub.clone()));
    let mut recv_task = tokio::spawn(receive_messages(receiver, socket_id, state.clone()));

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.unregister(socket_id).await;
    tracing::info!(%socket_id, "Client disconnected");
}

async fn send_events(
    mut sender: SplitSink<WebSocket, Message>,
    mut direct: mpsc::Receiver<ServerEvent>,
    mut events: broadcast::Receiver<Broadcast>,
    socket_id: Uuid,
    hub: RealtimeHub,
) {
    loop {
        let event = tokio::select! {
            reply = direct.recv() => match reply {
                Some(event) => event,
                None => break,
            },
            received = events.recv() => match received {
                Ok(message) => match deliverable(&hub, socket_id, message).await {
                    Some(event) => event,
                    None => continue,
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(%socket_id, skipped, "Client lagged behind, events skipped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(%socket_id, event = event.name(), error = %e, "Failed to encode event");
                continue;
            }
        };
        if let Err(e) = sender.send(Message::Text(json.into())).await {
            tracing::debug!(%socket_id, error = %e, "Send failed, closing");
            break;
        }
    }
}

/// Room broadcasts reach only sockets that joined the room.
async fn deliverable(hub: &RealtimeHub, socket_id: Uuid, broadcast: Broadcast) -> Option<ServerEvent> {
    let Broadcast { target, event } = broadcast;
    match target {
        Target::All => Some(event),
        Target::Room(room) => hub.is_member(socket_id, &room).await.then_some(event),
    }
}

async fn receive_messages(mut receiver: SplitStream<WebSocket>, socket_id: Uuid, state: Arc<AppState>) {
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => handle_client_message(&state, socket_id, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(%socket_id, error = %e, "Websocket error");
                break;
            }
        }
    }
}

pub(crate) async fn handle_client_message(state: &AppState, socket_id: Uuid, text: &str) {
    let event = match ClientEvent::parse(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(%socket_id, error = %e, "Rejected client message");
            state.hub.reply(socket_id, ServerEvent::Error { message: e.to_string() }).await;
            return;
        }
    };

    let failure = failure_message(&event);
    if let Err(e) = dispatch(state, socket_id, event).await {
        tracing::warn!(%socket_id, error = %e, "{}", failure);
        state
            .hub
            .reply(socket_id, ServerEvent::Error { message: failure.to_string() })
            .await;
    }
}

fn failure_message(event: &ClientEvent) -> &'static str {
    match event {
        ClientEvent::JoinUserRoom(_) | ClientEvent::JoinLeaderboard => "Failed to join room.",
        ClientEvent::Vote(_) => "Failed to register vote.",
        ClientEvent::Bid(_) => "Failed to place bid.",
        ClientEvent::Leaderboard(_) => "Failed to fetch leaderboard.",
        ClientEvent::GetBattles => "Failed to fetch battles.",
        ClientEvent::EndBattle(_) => "Failed to end battle.",
        ClientEvent::DuelVote(_) => "Failed to vote on battle.",
    }
}

/// Runs one client event. Vote and bid broadcasts come from the services themselves.
async fn dispatch(state: &AppState, socket_id: Uuid, event: ClientEvent) -> Result<(), AppError> {
    match event {
        ClientEvent::JoinUserRoom(user_id) => state.hub.join(socket_id, rooms::user(user_id)).await,
        ClientEvent::JoinLeaderboard => state.hub.join(socket_id, rooms::LEADERBOARD).await,
        ClientEvent::Vote(vote) => {
            let user = known_user(state, vote.user_id)?;
            memes::vote(state, vote.meme_id, vote.vote_type, user.id).await?;
        }
        ClientEvent::Bid(bid) => {
            let user = known_user(state, bid.user_id)?;
            let credits = validation::validate_bid_credits(bid.bid_amount)?;
            bids::place_bid(state, bid.meme_id, credits, &user).await?;
        }
        ClientEvent::Leaderboard(request) => {
            let trending = memes::trending(state, request.top).await?;
            state.hub.emit(ServerEvent::LeaderboardUpdate(trending));
        }
        ClientEvent::GetBattles => {
            let all = duels::list_duels(state).await?;
            state.hub.emit(ServerEvent::BattlesUpdate(all));
        }
        ClientEvent::EndBattle(request) => {
            duels::end_duel(state, request.battle_id).await?;
        }
        ClientEvent::DuelVote(vote) => {
            duels::vote_duel(state, vote.battle_id, vote.meme_id).await?;
        }
    }
    Ok(())
}

fn known_user(state: &AppState, user_id: crate::models::UserId) -> Result<crate::auth::User, AppError> {
    state
        .users
        .find(user_id)
        .ok_or_else(|| AppError::NotFound(format!("User with ID {}", user_id)))
}
