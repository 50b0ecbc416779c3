//! Real-time fan-out of meme, bid and duel activity over websockets.
//!
//! Every connection receives broadcasts addressed to everyone, plus those
//! addressed to a room it has joined. Replies to a single socket go through
//! that socket's direct channel.

pub mod socket;

use crate::{
    errors::RealtimeError,
    models::{Bid, DuelView, Meme, UserId, VoteType},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

const BROADCAST_CAPACITY: usize = 1000;
const DIRECT_CAPACITY: usize = 64;

/// Events pushed to clients, serialized as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "connected", rename_all = "camelCase")]
    Connected {
        message: String,
        socket_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "voteUpdate", rename_all = "camelCase")]
    VoteUpdate {
        meme_id: Uuid,
        vote_type: VoteType,
        upvotes: i64,
        downvotes: i64,
    },
    #[serde(rename = "bidUpdate", rename_all = "camelCase")]
    BidUpdate {
        meme_id: Uuid,
        bid_amount: u32,
        user_id: UserId,
        username: String,
    },
    #[serde(rename = "leaderboardUpdate")]
    LeaderboardUpdate(Vec<Meme>),
    #[serde(rename = "battlesUpdate")]
    BattlesUpdate(Vec<DuelView>),
    #[serde(rename = "battleUpdate")]
    BattleUpdate(DuelView),
    #[serde(rename = "bid_placed")]
    BidPlaced {
        bid: Bid,
        meme: Meme,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "bid_received")]
    BidReceived {
        bid: Bid,
        meme: Meme,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "leaderboard_update")]
    LeaderboardRefresh { timestamp: DateTime<Utc> },
    #[serde(rename = "leaderboard_changed")]
    LeaderboardChanged { timestamp: DateTime<Utc> },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::VoteUpdate { .. } => "voteUpdate",
            ServerEvent::BidUpdate { .. } => "bidUpdate",
            ServerEvent::LeaderboardUpdate(_) => "leaderboardUpdate",
            ServerEvent::BattlesUpdate(_) => "battlesUpdate",
            ServerEvent::BattleUpdate(_) => "battleUpdate",
            ServerEvent::BidPlaced { .. } => "bid_placed",
            ServerEvent::BidReceived { .. } => "bid_received",
            ServerEvent::LeaderboardRefresh { .. } => "leaderboard_update",
            ServerEvent::LeaderboardChanged { .. } => "leaderboard_changed",
            ServerEvent::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawClientMessage {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotePayload {
    pub meme_id: Uuid,
    pub vote_type: VoteType,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidPayload {
    pub meme_id: Uuid,
    pub bid_amount: i64,
    pub user_id: UserId,
}

/// A leaderboard request. Anything other than a positive number for `top`
/// falls back to the default.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardPayload {
    pub top: usize,
}

impl LeaderboardPayload {
    pub const DEFAULT_TOP: usize = 10;

    fn from_value(data: &serde_json::Value) -> Self {
        let top = data
            .get("top")
            .and_then(serde_json::Value::as_u64)
            .filter(|&top| top > 0)
            .map_or(Self::DEFAULT_TOP, |top| usize::try_from(top).unwrap_or(usize::MAX));
        Self { top }
    }
}

impl Default for LeaderboardPayload {
    fn default() -> Self {
        Self { top: Self::DEFAULT_TOP }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndBattlePayload {
    pub battle_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuelVotePayload {
    pub meme_id: Uuid,
    pub battle_id: Uuid,
}

/// A user id sent either as a number or as a numeric string.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserRef {
    Id(UserId),
    Text(String),
}

/// Messages accepted from clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    JoinUserRoom(UserId),
    JoinLeaderboard,
    Vote(VotePayload),
    Bid(BidPayload),
    Leaderboard(LeaderboardPayload),
    GetBattles,
    EndBattle(EndBattlePayload),
    DuelVote(DuelVotePayload),
}

impl ClientEvent {
    pub fn parse(text: &str) -> Result<Self, RealtimeError> {
        let raw: RawClientMessage = serde_json::from_str(text)?;
        let data = raw.data;
        let event = match raw.event.as_str() {
            "join_user_room" => {
                let id = match serde_json::from_value::<UserRef>(data)? {
                    UserRef::Id(id) => id,
                    UserRef::Text(text) => text
                        .trim()
                        .parse()
                        .map_err(|_| RealtimeError::InvalidPayload {
                            event: "join_user_room",
                            reason: format!("{:?} is not a user id", text),
                        })?,
                };
                ClientEvent::JoinUserRoom(id)
            }
            "join_leaderboard" => ClientEvent::JoinLeaderboard,
            "vote" => ClientEvent::Vote(serde_json::from_value(data)?),
            "bid" => ClientEvent::Bid(serde_json::from_value(data)?),
            "leaderboard" => ClientEvent::Leaderboard(LeaderboardPayload::from_value(&data)),
            "getBattles" => ClientEvent::GetBattles,
            "endBattle" => ClientEvent::EndBattle(serde_json::from_value(data)?),
            "memeDuelvote" => ClientEvent::DuelVote(serde_json::from_value(data)?),
            other => return Err(RealtimeError::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }
}

/// Where a broadcast is delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    All,
    Room(String),
}

#[derive(Debug, Clone)]
pub struct Broadcast {
    pub target: Target,
    pub event: ServerEvent,
}

pub mod rooms {
    use crate::models::UserId;

    pub const LEADERBOARD: &str = "leaderboard";

    pub fn user(user_id: UserId) -> String {
        format!("user_{}", user_id)
    }
}

struct Connection {
    rooms: HashSet<String>,
    direct: mpsc::Sender<ServerEvent>,
}

#[derive(Clone)]
pub struct RealtimeHub {
    events: broadcast::Sender<Broadcast>,
    connections: Arc<RwLock<HashMap<Uuid, Connection>>>,
    allowed_events: Arc<HashSet<String>>,
}

impl RealtimeHub {
    pub fn new(allowed_events: Vec<String>) -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            events,
            connections: Arc::new(RwLock::new(HashMap::new())),
            allowed_events: Arc::new(allowed_events.into_iter().collect()),
        }
    }

    /// Adds a connection and returns its id and direct-reply receiver.
    pub async fn register(&self) -> (Uuid, mpsc::Receiver<ServerEvent>) {
        let id = Uuid::new_v4();
        let (direct, rx) = mpsc::channel(DIRECT_CAPACITY);
        self.connections.write().await.insert(
            id,
            Connection {
                rooms: HashSet::new(),
                direct,
            },
        );
        (id, rx)
    }

    pub async fn unregister(&self, id: Uuid) {
        self.connections.write().await.remove(&id);
    }

    pub async fn join(&self, id: Uuid, room: impl Into<String>) {
        let room = room.into();
        if let Some(conn) = self.connections.write().await.get_mut(&id) {
            tracing::debug!(socket_id = %id, %room, "Joined room");
            conn.rooms.insert(room);
        }
    }

    pub async fn is_member(&self, id: Uuid, room: &str) -> bool {
        self.connections
            .read()
            .await
            .get(&id)
            .is_some_and(|conn| conn.rooms.contains(room))
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.events.subscribe()
    }

    /// Sends an event to one socket only.
    pub async fn reply(&self, id: Uuid, event: ServerEvent) {
        let direct = self.connections.read().await.get(&id).map(|c| c.direct.clone());
        match direct {
            Some(direct) => {
                if direct.send(event).await.is_err() {
                    tracing::debug!(socket_id = %id, "Reply dropped, socket is closing");
                }
            }
            None => tracing::debug!(socket_id = %id, "Reply to unknown socket dropped"),
        }
    }

    pub fn emit(&self, event: ServerEvent) {
        self.send(Target::All, event);
    }

    pub fn emit_to_room(&self, room: impl Into<String>, event: ServerEvent) {
        self.send(Target::Room(room.into()), event);
    }

    fn send(&self, target: Target, event: ServerEvent) {
        let name = event.name();
        if self.events.send(Broadcast { target, event }).is_err() {
            tracing::trace!(event = name, "No connected clients");
        }
    }

    fn is_allowed(&self, name: &str) -> bool {
        let allowed = self.allowed_events.contains(name);
        if !allowed {
            tracing::debug!(event = name, "Event not in allowlist, skipping");
        }
        allowed
    }

    /// Notifies everyone of a bid and the meme's owner through their room.
    pub fn emit_bid_placed(&self, bid: &Bid, meme: &Meme) {
        let timestamp = Utc::now();
        if self.is_allowed("bid_placed") {
            self.emit(ServerEvent::BidPlaced {
                bid: bid.clone(),
                meme: meme.clone(),
                timestamp,
            });
        }
        if self.is_allowed("bid_received") {
            self.emit_to_room(
                rooms::user(meme.owner_id),
                ServerEvent::BidReceived {
                    bid: bid.clone(),
                    meme: meme.clone(),
                    timestamp,
                },
            );
        }
    }

    pub fn emit_leaderboard_update(&self) {
        let timestamp = Utc::now();
        if self.is_allowed("leaderboard_update") {
            self.emit(ServerEvent::LeaderboardRefresh { timestamp });
        }
        if self.is_allowed("leaderboard_changed") {
            self.emit(ServerEvent::LeaderboardChanged { timestamp });
        }
    }
}
