//! WebSocket server for live ride updates
//!
//! Clients connect to `/ws?token=<identity token>`. Customers and drivers
//! subscribe to the rides they are party to; drivers can also join the
//! dispatch feed, which announces each bookable ride once as `NewBookable`.
//! Admins receive every event.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use crate::auth::AuthService;
use crate::error::ApiError;
use crate::models::UserRole;
use crate::ride::{Actor, Ride, RideEvent, RideService};

/// Events buffered per receiver before a slow client starts missing them
const EVENT_BUFFER: usize = 256;

/// WebSocket server state
#[derive(Clone)]
pub struct WsState {
    /// Broadcast channel for ride events
    pub tx: broadcast::Sender<RideEvent>,
    /// Connected clients registry
    pub clients: Arc<RwLock<HashMap<String, ClientInfo>>>,
}

/// Client connection information
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub client_id: String,
    pub user_id: Uuid,
    pub role: UserRole,
    pub subscribed_rides: HashSet<Uuid>,
    /// Joined the driver dispatch feed
    pub feed: bool,
    /// Bookable rides this client has already been told about
    pub seen_bookable: HashSet<Uuid>,
}

impl ClientInfo {
    fn new(client_id: String, user_id: Uuid, role: UserRole) -> Self {
        Self {
            client_id,
            user_id,
            role,
            subscribed_rides: HashSet::new(),
            feed: false,
            seen_bookable: HashSet::new(),
        }
    }

    /// Decide what, if anything, this client receives for `event`
    fn route(&mut self, event: &RideEvent) -> Option<ServerMessage> {
        let ride_id = event.ride_id();
        let mut left_feed = false;

        if let RideEvent::StatusChanged {
            customer_id,
            driver_id,
            ..
        } = event
        {
            // A ride taken by someone else stops being visible to this client
            let party = self.user_id == *customer_id || *driver_id == Some(self.user_id);
            if self.role != UserRole::Admin && !party {
                self.subscribed_rides.remove(&ride_id);
            }
            left_feed = self.seen_bookable.remove(&ride_id);
        }
        let subscribed = self.subscribed_rides.contains(&ride_id);

        match event {
            RideEvent::Booked { .. } if self.feed => {
                if self.seen_bookable.insert(ride_id) {
                    Some(ServerMessage::NewBookable {
                        event: event.clone(),
                    })
                } else {
                    Some(ServerMessage::Event {
                        event: event.clone(),
                    })
                }
            }
            // Feed clients learn that a ride left the feed
            RideEvent::StatusChanged { .. } if self.feed && left_feed => {
                Some(ServerMessage::Event {
                    event: event.clone(),
                })
            }
            _ if subscribed || self.role == UserRole::Admin => Some(ServerMessage::Event {
                event: event.clone(),
            }),
            _ => None,
        }
    }
}

/// Client message types
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    Subscribe { ride_ids: Vec<Uuid> },
    Unsubscribe { ride_ids: Vec<Uuid> },
    SubscribeFeed,
    UnsubscribeFeed,
    Ping,
}

/// Server message types
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type")]
enum ServerMessage {
    Event { event: RideEvent },
    /// A bookable ride this client has not seen before
    NewBookable { event: RideEvent },
    Subscribed { ride_ids: Vec<Uuid> },
    Unsubscribed { ride_ids: Vec<Uuid> },
    FeedSnapshot { rides: Vec<Ride> },
    FeedUnsubscribed,
    Pong,
    Error { message: String },
}

impl WsState {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_BUFFER);
        Self {
            tx,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Broadcast a ride event to all connected clients
    pub async fn broadcast_event(&self, event: RideEvent) {
        // No receivers just means nobody is connected
        if self.tx.receiver_count() == 0 {
            return;
        }
        if let Err(e) = self.tx.send(event) {
            tracing::error!("Failed to broadcast event: {}", e);
        }
    }

    pub async fn connected_clients(&self) -> usize {
        self.clients.read().await.len()
    }

    async fn register_client(&self, client_id: String, actor: Actor) {
        let mut clients = self.clients.write().await;
        clients.insert(
            client_id.clone(),
            ClientInfo::new(client_id, actor.user_id, actor.role),
        );
    }

    async fn unregister_client(&self, client_id: &str) {
        let mut clients = self.clients.write().await;
        clients.remove(client_id);
        tracing::info!(client_id, "Client disconnected");
    }

    async fn add_subscriptions(&self, client_id: &str, ride_ids: &[Uuid]) {
        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get_mut(client_id) {
            client.subscribed_rides.extend(ride_ids.iter().copied());
        }
    }

    async fn remove_subscriptions(&self, client_id: &str, ride_ids: &[Uuid]) {
        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get_mut(client_id) {
            for id in ride_ids {
                client.subscribed_rides.remove(id);
            }
        }
    }

    async fn join_feed(&self, client_id: &str, snapshot: &[Ride]) {
        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get_mut(client_id) {
            client.feed = true;
            client.seen_bookable.extend(snapshot.iter().map(|r| r.id));
        }
    }

    async fn leave_feed(&self, client_id: &str) {
        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get_mut(client_id) {
            client.feed = false;
            client.seen_bookable.clear();
        }
    }
}

impl Default for WsState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

/// WebSocket handler - authenticates, then upgrades the connection
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsAuthQuery>,
    State(state): State<WsState>,
    State(auth): State<Arc<AuthService>>,
    State(rides): State<Arc<RideService>>,
) -> Response {
    let identity = match auth.authenticate(&query.token).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!("WebSocket authentication failed: {}", e);
            return ApiError::Unauthorized("Invalid or missing token".to_string()).into_response();
        }
    };

    let actor = Actor::new(identity.user_id, identity.role);
    ws.on_upgrade(move |socket| handle_socket(socket, state, rides, actor))
}

async fn handle_socket(socket: WebSocket, state: WsState, rides: Arc<RideService>, actor: Actor) {
    let client_id = Uuid::new_v4().to_string();
    state.register_client(client_id.clone(), actor).await;
    tracing::info!(client_id = %client_id, user_id = %actor.user_id, role = %actor.role, "Client connected");

    let (mut sender, mut receiver) = socket.split();

    // Internal channel for sending messages from recv_task to sender
    let (internal_tx, mut internal_rx) = mpsc::channel::<ServerMessage>(32);

    let mut rx = state.tx.subscribe();
    let client_id_send = client_id.clone();
    let state_send = state.clone();

    let mut send_task = tokio::spawn(async move {
        loop {
            let outgoing = tokio::select! {
                received = rx.recv() => match received {
                    Ok(event) => {
                        let mut clients = state_send.clients.write().await;
                        match clients.get_mut(&client_id_send) {
                            Some(client) => client.route(&event),
                            None => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(client_id = %client_id_send, skipped, "Client lagging, events dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(msg) = internal_rx.recv() => Some(msg),
                else => break,
            };

            if let Some(msg) = outgoing {
                if let Ok(text) = serde_json::to_string(&msg) {
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let state_recv = state.clone();
    let client_id_recv = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
                Ok(m) => m,
                Err(e) => {
                    let _ = internal_tx
                        .send(ServerMessage::Error {
                            message: format!("Unrecognized message: {}", e),
                        })
                        .await;
                    continue;
                }
            };

            let response = match client_msg {
                ClientMessage::Subscribe { ride_ids } => {
                    let mut allowed = Vec::with_capacity(ride_ids.len());
                    let mut denied = Vec::new();
                    for id in ride_ids {
                        match rides.get_ride(&actor, id).await {
                            Ok(_) => allowed.push(id),
                            Err(_) => denied.push(id),
                        }
                    }
                    state_recv.add_subscriptions(&client_id_recv, &allowed).await;
                    tracing::debug!(client_id = %client_id_recv, count = allowed.len(), "Client subscribed");
                    if !denied.is_empty() {
                        let _ = internal_tx
                            .send(ServerMessage::Error {
                                message: format!("Cannot subscribe to rides {:?}", denied),
                            })
                            .await;
                    }
                    ServerMessage::Subscribed { ride_ids: allowed }
                }
                ClientMessage::Unsubscribe { ride_ids } => {
                    state_recv
                        .remove_subscriptions(&client_id_recv, &ride_ids)
                        .await;
                    ServerMessage::Unsubscribed { ride_ids }
                }
                ClientMessage::SubscribeFeed if actor.role != UserRole::Driver => {
                    ServerMessage::Error {
                        message: "Only drivers can join the dispatch feed".to_string(),
                    }
                }
                ClientMessage::SubscribeFeed => match rides.bookable_rides().await {
                    Ok(snapshot) => {
                        state_recv.join_feed(&client_id_recv, &snapshot).await;
                        tracing::debug!(client_id = %client_id_recv, rides = snapshot.len(), "Client joined dispatch feed");
                        ServerMessage::FeedSnapshot { rides: snapshot }
                    }
                    Err(e) => {
                        tracing::error!(client_id = %client_id_recv, "Failed to load dispatch feed: {}", e);
                        ServerMessage::Error {
                            message: "Dispatch feed unavailable".to_string(),
                        }
                    }
                },
                ClientMessage::UnsubscribeFeed => {
                    state_recv.leave_feed(&client_id_recv).await;
                    ServerMessage::FeedUnsubscribed
                }
                ClientMessage::Ping => ServerMessage::Pong,
            };

            if internal_tx.send(response).await.is_err() {
                break;
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.unregister_client(&client_id).await;
}
