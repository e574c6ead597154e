//! WebSocket chat endpoint

pub mod hub;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::{authenticate, CurrentUser};
use crate::service::chat::{ChatMessage, Delivery};
use crate::state::AppState;

pub use hub::{ConnError, Connection, ConnectionRegistry, HubError};

const PROTOCOL_HEADER: &str = "sec-websocket-protocol";

enum Outbound {
    Text(String),
    Close,
}

/// Write half of a socket, fed through a channel drained by a writer task
struct WsConnection {
    id: Uuid,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Connection for WsConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn send_text(&self, text: &str) -> Result<(), ConnError> {
        self.tx
            .send(Outbound::Text(text.to_string()))
            .map_err(|_| ConnError::Closed)
    }

    fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

/// First protocol offered by the client, which carries the bearer token
fn protocol_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(PROTOCOL_HEADER)?
        .to_str()
        .ok()?
        .split(',')
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

/// WebSocket upgrade handler
pub async fn serve_ws(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = protocol_token(&headers) else {
        return AppError::Unauthorized.into_response();
    };

    let user = match authenticate(&state.jwt, state.stores.users.as_ref(), &token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("WebSocket authentication failed: {}", e);
            return e.into_response();
        }
    };

    ws.protocols([token])
        .on_upgrade(move |socket| handle_socket(socket, state, user))
}

/// Drive one connection until the client leaves, an error occurs or it
/// is replaced by a newer connection of the same user
async fn handle_socket(socket: WebSocket, state: AppState, user: CurrentUser) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let conn = Arc::new(WsConnection {
        id: Uuid::new_v4(),
        tx,
    });
    state.hub.bind(&user.id, conn.clone()).await;
    tracing::info!("WebSocket connected: user {} conn {}", user.id, conn.id);

    let mut writer = tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            match out {
                Outbound::Text(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let idle = match state.config.ws.idle_timeout {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    loop {
        let next = async {
            match idle {
                Some(limit) => tokio::time::timeout(limit, stream.next()).await.ok(),
                None => Some(stream.next().await),
            }
        };

        let frame = tokio::select! {
            frame = next => frame,
            _ = &mut writer => {
                tracing::debug!("Writer for conn {} finished", conn.id);
                break;
            }
        };

        let text = match frame {
            None => {
                tracing::info!("WebSocket idle timeout: user {}", user.id);
                break;
            }
            Some(None) | Some(Some(Ok(Message::Close(_)))) => break,
            Some(Some(Err(e))) => {
                tracing::warn!("WebSocket read failed for user {}: {}", user.id, e);
                break;
            }
            Some(Some(Ok(Message::Text(text)))) => text,
            Some(Some(Ok(_))) => continue,
        };

        if let Err(e) = dispatch(&state, &user, &text).await {
            tracing::error!("Dropping connection of user {}: {}", user.id, e);
            break;
        }
    }

    state.hub.unbind(conn.as_ref()).await;
    tracing::info!("WebSocket disconnected: user {} conn {}", user.id, conn.id);
}

/// Persist one inbound frame and deliver it
async fn dispatch(state: &AppState, user: &CurrentUser, text: &str) -> anyhow::Result<()> {
    let mut msg: ChatMessage = serde_json::from_str(text)?;
    let delivery = state.services.chat.record(&user.id, &mut msg).await?;
    let payload = serde_json::to_string(&msg)?;

    let targets = match delivery {
        Delivery::Broadcast => Vec::new(),
        Delivery::To(users) => users,
    };
    state.hub.send_to(&payload, &targets).await?;
    Ok(())
}
