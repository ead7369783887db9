//! HTTP and WebSocket front end.

use crate::config::ServerConfig;
use crate::protocol::RoomSummary;
use crate::registry::RoomRegistry;
use crate::session::PlayerSession;
use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::Request;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use tower::ServiceBuilder;
use tracing::{debug, info, instrument, warn};

/// Builds the application router over `registry`.
pub fn router(registry: RoomRegistry) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/rooms", get(list_rooms))
        .route("/health", get(health))
        .layer(ServiceBuilder::new().map_request(|req: Request<Body>| {
            info!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
            req
        }))
        .with_state(registry)
}

/// Binds the configured address and serves until the process exits.
#[instrument(skip(config), fields(host = %config.host(), port = config.port()))]
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((config.host().as_str(), *config.port())).await?;
    let addr = listener.local_addr()?;
    let app = router(RoomRegistry::new(config));

    info!(%addr, "Server ready");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn list_rooms(State(registry): State<RoomRegistry>) -> Json<Vec<RoomSummary>> {
    Json(registry.room_list())
}

async fn ws_handler(ws: WebSocketUpgrade, State(registry): State<RoomRegistry>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

/// Pumps one WebSocket: inbound text frames go to the session, the
/// session's outbox is written back as JSON text frames.
async fn handle_socket(socket: WebSocket, registry: RoomRegistry) {
    let (mut sink, mut stream) = socket.split();
    let (mut session, mut outbox) = PlayerSession::open(registry);
    let conn = session.id();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!(%conn, error = %e, "Failed to encode message");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                debug!(%conn, "Socket closed while writing");
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => session.handle_text(text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(%conn, error = %e, "Socket error");
                break;
            }
        }
    }

    session.close();
    writer.abort();
}
