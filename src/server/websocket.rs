use crate::config::welcome::mood_message;
use crate::conversation::{ ConversationController, ConversationEvent };
use crate::models::chat::MessageId;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::render::{ render_message, SectionColorPolicy };

use super::api::AppState;
use super::api_key_matches;

use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;
use tokio::sync::{ broadcast, mpsc };

use tokio_tungstenite::{ accept_hdr_async, WebSocketStream };
use tokio_tungstenite::tungstenite::handshake::server::{ Request, Response, ErrorResponse };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;

use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };

use log::{ debug, info, warn, error };
use futures::{ SinkExt, StreamExt };

const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;
const CONNECTIONS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => NonZeroU32::MIN,
};

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(CONNECTIONS_PER_SECOND));
}

pub async fn start_ws_server(addr: &str, state: AppState) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!("WS server listening on: {}", addr);

    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = process_connection(peer, stream, state).await {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    state: AppState
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let required_api_key = state.api_key.clone();
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let header = req
            .headers()
            .get("x-api-key")
            .and_then(|v| v.to_str().ok());
        if api_key_matches(required_api_key.as_deref(), header, req.uri().query()) {
            return Ok(response);
        }
        warn!("Rejected WebSocket handshake from {}: missing or invalid API key", peer);
        let mut res = ErrorResponse::new(Some("invalid api key".into()));
        *res.status_mut() = StatusCode::UNAUTHORIZED;
        Err(res)
    };

    let ws = accept_hdr_async(stream, auth_callback).await.map_err(|e| {
        error!("Handshake failed for {}: {}", peer, e);
        e
    })?;

    let controller = Arc::new(state.store.detached());
    handle_connection(peer, ws, controller, state.policy.clone()).await;
    Ok(())
}

/// Drives one conversation over an accepted socket until the peer goes away.
///
/// Chat input is queued to a single worker so turns run in arrival order while
/// copy requests are answered immediately.
pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    controller: Arc<ConversationController>,
    policy: Arc<SectionColorPolicy>
)
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    info!("New WebSocket connection: {} (Conv ID: {})", peer, controller.id());

    let (mut sink, mut rx) = websocket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            if let Err(e) = sink.send(message).await {
                error!("Failed to send to {}: {}", peer, e);
                break;
            }
        }
    });

    let forwarder = {
        let mut events = controller.subscribe();
        let out_tx = out_tx.clone();
        let policy = policy.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let reply = server_message_for(event, &policy);
                        if !send_json(&out_tx, &reply) {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Dropped {} conversation events for {}", skipped, peer);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    };

    let (chat_tx, mut chat_rx) = mpsc::unbounded_channel::<String>();
    let worker = {
        let controller = controller.clone();
        tokio::spawn(async move {
            while let Some(text) = chat_rx.recv().await {
                controller.send_user_message(&text).await;
            }
        })
    };

    while let Some(msg) = rx.next().await {
        match msg {
            Ok(message) => {
                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    send_json(&out_tx, &(ServerMessage::Error {
                        message: "Message too large".to_string(),
                    }));
                    break;
                }

                match message {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Chat { content }) => {
                                if content.trim().is_empty() {
                                    debug!("Ignoring blank chat message from {}", peer);
                                    continue;
                                }
                                if chat_tx.send(content).is_err() {
                                    break;
                                }
                            }
                            Ok(ClientMessage::Mood { mood }) => {
                                if chat_tx.send(mood_message(&mood)).is_err() {
                                    break;
                                }
                            }
                            Ok(ClientMessage::Copy { message_id }) => {
                                let reply = match controller.copy_assistant_message(MessageId(message_id)) {
                                    Ok(text) => ServerMessage::Copied { message_id, text },
                                    Err(e) => ServerMessage::Error { message: e.to_string() },
                                };
                                send_json(&out_tx, &reply);
                            }
                            Err(e) => {
                                warn!("Invalid message format from {}: {}", peer, e);
                                send_json(&out_tx, &(ServerMessage::Error {
                                    message: format!("Invalid message format: {}", e),
                                }));
                            }
                        }
                    }
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        break;
                    }
                    Message::Ping(ping_data) => {
                        if out_tx.send(Message::Pong(ping_data)).is_err() {
                            error!("Failed to send pong to {}", peer);
                            break;
                        }
                    }
                    Message::Pong(_) => {}
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                    }
                    Message::Frame(_) => {}
                }
            }
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        }
    }

    worker.abort();
    forwarder.abort();
    // Let queued frames (e.g. a size-limit error) flush before the socket drops.
    drop(out_tx);
    let _ = writer.await;
    info!("WebSocket connection closed for {} (Conv ID: {})", peer, controller.id());
}

pub fn server_message_for(event: ConversationEvent, policy: &SectionColorPolicy) -> ServerMessage {
    match event {
        ConversationEvent::MessageAppended(message) =>
            ServerMessage::Message {
                message: render_message(&message, policy),
            },
        ConversationEvent::TypingStarted => ServerMessage::Processing,
        ConversationEvent::TypingStopped => ServerMessage::Idle,
        ConversationEvent::Notification(message) => ServerMessage::Notification { message },
    }
}

/// Queues `message` for the writer. Returns false once the writer is gone.
fn send_json(out: &mpsc::UnboundedSender<Message>, message: &ServerMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => out.send(Message::Text(json)).is_ok(),
        Err(e) => {
            error!("Failed to encode server message: {}", e);
            true
        }
    }
}
