// WebSocket server: live draft feed for observers, command channel for the
// operator.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::app::CommandEnvelope;
use crate::broadcast::{Publisher, Subscription, DRAFT_TOPIC};
use crate::protocol::{OperatorCommand, OperatorReply};
use crate::settings::Settings;

pub const OBSERVER_PATH: &str = "/ws/draft/";
pub const OPERATOR_PATH: &str = "/ws/operator/";

// ---------------------------------------------------------------------------
// Listener seam
// ---------------------------------------------------------------------------

/// Source of incoming connections. Implemented over TCP for production and
/// over in-memory streams in tests.
#[async_trait]
pub trait Listener: Send {
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Wait for the next connection and return it with a peer label.
    async fn accept(&mut self) -> std::io::Result<(Self::Io, String)>;
}

pub struct TungsteniteListener {
    inner: TcpListener,
}

impl TungsteniteListener {
    pub async fn bind(host: &str, port: u16) -> std::io::Result<Self> {
        let inner = TcpListener::bind((host, port)).await?;
        Ok(TungsteniteListener { inner })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.inner.local_addr()
    }
}

#[async_trait]
impl Listener for TungsteniteListener {
    type Io = TcpStream;

    async fn accept(&mut self) -> std::io::Result<(TcpStream, String)> {
        let (stream, addr) = self.inner.accept().await?;
        Ok((stream, addr.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Shared state every connection handler needs.
#[derive(Clone)]
pub struct ServerContext {
    pub publisher: Arc<dyn Publisher>,
    pub commands: mpsc::Sender<CommandEnvelope>,
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Observer,
    Operator { password: Option<String> },
    NotFound,
}

/// Classify a handshake request by path. The trailing slash is optional.
///
/// The operator password is read from the percent-encoded query string.
pub fn route_for(path: &str, query: Option<&str>) -> Route {
    let matches = |endpoint: &str| path == endpoint || path == endpoint.trim_end_matches('/');

    if matches(OBSERVER_PATH) {
        Route::Observer
    } else if matches(OPERATOR_PATH) {
        let password = query.and_then(|q| {
            form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "password")
                .map(|(_, value)| value.into_owned())
        });
        Route::Operator { password }
    } else {
        Route::NotFound
    }
}

enum Session {
    Observer(Subscription),
    Operator,
}

fn reject(status: StatusCode, message: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(message.to_string()));
    *response.status_mut() = status;
    response
}

// ---------------------------------------------------------------------------
// Server loop
// ---------------------------------------------------------------------------

/// Accept connections forever, serving each on its own task.
///
/// Returns only when the listener fails.
pub async fn run<L: Listener>(mut listener: L, ctx: ServerContext) -> anyhow::Result<()> {
    loop {
        let (io, addr) = listener.accept().await?;
        debug!("Accepted connection from {addr}");
        let ctx = ctx.clone();
        tokio::spawn(async move {
            handle_connection(io, addr, ctx).await;
        });
    }
}

async fn handle_connection<S>(io: S, addr: String, ctx: ServerContext)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session: Option<Session> = None;

    // The observer subscribes before the handshake response goes out, so
    // nothing published after the client sees the upgrade is missed.
    let handshake = tokio_tungstenite::accept_hdr_async(
        io,
        |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
            match route_for(req.uri().path(), req.uri().query()) {
                Route::Observer => {
                    session = Some(Session::Observer(ctx.publisher.subscribe(DRAFT_TOPIC)));
                    Ok(response)
                }
                Route::Operator { password } => match ctx.settings.master_password() {
                    Ok(Some(expected)) if password.as_deref() != Some(expected.as_str()) => {
                        Err(reject(StatusCode::UNAUTHORIZED, "invalid password"))
                    }
                    Ok(_) => {
                        session = Some(Session::Operator);
                        Ok(response)
                    }
                    Err(e) => {
                        error!("Could not read master password: {e:#}");
                        Err(reject(StatusCode::INTERNAL_SERVER_ERROR, "settings unavailable"))
                    }
                },
                Route::NotFound => Err(reject(StatusCode::NOT_FOUND, "no such endpoint")),
            }
        },
    )
    .await;

    let ws_stream = match handshake {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {addr}: {e}");
            return;
        }
    };

    match session {
        Some(Session::Observer(subscription)) => {
            info!("Observer connected from {addr}");
            serve_observer(ws_stream, subscription, &addr).await;
            info!("Observer {addr} disconnected");
        }
        Some(Session::Operator) => {
            info!("Operator connected from {addr}");
            let (mut write, read) = ws_stream.split();
            process_operator_stream(read, &mut write, &ctx.commands, &addr).await;
            info!("Operator {addr} disconnected");
        }
        None => {}
    }
}

/// Forward every draft event to the observer as a JSON text frame until
/// either side goes away. Frames from the observer are ignored.
async fn serve_observer<S>(ws_stream: WebSocketStream<S>, mut subscription: Subscription, addr: &str)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to serialize draft event: {e}");
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json.into())).await {
                    debug!("Send to observer {addr} failed: {e}");
                    break;
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!("WebSocket error from observer {addr}: {e}");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

/// Answer each operator text frame with one reply frame, in order.
///
/// Generic over the stream and sink so the per-frame logic does not depend
/// on a particular transport.
pub async fn process_operator_stream<St, Si>(
    mut stream: St,
    sink: &mut Si,
    commands: &mpsc::Sender<CommandEnvelope>,
    addr: &str,
) where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
    Si: Sink<Message> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let reply = dispatch(text.as_str(), commands).await;
                let json = match serde_json::to_string(&reply) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to serialize operator reply: {e}");
                        continue;
                    }
                };
                if sink.send(Message::Text(json.into())).await.is_err() {
                    debug!("Send to operator {addr} failed");
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("Operator {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from operator {addr}: {e}");
                break;
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
}

/// Parse one operator frame and run it through the command loop.
pub async fn dispatch(text: &str, commands: &mpsc::Sender<CommandEnvelope>) -> OperatorReply {
    let command: OperatorCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => return OperatorReply::bad_request(format!("invalid command: {e}")),
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    let envelope = CommandEnvelope {
        command,
        reply: reply_tx,
    };
    if commands.send(envelope).await.is_err() {
        return OperatorReply::error("unavailable", "draft room is shutting down");
    }
    reply_rx
        .await
        .unwrap_or_else(|_| OperatorReply::error("unavailable", "draft room dropped the command"))
}
