//! WebSocket Link
//!
//! Peer link over plain WebSockets. The host binds a TCP port and accepts
//! upgrades only on the path `/{CODE}`; participants dial `{host_url}/{CODE}`.
//! Each connection gets a writer task fed by a bounded queue, so `send` never
//! blocks the session. Dials and upgrade handshakes are bounded by a timeout.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{accept_hdr_async, connect_async, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::core::code::SessionCode;
use crate::core::id::ConnectionId;
use crate::network::link::{
    ConnectionEvent, Dialed, HostEvent, LinkError, Listener, PeerConnection, PeerLink,
    CHANNEL_CAPACITY,
};
use crate::network::protocol::PeerMessage;

/// Default bound on a dial or an inbound upgrade handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket link settings.
#[derive(Debug, Clone)]
pub struct WsLink {
    bind_addr: SocketAddr,
    host_url: String,
    handshake_timeout: Duration,
}

impl WsLink {
    /// Link that listens on `bind_addr` and dials `host_url`.
    pub fn new(bind_addr: SocketAddr, host_url: impl Into<String>) -> Self {
        Self {
            bind_addr,
            host_url: host_url.into(),
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }

    /// Override how long a dial or an inbound handshake may take.
    pub fn with_handshake_timeout(mut self, limit: Duration) -> Self {
        self.handshake_timeout = limit;
        self
    }

    /// URL a participant dials for `code`.
    pub fn session_url(&self, code: &SessionCode) -> String {
        format!("{}/{}", self.host_url.trim_end_matches('/'), code)
    }
}

/// Close request shared by every clone of a connection and its pump.
/// Kept apart from the data queue so a full queue cannot swallow it.
#[derive(Debug, Default)]
struct CloseSignal {
    requested: AtomicBool,
    notify: Notify,
}

impl CloseSignal {
    fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            self.notify.notify_one();
        }
    }

    fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Sending half of a WebSocket connection.
#[derive(Debug, Clone)]
pub struct WsConnection {
    id: ConnectionId,
    outgoing: mpsc::Sender<PeerMessage>,
    close: Arc<CloseSignal>,
}

impl WsConnection {
    fn new(id: ConnectionId, outgoing: mpsc::Sender<PeerMessage>) -> Self {
        Self {
            id,
            outgoing,
            close: Arc::new(CloseSignal::default()),
        }
    }
}

impl PeerConnection for WsConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn send(&self, message: &PeerMessage) -> Result<(), LinkError> {
        if self.close.is_requested() {
            return Err(LinkError::Closed);
        }
        self.outgoing.try_send(message.clone())?;
        Ok(())
    }

    fn close(&self) {
        self.close.request();
    }
}

/// What the pump reports back, before it is wrapped for a side.
enum Inbound {
    Data(PeerMessage),
    Closed,
    Error(LinkError),
}

impl PeerLink for WsLink {
    type Connection = WsConnection;

    fn open(
        &self,
        address: &SessionCode,
    ) -> impl Future<Output = Result<Listener<WsConnection>, LinkError>> + Send {
        let bind_addr = self.bind_addr;
        let handshake_timeout = self.handshake_timeout;
        let address = address.clone();
        async move {
            let listener = TcpListener::bind(bind_addr).await.map_err(|e| match e.kind() {
                io::ErrorKind::AddrInUse => LinkError::AddressTaken(bind_addr.to_string()),
                _ => LinkError::Transport(e.to_string()),
            })?;
            let local_addr = listener
                .local_addr()
                .map_err(|e| LinkError::Transport(e.to_string()))?;
            info!("Hosting session {} on ws://{}/{}", address, local_addr, address);

            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY * 4);
            let task = tokio::spawn(accept_loop(listener, address.clone(), handshake_timeout, tx));
            Ok(Listener::with_task(address, rx, task).bound_to(local_addr))
        }
    }

    fn connect(
        &self,
        address: &SessionCode,
    ) -> impl Future<Output = Result<Dialed<WsConnection>, LinkError>> + Send {
        let url = self.session_url(address);
        let limit = self.handshake_timeout;
        let address = address.clone();
        async move {
            let dialed = timeout(limit, connect_async(url.as_str()))
                .await
                .map_err(|_| LinkError::ConnectFailed(format!("timed out after {:?}", limit)))?;
            let (ws, _) = dialed.map_err(|e| match e {
                tungstenite::Error::Http(ref resp) if resp.status() == StatusCode::NOT_FOUND => {
                    LinkError::HostNotFound(address.to_string())
                }
                tungstenite::Error::Io(ref err) if err.kind() == io::ErrorKind::ConnectionRefused => {
                    LinkError::HostNotFound(address.to_string())
                }
                other => LinkError::ConnectFailed(other.to_string()),
            })?;
            debug!("Connected to {}", url);

            let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
            let connection = WsConnection::new(ConnectionId::random(), out_tx);
            let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
            events_tx
                .send(ConnectionEvent::Open)
                .await
                .map_err(|_| LinkError::Closed)?;

            let close = connection.close.clone();
            tokio::spawn(pump(ws, out_rx, close, events_tx, |inbound| match inbound {
                Inbound::Data(message) => ConnectionEvent::Data(message),
                Inbound::Closed => ConnectionEvent::Closed,
                Inbound::Error(error) => ConnectionEvent::Error(error),
            }));

            Ok(Dialed {
                connection,
                events: events_rx,
            })
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    code: SessionCode,
    handshake_timeout: Duration,
    events: mpsc::Sender<HostEvent<WsConnection>>,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Accept error: {}", e);
                continue;
            }
        };
        if events.is_closed() {
            break;
        }
        tokio::spawn(handle_connection(
            stream,
            addr,
            code.clone(),
            handshake_timeout,
            events.clone(),
        ));
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    code: SessionCode,
    handshake_timeout: Duration,
    events: mpsc::Sender<HostEvent<WsConnection>>,
) {
    let expected = format!("/{}", code);
    let check_path = move |request: &Request, response: Response| {
        if request.uri().path() == expected {
            Ok(response)
        } else {
            Err(not_found())
        }
    };

    let ws = match timeout(handshake_timeout, accept_hdr_async(stream, check_path)).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            debug!("Rejected handshake from {}: {}", addr, e);
            return;
        }
        Err(_) => {
            debug!("Handshake from {} timed out", addr);
            return;
        }
    };

    let id = ConnectionId::random();
    debug!("Peer {} connected from {}", id.short(), addr);
    let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let connection = WsConnection::new(id.clone(), out_tx);
    let close = connection.close.clone();
    if events
        .send(HostEvent::Connected { id: id.clone(), connection })
        .await
        .is_err()
    {
        return;
    }

    pump(ws, out_rx, close, events, move |inbound| match inbound {
        Inbound::Data(message) => HostEvent::Data { id: id.clone(), message },
        Inbound::Closed => HostEvent::Closed { id: id.clone() },
        Inbound::Error(error) => HostEvent::Error { id: id.clone(), error },
    })
    .await;
}

fn not_found() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("unknown session".to_string()));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

/// Move frames both ways until either end goes away.
///
/// A local close (or every handle dropped) ends the pump without an event;
/// remote closes and failures are reported exactly once. A close request
/// wins over queued messages.
async fn pump<S, E, F>(
    ws: WebSocketStream<S>,
    mut outgoing: mpsc::Receiver<PeerMessage>,
    close: Arc<CloseSignal>,
    events: mpsc::Sender<E>,
    wrap: F,
) where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Fn(Inbound) -> E,
{
    let (mut ws_sender, mut ws_receiver) = ws.split();

    loop {
        tokio::select! {
            biased;

            _ = close.notify.notified() => {
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
            out = outgoing.recv() => match out {
                Some(message) => {
                    let text = match message.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize {}: {}", message.kind(), e);
                            continue;
                        }
                    };
                    if let Err(e) = ws_sender.send(Message::Text(text)).await {
                        let _ = events
                            .send(wrap(Inbound::Error(LinkError::Transport(e.to_string()))))
                            .await;
                        break;
                    }
                }
                None => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let Some(message) = PeerMessage::decode(&text) else {
                        continue;
                    };
                    if events.send(wrap(Inbound::Data(message))).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    let _ = events.send(wrap(Inbound::Closed)).await;
                    break;
                }
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    let _ = events
                        .send(wrap(Inbound::Error(LinkError::Transport(e.to_string()))))
                        .await;
                    break;
                }
                // Ping, pong and binary frames carry nothing for us.
                Some(Ok(_)) => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> WsLink {
        WsLink::new("127.0.0.1:0".parse().unwrap(), "ws://127.0.0.1:0")
    }

    #[test]
    fn test_session_url() {
        let link = WsLink::new("0.0.0.0:9000".parse().unwrap(), "ws://quiz.local:9000/");
        let code = SessionCode::parse("x9k2").unwrap();
        assert_eq!(link.session_url(&code), "ws://quiz.local:9000/X9K2");
    }

    #[tokio::test]
    async fn test_exchange_over_loopback() {
        let code = SessionCode::parse("X9K2").unwrap();
        let mut listener = loopback().open(&code).await.unwrap();
        let addr = listener.local_addr.unwrap();
        let client = WsLink::new("127.0.0.1:0".parse().unwrap(), format!("ws://{}", addr));

        let mut dialed = client.connect(&code).await.unwrap();
        assert_eq!(dialed.events.recv().await, Some(ConnectionEvent::Open));

        let host_end = match listener.events.recv().await {
            Some(HostEvent::Connected { connection, .. }) => connection,
            other => panic!("expected connection, got {:?}", other),
        };

        dialed.connection.send(&PeerMessage::Join { name: "Ann".into() }).unwrap();
        match listener.events.recv().await {
            Some(HostEvent::Data { id, message }) => {
                assert_eq!(&id, host_end.id());
                assert_eq!(message, PeerMessage::Join { name: "Ann".into() });
            }
            other => panic!("expected data, got {:?}", other),
        }

        host_end.send(&PeerMessage::Welcome { game_id: "X9K2".into() }).unwrap();
        assert_eq!(
            dialed.events.recv().await,
            Some(ConnectionEvent::Data(PeerMessage::Welcome { game_id: "X9K2".into() }))
        );

        dialed.connection.close();
        match listener.events.recv().await {
            Some(HostEvent::Closed { id }) => assert_eq!(&id, host_end.id()),
            other => panic!("expected close, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_gets_through_a_full_queue() {
        let code = SessionCode::parse("X9K2").unwrap();
        let mut listener = loopback().open(&code).await.unwrap();
        let addr = listener.local_addr.unwrap();
        let client = WsLink::new("127.0.0.1:0".parse().unwrap(), format!("ws://{}", addr));
        let dialed = client.connect(&code).await.unwrap();
        let host_id = match listener.events.recv().await {
            Some(HostEvent::Connected { id, .. }) => id,
            other => panic!("expected connection, got {:?}", other),
        };

        // Nothing yields here, so the writer cannot drain the queue.
        let join = PeerMessage::Join { name: "Ann".into() };
        let mut queued = 0;
        while dialed.connection.send(&join).is_ok() {
            queued += 1;
        }
        assert_eq!(queued, CHANNEL_CAPACITY);

        dialed.connection.close();
        assert_eq!(dialed.connection.send(&join), Err(LinkError::Closed));

        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match listener.events.recv().await {
                    Some(HostEvent::Closed { id }) => return id,
                    Some(HostEvent::Data { .. }) => continue,
                    other => panic!("expected close, got {:?}", other),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(closed, host_id);
    }

    #[tokio::test]
    async fn test_dial_times_out_on_silent_server() {
        // Accepts TCP but never answers the upgrade.
        let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();
        let client = WsLink::new("127.0.0.1:0".parse().unwrap(), format!("ws://{}", addr))
            .with_handshake_timeout(Duration::from_millis(100));

        let code = SessionCode::parse("X9K2").unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), client.connect(&code))
            .await
            .unwrap();
        assert!(matches!(result, Err(LinkError::ConnectFailed(_))));
    }

    #[tokio::test]
    async fn test_silent_client_is_dropped_and_others_still_join() {
        use tokio::io::AsyncReadExt;

        let code = SessionCode::parse("X9K2").unwrap();
        let mut listener = loopback()
            .with_handshake_timeout(Duration::from_millis(100))
            .open(&code)
            .await
            .unwrap();
        let addr = listener.local_addr.unwrap();

        let mut silent = TcpStream::connect(addr).await.unwrap();

        let client = WsLink::new("127.0.0.1:0".parse().unwrap(), format!("ws://{}", addr));
        let mut dialed = client.connect(&code).await.unwrap();
        assert_eq!(dialed.events.recv().await, Some(ConnectionEvent::Open));
        assert!(matches!(
            listener.events.recv().await,
            Some(HostEvent::Connected { .. })
        ));

        // The host gives up on the silent socket and hangs up.
        let mut buf = [0u8; 16];
        let read = tokio::time::timeout(Duration::from_secs(2), silent.read(&mut buf))
            .await
            .unwrap();
        assert!(matches!(read, Ok(0) | Err(_)));
    }

    #[tokio::test]
    async fn test_wrong_code_is_not_found() {
        let code = SessionCode::parse("X9K2").unwrap();
        let listener = loopback().open(&code).await.unwrap();
        let addr = listener.local_addr.unwrap();
        let client = WsLink::new("127.0.0.1:0".parse().unwrap(), format!("ws://{}", addr));

        let other = SessionCode::parse("ABCD").unwrap();
        assert_eq!(
            client.connect(&other).await.err(),
            Some(LinkError::HostNotFound("ABCD".into()))
        );
    }
}
