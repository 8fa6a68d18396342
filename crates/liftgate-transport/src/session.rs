//! Dispatcher session lifecycle.
//!
//! Exactly one DTLS session exists at a time. Lifecycle:
//!
//! ```text
//!   Disconnected --connect--> Handshaking --ok--> Ready
//!      ^                                            |
//!      |                                            | send / read loop
//!      +------- peer closed / fatal I/O error ------+
//! ```
//!
//! The reader task classifies inbound PDUs and forwards replies to the
//! bridge channel; it never retries sends (the correlation engine owns
//! retries). A supervisor task re-runs the handshake with backoff whenever
//! the link drops.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex, Notify};
use webrtc_dtls::conn::DTLSConn;
use webrtc_util::conn::Conn;

use crate::coap::{self, Inbound};
use crate::{TransportError, Uplink, UplinkReply};

/// Receive buffer size; bounds the largest reply PDU.
const RECV_BUF_SIZE: usize = 8192;

/// Session configuration.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Local UDP bind address.
    pub gateway_listen: SocketAddr,
    /// Dispatcher UDP endpoint.
    pub dispatcher_endpoint: SocketAddr,
    /// Handshake attempts before giving up a connect call.
    pub handshake_retries: u32,
    /// Base backoff between handshake attempts; grows linearly.
    pub backoff: Duration,
}

/// Connection state of the dispatcher link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Handshaking,
    Ready,
}

struct SessionInner {
    state: LinkState,
    conn: Option<Arc<DTLSConn>>,
}

/// The single long-lived dispatcher session.
pub struct Session {
    config: SessionConfig,
    psk: Vec<u8>,
    psk_identity: Vec<u8>,
    inner: Mutex<SessionInner>,
    message_id: AtomicU16,
    reply_tx: mpsc::Sender<UplinkReply>,
    link_down: Notify,
}

impl Session {
    /// Create a session in the Disconnected state.
    ///
    /// `psk` is the credential selected from the pool for this session;
    /// `reply_tx` is the bridge's reply channel.
    pub fn new(
        config: SessionConfig,
        psk: Vec<u8>,
        psk_identity: Vec<u8>,
        reply_tx: mpsc::Sender<UplinkReply>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            psk,
            psk_identity,
            inner: Mutex::new(SessionInner {
                state: LinkState::Disconnected,
                conn: None,
            }),
            message_id: AtomicU16::new(1),
            reply_tx,
            link_down: Notify::new(),
        })
    }

    /// Current link state.
    pub async fn state(&self) -> LinkState {
        self.inner.lock().await.state
    }

    /// Run the handshake, retrying with linear backoff.
    ///
    /// On success the link is Ready and a reader task is running. On
    /// failure the link stays Disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SessionUnavailable`] after all attempts
    /// fail.
    pub async fn connect(self: Arc<Self>) -> Result<(), TransportError> {
        {
            let mut inner = self.inner.lock().await;
            if inner.state == LinkState::Ready {
                return Ok(());
            }
            inner.state = LinkState::Handshaking;
        }

        for attempt in 1..=self.config.handshake_retries.max(1) {
            match crate::dtls::connect(
                self.config.gateway_listen,
                self.config.dispatcher_endpoint,
                self.psk.clone(),
                self.psk_identity.clone(),
            )
            .await
            {
                Ok(conn) => {
                    let conn = Arc::new(conn);
                    {
                        let mut inner = self.inner.lock().await;
                        inner.conn = Some(conn.clone());
                        inner.state = LinkState::Ready;
                    }
                    tokio::spawn(self.clone().read_loop(conn));
                    tracing::info!(
                        dispatcher = %self.config.dispatcher_endpoint,
                        attempt,
                        "dispatcher session ready"
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "DTLS handshake failed");
                    tokio::time::sleep(self.config.backoff * attempt).await;
                }
            }
        }

        self.inner.lock().await.state = LinkState::Disconnected;
        Err(TransportError::SessionUnavailable)
    }

    /// Spawn the reconnect supervisor.
    ///
    /// Whenever the reader reports the link down, the supervisor re-runs
    /// [`Session::connect`] until it succeeds or shutdown is signalled.
    pub fn spawn_supervisor(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = self.link_down.notified() => {}
                    _ = shutdown.recv() => break,
                }
                loop {
                    match self.clone().connect().await {
                        Ok(()) => break,
                        Err(e) => {
                            tracing::warn!(error = %e, "reconnect failed, backing off");
                            tokio::time::sleep(self.config.backoff * 4).await;
                        }
                    }
                }
            }
        });
    }

    /// Close the session and release the DTLS connection.
    ///
    /// Taking the connection out of the slot guarantees it is closed at
    /// most once even if the reader observes the teardown concurrently.
    pub async fn close(&self) {
        let conn = {
            let mut inner = self.inner.lock().await;
            inner.state = LinkState::Disconnected;
            inner.conn.take()
        };
        if let Some(conn) = conn {
            if let Err(e) = conn.close().await {
                tracing::debug!(error = %e, "DTLS close reported an error");
            }
        }
    }

    async fn mark_disconnected(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = LinkState::Disconnected;
        inner.conn = None;
    }

    async fn read_loop(self: Arc<Self>, conn: Arc<DTLSConn>) {
        let mut buf = vec![0u8; RECV_BUF_SIZE];
        loop {
            let n = match conn.recv(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "dispatcher link read failed");
                    self.mark_disconnected().await;
                    self.link_down.notify_one();
                    return;
                }
            };

            match coap::classify(&buf[..n]) {
                Ok(Inbound::Reply { reply, needs_ack }) => {
                    if let Some(message_id) = needs_ack {
                        match coap::build_empty_ack(message_id) {
                            Ok(ack) => {
                                if let Err(e) = conn.send(&ack).await {
                                    tracing::warn!(error = %e, "empty ACK send failed");
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "empty ACK encode failed"),
                        }
                    }
                    tracing::debug!(
                        token = %hex::encode(&reply.token),
                        code = %reply.code(),
                        "dispatcher reply received"
                    );
                    if self.reply_tx.send(reply).await.is_err() {
                        // Bridge is gone; stop reading.
                        return;
                    }
                }
                Ok(Inbound::EmptyAck { message_id }) => {
                    tracing::trace!(message_id, "empty ACK, separate response pending");
                }
                Ok(Inbound::Reset { message_id }) => {
                    tracing::warn!(message_id, "peer reset our message");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "undecodable dispatcher PDU dropped");
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Uplink for Session {
    async fn send(&self, path: &str, token: &[u8], payload: &[u8]) -> Result<(), TransportError> {
        let conn = {
            let inner = self.inner.lock().await;
            match (&inner.state, &inner.conn) {
                (LinkState::Ready, Some(conn)) => conn.clone(),
                _ => return Err(TransportError::SessionUnavailable),
            }
        };

        let message_id = self.message_id.fetch_add(1, Ordering::Relaxed);
        let datagram = coap::build_request(path, token, payload, message_id)?;
        if let Err(e) = conn.send(&datagram).await {
            // The link is gone; flip to Disconnected and let the sweep
            // logic drive any retries.
            self.mark_disconnected().await;
            self.link_down.notify_one();
            return Err(TransportError::Io(e.to_string()));
        }
        tracing::debug!(path, token = %hex::encode(token), message_id, "dispatcher request sent");
        Ok(())
    }
}
