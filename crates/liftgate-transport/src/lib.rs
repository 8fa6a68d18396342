//! # liftgate-transport
//!
//! The single secure session to the central dispatcher: CoAP request/
//! response over DTLS-PSK on UDP.
//!
//! - [`coap`] - confirmable POST construction and inbound PDU
//!   classification.
//! - [`dtls`] - PSK handshake over a connected UDP socket.
//! - [`session`] - session lifecycle (Disconnected / Handshaking / Ready),
//!   reader task, reconnect supervision.
//!
//! The bridge talks to the transport through the [`Uplink`] trait so tests
//! can substitute an in-memory uplink. Replies are delivered asynchronously
//! over an mpsc channel as [`UplinkReply`] values; correlating them back to
//! requests is the bridge's job.

pub mod coap;
pub mod dtls;
pub mod session;

pub use session::{LinkState, Session, SessionConfig};

/// Error types for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The session is not in the Ready state.
    #[error("session unavailable")]
    SessionUnavailable,

    /// DTLS handshake failed.
    #[error("handshake error: {0}")]
    Handshake(String),

    /// Socket-level failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// CoAP PDU encode/decode failure.
    #[error("CoAP error: {0}")]
    Coap(String),
}

/// A reply PDU delivered by the session reader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UplinkReply {
    /// Correlation token echoed by the dispatcher.
    pub token: Vec<u8>,
    /// CoAP code class (2 for success, 4/5 for errors).
    pub code_class: u8,
    /// CoAP code detail (e.g. 1 for 2.01 Created).
    pub code_detail: u8,
    /// Reply body bytes.
    pub payload: Vec<u8>,
}

impl UplinkReply {
    /// Whether the reply is a 2.xx success.
    pub fn is_success(&self) -> bool {
        self.code_class == 2
    }

    /// Render the CoAP code as `c.dd`.
    pub fn code(&self) -> String {
        format!("{}.{:02}", self.code_class, self.code_detail)
    }
}

/// Seam between the bridge and the dispatcher link.
///
/// The production implementation is [`Session`]; integration tests use an
/// in-memory uplink that records requests and feeds replies back through
/// the same channel the session reader would.
#[async_trait::async_trait]
pub trait Uplink: Send + Sync {
    /// Send one request payload under a correlation token to a dispatcher
    /// resource path.
    async fn send(&self, path: &str, token: &[u8], payload: &[u8]) -> Result<(), TransportError>;
}
