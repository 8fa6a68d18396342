//! # liftgate-codec
//!
//! The two wire vocabularies of the gateway:
//!
//! - [`frames`] - CAN-style local-bus frames (11-bit identifier, 0-8 data
//!   bytes) and their mapping to semantic request/response records.
//! - [`dispatch`] - the dispatcher's JSON contract: the three request
//!   payload shapes and the assignment/error reply parser.
//!
//! The codec is pure: it owns no sockets and no state. The bridge feeds it
//! frames and reply bytes; the transport carries whatever it produces.

pub mod dispatch;
pub mod frames;

pub use dispatch::{Assignment, DispatcherError, DispatcherReply, DispatchRequest, RequestClass};
pub use frames::{BusFrame, BusRequest, ErrorFrameCode};

/// Error types for codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame identifier is not in the recognized table.
    #[error("unknown frame id {id:#05x}")]
    UnknownFrameId {
        /// The offending identifier.
        id: u16,
    },

    /// Frame shape violates the bus contract (identifier range, payload
    /// length, field encoding).
    #[error("malformed bus frame: {0}")]
    MalformedBusFrame(String),

    /// A dispatcher verdict is missing a required field.
    #[error("malformed assignment: missing {missing}")]
    MalformedAssignment {
        /// Name of the absent or mistyped field.
        missing: &'static str,
    },

    /// Reply bytes are not a recognizable dispatcher message.
    #[error("malformed reply: {0}")]
    MalformedReply(String),

    /// JSON serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}
