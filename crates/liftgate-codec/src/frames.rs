//! Local-bus frame codec.
//!
//! Frames are CAN-style: an 11-bit identifier plus 0-8 data bytes. Floor
//! numbers travel as two's-complement single bytes (basements are
//! negative). Task ids are truncated to 7 bytes on the wire; the cabin
//! resolves them locally by prefix.
//!
//! Recognized identifiers:
//!
//! | id       | direction | meaning                         |
//! |----------|-----------|---------------------------------|
//! | `0x100`  | inbound   | floor call                      |
//! | `0x101`  | outbound  | floor-call reply                |
//! | `0x200`  | inbound   | cabin request                   |
//! | `0x201`  | outbound  | cabin reply                     |
//! | `0x3xx`  | inbound   | emergency                       |
//! | `0x0FE`  | outbound  | gateway-originated error        |

use liftgate_types::{CallDirection, EmergencyKind, TASK_ID_WIRE_LEN};

use crate::CodecError;

/// Inbound floor-call frame identifier.
pub const FRAME_FLOOR_CALL: u16 = 0x100;
/// Outbound floor-call reply identifier.
pub const FRAME_FLOOR_CALL_REPLY: u16 = 0x101;
/// Inbound cabin-request frame identifier.
pub const FRAME_CABIN_REQUEST: u16 = 0x200;
/// Outbound cabin reply identifier.
pub const FRAME_CABIN_REPLY: u16 = 0x201;
/// First identifier of the inbound emergency block (`0x300..=0x3FF`).
pub const FRAME_EMERGENCY_BASE: u16 = 0x300;
/// Outbound gateway-error identifier.
pub const FRAME_GATEWAY_ERROR: u16 = 0x0FE;

/// Largest legal 11-bit identifier.
pub const FRAME_ID_MAX: u16 = 0x7FF;
/// Maximum data bytes per frame.
pub const FRAME_DATA_MAX: usize = 8;

/// A raw local-bus frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusFrame {
    /// 11-bit frame identifier.
    pub id: u16,
    /// 0-8 data bytes.
    pub data: Vec<u8>,
}

impl BusFrame {
    /// Build a frame, validating the identifier range and payload length.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedBusFrame`] if the identifier exceeds
    /// 11 bits or the payload exceeds 8 bytes.
    pub fn new(id: u16, data: Vec<u8>) -> Result<Self, CodecError> {
        if id > FRAME_ID_MAX {
            return Err(CodecError::MalformedBusFrame(format!(
                "identifier {id:#x} exceeds 11 bits"
            )));
        }
        if data.len() > FRAME_DATA_MAX {
            return Err(CodecError::MalformedBusFrame(format!(
                "payload of {} bytes exceeds {FRAME_DATA_MAX}",
                data.len()
            )));
        }
        Ok(Self { id, data })
    }
}

/// A classified inbound bus request.
#[derive(Clone, Debug, PartialEq)]
pub enum BusRequest {
    /// A hall button was pressed.
    FloorCall {
        origin_floor: i32,
        direction: CallDirection,
    },
    /// A button inside a cabin was pressed.
    CabinRequest {
        elevator_index: u8,
        target_floor: i32,
    },
    /// An incident was raised.
    Emergency {
        elevator_index: u8,
        kind: EmergencyKind,
        current_floor: i32,
        /// Not representable on the 3-byte frame; present only on requests
        /// injected with out-of-band detail.
        description: Option<String>,
        /// RFC-3339, stamped at classification time for bus frames.
        timestamp: String,
    },
}

/// Typed error codes carried in byte 1 of a gateway `0x0FE` frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorFrameCode {
    UnknownElevator,
    MalformedAssignment,
    TooManyPending,
    RequestTimedOut,
    SessionUnavailable,
    MalformedReply,
    CancelledAtShutdown,
}

impl ErrorFrameCode {
    /// The wire byte of this code.
    pub fn code(&self) -> u8 {
        match self {
            Self::UnknownElevator => 1,
            Self::MalformedAssignment => 2,
            Self::TooManyPending => 3,
            Self::RequestTimedOut => 4,
            Self::SessionUnavailable => 5,
            Self::MalformedReply => 6,
            Self::CancelledAtShutdown => 7,
        }
    }

    /// Convert a wire byte back to a code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::UnknownElevator),
            2 => Some(Self::MalformedAssignment),
            3 => Some(Self::TooManyPending),
            4 => Some(Self::RequestTimedOut),
            5 => Some(Self::SessionUnavailable),
            6 => Some(Self::MalformedReply),
            7 => Some(Self::CancelledAtShutdown),
            _ => None,
        }
    }
}

/// Classify an inbound frame into a [`BusRequest`].
///
/// Payload lengths are exact: a floor call or cabin request is 2 bytes, an
/// emergency is 3. Emergency frames carry no timestamp, so one is stamped
/// here (RFC-3339, UTC).
///
/// # Errors
///
/// Returns [`CodecError::UnknownFrameId`] for identifiers outside the
/// table and [`CodecError::MalformedBusFrame`] for payload violations.
pub fn decode_request(frame: &BusFrame) -> Result<BusRequest, CodecError> {
    match frame.id {
        FRAME_FLOOR_CALL => {
            let [floor, dir] = expect_len::<2>(frame)?;
            let direction = match dir {
                0 => CallDirection::Up,
                1 => CallDirection::Down,
                other => {
                    return Err(CodecError::MalformedBusFrame(format!(
                        "floor-call direction byte {other} (expected 0 or 1)"
                    )))
                }
            };
            Ok(BusRequest::FloorCall {
                origin_floor: i32::from(floor as i8),
                direction,
            })
        }
        FRAME_CABIN_REQUEST => {
            let [index, target] = expect_len::<2>(frame)?;
            Ok(BusRequest::CabinRequest {
                elevator_index: index,
                target_floor: i32::from(target as i8),
            })
        }
        id if (FRAME_EMERGENCY_BASE..=FRAME_EMERGENCY_BASE | 0xFF).contains(&id) => {
            let [index, code, floor] = expect_len::<3>(frame)?;
            let kind = EmergencyKind::from_code(code).ok_or_else(|| {
                CodecError::MalformedBusFrame(format!("emergency type code {code}"))
            })?;
            Ok(BusRequest::Emergency {
                elevator_index: index,
                kind,
                current_floor: i32::from(floor as i8),
                description: None,
                timestamp: chrono::Utc::now().to_rfc3339(),
            })
        }
        id => Err(CodecError::UnknownFrameId { id }),
    }
}

/// Encode a [`BusRequest`] back into its bus frame.
///
/// Used by the scenario producer and the frame round-trip law. Emergency
/// descriptions and timestamps are not representable on the wire and are
/// dropped.
///
/// # Errors
///
/// Returns [`CodecError::MalformedBusFrame`] if a floor is outside the
/// single-byte range.
pub fn encode_request(request: &BusRequest) -> Result<BusFrame, CodecError> {
    match request {
        BusRequest::FloorCall {
            origin_floor,
            direction,
        } => {
            let dir = match direction {
                CallDirection::Up => 0u8,
                CallDirection::Down => 1,
                CallDirection::Stopped => {
                    return Err(CodecError::MalformedBusFrame(
                        "floor call cannot carry PARADO".to_string(),
                    ))
                }
            };
            BusFrame::new(FRAME_FLOOR_CALL, vec![floor_byte(*origin_floor)?, dir])
        }
        BusRequest::CabinRequest {
            elevator_index,
            target_floor,
        } => BusFrame::new(
            FRAME_CABIN_REQUEST,
            vec![*elevator_index, floor_byte(*target_floor)?],
        ),
        BusRequest::Emergency {
            elevator_index,
            kind,
            current_floor,
            ..
        } => BusFrame::new(
            FRAME_EMERGENCY_BASE | u16::from(*elevator_index),
            vec![*elevator_index, kind.code(), floor_byte(*current_floor)?],
        ),
    }
}

/// Outbound floor-call reply: assigned cabin index plus truncated task id.
pub fn floor_call_reply(elevator_index: u8, task_id: &str) -> BusFrame {
    reply_frame(FRAME_FLOOR_CALL_REPLY, elevator_index, task_id)
}

/// Outbound cabin reply: assigned cabin index plus truncated task id.
pub fn cabin_reply(elevator_index: u8, task_id: &str) -> BusFrame {
    reply_frame(FRAME_CABIN_REPLY, elevator_index, task_id)
}

/// Outbound gateway error: low byte of the causing frame id plus the typed
/// code.
pub fn error_frame(causing_frame_id: u16, code: ErrorFrameCode) -> BusFrame {
    BusFrame {
        id: FRAME_GATEWAY_ERROR,
        data: vec![(causing_frame_id & 0xFF) as u8, code.code()],
    }
}

fn reply_frame(id: u16, elevator_index: u8, task_id: &str) -> BusFrame {
    let mut data = Vec::with_capacity(1 + TASK_ID_WIRE_LEN);
    data.push(elevator_index);
    let task = task_id.as_bytes();
    data.extend_from_slice(&task[..task.len().min(TASK_ID_WIRE_LEN)]);
    BusFrame { id, data }
}

fn expect_len<const N: usize>(frame: &BusFrame) -> Result<[u8; N], CodecError> {
    <[u8; N]>::try_from(frame.data.as_slice()).map_err(|_| {
        CodecError::MalformedBusFrame(format!(
            "frame {:#05x} carries {} bytes, expected {N}",
            frame.id,
            frame.data.len()
        ))
    })
}

fn floor_byte(floor: i32) -> Result<u8, CodecError> {
    i8::try_from(floor)
        .map(|f| f as u8)
        .map_err(|_| CodecError::MalformedBusFrame(format!("floor {floor} outside wire range")))
}
