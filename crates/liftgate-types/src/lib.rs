//! # liftgate-types
//!
//! Shared domain types for the liftgate elevator gateway workspace.
//! These types are used on both sides of the bridge: the local-bus codec
//! addresses cabins by group index, and the dispatcher contract serializes
//! them with the Spanish wire vocabulary fixed by the central dispatcher.

pub mod elevator;
pub mod request;

pub use elevator::{DoorState, Elevator, ElevatorStateWire, MovementDirection};
pub use request::{CallDirection, EmergencyKind};

/// Hard upper limit on elevators per building group.
pub const MAX_GROUP_SIZE: usize = 16;

/// Default upper bound on elevators per building group.
pub const DEFAULT_GROUP_BOUND: usize = 6;

/// Maximum task-id bytes carried on an outbound bus frame (one byte of the
/// 8-byte payload is the elevator index).
pub const TASK_ID_WIRE_LEN: usize = 7;
