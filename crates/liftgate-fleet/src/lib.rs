//! # liftgate-fleet
//!
//! The authoritative in-memory view of a building's elevator group.
//!
//! The group is owned by the bridge task; all mutation happens there. The
//! only mutating operation after init is [`ElevatorGroup::assign_task`],
//! driven by dispatcher verdicts. Re-initialization (scenario building
//! switch) replaces the group atomically by value.

pub mod group;

pub use group::ElevatorGroup;

/// Error types for fleet operations.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    /// The referenced elevator is not part of the managed group.
    #[error("unknown elevator {elevator_id} in group {building_id}")]
    UnknownElevator {
        /// Id that failed to resolve.
        elevator_id: String,
        /// Building the group manages.
        building_id: String,
    },

    /// Group size outside `1..=MAX_GROUP_SIZE`.
    #[error("invalid group size {requested}, limit {limit}")]
    InvalidGroupSize {
        /// Requested cabin count.
        requested: usize,
        /// Hard limit.
        limit: usize,
    },
}
