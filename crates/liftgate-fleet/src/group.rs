//! Elevator group state machine.
//!
//! Invariants maintained by every operation:
//! - every cabin's `building_id` equals the group's,
//! - cabin ids are unique within the group,
//! - a busy cabin always has a destination.
//!
//! The cabin order is stable and defines the bus index used to address a
//! cabin on outbound frames.

use std::cmp::Ordering;

use liftgate_types::{Elevator, ElevatorStateWire, MovementDirection, MAX_GROUP_SIZE};

use crate::FleetError;

/// The ordered set of cabins managed for one building.
#[derive(Clone, Debug)]
pub struct ElevatorGroup {
    building_id: String,
    elevators: Vec<Elevator>,
    n_floors: i32,
}

impl ElevatorGroup {
    /// Initialize a group of `n_elevators` idle cabins for a building.
    ///
    /// Cabin ids are `"<building>A<i>"` for i = 1..=n; each cabin starts at
    /// floor 0 with closed doors and no task.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::InvalidGroupSize`] unless
    /// `1 <= n_elevators <= MAX_GROUP_SIZE`.
    pub fn init(
        building_id: impl Into<String>,
        n_elevators: usize,
        n_floors: i32,
    ) -> Result<Self, FleetError> {
        if n_elevators == 0 || n_elevators > MAX_GROUP_SIZE {
            return Err(FleetError::InvalidGroupSize {
                requested: n_elevators,
                limit: MAX_GROUP_SIZE,
            });
        }
        let building_id = building_id.into();
        let elevators = (1..=n_elevators)
            .map(|i| Elevator::new(format!("{building_id}A{i}"), building_id.clone()))
            .collect();
        tracing::info!(%building_id, n_elevators, n_floors, "elevator group initialized");
        Ok(Self {
            building_id,
            elevators,
            n_floors,
        })
    }

    /// The building this group manages.
    pub fn building_id(&self) -> &str {
        &self.building_id
    }

    /// Number of cabins in the group.
    pub fn len(&self) -> usize {
        self.elevators.len()
    }

    /// Whether the group has no cabins. Never true after a successful init.
    pub fn is_empty(&self) -> bool {
        self.elevators.is_empty()
    }

    /// Floors serviced by this building.
    pub fn n_floors(&self) -> i32 {
        self.n_floors
    }

    /// Cabins in bus-index order.
    pub fn elevators(&self) -> &[Elevator] {
        &self.elevators
    }

    /// The zero-based bus index of a cabin.
    pub fn elevator_index(&self, elevator_id: &str) -> Option<usize> {
        self.elevators
            .iter()
            .position(|cab| cab.elevator_id == elevator_id)
    }

    /// The cabin at a bus index.
    pub fn elevator_at(&self, index: usize) -> Option<&Elevator> {
        self.elevators.get(index)
    }

    /// Assign a dispatcher task to a cabin.
    ///
    /// Sets the task id and destination, marks the cabin busy (derived from
    /// the task) and points its travel direction at the destination: Up if
    /// the target floor is above the current floor, Down if below, Stopped
    /// if equal. Applying the identical assignment twice leaves the same
    /// state as applying it once.
    ///
    /// `reference_floor` is the floor that caused the request (hall-call
    /// origin or cabin target); it is logged for observability only.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::UnknownElevator`] without touching any state if
    /// the id does not resolve.
    pub fn assign_task(
        &mut self,
        elevator_id: &str,
        task_id: &str,
        target_floor: i32,
        reference_floor: i32,
    ) -> Result<(), FleetError> {
        let cab = self
            .elevators
            .iter_mut()
            .find(|cab| cab.elevator_id == elevator_id)
            .ok_or_else(|| FleetError::UnknownElevator {
                elevator_id: elevator_id.to_string(),
                building_id: self.building_id.clone(),
            })?;

        cab.current_task_id = Some(task_id.to_string());
        cab.current_destination = Some(target_floor);
        cab.movement_direction = match target_floor.cmp(&cab.current_floor) {
            Ordering::Greater => MovementDirection::Up,
            Ordering::Less => MovementDirection::Down,
            Ordering::Equal => MovementDirection::Stopped,
        };

        tracing::info!(
            elevator_id,
            task_id,
            target_floor,
            reference_floor,
            direction = ?cab.movement_direction,
            "task assigned"
        );
        Ok(())
    }

    /// Snapshot the group in bus-index order as the `elevadores_estado` wire
    /// array.
    pub fn snapshot_wire(&self) -> Vec<ElevatorStateWire> {
        self.elevators.iter().map(ElevatorStateWire::from).collect()
    }

    /// Check the group invariants. Used by tests and debug assertions.
    pub fn invariants_hold(&self) -> bool {
        let buildings_match = self
            .elevators
            .iter()
            .all(|cab| cab.building_id == self.building_id);
        let ids_unique = self.elevators.iter().enumerate().all(|(i, cab)| {
            self.elevators[..i]
                .iter()
                .all(|other| other.elevator_id != cab.elevator_id)
        });
        let busy_have_destination = self
            .elevators
            .iter()
            .all(|cab| !cab.busy() || cab.current_destination.is_some());
        buildings_match && ids_unique && busy_have_destination
    }
}
