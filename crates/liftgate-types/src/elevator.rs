//! Elevator cabin state.
//!
//! A cabin is created when its building group is initialized and mutated
//! only by the fleet manager on assignment events. `busy` is never stored:
//! it is derived from the presence of a task, which keeps the
//! busy-iff-task invariant true by construction.

use serde::{Deserialize, Serialize};

/// Door state of a cabin.
///
/// The wire labels are the Spanish vocabulary fixed by the dispatcher
/// contract. `Unknown` never occurs in a gateway-initialized fleet; it
/// exists for frames reporting a door sensor fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorState {
    #[serde(rename = "CERRADA")]
    Closed,
    #[serde(rename = "ABIERTA")]
    Open,
    #[serde(rename = "ABRIENDO")]
    Opening,
    #[serde(rename = "CERRANDO")]
    Closing,
    #[serde(rename = "DESCONOCIDA")]
    Unknown,
}

/// Travel direction of a cabin.
///
/// Internal state only; the dispatcher contract does not carry the
/// movement direction in `elevadores_estado`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MovementDirection {
    Up,
    Down,
    Stopped,
    Unknown,
}

/// A single elevator cabin within a building group.
#[derive(Clone, Debug, PartialEq)]
pub struct Elevator {
    /// Globally unique id within a building, e.g. `"E1A3"`.
    pub elevator_id: String,
    /// Building this cabin belongs to.
    pub building_id: String,
    /// Current floor; 0 is ground, negative floors are basements.
    pub current_floor: i32,
    /// Door state.
    pub door_state: DoorState,
    /// Travel direction.
    pub movement_direction: MovementDirection,
    /// Task currently being served; `None` means idle.
    pub current_task_id: Option<String>,
    /// Destination floor of the current task.
    pub current_destination: Option<i32>,
}

impl Elevator {
    /// Create an idle cabin parked at the ground floor with closed doors.
    pub fn new(elevator_id: impl Into<String>, building_id: impl Into<String>) -> Self {
        Self {
            elevator_id: elevator_id.into(),
            building_id: building_id.into(),
            current_floor: 0,
            door_state: DoorState::Closed,
            movement_direction: MovementDirection::Stopped,
            current_task_id: None,
            current_destination: None,
        }
    }

    /// Whether the cabin is serving a task. Derived: busy iff a task id is
    /// present.
    pub fn busy(&self) -> bool {
        self.current_task_id.is_some()
    }
}

/// Wire form of a cabin inside `elevadores_estado`.
///
/// Field order is part of the contract: the dispatcher-side test fixtures
/// compare serialized bytes, so the struct declares the fields in the
/// order the gateway must emit them. `disponible` is the negation of
/// [`Elevator::busy`]; idle cabins carry explicit JSON nulls for the task
/// and destination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElevatorStateWire {
    pub id_ascensor: String,
    pub piso_actual: i32,
    pub estado_puerta: DoorState,
    pub disponible: bool,
    pub tarea_actual_id: Option<String>,
    pub destino_actual: Option<i32>,
}

impl From<&Elevator> for ElevatorStateWire {
    fn from(cab: &Elevator) -> Self {
        Self {
            id_ascensor: cab.elevator_id.clone(),
            piso_actual: cab.current_floor,
            estado_puerta: cab.door_state,
            disponible: !cab.busy(),
            tarea_actual_id: cab.current_task_id.clone(),
            destino_actual: cab.current_destination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_elevator_is_idle_at_ground() {
        let cab = Elevator::new("E1A1", "E1");
        assert_eq!(cab.current_floor, 0);
        assert_eq!(cab.door_state, DoorState::Closed);
        assert_eq!(cab.movement_direction, MovementDirection::Stopped);
        assert!(!cab.busy());
        assert!(cab.current_destination.is_none());
    }

    #[test]
    fn test_busy_derived_from_task() {
        let mut cab = Elevator::new("E1A1", "E1");
        assert!(!cab.busy());
        cab.current_task_id = Some("T_1".to_string());
        assert!(cab.busy());
        cab.current_task_id = None;
        assert!(!cab.busy());
    }

    #[test]
    fn test_door_state_wire_labels() {
        assert_eq!(
            serde_json::to_string(&DoorState::Closed).expect("serialize"),
            "\"CERRADA\""
        );
        assert_eq!(
            serde_json::to_string(&DoorState::Open).expect("serialize"),
            "\"ABIERTA\""
        );
        assert_eq!(
            serde_json::to_string(&DoorState::Opening).expect("serialize"),
            "\"ABRIENDO\""
        );
        assert_eq!(
            serde_json::to_string(&DoorState::Closing).expect("serialize"),
            "\"CERRANDO\""
        );
    }

    #[test]
    fn test_door_state_roundtrip() {
        let state: DoorState = serde_json::from_str("\"CERRANDO\"").expect("parse");
        assert_eq!(state, DoorState::Closing);
    }

    #[test]
    fn test_wire_state_idle_cabin() {
        let cab = Elevator::new("E1A2", "E1");
        let wire = ElevatorStateWire::from(&cab);
        let json = serde_json::to_value(&wire).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "id_ascensor": "E1A2",
                "piso_actual": 0,
                "estado_puerta": "CERRADA",
                "disponible": true,
                "tarea_actual_id": null,
                "destino_actual": null,
            })
        );
    }

    #[test]
    fn test_wire_state_busy_cabin() {
        let mut cab = Elevator::new("E1A2", "E1");
        cab.current_task_id = Some("T_7".to_string());
        cab.current_destination = Some(9);
        let wire = ElevatorStateWire::from(&cab);
        assert!(!wire.disponible);
        assert_eq!(wire.tarea_actual_id.as_deref(), Some("T_7"));
        assert_eq!(wire.destino_actual, Some(9));
    }
}
