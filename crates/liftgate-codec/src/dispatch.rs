//! Dispatcher JSON contract.
//!
//! Every request to the central dispatcher embeds the full fleet snapshot
//! as `elevadores_estado`. Field order in the payload structs is the order
//! the dispatcher-side fixtures expect; serde preserves declaration order.
//!
//! Replies are parsed defensively: unknown fields are ignored, missing
//! required fields fail with a precise error kind and never reach the
//! fleet.

use serde::{Deserialize, Serialize};

use liftgate_types::{CallDirection, ElevatorStateWire, EmergencyKind};

use crate::CodecError;

/// The three dispatcher resources, named by their CoAP path segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestClass {
    FloorCall,
    CabinRequest,
    Emergency,
}

impl RequestClass {
    /// The dispatcher resource path segment for this class.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::FloorCall => "peticion_piso",
            Self::CabinRequest => "peticion_cabina",
            Self::Emergency => "llamada_emergencia",
        }
    }
}

/// A semantic dispatcher request with cabin ids already resolved.
///
/// The bridge builds this from a [`crate::BusRequest`] plus the group
/// (bus frames address cabins by index; the dispatcher contract wants
/// ids).
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchRequest {
    FloorCall {
        origin_floor: i32,
        direction: CallDirection,
    },
    CabinRequest {
        elevator_id: String,
        target_floor: i32,
    },
    Emergency {
        elevator_id: String,
        kind: EmergencyKind,
        current_floor: i32,
        description: Option<String>,
        timestamp: String,
    },
}

impl DispatchRequest {
    /// The resource class this request posts to.
    pub fn class(&self) -> RequestClass {
        match self {
            Self::FloorCall { .. } => RequestClass::FloorCall,
            Self::CabinRequest { .. } => RequestClass::CabinRequest,
            Self::Emergency { .. } => RequestClass::Emergency,
        }
    }

    /// The floor the reply needs to correlate state updates against:
    /// hall-call origin, cabin target, or the emergency cabin's floor.
    pub fn reference_floor(&self) -> i32 {
        match self {
            Self::FloorCall { origin_floor, .. } => *origin_floor,
            Self::CabinRequest { target_floor, .. } => *target_floor,
            Self::Emergency { current_floor, .. } => *current_floor,
        }
    }
}

/// Request body for `/peticion_piso`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloorCallPayload {
    pub id_edificio: String,
    pub piso_origen_llamada: i32,
    pub direccion_llamada: CallDirection,
    pub elevadores_estado: Vec<ElevatorStateWire>,
}

/// Request body for `/peticion_cabina`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CabinRequestPayload {
    pub id_edificio: String,
    pub solicitando_ascensor_id: String,
    pub piso_destino_solicitud: i32,
    pub elevadores_estado: Vec<ElevatorStateWire>,
}

/// Request body for `/llamada_emergencia`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmergencyPayload {
    pub id_edificio: String,
    pub ascensor_id_emergencia: String,
    pub tipo_emergencia: EmergencyKind,
    pub piso_actual_emergencia: i32,
    pub descripcion_emergencia: Option<String>,
    pub timestamp_emergencia: String,
    pub elevadores_estado: Vec<ElevatorStateWire>,
}

/// Serialize the dispatcher payload for a request over a fleet snapshot.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if JSON encoding fails.
pub fn build_payload(
    building_id: &str,
    request: &DispatchRequest,
    fleet: Vec<ElevatorStateWire>,
) -> Result<Vec<u8>, CodecError> {
    let bytes = match request {
        DispatchRequest::FloorCall {
            origin_floor,
            direction,
        } => serde_json::to_vec(&FloorCallPayload {
            id_edificio: building_id.to_string(),
            piso_origen_llamada: *origin_floor,
            direccion_llamada: *direction,
            elevadores_estado: fleet,
        }),
        DispatchRequest::CabinRequest {
            elevator_id,
            target_floor,
        } => serde_json::to_vec(&CabinRequestPayload {
            id_edificio: building_id.to_string(),
            solicitando_ascensor_id: elevator_id.clone(),
            piso_destino_solicitud: *target_floor,
            elevadores_estado: fleet,
        }),
        DispatchRequest::Emergency {
            elevator_id,
            kind,
            current_floor,
            description,
            timestamp,
        } => serde_json::to_vec(&EmergencyPayload {
            id_edificio: building_id.to_string(),
            ascensor_id_emergencia: elevator_id.clone(),
            tipo_emergencia: *kind,
            piso_actual_emergencia: *current_floor,
            descripcion_emergencia: description.clone(),
            timestamp_emergencia: timestamp.clone(),
            elevadores_estado: fleet,
        }),
    };
    bytes.map_err(|e| CodecError::Serialization(e.to_string()))
}

/// A dispatcher task-assignment verdict.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub assigned_elevator_id: String,
    pub task_id: String,
    pub target_floor: i32,
    /// `tiempo_estimado_llegada`, when the dispatcher provides one.
    pub eta: Option<i64>,
}

/// A dispatcher error reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatcherError {
    pub error: String,
    pub message: String,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub received: Option<i64>,
}

/// A parsed dispatcher reply body.
#[derive(Clone, Debug, PartialEq)]
pub enum DispatcherReply {
    Assignment(Assignment),
    Error(DispatcherError),
}

/// Parse a dispatcher reply body.
///
/// A body carrying an `error` field parses as [`DispatcherReply::Error`];
/// anything else must be an assignment with both required strings and the
/// assigned target floor. Fields outside the vocabulary are ignored.
///
/// # Errors
///
/// Returns [`CodecError::MalformedReply`] if the body is not JSON and
/// [`CodecError::MalformedAssignment`] naming the first missing required
/// field.
pub fn parse_reply(bytes: &[u8]) -> Result<DispatcherReply, CodecError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| CodecError::MalformedReply(format!("invalid JSON: {e}")))?;

    if value.get("error").is_some() {
        let err: DispatcherError = serde_json::from_value(value)
            .map_err(|e| CodecError::MalformedReply(format!("invalid error shape: {e}")))?;
        return Ok(DispatcherReply::Error(err));
    }

    let assigned_elevator_id = required_str(&value, "ascensor_asignado_id")?;
    let task_id = required_str(&value, "tarea_id")?;
    let target_floor = value
        .get("piso_destino_asignado")
        .and_then(serde_json::Value::as_i64)
        .ok_or(CodecError::MalformedAssignment {
            missing: "piso_destino_asignado",
        })? as i32;
    let eta = value
        .get("tiempo_estimado_llegada")
        .and_then(serde_json::Value::as_i64);

    Ok(DispatcherReply::Assignment(Assignment {
        assigned_elevator_id,
        task_id,
        target_floor,
        eta,
    }))
}

fn required_str(
    value: &serde_json::Value,
    field: &'static str,
) -> Result<String, CodecError> {
    value
        .get(field)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or(CodecError::MalformedAssignment { missing: field })
}
