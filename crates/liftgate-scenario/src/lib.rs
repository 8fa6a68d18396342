//! # liftgate-scenario
//!
//! Synthetic bus traffic from a JSON scenario file.
//!
//! A scenario lists buildings, each with a sequence of requests. The
//! [`ScenarioPlayer`] re-initializes the fleet group when the building
//! changes and then injects each request as a bus frame at a paced
//! cadence. The bridge does not distinguish synthetic frames from real
//! ones.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use liftgate_bridge::BridgeCommand;
use liftgate_codec::frames::{encode_request, BusFrame, BusRequest};
use liftgate_types::{CallDirection, EmergencyKind};

/// Error types for scenario loading and playback.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// The scenario file could not be read.
    #[error("scenario file error: {0}")]
    Io(String),

    /// The scenario JSON does not match the schema.
    #[error("scenario parse error: {0}")]
    Parse(String),

    /// An emergency names an elevator id without a parsable `A<n>` index.
    #[error("cannot derive a cabin index from elevator id {0:?}")]
    BadElevatorId(String),

    /// A request cannot be represented as a bus frame.
    #[error("frame encode error: {0}")]
    Encode(String),

    /// The bridge went away mid-playback.
    #[error("bridge channel closed")]
    BridgeGone,
}

/// Hall-call direction in the scenario schema (lowercase on purpose; the
/// dispatcher vocabulary is uppercase Spanish).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioDirection {
    #[serde(rename = "up")]
    Up,
    #[serde(rename = "down")]
    Down,
}

impl From<ScenarioDirection> for CallDirection {
    fn from(dir: ScenarioDirection) -> Self {
        match dir {
            ScenarioDirection::Up => CallDirection::Up,
            ScenarioDirection::Down => CallDirection::Down,
        }
    }
}

/// One scripted request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tipo")]
pub enum ScenarioRequest {
    #[serde(rename = "llamada_piso")]
    FloorCall {
        piso_origen: i32,
        direccion: ScenarioDirection,
    },
    #[serde(rename = "solicitud_cabina")]
    CabinRequest {
        indice_ascensor: u8,
        piso_destino: i32,
    },
    #[serde(rename = "llamada_emergencia")]
    Emergency {
        ascensor_id_emergencia: String,
        tipo_emergencia: EmergencyKind,
        piso_actual_emergencia: i32,
        #[serde(default)]
        descripcion_emergencia: Option<String>,
        timestamp_emergencia: String,
    },
}

impl ScenarioRequest {
    /// Render this request as the bus frame a real cabin would emit.
    ///
    /// Emergency descriptions and timestamps have no frame representation;
    /// they are logged at playback and dropped here.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::BadElevatorId`] when an emergency elevator
    /// id carries no `A<n>` suffix and [`ScenarioError::Encode`] when a
    /// floor is outside the wire range.
    pub fn to_frame(&self) -> Result<BusFrame, ScenarioError> {
        let request = match self {
            Self::FloorCall {
                piso_origen,
                direccion,
            } => BusRequest::FloorCall {
                origin_floor: *piso_origen,
                direction: (*direccion).into(),
            },
            Self::CabinRequest {
                indice_ascensor,
                piso_destino,
            } => BusRequest::CabinRequest {
                elevator_index: *indice_ascensor,
                target_floor: *piso_destino,
            },
            Self::Emergency {
                ascensor_id_emergencia,
                tipo_emergencia,
                piso_actual_emergencia,
                descripcion_emergencia,
                timestamp_emergencia,
            } => BusRequest::Emergency {
                elevator_index: elevator_index_from_id(ascensor_id_emergencia)
                    .ok_or_else(|| {
                        ScenarioError::BadElevatorId(ascensor_id_emergencia.clone())
                    })?,
                kind: *tipo_emergencia,
                current_floor: *piso_actual_emergencia,
                description: descripcion_emergencia.clone(),
                timestamp: timestamp_emergencia.clone(),
            },
        };
        encode_request(&request).map_err(|e| ScenarioError::Encode(e.to_string()))
    }
}

/// One building's scripted traffic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingScenario {
    pub id_edificio: String,
    pub peticiones: Vec<ScenarioRequest>,
}

/// A complete scenario file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub edificios: Vec<BuildingScenario>,
}

impl Scenario {
    /// Load a scenario from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Io`] if the file cannot be read and
    /// [`ScenarioError::Parse`] if the JSON violates the schema (including
    /// unknown emergency type strings).
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ScenarioError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ScenarioError::Parse(e.to_string()))
    }

    /// Total scripted requests across all buildings.
    pub fn request_count(&self) -> usize {
        self.edificios.iter().map(|b| b.peticiones.len()).sum()
    }
}

/// Playback pacing and group sizing.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Delay between injected frames.
    pub frame_interval: Duration,
    /// Cabins per building group (the scenario names buildings only).
    pub fleet_size: usize,
    /// Floors per building.
    pub n_floors: i32,
}

/// Paced injector of scripted bus frames.
pub struct ScenarioPlayer {
    scenario: Scenario,
    config: PlayerConfig,
    bus_tx: mpsc::Sender<BusFrame>,
    command_tx: mpsc::Sender<BridgeCommand>,
}

impl ScenarioPlayer {
    pub fn new(
        scenario: Scenario,
        config: PlayerConfig,
        bus_tx: mpsc::Sender<BusFrame>,
        command_tx: mpsc::Sender<BridgeCommand>,
    ) -> Self {
        Self {
            scenario,
            config,
            bus_tx,
            command_tx,
        }
    }

    /// Play the scenario to completion or until shutdown.
    ///
    /// Before each building's first request, the fleet group is
    /// re-initialized for that building so the next payload carries its
    /// id and cabin names.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::BridgeGone`] if the bridge channels close
    /// mid-playback; per-request conversion failures are logged and
    /// skipped.
    pub async fn run(
        self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ScenarioError> {
        for building in &self.scenario.edificios {
            // Pace the switch like a frame so the bridge drains the
            // previous building's traffic before the group is replaced.
            tokio::select! {
                _ = tokio::time::sleep(self.config.frame_interval) => {}
                _ = shutdown.recv() => {
                    tracing::info!("scenario playback stopped by shutdown");
                    return Ok(());
                }
            }

            tracing::info!(building = %building.id_edificio, "scenario building starts");
            self.command_tx
                .send(BridgeCommand::ReinitGroup {
                    building_id: building.id_edificio.clone(),
                    n_elevators: self.config.fleet_size,
                    n_floors: self.config.n_floors,
                })
                .await
                .map_err(|_| ScenarioError::BridgeGone)?;

            for peticion in &building.peticiones {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.frame_interval) => {}
                    _ = shutdown.recv() => {
                        tracing::info!("scenario playback stopped by shutdown");
                        return Ok(());
                    }
                }

                if let ScenarioRequest::Emergency {
                    descripcion_emergencia: Some(description),
                    ascensor_id_emergencia,
                    ..
                } = peticion
                {
                    // The frame cannot carry the description.
                    tracing::info!(
                        elevator = %ascensor_id_emergencia,
                        description,
                        "scripted emergency detail"
                    );
                }

                match peticion.to_frame() {
                    Ok(frame) => {
                        self.bus_tx
                            .send(frame)
                            .await
                            .map_err(|_| ScenarioError::BridgeGone)?;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "scripted request skipped");
                    }
                }
            }
        }
        tracing::info!(
            requests = self.scenario.request_count(),
            "scenario playback complete"
        );
        Ok(())
    }
}

/// Derive the zero-based cabin index from an elevator id of the form
/// `"<building>A<n>"`.
fn elevator_index_from_id(elevator_id: &str) -> Option<u8> {
    let (_, digits) = elevator_id.rsplit_once('A')?;
    let ordinal: u8 = digits.parse().ok()?;
    ordinal.checked_sub(1)
}
