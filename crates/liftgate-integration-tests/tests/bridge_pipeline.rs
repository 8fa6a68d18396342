//! Integration test: Bus-to-dispatcher bridging pipeline.
//!
//! Exercises the complete request lifecycle against a live bridge task
//! with an in-memory uplink:
//! 1. Floor call served end to end (frame -> payload -> verdict -> 0x101)
//! 2. Cabin request served end to end (frame -> verdict -> 0x201)
//! 3. Malformed assignment verdict (0xFE, fleet untouched)
//! 4. Late/unknown-token reply discarded without state change
//! 5. Scenario building switch re-initializes the group atomically
//! 6. Emergency pipeline updates the fleet with no bus reply
//!
//! No sockets are involved; the uplink records each CoAP-bound request and
//! the test plays the dispatcher by feeding replies into the bridge's
//! reply channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use liftgate_bridge::{Bridge, BridgeChannels, BridgeCommand, BridgeConfig};
use liftgate_codec::frames::BusFrame;
use liftgate_codec::ErrorFrameCode;
use liftgate_fleet::ElevatorGroup;
use liftgate_journal::NoopJournal;
use liftgate_transport::{TransportError, Uplink, UplinkReply};
use liftgate_types::MovementDirection;

/// One request captured by the in-memory uplink.
#[derive(Clone, Debug)]
struct SentRequest {
    path: String,
    token: Vec<u8>,
    payload: Vec<u8>,
}

/// Uplink that records every send.
#[derive(Default)]
struct RecordingUplink {
    sent: Mutex<Vec<SentRequest>>,
}

impl RecordingUplink {
    fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().expect("uplink lock").clone()
    }

    /// Poll until at least `n` requests were sent.
    async fn wait_for_sends(&self, n: usize) -> Vec<SentRequest> {
        for _ in 0..200 {
            let sent = self.sent();
            if sent.len() >= n {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let sent = self.sent();
        assert!(
            sent.len() >= n,
            "expected {n} dispatcher sends, saw {}",
            sent.len()
        );
        sent
    }
}

#[async_trait::async_trait]
impl Uplink for RecordingUplink {
    async fn send(&self, path: &str, token: &[u8], payload: &[u8]) -> Result<(), TransportError> {
        self.sent.lock().expect("uplink lock").push(SentRequest {
            path: path.to_string(),
            token: token.to_vec(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

/// A running bridge task plus the channel ends the test drives.
struct Gateway {
    bus_in: mpsc::Sender<BusFrame>,
    bus_out: mpsc::Receiver<BusFrame>,
    reply_in: mpsc::Sender<UplinkReply>,
    commands: mpsc::Sender<BridgeCommand>,
    shutdown: broadcast::Sender<()>,
    uplink: Arc<RecordingUplink>,
    task: JoinHandle<Bridge>,
}

impl Gateway {
    fn spawn(config: BridgeConfig) -> Self {
        let (bus_in, bus_rx) = mpsc::channel(32);
        let (bus_tx, bus_out) = mpsc::channel(32);
        let (reply_in, reply_rx) = mpsc::channel(32);
        let (commands, command_rx) = mpsc::channel(8);
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let uplink = Arc::new(RecordingUplink::default());

        let group = ElevatorGroup::init("E1", 4, 14).expect("group init");
        let bridge = Bridge::new(
            config,
            group,
            uplink.clone(),
            Arc::new(NoopJournal::new()),
            BridgeChannels {
                bus_rx,
                bus_tx,
                reply_rx,
                command_rx,
                shutdown: shutdown_rx,
            },
        );

        Self {
            bus_in,
            bus_out,
            reply_in,
            commands,
            shutdown,
            uplink,
            task: tokio::spawn(bridge.run()),
        }
    }

    async fn inject(&self, id: u16, data: &[u8]) {
        let frame = BusFrame::new(id, data.to_vec()).expect("frame");
        self.bus_in.send(frame).await.expect("bus send");
    }

    async fn reply_success(&self, token: Vec<u8>, body: &str) {
        self.reply_in
            .send(UplinkReply {
                token,
                code_class: 2,
                code_detail: 1,
                payload: body.as_bytes().to_vec(),
            })
            .await
            .expect("reply send");
    }

    async fn next_bus_frame(&mut self) -> BusFrame {
        tokio::time::timeout(Duration::from_secs(2), self.bus_out.recv())
            .await
            .expect("bus frame within deadline")
            .expect("bus channel open")
    }

    async fn expect_no_bus_frame(&mut self, wait: Duration) {
        let outcome = tokio::time::timeout(wait, self.bus_out.recv()).await;
        assert!(outcome.is_err(), "unexpected bus frame: {outcome:?}");
    }

    /// Signal shutdown and hand back the drained bridge for inspection.
    async fn stop(self) -> Bridge {
        let _ = self.shutdown.send(());
        self.task.await.expect("bridge join")
    }
}

#[tokio::test]
async fn floor_call_served_end_to_end() {
    let mut gw = Gateway::spawn(BridgeConfig::default());

    // Hall button: floor 2, going up.
    gw.inject(0x100, &[0x02, 0x00]).await;

    let sent = gw.uplink.wait_for_sends(1).await;
    assert_eq!(sent[0].path, "peticion_piso");
    assert!((4..=8).contains(&sent[0].token.len()));

    let payload: serde_json::Value = serde_json::from_slice(&sent[0].payload).expect("json");
    assert_eq!(payload["id_edificio"], "E1");
    assert_eq!(payload["piso_origen_llamada"], 2);
    assert_eq!(payload["direccion_llamada"], "SUBIENDO");
    let fleet = payload["elevadores_estado"].as_array().expect("fleet");
    assert_eq!(fleet.len(), 4);
    for (i, cab) in fleet.iter().enumerate() {
        assert_eq!(cab["id_ascensor"], format!("E1A{}", i + 1));
        assert_eq!(cab["piso_actual"], 0);
        assert_eq!(cab["estado_puerta"], "CERRADA");
        assert_eq!(cab["disponible"], true);
        assert!(cab["tarea_actual_id"].is_null());
        assert!(cab["destino_actual"].is_null());
    }

    gw.reply_success(
        sent[0].token.clone(),
        r#"{"ascensor_asignado_id":"E1A3","tarea_id":"T_42","piso_destino_asignado":2}"#,
    )
    .await;

    let out = gw.next_bus_frame().await;
    assert_eq!(out.id, 0x101);
    assert_eq!(out.data, vec![0x02, b'T', b'_', b'4', b'2']);

    let bridge = gw.stop().await;
    assert_eq!(bridge.pending_len(), 0);
    let cab = bridge.group().elevator_at(2).expect("E1A3");
    assert!(cab.busy());
    assert_eq!(cab.current_task_id.as_deref(), Some("T_42"));
    assert_eq!(cab.current_destination, Some(2));
    assert_eq!(cab.movement_direction, MovementDirection::Up);
}

#[tokio::test]
async fn cabin_request_served_end_to_end() {
    let mut gw = Gateway::spawn(BridgeConfig::default());

    // Cabin E1A1 wants floor 5.
    gw.inject(0x200, &[0x00, 0x05]).await;

    let sent = gw.uplink.wait_for_sends(1).await;
    assert_eq!(sent[0].path, "peticion_cabina");
    let payload: serde_json::Value = serde_json::from_slice(&sent[0].payload).expect("json");
    assert_eq!(payload["solicitando_ascensor_id"], "E1A1");
    assert_eq!(payload["piso_destino_solicitud"], 5);

    gw.reply_success(
        sent[0].token.clone(),
        r#"{"ascensor_asignado_id":"E1A1","tarea_id":"T_9","piso_destino_asignado":5}"#,
    )
    .await;

    let out = gw.next_bus_frame().await;
    assert_eq!(out.id, 0x201);
    assert_eq!(out.data, vec![0x00, b'T', b'_', b'9']);

    let bridge = gw.stop().await;
    let cab = bridge.group().elevator_at(0).expect("E1A1");
    assert!(cab.busy());
    assert_eq!(cab.current_destination, Some(5));
    assert_eq!(cab.movement_direction, MovementDirection::Up);
}

#[tokio::test]
async fn malformed_assignment_leaves_fleet_untouched() {
    let mut gw = Gateway::spawn(BridgeConfig::default());

    gw.inject(0x100, &[0x02, 0x00]).await;
    let sent = gw.uplink.wait_for_sends(1).await;

    // Missing ascensor_asignado_id.
    gw.reply_success(sent[0].token.clone(), r#"{"tarea_id":"T_1"}"#)
        .await;

    let out = gw.next_bus_frame().await;
    assert_eq!(out.id, 0x0FE);
    assert_eq!(
        out.data,
        vec![0x00, ErrorFrameCode::MalformedAssignment.code()]
    );

    let bridge = gw.stop().await;
    assert_eq!(bridge.pending_len(), 0);
    assert!(bridge.group().elevators().iter().all(|cab| !cab.busy()));
}

#[tokio::test]
async fn unknown_token_reply_is_discarded() {
    let mut gw = Gateway::spawn(BridgeConfig::default());

    gw.reply_success(
        vec![0xDE, 0xAD, 0xBE, 0xEF],
        r#"{"ascensor_asignado_id":"E1A1","tarea_id":"T_1","piso_destino_asignado":3}"#,
    )
    .await;

    gw.expect_no_bus_frame(Duration::from_millis(200)).await;
    let bridge = gw.stop().await;
    assert!(bridge.group().elevators().iter().all(|cab| !cab.busy()));
}

#[tokio::test]
async fn building_switch_replaces_group_before_dispatch() {
    let gw = Gateway::spawn(BridgeConfig::default());

    // Scenario switches to E7 before its first request.
    gw.commands
        .send(BridgeCommand::ReinitGroup {
            building_id: "E7".to_string(),
            n_elevators: 4,
            n_floors: 14,
        })
        .await
        .expect("command send");

    gw.inject(0x100, &[0x01, 0x01]).await;
    let sent = gw.uplink.wait_for_sends(1).await;

    let payload: serde_json::Value = serde_json::from_slice(&sent[0].payload).expect("json");
    assert_eq!(payload["id_edificio"], "E7");
    let fleet = payload["elevadores_estado"].as_array().expect("fleet");
    let ids: Vec<&str> = fleet
        .iter()
        .map(|cab| cab["id_ascensor"].as_str().expect("id"))
        .collect();
    assert_eq!(ids, ["E7A1", "E7A2", "E7A3", "E7A4"]);

    let bridge = gw.stop().await;
    assert_eq!(bridge.group().building_id(), "E7");
}

#[tokio::test]
async fn emergency_updates_fleet_without_bus_reply() {
    let mut gw = Gateway::spawn(BridgeConfig::default());

    // Emergency in cabin E1A2 (index 1): people trapped at floor 7.
    gw.inject(0x301, &[0x01, 0x03, 0x07]).await;

    let sent = gw.uplink.wait_for_sends(1).await;
    assert_eq!(sent[0].path, "llamada_emergencia");
    let payload: serde_json::Value = serde_json::from_slice(&sent[0].payload).expect("json");
    assert_eq!(payload["ascensor_id_emergencia"], "E1A2");
    assert_eq!(payload["tipo_emergencia"], "PEOPLE_TRAPPED");
    assert_eq!(payload["piso_actual_emergencia"], 7);
    assert!(payload["descripcion_emergencia"].is_null());
    assert!(payload["timestamp_emergencia"].is_string());

    // Dispatcher redirects E1A4 to the incident floor.
    gw.reply_success(
        sent[0].token.clone(),
        r#"{"ascensor_asignado_id":"E1A4","tarea_id":"T_SOS","piso_destino_asignado":7}"#,
    )
    .await;

    gw.expect_no_bus_frame(Duration::from_millis(200)).await;
    let bridge = gw.stop().await;
    let cab = bridge.group().elevator_at(3).expect("E1A4");
    assert!(cab.busy());
    assert_eq!(cab.current_task_id.as_deref(), Some("T_SOS"));
    assert_eq!(cab.current_destination, Some(7));
}

#[tokio::test]
async fn concurrent_requests_get_distinct_tokens() {
    let gw = Gateway::spawn(BridgeConfig::default());

    gw.inject(0x100, &[0x01, 0x00]).await;
    gw.inject(0x100, &[0x03, 0x01]).await;
    gw.inject(0x200, &[0x01, 0x09]).await;

    let sent = gw.uplink.wait_for_sends(3).await;
    assert_ne!(sent[0].token, sent[1].token);
    assert_ne!(sent[0].token, sent[2].token);
    assert_ne!(sent[1].token, sent[2].token);

    let bridge = gw.stop().await;
    // All three were cancelled at shutdown and drained.
    assert_eq!(bridge.pending_len(), 0);
}
