//! The bridge task.
//!
//! One message lifecycle, end to end:
//!
//! ```text
//! bus frame -> classify -> snapshot fleet -> payload -> token -> register -> uplink
//! uplink reply -> match token -> apply verdict -> fleet update -> bus reply
//! ```
//!
//! The task is the single owner of the fleet group and the pending table;
//! every mutation happens on its select loop, which makes each pending-
//! table operation atomic from the rest of the system's perspective. The
//! loop suspends only at the select boundary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{Rng, RngCore};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use liftgate_codec::frames::{self, BusFrame, BusRequest};
use liftgate_codec::{
    dispatch, Assignment, CodecError, DispatchRequest, DispatcherReply, ErrorFrameCode,
    RequestClass,
};
use liftgate_fleet::ElevatorGroup;
use liftgate_journal::Journal;
use liftgate_transport::{TransportError, Uplink, UplinkReply};

use crate::pending::{DirectOutcome, PendingRequest, PendingTable, RequestOrigin};

/// Bridge tuning knobs.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Maximum outstanding dispatcher requests.
    pub max_pending: usize,
    /// Deadline per request attempt.
    pub request_deadline: Duration,
    /// Re-sends after the first attempt times out.
    pub max_retries: u32,
    /// Cadence of the timeout sweep.
    pub sweep_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_pending: 32,
            request_deadline: Duration::from_millis(5000),
            max_retries: 3,
            sweep_interval: Duration::from_millis(250),
        }
    }
}

/// Control-plane commands for the bridge task.
#[derive(Debug)]
pub enum BridgeCommand {
    /// Atomically replace the managed group (scenario building switch).
    ReinitGroup {
        building_id: String,
        n_elevators: usize,
        n_floors: i32,
    },
    /// Submit a request that did not originate on the bus; the verdict
    /// comes back on the oneshot.
    Request {
        request: DispatchRequest,
        reply: oneshot::Sender<DirectOutcome>,
    },
}

/// The channel ends the bridge task consumes.
pub struct BridgeChannels {
    /// Inbound bus frames (real or synthetic).
    pub bus_rx: mpsc::Receiver<BusFrame>,
    /// Outbound bus frames.
    pub bus_tx: mpsc::Sender<BusFrame>,
    /// Replies delivered by the transport reader.
    pub reply_rx: mpsc::Receiver<UplinkReply>,
    /// Control-plane commands.
    pub command_rx: mpsc::Receiver<BridgeCommand>,
    /// Process-wide shutdown signal.
    pub shutdown: broadcast::Receiver<()>,
}

/// The bridge controller: owns the fleet and the pending table.
pub struct Bridge {
    config: BridgeConfig,
    group: ElevatorGroup,
    pending: PendingTable,
    uplink: Arc<dyn Uplink>,
    journal: Arc<dyn Journal>,
    channels: BridgeChannels,
}

impl Bridge {
    /// Build the bridge around an initialized group.
    pub fn new(
        config: BridgeConfig,
        group: ElevatorGroup,
        uplink: Arc<dyn Uplink>,
        journal: Arc<dyn Journal>,
        channels: BridgeChannels,
    ) -> Self {
        let pending = PendingTable::with_capacity(config.max_pending);
        Self {
            config,
            group,
            pending,
            uplink,
            journal,
            channels,
        }
    }

    /// The managed group. Exposed for post-run inspection.
    pub fn group(&self) -> &ElevatorGroup {
        &self.group
    }

    /// Outstanding dispatcher requests.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drive the bridge until shutdown, then drain in-flight work.
    ///
    /// Returns the bridge so callers can inspect the final fleet state.
    pub async fn run(mut self) -> Self {
        let mut sweep = tokio::time::interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe = self.channels.bus_rx.recv() => match maybe {
                    Some(frame) => self.on_bus_frame(frame).await,
                    None => break,
                },
                maybe = self.channels.reply_rx.recv() => match maybe {
                    Some(reply) => self.on_reply(reply).await,
                    None => break,
                },
                maybe = self.channels.command_rx.recv() => match maybe {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },
                _ = sweep.tick() => self.on_sweep().await,
                _ = self.channels.shutdown.recv() => break,
            }
        }

        self.drain_at_shutdown();
        self
    }

    async fn on_bus_frame(&mut self, frame: BusFrame) {
        self.journal.bus_rx(
            "bus frame received",
            serde_json::json!({
                "id": format!("{:#05x}", frame.id),
                "data": hex::encode(&frame.data),
            }),
        );

        let request = match frames::decode_request(&frame) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(id = %format!("{:#05x}", frame.id), error = %e, "bus frame dropped");
                self.journal.error(&format!("bus frame dropped: {e}"));
                return;
            }
        };

        match self.resolve(request) {
            Ok(dispatch_request) => {
                self.submit(dispatch_request, RequestOrigin::Bus { frame_id: frame.id })
                    .await;
            }
            Err(code) => {
                self.journal
                    .error("bus frame addresses a cabin outside the group");
                self.fail_origin(RequestOrigin::Bus { frame_id: frame.id }, code)
                    .await;
            }
        }
    }

    /// Resolve bus cabin indices to elevator ids against the live group.
    fn resolve(&self, request: BusRequest) -> Result<DispatchRequest, ErrorFrameCode> {
        match request {
            BusRequest::FloorCall {
                origin_floor,
                direction,
            } => Ok(DispatchRequest::FloorCall {
                origin_floor,
                direction,
            }),
            BusRequest::CabinRequest {
                elevator_index,
                target_floor,
            } => {
                let cab = self
                    .group
                    .elevator_at(usize::from(elevator_index))
                    .ok_or(ErrorFrameCode::UnknownElevator)?;
                Ok(DispatchRequest::CabinRequest {
                    elevator_id: cab.elevator_id.clone(),
                    target_floor,
                })
            }
            BusRequest::Emergency {
                elevator_index,
                kind,
                current_floor,
                description,
                timestamp,
            } => {
                let cab = self
                    .group
                    .elevator_at(usize::from(elevator_index))
                    .ok_or(ErrorFrameCode::UnknownElevator)?;
                Ok(DispatchRequest::Emergency {
                    elevator_id: cab.elevator_id.clone(),
                    kind,
                    current_floor,
                    description,
                    timestamp,
                })
            }
        }
    }

    async fn submit(&mut self, request: DispatchRequest, origin: RequestOrigin) {
        let class = request.class();
        let path = class.path_segment();
        let reference_floor = request.reference_floor();

        let payload = match dispatch::build_payload(
            self.group.building_id(),
            &request,
            self.group.snapshot_wire(),
        ) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "payload serialization failed");
                self.journal
                    .error(&format!("payload serialization failed: {e}"));
                self.fail_origin(origin, ErrorFrameCode::MalformedReply).await;
                return;
            }
        };

        let now = Instant::now();
        let record = PendingRequest {
            token: self.mint_token(),
            class,
            origin,
            reference_floor,
            path,
            payload: payload.clone(),
            created_at: now,
            deadline: now + self.config.request_deadline,
            retries_remaining: self.config.max_retries,
        };
        let token = record.token.clone();

        match self.pending.register(record) {
            Ok(()) => {
                self.dispatch_send(path, &token, &payload).await;
            }
            Err(rejected) => {
                tracing::warn!(
                    capacity = self.config.max_pending,
                    "pending table full, request dropped"
                );
                self.journal.error("too many pending requests");
                self.fail_origin(rejected.origin, ErrorFrameCode::TooManyPending)
                    .await;
            }
        }
    }

    async fn dispatch_send(&mut self, path: &'static str, token: &[u8], payload: &[u8]) {
        match self.uplink.send(path, token, payload).await {
            Ok(()) => {
                self.journal.dispatch_tx(
                    "dispatcher request sent",
                    serde_json::json!({
                        "path": path,
                        "token": hex::encode(token),
                    }),
                );
            }
            Err(TransportError::SessionUnavailable) => {
                // Fail fast: requests submitted while the link is down do
                // not linger in the table.
                tracing::warn!(path, "session unavailable, request failed fast");
                self.journal.error("session unavailable");
                if let Some(record) = self.pending.match_and_remove(token) {
                    self.fail_origin(record.origin, ErrorFrameCode::SessionUnavailable)
                        .await;
                }
            }
            Err(e) => {
                // The link dropped mid-send. The record stays registered;
                // the sweep re-sends it once the supervisor reconnects.
                tracing::warn!(path, error = %e, "dispatcher send failed, sweep will retry");
                self.journal.error(&format!("dispatcher send failed: {e}"));
            }
        }
    }

    async fn on_reply(&mut self, reply: UplinkReply) {
        self.journal.dispatch_rx(
            "dispatcher reply received",
            serde_json::json!({
                "token": hex::encode(&reply.token),
                "code": reply.code(),
            }),
        );

        let Some(record) = self.pending.match_and_remove(&reply.token) else {
            tracing::info!(
                token = %hex::encode(&reply.token),
                "reply without a pending record discarded"
            );
            return;
        };

        if !reply.is_success() {
            tracing::warn!(code = %reply.code(), "dispatcher rejected the request");
            self.journal
                .error(&format!("dispatcher error code {}", reply.code()));
            self.fail_record(record, ErrorFrameCode::MalformedReply).await;
            return;
        }

        match dispatch::parse_reply(&reply.payload) {
            Ok(DispatcherReply::Assignment(assignment)) => {
                self.apply_verdict(record, assignment).await;
            }
            Ok(DispatcherReply::Error(e)) => {
                tracing::warn!(error = %e.error, message = %e.message, "dispatcher error reply");
                self.journal
                    .error(&format!("dispatcher error: {} ({})", e.error, e.message));
                self.fail_record(record, ErrorFrameCode::MalformedReply).await;
            }
            Err(CodecError::MalformedAssignment { missing }) => {
                tracing::warn!(missing, "assignment verdict missing required field");
                self.journal
                    .error(&format!("malformed assignment: missing {missing}"));
                self.fail_record(record, ErrorFrameCode::MalformedAssignment)
                    .await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "undecodable dispatcher reply");
                self.journal.error(&format!("malformed reply: {e}"));
                self.fail_record(record, ErrorFrameCode::MalformedReply).await;
            }
        }
    }

    async fn apply_verdict(&mut self, record: PendingRequest, assignment: Assignment) {
        let Some(index) = self.group.elevator_index(&assignment.assigned_elevator_id) else {
            tracing::warn!(
                elevator = %assignment.assigned_elevator_id,
                "verdict names a cabin outside the group"
            );
            self.journal.error(&format!(
                "assignment names unknown elevator {}",
                assignment.assigned_elevator_id
            ));
            self.fail_record(record, ErrorFrameCode::UnknownElevator).await;
            return;
        };

        if let Err(e) = self.group.assign_task(
            &assignment.assigned_elevator_id,
            &assignment.task_id,
            assignment.target_floor,
            record.reference_floor,
        ) {
            tracing::error!(error = %e, "assignment rejected by the fleet");
            self.journal.error(&format!("assignment rejected: {e}"));
            self.fail_record(record, ErrorFrameCode::UnknownElevator).await;
            return;
        }

        self.journal.task_assigned(
            "task assigned",
            serde_json::json!({
                "elevator": assignment.assigned_elevator_id,
                "task": assignment.task_id,
                "target_floor": assignment.target_floor,
                "eta": assignment.eta,
            }),
        );

        let index = index as u8;
        match record.class {
            RequestClass::FloorCall => {
                self.emit_frame(frames::floor_call_reply(index, &assignment.task_id))
                    .await;
            }
            RequestClass::CabinRequest => {
                self.emit_frame(frames::cabin_reply(index, &assignment.task_id))
                    .await;
            }
            // Emergencies get no bus reply; the fleet update and the
            // journal entry are the contract.
            RequestClass::Emergency => {}
        }

        if let RequestOrigin::Direct { reply } = record.origin {
            let _ = reply.send(DirectOutcome::Assigned(assignment));
        }
    }

    async fn on_sweep(&mut self) {
        let now = Instant::now();
        for mut record in self.pending.sweep(now) {
            if record.retries_remaining > 0 {
                record.retries_remaining -= 1;
                record.token = self.mint_token();
                record.created_at = now;
                record.deadline = now + self.config.request_deadline;

                let token = record.token.clone();
                let path = record.path;
                let payload = record.payload.clone();
                tracing::info!(
                    token = %hex::encode(&token),
                    retries_left = record.retries_remaining,
                    "re-sending timed-out request"
                );
                match self.pending.register(record) {
                    Ok(()) => self.dispatch_send(path, &token, &payload).await,
                    Err(rejected) => {
                        self.journal.error("too many pending requests");
                        self.fail_origin(rejected.origin, ErrorFrameCode::TooManyPending)
                            .await;
                    }
                }
            } else {
                tracing::warn!(
                    token = %hex::encode(&record.token),
                    "request timed out, retries exhausted"
                );
                self.journal.error("request timed out");
                self.fail_record(record, ErrorFrameCode::RequestTimedOut).await;
            }
        }
    }

    async fn on_command(&mut self, command: BridgeCommand) {
        match command {
            BridgeCommand::ReinitGroup {
                building_id,
                n_elevators,
                n_floors,
            } => match ElevatorGroup::init(building_id, n_elevators, n_floors) {
                Ok(group) => {
                    tracing::info!(building = %group.building_id(), "group re-initialized");
                    self.group = group;
                }
                Err(e) => {
                    tracing::error!(error = %e, "group re-init failed");
                    self.journal.error(&format!("group re-init failed: {e}"));
                }
            },
            BridgeCommand::Request { request, reply } => {
                self.submit(request, RequestOrigin::Direct { reply }).await;
            }
        }
    }

    fn drain_at_shutdown(&mut self) {
        for record in self.pending.drain_all() {
            tracing::info!(
                token = %hex::encode(&record.token),
                "pending request cancelled at shutdown"
            );
            self.journal.error("request cancelled at shutdown");
            if let RequestOrigin::Direct { reply } = record.origin {
                let _ = reply.send(DirectOutcome::Failed(ErrorFrameCode::CancelledAtShutdown));
            }
        }
    }

    async fn fail_record(&mut self, record: PendingRequest, code: ErrorFrameCode) {
        self.fail_origin(record.origin, code).await;
    }

    async fn fail_origin(&mut self, origin: RequestOrigin, code: ErrorFrameCode) {
        match origin {
            RequestOrigin::Bus { frame_id } => {
                self.emit_frame(frames::error_frame(frame_id, code)).await;
            }
            RequestOrigin::Direct { reply } => {
                let _ = reply.send(DirectOutcome::Failed(code));
            }
        }
    }

    async fn emit_frame(&mut self, frame: BusFrame) {
        self.journal.bus_tx(
            "bus frame emitted",
            serde_json::json!({
                "id": format!("{:#05x}", frame.id),
                "data": hex::encode(&frame.data),
            }),
        );
        if self.channels.bus_tx.send(frame).await.is_err() {
            tracing::warn!("bus sink closed, outbound frame dropped");
        }
    }

    /// Mint a 4-8 byte strong-random token unique among live records.
    fn mint_token(&self) -> Vec<u8> {
        let mut rng = rand::thread_rng();
        loop {
            let len = rng.gen_range(4..=8);
            let mut token = vec![0u8; len];
            rng.fill_bytes(&mut token);
            if !self.pending.contains_token(&token) {
                return token;
            }
        }
    }
}
