//! liftgate-daemon: the elevator gateway process.
//!
//! One Tokio runtime hosting the bridge task, the dispatcher session
//! (reader + reconnect supervisor), the optional scenario player, and a
//! sink for outbound bus frames. Exit codes: 0 clean shutdown, 1 config
//! error, 2 credential-store failure, 3 dispatcher session unavailable at
//! startup.

mod config;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use liftgate_bridge::{Bridge, BridgeChannels, BridgeConfig};
use liftgate_creds::CredentialStore;
use liftgate_fleet::ElevatorGroup;
use liftgate_journal::{Journal, MarkdownJournal, NoopJournal};
use liftgate_scenario::{PlayerConfig, Scenario, ScenarioPlayer};
use liftgate_transport::{Session, SessionConfig};

use crate::config::GatewayConfig;

/// Startup failure with its process exit code.
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("credential store error: {0}")]
    Credentials(String),

    #[error("dispatcher session unavailable: {0}")]
    Session(String),
}

impl StartupError {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::Credentials(_) => 2,
            Self::Session(_) => 3,
        }
    }
}

#[tokio::main]
async fn main() {
    // Config comes first so its log level can seed the subscriber.
    let config = match GatewayConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("liftgate: configuration error: {e}");
            std::process::exit(1);
        }
    };

    let directive = format!("liftgate={}", config.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse().unwrap_or_else(|_| {
                    "liftgate=info".parse().expect("static directive parses")
                })),
        )
        .init();

    info!("liftgate gateway starting");

    if let Err(e) = run(config).await {
        error!("{e}");
        std::process::exit(e.exit_code());
    }

    info!("liftgate gateway stopped");
}

async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    // 1. Resolve addresses and policy; both are configuration concerns.
    let gateway_listen = config
        .gateway_listen_addr()
        .map_err(|e| StartupError::Config(e.to_string()))?;
    let dispatcher_endpoint = config
        .dispatcher_addr()
        .map_err(|e| StartupError::Config(e.to_string()))?;
    let policy = config
        .selection_policy()
        .map_err(|e| StartupError::Config(e.to_string()))?;

    // 2. Credential pool; one credential backs the whole session.
    let creds = CredentialStore::load(Path::new(&config.credentials_file))
        .map_err(|e| StartupError::Credentials(e.to_string()))?;
    let psk = creds
        .select(policy, config.psk_identity.as_bytes())
        .map_err(|e| StartupError::Credentials(e.to_string()))?
        .to_vec();
    info!(
        pool = creds.len(),
        policy = %config.credential_policy,
        "credential selected"
    );

    // 3. Execution journal.
    let journal: Arc<dyn Journal> = if config.journal_file.is_empty() {
        Arc::new(NoopJournal::new())
    } else {
        Arc::new(
            MarkdownJournal::create(Path::new(&config.journal_file))
                .map_err(|e| StartupError::Config(e.to_string()))?,
        )
    };

    // 4. Channels and shutdown signal.
    let (shutdown_tx, _) = broadcast::channel(4);
    let (bus_in_tx, bus_rx) = mpsc::channel(64);
    let (bus_tx, mut bus_out_rx) = mpsc::channel(64);
    let (reply_tx, reply_rx) = mpsc::channel(64);
    let (command_tx, command_rx) = mpsc::channel(16);

    // 5. Dispatcher session: handshake now, reconnect supervision after.
    let session = Session::new(
        SessionConfig {
            gateway_listen,
            dispatcher_endpoint,
            handshake_retries: config.handshake_retries,
            backoff: Duration::from_millis(500),
        },
        psk,
        config.psk_identity.clone().into_bytes(),
        reply_tx,
    );
    session
        .clone()
        .connect()
        .await
        .map_err(|e| StartupError::Session(e.to_string()))?;
    session.clone().spawn_supervisor(shutdown_tx.subscribe());

    // 6. Fleet group and bridge task.
    let group = ElevatorGroup::init(
        config.building_id.clone(),
        config.fleet_size,
        config.n_floors,
    )
    .map_err(|e| StartupError::Config(e.to_string()))?;

    let bridge = Bridge::new(
        BridgeConfig {
            max_pending: config.max_pending,
            request_deadline: Duration::from_millis(config.request_deadline_ms),
            max_retries: config.max_retries,
            sweep_interval: Duration::from_millis(config.sweep_interval_ms),
        },
        group,
        session.clone(),
        journal.clone(),
        BridgeChannels {
            bus_rx,
            bus_tx,
            reply_rx,
            command_rx,
            shutdown: shutdown_tx.subscribe(),
        },
    );
    let bridge_task = tokio::spawn(bridge.run());

    // 7. Outbound bus sink. Real cabin hardware is out of scope for this
    // build; frames are surfaced in the log (the journal already keeps
    // them).
    tokio::spawn(async move {
        while let Some(frame) = bus_out_rx.recv().await {
            info!(
                id = %format!("{:#05x}", frame.id),
                data = %hex::encode(&frame.data),
                "bus frame out"
            );
        }
    });

    // 8. Optional scenario playback.
    if !config.scenario_file.is_empty() {
        let scenario = Scenario::load(Path::new(&config.scenario_file))
            .map_err(|e| StartupError::Config(e.to_string()))?;
        info!(
            buildings = scenario.edificios.len(),
            requests = scenario.request_count(),
            "scenario loaded"
        );
        let player = ScenarioPlayer::new(
            scenario,
            PlayerConfig {
                frame_interval: Duration::from_millis(config.frame_interval_ms),
                fleet_size: config.fleet_size,
                n_floors: config.n_floors,
            },
            bus_in_tx.clone(),
            command_tx.clone(),
        );
        let player_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = player.run(player_shutdown).await {
                warn!(error = %e, "scenario playback ended early");
            }
        });
    }

    // 9. Serve until interrupted.
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("ctrl-c received, shutting down"),
        Err(e) => warn!(error = %e, "ctrl-c handler failed, shutting down"),
    }

    // 10. Drain: the bridge fails outstanding records, then the session
    // and journal are released.
    let _ = shutdown_tx.send(());
    match bridge_task.await {
        Ok(bridge) => info!(
            pending = bridge.pending_len(),
            "bridge drained"
        ),
        Err(e) => warn!(error = %e, "bridge task join failed"),
    }
    session.close().await;
    let summary = journal.finish();
    info!(
        bus_rx = summary.bus_rx,
        bus_tx = summary.bus_tx,
        dispatch_tx = summary.dispatch_tx,
        dispatch_rx = summary.dispatch_rx,
        tasks_assigned = summary.tasks_assigned,
        errors = summary.errors,
        "journal summary"
    );

    Ok(())
}
