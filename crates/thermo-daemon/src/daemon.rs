//! Main thermo daemon: the control loop and the status endpoint

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use thermo_core::{Config, FanGroup};
use thermo_rl::{Collaborators, CycleReport, CycleRunner, Decision, RunnerStats};

use crate::actuator::LiquidctlActuator;
use crate::event_log::CsvEventLog;
use crate::metrics;
use crate::notifier::MailNotifier;
use crate::sensors::HostSensors;
use crate::store::JsonTableStore;

/// Snapshot served on `/api/v1/status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub status: &'static str,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub emergency: bool,
    pub table_entries: usize,
    pub table_states: usize,
    pub average_reward: f64,
    pub fan_radiator: Option<u8>,
    pub fan_chassis: Option<u8>,
    pub last_decision: Option<Decision>,
    pub stats: RunnerStats,
    /// Set when the status endpoint could not be started
    pub status_endpoint_error: Option<String>,
}

impl StatusSnapshot {
    fn new() -> Self {
        Self {
            status: "starting",
            version: env!("CARGO_PKG_VERSION"),
            started_at: Utc::now(),
            last_cycle_at: None,
            emergency: false,
            table_entries: 0,
            table_states: 0,
            average_reward: 0.0,
            fan_radiator: None,
            fan_chassis: None,
            last_decision: None,
            stats: RunnerStats::default(),
            status_endpoint_error: None,
        }
    }

    fn update(&mut self, runner: &CycleRunner, report: &CycleReport) {
        let engine = runner.engine();
        self.status = "running";
        self.last_cycle_at = Some(Utc::now());
        self.emergency = engine.is_emergency();
        self.table_entries = engine.table().len();
        self.table_states = engine.table().state_count();
        self.average_reward = engine.average_reward();
        self.fan_radiator = runner.applied_speed(FanGroup::Radiator);
        self.fan_chassis = runner.applied_speed(FanGroup::Chassis);
        if report.decision.is_some() {
            self.last_decision.clone_from(&report.decision);
        }
        self.stats = runner.stats().clone();
    }
}

/// Shared state for API handlers
#[derive(Clone)]
pub struct DaemonState {
    pub status: Arc<RwLock<StatusSnapshot>>,
}

/// Main thermo daemon
pub struct ThermoDaemon {
    config: Config,
    runner: Mutex<CycleRunner>,
    state: DaemonState,
    shutdown: tokio::sync::broadcast::Sender<()>,
}

impl ThermoDaemon {
    /// Build the collaborators and load the value table
    pub async fn new(config: Config, reset_table: bool) -> Result<Self> {
        let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
        let timeout = Duration::from_secs(config.devices.command_timeout_seconds);

        let store = JsonTableStore::new(&config.persistence.table_path);
        let events = CsvEventLog::new(&config.persistence.history_csv_path);
        info!("Value table: {}", store.path().display());
        info!("Cycle history: {}", events.path().display());

        let collaborators = Collaborators {
            sensors: Box::new(HostSensors::new(&config.devices)),
            actuator: Box::new(LiquidctlActuator::new(&config.devices)),
            notifier: Box::new(MailNotifier::new(&config.notifications, timeout)),
            store: Box::new(store),
            events: Box::new(events),
        };

        let runner = CycleRunner::bootstrap(config.control.clone(), collaborators, reset_table)
            .await
            .with_lifecycle_notices(config.notifications.notify_lifecycle);

        Ok(Self {
            config,
            runner: Mutex::new(runner),
            state: DaemonState {
                status: Arc::new(RwLock::new(StatusSnapshot::new())),
            },
            shutdown: shutdown_tx,
        })
    }

    /// Run the control loop until shutdown is signalled, then persist
    pub async fn run(&self) -> Result<()> {
        let mut shutdown_rx = self.shutdown.subscribe();

        let server = if self.config.daemon.status_enabled {
            self.spawn_status_server().await
        } else {
            None
        };

        let mut runner = self.runner.lock().await;
        runner.announce().await;

        let interval = Duration::from_secs(self.config.control.schedule.interval_seconds);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Control loop running every {:?}", interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = runner.run_cycle().await;
                    metrics::record_cycle(&report, runner.engine().table().len());
                    self.state.status.write().await.update(&runner, &report);
                }
                _ = shutdown_rx.recv() => break,
            }
        }

        let stats = runner.shutdown().await;
        self.state.status.write().await.status = "stopped";
        info!(
            cycles = stats.cycles,
            skipped = stats.skipped_cycles,
            emergencies = stats.emergency_entries,
            "Control loop stopped"
        );

        if let Some(server) = server {
            if let Err(e) = server.await {
                warn!("Status server task failed: {}", e);
            }
        }
        Ok(())
    }

    /// Signal the control loop and the status server to stop
    pub fn shutdown(&self) {
        info!("Shutting down daemon...");
        let _ = self.shutdown.send(());
    }

    /// Send a crash notice through the configured notifier
    pub async fn report_failure(&self, reason: &str) {
        self.runner.lock().await.report_failure(reason).await;
    }

    /// Start the status endpoint. A bind failure is logged and recorded in
    /// the snapshot; the control loop then runs without the endpoint.
    async fn spawn_status_server(&self) -> Option<tokio::task::JoinHandle<()>> {
        let listener = match self.bind_status_listener().await {
            Ok(listener) => listener,
            Err(e) => {
                warn!("Status endpoint unavailable, continuing without it: {:#}", e);
                self.state.status.write().await.status_endpoint_error = Some(format!("{e:#}"));
                return None;
            }
        };

        let app = create_router(self.state.clone());
        let mut shutdown_rx = self.shutdown.subscribe();

        Some(tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(e) = served {
                error!("Status endpoint error: {}", e);
            }
        }))
    }

    async fn bind_status_listener(&self) -> Result<TcpListener> {
        let addr = self.config.daemon.status_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind status endpoint on {addr}"))?;
        info!("Status endpoint listening on {}", listener.local_addr()?);
        Ok(listener)
    }
}

/// Create the status router
fn create_router(state: DaemonState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/status", get(get_status))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn get_status(State(state): State<DaemonState>) -> Json<StatusSnapshot> {
    Json(state.status.read().await.clone())
}

async fn get_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::encode_metrics(),
    )
}
