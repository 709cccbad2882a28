//! Periodic health checks and the Down/Up state machine that drives
//! alerts and delayed automatic restarts.
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::HealthStatus;
use super::probe::Prober;
use super::scheduler::PendingAutoRestart;
use crate::config::MonitorConfig;
use crate::notifications::NotificationService;
use crate::registry::{MonitoredTarget, ServerRecord, TargetRegistry};
use crate::remediation::{AutoJobReservation, RemediationController};

#[derive(Debug, Clone)]
pub struct CheckerSettings {
    pub check_interval: Duration,
    pub auto_restart_delay: Duration,
    /// Cancel a scheduled restart when every target of its server is back up.
    pub cancel_on_recovery: bool,
}

impl CheckerSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            check_interval: Duration::from_secs(config.check_interval_seconds),
            auto_restart_delay: Duration::from_secs(config.auto_restart_delay_seconds),
            cancel_on_recovery: config.cancel_on_recovery,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub url: String,
    pub from: HealthStatus,
    pub to: HealthStatus,
}

type PendingMap = HashMap<String, PendingAutoRestart>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct HealthChecker {
    registry: Arc<TargetRegistry>,
    prober: Arc<dyn Prober>,
    controller: Arc<RemediationController>,
    notifications: Arc<NotificationService>,
    settings: CheckerSettings,
    statuses: Mutex<HashMap<String, HealthStatus>>,
    // server address -> scheduled restart
    pending: Arc<Mutex<PendingMap>>,
}

impl HealthChecker {
    pub fn new(
        registry: Arc<TargetRegistry>,
        prober: Arc<dyn Prober>,
        controller: Arc<RemediationController>,
        notifications: Arc<NotificationService>,
        settings: CheckerSettings,
    ) -> Self {
        Self {
            registry,
            prober,
            controller,
            notifications,
            settings,
            statuses: Mutex::new(HashMap::new()),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Status as of the last completed cycle.
    pub fn status_of(&self, url: &str) -> HealthStatus {
        lock(&self.statuses).get(url).copied().unwrap_or_default()
    }

    pub fn has_pending_restart(&self, address: &str) -> bool {
        lock(&self.pending).contains_key(address)
    }

    /// Fresh probe for the status command; cached state is neither read nor updated.
    pub async fn query_status(&self, url: &str) -> HealthStatus {
        let result = self.prober.probe(url).await;
        if let Err(e) = &result {
            debug!(%url, error = %e, "On-demand probe failed.");
        }
        HealthStatus::from_probe(&result)
    }

    /// Probes every target once and applies the resulting transitions.
    pub async fn run_cycle(&self) -> Vec<StatusChange> {
        let targets = self.registry.targets();
        let results = join_all(targets.iter().map(|target| async move {
            (target, self.prober.probe(&target.url).await)
        }))
        .await;

        let changes: Vec<(&MonitoredTarget, StatusChange)> = {
            let mut statuses = lock(&self.statuses);
            results
                .into_iter()
                .filter_map(|(target, result)| {
                    if let Err(e) = &result {
                        warn!(url = %target.url, error = %e, "Probe failed.");
                    }
                    let to = HealthStatus::from_probe(&result);
                    let from = statuses.insert(target.url.clone(), to).unwrap_or_default();
                    (from != to).then(|| {
                        (
                            target,
                            StatusChange {
                                url: target.url.clone(),
                                from,
                                to,
                            },
                        )
                    })
                })
                .collect()
        };

        for (target, change) in &changes {
            info!(
                url = %change.url,
                from = %change.from,
                to = %change.to,
                "Target status changed."
            );
            match (change.from, change.to) {
                (_, HealthStatus::Down) => self.handle_down(target).await,
                (HealthStatus::Down, HealthStatus::Up) => self.handle_recovery(target).await,
                _ => {}
            }
        }

        changes.into_iter().map(|(_, change)| change).collect()
    }

    async fn handle_down(&self, target: &MonitoredTarget) {
        let server = match self.registry.resolve_server(&target.address) {
            Ok(server) => server.clone(),
            Err(e) => {
                error!(url = %target.url, error = %e, "Down target has no server record.");
                return;
            }
        };

        match self.controller.reserve_auto(&server.address) {
            Some(reservation) => {
                // Scheduled first so a stalled chat transport cannot hold back the restart.
                self.schedule_auto_restart(server.clone(), reservation);
                self.notifications
                    .alert_down(&target.url, &server, Some(self.settings.auto_restart_delay))
                    .await;
            }
            None => {
                debug!(
                    url = %target.url,
                    address = %server.address,
                    "Automatic restart already outstanding for server."
                );
                self.notifications
                    .alert_down(&target.url, &server, None)
                    .await;
            }
        }
    }

    async fn handle_recovery(&self, target: &MonitoredTarget) {
        let server = match self.registry.resolve_server(&target.address) {
            Ok(server) => server,
            Err(e) => {
                error!(url = %target.url, error = %e, "Recovered target has no server record.");
                return;
            }
        };
        if self.settings.cancel_on_recovery {
            self.cancel_if_server_recovered(server);
        }
        self.notifications.recovered(&target.url, server).await;
    }

    fn cancel_if_server_recovered(&self, server: &ServerRecord) {
        let still_down = {
            let statuses = lock(&self.statuses);
            self.registry
                .targets_on(&server.address)
                .any(|t| statuses.get(&t.url) == Some(&HealthStatus::Down))
        };
        if still_down {
            debug!(
                address = %server.address,
                "Other targets on server still down, keeping scheduled restart."
            );
            return;
        }
        if self.cancel_pending(&server.address) {
            info!(address = %server.address, "Server recovered before its scheduled restart.");
        }
    }

    fn schedule_auto_restart(&self, server: ServerRecord, reservation: AutoJobReservation) {
        let job_id = reservation.job_id();
        let address = server.address.clone();
        let controller = Arc::clone(&self.controller);
        let pending = Arc::clone(&self.pending);

        let on_fire = async move {
            // Once fired, recovery can no longer cancel this job.
            remove_pending(&pending, &server.address, job_id);
            controller.run_auto(&server, reservation).await;
        };

        // Held across spawn and insert so a zero delay cannot fire before the entry exists.
        let mut pending_guard = lock(&self.pending);
        let restart =
            PendingAutoRestart::schedule(job_id, self.settings.auto_restart_delay, on_fire);
        if let Some(previous) = pending_guard.insert(address.clone(), restart) {
            warn!(
                %address,
                job_id = %previous.job_id(),
                "Replaced a scheduled restart that was still registered."
            );
            drop(previous.cancel());
        }
    }

    /// Cancels the scheduled restart for `address`, if any.
    pub fn cancel_pending(&self, address: &str) -> bool {
        let removed = lock(&self.pending).remove(address);
        match removed {
            Some(restart) => {
                drop(restart.cancel());
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let drained: Vec<(String, PendingAutoRestart)> = lock(&self.pending).drain().collect();
        for (address, restart) in drained {
            debug!(
                %address,
                job_id = %restart.job_id(),
                "Cancelling scheduled restart on shutdown."
            );
            drop(restart.cancel());
        }
    }

    /// Runs a check cycle every `check_interval` until shutdown is signalled.
    pub async fn start(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_seconds = self.settings.check_interval.as_secs(),
            targets = self.registry.targets().len(),
            "Health checker started."
        );
        let mut interval = tokio::time::interval(self.settings.check_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    info!("Shutdown signal received, stopping health checker.");
                    self.cancel_all();
                    break;
                }

                _ = interval.tick() => {
                    let changes = self.run_cycle().await;
                    debug!(changes = changes.len(), "Check cycle complete.");
                }
            }
        }
    }
}

fn remove_pending(pending: &Mutex<PendingMap>, address: &str, job_id: Uuid) {
    let mut pending_guard = lock(pending);
    if pending_guard
        .get(address)
        .is_some_and(|restart| restart.job_id() == job_id)
    {
        pending_guard.remove(address);
    }
}
