use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::job::{Origin, RemediationJob, ServiceOutcome};
use super::restart_command;
use super::tracker::{AutoJobReservation, OutstandingJobs};
use crate::notifications::NotificationService;
use crate::registry::ServerRecord;
use crate::remote::CommandExecutor;

/// Restarts services on a server, one command at a time, and reports the outcome.
pub struct RemediationController {
    executor: Arc<dyn CommandExecutor>,
    notifications: Arc<NotificationService>,
    outstanding: OutstandingJobs,
    services: Vec<String>,
}

impl RemediationController {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        notifications: Arc<NotificationService>,
        services: Vec<String>,
    ) -> Self {
        Self {
            executor,
            notifications,
            outstanding: OutstandingJobs::new(),
            services,
        }
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    pub fn outstanding(&self) -> &OutstandingJobs {
        &self.outstanding
    }

    /// Claims `address` for an automatic job; `None` if one is already outstanding.
    pub fn reserve_auto(&self, address: &str) -> Option<AutoJobReservation> {
        self.outstanding.reserve(address)
    }

    /// Runs `systemctl restart` for each service in order. A failed service is
    /// recorded and the next one is still attempted.
    pub async fn restart_services(
        &self,
        job_id: Uuid,
        server: &ServerRecord,
        service_names: &[String],
        origin: Origin,
    ) -> RemediationJob {
        let mut job = RemediationJob::new(job_id, server, service_names, origin);
        info!(
            job_id = %job.id,
            address = %server.address,
            %origin,
            services = ?service_names,
            "Starting remediation job."
        );

        for restart in job.services.iter_mut() {
            let command = restart_command(&restart.service);
            restart.outcome = match self.executor.execute(server, &command).await {
                Ok(output) if output.success() => {
                    info!(
                        job_id = %job_id,
                        address = %server.address,
                        service = %restart.service,
                        "Service restarted."
                    );
                    ServiceOutcome::Succeeded
                }
                Ok(output) => {
                    let detail = output
                        .stderr
                        .lines()
                        .rev()
                        .find(|l| !l.trim().is_empty())
                        .map(|l| format!(": {}", l.trim()))
                        .unwrap_or_default();
                    warn!(
                        job_id = %job_id,
                        address = %server.address,
                        service = %restart.service,
                        exit_code = output.exit_code,
                        stderr = %output.stderr,
                        "Restart command failed on remote host."
                    );
                    ServiceOutcome::Failed(format!("exit status {}{detail}", output.exit_code))
                }
                Err(e) => {
                    error!(
                        job_id = %job_id,
                        address = %server.address,
                        service = %restart.service,
                        error = %e,
                        "Could not run restart command."
                    );
                    ServiceOutcome::Failed(e.to_string())
                }
            };
        }

        job.finished_at = Some(Utc::now());
        info!(
            job_id = %job.id,
            address = %server.address,
            all_succeeded = job.all_succeeded(),
            elapsed_ms = job.elapsed().map(|d| d.num_milliseconds()),
            "Remediation job finished."
        );
        job
    }

    /// Restarts the full service list under an automatic reservation and sends
    /// one summary. The server is released when this returns.
    pub async fn run_auto(
        &self,
        server: &ServerRecord,
        reservation: AutoJobReservation,
    ) -> RemediationJob {
        let job = self
            .restart_services(reservation.job_id(), server, &self.services, Origin::Automatic)
            .await;
        self.notifications.auto_restart_summary(&job).await;
        drop(reservation);
        job
    }

    /// Operator-initiated restart of a single service. Not subject to the
    /// automatic-job deduplication.
    pub async fn restart_manual(&self, server: &ServerRecord, service: &str) -> RemediationJob {
        let job = self
            .restart_services(
                Uuid::new_v4(),
                server,
                &[service.to_string()],
                Origin::Manual,
            )
            .await;
        self.notifications.manual_restart_outcome(&job).await;
        job
    }
}
