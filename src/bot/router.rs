use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use super::events::{InboundEvent, OperatorCommand};
use crate::monitoring::HealthChecker;
use crate::notifications::{NotificationService, StatusEntry};
use crate::registry::TargetRegistry;
use crate::remediation::RemediationController;

/// Turns one operator event into calls on the health checker or the
/// remediation controller. Holds no mutable state.
pub struct CommandRouter {
    registry: Arc<TargetRegistry>,
    checker: Arc<HealthChecker>,
    controller: Arc<RemediationController>,
    notifications: Arc<NotificationService>,
    allowed_chat_id: String,
}

impl CommandRouter {
    pub fn new(
        registry: Arc<TargetRegistry>,
        checker: Arc<HealthChecker>,
        controller: Arc<RemediationController>,
        notifications: Arc<NotificationService>,
        allowed_chat_id: &str,
    ) -> Self {
        Self {
            registry,
            checker,
            controller,
            notifications,
            allowed_chat_id: allowed_chat_id.to_string(),
        }
    }

    pub async fn handle(&self, event: InboundEvent) {
        if event.chat_id() != self.allowed_chat_id {
            warn!(chat_id = %event.chat_id(), "Ignoring event from unauthorized chat.");
            return;
        }

        match event {
            InboundEvent::Command { chat_id, command } => {
                info!(%chat_id, ?command, "Operator command received.");
                match command {
                    OperatorCommand::CheckStatus => self.check_status(&chat_id).await,
                    OperatorCommand::RestartMenu => self.notifications.restart_menu(&chat_id).await,
                    OperatorCommand::Help => self.notifications.help(&chat_id).await,
                }
            }
            InboundEvent::ButtonPress {
                callback_id, data, ..
            } => self.restart_from_button(&callback_id, &data).await,
        }
    }

    /// Probes every target concurrently and replies with one line per target.
    async fn check_status(&self, chat_id: &str) {
        let entries = join_all(self.registry.targets().iter().map(|target| async move {
            let server_name = self
                .registry
                .resolve_server(&target.address)
                .map(|s| s.name.clone())
                .unwrap_or_else(|_| target.address.clone());
            StatusEntry {
                url: target.url.clone(),
                server_name,
                status: self.checker.query_status(&target.url).await,
            }
        }))
        .await;
        self.notifications.status_report(chat_id, &entries).await;
    }

    async fn restart_from_button(&self, callback_id: &str, data: &str) {
        let action = match self.notifications.actions().decode(data) {
            Ok(action) => action.clone(),
            Err(e) => {
                warn!(data, error = %e, "Rejected button press.");
                self.notifications
                    .acknowledge(callback_id, "Unknown action")
                    .await;
                return;
            }
        };
        let server = match self.registry.resolve_server(&action.address) {
            Ok(server) => server.clone(),
            Err(e) => {
                warn!(address = %action.address, error = %e, "Button refers to an unknown server.");
                self.notifications
                    .acknowledge(callback_id, "Unknown server")
                    .await;
                return;
            }
        };

        info!(service = %action.service, address = %server.address, "Manual restart requested.");
        self.notifications
            .acknowledge(
                callback_id,
                &format!("Restarting {} on {}", action.service, server.name),
            )
            .await;
        self.controller.restart_manual(&server, &action.service).await;
    }
}
