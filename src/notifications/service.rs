use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::actions::ActionTable;
use super::models::OutgoingMessage;
use super::senders::NotificationSender;
use super::senders::telegram::escape_markdown_v2 as esc;
use crate::monitoring::HealthStatus;
use crate::registry::ServerRecord;
use crate::remediation::{RemediationJob, ServiceOutcome};

/// One line of a status report.
#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub url: String,
    pub server_name: String,
    pub status: HealthStatus,
}

/// Formats every operator-facing message and hands it to the sender.
/// Transport failures are logged here and never reach the caller.
pub struct NotificationService {
    sender: Arc<dyn NotificationSender>,
    actions: Arc<ActionTable>,
}

impl NotificationService {
    pub fn new(sender: Arc<dyn NotificationSender>, actions: Arc<ActionTable>) -> Self {
        Self { sender, actions }
    }

    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }

    async fn dispatch(&self, kind: &'static str, message: OutgoingMessage) {
        match self.sender.send(&message).await {
            Ok(()) => info!(kind, chat_id = ?message.chat_id, "Notification sent."),
            Err(e) => error!(kind, error = %e, "Failed to send notification."),
        }
    }

    /// Outage alert with the server's restart buttons. `auto_restart_in` is
    /// `None` when an automatic job for the server is already outstanding.
    pub async fn alert_down(
        &self,
        url: &str,
        server: &ServerRecord,
        auto_restart_in: Option<Duration>,
    ) {
        let follow_up = match auto_restart_in {
            Some(delay) => format!("Auto-restarting services in {} seconds.", delay.as_secs()),
            None => "An automatic restart is already pending for this server.".to_string(),
        };
        let text = format!(
            "🚨 *Alert*: {}",
            esc(&format!(
                "The website {url} on {} is down. {follow_up}",
                server.name
            ))
        );
        let message =
            OutgoingMessage::new(text).with_keyboard(self.actions.keyboard_for(&server.address));
        self.dispatch("alert_down", message).await;
    }

    pub async fn recovered(&self, url: &str, server: &ServerRecord) {
        let text = format!(
            "✅ {}",
            esc(&format!("The website {url} on {} is back up.", server.name))
        );
        self.dispatch("recovered", OutgoingMessage::new(text)).await;
    }

    /// Single summary for an automatic job, one line per service.
    pub async fn auto_restart_summary(&self, job: &RemediationJob) {
        let mut text = format!(
            "🔄 *{}*\n",
            esc(&format!("Auto-restarted all services on {}", job.server.name))
        );
        for restart in &job.services {
            let line = match &restart.outcome {
                ServiceOutcome::Succeeded => format!("✅ {}", esc(&restart.service)),
                ServiceOutcome::Failed(reason) => {
                    format!("❌ {}", esc(&format!("{}: {reason}", restart.service)))
                }
                ServiceOutcome::Pending => format!("⏳ {}", esc(&restart.service)),
            };
            text.push('\n');
            text.push_str(&line);
        }
        self.dispatch("auto_restart_summary", OutgoingMessage::new(text))
            .await;
    }

    /// Outcome of an operator-initiated restart (first service of the job).
    pub async fn manual_restart_outcome(&self, job: &RemediationJob) {
        let Some(restart) = job.services.first() else {
            return;
        };
        let text = match &restart.outcome {
            ServiceOutcome::Succeeded => format!(
                "🔄 {}",
                esc(&format!(
                    "Successfully restarted {} on {}",
                    restart.service, job.server.name
                ))
            ),
            ServiceOutcome::Failed(reason) => format!(
                "❌ {}",
                esc(&format!(
                    "Failed to restart {} on {}: {reason}",
                    restart.service, job.server.name
                ))
            ),
            ServiceOutcome::Pending => format!(
                "⏳ {}",
                esc(&format!(
                    "Restart of {} on {} did not finish",
                    restart.service, job.server.name
                ))
            ),
        };
        self.dispatch("manual_restart_outcome", OutgoingMessage::new(text))
            .await;
    }

    pub async fn status_report(&self, chat_id: &str, entries: &[StatusEntry]) {
        let text = format_status_report(entries);
        self.dispatch("status_report", OutgoingMessage::new(text).to_chat(chat_id))
            .await;
    }

    pub async fn restart_menu(&self, chat_id: &str) {
        let message = OutgoingMessage::new(esc("Select a service to restart:"))
            .to_chat(chat_id)
            .with_keyboard(self.actions.menu());
        self.dispatch("restart_menu", message).await;
    }

    pub async fn help(&self, chat_id: &str) {
        let text = format!(
            "*Website monitor*\n\n{}\n{}",
            esc("/check-status - probe every website now"),
            esc("/restart-service - restart a service on a server"),
        );
        self.dispatch("help", OutgoingMessage::new(text).to_chat(chat_id))
            .await;
    }

    pub async fn acknowledge(&self, callback_id: &str, text: &str) {
        if let Err(e) = self.sender.answer_callback(callback_id, text).await {
            error!(error = %e, callback_id, "Failed to answer callback query.");
        }
    }
}

pub fn format_status_report(entries: &[StatusEntry]) -> String {
    let mut text = String::from("*Website Status Check*\n");
    for entry in entries {
        let (glyph, word) = match entry.status {
            HealthStatus::Up => ("✅", "up"),
            HealthStatus::Down => ("🚨", "down"),
            HealthStatus::Unknown => ("❔", "unknown"),
        };
        text.push('\n');
        text.push_str(&format!(
            "{glyph} *{}* on {}",
            esc(&format!("The website {} is {word}.", entry.url)),
            esc(&entry.server_name)
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remediation::{Origin, default_services};
    use crate::testing::{RecordingSender, server};
    use uuid::Uuid;

    fn service_with(sender: &Arc<RecordingSender>) -> NotificationService {
        let actions = ActionTable::new(&[server("10.0.0.1", "SERVER1")], &default_services());
        NotificationService::new(sender.clone(), Arc::new(actions))
    }

    #[tokio::test]
    async fn test_alert_carries_delay_and_buttons() {
        let sender = Arc::new(RecordingSender::default());
        let service = service_with(&sender);
        service
            .alert_down(
                "http://10.0.0.1",
                &server("10.0.0.1", "SERVER1"),
                Some(Duration::from_secs(10)),
            )
            .await;
        let sent = sender.messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("SERVER1"));
        assert!(sent[0].text.contains("in 10 seconds"));
        assert_eq!(sent[0].keyboard[0].len(), 3);
        assert_eq!(sent[0].chat_id, None);
    }

    #[tokio::test]
    async fn test_auto_summary_is_single_message() {
        let sender = Arc::new(RecordingSender::default());
        let service = service_with(&sender);
        let mut job = RemediationJob::new(
            Uuid::new_v4(),
            &server("10.0.0.1", "SERVER1"),
            &default_services(),
            Origin::Automatic,
        );
        job.services[0].outcome = ServiceOutcome::Succeeded;
        job.services[1].outcome = ServiceOutcome::Failed("exit status 1".to_string());
        job.services[2].outcome = ServiceOutcome::Succeeded;
        service.auto_restart_summary(&job).await;

        let sent = sender.messages();
        assert_eq!(sent.len(), 1);
        let lines: Vec<&str> = sent[0].text.lines().collect();
        assert!(lines[0].contains("SERVER1"));
        assert_eq!(lines[2], "✅ nginx");
        assert_eq!(lines[3], "❌ postgresql: exit status 1");
        assert_eq!(lines[4], "✅ php7\\.4\\-fpm");
    }

    #[test]
    fn test_status_report_lines() {
        let text = format_status_report(&[
            StatusEntry {
                url: "http://a.example".to_string(),
                server_name: "SERVER1".to_string(),
                status: HealthStatus::Up,
            },
            StatusEntry {
                url: "http://b.example".to_string(),
                server_name: "SERVER2".to_string(),
                status: HealthStatus::Down,
            },
        ]);
        let lines: Vec<&str> = text.lines().skip(2).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("✅") && lines[0].ends_with("on SERVER1"));
        assert!(lines[1].starts_with("🚨") && lines[1].ends_with("on SERVER2"));
    }

    #[tokio::test]
    async fn test_send_failure_is_swallowed() {
        let sender = Arc::new(RecordingSender::failing());
        let service = service_with(&sender);
        service.recovered("http://10.0.0.1", &server("10.0.0.1", "SERVER1")).await;
        service.acknowledge("cb", "ok").await;
        assert!(sender.messages().is_empty());
    }
}
