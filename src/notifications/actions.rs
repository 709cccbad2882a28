//! Server-side table of restart actions offered as chat buttons.
//!
//! Buttons carry only `restart:<id>`; the id is resolved against this table,
//! so service names and URLs never have to be parsed out of callback data.
use thiserror::Error;

use super::models::InlineButton;
use crate::registry::ServerRecord;

const RESTART_PREFIX: &str = "restart:";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ActionError {
    #[error("Malformed action data: {0:?}")]
    Malformed(String),
    #[error("Unknown action id {0}")]
    UnknownId(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartAction {
    pub id: usize,
    pub service: String,
    pub address: String,
    pub server_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ActionTable {
    actions: Vec<RestartAction>,
}

/// Human label for a service unit, e.g. `php7.4-fpm` -> `PHP7.4-FPM`.
pub fn service_label(service: &str) -> String {
    match service {
        "nginx" => "Nginx".to_string(),
        "postgresql" => "PostgreSQL".to_string(),
        s if s.starts_with("php") => s.to_uppercase(),
        s => {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

impl ActionTable {
    /// One action per (server, service), servers outermost, both in the given order.
    pub fn new(servers: &[ServerRecord], services: &[String]) -> Self {
        let actions = servers
            .iter()
            .flat_map(|server| services.iter().map(move |service| (server, service)))
            .enumerate()
            .map(|(id, (server, service))| RestartAction {
                id,
                service: service.clone(),
                address: server.address.clone(),
                server_name: server.name.clone(),
            })
            .collect();
        Self { actions }
    }

    pub fn encode(action: &RestartAction) -> String {
        format!("{RESTART_PREFIX}{}", action.id)
    }

    pub fn decode(&self, data: &str) -> Result<&RestartAction, ActionError> {
        let id: usize = data
            .strip_prefix(RESTART_PREFIX)
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| ActionError::Malformed(data.to_string()))?;
        self.actions.get(id).ok_or(ActionError::UnknownId(id))
    }

    pub fn actions(&self) -> &[RestartAction] {
        &self.actions
    }

    /// Buttons for one server, used under an outage alert.
    pub fn keyboard_for(&self, address: &str) -> Vec<Vec<InlineButton>> {
        let row: Vec<InlineButton> = self
            .actions
            .iter()
            .filter(|a| a.address == address)
            .map(|a| InlineButton {
                text: format!("Restart {}", service_label(&a.service)),
                callback_data: Self::encode(a),
            })
            .collect();
        if row.is_empty() { Vec::new() } else { vec![row] }
    }

    /// Full menu: one row per server.
    pub fn menu(&self) -> Vec<Vec<InlineButton>> {
        let mut rows: Vec<Vec<InlineButton>> = Vec::new();
        let mut current_address: Option<&str> = None;
        for action in &self.actions {
            if current_address != Some(action.address.as_str()) {
                rows.push(Vec::new());
                current_address = Some(action.address.as_str());
            }
            if let Some(row) = rows.last_mut() {
                row.push(InlineButton {
                    text: format!(
                        "Restart {} on {}",
                        service_label(&action.service),
                        action.server_name
                    ),
                    callback_data: Self::encode(action),
                });
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remediation::default_services;
    use crate::testing::server;

    fn table() -> ActionTable {
        ActionTable::new(
            &[server("10.0.0.1", "SERVER1"), server("10.0.0.2", "SERVER2")],
            &default_services(),
        )
    }

    #[test]
    fn test_service_label() {
        assert_eq!(service_label("nginx"), "Nginx");
        assert_eq!(service_label("postgresql"), "PostgreSQL");
        assert_eq!(service_label("php7.4-fpm"), "PHP7.4-FPM");
        assert_eq!(service_label("redis"), "Redis");
    }

    #[test]
    fn test_decode_resolves_service_and_server() {
        let table = table();
        let action = table.decode("restart:3").unwrap();
        assert_eq!(action.service, "nginx");
        assert_eq!(action.address, "10.0.0.2");
        assert_eq!(action.server_name, "SERVER2");
    }

    #[test]
    fn test_decode_rejects_bad_data() {
        let table = table();
        assert_eq!(
            table.decode("restart_nginx_http://10.0.0.1"),
            Err(ActionError::Malformed("restart_nginx_http://10.0.0.1".to_string()))
        );
        assert_eq!(
            table.decode("restart:-1"),
            Err(ActionError::Malformed("restart:-1".to_string()))
        );
        assert_eq!(table.decode("restart:99"), Err(ActionError::UnknownId(99)));
    }

    #[test]
    fn test_menu_has_row_per_server() {
        let menu = table().menu();
        assert_eq!(menu.len(), 2);
        assert_eq!(menu[0].len(), 3);
        assert_eq!(menu[0][0].text, "Restart Nginx on SERVER1");
        assert_eq!(menu[1][2].text, "Restart PHP7.4-FPM on SERVER2");
        assert_eq!(menu[1][2].callback_data, "restart:5");
    }

    #[test]
    fn test_keyboard_for_single_server() {
        let keyboard = table().keyboard_for("10.0.0.1");
        assert_eq!(keyboard.len(), 1);
        let labels: Vec<&str> = keyboard[0].iter().map(|b| b.text.as_str()).collect();
        assert_eq!(labels, vec!["Restart Nginx", "Restart PostgreSQL", "Restart PHP7.4-FPM"]);
        assert!(table().keyboard_for("10.9.9.9").is_empty());
    }
}
