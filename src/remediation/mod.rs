pub mod controller;
pub mod job;
pub mod tracker;

pub use controller::RemediationController;
pub use job::{Origin, RemediationJob, ServiceOutcome, ServiceRestart};
pub use tracker::{AutoJobReservation, OutstandingJobs};

/// Restart order: web server, database, application runtime.
pub const DEFAULT_SERVICES: [&str; 3] = ["nginx", "postgresql", "php7.4-fpm"];

pub fn default_services() -> Vec<String> {
    DEFAULT_SERVICES.iter().map(|s| s.to_string()).collect()
}

pub fn restart_command(service: &str) -> String {
    format!("systemctl restart {service}")
}
