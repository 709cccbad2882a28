pub mod checker;
pub mod probe;
pub mod scheduler;

pub use checker::{CheckerSettings, HealthChecker, StatusChange};
pub use probe::{HttpProber, ProbeError, Prober};
pub use scheduler::{PendingAutoRestart, ScheduledOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthStatus {
    #[default]
    Unknown,
    Up,
    Down,
}

impl HealthStatus {
    pub fn from_probe<E>(result: &Result<(), E>) -> Self {
        if result.is_ok() {
            HealthStatus::Up
        } else {
            HealthStatus::Down
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Unknown => write!(f, "unknown"),
            HealthStatus::Up => write!(f, "up"),
            HealthStatus::Down => write!(f, "down"),
        }
    }
}
