use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use uuid::Uuid;

use crate::registry::ServerRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Automatic,
    Manual,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Automatic => write!(f, "automatic"),
            Origin::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
    Pending,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRestart {
    pub service: String,
    pub outcome: ServiceOutcome,
}

/// One logical "restart these services on this server" action.
#[derive(Debug, Clone)]
pub struct RemediationJob {
    pub id: Uuid,
    pub server: ServerRecord,
    pub origin: Origin,
    pub services: Vec<ServiceRestart>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RemediationJob {
    pub fn new(id: Uuid, server: &ServerRecord, service_names: &[String], origin: Origin) -> Self {
        Self {
            id,
            server: server.clone(),
            origin,
            services: service_names
                .iter()
                .map(|service| ServiceRestart {
                    service: service.clone(),
                    outcome: ServiceOutcome::Pending,
                })
                .collect(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.services
            .iter()
            .all(|s| s.outcome != ServiceOutcome::Pending)
    }

    pub fn all_succeeded(&self) -> bool {
        self.services
            .iter()
            .all(|s| s.outcome == ServiceOutcome::Succeeded)
    }

    /// Wall-clock run time, once the job has finished.
    pub fn elapsed(&self) -> Option<TimeDelta> {
        self.finished_at.map(|finished| finished - self.started_at)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ServiceRestart> {
        self.services
            .iter()
            .filter(|s| matches!(s.outcome, ServiceOutcome::Failed(_)))
    }
}
