use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

type JobMap = HashMap<String, Uuid>;

/// Outstanding automatic jobs, at most one per server address.
/// An entry covers both the scheduled delay and the running restart.
#[derive(Debug, Clone, Default)]
pub struct OutstandingJobs {
    jobs: Arc<Mutex<JobMap>>,
}

fn lock(jobs: &Mutex<JobMap>) -> MutexGuard<'_, JobMap> {
    // The map holds plain data; a panic elsewhere cannot leave it half-updated.
    jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl OutstandingJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the server for a new automatic job. Returns `None` if one is
    /// already outstanding; check and insert happen under one lock.
    pub fn reserve(&self, address: &str) -> Option<AutoJobReservation> {
        let mut jobs_guard = lock(&self.jobs);
        if let Some(existing) = jobs_guard.get(address) {
            debug!(
                %address,
                job_id = %existing,
                "Automatic job already outstanding, suppressing duplicate."
            );
            return None;
        }
        let job_id = Uuid::new_v4();
        jobs_guard.insert(address.to_string(), job_id);
        info!(%address, %job_id, "Reserved automatic remediation job.");
        Some(AutoJobReservation {
            address: address.to_string(),
            job_id,
            jobs: Arc::clone(&self.jobs),
        })
    }

    pub fn is_outstanding(&self, address: &str) -> bool {
        lock(&self.jobs).contains_key(address)
    }

    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Proof of an outstanding automatic job. Dropping it releases the server,
/// whether the job completed, was cancelled, or its task was aborted.
#[derive(Debug)]
pub struct AutoJobReservation {
    address: String,
    job_id: Uuid,
    jobs: Arc<Mutex<JobMap>>,
}

impl AutoJobReservation {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }
}

impl Drop for AutoJobReservation {
    fn drop(&mut self) {
        let mut jobs_guard = lock(&self.jobs);
        if jobs_guard.get(&self.address) == Some(&self.job_id) {
            jobs_guard.remove(&self.address);
            info!(
                address = %self.address,
                job_id = %self.job_id,
                "Released automatic remediation job."
            );
        } else {
            warn!(
                address = %self.address,
                job_id = %self.job_id,
                "Reservation was no longer registered on release."
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_reservation_is_refused() {
        let jobs = OutstandingJobs::new();
        let first = jobs.reserve("10.0.0.1");
        assert!(first.is_some());
        assert!(jobs.reserve("10.0.0.1").is_none());
        // Other servers are independent.
        let other = jobs.reserve("10.0.0.2");
        assert!(other.is_some());
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn test_drop_releases_server() {
        let jobs = OutstandingJobs::new();
        let reservation = jobs.reserve("10.0.0.1").unwrap();
        assert!(jobs.is_outstanding("10.0.0.1"));
        assert_eq!(reservation.address(), "10.0.0.1");
        drop(reservation);
        assert!(!jobs.is_outstanding("10.0.0.1"));
        assert!(jobs.reserve("10.0.0.1").is_some());
    }

    #[test]
    fn test_concurrent_reservations_yield_one_winner() {
        let jobs = OutstandingJobs::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let jobs = jobs.clone();
                std::thread::spawn(move || jobs.reserve("10.0.0.1"))
            })
            .collect();
        let reservations: Vec<AutoJobReservation> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(reservations.len(), 1);
    }
}
