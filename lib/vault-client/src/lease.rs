use crate::models::SecretAuth;
use std::time::{Duration, Instant};

/// Auth lease as observed at a point in time
#[derive(Debug, Clone)]
pub struct Lease {
    pub lease_duration: Duration,
    pub renewable: bool,
    pub obtained_at: Instant,
}

impl Lease {
    pub fn new(lease_duration: Duration, renewable: bool) -> Self {
        Self {
            lease_duration,
            renewable,
            obtained_at: Instant::now(),
        }
    }

    /// Lease of an auth block, starting now
    pub fn from_auth(auth: &SecretAuth) -> Self {
        Self::new(Duration::from_secs(auth.lease_duration), auth.renewable)
    }

    /// Time left until `threshold` of the lease has elapsed
    pub fn until_refresh(&self, threshold: f64) -> Duration {
        let threshold_duration =
            Duration::from_secs_f64(self.lease_duration.as_secs_f64() * threshold);
        threshold_duration.saturating_sub(self.obtained_at.elapsed())
    }
}
