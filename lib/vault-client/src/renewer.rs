use crate::VaultError;
use crate::client::VaultClient;
use crate::lease::Lease;
use crate::models::Secret;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const DEFAULT_REFRESH_THRESHOLD: f64 = 0.75;
const EVENT_BUFFER: usize = 16;

pub struct RenewerInput {
    /// Secret carrying the auth lease to keep alive, usually from `renew_self`
    pub secret: Secret,
    /// Increment in seconds requested on every renewal
    pub increment: u64,
    /// Fraction of the lease after which a renewal is attempted
    pub refresh_threshold: f64,
}

impl RenewerInput {
    pub fn new(secret: Secret, increment: u64) -> Self {
        Self {
            secret,
            increment,
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
        }
    }
}

#[derive(Debug)]
pub enum RenewEvent {
    /// Token renewed, carries the renew-self response
    Renewed(Secret),
    /// Renewal stopped: `Some` on a failed renewal, `None` when the lease
    /// cannot be extended any further
    Done(Option<VaultError>),
}

/// Keeps a token lease alive by calling renew-self before it runs out
pub struct Renewer {
    client: VaultClient,
    lease: Lease,
    increment: u64,
    refresh_threshold: f64,
}

impl Renewer {
    pub fn new(client: VaultClient, input: RenewerInput) -> Result<Self, VaultError> {
        if !input.refresh_threshold.is_finite() {
            return Err(VaultError::InvalidRefreshThreshold(input.refresh_threshold));
        }
        let lease = renewed_lease(&input.secret).ok_or(VaultError::NotRenewable)?;

        Ok(Self {
            client,
            lease,
            increment: input.increment,
            refresh_threshold: input.refresh_threshold.clamp(0.0, 1.0),
        })
    }

    pub fn lease(&self) -> &Lease {
        &self.lease
    }

    /// Spawns the renewal task on the current tokio runtime
    pub fn start(self) -> RenewerHandle {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (stop_tx, stop_rx) = oneshot::channel();

        let task = tokio::spawn(self.run(events_tx, stop_rx));

        RenewerHandle {
            events: events_rx,
            stop: Some(stop_tx),
            task,
        }
    }

    async fn run(mut self, events: mpsc::Sender<RenewEvent>, mut stop: oneshot::Receiver<()>) {
        loop {
            let sleep = tokio::time::sleep(self.lease.until_refresh(self.refresh_threshold));

            tokio::select! {
                _ = &mut stop => {
                    tracing::debug!("Renewer stopped");
                    return;
                }
                _ = sleep => {}
            }

            let done = match self.client.renew_self(self.increment).await {
                Ok(secret) => match renewed_lease(&secret) {
                    Some(lease) => {
                        tracing::debug!(lease_duration = ?lease.lease_duration, "Token renewed");
                        self.lease = lease;
                        if events.send(RenewEvent::Renewed(secret)).await.is_err() {
                            return;
                        }
                        continue;
                    }
                    None => {
                        tracing::info!("Token lease can no longer be extended");
                        let _ = events.send(RenewEvent::Renewed(secret)).await;
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!("Token renewal failed: {}", e);
                    Some(e)
                }
            };

            let _ = events.send(RenewEvent::Done(done)).await;
            return;
        }
    }
}

fn renewed_lease(secret: &Secret) -> Option<Lease> {
    secret.renewable_auth().map(Lease::from_auth)
}

/// Handle to a running renewer
pub struct RenewerHandle {
    events: mpsc::Receiver<RenewEvent>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RenewerHandle {
    /// Next renewal event, `None` once the renewer has finished
    pub async fn next(&mut self) -> Option<RenewEvent> {
        self.events.recv().await
    }

    pub fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for RenewerHandle {
    fn drop(&mut self) {
        if self.stop.is_some() {
            self.task.abort();
        }
    }
}
