use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::service::UserService;

const PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Periodic upstream liveness gate (spec.md §4.4). A background ticker
/// calls `check_now` every 5s; any handler whose upstream call fails with a
/// transport error calls it again inline. The source's `checkServices`
/// double-invokes the probe per tick — per spec.md §9's Open Question, that
/// is treated as a transcription bug and not reproduced: each distinct
/// failure triggers exactly one `check_now`.
pub struct Probe {
    alive: AtomicBool,
    client: Arc<dyn UserService>,
}

impl Probe {
    pub fn new(client: Arc<dyn UserService>) -> Self {
        Self {
            alive: AtomicBool::new(false),
            client,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Pings the upstream service and updates the liveness flag.
    pub async fn check_now(&self) -> bool {
        let alive = self.client.session_count().await.is_ok();
        let was_alive = self.alive.swap(alive, Ordering::AcqRel);

        if alive != was_alive {
            if alive {
                info!("upstream user service is back up");
            } else {
                warn!("upstream user service appears to be down");
            }
        }

        alive
    }

    /// Spawns the 5s ticker; stops once `shutdown` fires.
    pub fn spawn_ticker(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let probe = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROBE_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        probe.check_now().await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::UserServiceClient;

    fn client() -> Arc<dyn UserService> {
        Arc::new(UserServiceClient::new("127.0.0.1", 1).unwrap())
    }

    #[tokio::test]
    async fn starts_not_alive() {
        let probe = Probe::new(client());
        assert!(!probe.is_alive());
    }

    #[tokio::test]
    async fn check_now_reports_down_on_connection_refused() {
        // Port 1 should have nothing listening in the test sandbox.
        let probe = Probe::new(client());
        assert!(!probe.check_now().await);
        assert!(!probe.is_alive());
    }
}
