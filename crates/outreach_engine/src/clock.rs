use std::time::Duration;

use chrono::{DateTime, Utc};

/// Clock and timer seam. The dispatcher and harvester never sleep or
/// read the time directly; tests inject a manual implementation so
/// nothing in the suite waits on real time.
#[async_trait::async_trait]
pub trait Scheduler: Send + Sync {
    async fn wait(&self, duration: Duration);
    fn now(&self) -> DateTime<Utc>;
}

/// Production scheduler backed by the tokio timer and the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait::async_trait]
impl Scheduler for TokioScheduler {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
