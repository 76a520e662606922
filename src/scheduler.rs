//! Periodic background jobs
//!
//! Each job runs on its own tokio interval until the shutdown channel flips.
//! A failed run is logged and the next tick tries again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::errors::Result;
use crate::services::AppServices;
use crate::telegram::NotificationOutbox;

pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    job: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("Job '{}' scheduled every {:?}", name, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = job().await {
                        warn!("Job '{}' failed: {}", name, e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Job '{}' stopped", name);
    })
}

/// Start the event, challenge and (when given) outbox jobs
pub fn spawn_jobs(
    services: &AppServices,
    outbox: Option<Arc<NotificationOutbox>>,
    config: &SchedulerConfig,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(3);

    let events = services.events.clone();
    let ending_soon = chrono::Duration::minutes(config.ending_soon_minutes);
    handles.push(spawn_periodic(
        "event-lifecycle",
        Duration::from_secs(config.event_interval_secs),
        shutdown.clone(),
        move || {
            let events = events.clone();
            async move {
                let now = Utc::now();
                let closed = events.close_due_events(now).await?;
                let warned = events.notify_ending_soon(now, ending_soon).await?;
                if closed > 0 || warned > 0 {
                    info!("Events: {} closed, {} ending soon", closed, warned);
                }
                Ok(())
            }
        },
    ));

    let challenges = services.challenges.clone();
    let pending_ttl = chrono::Duration::hours(config.challenge_pending_hours);
    handles.push(spawn_periodic(
        "challenge-expiry",
        Duration::from_secs(config.challenge_interval_secs),
        shutdown.clone(),
        move || {
            let challenges = challenges.clone();
            async move {
                let expired = challenges.expire_pending(Utc::now(), pending_ttl).await?;
                if expired > 0 {
                    info!("Challenges: {} expired", expired);
                }
                Ok(())
            }
        },
    ));

    if let Some(outbox) = outbox {
        handles.push(spawn_periodic(
            "notification-outbox",
            Duration::from_secs(config.outbox_interval_secs),
            shutdown,
            move || {
                let outbox = outbox.clone();
                async move { outbox.run_once().await.map(|_| ()) }
            },
        ));
    }

    handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_periodic_job_runs_and_stops() {
        let runs = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(false);

        let counter = runs.clone();
        let handle = spawn_periodic("test", Duration::from_secs(1), rx, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        // The first tick fires immediately
        for _ in 0..50 {
            if runs.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(runs.load(Ordering::SeqCst) >= 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("job should stop")
            .unwrap();
    }
}
