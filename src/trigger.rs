use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::manager::Manager;
use crate::messages::PollRequest;

/// Starts a poll cycle on every interval tick and every external request,
/// until the request channel closes or ctrl-c is received. Runs are spawned,
/// so overlapping requests are left to `Manager::run` to turn away.
pub async fn run_triggers(
    manager: Arc<Manager>,
    poll_interval: Duration,
    mut rx: broadcast::Receiver<PollRequest>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let request = tokio::select! {
            _ = ticker.tick() => PollRequest::Interval,
            msg = rx.recv() => match msg {
                Ok(request) => request,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Poll request receiver lagged by {}", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Poll request channel closed");
                    break;
                }
            },
            _ = &mut shutdown => {
                info!("Received ctrl-c, shutting down");
                break;
            }
        };

        debug!("Poll requested ({:?})", request);
        let manager = manager.clone();
        tokio::spawn(async move {
            manager.run().await;
        });
    }
    info!("Exiting trigger loop");
}
