use std::time::{Duration, Instant};

use log::{debug, error, warn};
use tokio::sync::{Mutex, MutexGuard};

use crate::devices::DeviceRegistry;
use crate::dispatch::ActionDispatcher;
use crate::messages::{PollReport, ScanOutcome};
use crate::presence::PresenceStateMachine;
use crate::scanner::{ScanExecutor, ScanWorker};

#[derive(Clone, Copy, Debug)]
pub struct PollSettings {
    pub timeout: Duration,
    pub check_interval: Duration,
}

/// One in-flight poll. Holding the presence guard is what makes the cycle
/// exclusive; dropping the cycle releases it on every exit path.
struct PollCycle<'a> {
    presence: MutexGuard<'a, PresenceStateMachine>,
    started: Instant,
    worker: ScanWorker,
}

pub struct Manager {
    executor: ScanExecutor,
    registry: DeviceRegistry,
    dispatcher: ActionDispatcher,
    settings: PollSettings,
    presence: Mutex<PresenceStateMachine>,
}

impl Manager {
    pub fn new(
        executor: ScanExecutor,
        registry: DeviceRegistry,
        dispatcher: ActionDispatcher,
        settings: PollSettings,
    ) -> Self {
        Manager {
            executor,
            registry,
            dispatcher,
            settings,
            presence: Mutex::new(PresenceStateMachine::new()),
        }
    }

    /// Runs a single poll cycle. Returns immediately if one is already running.
    pub async fn run(&self) -> PollReport {
        let Ok(presence) = self.presence.try_lock() else {
            warn!("Device check already in progress, skipping");
            return PollReport::Skipped;
        };

        debug!("Starting device checking process...");
        let worker = match self.executor.spawn() {
            Ok(worker) => worker,
            Err(err) => {
                error!("{}", err);
                return PollReport::Failed;
            }
        };

        let mut cycle = PollCycle {
            presence,
            started: Instant::now(),
            worker,
        };

        let output = match self.supervise(&mut cycle).await {
            ScanOutcome::Success(output) => output,
            ScanOutcome::TimedOut => {
                error!(
                    "Timeout waiting for the device checking process to finish after {:?}",
                    self.settings.timeout
                );
                cycle.worker.terminate();
                return PollReport::TimedOut;
            }
            ScanOutcome::Failure(err) => {
                error!("Device check failed: {}", err);
                return PollReport::Failed;
            }
        };

        let present = self.registry.match_output(&output);
        debug!("Device checker found {} device(s)", present.len());

        match cycle.presence.observe(&present) {
            Some(transition) => {
                self.dispatcher.dispatch(&transition).await;
                PollReport::Transitioned(transition)
            }
            None => {
                debug!("Presence unchanged ({})", cycle.presence.state());
                PollReport::Unchanged(cycle.presence.state())
            }
        }
    }

    // Re-checks the worker every `check_interval`, yielding to the runtime in
    // between, until it finishes or the timeout budget is spent.
    async fn supervise(&self, cycle: &mut PollCycle<'_>) -> ScanOutcome {
        loop {
            if let Some(outcome) = cycle.worker.check().await {
                return outcome;
            }
            if cycle.started.elapsed() >= self.settings.timeout {
                return ScanOutcome::TimedOut;
            }
            tokio::time::sleep(self.settings.check_interval).await;
        }
    }
}
