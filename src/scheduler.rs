use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio_util::sync::CancellationToken;

use crate::controller::Controller;
use crate::engine::Engine;
use crate::policy::Policy;

/// Recovery sleep applied after an evaluation tick errors out, before the
/// loop retries (spec §4.6) — matches the original source's `time.sleep(60)`
/// fallback in `_policy_loop`'s exception handler.
const ERROR_RECOVERY_INTERVAL: StdDuration = StdDuration::from_secs(60);

/// Runs one Tokio task per policy, each ticking at that policy's own
/// `evaluation_frequency_minutes` cadence. Policies never share a tick loop,
/// so no two evaluations of the same policy can run concurrently and a slow
/// policy never delays another's schedule.
pub struct Scheduler {
    engine: Arc<Engine>,
    controller: Arc<Controller>,
    cancellation: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(engine: Arc<Engine>, controller: Arc<Controller>) -> Self {
        Scheduler {
            engine,
            controller,
            cancellation: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Spawn one evaluation loop per policy. Call [`Scheduler::stop`] to
    /// request graceful shutdown and await every loop's exit.
    pub fn start(&mut self, policies: Vec<Policy>) {
        for policy in policies {
            let engine = self.engine.clone();
            let controller = self.controller.clone();
            let cancellation = self.cancellation.clone();

            let handle = tokio::spawn(async move {
                policy_loop(policy, engine, controller, cancellation).await;
            });

            self.tasks.push(handle);
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Signal every loop to stop and wait for them all to finish.
    pub async fn stop(self) {
        self.cancellation.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "policy_loop_task_join_failed");
            }
        }
    }
}

async fn policy_loop(
    policy: Policy,
    engine: Arc<Engine>,
    controller: Arc<Controller>,
    cancellation: CancellationToken,
) {
    let cadence = StdDuration::from_secs(policy.evaluation_frequency_minutes * 60);
    tracing::info!(policy_id = %policy.id, cadence_secs = cadence.as_secs(), "policy_loop_started");

    loop {
        match engine.evaluate(&policy).await {
            Ok(violators) => {
                crate::metrics::record_evaluation_tick(&policy.id, true);
                controller.reconcile(&policy, &violators).await;

                tokio::select! {
                    _ = tokio::time::sleep(cadence) => {}
                    _ = cancellation.cancelled() => break,
                }
            }
            Err(e) => {
                crate::metrics::record_evaluation_tick(&policy.id, false);
                tracing::error!(policy_id = %policy.id, error = %e, "policy_evaluation_failed");

                tokio::select! {
                    _ = tokio::time::sleep(ERROR_RECOVERY_INTERVAL) => {}
                    _ = cancellation.cancelled() => break,
                }
            }
        }
    }

    tracing::info!(policy_id = %policy.id, "policy_loop_stopped");
}
