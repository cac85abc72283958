use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;

use crate::events::{Event, EventKind, EventSink};
use crate::metrics::{Metric, MetricSink};
use crate::policy::{Policy, RemediationActionSpec};
use crate::provider::{Resource, ResourceProvider};
use crate::state::{RemediationRecord, StateStore};

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_INITIAL_BACKOFF: StdDuration = StdDuration::from_secs(4);
const RETRY_MAX_BACKOFF: StdDuration = StdDuration::from_secs(10);

/// Drives the `(resource, policy)` remediation state machine: Clean →
/// Pending → Warned → Remediating → Clean (spec §4.5). Owns no state of its
/// own — the [`StateStore`] is the durable source of truth so a restart
/// resumes mid-timer instead of forgetting in-flight violations.
pub struct Controller {
    provider: Arc<dyn ResourceProvider>,
    state: Arc<StateStore>,
    events: Arc<dyn EventSink>,
    metrics: Arc<dyn MetricSink>,
}

impl Controller {
    pub fn new(
        provider: Arc<dyn ResourceProvider>,
        state: Arc<StateStore>,
        events: Arc<dyn EventSink>,
        metrics: Arc<dyn MetricSink>,
    ) -> Self {
        Controller {
            provider,
            state,
            events,
            metrics,
        }
    }

    /// Process one evaluation tick's worth of violators for `policy`.
    /// Never returns an error for a single resource's remediation failure —
    /// those are recorded as events/metrics and logged, not propagated,
    /// since one stuck resource must not stall the rest of the fleet.
    pub async fn reconcile(&self, policy: &Policy, violators: &[Resource]) {
        let violator_keys: std::collections::HashSet<String> = violators
            .iter()
            .map(|r| record_key(r, &policy.id))
            .collect();

        for resource in violators {
            self.handle_violation(policy, resource).await;
        }

        self.garbage_collect_stale_records(policy, &violator_keys).await;
    }

    async fn handle_violation(&self, policy: &Policy, resource: &Resource) {
        let key = record_key(resource, &policy.id);
        let timing = policy.remediation_action.timing();

        let Some(timing) = timing else {
            // No timing configured: remediate immediately, every tick.
            self.apply_with_retry(policy, resource, false).await;
            return;
        };

        let existing = self.state.get(&key).await;

        let Some(mut record) = existing else {
            let record = RemediationRecord {
                policy_id: policy.id.clone(),
                first_violation: Utc::now(),
                warnings_sent: Vec::new(),
            };
            if let Err(e) = self.state.insert_and_save(key, record).await {
                tracing::warn!(error = %e, "state_save_failed");
            }
            self.emit(
                policy,
                resource,
                EventKind::PolicyViolationDetected,
                "violation detected".to_string(),
            );
            self.metrics.record(&Metric {
                policy_id: policy.id.clone(),
                resource_id: resource.id.clone(),
                action: "violation_detected",
                status: "pending",
                duration_seconds: None,
            });
            return;
        };

        let elapsed = Utc::now()
            .signed_duration_since(record.first_violation)
            .to_std()
            .unwrap_or(StdDuration::ZERO);

        if let Some(warning_threshold) = timing.warning_threshold
            && elapsed >= warning_threshold.as_std()
            && !record.warnings_sent.iter().any(|w| w == "warning_sent")
        {
            record.warnings_sent.push("warning_sent".to_string());
            if let Err(e) = self.state.insert_and_save(key.clone(), record.clone()).await {
                tracing::warn!(error = %e, "state_save_failed");
            }
            self.emit(
                policy,
                resource,
                EventKind::PolicyViolationWarning,
                "warning sent".to_string(),
            );
            self.metrics.record(&Metric {
                policy_id: policy.id.clone(),
                resource_id: resource.id.clone(),
                action: "violation_warning",
                status: "warning",
                duration_seconds: None,
            });
        }

        if elapsed >= timing.delay.as_std() {
            self.apply_with_retry(policy, resource, true).await;
        }
    }

    async fn apply_with_retry(&self, policy: &Policy, resource: &Resource, timed: bool) {
        let key = record_key(resource, &policy.id);
        let started = std::time::Instant::now();

        let mut attempt = 0;
        let mut backoff = RETRY_INITIAL_BACKOFF;
        let outcome = loop {
            attempt += 1;
            match self.provider.apply(resource, &policy.remediation_action).await {
                Ok(()) => break Ok(()),
                Err(e) if attempt >= RETRY_ATTEMPTS => break Err(e),
                Err(e) => {
                    tracing::warn!(
                        policy_id = %policy.id,
                        resource_id = %resource.id,
                        attempt,
                        error = %e,
                        "remediation_attempt_failed_retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, RETRY_MAX_BACKOFF);
                }
            }
        };

        let duration = started.elapsed().as_secs_f64();
        let action_kind = policy.remediation_action.kind();
        let metric_action = if timed { "remediation" } else { "immediate_remediation" };
        let event_kind = if timed {
            EventKind::PolicyRemediation
        } else {
            EventKind::ImmediateRemediation
        };

        match outcome {
            Ok(()) => {
                if let Err(e) = self.state.remove_and_save(&key).await {
                    tracing::warn!(error = %e, "state_save_failed");
                }
                self.emit(policy, resource, event_kind, format!("{action_kind} applied"));
                self.metrics.record(&Metric {
                    policy_id: policy.id.clone(),
                    resource_id: resource.id.clone(),
                    action: metric_action,
                    status: "success",
                    duration_seconds: Some(duration),
                });
            }
            Err(e) => {
                tracing::error!(
                    policy_id = %policy.id,
                    resource_id = %resource.id,
                    error = %e,
                    "remediation_failed_after_retries"
                );
                self.emit(
                    policy,
                    resource,
                    EventKind::RemediationError,
                    format!("{action_kind} failed: {e}"),
                );
                self.metrics.record(&Metric {
                    policy_id: policy.id.clone(),
                    resource_id: resource.id.clone(),
                    action: metric_action,
                    status: "failed",
                    duration_seconds: Some(duration),
                });
            }
        }
    }

    /// Drop state-store records for resources this policy no longer flags
    /// as violators — they've returned to Clean. Resolved open question:
    /// the Python source leaked these records forever. Batches every stale
    /// key for this policy into one `remove_all_and_save` transaction
    /// rather than one save per key.
    async fn garbage_collect_stale_records(
        &self,
        policy: &Policy,
        violator_keys: &std::collections::HashSet<String>,
    ) {
        let stale: Vec<String> = self
            .state
            .keys_for_policy(&policy.id)
            .await
            .into_iter()
            .filter(|key| !violator_keys.contains(key))
            .collect();

        if let Err(e) = self.state.remove_all_and_save(&stale).await {
            tracing::warn!(error = %e, "state_save_failed");
        }
    }

    fn emit(&self, policy: &Policy, resource: &Resource, kind: EventKind, message: String) {
        self.events.emit(&Event {
            policy_id: policy.id.clone(),
            resource_id: resource.id.clone(),
            kind,
            message,
        });
    }
}

fn record_key(resource: &Resource, policy_id: &str) -> String {
    format!("{}:{}", resource.key(), policy_id)
}
