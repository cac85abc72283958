use serde::Serialize;

/// Structured notification emitted at each remediation state transition
/// (spec §6). Sinks are pluggable and never fatal — a sink failure is
/// logged and swallowed, it must never abort an evaluation tick.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub policy_id: String,
    pub resource_id: String,
    pub kind: EventKind,
    pub message: String,
}

/// Matches the event type vocabulary spec §6 names verbatim, so a sink
/// forwarding these onto an external bus doesn't need a translation layer.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum EventKind {
    PolicyViolationDetected,
    PolicyViolationWarning,
    PolicyRemediation,
    ImmediateRemediation,
    RemediationError,
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// Default sink: structured log lines via `tracing`. Mirrors the teacher's
/// `info!(workload = %.., ..)` field style.
pub struct LoggingEventSink;

impl EventSink for LoggingEventSink {
    fn emit(&self, event: &Event) {
        tracing::info!(
            policy_id = %event.policy_id,
            resource_id = %event.resource_id,
            kind = ?event.kind,
            message = %event.message,
            "policy_event"
        );
    }
}
