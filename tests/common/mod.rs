use std::sync::Arc;
use std::time::Duration;

use cloud_policy_daemon::cache::ResourceCache;
use cloud_policy_daemon::controller::Controller;
use cloud_policy_daemon::engine::Engine;
use cloud_policy_daemon::events::LoggingEventSink;
use cloud_policy_daemon::metrics::PrometheusMetricSink;
use cloud_policy_daemon::policy::{
    Condition, ConditionOperator, Policy, RemediationActionSpec, Timing,
};
use cloud_policy_daemon::provider::Resource;
use cloud_policy_daemon::state::StateStore;
use cloud_policy_daemon::testing::InMemoryResourceProvider;

pub fn vm(id: &str, attributes: serde_json::Value) -> Resource {
    Resource::new(id, "Cloud/VM", attributes)
}

pub fn tag_policy(id: &str, condition: Condition, timing: Option<Timing>) -> Policy {
    Policy {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        resource_type: "Cloud/VM".to_string(),
        evaluation_frequency_minutes: 60,
        scope: None,
        conditions: vec![condition],
        remediation_action: RemediationActionSpec::Tag {
            parameters: serde_json::json!({ "env": "dev" }).as_object().unwrap().clone(),
            timing,
        },
    }
}

pub fn no_owner_condition() -> Condition {
    Condition {
        field: "tags.owner".to_string(),
        operator: ConditionOperator::NotExists,
        value: None,
    }
}

pub async fn state_store() -> (Arc<StateStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(StateStore::load(dir.path().join("state.json")).await);
    (store, dir)
}

pub fn engine_with_provider(provider: Arc<InMemoryResourceProvider>, ttl: Duration) -> Engine {
    let cache = Arc::new(ResourceCache::new(ttl));
    Engine::new(provider, cache)
}

pub fn controller_with_provider(
    provider: Arc<InMemoryResourceProvider>,
    state: Arc<StateStore>,
) -> Controller {
    Controller::new(
        provider,
        state,
        Arc::new(LoggingEventSink),
        Arc::new(PrometheusMetricSink),
    )
}
