use std::sync::Arc;

use crate::cache::ResourceCache;
use crate::policy::{Condition, ConditionOperator, Policy};
use crate::provider::{Resource, ResourceProvider, ScopeDescriptor};

/// Evaluates a single policy against the resource universe: resolve scope,
/// refresh or reuse the cached listing, filter by resource type, then keep
/// only resources matching every condition (spec §4.4 — conjunctive `all()`,
/// matching the original source's `_evaluate_conditions`).
pub struct Engine {
    provider: Arc<dyn ResourceProvider>,
    cache: Arc<ResourceCache>,
}

impl Engine {
    pub fn new(provider: Arc<dyn ResourceProvider>, cache: Arc<ResourceCache>) -> Self {
        Engine { provider, cache }
    }

    /// Return every resource in scope that violates `policy` — i.e. matches
    /// all of its conditions.
    pub async fn evaluate(&self, policy: &Policy) -> anyhow::Result<Vec<Resource>> {
        let scope = policy.scope_or_default();
        let cache_key = scope.cache_key();

        let resources = match self.cache.get(&cache_key) {
            Some(cached) => cached,
            None => {
                let descriptor = ScopeDescriptor::from(&scope);
                let fetched = self.provider.list_by_scope(&descriptor).await?;
                self.cache.set(&cache_key, fetched.clone());
                fetched
            }
        };

        let violators = resources
            .into_iter()
            .filter(|r| r.resource_type == policy.resource_type)
            .filter(|r| self.matches_all(r, &policy.conditions))
            .collect();

        Ok(violators)
    }

    fn matches_all(&self, resource: &Resource, conditions: &[Condition]) -> bool {
        conditions
            .iter()
            .all(|condition| self.matches_one(resource, condition))
    }

    fn matches_one(&self, resource: &Resource, condition: &Condition) -> bool {
        let actual = self.provider.resolve_field(resource, &condition.field);

        match condition.operator {
            ConditionOperator::Exists => actual.is_some(),
            ConditionOperator::NotExists => actual.is_none(),
            ConditionOperator::Equals => match actual {
                Some(value) => condition.value.as_ref() == Some(value),
                None => false,
            },
            ConditionOperator::NotEquals => match actual {
                Some(value) => condition.value.as_ref() != Some(value),
                None => true,
            },
            ConditionOperator::Contains => match actual {
                Some(value) => value_contains(value, condition.value.as_ref()),
                None => false,
            },
        }
    }
}

/// `contains` semantics (resolved open question): arrays check element
/// membership, objects check key membership (matching Python's `in`
/// operator over a dict, which the original source relies on), strings
/// check substring, anything else is never a match.
fn value_contains(haystack: &serde_json::Value, needle: Option<&serde_json::Value>) -> bool {
    let Some(needle) = needle else { return false };

    match haystack {
        serde_json::Value::Array(items) => items.contains(needle),
        serde_json::Value::Object(map) => match needle.as_str() {
            Some(key) => map.contains_key(key),
            None => false,
        },
        serde_json::Value::String(s) => match needle.as_str() {
            Some(substr) => s.contains(substr),
            None => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryResourceProvider;
    use std::time::Duration;

    fn condition(field: &str, operator: ConditionOperator, value: Option<serde_json::Value>) -> Condition {
        Condition {
            field: field.to_string(),
            operator,
            value,
        }
    }

    fn vm(id: &str, attrs: serde_json::Value) -> Resource {
        Resource::new(id, "Cloud/VM", attrs)
    }

    fn policy_with_conditions(conditions: Vec<Condition>) -> Policy {
        use crate::policy::RemediationActionSpec;
        Policy {
            id: "p1".to_string(),
            name: "test".to_string(),
            description: String::new(),
            resource_type: "Cloud/VM".to_string(),
            evaluation_frequency_minutes: 60,
            scope: None,
            conditions,
            remediation_action: RemediationActionSpec::Delete { timing: None },
        }
    }

    fn engine_with(resources: Vec<Resource>) -> Engine {
        let provider = Arc::new(InMemoryResourceProvider::new(resources));
        let cache = Arc::new(ResourceCache::new(Duration::from_secs(300)));
        Engine::new(provider, cache)
    }

    #[tokio::test]
    async fn test_filters_by_resource_type() {
        let resources = vec![
            vm("r1", serde_json::json!({})),
            Resource::new("r2", "Cloud/Disk", serde_json::json!({})),
        ];
        let engine = engine_with(resources);
        let policy = policy_with_conditions(vec![]);
        let violators = engine.evaluate(&policy).await.unwrap();
        assert_eq!(violators.len(), 1);
        assert_eq!(violators[0].id, "r1");
    }

    #[tokio::test]
    async fn test_exists_condition() {
        let resources = vec![
            vm("r1", serde_json::json!({ "tags": { "owner": "a" } })),
            vm("r2", serde_json::json!({ "tags": {} })),
        ];
        let engine = engine_with(resources);
        let policy = policy_with_conditions(vec![condition(
            "tags.owner",
            ConditionOperator::NotExists,
            None,
        )]);
        let violators = engine.evaluate(&policy).await.unwrap();
        assert_eq!(violators.len(), 1);
        assert_eq!(violators[0].id, "r2");
    }

    #[tokio::test]
    async fn test_equals_condition() {
        let resources = vec![
            vm("r1", serde_json::json!({ "tags": { "env": "prod" } })),
            vm("r2", serde_json::json!({ "tags": { "env": "dev" } })),
        ];
        let engine = engine_with(resources);
        let policy = policy_with_conditions(vec![condition(
            "tags.env",
            ConditionOperator::Equals,
            Some(serde_json::json!("dev")),
        )]);
        let violators = engine.evaluate(&policy).await.unwrap();
        assert_eq!(violators.len(), 1);
        assert_eq!(violators[0].id, "r2");
    }

    #[tokio::test]
    async fn test_conjunctive_conditions_require_all() {
        let resources = vec![
            vm("r1", serde_json::json!({ "tags": { "env": "dev" } })),
            vm("r2", serde_json::json!({ "tags": { "env": "dev", "owner": "a" } })),
        ];
        let engine = engine_with(resources);
        let policy = policy_with_conditions(vec![
            condition("tags.env", ConditionOperator::Equals, Some(serde_json::json!("dev"))),
            condition("tags.owner", ConditionOperator::Exists, None),
        ]);
        let violators = engine.evaluate(&policy).await.unwrap();
        assert_eq!(violators.len(), 1);
        assert_eq!(violators[0].id, "r2");
    }

    #[test]
    fn test_contains_array_membership() {
        let haystack = serde_json::json!(["a", "b", "c"]);
        assert!(value_contains(&haystack, Some(&serde_json::json!("b"))));
        assert!(!value_contains(&haystack, Some(&serde_json::json!("z"))));
    }

    #[test]
    fn test_contains_object_key_membership() {
        let haystack = serde_json::json!({ "env": "dev" });
        assert!(value_contains(&haystack, Some(&serde_json::json!("env"))));
        assert!(!value_contains(&haystack, Some(&serde_json::json!("owner"))));
    }

    #[test]
    fn test_contains_string_substring() {
        let haystack = serde_json::json!("hello world");
        assert!(value_contains(&haystack, Some(&serde_json::json!("world"))));
        assert!(!value_contains(&haystack, Some(&serde_json::json!("bye"))));
    }

    #[test]
    fn test_contains_absent_needle_is_false() {
        let haystack = serde_json::json!(["a"]);
        assert!(!value_contains(&haystack, None));
    }

    #[tokio::test]
    async fn test_cache_reused_across_evaluations() {
        let resources = vec![vm("r1", serde_json::json!({}))];
        let provider = Arc::new(InMemoryResourceProvider::new(resources));
        let cache = Arc::new(ResourceCache::new(Duration::from_secs(300)));
        let engine = Engine::new(provider.clone(), cache);
        let policy = policy_with_conditions(vec![]);

        engine.evaluate(&policy).await.unwrap();
        let violators = engine.evaluate(&policy).await.unwrap();

        assert_eq!(violators.len(), 1);
        assert_eq!(
            provider.list_call_count(),
            1,
            "second evaluate() within the TTL window must reuse the cached listing, not re-fetch"
        );
    }

    #[tokio::test]
    async fn test_cache_miss_after_ttl_triggers_refetch() {
        let resources = vec![vm("r1", serde_json::json!({}))];
        let provider = Arc::new(InMemoryResourceProvider::new(resources));
        let cache = Arc::new(ResourceCache::new(Duration::from_millis(10)));
        let engine = Engine::new(provider.clone(), cache);
        let policy = policy_with_conditions(vec![]);

        engine.evaluate(&policy).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        engine.evaluate(&policy).await.unwrap();

        assert_eq!(
            provider.list_call_count(),
            2,
            "a tick after TTL expiry must re-fetch rather than reuse the stale entry"
        );
    }
}
