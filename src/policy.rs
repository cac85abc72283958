use serde::{Deserialize, Serialize};

use crate::duration::{Duration, deserialize_duration, deserialize_duration_opt};

/* ============================= CONDITIONS ============================= */

/// A single boolean predicate over a resource's attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    Exists,
    NotExists,
}

/* ============================= SCOPE ============================= */

/// The cloud-side subset a policy lists resources over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    ManagementGroup(String),
    Subscription(String),
    All,
}

impl Scope {
    /// The cache key this scope resolves to (spec §3: `"all"`, `"mg:<id>"`, `"sub:<id>"`).
    pub fn cache_key(&self) -> String {
        match self {
            Scope::ManagementGroup(id) => format!("mg:{id}"),
            Scope::Subscription(id) => format!("sub:{id}"),
            Scope::All => "all".to_string(),
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::All
    }
}

/* ============================= REMEDIATION ACTION ============================= */

/// Grace-period / warning timing attached to a remediation action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Timing {
    #[serde(deserialize_with = "deserialize_duration")]
    pub delay: Duration,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub warning_threshold: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RemediationActionSpec {
    Modify {
        parameters: serde_json::Map<String, serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timing: Option<Timing>,
    },
    Delete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timing: Option<Timing>,
    },
    Tag {
        parameters: serde_json::Map<String, serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timing: Option<Timing>,
    },
}

impl RemediationActionSpec {
    pub fn timing(&self) -> Option<&Timing> {
        match self {
            RemediationActionSpec::Modify { timing, .. } => timing.as_ref(),
            RemediationActionSpec::Delete { timing } => timing.as_ref(),
            RemediationActionSpec::Tag { timing, .. } => timing.as_ref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RemediationActionSpec::Modify { .. } => "modify",
            RemediationActionSpec::Delete { .. } => "delete",
            RemediationActionSpec::Tag { .. } => "tag",
        }
    }
}

/* ============================= POLICY ============================= */

/// Immutable, validated representation of a single policy (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub resource_type: String,
    pub evaluation_frequency_minutes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub remediation_action: RemediationActionSpec,
}

impl Policy {
    pub fn scope_or_default(&self) -> Scope {
        self.scope.clone().unwrap_or(Scope::All)
    }

    /// Validate the invariants spec §4.1 and §3 require at load time.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.id.trim().is_empty() {
            anyhow::bail!("policy has an empty id");
        }
        if self.resource_type.trim().is_empty() {
            anyhow::bail!("policy '{}' has an empty resource_type", self.id);
        }
        if self.evaluation_frequency_minutes < 1 {
            anyhow::bail!(
                "policy '{}' has evaluation_frequency_minutes < 1",
                self.id
            );
        }
        for condition in &self.conditions {
            match condition.operator {
                ConditionOperator::Exists | ConditionOperator::NotExists => {}
                _ => {
                    if condition.value.is_none() {
                        anyhow::bail!(
                            "policy '{}' condition on '{}' requires a value for operator {:?}",
                            self.id,
                            condition.field,
                            condition.operator
                        );
                    }
                }
            }
        }
        if let Some(timing) = self.remediation_action.timing()
            && let Some(warning_threshold) = timing.warning_threshold
            && warning_threshold >= timing.delay
        {
            anyhow::bail!(
                "policy '{}' has warning_threshold >= delay",
                self.id
            );
        }
        Ok(())
    }
}

/* ============================= FILE FORMAT ============================= */

#[derive(Debug, Deserialize)]
struct PolicyFile {
    policies: Vec<Policy>,
}

/// Load and validate all policies from a JSON policy file (spec §4.1, §6).
///
/// A single malformed policy — bad duration string, missing required field,
/// `warning_threshold >= delay` — rejects the entire load; the daemon must
/// not start with a partially loaded policy set.
pub fn load_policies_from_str(contents: &str) -> anyhow::Result<Vec<Policy>> {
    let file: PolicyFile =
        serde_json::from_str(contents).map_err(|e| anyhow::anyhow!("invalid policy file: {e}"))?;

    let mut seen_ids = std::collections::HashSet::new();
    for policy in &file.policies {
        policy.validate()?;
        if !seen_ids.insert(policy.id.clone()) {
            anyhow::bail!("duplicate policy id: {}", policy.id);
        }
    }

    Ok(file.policies)
}

/// Load and validate policies from a file on disk.
pub async fn load_policies(path: &std::path::Path) -> anyhow::Result<Vec<Policy>> {
    tracing::info!(path = %path.display(), "policy_load_start");
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read policy file {}: {e}", path.display()))?;
    let policies = load_policies_from_str(&contents)?;
    tracing::info!(count = policies.len(), "policy_load_complete");
    Ok(policies)
}

/* ============================= TESTS ============================= */

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_policy_json(delay: &str, warning: Option<&str>) -> String {
        let timing = match warning {
            Some(w) => format!(r#""timing": {{"delay": "{delay}", "warningThreshold": "{w}"}}"#),
            None => format!(r#""timing": {{"delay": "{delay}"}}"#),
        };
        format!(
            r#"{{
                "policies": [
                    {{
                        "id": "p1",
                        "name": "Tag dev resources",
                        "description": "desc",
                        "resourceType": "Cloud/VM",
                        "evaluationFrequencyMinutes": 60,
                        "conditions": [
                            {{"field": "tags.env", "operator": "notExists"}}
                        ],
                        "remediationAction": {{
                            "type": "tag",
                            "parameters": {{"env": "dev"}},
                            {timing}
                        }}
                    }}
                ]
            }}"#
        )
    }

    #[test]
    fn test_load_valid_policy() {
        let json = sample_policy_json("7d", Some("5d"));
        let policies = load_policies_from_str(&json).unwrap();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].id, "p1");
        assert_eq!(policies[0].resource_type, "Cloud/VM");
    }

    #[test]
    fn test_malformed_duration_fails_whole_load() {
        let json = sample_policy_json("7x", None);
        assert!(load_policies_from_str(&json).is_err());
    }

    #[test]
    fn test_warning_threshold_must_be_less_than_delay() {
        let json = sample_policy_json("5d", Some("7d"));
        assert!(load_policies_from_str(&json).is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let single = sample_policy_json("7d", None);
        let object = single_policy_object(&single);
        let doc = format!(r#"{{"policies": [{object}, {object}]}}"#);
        assert!(load_policies_from_str(&doc).is_err());
    }

    fn single_policy_object(wrapped: &str) -> String {
        let value: serde_json::Value = serde_json::from_str(wrapped).unwrap();
        serde_json::to_string(&value["policies"][0]).unwrap()
    }

    #[test]
    fn test_zero_cadence_rejected() {
        let mut value: serde_json::Value =
            serde_json::from_str(&sample_policy_json("7d", None)).unwrap();
        value["policies"][0]["evaluationFrequencyMinutes"] = serde_json::json!(0);
        assert!(load_policies_from_str(&value.to_string()).is_err());
    }

    #[test]
    fn test_scope_cache_keys() {
        assert_eq!(Scope::All.cache_key(), "all");
        assert_eq!(Scope::Subscription("sub-1".to_string()).cache_key(), "sub:sub-1");
        assert_eq!(
            Scope::ManagementGroup("mg-1".to_string()).cache_key(),
            "mg:mg-1"
        );
    }

    #[test]
    fn test_empty_conditions_list_is_valid() {
        let mut value: serde_json::Value =
            serde_json::from_str(&sample_policy_json("7d", None)).unwrap();
        value["policies"][0]["conditions"] = serde_json::json!([]);
        let policies = load_policies_from_str(&value.to_string()).unwrap();
        assert!(policies[0].conditions.is_empty());
    }

    #[test]
    fn test_exists_operator_requires_no_value() {
        let mut value: serde_json::Value =
            serde_json::from_str(&sample_policy_json("7d", None)).unwrap();
        value["policies"][0]["conditions"] = serde_json::json!([
            {"field": "tags.owner", "operator": "exists"}
        ]);
        let policies = load_policies_from_str(&value.to_string()).unwrap();
        assert_eq!(policies[0].conditions[0].value, None);
    }

    #[test]
    fn test_equals_without_value_rejected() {
        let mut value: serde_json::Value =
            serde_json::from_str(&sample_policy_json("7d", None)).unwrap();
        value["policies"][0]["conditions"] = serde_json::json!([
            {"field": "tags.owner", "operator": "equals"}
        ]);
        assert!(load_policies_from_str(&value.to_string()).is_err());
    }

    #[test]
    fn test_immediate_policy_no_timing() {
        let json = r#"{
            "policies": [{
                "id": "p2",
                "name": "immediate",
                "resourceType": "Cloud/VM",
                "evaluationFrequencyMinutes": 10,
                "conditions": [],
                "remediationAction": {"type": "delete"}
            }]
        }"#;
        let policies = load_policies_from_str(json).unwrap();
        assert!(policies[0].remediation_action.timing().is_none());
    }
}
