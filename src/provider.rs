use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::policy::{RemediationActionSpec, Scope};

/// Core-opaque cloud resource. Field navigation goes through
/// [`ResourceProvider::resolve_field`] rather than a hardcoded struct shape,
/// since the shape differs by cloud provider and resource type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    pub id: String,
    pub resource_type: String,
    pub attributes: serde_json::Value,
}

impl Resource {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>, attributes: serde_json::Value) -> Self {
        Resource {
            id: id.into(),
            resource_type: resource_type.into(),
            attributes,
        }
    }

    /// `"{id}:{type}"` — the resource key used by both the cache and the
    /// state store, matching the original source's `_get_resource_key`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.id, self.resource_type)
    }
}

/// A resolved scope ready to hand to a provider's listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeDescriptor {
    ManagementGroup(String),
    Subscription(String),
    All,
}

impl From<&Scope> for ScopeDescriptor {
    fn from(scope: &Scope) -> Self {
        match scope {
            Scope::ManagementGroup(id) => ScopeDescriptor::ManagementGroup(id.clone()),
            Scope::Subscription(id) => ScopeDescriptor::Subscription(id.clone()),
            Scope::All => ScopeDescriptor::All,
        }
    }
}

/// Capability object abstracting over a concrete cloud backend. The engine
/// and controller never branch on provider identity — any implementation of
/// this trait is interchangeable.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn list_by_scope(&self, scope: &ScopeDescriptor) -> anyhow::Result<Vec<Resource>>;

    async fn apply(&self, resource: &Resource, action: &RemediationActionSpec) -> anyhow::Result<()>;

    /// Resolve a dotted field path (`"tags.env"`) against a resource's
    /// attributes. Any missing segment along the path yields `None`.
    fn resolve_field<'a>(&self, resource: &'a Resource, path: &str) -> Option<&'a serde_json::Value> {
        let mut current = &resource.attributes;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current)
    }
}

/// Azure Resource Graph-backed provider. The concrete SDK integration is out
/// of scope for this core; this stub exists so the daemon can be wired end
/// to end against a real `--provider azure` flag without the engine caring.
pub struct AzureResourceProvider {
    #[allow(dead_code)]
    client: reqwest::Client,
}

impl AzureResourceProvider {
    pub fn new() -> Self {
        AzureResourceProvider {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for AzureResourceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceProvider for AzureResourceProvider {
    async fn list_by_scope(&self, _scope: &ScopeDescriptor) -> anyhow::Result<Vec<Resource>> {
        anyhow::bail!("azure resource listing is not implemented for this build")
    }

    async fn apply(&self, _resource: &Resource, _action: &RemediationActionSpec) -> anyhow::Result<()> {
        anyhow::bail!("azure remediation is not implemented for this build")
    }
}

/// AWS Config / Resource Groups Tagging API-backed provider. Same status as
/// [`AzureResourceProvider`] — a placeholder for a real SDK integration.
pub struct AwsResourceProvider {
    #[allow(dead_code)]
    client: reqwest::Client,
}

impl AwsResourceProvider {
    pub fn new() -> Self {
        AwsResourceProvider {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for AwsResourceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceProvider for AwsResourceProvider {
    async fn list_by_scope(&self, _scope: &ScopeDescriptor) -> anyhow::Result<Vec<Resource>> {
        anyhow::bail!("aws resource listing is not implemented for this build")
    }

    async fn apply(&self, _resource: &Resource, _action: &RemediationActionSpec) -> anyhow::Result<()> {
        anyhow::bail!("aws remediation is not implemented for this build")
    }
}
