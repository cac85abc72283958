//! In-memory [`ResourceProvider`] fake for unit and integration tests.
//! Not compiled into release builds of the binary; exists purely so
//! `engine`/`controller`/`scheduler` tests and the `tests/` integration
//! suite share one fixture implementation instead of each inventing one.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::policy::RemediationActionSpec;
use crate::provider::{Resource, ResourceProvider, ScopeDescriptor};

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedAction {
    pub resource_id: String,
    pub action: String,
}

/// A fake cloud backend holding a fixed resource list and recording every
/// `apply` call it receives. `list_by_scope` ignores the scope and returns
/// the whole fixture set, matching how the real providers would once a
/// scope has already been resolved to a listing call. Also counts
/// `list_by_scope` invocations so cache-reuse tests can assert the
/// provider was actually hit (or not hit) rather than only comparing
/// results, which would pass even if the cache never worked.
pub struct InMemoryResourceProvider {
    resources: Vec<Resource>,
    applied: Mutex<Vec<AppliedAction>>,
    fail_apply: bool,
    list_calls: AtomicUsize,
}

impl InMemoryResourceProvider {
    pub fn new(resources: Vec<Resource>) -> Self {
        InMemoryResourceProvider {
            resources,
            applied: Mutex::new(Vec::new()),
            fail_apply: false,
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(resources: Vec<Resource>) -> Self {
        InMemoryResourceProvider {
            resources,
            applied: Mutex::new(Vec::new()),
            fail_apply: true,
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn applied_actions(&self) -> Vec<AppliedAction> {
        self.applied.lock().unwrap().clone()
    }

    /// Number of times `list_by_scope` has been called so far.
    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceProvider for InMemoryResourceProvider {
    async fn list_by_scope(&self, _scope: &ScopeDescriptor) -> anyhow::Result<Vec<Resource>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.resources.clone())
    }

    async fn apply(&self, resource: &Resource, action: &RemediationActionSpec) -> anyhow::Result<()> {
        if self.fail_apply {
            anyhow::bail!("simulated apply failure for {}", resource.id);
        }
        self.applied.lock().unwrap().push(AppliedAction {
            resource_id: resource.id.clone(),
            action: action.kind().to_string(),
        });
        Ok(())
    }
}
