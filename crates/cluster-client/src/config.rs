//! Client configuration
//!
//! Poll budgets for every wait the client performs. Defaults match what a
//! cluster bootstrap normally needs; callers override fields as required.

use std::collections::HashMap;
use std::time::Duration;

use tracing::warn;

use crate::poll::PollBudget;

/// Overrides the machine readiness timeout, in whole minutes
pub const MACHINE_READY_TIMEOUT_ENV: &str = "CLUSTER_API_MACHINE_READY_TIMEOUT";

const RETRY_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const MACHINE_READY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Poll budgets used by [`crate::ClusterClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Retries of `kubectl apply` while the server is not ready
    pub kubectl_apply: PollBudget,

    /// API listability and global status checks
    pub resource_ready: PollBudget,

    /// Per-machine readiness after creation
    pub machine_ready: PollBudget,

    /// Post-delete emptiness checks
    pub resource_delete: PollBudget,

    /// Per-kind replacements for `resource_delete`, keyed by kind name
    pub delete_overrides: HashMap<String, PollBudget>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            kubectl_apply: PollBudget::new(RETRY_INTERVAL, DEFAULT_TIMEOUT),
            resource_ready: PollBudget::new(RETRY_INTERVAL, DEFAULT_TIMEOUT),
            machine_ready: PollBudget::new(RETRY_INTERVAL, MACHINE_READY_TIMEOUT),
            resource_delete: PollBudget::new(RETRY_INTERVAL, DEFAULT_TIMEOUT),
            delete_overrides: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Use `budget` when waiting for objects of `kind` to disappear
    pub fn with_delete_budget(mut self, kind: &str, budget: PollBudget) -> Self {
        self.delete_overrides.insert(kind.to_string(), budget);
        self
    }

    pub fn delete_budget_for(&self, kind: &str) -> PollBudget {
        self.delete_overrides
            .get(kind)
            .copied()
            .unwrap_or(self.resource_delete)
    }

    /// Machine readiness budget with the environment override applied
    pub fn machine_ready_budget(&self) -> PollBudget {
        self.machine_ready_budget_from(std::env::var(MACHINE_READY_TIMEOUT_ENV).ok().as_deref())
    }

    /// Machine readiness budget given the raw override value
    pub fn machine_ready_budget_from(&self, raw: Option<&str>) -> PollBudget {
        let mut budget = self.machine_ready;
        if let Some(raw) = raw {
            match raw.trim().parse::<u64>() {
                Ok(minutes) => match minutes.checked_mul(60) {
                    Some(secs) => budget.timeout = Duration::from_secs(secs),
                    None => warn!(
                        "Ignoring {}={:?}: too many minutes; using {:?}",
                        MACHINE_READY_TIMEOUT_ENV, raw, budget.timeout
                    ),
                },
                Err(e) => warn!(
                    "Ignoring {}={:?}: {}; using {:?}",
                    MACHINE_READY_TIMEOUT_ENV, raw, e, budget.timeout
                ),
            }
        }
        budget
    }
}
