//! Provider registry - deterministic candidate ordering

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::{ProviderConfig, ProviderEntry};
use crate::domain::DomainError;
use crate::domain::resilience::{CircuitBreaker, CircuitState, Clock};
use crate::domain::telemetry::TelemetrySink;
use crate::domain::usage::{CostTracker, ProviderEfficiency};

/// Per-request knobs that influence candidate ordering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSelection {
    /// Restrict the candidates to this provider
    pub provider_override: Option<String>,
    /// Overrides the configured cost-aware default
    pub cost_aware: Option<bool>,
}

/// Health and efficiency view of one provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub id: String,
    pub display_name: String,
    pub model: String,
    pub priority: u32,
    pub cost_flexible: bool,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub available: bool,
    pub efficiency: Option<ProviderEfficiency>,
}

/// Holds every configured provider ranked by priority and produces the
/// fallback order for each request
pub struct ProviderRegistry {
    providers: Vec<ProviderEntry>,
    breaker: Arc<CircuitBreaker>,
    costs: Arc<CostTracker>,
    active_provider: Option<String>,
    cost_aware_default: bool,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .field("active_provider", &self.active_provider)
            .field("cost_aware_default", &self.cost_aware_default)
            .finish()
    }
}

impl ProviderRegistry {
    /// Build the registry and one breaker per provider
    pub fn new(
        mut providers: Vec<ProviderEntry>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn TelemetrySink>,
        costs: Arc<CostTracker>,
    ) -> Result<Self, DomainError> {
        let mut seen = HashSet::new();
        for entry in &providers {
            if entry.config.id.is_empty() {
                return Err(DomainError::configuration("provider id cannot be empty"));
            }
            if !seen.insert(entry.config.id.clone()) {
                return Err(DomainError::configuration(format!(
                    "duplicate provider id '{}'",
                    entry.config.id
                )));
            }
        }

        providers.sort_by(|a, b| by_priority(&a.config, &b.config));

        let breaker = providers.iter().fold(
            CircuitBreaker::new(clock, telemetry),
            |breaker, entry| breaker.with_provider(entry.config.id.clone(), entry.config.breaker),
        );

        Ok(Self {
            providers,
            breaker: Arc::new(breaker),
            costs,
            active_provider: None,
            cost_aware_default: false,
        })
    }

    /// Provider hoisted to the head of every unrestricted candidate list
    pub fn with_active_provider(mut self, provider_id: impl Into<String>) -> Result<Self, DomainError> {
        let provider_id = provider_id.into();

        if self.get(&provider_id).is_none() {
            return Err(DomainError::configuration(format!(
                "active provider '{}' is not configured",
                provider_id
            )));
        }

        self.active_provider = Some(provider_id);
        Ok(self)
    }

    pub fn with_cost_aware_ordering(mut self, enabled: bool) -> Self {
        self.cost_aware_default = enabled;
        self
    }

    pub fn get(&self, provider_id: &str) -> Option<&ProviderEntry> {
        self.providers.iter().find(|p| p.config.id == provider_id)
    }

    /// Provider ids in priority order
    pub fn ids(&self) -> Vec<&str> {
        self.providers.iter().map(ProviderEntry::id).collect()
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn costs(&self) -> &Arc<CostTracker> {
        &self.costs
    }

    pub fn active_provider(&self) -> Option<&str> {
        self.active_provider.as_deref()
    }

    /// Ordered fallback sequence for one request.
    ///
    /// Priority ascending (ties by id), OPEN providers removed, cost-flexible
    /// slots reordered by cost per success when requested, then the active
    /// provider moved to the front.
    pub async fn candidates(
        &self,
        selection: &CandidateSelection,
    ) -> Result<Vec<&ProviderEntry>, DomainError> {
        let mut ordered: Vec<&ProviderEntry> = match &selection.provider_override {
            Some(id) => {
                let entry = self.get(id).ok_or_else(|| {
                    DomainError::not_found(format!("Provider '{}' is not configured", id))
                })?;
                vec![entry]
            }
            None => self.providers.iter().collect(),
        };

        ordered.retain(|p| self.breaker.is_available(p.id()));

        if selection.cost_aware.unwrap_or(self.cost_aware_default) {
            self.reorder_by_cost(&mut ordered).await;
        }

        if selection.provider_override.is_none() {
            if let Some(active) = &self.active_provider {
                if let Some(pos) = ordered.iter().position(|p| p.id() == active) {
                    let entry = ordered.remove(pos);
                    ordered.insert(0, entry);
                }
            }
        }

        debug!(
            candidates = ?ordered.iter().map(|p| p.id()).collect::<Vec<_>>(),
            "Resolved provider candidates"
        );

        Ok(ordered)
    }

    /// Reorder the cost-flexible entries among their own slots; fixed entries keep theirs
    async fn reorder_by_cost(&self, ordered: &mut [&ProviderEntry]) {
        let slots: Vec<usize> = ordered
            .iter()
            .enumerate()
            .filter(|(_, p)| p.config.cost_flexible)
            .map(|(i, _)| i)
            .collect();

        if slots.len() < 2 {
            return;
        }

        let mut flexible = Vec::with_capacity(slots.len());
        for &slot in &slots {
            let entry = ordered[slot];
            let cost = self.cost_per_success(entry.id()).await;
            flexible.push((cost, entry));
        }

        flexible.sort_by(|(cost_a, a), (cost_b, b)| {
            compare_cost(*cost_a, *cost_b).then_with(|| by_priority(&a.config, &b.config))
        });

        for (slot, (_, entry)) in slots.into_iter().zip(flexible) {
            ordered[slot] = entry;
        }
    }

    async fn cost_per_success(&self, provider_id: &str) -> Option<i64> {
        match self.costs.efficiency(provider_id).await {
            Ok(efficiency) => efficiency.cost_per_success_micros,
            Err(e) => {
                warn!(provider = %provider_id, error = %e, "Failed to read provider efficiency");
                None
            }
        }
    }

    /// Breaker state and trailing efficiency for every provider, in priority order
    pub async fn status(&self) -> Vec<ProviderStatus> {
        let mut statuses = Vec::with_capacity(self.providers.len());

        for entry in &self.providers {
            let id = entry.id();
            let snapshot = self.breaker.snapshot(id);

            statuses.push(ProviderStatus {
                id: id.to_string(),
                display_name: entry.config.display_name.clone(),
                model: entry.config.model.clone(),
                priority: entry.config.priority,
                cost_flexible: entry.config.cost_flexible,
                state: snapshot
                    .as_ref()
                    .map(|s| s.state)
                    .unwrap_or(CircuitState::Closed),
                consecutive_failures: snapshot.map(|s| s.consecutive_failures).unwrap_or(0),
                available: self.breaker.is_available(id),
                efficiency: self.costs.efficiency(id).await.ok(),
            });
        }

        statuses
    }
}

fn by_priority(a: &ProviderConfig, b: &ProviderConfig) -> Ordering {
    a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id))
}

/// Known costs ascending; providers without history go last
fn compare_cost(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
