use std::sync::Arc;
use std::time::Duration;

use crate::domain::llm::LlmProvider;
use crate::domain::resilience::BreakerSettings;
use crate::domain::usage::ProviderPricing;

/// Static description of one configured provider. Immutable after load.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub id: String,
    pub display_name: String,
    /// Backend model (or deployment) name sent on every call
    pub model: String,
    /// Lower rank is tried first
    pub priority: u32,
    pub pricing: ProviderPricing,
    /// Per-attempt call timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub breaker: BreakerSettings,
    /// May be reordered by cost when cost-aware ordering is requested
    pub cost_flexible: bool,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>, model: impl Into<String>, priority: u32) -> Self {
        let id = id.into();

        Self {
            display_name: id.clone(),
            id,
            model: model.into(),
            priority,
            pricing: ProviderPricing::default(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            breaker: BreakerSettings::default(),
            cost_flexible: false,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_pricing(mut self, pricing: ProviderPricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_breaker(mut self, breaker: BreakerSettings) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn cost_flexible(mut self, flexible: bool) -> Self {
        self.cost_flexible = flexible;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A configured provider bound to the adapter that serves it
#[derive(Debug, Clone)]
pub struct ProviderEntry {
    pub config: ProviderConfig,
    pub adapter: Arc<dyn LlmProvider>,
}

impl ProviderEntry {
    pub fn new(config: ProviderConfig, adapter: Arc<dyn LlmProvider>) -> Self {
        Self { config, adapter }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }
}
