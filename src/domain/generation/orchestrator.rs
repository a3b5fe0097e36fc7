//! Generation orchestrator - retrieval, prompt assembly, and provider fallback

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{AttemptFailure, GenerationError, GenerationRequest, GenerationResult, prompt};
use crate::domain::knowledge_base::RetrievalCandidate;
use crate::domain::llm::{LlmOutput, LlmRequest, LlmResponse, Usage};
use crate::domain::provider::{ProviderEntry, ProviderRegistry};
use crate::domain::resilience::{Clock, RetryError, RetryPolicy, RetryScope};
use crate::domain::retrieval::{RetrievalOptions, RetrievalPipeline};
use crate::domain::usage::UsageRecord;
use crate::domain::{DomainError, ProviderErrorKind};

/// Longest budget a single request may ask for
pub const MAX_REQUEST_DEADLINE: Duration = Duration::from_secs(3_600);

/// Orchestrator-wide policy
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    /// Budget covering every attempt, retry, and fallback of one request
    pub request_deadline: Duration,
    /// Confidence reported for answers generated without retrieval
    pub default_confidence: f32,
    /// Refuse to generate when retrieval finds nothing
    pub require_grounding: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            request_deadline: Duration::from_secs(60),
            default_confidence: 0.85,
            require_grounding: false,
        }
    }
}

/// Top-level entry point for grounded generation
pub struct GenerationOrchestrator {
    registry: Arc<ProviderRegistry>,
    retry: Arc<RetryPolicy>,
    retrieval: Arc<RetrievalPipeline>,
    clock: Arc<dyn Clock>,
    settings: OrchestratorSettings,
}

impl std::fmt::Debug for GenerationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOrchestrator")
            .field("registry", &self.registry)
            .field("retry", &self.retry)
            .field("retrieval", &self.retrieval)
            .field("settings", &self.settings)
            .finish()
    }
}

impl GenerationOrchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        retry: Arc<RetryPolicy>,
        retrieval: Arc<RetrievalPipeline>,
        clock: Arc<dyn Clock>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            registry,
            retry,
            retrieval,
            clock,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Standalone retrieval with the pipeline's defaults filled in
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
        similarity_threshold: Option<f32>,
        category: Option<String>,
    ) -> Result<Vec<RetrievalCandidate>, DomainError> {
        let options = self.retrieval_options(top_k, similarity_threshold, category);
        self.retrieval.retrieve_with(query, &options).await
    }

    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        self.generate_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Generate, abandoning the in-flight provider call as soon as `token` fires
    #[instrument(skip_all, fields(use_rag = request.use_rag, tools = request.tools.len()))]
    pub async fn generate_with_cancellation(
        &self,
        request: GenerationRequest,
        token: CancellationToken,
    ) -> Result<GenerationResult, GenerationError> {
        let started = self.clock.now();
        let budget = request
            .deadline
            .unwrap_or(self.settings.request_deadline)
            .min(MAX_REQUEST_DEADLINE);
        let deadline = started
            .checked_add(budget)
            .ok_or_else(|| GenerationError::invalid_request("request deadline is out of range"))?;

        if request.messages.is_empty() {
            return Err(GenerationError::invalid_request("at least one message is required"));
        }

        let passages = if request.use_rag {
            let query = request.query().ok_or_else(|| {
                GenerationError::invalid_request("retrieval requires a non-empty user message")
            })?;
            let options = self.retrieval_options(
                request.top_k,
                request.similarity_threshold,
                request.category.clone(),
            );

            let remaining = deadline.saturating_duration_since(self.clock.now());
            let retrieval = tokio::time::timeout(remaining, self.retrieval.retrieve_with(query, &options));

            let passages = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    return Err(GenerationError::Cancelled { attempts: Vec::new() });
                }
                result = retrieval => match result {
                    Ok(passages) => passages?,
                    Err(_) => {
                        warn!("Retrieval did not finish within the request deadline");
                        return Err(self.deadline_exceeded(started, Vec::new()));
                    }
                },
            };

            if passages.is_empty() && self.settings.require_grounding {
                info!("No passage cleared the threshold and grounding is required");
                return Err(GenerationError::InsufficientContext);
            }
            passages
        } else {
            Vec::new()
        };

        let messages = if request.use_rag {
            prompt::grounded_messages(&request.messages, &passages)
        } else {
            request.messages.clone()
        };
        let base_request = LlmRequest::builder()
            .messages(messages)
            .tools(request.tools.clone())
            .build();

        let selection = request.selection();
        let candidates = self.registry.candidates(&selection).await?;

        if candidates.is_empty() {
            let attempts = match &selection.provider_override {
                Some(id) => vec![AttemptFailure::circuit_open(id)],
                None => self
                    .registry
                    .ids()
                    .into_iter()
                    .map(AttemptFailure::circuit_open)
                    .collect(),
            };
            warn!("Every provider circuit is open");
            return Err(GenerationError::Exhausted { attempts });
        }

        let mut failures: Vec<AttemptFailure> = Vec::new();

        for entry in candidates {
            let provider_id = entry.id();

            if self.clock.now() >= deadline {
                return Err(self.deadline_exceeded(started, failures));
            }

            if request.uses_tools() && !entry.adapter.supports_tools() {
                debug!(provider = %provider_id, "Skipping provider without function calling");
                failures.push(AttemptFailure::unsupported_tools(provider_id));
                continue;
            }

            let call_request = request_for(entry, &base_request);
            let call_started = self.clock.now();
            let scope = RetryScope {
                provider_id,
                breaker: self.registry.breaker(),
                max_retries: entry.config.max_retries,
                attempt_timeout: entry.config.timeout,
                deadline,
            };

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!(provider = %provider_id, "Generation cancelled by caller");
                    return Err(GenerationError::Cancelled { attempts: failures });
                }
                outcome = self.retry.execute(scope, |_| call(entry, call_request.clone())) => outcome,
            };

            let latency_ms = elapsed_ms(self.clock.now(), call_started);

            match outcome {
                Ok(success) => {
                    let response = success.value;
                    let usage = effective_usage(&response, &call_request);
                    let cost_micros = entry
                        .config
                        .pricing
                        .calculate_cost(usage.prompt_tokens, usage.completion_tokens);

                    self.registry
                        .costs()
                        .record(
                            UsageRecord::success(
                                provider_id,
                                &entry.config.model,
                                usage.prompt_tokens,
                                usage.completion_tokens,
                                cost_micros,
                                latency_ms,
                            )
                            .with_attempts(success.attempts),
                        )
                        .await;

                    info!(
                        provider = %provider_id,
                        attempts = success.attempts,
                        latency_ms,
                        tokens_in = usage.prompt_tokens,
                        tokens_out = usage.completion_tokens,
                        fallbacks = failures.len(),
                        "Generation succeeded"
                    );

                    return Ok(GenerationResult {
                        output: response.output,
                        provider_used: provider_id.to_string(),
                        model: entry.config.model.clone(),
                        tokens_in: usage.prompt_tokens,
                        tokens_out: usage.completion_tokens,
                        cost_micros,
                        latency_ms: elapsed_ms(self.clock.now(), started),
                        sources: passages.iter().map(|p| p.document_id.clone()).collect(),
                        confidence: self.confidence(request.use_rag, &passages),
                        passages,
                        failed_attempts: failures,
                    });
                }
                Err(RetryError::CircuitOpen) => {
                    debug!(provider = %provider_id, "Circuit opened before the first attempt");
                    failures.push(AttemptFailure::circuit_open(provider_id));
                }
                Err(RetryError::Failed { error, attempts }) => {
                    warn!(
                        provider = %provider_id,
                        attempts,
                        kind = %error.kind,
                        error = %error.message,
                        "Provider failed, falling back"
                    );
                    self.registry
                        .costs()
                        .record(
                            UsageRecord::failure(provider_id, &entry.config.model, error.kind, latency_ms)
                                .with_attempts(attempts),
                        )
                        .await;
                    failures.push(AttemptFailure::from_error(provider_id, &error, attempts));
                }
                Err(RetryError::DeadlineExceeded { last_error, attempts }) => {
                    if attempts > 0 {
                        let kind = last_error
                            .as_ref()
                            .map(|e| e.kind)
                            .unwrap_or(ProviderErrorKind::Timeout);
                        self.registry
                            .costs()
                            .record(
                                UsageRecord::failure(provider_id, &entry.config.model, kind, latency_ms)
                                    .with_attempts(attempts),
                            )
                            .await;
                    }
                    if let Some(error) = last_error {
                        failures.push(AttemptFailure::from_error(provider_id, &error, attempts));
                    }
                    return Err(self.deadline_exceeded(started, failures));
                }
            }
        }

        warn!(attempted = failures.len(), "All provider candidates exhausted");
        Err(GenerationError::Exhausted { attempts: failures })
    }

    fn retrieval_options(
        &self,
        top_k: Option<usize>,
        similarity_threshold: Option<f32>,
        category: Option<String>,
    ) -> RetrievalOptions {
        let defaults = self.retrieval.settings();

        RetrievalOptions {
            top_k: top_k.unwrap_or(defaults.default_top_k),
            similarity_threshold: similarity_threshold
                .unwrap_or(defaults.default_similarity_threshold),
            category,
        }
    }

    fn confidence(&self, used_rag: bool, passages: &[RetrievalCandidate]) -> f32 {
        if !used_rag {
            return self.settings.default_confidence;
        }

        passages
            .iter()
            .map(RetrievalCandidate::final_score)
            .fold(0.0_f32, f32::max)
            .clamp(0.0, 1.0)
    }

    fn deadline_exceeded(&self, started: Instant, attempts: Vec<AttemptFailure>) -> GenerationError {
        let elapsed_ms = elapsed_ms(self.clock.now(), started);
        warn!(elapsed_ms, attempted = attempts.len(), "Request deadline exceeded");
        GenerationError::DeadlineExceeded {
            elapsed_ms,
            attempts,
        }
    }
}

/// Apply the provider's generation defaults to the shared request
fn request_for(entry: &ProviderEntry, base: &LlmRequest) -> LlmRequest {
    let mut request = base.clone();
    if request.temperature.is_none() {
        request.temperature = entry.config.temperature;
    }
    if request.max_tokens.is_none() {
        request.max_tokens = entry.config.max_tokens;
    }
    request
}

async fn call(
    entry: &ProviderEntry,
    request: LlmRequest,
) -> Result<LlmResponse, crate::domain::ProviderError> {
    let result = if request.uses_tools() {
        entry
            .adapter
            .generate_with_tools(&entry.config.model, request)
            .await
    } else {
        entry.adapter.generate(&entry.config.model, request).await
    };

    result.map_err(|e| e.for_provider(entry.id()))
}

/// Backend-reported usage, estimated when the backend omitted it
fn effective_usage(response: &LlmResponse, request: &LlmRequest) -> Usage {
    if response.usage.total_tokens > 0 {
        return response.usage;
    }

    let completion = match &response.output {
        LlmOutput::Text { content } => content.chars().count(),
        LlmOutput::FunctionCall(call) => call.arguments.to_string().chars().count(),
    } as u32;

    Usage::new(request.approximate_prompt_tokens(), completion.div_ceil(4))
}

fn elapsed_ms(now: Instant, since: Instant) -> u64 {
    now.saturating_duration_since(since).as_millis() as u64
}
