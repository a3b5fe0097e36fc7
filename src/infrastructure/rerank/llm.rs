//! LLM-judged relevance reranker

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::knowledge_base::RetrievalCandidate;
use crate::domain::llm::{LlmRequest, Usage};
use crate::domain::provider::{ProviderEntry, ProviderRegistry};
use crate::domain::rerank::{Reranker, blend};
use crate::domain::usage::UsageRecord;
use crate::domain::{DomainError, ProviderError, ProviderErrorKind};

const JUDGE_MAX_TOKENS: u32 = 150;

const JUDGE_PROMPT: &str = "Rate how well the passage answers the customer question on a scale \
from 0 (irrelevant) to 10 (fully answers it). Respond with JSON only: \
{\"score\": <number>, \"reason\": \"<short reason>\"}";

/// Asks an LLM to grade each passage 0-10, then blends with similarity.
///
/// Judge calls go through the provider's breaker and timeout, and every call
/// is recorded with the cost tracker like any generation attempt. Passages the
/// judge fails to grade keep no rerank score and rank by raw similarity.
#[derive(Debug)]
pub struct LlmReranker {
    registry: Arc<ProviderRegistry>,
    provider_id: String,
    similarity_weight: f32,
}

#[derive(Debug, Deserialize)]
struct JudgeResponse {
    score: f32,
    #[serde(default)]
    reason: Option<String>,
}

/// Extract JSON object from a string (handles markdown code blocks)
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

impl LlmReranker {
    /// Judge with a provider configured in `registry`
    pub fn new(
        registry: Arc<ProviderRegistry>,
        provider_id: impl Into<String>,
        similarity_weight: f32,
    ) -> Result<Self, DomainError> {
        let provider_id = provider_id.into();
        if registry.get(&provider_id).is_none() {
            return Err(DomainError::configuration(format!(
                "reranker provider '{}' is not configured",
                provider_id
            )));
        }

        Ok(Self {
            registry,
            provider_id,
            similarity_weight: similarity_weight.clamp(0.0, 1.0),
        })
    }

    fn build_request(query: &str, candidate: &RetrievalCandidate) -> LlmRequest {
        LlmRequest::builder()
            .system(JUDGE_PROMPT)
            .user(format!(
                "Question: {}\n\nPassage ({}):\n{}",
                query, candidate.title, candidate.content
            ))
            .temperature(0.0)
            .max_tokens(JUDGE_MAX_TOKENS)
            .build()
    }

    fn parse(content: &str) -> Result<f32, DomainError> {
        let json = extract_json(content).unwrap_or(content);
        let parsed: JudgeResponse = serde_json::from_str(json).map_err(|e| {
            DomainError::validation(format!("Invalid relevance judgement: {}", e))
        })?;

        if let Some(reason) = parsed.reason {
            debug!(score = parsed.score, reason = %reason, "Relevance judged");
        }

        // 0-10 scale to 0-1
        Ok((parsed.score / 10.0).clamp(0.0, 1.0))
    }

    async fn judge(&self, query: &str, candidate: &RetrievalCandidate) -> Result<f32, DomainError> {
        let entry = self.registry.get(&self.provider_id).ok_or_else(|| {
            DomainError::configuration(format!("reranker provider '{}' is not configured", self.provider_id))
        })?;
        let breaker = self.registry.breaker();

        if !breaker.allow(&self.provider_id) {
            return Err(ProviderError::new(
                &self.provider_id,
                ProviderErrorKind::CircuitOpen,
                "relevance judge skipped while the circuit is open",
            )
            .into());
        }

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            entry.config.timeout,
            entry
                .adapter
                .generate(&entry.config.model, Self::build_request(query, candidate)),
        )
        .await
        .unwrap_or_else(|_| {
            Err(ProviderError::timeout(
                &self.provider_id,
                format!("Relevance judge timed out after {}ms", entry.config.timeout.as_millis()),
            ))
        });
        let latency_ms = started.elapsed().as_millis() as u64;

        let response = match outcome {
            Ok(response) => {
                breaker.record_success(&self.provider_id);
                self.record_success(entry, &response.usage, latency_ms).await;
                response
            }
            Err(error) => {
                let error = error.for_provider(&self.provider_id);
                breaker.record_failure(&self.provider_id);
                self.registry
                    .costs()
                    .record(UsageRecord::failure(
                        &self.provider_id,
                        &entry.config.model,
                        error.kind,
                        latency_ms,
                    ))
                    .await;
                return Err(error.into());
            }
        };

        let content = response
            .content()
            .ok_or_else(|| DomainError::validation("Relevance judge returned no text"))?;

        Self::parse(content)
    }

    async fn record_success(&self, entry: &ProviderEntry, usage: &Usage, latency_ms: u64) {
        let cost_micros = entry
            .config
            .pricing
            .calculate_cost(usage.prompt_tokens, usage.completion_tokens);

        self.registry
            .costs()
            .record(UsageRecord::success(
                &self.provider_id,
                &entry.config.model,
                usage.prompt_tokens,
                usage.completion_tokens,
                cost_micros,
                latency_ms,
            ))
            .await;
    }
}

#[async_trait]
impl Reranker for LlmReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RetrievalCandidate>,
    ) -> Result<Vec<RetrievalCandidate>, DomainError> {
        let judgements = join_all(candidates.iter().map(|c| self.judge(query, c))).await;

        Ok(candidates
            .into_iter()
            .zip(judgements)
            .map(|(candidate, judgement)| match judgement {
                Ok(relevance) => {
                    let score = blend(candidate.similarity_score, relevance, self.similarity_weight);
                    candidate.with_rerank_score(score)
                }
                Err(e) => {
                    warn!(
                        document_id = %candidate.document_id,
                        error = %e,
                        "Relevance judgement failed, keeping similarity"
                    );
                    candidate
                }
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::domain::llm::MockLlmProvider;
    use crate::domain::provider::ProviderConfig;
    use crate::domain::resilience::{BreakerSettings, CircuitState, ManualClock};
    use crate::domain::telemetry::NoopTelemetrySink;
    use crate::domain::usage::{CostTracker, MockUsageLog, ProviderPricing};

    fn candidate(id: &str, similarity: f32) -> RetrievalCandidate {
        RetrievalCandidate {
            document_id: id.to_string(),
            title: format!("Title {}", id),
            content: format!("Content for {}", id),
            category: None,
            similarity_score: similarity,
            rerank_score: None,
        }
    }

    fn registry(provider: Arc<MockLlmProvider>, config: ProviderConfig) -> Arc<ProviderRegistry> {
        let costs = Arc::new(CostTracker::new(
            Arc::new(MockUsageLog::new()),
            Arc::new(NoopTelemetrySink),
            50,
        ));

        Arc::new(
            ProviderRegistry::new(
                vec![ProviderEntry::new(config, provider)],
                Arc::new(ManualClock::new()),
                Arc::new(NoopTelemetrySink),
                costs,
            )
            .unwrap(),
        )
    }

    fn judge_config() -> ProviderConfig {
        ProviderConfig::new("judge", "judge-model", 1).with_pricing(ProviderPricing::new(0.01, 0.02))
    }

    fn reranker(provider: &Arc<MockLlmProvider>) -> LlmReranker {
        LlmReranker::new(registry(provider.clone(), judge_config()), "judge", 0.5).unwrap()
    }

    #[test]
    fn test_extract_json() {
        let text = r#"Here is the result: {"score": 8, "reason": "Relevant"}"#;
        assert_eq!(extract_json(text), Some(r#"{"score": 8, "reason": "Relevant"}"#));
        assert_eq!(extract_json("no json"), None);
    }

    #[test]
    fn test_parse_normalizes_and_clamps() {
        assert!((LlmReranker::parse(r#"{"score": 8}"#).unwrap() - 0.8).abs() < 1e-6);
        assert_eq!(LlmReranker::parse(r#"```json {"score": 14} ```"#).unwrap(), 1.0);
        assert!(LlmReranker::parse("very relevant").is_err());
    }

    #[test]
    fn test_unknown_judge_provider_is_rejected() {
        let provider = Arc::new(MockLlmProvider::new("judge"));
        let result = LlmReranker::new(registry(provider, judge_config()), "claude", 0.5);

        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_judged_scores_are_blended() {
        let provider = Arc::new(
            MockLlmProvider::new("judge").with_response(r#"{"score": 10, "reason": "answers it"}"#),
        );
        let reranker = reranker(&provider);

        let ranked = reranker
            .rerank("refunds?", vec![candidate("kb-1", 0.6), candidate("kb-2", 0.8)])
            .await
            .unwrap();

        assert_eq!(provider.calls(), 2);
        assert!((ranked[0].rerank_score.unwrap() - 0.8).abs() < 1e-6);
        assert!((ranked[1].rerank_score.unwrap() - 0.9).abs() < 1e-6);

        let sent = provider.last_request().unwrap();
        assert!(sent.messages[1].content.starts_with("Question: refunds?"));
        assert_eq!(sent.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_judge_calls_are_recorded_as_usage() {
        let provider = Arc::new(MockLlmProvider::new("judge").with_response(r#"{"score": 5}"#));
        let reranker = reranker(&provider);

        reranker
            .rerank("refunds?", vec![candidate("kb-1", 0.6), candidate("kb-2", 0.8)])
            .await
            .unwrap();

        let records = reranker.registry.costs().records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.succeeded() && r.provider_id() == "judge"));
        // 100 input tokens at $0.01/1K + 50 output tokens at $0.02/1K
        assert!(records.iter().all(|r| r.cost_micros() == 2_000));
    }

    #[tokio::test]
    async fn test_open_circuit_skips_judge() {
        let provider = Arc::new(MockLlmProvider::new("judge").with_response(r#"{"score": 9}"#));
        let registry = registry(
            provider.clone(),
            judge_config().with_breaker(BreakerSettings {
                failure_threshold: 1,
                cooldown: Duration::from_secs(60),
            }),
        );
        registry.breaker().record_failure("judge");
        let reranker = LlmReranker::new(registry, "judge", 0.5).unwrap();

        let ranked = reranker
            .rerank("refunds?", vec![candidate("kb-1", 0.7)])
            .await
            .unwrap();

        assert_eq!(provider.calls(), 0);
        assert_eq!(ranked[0].rerank_score, None);
        assert!(reranker.registry.costs().records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_judgement_falls_back_and_counts_against_breaker() {
        let provider = Arc::new(MockLlmProvider::new("judge").with_error(ProviderErrorKind::Timeout));
        let reranker = LlmReranker::new(
            registry(
                provider.clone(),
                judge_config().with_breaker(BreakerSettings {
                    failure_threshold: 1,
                    cooldown: Duration::from_secs(60),
                }),
            ),
            "judge",
            0.5,
        )
        .unwrap();

        let ranked = reranker
            .rerank("refunds?", vec![candidate("kb-1", 0.7)])
            .await
            .unwrap();

        assert_eq!(ranked[0].rerank_score, None);
        assert!((ranked[0].final_score() - 0.7).abs() < 1e-6);
        assert_eq!(reranker.registry.breaker().state("judge"), Some(CircuitState::Open));

        let records = reranker.registry.costs().records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error_kind(), Some(ProviderErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_slow_judge_times_out() {
        let provider = Arc::new(
            MockLlmProvider::new("judge")
                .with_response(r#"{"score": 9}"#)
                .with_delay(Duration::from_secs(5)),
        );
        let reranker = LlmReranker::new(
            registry(provider, judge_config().with_timeout(Duration::from_millis(20))),
            "judge",
            0.5,
        )
        .unwrap();

        let ranked = reranker
            .rerank("refunds?", vec![candidate("kb-1", 0.7)])
            .await
            .unwrap();

        assert_eq!(ranked[0].rerank_score, None);
        let records = reranker.registry.costs().records().await.unwrap();
        assert_eq!(records[0].error_kind(), Some(ProviderErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_unparseable_judgement_falls_back() {
        let provider = Arc::new(MockLlmProvider::new("judge").with_response("I think it's relevant"));
        let reranker = reranker(&provider);

        let ranked = reranker
            .rerank("refunds?", vec![candidate("kb-1", 0.7)])
            .await
            .unwrap();

        assert_eq!(ranked[0].rerank_score, None);
    }
}
