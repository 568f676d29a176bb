//! Per-category analysis worker.
//!
//! A worker scores its category, then asks the reasoning backend for
//! findings under a bounded retry policy:
//! `Pending -> Scoring -> Reasoning -> Done(success | failed)`.

use crate::analysis::{category_score, CategoryGroup};
use crate::config::PipelineConfig;
use crate::error::ReasoningError;
use crate::models::CategoryAnalysis;
use crate::reasoning::{CategoryRequest, ReasoningClient};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Retry and timeout policy for reasoning calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Limit for a single attempt.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for RetryPolicy {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            attempt_timeout: config.attempt_timeout(),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based): exponential, capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// Run `call` until it succeeds, fails permanently, or attempts run out.
///
/// Returns the final outcome and the number of attempts made.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut call: F,
) -> (Result<T, ReasoningError>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ReasoningError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = match policy.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, call())
                .await
                .unwrap_or(Err(ReasoningError::Timeout)),
            None => call().await,
        };

        match outcome {
            Ok(value) => return (Ok(value), attempt),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let backoff = policy.backoff_for(attempt);
                warn!(
                    "{}: attempt {}/{} failed ({}); retrying in {:?}",
                    label, attempt, max_attempts, err, backoff
                );
                tokio::time::sleep(backoff).await;
            }
            Err(err) => return (Err(err), attempt),
        }
    }
}

/// Worker lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Pending,
    Scoring,
    Reasoning,
    Done { success: bool },
}

/// Survey metadata shared by all workers of a run.
#[derive(Debug, Clone, Default)]
pub struct SurveyContext {
    pub title: String,
    pub description: Option<String>,
}

/// Analyzes one category.
pub struct CategoryAnalysisWorker {
    group: CategoryGroup,
    context: Arc<SurveyContext>,
    client: Arc<dyn ReasoningClient>,
    policy: RetryPolicy,
    permits: Option<Arc<Semaphore>>,
    state: WorkerState,
}

impl CategoryAnalysisWorker {
    pub fn new(
        group: CategoryGroup,
        context: Arc<SurveyContext>,
        client: Arc<dyn ReasoningClient>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            group,
            context,
            client,
            policy,
            permits: None,
            state: WorkerState::Pending,
        }
    }

    /// Limit concurrent reasoning calls across workers sharing `permits`.
    pub fn with_permits(mut self, permits: Arc<Semaphore>) -> Self {
        self.permits = Some(permits);
        self
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    fn enter(&mut self, next: WorkerState) {
        debug!(
            "Category '{}': {:?} -> {:?}",
            self.group.category, self.state, next
        );
        self.state = next;
    }

    /// Run the worker to completion. Never fails; failures are recorded in
    /// the returned analysis.
    pub async fn run(mut self) -> CategoryAnalysis {
        let started = Instant::now();

        self.enter(WorkerState::Scoring);
        let score = category_score(&self.group);

        self.enter(WorkerState::Reasoning);
        let _permit = match self.permits.clone() {
            Some(permits) => match permits.acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.enter(WorkerState::Done { success: false });
                    return CategoryAnalysis::failed(
                        score,
                        "Unavailable",
                        "reasoning capacity was shut down",
                        0,
                        started.elapsed().as_secs_f64(),
                    );
                }
            },
            None => None,
        };

        let (outcome, attempts) = {
            let request = CategoryRequest {
                survey_title: &self.context.title,
                survey_description: self.context.description.as_deref(),
                group: &self.group,
                score: &score,
            };
            let client = &self.client;
            let request = &request;
            let label = format!("Category '{}'", self.group.category);
            with_retry(&self.policy, &label, || client.analyze_category(request)).await
        };

        let elapsed = started.elapsed().as_secs_f64();
        match outcome {
            Ok(findings) => {
                self.enter(WorkerState::Done { success: true });
                CategoryAnalysis {
                    category: self.group.category.clone(),
                    category_score: score,
                    strengths: findings.strengths,
                    weaknesses: findings.weaknesses,
                    recommendations: findings.recommendations,
                    analysis_summary: findings.summary,
                    success: true,
                    failure_reason: None,
                    tokens_used: findings.tokens_used,
                    attempts,
                    processing_time: elapsed,
                }
            }
            Err(err) => {
                warn!(
                    "Category '{}' failed after {} attempt(s): {}",
                    self.group.category, attempts, err
                );
                self.enter(WorkerState::Done { success: false });
                CategoryAnalysis::failed(score, err.kind(), &err.to_string(), attempts, elapsed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::GroupedItem;
    use crate::models::{Answer, Question, QuestionType};
    use crate::reasoning::testing::{fail, findings, ok, slow, ScriptedClient};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn group(category: &str) -> CategoryGroup {
        CategoryGroup {
            category: category.to_string(),
            items: vec![GroupedItem {
                question: Question {
                    id: 1,
                    text: "Rate your focus".to_string(),
                    question_type: QuestionType::Scale,
                    category: category.to_string(),
                    weight: 2.0,
                    options: Vec::new(),
                    order_index: 0,
                },
                answer: Some(Answer {
                    question_id: 1,
                    selected: vec!["4".to_string()],
                    answer_weight: 1.5,
                }),
            }],
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            attempt_timeout: Some(Duration::from_secs(5)),
        }
    }

    fn worker(client: Arc<ScriptedClient>, category: &str, max_attempts: u32) -> CategoryAnalysisWorker {
        CategoryAnalysisWorker::new(
            group(category),
            Arc::new(SurveyContext {
                title: "Review".to_string(),
                description: None,
            }),
            client,
            policy(max_attempts),
        )
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = policy(5);
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(5), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(40), Duration::from_secs(1));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.initial_backoff, Duration::from_secs(1));
        assert_eq!(policy.attempt_timeout, Some(Duration::from_secs(120)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_records_findings_and_score() {
        let client = Arc::new(ScriptedClient::new("m").on_category("Focus", vec![ok(findings("Focus", 77))]));
        let worker = worker(client.clone(), "Focus", 2);
        assert_eq!(worker.state(), WorkerState::Pending);

        let analysis = worker.run().await;
        assert!(analysis.success);
        assert_eq!(analysis.tokens_used, 77);
        assert_eq!(analysis.attempts, 1);
        assert_eq!(analysis.category_score.score, 75.0);
        assert_eq!(analysis.strengths, vec!["Focus strength"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_retried_until_attempts_run_out() {
        let client = Arc::new(
            ScriptedClient::new("m").on_category("Focus", vec![fail(ReasoningError::Timeout)]),
        );

        let analysis = worker(client.clone(), "Focus", 3).run().await;
        assert!(!analysis.success);
        assert_eq!(analysis.failure_reason.as_deref(), Some("Timeout"));
        assert_eq!(analysis.attempts, 3);
        assert_eq!(client.calls("Focus"), 3);
        assert_eq!(analysis.tokens_used, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_then_success() {
        let client = Arc::new(ScriptedClient::new("m").on_category(
            "Focus",
            vec![fail(ReasoningError::RateLimited), ok(findings("Focus", 10))],
        ));

        let analysis = worker(client.clone(), "Focus", 2).run().await;
        assert!(analysis.success);
        assert_eq!(analysis.attempts, 2);
        assert_eq!(client.calls("Focus"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        for error in [
            ReasoningError::Unavailable("auth".to_string()),
            ReasoningError::InvalidResponse("garbled".to_string()),
        ] {
            let kind = error.kind();
            let client = Arc::new(ScriptedClient::new("m").on_category("Focus", vec![fail(error)]));

            let analysis = worker(client.clone(), "Focus", 5).run().await;
            assert!(!analysis.success);
            assert_eq!(analysis.failure_reason.as_deref(), Some(kind));
            assert!(analysis.analysis_summary.contains(kind));
            assert_eq!(client.calls("Focus"), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_hits_attempt_timeout() {
        let client = Arc::new(ScriptedClient::new("m").on_category(
            "Focus",
            vec![slow(Duration::from_secs(60), ok(findings("Focus", 1)))],
        ));

        let analysis = worker(client, "Focus", 1).run().await;
        assert!(!analysis.success);
        assert_eq!(analysis.failure_reason.as_deref(), Some("Timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_counts_attempts() {
        let calls = AtomicU32::new(0);
        let (outcome, attempts) = with_retry(&policy(4), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ReasoningError::RateLimited)
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        tokio_test::assert_ok!(&outcome);
        assert_eq!(outcome, Ok(2));
        assert_eq!(attempts, 3);
    }
}
