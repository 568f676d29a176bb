//! Survey analysis orchestration.
//!
//! Fans out one worker per category, joins them in category order, then
//! synthesizes the overall summary and the final accounting.

use crate::analysis::{
    category_score, determine_status, failure_reason, fallback_summary, group_by_category,
    total_tokens, CategoryGroup,
};
use crate::config::PipelineConfig;
use crate::error::{ReasoningError, ValidationError};
use crate::models::{AnalysisStatus, Answer, CategoryAnalysis, Survey, SurveyAnalysisResult};
use crate::pipeline::worker::{with_retry, CategoryAnalysisWorker, RetryPolicy, SurveyContext};
use crate::reasoning::{OverallFindings, ReasoningClient, SummaryRequest};
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Runtime options of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub retry: RetryPolicy,
    /// Reasoning calls allowed in flight at once.
    pub max_concurrency: usize,
    /// Budget for the whole run, summary included.
    pub deadline: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            retry: RetryPolicy::from(config),
            max_concurrency: config.max_concurrency.max(1),
            deadline: config.deadline(),
        }
    }
}

/// Top-level orchestrator.
pub struct SurveyAnalysisPipeline {
    client: Arc<dyn ReasoningClient>,
    options: PipelineOptions,
}

impl SurveyAnalysisPipeline {
    pub fn new(client: Arc<dyn ReasoningClient>, options: PipelineOptions) -> Self {
        Self { client, options }
    }

    /// Analyze one submission.
    ///
    /// Per-category failures are recorded in the result. Only structural
    /// problems with the input return an error.
    pub async fn run(
        &self,
        survey: &Survey,
        answers: &[Answer],
    ) -> Result<SurveyAnalysisResult, ValidationError> {
        let started = Instant::now();
        let deadline = self.options.deadline.map(|budget| started + budget);

        let answers = validate_submission(survey, answers)?;
        let mut result = SurveyAnalysisResult::begin(survey.id, self.client.model_name());

        let groups = group_by_category(&survey.questions, &answers);
        info!(
            "Analyzing survey {} ('{}'): {} questions in {} categories",
            survey.id,
            survey.title,
            survey.questions.len(),
            groups.len()
        );

        let context = Arc::new(SurveyContext {
            title: survey.title.clone(),
            description: survey.description.clone(),
        });

        let analyses = self
            .analyze_categories(groups, context.clone(), started, deadline)
            .await;

        let (findings, degraded) = self.summarize(&context, &analyses, deadline).await;
        let status = determine_status(&analyses);

        result.overall_summary = findings.summary;
        result.key_insights = findings.key_insights;
        result.priority_areas = findings.priority_areas;
        result.summary_tokens_used = findings.tokens_used;
        result.aggregation_degraded = degraded;
        result.tokens_used = total_tokens(&analyses);
        result.categories_analyzed = analyses.iter().filter(|a| a.success).count();
        if status == AnalysisStatus::Failed {
            result.failure_reason = Some(failure_reason(&analyses));
        }
        result.category_analyses = analyses;
        result.processing_time = started.elapsed().as_secs_f64();
        result.created_at = Utc::now();

        if let Err(e) = result.advance(status) {
            error!("Could not finalize survey {}: {}", survey.id, e);
        }

        info!(
            "Survey {} {} in {:.2}s: {}/{} categories, {} tokens",
            survey.id,
            result.status,
            result.processing_time,
            result.categories_analyzed,
            result.category_analyses.len(),
            result.tokens_used + result.summary_tokens_used
        );

        Ok(result)
    }

    async fn analyze_categories(
        &self,
        groups: Vec<CategoryGroup>,
        context: Arc<SurveyContext>,
        started: Instant,
        deadline: Option<Instant>,
    ) -> Vec<CategoryAnalysis> {
        let permits = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let mut scores = Vec::with_capacity(groups.len());
        let mut handles = Vec::with_capacity(groups.len());

        for group in groups {
            scores.push(category_score(&group));

            let worker = CategoryAnalysisWorker::new(
                group,
                context.clone(),
                self.client.clone(),
                self.options.retry.clone(),
            )
            .with_permits(permits.clone());

            handles.push(tokio::spawn(async move {
                match deadline {
                    Some(deadline) => tokio::time::timeout_at(deadline, worker.run()).await.ok(),
                    None => Some(worker.run().await),
                }
            }));
        }

        // Results come back in spawn order, which is category order.
        join_all(handles)
            .await
            .into_iter()
            .zip(scores)
            .map(|(outcome, score)| match outcome {
                Ok(Some(analysis)) => analysis,
                Ok(None) => {
                    warn!("Category '{}' cancelled at deadline", score.category);
                    CategoryAnalysis::failed(
                        score,
                        ReasoningError::Timeout.kind(),
                        "analysis deadline expired",
                        0,
                        started.elapsed().as_secs_f64(),
                    )
                }
                Err(e) => {
                    error!("Category '{}' worker aborted: {}", score.category, e);
                    CategoryAnalysis::failed(
                        score,
                        "Internal",
                        &e.to_string(),
                        0,
                        started.elapsed().as_secs_f64(),
                    )
                }
            })
            .collect()
    }

    /// Overall findings, and whether they came from the fallback template.
    async fn summarize(
        &self,
        context: &SurveyContext,
        analyses: &[CategoryAnalysis],
        deadline: Option<Instant>,
    ) -> (OverallFindings, bool) {
        let successful: Vec<CategoryAnalysis> =
            analyses.iter().filter(|a| a.success).cloned().collect();

        if successful.is_empty() {
            debug!("No successful categories; using fallback summary");
            return (fallback_summary(analyses), true);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            warn!("Deadline reached before overall summary; using fallback summary");
            return (fallback_summary(analyses), true);
        }

        let request = SummaryRequest {
            survey_title: &context.title,
            survey_description: context.description.as_deref(),
            analyses: &successful,
        };
        let client = &self.client;
        let request = &request;
        let call = with_retry(&self.options.retry, "Overall summary", || {
            client.summarize(request)
        });

        let (outcome, _) = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call)
                .await
                .unwrap_or((Err(ReasoningError::Timeout), 0)),
            None => call.await,
        };

        match outcome {
            Ok(findings) => (findings, false),
            Err(e) => {
                warn!("Overall summary unavailable ({}); using fallback summary", e);
                (fallback_summary(analyses), true)
            }
        }
    }
}

/// Reject structurally broken input and drop answers to unknown questions.
pub fn validate_submission(survey: &Survey, answers: &[Answer]) -> Result<Vec<Answer>, ValidationError> {
    if survey.questions.is_empty() {
        return Err(ValidationError::NoQuestions);
    }

    let mut ids = HashSet::with_capacity(survey.questions.len());
    for question in &survey.questions {
        if !ids.insert(question.id) {
            return Err(ValidationError::DuplicateQuestionId(question.id));
        }
    }

    Ok(answers
        .iter()
        .filter(|answer| {
            let known = ids.contains(&answer.question_id);
            if !known {
                warn!(
                    "Ignoring answer for unknown question {}",
                    answer.question_id
                );
            }
            known
        })
        .cloned()
        .collect())
}
