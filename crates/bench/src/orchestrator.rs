//! Phase sequencing with checkpoint resume
//!
//! Drives a run through ingest → search → evaluate → report. Transitions
//! are one-directional: a later phase whose inputs are missing fails fast
//! instead of silently re-running an earlier phase. Each phase loads its
//! checkpoint on entry and resumes after the last processed item.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use common::{Pacer, RetryPolicy};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use datasets::{Benchmark, DatasetItem};
use providers::{IngestOptions, ProviderAdapter, SearchOptions};

use crate::answer::{AnsweringEngine, ANSWER_ERROR_MARKER};
use crate::checkpoint::{Checkpoint, CheckpointStore, Phase};
use crate::config::Config;
use crate::context;
use crate::judge::JudgeEngine;
use crate::record::{truncate_message, EvaluationRecord, SearchRecord};
use crate::report::{Report, ReportMetadata};

/// Run lifecycle states, in order. Skipped phases leave the state at its
/// previous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Ingesting,
    Searching,
    Evaluating,
    Reported,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Pending => "pending",
            RunState::Ingesting => "ingesting",
            RunState::Searching => "searching",
            RunState::Evaluating => "evaluating",
            RunState::Reported => "reported",
        };
        f.write_str(s)
    }
}

/// Caller-requested phase skips, used to resume earlier partial runs or to
/// re-evaluate existing search results with a different judge.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseFlags {
    pub skip_ingest: bool,
    pub skip_search: bool,
}

/// Namespace key scoping ingested content and searches to one
/// (dataset-item, run) pair.
pub fn container_tag(run_id: &str, item_id: &str) -> String {
    format!("{}_{}", run_id, item_id)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

pub struct PhaseOrchestrator {
    run_id: String,
    benchmark: Benchmark,
    provider: Arc<dyn ProviderAdapter>,
    answerer: AnsweringEngine,
    judge: JudgeEngine,
    store: CheckpointStore,
    retry: RetryPolicy,
    pacer: Pacer,
    search_options: SearchOptions,
    checkpoint_every: usize,
    chars_per_token: usize,
    state: RunState,
}

impl PhaseOrchestrator {
    pub fn new(
        run_id: impl Into<String>,
        benchmark: Benchmark,
        provider: Arc<dyn ProviderAdapter>,
        answerer: AnsweringEngine,
        judge: JudgeEngine,
        store: CheckpointStore,
        config: &Config,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            benchmark,
            provider,
            answerer,
            judge,
            store,
            retry: config.retry_policy(),
            pacer: Pacer::new(config.call_delay()),
            search_options: SearchOptions {
                limit: config.pipeline.search_limit,
                threshold: config.pipeline.search_threshold,
            },
            checkpoint_every: config.pipeline.checkpoint_every.max(1),
            chars_per_token: config.pipeline.chars_per_token,
            state: RunState::Pending,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run the pipeline end to end and write the report.
    pub async fn run(&mut self, items: &[DatasetItem], flags: PhaseFlags) -> Result<Report> {
        info!(
            "Run {} against {}: {} items",
            self.run_id,
            self.provider.name(),
            items.len()
        );

        if flags.skip_ingest {
            info!("Ingest phase skipped");
        } else {
            self.state = RunState::Ingesting;
            self.run_ingest(items).await?;
        }

        if flags.skip_search {
            info!("Search phase skipped");
        } else {
            self.state = RunState::Searching;
            self.run_search(items).await?;
        }

        self.state = RunState::Evaluating;
        let records = self.run_evaluate(items).await?;

        let report = Report::build(
            ReportMetadata {
                run_id: self.run_id.clone(),
                provider: self.provider.name().to_string(),
                benchmark: self.benchmark.name().to_string(),
                answer_model: self.answerer.model().to_string(),
                judge_model: self.judge.model().to_string(),
                evaluated_at: Utc::now(),
            },
            records,
        );
        report.save(&self.store.report_path())?;
        self.state = RunState::Reported;
        info!("Report written to {}", self.store.report_path().display());

        Ok(report)
    }

    /// Load a prior checkpoint for a phase, verifying it belongs to this
    /// run shape, or start a fresh one.
    fn load_or_create<T: DeserializeOwned>(
        &self,
        phase: Phase,
        total_items: usize,
    ) -> Result<Checkpoint<T>> {
        match self.store.load::<T>(phase)? {
            Some(cp) => {
                if cp.provider != self.provider.name() {
                    bail!(
                        "checkpoint for run {} belongs to provider {}, not {}",
                        self.run_id,
                        cp.provider,
                        self.provider.name()
                    );
                }
                if cp.total_items != total_items {
                    bail!(
                        "checkpoint for run {} covers {} items, but {} were loaded; \
                         use the same dataset and --limit to resume",
                        self.run_id,
                        cp.total_items,
                        total_items
                    );
                }
                Ok(cp)
            }
            None => Ok(Checkpoint::new(
                &self.run_id,
                self.provider.name(),
                phase,
                total_items,
            )),
        }
    }

    /// Estimated token count of everything ingested for an item, for
    /// degradation-curve bucketing.
    fn estimate_haystack_tokens(&self, item: &DatasetItem) -> usize {
        let chars: usize = item
            .documents()
            .iter()
            .map(|(doc, _)| doc.chars().count())
            .sum();
        chars / self.chars_per_token.max(1)
    }

    /// Fail fast when a prerequisite phase has not completed for this run.
    fn require_complete<T: DeserializeOwned>(&self, phase: Phase) -> Result<Checkpoint<T>> {
        match self.store.load::<T>(phase)? {
            Some(cp) if cp.is_complete() => Ok(cp),
            _ => bail!(
                "prerequisite phase incomplete: {} has not finished for run {}",
                phase,
                self.run_id
            ),
        }
    }

    /// Ingest every item's documents into the provider. A provider failure
    /// that survives retries aborts the run: later phases depend on
    /// complete ingestion.
    async fn run_ingest(&mut self, items: &[DatasetItem]) -> Result<()> {
        let mut cp: Checkpoint<String> = self.load_or_create(Phase::Ingest, items.len())?;
        if cp.is_complete() {
            info!("Ingest already complete for run {}", self.run_id);
            return Ok(());
        }

        let start = cp.resume_index();
        if start > 0 {
            info!("Resuming ingest from item {}", start + 1);
        }

        for (idx, item) in items.iter().enumerate().skip(start) {
            let tag = container_tag(&self.run_id, &item.id);

            self.retry
                .run(|| self.provider.prepare_container(&tag))
                .await
                .map_err(|e| anyhow::anyhow!("preparing container for item {}: {}", item.id, e))?;

            for (document, date) in item.documents() {
                let options = IngestOptions {
                    document_date: date.map(String::from),
                };
                self.pacer.pace().await;
                self.retry
                    .run(|| self.provider.ingest(&document, &tag, &options))
                    .await
                    .map_err(|e| anyhow::anyhow!("ingest failed for item {}: {}", item.id, e))?;
            }

            cp.results.push(item.id.clone());
            cp.advance_to(idx);
            info!("[{}/{}] ingested {}", idx + 1, items.len(), item.id);

            if (idx + 1) % self.checkpoint_every == 0 {
                self.store.save(&cp)?;
            }
        }

        self.store.save(&cp)?;
        Ok(())
    }

    /// Search each question against its container. Per-item failures are
    /// recorded and skipped; one bad question must not sink the batch.
    async fn run_search(&mut self, items: &[DatasetItem]) -> Result<()> {
        self.require_complete::<String>(Phase::Ingest)
            .context("cannot search")?;

        let mut cp: Checkpoint<SearchRecord> = self.load_or_create(Phase::Search, items.len())?;
        if cp.is_complete() {
            info!("Search already complete for run {}", self.run_id);
            return Ok(());
        }

        let start = cp.resume_index();
        if start > 0 {
            info!("Resuming search from item {}", start + 1);
        }

        for (idx, item) in items.iter().enumerate().skip(start) {
            let tag = container_tag(&self.run_id, &item.id);

            self.pacer.pace().await;
            let record = match self
                .retry
                .run(|| self.provider.search(&item.question, &tag, &self.search_options))
                .await
            {
                Ok(results) => {
                    info!(
                        "[{}/{}] search {} returned {} results",
                        idx + 1,
                        items.len(),
                        item.id,
                        results.len()
                    );
                    SearchRecord {
                        item_id: item.id.clone(),
                        results,
                        error: None,
                    }
                }
                Err(e) => {
                    let message = truncate_message(&e.to_string(), 200);
                    warn!("Search failed for item {}: {}", item.id, message);
                    SearchRecord {
                        item_id: item.id.clone(),
                        results: Vec::new(),
                        error: Some(message),
                    }
                }
            };

            cp.results.push(record);
            cp.advance_to(idx);

            if (idx + 1) % self.checkpoint_every == 0 {
                self.store.save(&cp)?;
            }
        }

        self.store.save(&cp)?;
        Ok(())
    }

    /// Answer and judge each question from its recorded search results.
    ///
    /// Resume is keyed by (question id, answer model, judge model) rather
    /// than the sequential watermark: earlier partial runs may have left
    /// gaps, and re-judging with a different model pair appends fresh
    /// records for every question.
    async fn run_evaluate(&mut self, items: &[DatasetItem]) -> Result<Vec<EvaluationRecord>> {
        let search_cp: Checkpoint<SearchRecord> = self
            .require_complete(Phase::Search)
            .context("cannot evaluate")?;
        let searches: HashMap<&str, &SearchRecord> = search_cp
            .results
            .iter()
            .map(|r| (r.item_id.as_str(), r))
            .collect();

        let mut cp: Checkpoint<EvaluationRecord> =
            self.load_or_create(Phase::Evaluate, items.len())?;

        let answer_model = self.answerer.model().to_string();
        let judge_model = self.judge.model().to_string();

        for (idx, item) in items.iter().enumerate() {
            let already_done = cp.results.iter().any(|r| {
                r.question_id == item.id
                    && r.answer_model == answer_model
                    && r.judge_model == judge_model
            });
            if already_done {
                continue;
            }

            let search = searches.get(item.id.as_str()).with_context(|| {
                format!(
                    "prerequisite phase incomplete: no search results recorded for item {}",
                    item.id
                )
            })?;

            let record = if let Some(error) = &search.error {
                EvaluationRecord::failed(
                    item,
                    &answer_model,
                    &judge_model,
                    format!("search failed: {}", error),
                )
            } else {
                let context = context::assemble(&search.results);

                self.pacer.pace().await;
                let answer = self.answerer.answer(item, &context).await;
                self.pacer.pace().await;
                let outcome = self.judge.judge(item, &answer).await;

                let error = (answer == ANSWER_ERROR_MARKER)
                    .then(|| "answer generation failed".to_string());

                EvaluationRecord {
                    question_id: item.id.clone(),
                    category: item.category.label().to_string(),
                    question: item.question.clone(),
                    ground_truth: item.answer.clone(),
                    answer,
                    label: outcome.label,
                    explanation: outcome.explanation,
                    context_tokens: Some(context.estimated_tokens(self.chars_per_token)),
                    nominal_length: item.nominal_length,
                    measured_length: item
                        .nominal_length
                        .map(|_| self.estimate_haystack_tokens(item)),
                    answer_model: answer_model.clone(),
                    judge_model: judge_model.clone(),
                    evaluated_at: Utc::now(),
                    error,
                }
            };

            info!(
                "[{}/{}] evaluated {}: {:?}",
                idx + 1,
                items.len(),
                item.id,
                record.label
            );
            cp.results.push(record);
            cp.advance_to(idx);

            if (idx + 1) % self.checkpoint_every == 0 {
                self.store.save(&cp)?;
            }
        }

        self.store.save(&cp)?;

        // The report covers the active model pair; records from other pairs
        // stay in the checkpoint.
        Ok(cp
            .results
            .into_iter()
            .filter(|r| r.answer_model == answer_model && r.judge_model == judge_model)
            .collect())
    }
}
