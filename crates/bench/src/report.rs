//! Benchmark report
//!
//! The report is derived deterministically from the evaluation records and
//! written once per completed evaluation. Alongside the accuracy summary it
//! prints a failure summary, so a human can tell "provider flaky" patterns
//! from ground-truth or format bugs.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::{self, CategoryAccuracy, LengthBucket};
use crate::record::{truncate_message, EvaluationRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub run_id: String,
    pub provider: String,
    pub benchmark: String,
    pub answer_model: String,
    pub judge_model: String,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macro_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_length: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: ReportSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_category: Vec<CategoryAccuracy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_context_length: Vec<LengthBucket>,
    pub evaluations: Vec<EvaluationRecord>,
}

impl Report {
    /// Aggregate evaluation records into a report.
    ///
    /// Records carrying nominal context lengths get the degradation-curve
    /// breakdown; everything else gets the per-category breakdown.
    pub fn build(metadata: ReportMetadata, evaluations: Vec<EvaluationRecord>) -> Self {
        let total = evaluations.len();
        let correct = evaluations.iter().filter(|r| r.is_correct()).count();
        let accuracy = metrics::accuracy(&evaluations);

        let curve = metrics::degradation_curve(&evaluations);
        let (by_category, by_context_length, macro_accuracy, base_score, effective_length) =
            match curve {
                Some(curve) => (
                    Vec::new(),
                    curve.buckets,
                    None,
                    Some(curve.base_score),
                    curve.effective_length,
                ),
                None => {
                    let breakdown = metrics::by_category(&evaluations);
                    let macro_accuracy = metrics::macro_accuracy(&breakdown);
                    (breakdown, Vec::new(), macro_accuracy, None, None)
                }
            };

        Self {
            metadata,
            summary: ReportSummary {
                total,
                correct,
                accuracy,
                macro_accuracy,
                base_score,
                effective_length,
            },
            by_category,
            by_context_length,
            evaluations,
        }
    }

    /// Write the report as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }

    /// Read a previously written report.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read report: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse report: {}", path.display()))
    }

    /// Print the accuracy summary.
    pub fn print_summary(&self) {
        println!("\n========== BENCHMARK REPORT ==========\n");
        println!("Run:      {}", self.metadata.run_id);
        println!("Provider: {}", self.metadata.provider);
        println!("Benchmark: {}", self.metadata.benchmark);
        println!(
            "Models:   answer={}, judge={}",
            self.metadata.answer_model, self.metadata.judge_model
        );
        println!(
            "\nOverall: {}/{} correct ({:.2}%)",
            self.summary.correct, self.summary.total, self.summary.accuracy
        );
        if let Some(macro_acc) = self.summary.macro_accuracy {
            println!("Macro accuracy: {:.2}%", macro_acc);
        }

        if !self.by_category.is_empty() {
            println!("\n---------- By category ----------\n");
            for cat in &self.by_category {
                println!(
                    "  {:<20} {}/{} ({:.1}%)",
                    cat.category, cat.correct, cat.total, cat.accuracy
                );
            }
        }

        if !self.by_context_length.is_empty() {
            println!("\n---------- By context length ----------\n");
            for bucket in &self.by_context_length {
                println!(
                    "  {:>8} tokens  {}/{} ({:.1}%)",
                    bucket.nominal, bucket.correct, bucket.total, bucket.accuracy
                );
            }
            if let Some(base) = self.summary.base_score {
                println!("\nBase score: {:.2}%", base);
            }
            match self.summary.effective_length {
                Some(len) => println!("Effective length: {} tokens", len),
                None => println!("Effective length: none (no bucket retains the base score)"),
            }
        }

        println!("\n======================================\n");
    }

    /// Print failed items with truncated error messages.
    pub fn print_failures(&self) {
        let failures: Vec<&EvaluationRecord> = self
            .evaluations
            .iter()
            .filter(|r| r.error.is_some())
            .collect();
        if failures.is_empty() {
            return;
        }

        println!("---------- Failures ({}) ----------\n", failures.len());
        for record in failures {
            let message = record.error.as_deref().unwrap_or("unknown");
            println!(
                "  {}: {}",
                record.question_id,
                truncate_message(message, 120)
            );
        }
        println!();
    }
}
