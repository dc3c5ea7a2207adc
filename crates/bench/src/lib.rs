//! Benchmark pipeline for membench
//!
//! Runs memory providers through a resumable phase pipeline:
//! ingest → search → evaluate (answer + judge) → report. Every phase
//! checkpoints its progress, so an interrupted run resumes where it
//! stopped instead of repeating finished work.
//!
//! ## Metrics
//!
//! - **Accuracy**: judged-correct answers over all questions
//! - **Macro accuracy**: mean of per-category accuracies
//! - **Base score / effective length**: degradation statistics for
//!   long-context benchmarks

pub mod answer;
pub mod checkpoint;
pub mod config;
pub mod context;
pub mod judge;
pub mod metrics;
pub mod orchestrator;
pub mod record;
pub mod report;

pub use answer::{AnsweringEngine, ANSWER_ERROR_MARKER};
pub use checkpoint::{Checkpoint, CheckpointStore, ItemKeyed, Phase};
pub use config::{load_config, resolve_results_dir, Config};
pub use context::{assemble, AssembledContext, ContextBudget};
pub use judge::{parse_verdict, JudgeEngine, JudgeOutcome};
pub use metrics::{CategoryAccuracy, DegradationCurve, LengthBucket};
pub use orchestrator::{container_tag, PhaseFlags, PhaseOrchestrator, RunState};
pub use record::{EvaluationRecord, JudgeLabel, SearchRecord};
pub use report::{Report, ReportMetadata, ReportSummary};
