//! Benchmark datasets for membench
//!
//! Two benchmark families share one item model:
//!
//! - **longmemeval**: conversational memory over dated haystack sessions
//! - **needle**: long-context degradation tests at nominal context sizes

pub mod item;
pub mod longmemeval;
pub mod needle;

use std::path::Path;

use anyhow::Result;

pub use item::{ConversationTurn, DatasetItem, QuestionCategory};

/// The benchmark families membench knows how to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Benchmark {
    LongMemEval,
    Needle,
}

impl Benchmark {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "longmemeval" => Some(Benchmark::LongMemEval),
            "needle" => Some(Benchmark::Needle),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Benchmark::LongMemEval => "longmemeval",
            Benchmark::Needle => "needle",
        }
    }
}

/// Names of the supported benchmarks.
pub const BENCHMARK_NAMES: &[&str] = &["longmemeval", "needle"];

/// Load a benchmark dataset, optionally limited to the first `limit` items.
pub fn load(benchmark: Benchmark, path: &Path, limit: Option<usize>) -> Result<Vec<DatasetItem>> {
    let items = match benchmark {
        Benchmark::LongMemEval => longmemeval::load(path, limit)?,
        Benchmark::Needle => needle::load(path, limit)?,
    };
    tracing::info!(
        "Loaded {} items from {} ({})",
        items.len(),
        path.display(),
        benchmark.name()
    );
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benchmark_names_round_trip() {
        for name in BENCHMARK_NAMES {
            assert_eq!(Benchmark::from_name(name).unwrap().name(), *name);
        }
        assert!(Benchmark::from_name("unknown").is_none());
    }
}
