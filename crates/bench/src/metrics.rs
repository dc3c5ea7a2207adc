//! Accuracy aggregation and degradation curves
//!
//! All accuracies are percentages (0–100). Macro accuracy averages the
//! per-category accuracies so small categories are not diluted by large
//! ones; categories with zero items are excluded, not treated as zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::record::EvaluationRecord;

/// Fraction of the base score a bucket must retain to count as effective.
pub const EFFECTIVE_LENGTH_RATIO: f64 = 0.85;

/// Relative tolerance when matching a measured token count to its nominal
/// context-length bucket.
pub const BUCKET_TOLERANCE: f64 = 0.2;

/// Accuracy within one question category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryAccuracy {
    pub category: String,
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
}

/// Accuracy within one nominal context-length bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LengthBucket {
    pub nominal: usize,
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
}

/// Per-bucket accuracies with the degradation summary statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationCurve {
    /// Buckets in ascending nominal size.
    pub buckets: Vec<LengthBucket>,
    /// Accuracy of the smallest bucket, the degradation baseline.
    pub base_score: f64,
    /// Largest nominal size retaining at least 85% of the base score;
    /// absent when no bucket qualifies (universal collapse).
    pub effective_length: Option<usize>,
}

fn percentage(correct: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (correct as f64 / total as f64) * 100.0
    }
}

/// Overall accuracy across all records, as a percentage.
pub fn accuracy(records: &[EvaluationRecord]) -> f64 {
    let correct = records.iter().filter(|r| r.is_correct()).count();
    percentage(correct, records.len())
}

/// Per-category accuracy breakdown, sorted by category name.
pub fn by_category(records: &[EvaluationRecord]) -> Vec<CategoryAccuracy> {
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for record in records {
        let entry = counts.entry(record.category.as_str()).or_insert((0, 0));
        entry.0 += 1;
        if record.is_correct() {
            entry.1 += 1;
        }
    }

    counts
        .into_iter()
        .map(|(category, (total, correct))| CategoryAccuracy {
            category: category.to_string(),
            total,
            correct,
            accuracy: percentage(correct, total),
        })
        .collect()
}

/// Mean of per-category accuracies. Categories with zero items are excluded
/// from the mean, not zeroed into it.
pub fn macro_accuracy(breakdown: &[CategoryAccuracy]) -> Option<f64> {
    let populated: Vec<&CategoryAccuracy> =
        breakdown.iter().filter(|c| c.total > 0).collect();
    if populated.is_empty() {
        return None;
    }
    Some(populated.iter().map(|c| c.accuracy).sum::<f64>() / populated.len() as f64)
}

/// Build the degradation curve for records carrying nominal lengths.
///
/// Records are grouped into their nominal bucket when the measured haystack
/// token count is within 20% of it; drifted records are reassigned to the
/// nearest bucket whose tolerance window contains them, and dropped when
/// none does.
pub fn degradation_curve(records: &[EvaluationRecord]) -> Option<DegradationCurve> {
    let nominals: Vec<usize> = {
        let set: std::collections::BTreeSet<usize> =
            records.iter().filter_map(|r| r.nominal_length).collect();
        set.into_iter().collect()
    };
    if nominals.is_empty() {
        return None;
    }

    let mut counts: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
    for record in records {
        let Some(nominal) = record.nominal_length else {
            continue;
        };
        let bucket = match record.measured_length {
            Some(actual) => assign_bucket(actual, nominal, &nominals),
            None => Some(nominal),
        };
        let Some(bucket) = bucket else {
            warn!(
                "Record {} measured {} tokens, outside every bucket's tolerance; excluded",
                record.question_id,
                record.measured_length.unwrap_or(0)
            );
            continue;
        };

        let entry = counts.entry(bucket).or_insert((0, 0));
        entry.0 += 1;
        if record.is_correct() {
            entry.1 += 1;
        }
    }

    let buckets: Vec<LengthBucket> = counts
        .into_iter()
        .map(|(nominal, (total, correct))| LengthBucket {
            nominal,
            total,
            correct,
            accuracy: percentage(correct, total),
        })
        .collect();
    if buckets.is_empty() {
        return None;
    }

    let base_score = buckets[0].accuracy;
    let threshold = EFFECTIVE_LENGTH_RATIO * base_score;
    let effective_length = buckets
        .iter()
        .rev()
        .find(|b| b.accuracy >= threshold)
        .map(|b| b.nominal);

    Some(DegradationCurve {
        buckets,
        base_score,
        effective_length,
    })
}

/// Match a measured token count to a nominal bucket within tolerance.
fn assign_bucket(actual: usize, nominal: usize, buckets: &[usize]) -> Option<usize> {
    let within = |bucket: usize| {
        (actual as f64 - bucket as f64).abs() <= BUCKET_TOLERANCE * bucket as f64
    };

    if within(nominal) {
        return Some(nominal);
    }
    buckets
        .iter()
        .copied()
        .filter(|&b| within(b))
        .min_by_key(|&b| (actual as i64 - b as i64).unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::JudgeLabel;
    use chrono::Utc;

    fn record(category: &str, correct: bool) -> EvaluationRecord {
        EvaluationRecord {
            question_id: format!("q-{}", rand_suffix()),
            category: category.to_string(),
            question: String::new(),
            ground_truth: String::new(),
            answer: String::new(),
            label: if correct {
                JudgeLabel::Correct
            } else {
                JudgeLabel::Wrong
            },
            explanation: String::new(),
            context_tokens: None,
            nominal_length: None,
            measured_length: None,
            answer_model: "a".to_string(),
            judge_model: "j".to_string(),
            evaluated_at: Utc::now(),
            error: None,
        }
    }

    fn length_record(nominal: usize, actual: usize, correct: bool) -> EvaluationRecord {
        let mut r = record("single-session", correct);
        r.nominal_length = Some(nominal);
        r.measured_length = Some(actual);
        r
    }

    fn rand_suffix() -> u32 {
        use std::sync::atomic::{AtomicU32, Ordering};
        static NEXT: AtomicU32 = AtomicU32::new(0);
        NEXT.fetch_add(1, Ordering::Relaxed)
    }

    #[test]
    fn seven_of_ten_is_seventy_percent() {
        let mut records: Vec<_> = (0..7).map(|_| record("default", true)).collect();
        records.extend((0..3).map(|_| record("default", false)));

        assert!((accuracy(&records) - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_records_score_zero() {
        assert_eq!(accuracy(&[]), 0.0);
    }

    #[test]
    fn macro_average_excludes_empty_categories() {
        let breakdown = vec![
            CategoryAccuracy {
                category: "a".to_string(),
                total: 2,
                correct: 2,
                accuracy: 100.0,
            },
            CategoryAccuracy {
                category: "b".to_string(),
                total: 4,
                correct: 2,
                accuracy: 50.0,
            },
            CategoryAccuracy {
                category: "empty".to_string(),
                total: 0,
                correct: 0,
                accuracy: 0.0,
            },
        ];

        // (100 + 50) / 2, not (100 + 50 + 0) / 3.
        assert!((macro_accuracy(&breakdown).unwrap() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn macro_average_of_nothing_is_absent() {
        assert!(macro_accuracy(&[]).is_none());
    }

    #[test]
    fn by_category_counts_and_sorts() {
        let records = vec![
            record("temporal-reasoning", true),
            record("temporal-reasoning", false),
            record("knowledge-update", true),
        ];

        let breakdown = by_category(&records);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].category, "knowledge-update");
        assert_eq!(breakdown[0].accuracy, 100.0);
        assert_eq!(breakdown[1].category, "temporal-reasoning");
        assert_eq!(breakdown[1].total, 2);
        assert_eq!(breakdown[1].correct, 1);
    }

    #[test]
    fn effective_length_scans_from_the_largest_bucket() {
        // Per-bucket accuracies 95, 94, 90, 70, 40 at 1K..32K.
        let mut records = Vec::new();
        let cases = [
            (1_000, 95),
            (4_000, 94),
            (8_000, 90),
            (16_000, 70),
            (32_000, 40),
        ];
        for (nominal, correct_pct) in cases {
            for i in 0..100 {
                records.push(length_record(nominal, nominal, i < correct_pct));
            }
        }

        let curve = degradation_curve(&records).unwrap();
        assert!((curve.base_score - 95.0).abs() < f64::EPSILON);
        // Threshold is 80.75; 8K (90%) is the largest bucket above it.
        assert_eq!(curve.effective_length, Some(8_000));
    }

    #[test]
    fn measured_drift_within_tolerance_stays_in_the_nominal_bucket() {
        let records = vec![
            length_record(1_000, 1_150, true), // 15% over nominal
            length_record(1_000, 950, true),
        ];

        let curve = degradation_curve(&records).unwrap();
        assert_eq!(curve.buckets.len(), 1);
        assert_eq!(curve.buckets[0].total, 2);
    }

    #[test]
    fn drifted_record_moves_to_the_containing_bucket() {
        let records = vec![
            length_record(1_000, 1_000, true),
            length_record(4_000, 4_000, true),
            // Nominally 1K but measured near 4K: lands in the 4K bucket.
            length_record(1_000, 3_900, false),
        ];

        let curve = degradation_curve(&records).unwrap();
        let four_k = curve.buckets.iter().find(|b| b.nominal == 4_000).unwrap();
        assert_eq!(four_k.total, 2);
        assert_eq!(four_k.correct, 1);
    }

    #[test]
    fn record_outside_every_window_is_dropped() {
        let records = vec![
            length_record(1_000, 1_000, true),
            length_record(1_000, 600_000, true),
        ];

        let curve = degradation_curve(&records).unwrap();
        assert_eq!(curve.buckets[0].total, 1);
    }

    #[test]
    fn records_without_lengths_produce_no_curve() {
        let records = vec![record("default", true)];
        assert!(degradation_curve(&records).is_none());
    }
}
