//! Threshold + salary filtering and deterministic ranking of scored jobs.

use std::fmt;

use jobhunt_core::Job;
use tracing::{debug, info};

use crate::config::{MatchBucket, MatchConfig, ScoreThresholds};
use crate::salary::{extract_job_salary, format_monthly_usd, SalaryDecision};

#[derive(Debug, Clone, PartialEq)]
pub enum ExclusionReason {
    BelowScore { score: f64, threshold: f64 },
    SalaryBelowMinimum { monthly_usd: f64, minimum: f64 },
    SalaryMissing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub job_id: String,
    pub title: String,
    pub reason: ExclusionReason,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ExclusionReason::BelowScore { score, threshold } => write!(
                f,
                "excluded (score {score:.1} < {threshold:.1}): {}",
                self.title
            ),
            ExclusionReason::SalaryBelowMinimum {
                monthly_usd,
                minimum,
            } => write!(
                f,
                "excluded (salary ${monthly_usd:.0} < ${minimum:.0}): {}",
                self.title
            ),
            ExclusionReason::SalaryMissing => {
                write!(f, "excluded (no salary listed): {}", self.title)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RankOutcome {
    pub matches: Vec<Job>,
    pub exclusions: Vec<Exclusion>,
}

/// Drop jobs under the low threshold or failing the salary gate, then sort
/// survivors by descending score. The sort is stable, so ties keep the order
/// the jobs were scored in. Extracted salaries replace `job.salary` with a
/// normalized display string.
pub fn filter_and_rank(jobs: Vec<Job>, config: &MatchConfig) -> RankOutcome {
    let mut outcome = RankOutcome::default();
    let low = config.thresholds.low;

    for mut job in jobs {
        let score = job.score_or_zero();
        if score < low {
            debug!(job_id = %job.id, score, threshold = low, "below score threshold");
            outcome.exclusions.push(Exclusion {
                job_id: job.id,
                title: job.title,
                reason: ExclusionReason::BelowScore {
                    score,
                    threshold: low,
                },
            });
            continue;
        }

        // The gate sees the whole-dollar figure the display string carries.
        let monthly = extract_job_salary(&job).map(f64::round);
        if let Some(monthly) = monthly {
            job.salary = Some(format_monthly_usd(monthly));
        }
        let reason = match config.salary.evaluate(monthly) {
            SalaryDecision::Passed { .. } => {
                outcome.matches.push(job);
                continue;
            }
            SalaryDecision::BelowMinimum {
                monthly_usd,
                minimum,
            } => ExclusionReason::SalaryBelowMinimum {
                monthly_usd,
                minimum,
            },
            SalaryDecision::Missing => ExclusionReason::SalaryMissing,
        };
        let exclusion = Exclusion {
            job_id: job.id,
            title: job.title,
            reason,
        };
        info!(job_id = %exclusion.job_id, "{exclusion}");
        outcome.exclusions.push(exclusion);
    }

    outcome
        .matches
        .sort_by(|a, b| b.score_or_zero().total_cmp(&a.score_or_zero()));
    outcome
}

/// Split a ranked set into (high, good) buckets without reordering.
pub fn partition_matches<'a>(
    matches: &'a [Job],
    thresholds: &ScoreThresholds,
) -> (Vec<&'a Job>, Vec<&'a Job>) {
    let mut high = Vec::new();
    let mut good = Vec::new();
    for job in matches {
        match thresholds.bucket(job.score_or_zero()) {
            MatchBucket::High => high.push(job),
            MatchBucket::Good => good.push(job),
            MatchBucket::Below => {}
        }
    }
    (high, good)
}
