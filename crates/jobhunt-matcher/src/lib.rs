//! Matching engine: scores scraped jobs against the candidate profile, gates
//! them on score and salary, and ranks the survivors.

pub mod config;
pub mod ranker;
pub mod salary;
pub mod scorer;
pub mod tfidf;

pub use config::{
    LocationRule, MatchBucket, MatchConfig, MatchConfigError, SalaryPolicy, ScoreThresholds,
    ScoringWeights,
};
pub use ranker::{filter_and_rank, partition_matches, Exclusion, ExclusionReason, RankOutcome};
pub use salary::{extract_job_salary, extract_monthly_salary, format_monthly_usd};
pub use scorer::{score, score_all, JobScorer, ScoreBreakdown};

pub const CRATE_NAME: &str = "jobhunt-matcher";
