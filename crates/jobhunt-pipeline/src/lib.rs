//! Scrape, match, cover-letter and digest stages wired over the storage,
//! adapter and matcher crates.

pub mod config;
pub mod cover_letter;
pub mod llm;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod scheduler;

pub use config::PipelineConfig;
pub use cover_letter::{CoverLetterGenerator, GenerateSummary};
pub use llm::{LetterDrafter, LlmClient, LlmError};
pub use notify::{Digest, DigestStats, Mailer, NotifyError, SendGridMailer};
pub use pipeline::{
    find_match, run_once, ApplyOutcome, MatchSummary, Pipeline, RunSummary, ScrapeSummary,
    SourceCount,
};
pub use jobhunt_matcher::ScoreThresholds;
pub use scheduler::maybe_build_scheduler;

pub const CRATE_NAME: &str = "jobhunt-pipeline";
