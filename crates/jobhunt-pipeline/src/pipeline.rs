use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use jobhunt_adapters::{adapter_for_source, all_adapters, Crawlability, SourceAdapter};
use jobhunt_core::{Job, Profile};
use jobhunt_matcher::{filter_and_rank, partition_matches, JobScorer, MatchConfig};
use jobhunt_storage::{load_profile, DataStore, HttpFetcher};
use tracing::{info, info_span, warn, Instrument};

use crate::config::PipelineConfig;
use crate::cover_letter::{CoverLetterGenerator, GenerateSummary};
use crate::llm::{LetterDrafter, LlmClient};
use crate::notify::{deliver, render_digest, sample_job, DigestStats, Mailer, SendGridMailer};

pub const TOP_MATCHES: usize = 10;
pub const APPLY_LISTING: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCount {
    pub source_id: String,
    pub crawlability: Crawlability,
    pub jobs: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub per_source: Vec<SourceCount>,
    pub scraped: usize,
    pub new_jobs: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchSummary {
    pub scored: usize,
    pub matches: usize,
    pub high: usize,
    pub good: usize,
    pub excluded: usize,
    pub top: Vec<Job>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub scrape: ScrapeSummary,
    pub matched: MatchSummary,
    pub generate: GenerateSummary,
    /// `None` when there was nothing to notify about.
    pub notified: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    NoMatches,
    /// No selector given: the first matches to choose from.
    Listing(Vec<Job>),
    NotFound(String),
    Generated { job: Job, path: PathBuf },
    Failed { job: Job, reason: String },
}

/// Resolve a 1-based index or a case-insensitive title/organization substring.
pub fn find_match(matches: &[Job], selector: &str) -> Option<usize> {
    if let Ok(n) = selector.trim().parse::<usize>() {
        return (1..=matches.len()).contains(&n).then(|| n - 1);
    }
    let needle = selector.to_lowercase();
    matches.iter().position(|job| {
        job.title.to_lowercase().contains(&needle) || job.organization.to_lowercase().contains(&needle)
    })
}

pub struct Pipeline {
    config: PipelineConfig,
    store: DataStore,
    http: HttpFetcher,
    adapters: Vec<Box<dyn SourceAdapter>>,
    drafter: Option<Box<dyn LetterDrafter>>,
    mailer: Option<Box<dyn Mailer>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let http = HttpFetcher::new(config.http_client_config())?;
        let drafter = match &config.anthropic_api_key {
            Some(key) => Some(Box::new(LlmClient::new(key.clone(), config.llm_model.clone())?)
                as Box<dyn LetterDrafter>),
            None => None,
        };
        let mailer = config.sendgrid_api_key.as_ref().map(|key| {
            Box::new(SendGridMailer::new(
                http.client().clone(),
                key.clone(),
                config.email_from.clone(),
            )) as Box<dyn Mailer>
        });
        Ok(Self {
            store: DataStore::new(config.data_dir.clone()),
            config,
            http,
            adapters: all_adapters(),
            drafter,
            mailer,
        })
    }

    pub fn with_adapters(mut self, adapters: Vec<Box<dyn SourceAdapter>>) -> Self {
        self.adapters = adapters;
        self
    }

    /// Keep only the built-in adapter for `source_id`.
    pub fn only_source(self, source_id: &str) -> Result<Self> {
        let adapter = adapter_for_source(source_id).ok_or_else(|| {
            let known: Vec<&str> = all_adapters().iter().map(|a| a.source_id()).collect();
            anyhow!("unknown source {source_id:?}; expected one of {}", known.join(", "))
        })?;
        Ok(self.with_adapters(vec![adapter]))
    }

    pub fn with_drafter(mut self, drafter: Option<Box<dyn LetterDrafter>>) -> Self {
        self.drafter = drafter;
        self
    }

    pub fn with_mailer(mut self, mailer: Option<Box<dyn Mailer>>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    fn match_config(&self) -> Result<MatchConfig> {
        self.config
            .load_match_config()
            .context("loading matching configuration")
    }

    async fn profile(&self) -> Result<Profile> {
        load_profile(self.store.profile_path())
            .await
            .context("loading CV profile")
    }

    /// Run every adapter and append unseen jobs to the stored collection.
    pub async fn scrape(&self) -> Result<ScrapeSummary> {
        self.scrape_stage().instrument(info_span!("scrape")).await
    }

    async fn scrape_stage(&self) -> Result<ScrapeSummary> {
        let mut collection = self.store.load_jobs().await?;
        let mut summary = ScrapeSummary::default();
        let mut scraped = Vec::new();
        for adapter in &self.adapters {
            let jobs = adapter.run(&self.http).await;
            summary.per_source.push(SourceCount {
                source_id: adapter.source_id().to_string(),
                crawlability: adapter.crawlability(),
                jobs: jobs.len(),
            });
            scraped.extend(jobs);
        }

        let merged = collection.merge(scraped);
        self.store.save_jobs(&mut collection).await?;
        summary.scraped = merged.incoming;
        summary.new_jobs = merged.new_jobs.len();
        summary.total = merged.total;
        info!(
            scraped = summary.scraped,
            new_jobs = summary.new_jobs,
            total = summary.total,
            "scrape finished"
        );
        Ok(summary)
    }

    /// Score every stored job, persist the scores, then persist the ranked
    /// matches. Cover letter paths from the previous match set carry over.
    pub async fn match_jobs(&self) -> Result<MatchSummary> {
        self.match_jobs_stage().instrument(info_span!("match")).await
    }

    async fn match_jobs_stage(&self) -> Result<MatchSummary> {
        let mut collection = self.store.load_jobs().await?;
        if collection.is_empty() {
            warn!("no jobs to match; run scrape first");
            return Ok(MatchSummary::default());
        }
        let profile = self.profile().await?;
        let config = self.match_config()?;
        let scorer = JobScorer::new(profile, config.clone()).context("building scorer")?;

        let jobs = std::mem::take(&mut collection.jobs);
        collection.jobs = scorer.score_all(jobs);
        self.store.save_jobs(&mut collection).await?;

        let previous_letters: HashMap<String, String> = self
            .store
            .load_matches()
            .await?
            .into_iter()
            .filter_map(|job| job.cover_letter_path.map(|path| (job.id, path)))
            .collect();

        let mut outcome = filter_and_rank(collection.jobs.clone(), &config);
        for job in &mut outcome.matches {
            if job.cover_letter_path.is_none() {
                job.cover_letter_path = previous_letters.get(&job.id).cloned();
            }
        }
        self.store.save_matches(&outcome.matches).await?;

        let (high, good) = partition_matches(&outcome.matches, &config.thresholds);
        let summary = MatchSummary {
            scored: collection.len(),
            matches: outcome.matches.len(),
            high: high.len(),
            good: good.len(),
            excluded: outcome.exclusions.len(),
            top: outcome.matches.iter().take(TOP_MATCHES).cloned().collect(),
        };
        info!(
            scored = summary.scored,
            high = summary.high,
            good = summary.good,
            "match finished"
        );
        Ok(summary)
    }

    pub async fn generate(&self) -> Result<GenerateSummary> {
        self.generate_stage().instrument(info_span!("generate")).await
    }

    async fn generate_stage(&self) -> Result<GenerateSummary> {
        let Some(drafter) = self.drafter.as_deref() else {
            warn!("no ANTHROPIC_API_KEY configured; skipping cover letters");
            return Ok(GenerateSummary {
                skipped: Some("no ANTHROPIC_API_KEY configured".to_string()),
                ..GenerateSummary::default()
            });
        };
        let mut matches = self.store.load_matches().await?;
        if matches.is_empty() {
            info!("no matches found; run match first");
            return Ok(GenerateSummary::default());
        }
        let profile = self.profile().await?;
        let config = self.match_config()?;

        let generator = CoverLetterGenerator::new(drafter, &profile, &self.store);
        let summary = generator
            .generate_for_high_matches(
                &mut matches,
                config.thresholds.high,
                self.config.max_cover_letters,
            )
            .await;
        self.store.save_matches(&matches).await?;
        info!(
            generated = summary.generated.len(),
            failed = summary.failed,
            "generate finished"
        );
        Ok(summary)
    }

    /// Send the digest of stored matches; `false` when nothing was sent.
    pub async fn notify(&self) -> Result<bool> {
        self.notify_stage().instrument(info_span!("notify")).await
    }

    async fn notify_stage(&self) -> Result<bool> {
        let matches = self.store.load_matches().await?;
        if matches.is_empty() {
            info!("no matches to notify about");
            return Ok(false);
        }
        let scanned = self.store.load_jobs().await?.len();
        let config = self.match_config()?;
        let (high, good) = partition_matches(&matches, &config.thresholds);
        let stats = DigestStats {
            total_scanned: scanned,
            high_matches: high.len(),
            good_matches: good.len(),
            cover_letters: matches
                .iter()
                .filter(|job| job.cover_letter_path.is_some())
                .count(),
        };
        let digest = render_digest(&high, &good, stats, &config.thresholds, Utc::now())?;
        Ok(deliver(self.mailer.as_deref(), self.config.email_to.as_deref(), &digest).await)
    }

    pub async fn test_email(&self) -> Result<bool> {
        let config = self.match_config()?;
        let job = sample_job();
        let stats = DigestStats {
            total_scanned: 100,
            high_matches: 1,
            good_matches: 5,
            cover_letters: 1,
        };
        let digest = render_digest(&[&job], &[], stats, &config.thresholds, Utc::now())?;
        Ok(deliver(self.mailer.as_deref(), self.config.email_to.as_deref(), &digest).await)
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let started = Utc::now();
        info!(%started, "pipeline started");
        let scrape = self.scrape().await?;
        let matched = self.match_jobs().await?;
        let generate = self.generate().await?;
        let notified = if matched.matches > 0 {
            Some(self.notify().await?)
        } else {
            None
        };
        info!(finished = %Utc::now(), "pipeline complete");
        Ok(RunSummary {
            scrape,
            matched,
            generate,
            notified,
        })
    }

    /// Draft a letter for one chosen match, or list candidates when no
    /// selector is given.
    pub async fn apply(&self, selector: Option<&str>) -> Result<ApplyOutcome> {
        let mut matches = self.store.load_matches().await?;
        if matches.is_empty() {
            return Ok(ApplyOutcome::NoMatches);
        }
        let Some(selector) = selector.filter(|s| !s.trim().is_empty()) else {
            matches.truncate(APPLY_LISTING);
            return Ok(ApplyOutcome::Listing(matches));
        };
        let Some(idx) = find_match(&matches, selector) else {
            return Ok(ApplyOutcome::NotFound(selector.to_string()));
        };
        let Some(drafter) = self.drafter.as_deref() else {
            return Ok(ApplyOutcome::Failed {
                job: matches.swap_remove(idx),
                reason: "no ANTHROPIC_API_KEY configured".to_string(),
            });
        };

        let profile = self.profile().await?;
        let generator = CoverLetterGenerator::new(drafter, &profile, &self.store);
        match generator.generate_and_save(&mut matches[idx]).await {
            Ok(path) => {
                self.store.save_matches(&matches).await?;
                Ok(ApplyOutcome::Generated {
                    job: matches.swap_remove(idx),
                    path,
                })
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "cover letter failed");
                Ok(ApplyOutcome::Failed {
                    job: matches.swap_remove(idx),
                    reason: format!("{err:#}"),
                })
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<Job>> {
        self.store.load_matches().await
    }
}

/// One full pipeline run from a fresh [`Pipeline`].
pub async fn run_once(config: PipelineConfig) -> Result<RunSummary> {
    Pipeline::new(config)?.run().await
}
