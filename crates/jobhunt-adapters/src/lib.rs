//! Source adapter contract and the job-board adapters built on it.

use std::collections::HashSet;

use async_trait::async_trait;
use jobhunt_core::Job;
use jobhunt_storage::HttpFetcher;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

mod html;
mod reliefweb;
mod unjobs;

pub use html::{devex_adapter, developmentaid_adapter, ethiojobs_adapter, BoardSelectors, HtmlBoardAdapter};
pub use reliefweb::ReliefWebAdapter;
pub use unjobs::UnJobsAdapter;

pub const CRATE_NAME: &str = "jobhunt-adapters";

pub const DEFAULT_ENTRIES_PER_LISTING: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crawlability {
    PublicHtml,
    Rss,
}

impl Crawlability {
    pub fn label(self) -> &'static str {
        match self {
            Crawlability::PublicHtml => "html",
            Crawlability::Rss => "rss",
        }
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },
    #[error("{0}")]
    Message(String),
}

/// One posting as read off a listing page, before it becomes a [`Job`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingEntry {
    pub title: String,
    pub url: String,
    pub organization: String,
    pub location: String,
    /// Empty when the listing carries no body text; `run` then reads the detail page.
    pub description: String,
    pub posted_date: Option<String>,
    pub deadline: Option<String>,
    pub job_type: Option<String>,
}

impl ListingEntry {
    pub fn into_job(self, source_id: &str) -> Job {
        let mut job = Job::new(source_id, self.url, self.title)
            .with_organization(self.organization)
            .with_location(self.location)
            .with_description(&self.description);
        job.posted_date = self.posted_date;
        job.deadline = self.deadline;
        job.job_type = self.job_type;
        job
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &'static str;
    fn crawlability(&self) -> Crawlability;
    fn listing_urls(&self) -> Vec<String>;

    fn max_entries_per_listing(&self) -> usize {
        DEFAULT_ENTRIES_PER_LISTING
    }

    fn parse_listing(&self, page: &str) -> Result<Vec<ListingEntry>, AdapterError>;

    fn parse_detail(&self, html: &str) -> Option<String>;

    /// Fetch every listing page, fill missing descriptions from detail pages
    /// and return the source's jobs with duplicate ids removed. Failures are
    /// logged per page and never abort the run.
    async fn run(&self, http: &HttpFetcher) -> Vec<Job> {
        let source_id = self.source_id();
        let span = info_span!("adapter_run", source_id, via = self.crawlability().label());
        async move {
            let mut seen = HashSet::new();
            let mut jobs = Vec::new();
            for listing_url in self.listing_urls() {
                let page = match http.fetch_bytes(source_id, &listing_url).await {
                    Ok(page) => page.text(),
                    Err(err) => {
                        warn!(url = %listing_url, error = %err, "listing fetch failed");
                        continue;
                    }
                };
                let entries = match self.parse_listing(&page) {
                    Ok(entries) => entries,
                    Err(err) => {
                        warn!(url = %listing_url, error = %err, "listing parse failed");
                        continue;
                    }
                };
                debug!(url = %listing_url, entries = entries.len(), "parsed listing");

                for mut entry in entries.into_iter().take(self.max_entries_per_listing()) {
                    if entry.description.is_empty() {
                        entry.description = match http.fetch_bytes(source_id, &entry.url).await {
                            Ok(detail) => self.parse_detail(&detail.text()).unwrap_or_default(),
                            Err(err) => {
                                warn!(url = %entry.url, error = %err, "detail fetch failed");
                                String::new()
                            }
                        };
                    }
                    let job = entry.into_job(source_id);
                    if seen.insert(job.id.clone()) {
                        jobs.push(job);
                    }
                }
            }
            info!(jobs = jobs.len(), "source finished");
            jobs
        }
        .instrument(span)
        .await
    }
}

/// Every adapter, in the order the scrape step runs them.
pub fn all_adapters() -> Vec<Box<dyn SourceAdapter>> {
    vec![
        Box::new(ReliefWebAdapter::default()),
        Box::new(ethiojobs_adapter()),
        Box::new(UnJobsAdapter::default()),
        Box::new(devex_adapter()),
        Box::new(developmentaid_adapter()),
    ]
}

pub fn adapter_for_source(source_id: &str) -> Option<Box<dyn SourceAdapter>> {
    all_adapters()
        .into_iter()
        .find(|adapter| adapter.source_id() == source_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_order_is_fixed() {
        let ids: Vec<_> = all_adapters().iter().map(|a| a.source_id()).collect();
        assert_eq!(
            ids,
            vec!["reliefweb", "ethiojobs", "unjobs", "devex", "developmentaid"]
        );
    }

    #[test]
    fn lookup_by_source_id() {
        let adapter = adapter_for_source("reliefweb").expect("reliefweb adapter");
        assert_eq!(adapter.crawlability(), Crawlability::Rss);
        assert_eq!(adapter_for_source("devex").map(|a| a.max_entries_per_listing()), Some(25));
        assert!(adapter_for_source("linkedin").is_none());
        assert_eq!(adapter_for_source("unjobs").map(|a| a.crawlability().label()), Some("html"));
    }

    #[test]
    fn entry_becomes_truncated_job() {
        let entry = ListingEntry {
            title: "Program Manager".into(),
            url: "https://www.ethiojobs.net/job/1".into(),
            organization: "Save the Children".into(),
            location: "Addis Ababa".into(),
            description: "x".repeat(6000),
            deadline: Some("30 Nov".into()),
            ..ListingEntry::default()
        };
        let job = entry.into_job("ethiojobs");
        assert_eq!(job.source, "ethiojobs");
        assert_eq!(job.description.chars().count(), jobhunt_core::DESCRIPTION_MAX_CHARS);
        assert_eq!(job.id, Job::generate_id("https://www.ethiojobs.net/job/1", "Program Manager"));
        assert_eq!(job.deadline.as_deref(), Some("30 Nov"));
    }
}
