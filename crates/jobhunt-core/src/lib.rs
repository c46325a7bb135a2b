//! Core domain model for the job hunter: postings, the candidate profile and
//! the id-keyed job collection shared by every other crate.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const CRATE_NAME: &str = "jobhunt-core";

/// Adapters cut descriptions to this many characters before handing jobs on.
pub const DESCRIPTION_MAX_CHARS: usize = 5000;

const JOB_ID_HEX_LEN: usize = 12;

/// A single scraped job advertisement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    pub source: String,
    #[serde(default)]
    pub posted_date: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub experience_required: Option<String>,
    #[serde(default = "Utc::now")]
    pub scraped_at: DateTime<Utc>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub cover_letter_path: Option<String>,
}

impl Job {
    /// Build a posting with its identity fields set; everything optional starts empty.
    pub fn new(
        source: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let url = url.into();
        let title = title.into();
        Self {
            id: Self::generate_id(&url, &title),
            title,
            organization: String::new(),
            location: String::new(),
            description: String::new(),
            url,
            source: source.into(),
            posted_date: None,
            deadline: None,
            salary: None,
            job_type: None,
            experience_required: None,
            scraped_at: Utc::now(),
            score: None,
            cover_letter_path: None,
        }
    }

    /// Stable id over `(url, title)`; the deduplication key across runs.
    pub fn generate_id(url: &str, title: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{url}:{title}").as_bytes());
        let mut id = hex::encode(hasher.finalize());
        id.truncate(JOB_ID_HEX_LEN);
        id
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = organization.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = truncate_chars(description, DESCRIPTION_MAX_CHARS);
        self
    }

    pub fn score_or_zero(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }
}

/// Cut `text` to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Structured candidate profile, loaded once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub target_roles: Vec<String>,
    pub target_locations: Vec<String>,
    pub years_experience: u32,
    pub skills: Vec<String>,
    pub certifications: Vec<String>,
    pub languages: Vec<String>,
    pub sectors: Vec<String>,
    pub organizations_worked: Vec<String>,
    pub donors_experience: Vec<String>,
    pub keywords_boost: Vec<String>,
}

impl Profile {
    /// Text the similarity model is fit on.
    pub fn skills_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        parts.extend(self.skills.iter().cloned());
        parts.extend(self.sectors.iter().cloned());
        parts.extend(self.donors_experience.iter().cloned());
        parts.extend(self.target_roles.iter().map(|role| format!("{role} experience")));
        parts.extend(self.keywords_boost.iter().cloned());
        parts.join(" ")
    }

    pub fn all_keywords(&self) -> Vec<String> {
        self.target_roles
            .iter()
            .chain(&self.skills)
            .chain(&self.sectors)
            .chain(&self.donors_experience)
            .chain(&self.keywords_boost)
            .chain(&self.certifications)
            .map(|k| k.to_lowercase())
            .collect()
    }
}

/// Ordered job set keyed by [`Job::id`] plus the time it was last written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobCollection {
    pub jobs: Vec<Job>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeSummary {
    pub incoming: usize,
    pub new_jobs: Vec<Job>,
    pub total: usize,
}

impl JobCollection {
    pub fn new(jobs: Vec<Job>, last_updated: Option<DateTime<Utc>>) -> Self {
        Self { jobs, last_updated }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.jobs.iter().any(|job| job.id == id)
    }

    /// Append jobs whose id is not yet present. First write wins, including
    /// duplicates inside `incoming`; the relative scrape order is preserved.
    pub fn merge(&mut self, incoming: Vec<Job>) -> MergeSummary {
        let incoming_count = incoming.len();
        let mut seen: HashSet<String> = self.jobs.iter().map(|job| job.id.clone()).collect();
        let mut new_jobs = Vec::new();
        for job in incoming {
            if seen.insert(job.id.clone()) {
                new_jobs.push(job);
            }
        }
        self.jobs.extend(new_jobs.iter().cloned());
        MergeSummary {
            incoming: incoming_count,
            new_jobs,
            total: self.jobs.len(),
        }
    }
}
