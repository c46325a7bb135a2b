//! HTML match digest and delivery through the SendGrid v3 mail API.

use askama::Template;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobhunt_core::Job;
use jobhunt_matcher::{MatchBucket, ScoreThresholds};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const SENDER_NAME: &str = "Job Hunter";
pub const DIGEST_SECTION_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("rendering digest: {0}")]
    Render(#[from] askama::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mail API rejected message (status {status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigestStats {
    pub total_scanned: usize,
    pub high_matches: usize,
    pub good_matches: usize,
    pub cover_letters: usize,
}

/// Display fields for one job card.
#[derive(Debug, Clone)]
pub struct DigestJob {
    pub title: String,
    pub url: String,
    pub organization: String,
    pub location: String,
    pub deadline: String,
    pub badge: &'static str,
    pub color: &'static str,
    pub score: String,
    pub cover_letter: String,
}

impl DigestJob {
    fn from_job(job: &Job, thresholds: &ScoreThresholds, with_letter: bool) -> Self {
        let score = job.score_or_zero();
        let (badge, color) = match thresholds.bucket(score) {
            MatchBucket::High => ("HIGH MATCH", "#22c55e"),
            MatchBucket::Good => ("GOOD MATCH", "#eab308"),
            MatchBucket::Below => ("MATCH", "#6b7280"),
        };
        let location = if job.location.trim().is_empty() {
            "Location not specified".to_string()
        } else {
            job.location.clone()
        };
        Self {
            title: job.title.clone(),
            url: job.url.clone(),
            organization: job.organization.clone(),
            location,
            deadline: job.deadline.clone().unwrap_or_default(),
            badge,
            color,
            score: format!("{score:.0}"),
            cover_letter: with_letter
                .then(|| job.cover_letter_path.clone())
                .flatten()
                .unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "digest.html")]
struct DigestTemplate<'a> {
    date: String,
    high: &'a [DigestJob],
    good: &'a [DigestJob],
    stats: DigestStats,
}

#[derive(Debug, Clone)]
pub struct Digest {
    pub subject: String,
    pub html: String,
}

/// Render the digest. Each section shows at most [`DIGEST_SECTION_LIMIT`]
/// jobs; only high matches link their cover letters.
pub fn render_digest(
    high: &[&Job],
    good: &[&Job],
    stats: DigestStats,
    thresholds: &ScoreThresholds,
    at: DateTime<Utc>,
) -> Result<Digest, NotifyError> {
    let high: Vec<DigestJob> = high
        .iter()
        .take(DIGEST_SECTION_LIMIT)
        .map(|job| DigestJob::from_job(job, thresholds, true))
        .collect();
    let good: Vec<DigestJob> = good
        .iter()
        .take(DIGEST_SECTION_LIMIT)
        .map(|job| DigestJob::from_job(job, thresholds, false))
        .collect();
    let html = DigestTemplate {
        date: at.format("%B %d, %Y").to_string(),
        high: &high,
        good: &good,
        stats,
    }
    .render()?;
    Ok(Digest {
        subject: format!(
            "{} New Job Matches - {}",
            high.len() + good.len(),
            at.format("%b %d, %Y")
        ),
        html,
    })
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, digest: &Digest) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone)]
pub struct SendGridMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl SendGridMailer {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            from: from.into(),
        }
    }

    fn payload(&self, to: &str, digest: &Digest) -> serde_json::Value {
        json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": self.from, "name": SENDER_NAME },
            "subject": digest.subject,
            "content": [{ "type": "text/html", "value": digest.html }],
        })
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, to: &str, digest: &Digest) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(SENDGRID_URL)
            .bearer_auth(&self.api_key)
            .json(&self.payload(to, digest))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        info!(status = status.as_u16(), "digest accepted by mail API");
        Ok(())
    }
}

/// Deliver a rendered digest. Missing mailer or recipient and delivery
/// failures are logged and reported as `false`.
pub async fn deliver(mailer: Option<&dyn Mailer>, to: Option<&str>, digest: &Digest) -> bool {
    let Some(mailer) = mailer else {
        warn!("no SendGrid API key configured; digest not sent");
        return false;
    };
    let Some(to) = to.filter(|t| !t.trim().is_empty()) else {
        warn!("no recipient configured; digest not sent");
        return false;
    };
    match mailer.send(to, digest).await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "sending digest failed");
            false
        }
    }
}

/// Placeholder posting used by the test e-mail.
pub fn sample_job() -> Job {
    let mut job = Job::new(
        "test",
        "https://example.com/job/test",
        "Program Director - Test Position",
    )
    .with_organization("Test Organization")
    .with_location("Addis Ababa, Ethiopia")
    .with_description("This is a test job posting.");
    job.id = "test123".to_string();
    job.score = Some(85.0);
    job
}
