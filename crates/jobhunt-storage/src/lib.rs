//! Flat-file persistence and throttled HTTP fetching for the job hunter.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use jobhunt_core::{Job, JobCollection, Profile};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

pub use reqwest::Url;

pub const CRATE_NAME: &str = "jobhunt-storage";

pub const JOBS_FILE: &str = "jobs.json";
pub const MATCHES_FILE: &str = "matches.json";
pub const PROFILE_FILE: &str = "cv_profile.json";
pub const COVER_LETTERS_DIR: &str = "cover_letters";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("CV profile not found: {0}")]
    NotFound(PathBuf),
    #[error("reading CV profile {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid CV profile {path}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct JobsFile {
    jobs: Vec<Job>,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MatchesFile {
    matches: Vec<Job>,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

/// JSON files under one data directory. Writes go through a temp file and an
/// atomic rename so a crash never leaves a half-written collection behind.
#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.root.join(JOBS_FILE)
    }

    pub fn matches_path(&self) -> PathBuf {
        self.root.join(MATCHES_FILE)
    }

    pub fn profile_path(&self) -> PathBuf {
        self.root.join(PROFILE_FILE)
    }

    pub fn cover_letters_dir(&self) -> PathBuf {
        self.root.join(COVER_LETTERS_DIR)
    }

    pub async fn load_jobs(&self) -> anyhow::Result<JobCollection> {
        let path = self.jobs_path();
        match read_optional_json::<JobsFile>(&path).await? {
            Some(file) => Ok(JobCollection::new(file.jobs, file.last_updated)),
            None => Ok(JobCollection::default()),
        }
    }

    /// Persist `jobs` and stamp the collection with the write time.
    pub async fn save_jobs(&self, jobs: &mut JobCollection) -> anyhow::Result<()> {
        let now = Utc::now();
        let file = JobsFile {
            jobs: std::mem::take(&mut jobs.jobs),
            last_updated: Some(now),
        };
        let result = self.write_json(&self.jobs_path(), &file).await;
        jobs.jobs = file.jobs;
        if result.is_ok() {
            jobs.last_updated = Some(now);
        }
        result
    }

    pub async fn load_matches(&self) -> anyhow::Result<Vec<Job>> {
        let path = self.matches_path();
        Ok(read_optional_json::<MatchesFile>(&path)
            .await?
            .map(|file| file.matches)
            .unwrap_or_default())
    }

    pub async fn save_matches(&self, matches: &[Job]) -> anyhow::Result<()> {
        #[derive(Serialize)]
        struct MatchesRef<'a> {
            matches: &'a [Job],
            last_updated: DateTime<Utc>,
        }
        let file = MatchesRef {
            matches,
            last_updated: Utc::now(),
        };
        self.write_json(&self.matches_path(), &file).await
    }

    pub async fn write_cover_letter(&self, file_name: &str, contents: &str) -> anyhow::Result<PathBuf> {
        let path = self.cover_letters_dir().join(file_name);
        write_atomic(&path, contents.as_bytes()).await?;
        Ok(path)
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(value)
            .with_context(|| format!("serializing {}", path.display()))?;
        write_atomic(path, &bytes).await
    }
}

/// Load the candidate profile; any failure is a fatal configuration error.
pub async fn load_profile(path: impl AsRef<Path>) -> Result<Profile, ProfileError> {
    let path = path.as_ref();
    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ProfileError::NotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(ProfileError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&text).map_err(|source| ProfileError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

async fn read_optional_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };
    let value = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(value))
}

/// Write via a sibling temp file and rename over the destination.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("creating directory {}", parent.display()))?;

    let temp_path = parent.join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));
    let mut file = fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&temp_path)
        .await
        .with_context(|| format!("opening temp file {}", temp_path.display()))?;
    file.write_all(bytes)
        .await
        .with_context(|| format!("writing temp file {}", temp_path.display()))?;
    file.flush()
        .await
        .with_context(|| format!("flushing temp file {}", temp_path.display()))?;
    drop(file);

    if let Err(err) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(err).with_context(|| {
            format!(
                "atomically renaming {} -> {}",
                temp_path.display(),
                path.display()
            )
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub global_concurrency: usize,
    pub per_source_concurrency: usize,
    pub backoff: BackoffPolicy,
    /// Minimum spacing between requests to the same source.
    pub per_source_delay: Option<Duration>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            global_concurrency: 8,
            per_source_concurrency: 1,
            backoff: BackoffPolicy::default(),
            per_source_delay: Some(Duration::from_secs(2)),
        }
    }
}

/// Single-token bucket: one request per `refill_every` per source.
#[derive(Debug)]
pub struct RequestSpacer {
    refill_every: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestSpacer {
    pub fn new(refill_every: Duration) -> Self {
        Self {
            refill_every,
            last_request: Mutex::new(None),
        }
    }

    pub async fn take(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.refill_every {
                tokio::time::sleep(self.refill_every - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug)]
struct SourceLimits {
    semaphore: Arc<Semaphore>,
    spacer: Option<Arc<RequestSpacer>>,
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    global_limit: Arc<Semaphore>,
    per_source_limit: usize,
    per_source_delay: Option<Duration>,
    per_source: Mutex<HashMap<String, SourceLimits>>,
    backoff: BackoffPolicy,
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed after retries: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;

        Ok(Self {
            client,
            global_limit: Arc::new(Semaphore::new(config.global_concurrency.max(1))),
            per_source_limit: config.per_source_concurrency.max(1),
            per_source_delay: config.per_source_delay,
            per_source: Mutex::new(HashMap::new()),
            backoff: config.backoff,
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn source_limits(&self, source_id: &str) -> (Arc<Semaphore>, Option<Arc<RequestSpacer>>) {
        let mut map = self.per_source.lock().await;
        let limits = map.entry(source_id.to_string()).or_insert_with(|| SourceLimits {
            semaphore: Arc::new(Semaphore::new(self.per_source_limit)),
            spacer: self.per_source_delay.map(|d| Arc::new(RequestSpacer::new(d))),
        });
        (limits.semaphore.clone(), limits.spacer.clone())
    }

    pub async fn fetch_bytes(&self, source_id: &str, url: &str) -> Result<FetchedResponse, FetchError> {
        let span = info_span!("http_fetch", source_id, url);
        self.fetch_with_retries(source_id, url).instrument(span).await
    }

    async fn fetch_with_retries(&self, source_id: &str, url: &str) -> Result<FetchedResponse, FetchError> {
        let _global = self.global_limit.acquire().await.expect("semaphore not closed");
        let (per_source, spacer) = self.source_limits(source_id).await;
        let _source = per_source.acquire().await.expect("semaphore not closed");

        let mut attempt = 0;
        loop {
            if let Some(spacer) = &spacer {
                spacer.take().await;
            }
            let retryable = match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let final_url = resp.url().to_string();
                    if status.is_success() {
                        let body = resp.bytes().await?.to_vec();
                        return Ok(FetchedResponse {
                            status,
                            final_url,
                            body,
                        });
                    }
                    if classify_status(status) == RetryDisposition::NonRetryable
                        || attempt >= self.backoff.max_retries
                    {
                        return Err(FetchError::HttpStatus {
                            status: status.as_u16(),
                            url: final_url,
                        });
                    }
                    status.to_string()
                }
                Err(err) => {
                    if classify_reqwest_error(&err) == RetryDisposition::NonRetryable
                        || attempt >= self.backoff.max_retries
                    {
                        return Err(FetchError::Request(err));
                    }
                    err.to_string()
                }
            };
            let delay = self.backoff.delay_for_attempt(attempt);
            debug!(attempt, ?delay, reason = %retryable, "retrying fetch");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_files_load_as_empty() {
        let dir = tempdir().expect("tempdir");
        let store = DataStore::new(dir.path());
        assert!(store.load_jobs().await.expect("jobs").is_empty());
        assert!(store.load_matches().await.expect("matches").is_empty());
    }

    #[tokio::test]
    async fn jobs_round_trip_with_timestamp() {
        let dir = tempdir().expect("tempdir");
        let store = DataStore::new(dir.path().join("data"));
        let mut job = Job::new("reliefweb", "https://reliefweb.int/job/1", "Program Director");
        job.score = Some(73.5);
        let mut collection = JobCollection::new(vec![job.clone()], None);

        store.save_jobs(&mut collection).await.expect("save");
        assert!(collection.last_updated.is_some());
        assert_eq!(collection.jobs, vec![job.clone()]);

        let loaded = store.load_jobs().await.expect("load");
        assert_eq!(loaded.jobs, vec![job]);
        assert_eq!(loaded.last_updated, collection.last_updated);
    }

    #[tokio::test]
    async fn matches_are_stored_under_their_own_key() {
        let dir = tempdir().expect("tempdir");
        let store = DataStore::new(dir.path());
        let job = Job::new("devex", "https://devex.com/jobs/9", "Chief of Party");
        store.save_matches(std::slice::from_ref(&job)).await.expect("save");

        let raw = std::fs::read_to_string(store.matches_path()).expect("read");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert!(value.get("matches").is_some());
        assert!(value.get("last_updated").is_some());
        assert_eq!(store.load_matches().await.expect("load"), vec![job]);
    }

    #[tokio::test]
    async fn profile_errors_are_typed() {
        let dir = tempdir().expect("tempdir");
        let missing = load_profile(dir.path().join("cv_profile.json")).await.unwrap_err();
        assert!(matches!(missing, ProfileError::NotFound(_)));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").expect("write");
        assert!(matches!(
            load_profile(&bad).await.unwrap_err(),
            ProfileError::Invalid { .. }
        ));

        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"{"target_roles":["Program Director"],"years_experience":8}"#)
            .expect("write");
        let profile = load_profile(&good).await.expect("profile");
        assert_eq!(profile.years_experience, 8);
    }

    #[tokio::test]
    async fn cover_letters_are_written_atomically() {
        let dir = tempdir().expect("tempdir");
        let store = DataStore::new(dir.path());
        let path = store
            .write_cover_letter("20260101_Advisor_abc.md", "Dear Hiring Manager,")
            .await
            .expect("write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "Dear Hiring Manager,");
        let leftovers = std::fs::read_dir(store.cover_letters_dir())
            .expect("dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = BackoffPolicy {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
        };
        let delays: Vec<u64> = (0..5)
            .map(|attempt| policy.delay_for_attempt(attempt).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 4, 4]);
    }

    #[test]
    fn server_errors_and_throttling_are_retryable() {
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), RetryDisposition::Retryable);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), RetryDisposition::Retryable);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), RetryDisposition::NonRetryable);
    }

    #[tokio::test(start_paused = true)]
    async fn request_spacer_enforces_minimum_gap() {
        let spacer = RequestSpacer::new(Duration::from_secs(2));
        let start = tokio::time::Instant::now();
        spacer.take().await;
        spacer.take().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
