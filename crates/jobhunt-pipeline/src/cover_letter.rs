//! Cover letter prompting, file naming and persistence.

use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use jobhunt_core::{truncate_chars, Job, Profile};
use jobhunt_storage::DataStore;
use tracing::{info, warn};

use crate::llm::LetterDrafter;

const PROMPT_SKILLS: usize = 10;
const PROMPT_DESCRIPTION_CHARS: usize = 3000;
const SAFE_TITLE_CHARS: usize = 50;
const PROMPT_KEYWORDS: usize = 10;

/// Profile keywords that also appear in the posting's title or description,
/// first occurrence order, without repeats.
pub fn shared_keywords(profile: &Profile, job: &Job) -> Vec<String> {
    let text = format!("{} {}", job.title, job.description).to_lowercase();
    let mut shared: Vec<String> = Vec::new();
    for keyword in profile.all_keywords() {
        let keyword = keyword.trim();
        if keyword.is_empty() || !text.contains(keyword) || shared.iter().any(|k| k == keyword) {
            continue;
        }
        shared.push(keyword.to_string());
        if shared.len() == PROMPT_KEYWORDS {
            break;
        }
    }
    shared
}

pub fn build_prompt(profile: &Profile, job: &Job) -> String {
    let skills: Vec<&str> = profile
        .skills
        .iter()
        .take(PROMPT_SKILLS)
        .map(String::as_str)
        .collect();
    format!(
        "You are a professional cover letter writer. Write a compelling cover letter for the following job application.

## Candidate Profile
- Name: {name}
- Years of Experience: {years}
- Key Skills: {skills}
- Sectors: {sectors}
- Languages: {languages}
- Certifications: {certifications}
- Previous Organizations: {organizations}
- Donor Experience: {donors}

## Job Details
- Title: {title}
- Organization: {organization}
- Location: {location}
- Keywords In Common: {shared}
- Job Description:
{description}

## Instructions
1. Write a professional cover letter (300-400 words)
2. Address specific requirements from the job description
3. Highlight relevant experience from the candidate's background
4. Show enthusiasm for the organization's mission
5. Be specific and avoid generic statements
6. Use a professional but warm tone
7. Include a strong opening and closing

Format the letter with proper structure:
- Opening paragraph (why this role/organization)
- 1-2 body paragraphs (relevant experience and skills)
- Closing paragraph (call to action)

Do NOT include:
- Placeholder brackets like [Organization Name]
- Generic phrases like \"I am writing to apply\"
- The date or address header

Start directly with \"Dear Hiring Manager,\" or \"Dear [Position] Selection Committee,\"
",
        name = profile.name,
        years = profile.years_experience,
        skills = skills.join(", "),
        sectors = profile.sectors.join(", "),
        languages = profile.languages.join(", "),
        certifications = profile.certifications.join(", "),
        organizations = profile.organizations_worked.join(", "),
        donors = profile.donors_experience.join(", "),
        title = job.title,
        organization = job.organization,
        location = job.location,
        shared = shared_keywords(profile, job).join(", "),
        description = truncate_chars(&job.description, PROMPT_DESCRIPTION_CHARS),
    )
}

/// Alphanumerics, spaces, `-` and `_` only; first 50 chars, spaces to `_`.
pub fn safe_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .take(SAFE_TITLE_CHARS)
        .collect();
    kept.trim().replace(' ', "_")
}

pub fn letter_file_name(job: &Job, at: DateTime<Utc>) -> String {
    format!("{}_{}_{}.md", at.format("%Y%m%d"), safe_title(&job.title), job.id)
}

pub fn render_letter(job: &Job, letter: &str, at: DateTime<Utc>) -> String {
    format!(
        "# Cover Letter: {title}

**Organization:** {organization}
**Location:** {location}
**Job URL:** {url}
**Generated:** {generated}
**Match Score:** {score:.1}%

---

{letter}

---
*This cover letter was auto-generated. Please review and customize before submitting.*
",
        title = job.title,
        organization = job.organization,
        location = job.location,
        url = job.url,
        generated = at.to_rfc3339(),
        score = job.score_or_zero(),
    )
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateSummary {
    pub generated: Vec<(String, PathBuf)>,
    pub failed: usize,
    /// Set when the whole step was skipped, e.g. no API key.
    pub skipped: Option<String>,
}

pub struct CoverLetterGenerator<'a> {
    drafter: &'a dyn LetterDrafter,
    profile: &'a Profile,
    store: &'a DataStore,
}

impl<'a> CoverLetterGenerator<'a> {
    pub fn new(drafter: &'a dyn LetterDrafter, profile: &'a Profile, store: &'a DataStore) -> Self {
        Self {
            drafter,
            profile,
            store,
        }
    }

    /// Draft, render and write one letter; records the path on `job`.
    pub async fn generate_and_save(&self, job: &mut Job) -> anyhow::Result<PathBuf> {
        let prompt = build_prompt(self.profile, job);
        let letter = self
            .drafter
            .draft(&prompt)
            .await
            .with_context(|| format!("drafting cover letter for {}", job.id))?;
        let now = Utc::now();
        let path = self
            .store
            .write_cover_letter(&letter_file_name(job, now), &render_letter(job, &letter, now))
            .await?;
        job.cover_letter_path = Some(path.display().to_string());
        Ok(path)
    }

    /// Letters for jobs at or above `threshold`, at most `max_letters` per
    /// call. Jobs that already carry a letter are left alone.
    pub async fn generate_for_high_matches(
        &self,
        jobs: &mut [Job],
        threshold: f64,
        max_letters: usize,
    ) -> GenerateSummary {
        let mut summary = GenerateSummary::default();
        for job in jobs.iter_mut() {
            if job.score_or_zero() < threshold || job.cover_letter_path.is_some() {
                continue;
            }
            if summary.generated.len() >= max_letters {
                info!(max_letters, "reached cover letter limit for this run");
                break;
            }
            match self.generate_and_save(job).await {
                Ok(path) => {
                    info!(job_id = %job.id, path = %path.display(), "cover letter written");
                    summary.generated.push((job.title.clone(), path));
                }
                Err(err) => {
                    warn!(job_id = %job.id, error = %format!("{err:#}"), "cover letter failed");
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn job() -> Job {
        let mut job = Job::new(
            "reliefweb",
            "https://reliefweb.int/job/1",
            "Senior Program Director - East Africa (M&E)",
        )
        .with_organization("Mercy Corps")
        .with_location("Nairobi, Kenya")
        .with_description("Lead programmes.");
        job.score = Some(73.5);
        job
    }

    #[test]
    fn safe_title_strips_punctuation() {
        assert_eq!(
            safe_title("Senior Program Director - East Africa (M&E)"),
            "Senior_Program_Director_-_East_Africa_ME"
        );
        assert_eq!(safe_title("  /// "), "");
        assert_eq!(safe_title(&"a".repeat(80)).len(), 50);
    }

    #[test]
    fn file_name_has_date_title_and_id() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap();
        let job = job();
        assert_eq!(
            letter_file_name(&job, at),
            format!("20261018_Senior_Program_Director_-_East_Africa_ME_{}.md", job.id)
        );
    }

    #[test]
    fn rendered_letter_has_header() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap();
        let text = render_letter(&job(), "Dear Hiring Manager,", at);
        assert!(text.starts_with("# Cover Letter: Senior Program Director"));
        assert!(text.contains("**Organization:** Mercy Corps"));
        assert!(text.contains("**Job URL:** https://reliefweb.int/job/1"));
        assert!(text.contains("**Match Score:** 73.5%"));
        assert!(text.contains("\nDear Hiring Manager,\n"));
    }

    #[test]
    fn shared_keywords_follow_profile_order() {
        let profile = Profile {
            target_roles: vec!["Program Director".into()],
            skills: vec!["M&E".into(), "budgeting".into(), "m&e".into()],
            donors_experience: vec!["USAID".into()],
            ..Profile::default()
        };
        let mut job = job();
        job.description = "Oversee M&E and USAID compliance.".into();
        assert_eq!(
            shared_keywords(&profile, &job),
            vec!["program director", "m&e", "usaid"]
        );
        assert!(build_prompt(&profile, &job).contains("- Keywords In Common: program director, m&e, usaid\n"));
    }

    #[test]
    fn prompt_caps_skills_and_description() {
        let profile = Profile {
            name: "Abebe".into(),
            skills: (0..15).map(|i| format!("skill{i}")).collect(),
            ..Profile::default()
        };
        let mut job = job();
        job.description = "d".repeat(4000);
        let prompt = build_prompt(&profile, &job);
        assert!(prompt.contains("skill9"));
        assert!(!prompt.contains("skill10"));
        assert!(prompt.contains(&"d".repeat(3000)));
        assert!(!prompt.contains(&"d".repeat(3001)));
    }
}
