//! Composite relevance scoring of a job against the candidate profile.

use std::collections::HashSet;

use jobhunt_core::{Job, Profile};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{LocationRule, MatchConfig, MatchConfigError};
use crate::tfidf::{cosine, SparseVector, TfIdfModel, DEFAULT_MAX_FEATURES};

pub const UNKNOWN_LOCATION_SCORE: f64 = 40.0;
pub const TARGET_LOCATION_SCORE: f64 = 90.0;
pub const UNMATCHED_LOCATION_SCORE: f64 = 30.0;
pub const NEUTRAL_SKILLS_SCORE: f64 = 30.0;
pub const NO_EXPERIENCE_BAR_SCORE: f64 = 70.0;
const LEADERSHIP_FLOOR: f64 = 50.0;
const EXPERIENCE_GRACE_YEARS: i64 = 2;

// An optional "<a>-" / "<a> to " prefix turns a mention into a range.
static YEARS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:(\d+)\s*(?:-|–|to)\s*)?(\d+)\+?\s*(?:years?|yrs?)").expect("valid years regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub title: f64,
    pub location: f64,
    pub skills: f64,
    pub experience: f64,
    pub donor: f64,
    pub composite: f64,
}

/// Owns the profile, the validated config and the profile vector fit once at
/// construction. Read-only afterwards, so it can be shared across threads.
#[derive(Debug, Clone)]
pub struct JobScorer {
    profile: Profile,
    config: MatchConfig,
    model: Option<(TfIdfModel, SparseVector)>,
}

impl JobScorer {
    pub fn new(profile: Profile, config: MatchConfig) -> Result<Self, MatchConfigError> {
        config.validate()?;
        let profile_text = profile.skills_text();
        let model = match TfIdfModel::fit(&[profile_text.as_str()], DEFAULT_MAX_FEATURES) {
            Ok(model) => {
                let vector = model.transform(&profile_text);
                Some((model, vector))
            }
            Err(err) => {
                warn!(error = %err, "profile similarity model unavailable; skills score stays neutral");
                None
            }
        };
        Ok(Self {
            profile,
            config,
            model,
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn breakdown(&self, job: &Job) -> ScoreBreakdown {
        let title = score_title(
            &job.title,
            &self.profile.target_roles,
            &self.config.leadership_terms,
        );
        let location = score_location(
            &job.location,
            &self.config.locations,
            &self.profile.target_locations,
        );
        let skills = self.score_skills(&job.description);
        let experience = score_experience(
            job.experience_required.as_deref(),
            &job.description,
            self.profile.years_experience,
        );
        let donor = score_donor(
            &job.description,
            &job.organization,
            &self.profile.donors_experience,
        );

        let w = &self.config.weights;
        let total = title * w.title_match
            + location * w.location_match
            + skills * w.skills_overlap
            + experience * w.experience_fit
            + donor * w.donor_match;

        ScoreBreakdown {
            title,
            location,
            skills,
            experience,
            donor,
            composite: round_one_decimal(total).clamp(0.0, 100.0),
        }
    }

    pub fn score(&self, job: &Job) -> f64 {
        self.breakdown(job).composite
    }

    /// Attach a score to every job, preserving input order.
    pub fn score_all(&self, mut jobs: Vec<Job>) -> Vec<Job> {
        for job in &mut jobs {
            let breakdown = self.breakdown(job);
            debug!(job_id = %job.id, ?breakdown, "scored job");
            job.score = Some(breakdown.composite);
        }
        jobs
    }

    fn score_skills(&self, description: &str) -> f64 {
        if description.trim().is_empty() {
            return NEUTRAL_SKILLS_SCORE;
        }
        let Some((model, profile_vector)) = &self.model else {
            return NEUTRAL_SKILLS_SCORE;
        };
        let similarity = cosine(profile_vector, &model.transform(description));
        if !similarity.is_finite() {
            debug!("non-finite similarity; using neutral skills score");
            return NEUTRAL_SKILLS_SCORE;
        }
        (similarity * self.config.similarity_boost).clamp(0.0, 100.0)
    }
}

/// One-shot scoring; fits the profile model on every call.
pub fn score(job: &Job, profile: &Profile, config: &MatchConfig) -> Result<f64, MatchConfigError> {
    Ok(JobScorer::new(profile.clone(), config.clone())?.score(job))
}

pub fn score_all(
    jobs: Vec<Job>,
    profile: &Profile,
    config: &MatchConfig,
) -> Result<Vec<Job>, MatchConfigError> {
    Ok(JobScorer::new(profile.clone(), config.clone())?.score_all(jobs))
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn score_title(title: &str, target_roles: &[String], leadership_terms: &[String]) -> f64 {
    let title = title.to_lowercase();
    let mut best: f64 = 0.0;

    for role in target_roles {
        let role = role.trim().to_lowercase();
        if role.is_empty() {
            continue;
        }
        if title.contains(&role) {
            return 100.0;
        }
        let words: Vec<&str> = role.split_whitespace().collect();
        let matching = words.iter().filter(|word| title.contains(*word)).count();
        if matching == words.len() {
            best = best.max(90.0);
        } else if matching > 0 {
            best = best.max(matching as f64 / words.len() as f64 * 80.0);
        }
    }

    if leadership_terms
        .iter()
        .any(|term| !term.is_empty() && title.contains(&term.to_lowercase()))
    {
        best = best.max(LEADERSHIP_FLOOR);
    }
    best
}

pub fn score_location(location: &str, table: &[LocationRule], target_locations: &[String]) -> f64 {
    let location = location.trim().to_lowercase();
    if location.is_empty() {
        return UNKNOWN_LOCATION_SCORE;
    }
    if let Some(rule) = table
        .iter()
        .find(|rule| !rule.pattern.is_empty() && location.contains(&rule.pattern))
    {
        return f64::from(rule.score);
    }
    if target_locations.iter().any(|target| {
        let target = target.trim().to_lowercase();
        !target.is_empty() && location.contains(&target)
    }) {
        return TARGET_LOCATION_SCORE;
    }
    UNMATCHED_LOCATION_SCORE
}

/// Every year count mentioned in `text`; range mentions yield both bounds.
pub fn extract_years(text: &str) -> Vec<i64> {
    let text = text.to_lowercase();
    let mut years = Vec::new();
    for caps in YEARS_RE.captures_iter(&text) {
        for group in [caps.get(1), caps.get(2)].into_iter().flatten() {
            match group.as_str().parse::<i64>() {
                Ok(n) => years.push(n),
                Err(err) => debug!(value = group.as_str(), error = %err, "skipping unparseable year count"),
            }
        }
    }
    years
}

pub fn score_experience(
    experience_required: Option<&str>,
    description: &str,
    years_experience: u32,
) -> f64 {
    let text = format!("{} {}", experience_required.unwrap_or_default(), description);
    let years = extract_years(&text);
    let (Some(&min), Some(&max)) = (years.iter().min(), years.iter().max()) else {
        return NO_EXPERIENCE_BAR_SCORE;
    };
    let mine = i64::from(years_experience);
    if min <= mine && mine <= max.saturating_add(EXPERIENCE_GRACE_YEARS) {
        100.0
    } else if mine >= min.saturating_sub(EXPERIENCE_GRACE_YEARS) {
        80.0
    } else {
        40.0
    }
}

pub fn score_donor(description: &str, organization: &str, donors: &[String]) -> f64 {
    let text = format!("{description} {organization}").to_lowercase();
    let distinct: HashSet<String> = donors
        .iter()
        .map(|donor| donor.trim().to_lowercase())
        .filter(|donor| !donor.is_empty())
        .collect();
    match distinct.iter().filter(|donor| text.contains(donor.as_str())).count() {
        0 => 30.0,
        1 => 70.0,
        _ => 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_leadership_terms, default_location_table, ScoringWeights};

    fn roles(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_role_substring_scores_full_marks() {
        let score = score_title(
            "Country PROGRAM DIRECTOR, Somalia",
            &roles(&["Program Director"]),
            &default_leadership_terms(),
        );
        assert_eq!(score, 100.0);
    }

    #[test]
    fn unordered_role_words_score_ninety() {
        let score = score_title("Director of Programs", &roles(&["Program Director"]), &[]);
        assert_eq!(score, 90.0);
    }

    #[test]
    fn partial_role_words_scale_to_eighty() {
        let score = score_title(
            "Monitoring Officer",
            &roles(&["Monitoring Evaluation Specialist"]),
            &[],
        );
        assert!((score - 80.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn leadership_terms_floor_the_title_score() {
        let score = score_title("Senior Accountant", &[], &default_leadership_terms());
        assert_eq!(score, 50.0);
        assert_eq!(score_title("Accountant", &[], &default_leadership_terms()), 0.0);
    }

    #[test]
    fn blank_roles_are_ignored() {
        assert_eq!(score_title("Driver", &roles(&["", "  "]), &[]), 0.0);
    }

    #[test]
    fn unknown_location_is_neutral() {
        let table = default_location_table();
        assert_eq!(score_location("", &table, &roles(&["Somalia"])), 40.0);
        assert_eq!(score_location("   ", &[], &[]), 40.0);
    }

    #[test]
    fn first_table_entry_wins() {
        let table = default_location_table();
        assert_eq!(score_location("Nairobi, Kenya", &table, &[]), 90.0);
        assert_eq!(score_location("Addis Ababa, Ethiopia", &table, &[]), 100.0);
        assert_eq!(score_location("East Africa region", &table, &[]), 80.0);
        assert_eq!(score_location("Remote", &table, &[]), 70.0);
    }

    #[test]
    fn target_locations_apply_after_table() {
        let table = default_location_table();
        assert_eq!(score_location("Mogadishu, Somalia", &table, &roles(&["somalia"])), 90.0);
        assert_eq!(score_location("Geneva", &table, &roles(&["somalia"])), 30.0);
    }

    #[test]
    fn year_mentions_cover_ranges_and_plus_suffix() {
        assert_eq!(extract_years("5-10 years"), vec![5, 10]);
        assert_eq!(extract_years("At least 7+ yrs in the field"), vec![7]);
        assert_eq!(extract_years("3 to 5 Years"), vec![3, 5]);
        assert!(extract_years("no requirement").is_empty());
    }

    #[test]
    fn experience_fit_bands() {
        assert_eq!(score_experience(None, "", 8), 70.0);
        assert_eq!(score_experience(Some("5-10 years"), "", 8), 100.0);
        assert_eq!(score_experience(Some("5 years"), "", 7), 100.0);
        assert_eq!(score_experience(Some("10 years"), "", 8), 80.0);
        assert_eq!(score_experience(Some("15 years"), "", 8), 40.0);
    }

    #[test]
    fn oversized_year_counts_are_skipped() {
        assert_eq!(score_experience(Some("99999999999999999999 years"), "", 8), 70.0);
    }

    #[test]
    fn donor_matches_count_distinct_entries() {
        let donors = roles(&["USAID", "usaid", "ECHO", "World Bank"]);
        assert_eq!(score_donor("No funders named", "NGO", &donors), 30.0);
        assert_eq!(score_donor("Funded by USAID", "NGO", &donors), 70.0);
        assert_eq!(score_donor("USAID and ECHO grants", "NGO", &donors), 100.0);
        assert_eq!(score_donor("anything", "World Bank", &roles(&[""])), 30.0);
    }

    #[test]
    fn skills_score_defaults_and_similarity() {
        let profile = Profile {
            skills: roles(&["grant management", "humanitarian response"]),
            ..Default::default()
        };
        let scorer = JobScorer::new(profile, MatchConfig::default()).expect("scorer");
        assert_eq!(scorer.score_skills(""), 30.0);
        assert_eq!(scorer.score_skills("kubernetes"), 0.0);
        assert_eq!(scorer.score_skills("grant management humanitarian response"), 100.0);
    }

    #[test]
    fn empty_profile_keeps_skills_neutral() {
        let scorer = JobScorer::new(Profile::default(), MatchConfig::default()).expect("scorer");
        assert_eq!(scorer.score_skills("anything at all"), 30.0);
    }

    #[test]
    fn custom_weights_change_the_composite() {
        let profile = Profile {
            target_roles: roles(&["Program Director"]),
            ..Default::default()
        };
        let job = Job::new("unjobs", "https://unjobs.org/vacancies/7", "Program Officer")
            .with_location("Nairobi, Kenya");
        let mut config = MatchConfig::default();
        config.weights = ScoringWeights {
            title_match: 1.0,
            location_match: 0.0,
            skills_overlap: 0.0,
            experience_fit: 0.0,
            donor_match: 0.0,
        };
        let title_only = JobScorer::new(profile.clone(), config).expect("scorer");
        let breakdown = title_only.breakdown(&job);
        assert_eq!(breakdown.title, 40.0);
        assert_eq!(breakdown.composite, breakdown.title);

        let default = JobScorer::new(profile, MatchConfig::default()).expect("scorer");
        assert_ne!(default.score(&job), breakdown.composite);
    }

    #[test]
    fn invalid_config_is_rejected_before_scoring() {
        let mut config = MatchConfig::default();
        config.weights.donor_match = 0.5;
        assert!(JobScorer::new(Profile::default(), config).is_err());
    }
}
