//! Matching configuration: weights, thresholds, salary policy and the
//! ordered location table. Defaults reproduce the production tuning; a YAML
//! file may override any subset.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum MatchConfigError {
    #[error("scoring weights must sum to 1.0, got {sum}")]
    WeightsDoNotSumToOne { sum: f64 },
    #[error("scoring weight {name} must be a finite non-negative number, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },
    #[error("score thresholds must satisfy 0 <= low <= high <= 100, got low={low} high={high}")]
    InvalidThresholds { low: f64, high: f64 },
    #[error("location rule {pattern:?} has score {score}, expected 0..=100")]
    InvalidLocationScore { pattern: String, score: u32 },
    #[error("salary minimum must be finite and non-negative, got {0}")]
    InvalidSalaryMinimum(f64),
    #[error("similarity boost must be finite and positive, got {0}")]
    InvalidSimilarityBoost(f64),
    #[error("reading matching config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing matching config {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Weight per sub-score; must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub title_match: f64,
    pub location_match: f64,
    pub skills_overlap: f64,
    pub experience_fit: f64,
    pub donor_match: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            title_match: 0.30,
            location_match: 0.20,
            skills_overlap: 0.25,
            experience_fit: 0.15,
            donor_match: 0.10,
        }
    }
}

impl ScoringWeights {
    fn named(&self) -> [(&'static str, f64); 5] {
        [
            ("title_match", self.title_match),
            ("location_match", self.location_match),
            ("skills_overlap", self.skills_overlap),
            ("experience_fit", self.experience_fit),
            ("donor_match", self.donor_match),
        ]
    }

    pub fn validate(&self) -> Result<(), MatchConfigError> {
        for (name, value) in self.named() {
            if !value.is_finite() || value < 0.0 {
                return Err(MatchConfigError::InvalidWeight { name, value });
            }
        }
        let sum: f64 = self.named().iter().map(|(_, v)| v).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(MatchConfigError::WeightsDoNotSumToOne { sum });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchBucket {
    High,
    Good,
    Below,
}

/// `low` gates the ranked set; `high` only labels results for callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreThresholds {
    pub low: f64,
    pub high: f64,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            low: 50.0,
            high: 70.0,
        }
    }
}

impl ScoreThresholds {
    pub fn validate(&self) -> Result<(), MatchConfigError> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_range(self.low) || !in_range(self.high) || self.low > self.high {
            return Err(MatchConfigError::InvalidThresholds {
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }

    pub fn bucket(&self, score: f64) -> MatchBucket {
        if score >= self.high {
            MatchBucket::High
        } else if score >= self.low {
            MatchBucket::Good
        } else {
            MatchBucket::Below
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalaryPolicy {
    pub min_monthly_usd: f64,
    pub require_salary: bool,
}

impl Default for SalaryPolicy {
    fn default() -> Self {
        Self {
            min_monthly_usd: 3000.0,
            require_salary: false,
        }
    }
}

/// One row of the location table: a lowercase substring and its score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRule {
    pub pattern: String,
    pub score: u32,
}

impl LocationRule {
    pub fn new(pattern: &str, score: u32) -> Self {
        Self {
            pattern: pattern.to_lowercase(),
            score,
        }
    }
}

/// Ordered most-specific first; the first matching row wins.
pub fn default_location_table() -> Vec<LocationRule> {
    vec![
        LocationRule::new("ethiopia", 100),
        LocationRule::new("addis ababa", 100),
        LocationRule::new("kenya", 90),
        LocationRule::new("nairobi", 90),
        LocationRule::new("east africa", 80),
        LocationRule::new("africa", 70),
        LocationRule::new("remote", 70),
        LocationRule::new("global", 60),
    ]
}

pub fn default_leadership_terms() -> Vec<String> {
    ["director", "head", "chief", "lead", "senior", "manager"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub weights: ScoringWeights,
    pub thresholds: ScoreThresholds,
    pub salary: SalaryPolicy,
    pub locations: Vec<LocationRule>,
    pub leadership_terms: Vec<String>,
    /// Multiplier applied to cosine similarity before capping at 100.
    pub similarity_boost: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            thresholds: ScoreThresholds::default(),
            salary: SalaryPolicy::default(),
            locations: default_location_table(),
            leadership_terms: default_leadership_terms(),
            similarity_boost: 150.0,
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<(), MatchConfigError> {
        self.weights.validate()?;
        self.thresholds.validate()?;
        if !self.salary.min_monthly_usd.is_finite() || self.salary.min_monthly_usd < 0.0 {
            return Err(MatchConfigError::InvalidSalaryMinimum(
                self.salary.min_monthly_usd,
            ));
        }
        if !self.similarity_boost.is_finite() || self.similarity_boost <= 0.0 {
            return Err(MatchConfigError::InvalidSimilarityBoost(self.similarity_boost));
        }
        if let Some(rule) = self.locations.iter().find(|rule| rule.score > 100) {
            return Err(MatchConfigError::InvalidLocationScore {
                pattern: rule.pattern.clone(),
                score: rule.score,
            });
        }
        Ok(())
    }

    /// Parse YAML, lowercase table patterns and validate.
    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self, MatchConfigError> {
        let mut config: MatchConfig =
            serde_yaml::from_str(text).map_err(|source| MatchConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
        for rule in &mut config.locations {
            rule.pattern = rule.pattern.to_lowercase();
        }
        for term in &mut config.leadership_terms {
            *term = term.to_lowercase();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MatchConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| MatchConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        MatchConfig::default().validate().expect("default config");
    }

    #[test]
    fn weights_must_sum_to_one() {
        let weights = ScoringWeights {
            title_match: 0.5,
            ..Default::default()
        };
        assert!(matches!(
            weights.validate(),
            Err(MatchConfigError::WeightsDoNotSumToOne { .. })
        ));
    }

    #[test]
    fn negative_weight_is_rejected() {
        let weights = ScoringWeights {
            title_match: -0.1,
            location_match: 0.6,
            ..Default::default()
        };
        assert!(matches!(
            weights.validate(),
            Err(MatchConfigError::InvalidWeight { name: "title_match", .. })
        ));
    }

    #[test]
    fn thresholds_must_be_ordered() {
        let thresholds = ScoreThresholds {
            low: 80.0,
            high: 70.0,
        };
        assert!(thresholds.validate().is_err());
    }

    #[test]
    fn buckets_follow_thresholds() {
        let thresholds = ScoreThresholds::default();
        assert_eq!(thresholds.bucket(73.5), MatchBucket::High);
        assert_eq!(thresholds.bucket(70.0), MatchBucket::High);
        assert_eq!(thresholds.bucket(55.0), MatchBucket::Good);
        assert_eq!(thresholds.bucket(49.9), MatchBucket::Below);
    }

    #[test]
    fn partial_yaml_overrides_keep_defaults() {
        let yaml = r#"
thresholds:
  low: 40
  high: 65
locations:
  - pattern: Somalia
    score: 95
  - pattern: remote
    score: 50
"#;
        let config = MatchConfig::from_yaml_str(yaml, Path::new("matching.yaml")).expect("yaml");
        assert_eq!(config.thresholds.low, 40.0);
        assert_eq!(config.weights, ScoringWeights::default());
        assert_eq!(config.locations[0], LocationRule::new("somalia", 95));
        assert_eq!(config.locations.len(), 2);
        assert_eq!(config.similarity_boost, 150.0);
    }

    #[test]
    fn yaml_with_bad_weights_is_fatal() {
        let yaml = "weights:\n  title_match: 0.9\n  location_match: 0.2\n  skills_overlap: 0.25\n  experience_fit: 0.15\n  donor_match: 0.1\n";
        let err = MatchConfig::from_yaml_str(yaml, Path::new("matching.yaml")).unwrap_err();
        assert!(matches!(err, MatchConfigError::WeightsDoNotSumToOne { .. }));
    }

    #[test]
    fn config_file_is_read_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("matching.yaml");
        std::fs::write(&path, "salary:\n  min_monthly_usd: 2500\n  require_salary: true\n")
            .expect("write config");
        let config = MatchConfig::from_path(&path).expect("load config");
        assert_eq!(config.salary.min_monthly_usd, 2500.0);
        assert!(config.salary.require_salary);

        let missing = MatchConfig::from_path(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(missing, MatchConfigError::Read { .. }));
    }
}
