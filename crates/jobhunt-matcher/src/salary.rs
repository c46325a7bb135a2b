//! Best-effort monthly USD salary extraction and the salary gate.
//!
//! Known false positive: any amount above 20000 is treated as annual, so a
//! genuinely high monthly figure is divided by twelve.

use jobhunt_core::Job;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::SalaryPolicy;

pub const EUR_TO_USD: f64 = 1.1;
pub const ANNUAL_HEURISTIC_THRESHOLD: f64 = 20_000.0;
pub const MONTHLY_BAND: (f64, f64) = (500.0, 50_000.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    Usd,
    Eur,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Periodicity {
    /// Explicitly monthly or unqualified.
    Monthly,
    Annual,
}

#[derive(Debug)]
pub struct SalaryPattern {
    pub regex: Regex,
    pub currency: Currency,
    pub periodicity: Periodicity,
}

const AMOUNT: &str = r"([\d,]+(?:\.\d{2})?)";
const MONTHLY: &str = r"(?:per\s*month|/\s*month|monthly|p\.?m\.?)?";
const ANNUAL: &str = r"(?:per\s*(?:year|annum)|/\s*(?:year|annum)|annually|p\.?a\.?)";

fn pattern(template: &str, currency: Currency, periodicity: Periodicity) -> SalaryPattern {
    let source = template
        .replace("{amount}", AMOUNT)
        .replace("{monthly}", MONTHLY)
        .replace("{annual}", ANNUAL);
    SalaryPattern {
        regex: Regex::new(&source).expect("valid salary regex"),
        currency,
        periodicity,
    }
}

/// Priority is list position.
pub static SALARY_PATTERNS: Lazy<Vec<SalaryPattern>> = Lazy::new(|| {
    use Currency::*;
    use Periodicity::*;
    vec![
        pattern(r"(?:\$|usd)\s*{amount}\s*{monthly}", Usd, Monthly),
        pattern(r"{amount}\s*(?:usd|dollars?)\s*{monthly}", Usd, Monthly),
        pattern(r"(?:€|eur)\s*{amount}\s*{monthly}", Eur, Monthly),
        pattern(r"{amount}\s*(?:eur|euros?)\s*{monthly}", Eur, Monthly),
        pattern(r"(?:\$|usd)\s*{amount}\s*{annual}", Usd, Annual),
        pattern(r"{amount}\s*(?:usd|dollars?)\s*{annual}", Usd, Annual),
    ]
});

/// Convert one raw amount to a monthly USD figure, or `None` when it falls
/// outside the plausible band.
pub fn normalize_amount(raw: f64, currency: Currency, periodicity: Periodicity) -> Option<f64> {
    let mut amount = raw;
    if currency == Currency::Eur {
        amount *= EUR_TO_USD;
    }
    if periodicity == Periodicity::Annual || amount > ANNUAL_HEURISTIC_THRESHOLD {
        amount /= 12.0;
    }
    (MONTHLY_BAND.0..=MONTHLY_BAND.1)
        .contains(&amount)
        .then_some(amount)
}

pub fn extract_monthly_salary(text: &str) -> Option<f64> {
    let text = text.to_lowercase();
    for pattern in SALARY_PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(&text) {
            let Some(raw) = caps.get(1) else { continue };
            let cleaned = raw.as_str().replace(',', "");
            let value = match cleaned.parse::<f64>() {
                Ok(value) => value,
                Err(err) => {
                    debug!(raw = raw.as_str(), error = %err, "skipping unparseable salary amount");
                    continue;
                }
            };
            if let Some(monthly) = normalize_amount(value, pattern.currency, pattern.periodicity) {
                return Some(monthly);
            }
        }
    }
    None
}

static NORMALIZED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^~\$([\d,]+)/month$").expect("valid normalized salary regex"));

/// Reads back a [`format_monthly_usd`] string without re-applying the
/// currency and annual heuristics.
pub fn parse_normalized_salary(text: &str) -> Option<f64> {
    let caps = NORMALIZED_RE.captures(text.trim())?;
    caps.get(1)?.as_str().replace(',', "").parse().ok()
}

/// Salary field first, then description. A salary already normalized by
/// ranking is taken as is.
pub fn extract_job_salary(job: &Job) -> Option<f64> {
    if let Some(monthly) = job.salary.as_deref().and_then(parse_normalized_salary) {
        return Some(monthly);
    }
    let text = format!(
        "{} {}",
        job.salary.as_deref().unwrap_or_default(),
        job.description
    );
    extract_monthly_salary(&text)
}

/// `~$5,000/month` style display string.
pub fn format_monthly_usd(amount: f64) -> String {
    let whole = amount.round() as u64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("~${grouped}/month")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SalaryDecision {
    Passed { monthly_usd: Option<f64> },
    BelowMinimum { monthly_usd: f64, minimum: f64 },
    Missing,
}

impl SalaryDecision {
    pub fn passed(&self) -> bool {
        matches!(self, SalaryDecision::Passed { .. })
    }
}

impl SalaryPolicy {
    pub fn evaluate(&self, monthly_usd: Option<f64>) -> SalaryDecision {
        match monthly_usd {
            Some(monthly) if monthly >= self.min_monthly_usd => SalaryDecision::Passed {
                monthly_usd: Some(monthly),
            },
            Some(monthly) => SalaryDecision::BelowMinimum {
                monthly_usd: monthly,
                minimum: self.min_monthly_usd,
            },
            None if self.require_salary => SalaryDecision::Missing,
            None => SalaryDecision::Passed { monthly_usd: None },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_usd_amount() {
        assert_eq!(extract_monthly_salary("$5,000 per month"), Some(5000.0));
    }

    #[test]
    fn annual_usd_amount_is_divided() {
        assert_eq!(extract_monthly_salary("$60,000 per year"), Some(5000.0));
        assert_eq!(extract_monthly_salary("Salary: 48000 USD annually"), Some(4000.0));
    }

    #[test]
    fn no_currency_means_no_salary() {
        assert_eq!(extract_monthly_salary("Competitive package, 5 years"), None);
        assert_eq!(extract_monthly_salary(""), None);
    }

    #[test]
    fn euro_amounts_are_converted() {
        let monthly = extract_monthly_salary("EUR 4,000 monthly").expect("salary");
        assert!((monthly - 4400.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_band_values_are_skipped() {
        assert_eq!(extract_monthly_salary("$50 per month then $3,500 per month"), Some(3500.0));
        assert_eq!(extract_monthly_salary("$, only"), None);
    }

    #[test]
    fn large_monthly_figure_is_read_as_annual() {
        assert_eq!(extract_monthly_salary("$24,000 per month"), Some(2000.0));
    }

    #[test]
    fn display_string_groups_thousands() {
        assert_eq!(format_monthly_usd(5000.0), "~$5,000/month");
        assert_eq!(format_monthly_usd(12345.6), "~$12,346/month");
        assert_eq!(format_monthly_usd(999.0), "~$999/month");
        assert_eq!(extract_monthly_salary(&format_monthly_usd(4400.0)), Some(4400.0));
    }

    #[test]
    fn normalized_string_skips_annual_heuristic() {
        assert_eq!(parse_normalized_salary("~$25,000/month"), Some(25000.0));
        assert_eq!(parse_normalized_salary("$25,000/month"), None);
        let mut job = Job::new("devex", "https://devex.com/2", "Chief of Party");
        job.salary = Some(format_monthly_usd(25000.0));
        assert_eq!(extract_job_salary(&job), Some(25000.0));
    }

    #[test]
    fn policy_gate() {
        let policy = SalaryPolicy::default();
        assert!(policy.evaluate(Some(3000.0)).passed());
        assert!(!policy.evaluate(Some(2999.0)).passed());
        assert!(policy.evaluate(None).passed());

        let strict = SalaryPolicy {
            require_salary: true,
            ..policy
        };
        assert_eq!(strict.evaluate(None), SalaryDecision::Missing);
    }
}
