//! Plain-text tables printed by the CLI.

use std::fmt::Write;

use jobhunt_core::Job;

use crate::cover_letter::GenerateSummary;
use crate::pipeline::{MatchSummary, ScrapeSummary};

fn clip(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

pub fn scrape_report(summary: &ScrapeSummary) -> String {
    let mut out = String::new();
    for source in &summary.per_source {
        let _ = writeln!(
            out,
            "[{} via {}] Found {} jobs",
            source.source_id,
            source.crawlability.label(),
            source.jobs
        );
    }
    let _ = writeln!(out, "\nTotal jobs scraped: {}", summary.scraped);
    let _ = writeln!(out, "New jobs: {}", summary.new_jobs);
    let _ = writeln!(out, "Total jobs in database: {}", summary.total);
    out
}

pub fn match_report(summary: &MatchSummary, low: f64, high: f64) -> String {
    let mut out = String::new();
    if summary.scored == 0 {
        out.push_str("No jobs to match. Run 'scrape' first.\n");
        return out;
    }
    let _ = writeln!(out, "Total jobs scored: {}", summary.scored);
    let _ = writeln!(out, "High matches (>={high:.0}%): {}", summary.high);
    let _ = writeln!(out, "Good matches (>={low:.0}%): {}", summary.good);
    let _ = writeln!(out, "Excluded: {}", summary.excluded);
    out.push_str("\nTop 10 Matches:\n");
    for (i, job) in summary.top.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. [{:.0}%] {} - {}",
            i + 1,
            job.score_or_zero(),
            job.title,
            job.organization
        );
    }
    out
}

pub fn generate_report(summary: &GenerateSummary) -> String {
    if let Some(reason) = &summary.skipped {
        return format!("Cover letters skipped: {reason}\n");
    }
    let mut out = format!("Cover letters generated: {}\n", summary.generated.len());
    for (title, path) in &summary.generated {
        let _ = writeln!(out, "  - {title}: {}", path.display());
    }
    if summary.failed > 0 {
        let _ = writeln!(out, "Failed: {}", summary.failed);
    }
    out
}

/// Numbered candidates for `apply`, two lines per job.
pub fn apply_listing(jobs: &[Job]) -> String {
    let mut out = String::from("Available matches (use job number or search term):\n\n");
    for (i, job) in jobs.iter().enumerate() {
        let salary = job
            .salary
            .as_deref()
            .map(|s| format!(" | {s}"))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {:2}. [{:.0}%] {}",
            i + 1,
            job.score_or_zero(),
            clip(&job.title, 50)
        );
        let _ = writeln!(
            out,
            "      {} - {}{salary}\n",
            clip(&job.organization, 40),
            clip(&job.location, 30)
        );
    }
    out
}

/// Full match table; `*` marks jobs with a cover letter.
pub fn matches_table(jobs: &[Job]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>3}  {:>5}  {:<45}  {:<25}  {:<15}",
        "#", "Score", "Title", "Organization", "Salary"
    );
    let _ = writeln!(out, "{}", "-".repeat(100));
    for (i, job) in jobs.iter().enumerate() {
        let marker = if job.cover_letter_path.is_some() { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{:>3}{marker} {:>5.0}%  {:<45}  {:<25}  {:<15}",
            i + 1,
            job.score_or_zero(),
            clip(&job.title, 45),
            clip(&job.organization, 25),
            job.salary.as_deref().unwrap_or("Not listed"),
        );
    }
    let _ = writeln!(out, "\n* = Cover letter generated");
    let _ = writeln!(out, "Total: {} matches", jobs.len());
    out
}

#[cfg(test)]
mod tests {
    use jobhunt_adapters::Crawlability;

    use super::*;
    use crate::pipeline::SourceCount;

    fn job(title: &str, score: f64) -> Job {
        let mut job = Job::new("unjobs", format!("https://unjobs.org/vacancies/{score}"), title)
            .with_organization("UNICEF")
            .with_location("Nairobi");
        job.score = Some(score);
        job
    }

    #[test]
    fn table_marks_cover_letters_and_salary() {
        let mut with_letter = job("Chief of Field Office", 81.2);
        with_letter.cover_letter_path = Some("letter.md".into());
        with_letter.salary = Some("~$6,000/month".into());
        let table = matches_table(&[with_letter, job("Nutrition Officer", 52.0)]);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[2].starts_with("  1*    81%  Chief of Field Office"));
        assert!(lines[2].contains("~$6,000/month"));
        assert!(lines[3].starts_with("  2     52%"));
        assert!(lines[3].contains("Not listed"));
        assert!(table.ends_with("Total: 2 matches\n"));
    }

    #[test]
    fn listing_clips_long_titles() {
        let listing = apply_listing(&[job(&"x".repeat(70), 64.0)]);
        assert!(listing.contains(&format!("   1. [64%] {}\n", "x".repeat(50))));
        assert!(!listing.contains(&"x".repeat(51)));
    }

    #[test]
    fn scrape_report_names_each_source() {
        let summary = ScrapeSummary {
            per_source: vec![SourceCount {
                source_id: "reliefweb".into(),
                crawlability: Crawlability::Rss,
                jobs: 12,
            }],
            scraped: 12,
            new_jobs: 4,
            total: 40,
        };
        let report = scrape_report(&summary);
        assert!(report.starts_with("[reliefweb via rss] Found 12 jobs\n"));
        assert!(report.contains("New jobs: 4"));
    }

    #[test]
    fn empty_match_report() {
        let report = match_report(&MatchSummary::default(), 50.0, 70.0);
        assert!(report.starts_with("No jobs to match"));
    }
}
