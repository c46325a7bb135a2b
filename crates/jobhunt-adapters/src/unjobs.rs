//! UNJobs duty-station and search pages. Rows are loosely structured tables,
//! so organization and location fall back to keyword scans over the row.

use async_trait::async_trait;
use scraper::{ElementRef, Html};

use crate::html::{detail_text, first_text, inline_text, non_empty, resolve_url, selector};
use crate::{AdapterError, Crawlability, ListingEntry, SourceAdapter};

const BASE_URL: &str = "https://unjobs.org";
const MIN_TITLE_CHARS: usize = 5;
const AGENCY_HINTS: &[&str] = &["UNDP", "UNICEF", "UNHCR", "WFP", "UN", "WHO", "FAO"];
const KNOWN_STATIONS: &[&str] = &["Addis Ababa", "Nairobi", "Ethiopia", "Kenya", "Mogadishu"];

#[derive(Debug, Clone)]
pub struct UnJobsAdapter {
    pub paths: Vec<String>,
}

impl Default for UnJobsAdapter {
    fn default() -> Self {
        Self {
            paths: [
                "/duty_stations/addis-ababa",
                "/duty_stations/nairobi",
                "/duty_stations/mogadishu",
                "/search?q=ethiopia",
                "/search?q=kenya",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

fn agency_cell(row: ElementRef<'_>) -> Result<Option<String>, AdapterError> {
    let cells: Vec<_> = row.select(&selector("td")?).collect();
    if cells.len() < 2 {
        return Ok(None);
    }
    Ok(cells.into_iter().map(inline_text).find(|text| {
        let upper = text.to_uppercase();
        AGENCY_HINTS.iter().any(|hint| upper.contains(hint))
    }))
}

fn station_in_text(row: ElementRef<'_>) -> Option<String> {
    let text = inline_text(row).to_lowercase();
    KNOWN_STATIONS
        .iter()
        .find(|station| text.contains(&station.to_lowercase()))
        .map(|station| station.to_string())
}

#[async_trait]
impl SourceAdapter for UnJobsAdapter {
    fn source_id(&self) -> &'static str {
        "unjobs"
    }

    fn crawlability(&self) -> Crawlability {
        Crawlability::PublicHtml
    }

    fn listing_urls(&self) -> Vec<String> {
        self.paths
            .iter()
            .filter_map(|path| resolve_url(BASE_URL, path))
            .collect()
    }

    fn parse_listing(&self, page: &str) -> Result<Vec<ListingEntry>, AdapterError> {
        let rows_sel = selector("table tr, .job-listing, .vacancy")?;
        let link_sel = selector("a[href*='/vacancies/'], a[href*='/job/']")?;
        let location_sel = selector("[class*='location'], .duty-station")?;
        let date_sel = selector("[class*='date'], .deadline, .closing")?;

        let document = Html::parse_document(page);
        let mut entries = Vec::new();
        for row in document.select(&rows_sel) {
            let Some(link) = row.select(&link_sel).next() else {
                continue;
            };
            let title = inline_text(link);
            if title.chars().count() < MIN_TITLE_CHARS {
                continue;
            }
            let Some(url) = link.value().attr("href").and_then(|href| resolve_url(BASE_URL, href))
            else {
                continue;
            };
            entries.push(ListingEntry {
                title,
                url,
                organization: agency_cell(row)?
                    .and_then(non_empty)
                    .unwrap_or_else(|| "United Nations".to_string()),
                location: first_text(row, &location_sel)
                    .or_else(|| station_in_text(row))
                    .unwrap_or_else(|| "UN Duty Station".to_string()),
                description: String::new(),
                posted_date: None,
                deadline: first_text(row, &date_sel),
                job_type: None,
            });
        }
        Ok(entries)
    }

    fn parse_detail(&self, html: &str) -> Option<String> {
        detail_text(html, ".job-description, .vacancy-description, article, .content")
    }
}
