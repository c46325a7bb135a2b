//! Selector helpers and the configurable adapter used by card-style job boards.

use async_trait::async_trait;
use jobhunt_storage::Url;
use scraper::{ElementRef, Html, Selector};

use crate::{AdapterError, Crawlability, ListingEntry, SourceAdapter};

pub(crate) fn selector(css: &str) -> Result<Selector, AdapterError> {
    Selector::parse(css).map_err(|e| AdapterError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Inline text of an element with runs of whitespace collapsed.
pub(crate) fn inline_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope
        .select(sel)
        .next()
        .and_then(|el| non_empty(inline_text(el)))
}

/// One trimmed line per text node, skipping script and style contents.
pub(crate) fn block_text(element: ElementRef<'_>) -> String {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent().and_then(|p| p.value().as_element().map(|e| e.name()));
            if matches!(parent, Some("script" | "style")) {
                return None;
            }
            let line = text.trim();
            (!line.is_empty()).then_some(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Description text of the first element matching `css` on a detail page.
pub(crate) fn detail_text(html: &str, css: &str) -> Option<String> {
    let sel = selector(css).ok()?;
    let document = Html::parse_document(html);
    let element = document.select(&sel).next()?;
    non_empty(block_text(element))
}

/// Absolute URLs pass through; relative ones resolve against `base`.
pub(crate) fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(String::from)
}

#[derive(Debug, Clone, Copy)]
pub struct BoardSelectors {
    pub cards: &'static str,
    /// Tried only when `cards` matches nothing.
    pub cards_fallback: Option<&'static str>,
    pub title_link: &'static str,
    pub title_link_fallback: Option<&'static str>,
    pub organization: &'static str,
    pub location: &'static str,
    pub deadline: &'static str,
    pub job_type: Option<&'static str>,
    pub detail: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct HtmlBoardAdapter {
    pub source_id: &'static str,
    pub base_url: &'static str,
    pub listing_paths: &'static [&'static str],
    pub max_entries: usize,
    pub default_organization: &'static str,
    pub default_location: &'static str,
    pub selectors: BoardSelectors,
}

impl HtmlBoardAdapter {
    fn parse_card(&self, card: ElementRef<'_>, sel: &CompiledSelectors) -> Option<ListingEntry> {
        let link = card
            .select(&sel.title_link)
            .next()
            .or_else(|| sel.title_link_fallback.as_ref().and_then(|fb| card.select(fb).next()))?;
        let title = non_empty(inline_text(link))?;
        let url = resolve_url(self.base_url, link.value().attr("href")?)?;

        Some(ListingEntry {
            title,
            url,
            organization: first_text(card, &sel.organization)
                .unwrap_or_else(|| self.default_organization.to_string()),
            location: first_text(card, &sel.location)
                .unwrap_or_else(|| self.default_location.to_string()),
            description: String::new(),
            posted_date: None,
            deadline: first_text(card, &sel.deadline),
            job_type: sel.job_type.as_ref().and_then(|s| first_text(card, s)),
        })
    }
}

struct CompiledSelectors {
    cards: Selector,
    cards_fallback: Option<Selector>,
    title_link: Selector,
    title_link_fallback: Option<Selector>,
    organization: Selector,
    location: Selector,
    deadline: Selector,
    job_type: Option<Selector>,
}

impl CompiledSelectors {
    fn compile(s: &BoardSelectors) -> Result<Self, AdapterError> {
        Ok(Self {
            cards: selector(s.cards)?,
            cards_fallback: s.cards_fallback.map(selector).transpose()?,
            title_link: selector(s.title_link)?,
            title_link_fallback: s.title_link_fallback.map(selector).transpose()?,
            organization: selector(s.organization)?,
            location: selector(s.location)?,
            deadline: selector(s.deadline)?,
            job_type: s.job_type.map(selector).transpose()?,
        })
    }
}

#[async_trait]
impl SourceAdapter for HtmlBoardAdapter {
    fn source_id(&self) -> &'static str {
        self.source_id
    }

    fn crawlability(&self) -> Crawlability {
        Crawlability::PublicHtml
    }

    fn listing_urls(&self) -> Vec<String> {
        self.listing_paths
            .iter()
            .filter_map(|path| resolve_url(self.base_url, path))
            .collect()
    }

    fn max_entries_per_listing(&self) -> usize {
        self.max_entries
    }

    fn parse_listing(&self, page: &str) -> Result<Vec<ListingEntry>, AdapterError> {
        let sel = CompiledSelectors::compile(&self.selectors)?;
        let document = Html::parse_document(page);
        let mut cards: Vec<ElementRef<'_>> = document.select(&sel.cards).collect();
        if cards.is_empty() {
            if let Some(fallback) = &sel.cards_fallback {
                cards = document.select(fallback).collect();
            }
        }
        Ok(cards
            .into_iter()
            .filter_map(|card| self.parse_card(card, &sel))
            .collect())
    }

    fn parse_detail(&self, html: &str) -> Option<String> {
        detail_text(html, self.selectors.detail)
    }
}

pub fn ethiojobs_adapter() -> HtmlBoardAdapter {
    HtmlBoardAdapter {
        source_id: "ethiojobs",
        base_url: "https://www.ethiojobs.net",
        listing_paths: &[
            "/jobs/ngo-and-development",
            "/jobs/management",
            "/jobs/project-management",
        ],
        max_entries: 30,
        default_organization: "Not specified",
        default_location: "Ethiopia",
        selectors: BoardSelectors {
            cards: ".job-listing, .job-item, article.job",
            cards_fallback: Some("[class*='job'], .listing-item"),
            title_link: "h2 a, h3 a, .job-title a, a.title",
            title_link_fallback: None,
            organization: ".company-name, .employer, .organization",
            location: ".location, .job-location, [class*='location']",
            deadline: ".deadline, .closing-date, [class*='deadline']",
            job_type: None,
            detail: ".job-description, .description, article, .content, main",
        },
    }
}

pub fn devex_adapter() -> HtmlBoardAdapter {
    HtmlBoardAdapter {
        source_id: "devex",
        base_url: "https://www.devex.com",
        listing_paths: &[
            "/jobs/search?filter%5Blocation%5D%5B%5D=Ethiopia",
            "/jobs/search?filter%5Blocation%5D%5B%5D=Kenya",
            "/jobs/search?filter%5Bkeyword%5D=program+manager+africa",
            "/jobs/search?filter%5Bkeyword%5D=country+director+africa",
        ],
        max_entries: 25,
        default_organization: "Not specified",
        default_location: "",
        selectors: BoardSelectors {
            cards: ".job-card, .search-result, article[class*='job'], .listing",
            cards_fallback: None,
            title_link: "h2 a, h3 a, a.title, .job-title a",
            title_link_fallback: Some("a[href*='/jobs/']"),
            organization: ".organization, .company, .employer, [class*='org']",
            location: ".location, [class*='location'], .place",
            deadline: ".deadline, .closing, [class*='date']",
            job_type: Some(".job-type, [class*='type'], .category"),
            detail: ".job-description, .description, .job-content, article",
        },
    }
}

pub fn developmentaid_adapter() -> HtmlBoardAdapter {
    HtmlBoardAdapter {
        source_id: "developmentaid",
        base_url: "https://www.developmentaid.org",
        listing_paths: &[
            "/jobs?country[]=Ethiopia",
            "/jobs?country[]=Kenya",
            "/jobs?country[]=Somalia",
            "/jobs?keyword=program+manager",
            "/jobs?keyword=country+director",
        ],
        max_entries: 25,
        default_organization: "Not specified",
        default_location: "",
        selectors: BoardSelectors {
            cards: ".job-item, .listing-item, article.job, .search-result",
            cards_fallback: None,
            title_link: "h2 a, h3 a, a.title, .job-title a",
            title_link_fallback: Some("a[href*='/jobs/']"),
            organization: ".organization, .company, .employer",
            location: ".location, .country",
            deadline: ".deadline, .closing-date, .date",
            job_type: None,
            detail: ".job-description, .description, .content, article",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_and_absolute_links() {
        assert_eq!(
            resolve_url("https://www.devex.com", "/jobs/123").as_deref(),
            Some("https://www.devex.com/jobs/123")
        );
        assert_eq!(
            resolve_url("https://www.devex.com", "https://other.org/x").as_deref(),
            Some("https://other.org/x")
        );
        assert_eq!(resolve_url("https://www.devex.com", "  "), None);
    }

    #[test]
    fn block_text_skips_scripts() {
        let html = "<div class=\"job-description\"><p> Lead the team </p><script>var x = 1;</script><ul><li>Budgets</li></ul></div>";
        assert_eq!(
            detail_text(html, ".job-description").as_deref(),
            Some("Lead the team\nBudgets")
        );
        assert_eq!(detail_text("<p>nothing</p>", ".job-description"), None);
    }

    #[test]
    fn listing_urls_are_absolute() {
        let urls = ethiojobs_adapter().listing_urls();
        assert_eq!(urls[0], "https://www.ethiojobs.net/jobs/ngo-and-development");
        assert_eq!(urls.len(), 3);
    }

    #[test]
    fn card_fallback_selector_is_used() {
        let page = r#"<ul><li class="listing-item"><h3><a href="/job/42">Grants Officer</a></h3></li></ul>"#;
        let entries = ethiojobs_adapter().parse_listing(page).expect("parse");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "https://www.ethiojobs.net/job/42");
        assert_eq!(entries[0].organization, "Not specified");
        assert_eq!(entries[0].location, "Ethiopia");
    }

    #[test]
    fn cards_without_links_are_skipped() {
        let page = r#"<div class="job-card"><h2>No link here</h2></div>"#;
        assert!(devex_adapter().parse_listing(page).expect("parse").is_empty());
    }
}
