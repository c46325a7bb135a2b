//! ReliefWeb job feeds, one RSS feed per target country.

use async_trait::async_trait;
use scraper::Html;

use crate::html::{block_text, detail_text, first_text, non_empty, selector};
use crate::{AdapterError, Crawlability, ListingEntry, SourceAdapter};

const FEED_BASE: &str = "https://reliefweb.int/jobs/rss.xml";

#[derive(Debug, Clone)]
pub struct ReliefWebAdapter {
    pub countries: Vec<String>,
}

impl Default for ReliefWebAdapter {
    fn default() -> Self {
        Self {
            countries: ["Ethiopia", "Kenya", "Somalia", "South Sudan", "Uganda"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Bodies of every `<item>` element, in feed order.
fn feed_items(feed: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut rest = feed;
    while let Some(start) = find_open_tag(rest, "item") {
        let after = &rest[start..];
        let Some(end) = after.find("</item>") else { break };
        items.push(&after[..end]);
        rest = &after[end + "</item>".len()..];
    }
    items
}

/// Byte offset just past `<tag ...>`, skipping tags that merely share the prefix.
fn find_open_tag(text: &str, tag: &str) -> Option<usize> {
    let needle = format!("<{tag}");
    let mut offset = 0;
    while let Some(pos) = text[offset..].find(&needle) {
        let after = offset + pos + needle.len();
        match text[after..].chars().next() {
            Some('>') => return Some(after + 1),
            Some(c) if c.is_whitespace() => {
                let close = text[after..].find('>')?;
                return Some(after + close + 1);
            }
            _ => offset = after,
        }
    }
    None
}

fn tag_content<'a>(item: &'a str, tag: &str) -> Option<&'a str> {
    let start = find_open_tag(item, tag)?;
    let end = item[start..].find(&format!("</{tag}>"))?;
    Some(&item[start..start + end])
}

/// Unwrap CDATA verbatim, otherwise decode XML entities.
fn xml_text(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(inner) = raw
        .strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
    {
        return inner.to_string();
    }
    Html::parse_fragment(raw).root_element().text().collect()
}

fn labelled(value: Option<String>, labels: &[&str]) -> Option<String> {
    let value = value?;
    labels
        .iter()
        .find_map(|label| value.contains(label).then(|| value.replace(label, "")))
        .and_then(non_empty)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct DescriptionTags {
    organization: Option<String>,
    location: Option<String>,
    deadline: Option<String>,
    text: String,
}

fn read_description(html: &str) -> Result<DescriptionTags, AdapterError> {
    let fragment = Html::parse_fragment(html);
    let root = fragment.root_element();
    Ok(DescriptionTags {
        organization: labelled(first_text(root, &selector("div.tag.source")?), &["Organization:"]),
        location: labelled(
            first_text(root, &selector("div.tag.country")?),
            &["Countries:", "Country:"],
        ),
        deadline: labelled(first_text(root, &selector("div.date.closing")?), &["Closing date:"]),
        text: block_text(root),
    })
}

#[async_trait]
impl SourceAdapter for ReliefWebAdapter {
    fn source_id(&self) -> &'static str {
        "reliefweb"
    }

    fn crawlability(&self) -> Crawlability {
        Crawlability::Rss
    }

    fn listing_urls(&self) -> Vec<String> {
        self.countries
            .iter()
            .map(|country| {
                format!(
                    "{FEED_BASE}?search=country.exact%3A%22{}%22",
                    country.replace(' ', "%20")
                )
            })
            .collect()
    }

    fn parse_listing(&self, page: &str) -> Result<Vec<ListingEntry>, AdapterError> {
        let mut entries = Vec::new();
        for item in feed_items(page) {
            let title = tag_content(item, "title").map(xml_text).and_then(non_empty);
            let url = tag_content(item, "link").map(xml_text).and_then(non_empty);
            let (Some(title), Some(url)) = (title, url) else {
                continue;
            };
            let description = tag_content(item, "description")
                .map(xml_text)
                .unwrap_or_default();
            let tags = read_description(&description)?;
            entries.push(ListingEntry {
                title,
                url,
                organization: tags.organization.unwrap_or_else(|| "Unknown".to_string()),
                location: tags.location.unwrap_or_else(|| "Not specified".to_string()),
                description: tags.text,
                posted_date: tag_content(item, "pubDate").map(xml_text).and_then(non_empty),
                deadline: tags.deadline,
                job_type: None,
            });
        }
        Ok(entries)
    }

    fn parse_detail(&self, html: &str) -> Option<String> {
        detail_text(html, "article, main")
    }
}
