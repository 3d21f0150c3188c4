//! Turns restaurant pages into labeled text documents.
//!
//! Each [`ExtractionRule`] names a class list and a label; a page becomes
//! one `"{label}: {text}\n"` line per rule, in rule order. Pages that cannot
//! be fetched are reported in [`ScrapeReport::skipped`] and never become
//! documents.

use crate::error::ScrapeError;
use crate::models::{ExtractionRule, ScrapeReport, SkippedPage};
use crate::traits::DocumentSource;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub const USER_AGENT: &str = "Mozilla/5.0";
pub const DEFAULT_RULES_FILE: &str = "class_names.txt";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn default_rules() -> Vec<ExtractionRule> {
    vec![
        ExtractionRule::new("sc-7kepeu-0 sc-iSDuPN fwzNdh", "Restaurant Name"),
        ExtractionRule::new("sc-eXNvrr cMFgfA", "Restaurant Type"),
        ExtractionRule::new("sc-clNaTc ckqoPM", "Location"),
        ExtractionRule::new("sc-kasBVs dfwCXs", "Operating Hours"),
        ExtractionRule::new("sc-bFADNz leEVAg", "Contact Information"),
    ]
}

/// Parses `class names,label` lines. Blank lines, `#` comments and lines
/// without a comma are skipped.
pub fn parse_rules(text: &str) -> Vec<ExtractionRule> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (class_names, label) = line.split_once(',')?;
            Some(ExtractionRule::new(class_names.trim(), label.trim()))
        })
        .collect()
}

/// Loads rules from `path`, falling back to [`default_rules`] when the file
/// is missing or holds no rules.
pub fn load_rules(path: &Path) -> Result<Vec<ExtractionRule>, ScrapeError> {
    let rules = match std::fs::read_to_string(path) {
        Ok(text) => parse_rules(&text),
        Err(error) if error.kind() == ErrorKind::NotFound => Vec::new(),
        Err(error) => return Err(error.into()),
    };

    if rules.is_empty() {
        info!(path = %path.display(), "no extraction rules found, using defaults");
        return Ok(default_rules());
    }

    Ok(rules)
}

fn compile(rule: &ExtractionRule) -> Result<Selector, ScrapeError> {
    let selector = rule.css_selector();
    Selector::parse(&selector).map_err(|error| ScrapeError::InvalidSelector {
        selector: selector.clone(),
        details: error.to_string(),
    })
}

pub fn extract_document(html: &str, rules: &[ExtractionRule]) -> Result<String, ScrapeError> {
    let page = Html::parse_document(html);
    let mut document = String::new();

    for rule in rules {
        let selector = compile(rule)?;
        let values = page
            .select(&selector)
            .map(|element| {
                element
                    .text()
                    .map(str::trim)
                    .filter(|piece| !piece.is_empty())
                    .collect::<String>()
            })
            .collect::<Vec<_>>();

        document.push_str(&rule.label);
        document.push_str(": ");
        document.push_str(&values.join(" "));
        document.push('\n');
    }

    Ok(document)
}

pub struct PageScraper {
    client: Client,
    rules: Vec<ExtractionRule>,
}

impl PageScraper {
    pub fn new(rules: Vec<ExtractionRule>) -> Result<Self, ScrapeError> {
        for rule in &rules {
            compile(rule)?;
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { client, rules })
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    pub async fn fetch_document(&self, link: &str) -> Result<String, ScrapeError> {
        let url = Url::parse(link)?;
        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        extract_document(&body, &self.rules)
    }
}

#[async_trait]
impl DocumentSource for PageScraper {
    async fn collect(&self, links: &[String]) -> ScrapeReport {
        let mut report = ScrapeReport::default();

        for link in links {
            match self.fetch_document(link).await {
                Ok(document) => report.documents.push(document),
                Err(error) => {
                    warn!(url = %link, reason = %error, "skipping page");
                    report.skipped.push(SkippedPage {
                        url: link.clone(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        info!(
            documents = report.documents.len(),
            skipped = report.skipped.len(),
            "scrape finished"
        );
        report
    }
}
