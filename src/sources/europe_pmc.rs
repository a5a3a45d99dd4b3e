//! Europe PMC source implementation using their REST search API.
//!
//! Europe PMC indexes PubMed, PMC, and preprints from bioRxiv/medRxiv. Results
//! are walked with `cursorMark` pagination starting from `*`.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{Config, EuropePmcConfig};
use crate::models::{OpenAccess, Pull, Query, Record, RecordBuilder, SourceType};
use crate::sources::{drain_hits, lenient, Source, SourceError};
use crate::utils::{normalize_pmcid, HttpClient, Page, Pagination, Paginator, Throttle};

const EUROPE_PMC_ARTICLE_URL: &str = "https://europepmc.org/article";

/// Europe PMC source
#[derive(Debug, Clone)]
pub struct EuropePmcSource {
    client: HttpClient,
    config: EuropePmcConfig,
    throttle: Throttle,
}

impl EuropePmcSource {
    /// Create a new Europe PMC source
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        Ok(Self::with_client(HttpClient::from_config(&config.http)?, config))
    }

    /// Create with a custom HTTP client (for testing)
    pub fn with_client(client: HttpClient, config: &Config) -> Self {
        Self {
            client,
            throttle: Throttle::new(config.europe_pmc.min_interval()),
            config: config.europe_pmc.clone(),
        }
    }

    /// Query text with the year restriction appended in Europe PMC syntax
    fn build_query_text(query: &Query) -> String {
        match query.years {
            Some(years) => format!("({}) AND (PUB_YEAR:[{} TO {}])", query.text, years.from, years.to),
            None => query.text.clone(),
        }
    }

    /// Decode one search response page
    fn parse_search_page(json: &str) -> Result<Page<SearchResultItem>, SourceError> {
        let response: SearchResult = serde_json::from_str(json)
            .map_err(|e| SourceError::upstream(None, format!("Failed to parse Europe PMC JSON: {}", e)))?;

        let hits = response
            .result_list
            .map(|list| list.result)
            .unwrap_or_default()
            .into_iter()
            .map(|raw| {
                serde_json::from_value::<SearchResultItem>(raw).unwrap_or_else(|e| {
                    tracing::warn!("Undecodable Europe PMC hit, keeping an empty record: {}", e);
                    SearchResultItem::default()
                })
            })
            .collect();

        Ok(Page::new(hits)
            .next_cursor(response.next_cursor_mark)
            .total(response.hit_count))
    }

    /// Map a single result into a Record
    fn parse_result(result: SearchResultItem) -> Record {
        // canonical Europe PMC link, built from the hit's own source/id pair
        let source_url = match (&result.source, &result.id) {
            (Some(source), Some(id)) if !source.is_empty() && !id.is_empty() => {
                Some(format!("{}/{}/{}", EUROPE_PMC_ARTICLE_URL, source, id))
            }
            _ => None,
        };

        let open_access = match result.is_open_access.as_deref() {
            Some("Y") => OpenAccess::Yes,
            Some("N") => OpenAccess::No,
            _ => OpenAccess::Unknown,
        };

        let pdf_url = result.full_text_url_list.and_then(|list| {
            list.full_text_url
                .into_iter()
                .find(|u| u.document_style.as_deref() == Some("pdf"))
                .and_then(|u| u.url)
        });

        let authors = result
            .author_string
            .as_deref()
            .map(split_author_string)
            .unwrap_or_default();

        RecordBuilder::new(SourceType::EuropePmc)
            .title(result.title)
            .authors(authors)
            .journal(result.journal_title)
            .year(result.pub_year)
            .doi(result.doi)
            .pmid(result.pmid)
            .pmcid(result.pmcid.as_deref().and_then(normalize_pmcid))
            .open_access(open_access)
            .source_url(source_url)
            .pdf_url(pdf_url)
            .abstract_text(result.abstract_text)
            .build()
    }
}

/// Split Europe PMC's `"Smith J, Doe A."` author string into names
fn split_author_string(authors: &str) -> Vec<String> {
    authors
        .trim()
        .trim_end_matches('.')
        .split(',')
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}

#[async_trait]
impl Source for EuropePmcSource {
    fn source_type(&self) -> SourceType {
        SourceType::EuropePmc
    }

    async fn pull(&self, query: &Query) -> Pull {
        let paginator = Paginator::new(
            self.client.clone(),
            self.config.search_url.clone(),
            Pagination::cursor("cursorMark", "*"),
            Self::parse_search_page,
        )
        .param("query", Self::build_query_text(query))
        .param("format", "json")
        .param("resultType", self.config.result_type.as_str())
        .page_size("pageSize", self.config.effective_page_size())
        .max_results(query.max_results)
        .throttle(self.throttle.clone());

        drain_hits(SourceType::EuropePmc, paginator.hits(), Self::parse_result).await
    }
}

/// Search response envelope
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    #[serde(default, deserialize_with = "lenient::usize")]
    hit_count: Option<usize>,
    #[serde(default, deserialize_with = "lenient::string")]
    next_cursor_mark: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    result_list: Option<ResultList>,
}

/// List of results, kept raw so one bad hit cannot fail the page
#[derive(Debug, Default, Deserialize)]
struct ResultList {
    #[serde(default)]
    result: Vec<serde_json::Value>,
}

/// Individual search result
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResultItem {
    #[serde(default, deserialize_with = "lenient::string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    source: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pmid: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pmcid: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    doi: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    author_string: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    journal_title: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub_year: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    is_open_access: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    abstract_text: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    full_text_url_list: Option<FullTextUrlList>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullTextUrlList {
    #[serde(default)]
    full_text_url: Vec<FullTextUrl>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullTextUrl {
    #[serde(default, deserialize_with = "lenient::string")]
    document_style: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    url: Option<String>,
}
