//! Shared NCBI E-utilities plumbing for the PubMed and PMC sources.
//!
//! Retrieval is two-phase: `esearch` with `usehistory=y` stores the full
//! result list server-side and reports its size, then the stored list is
//! walked in fixed-size `efetch`/`esummary` batches by `retstart` offset.
//! Every request identifies the caller with `email` and `tool`, plus
//! `api_key` when one is configured.

use serde::Deserialize;

use crate::config::Config;
use crate::models::{MaxResults, Query};
use crate::sources::{lenient, SourceError};
use crate::utils::{HttpClient, Pagination, Paginator, Throttle};

/// Server-side result list created by esearch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHistory {
    /// Total number of matching records
    pub count: usize,
    /// Web environment holding the stored list
    pub web_env: String,
    /// Key of the stored query within the web environment
    pub query_key: String,
}

/// E-utilities client bound to one contact identity
#[derive(Debug, Clone)]
pub struct EutilsClient {
    client: HttpClient,
    base_url: String,
    email: String,
    tool: String,
    api_key: Option<String>,
    batch_size: usize,
    throttle: Throttle,
}

impl EutilsClient {
    /// Create a client, failing fast when the contact email or tool name is missing
    pub fn new(client: HttpClient, config: &Config) -> Result<Self, SourceError> {
        let email = config
            .contact
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                SourceError::Configuration(
                    "A contact email is required by the NCBI E-utilities usage policy".to_string(),
                )
            })?
            .to_string();

        let tool = config.contact.tool.trim();
        if tool.is_empty() {
            return Err(SourceError::Configuration(
                "A tool name is required by the NCBI E-utilities usage policy".to_string(),
            ));
        }

        Ok(Self {
            client,
            base_url: config.eutils.base_url.trim_end_matches('/').to_string(),
            email,
            tool: tool.to_string(),
            api_key: config
                .api_keys
                .ncbi
                .clone()
                .filter(|k| !k.trim().is_empty()),
            batch_size: config.eutils.batch_size.max(1),
            throttle: Throttle::new(config.eutils.min_interval()),
        })
    }

    /// Endpoint URL for a utility such as `esearch`
    fn endpoint(&self, utility: &str) -> String {
        format!("{}/{}.fcgi", self.base_url, utility)
    }

    /// Identification parameters sent with every request
    fn identity_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("email".to_string(), self.email.clone()),
            ("tool".to_string(), self.tool.clone()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key".to_string(), key.clone()));
        }
        params
    }

    /// Run esearch with history for `query` against `db`
    pub async fn esearch(&self, db: &str, query: &Query) -> Result<SearchHistory, SourceError> {
        let mut params = vec![
            ("db".to_string(), db.to_string()),
            ("term".to_string(), query.text.clone()),
            ("retmode".to_string(), "json".to_string()),
            ("usehistory".to_string(), "y".to_string()),
            ("retmax".to_string(), "0".to_string()),
        ];
        if let Some(years) = query.years {
            params.push(("datetype".to_string(), "pdat".to_string()));
            params.push(("mindate".to_string(), years.from.to_string()));
            params.push(("maxdate".to_string(), years.to.to_string()));
        }
        params.extend(self.identity_params());

        self.throttle.ready().await;
        tracing::debug!(db, "running esearch");
        let json = self.client.get_text(&self.endpoint("esearch"), &params).await?;

        let history = Self::parse_esearch(&json)?;
        tracing::debug!(db, count = history.count, "esearch complete");
        Ok(history)
    }

    /// Decode an esearch JSON response
    pub(crate) fn parse_esearch(json: &str) -> Result<SearchHistory, SourceError> {
        let response: ESearchResponse = serde_json::from_str(json)
            .map_err(|e| SourceError::upstream(None, format!("Failed to parse esearch JSON: {}", e)))?;

        if let Some(error) = response.error {
            return Err(SourceError::upstream(None, error));
        }

        let result = response
            .esearchresult
            .ok_or_else(|| SourceError::upstream(None, "esearch response has no esearchresult"))?;

        if let Some(error) = result.error {
            return Err(SourceError::upstream(None, error));
        }

        let count = result
            .count
            .ok_or_else(|| SourceError::upstream(None, "esearch response has no count"))?;

        let web_env = result.webenv.unwrap_or_default();
        let query_key = result.querykey.unwrap_or_default();
        if count > 0 && (web_env.is_empty() || query_key.is_empty()) {
            return Err(SourceError::upstream(
                None,
                "esearch response has no WebEnv/QueryKey history",
            ));
        }

        Ok(SearchHistory {
            count,
            web_env,
            query_key,
        })
    }

    /// Paginator walking the stored result list of `history` through `utility`
    pub fn batches<F>(
        &self,
        utility: &str,
        db: &str,
        retmode: &str,
        history: &SearchHistory,
        max_results: MaxResults,
        extract: F,
    ) -> Paginator<F> {
        Paginator::new(
            self.client.clone(),
            self.endpoint(utility),
            Pagination::offset("retstart", 0, history.count),
            extract,
        )
        .param("db", db)
        .param("query_key", history.query_key.clone())
        .param("WebEnv", history.web_env.clone())
        .param("retmode", retmode)
        .params(self.identity_params())
        .page_size("retmax", self.batch_size)
        .max_results(max_results)
        .throttle(self.throttle.clone())
    }
}

/// Fail a batch whose body carries an E-utilities error instead of records
pub(crate) fn check_error_body(body: &str) -> Result<(), SourceError> {
    let head = body.trim_start();
    if head.starts_with("<ERROR>") || (head.contains("<eFetchResult>") && head.contains("<ERROR>")) {
        return Err(SourceError::upstream(None, head.to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    #[serde(default)]
    esearchresult: Option<ESearchResult>,
    #[serde(default, deserialize_with = "lenient::string")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default, deserialize_with = "lenient::usize")]
    count: Option<usize>,
    #[serde(default, deserialize_with = "lenient::string")]
    webenv: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    querykey: Option<String>,
    #[serde(default, rename = "ERROR", deserialize_with = "lenient::string")]
    error: Option<String>,
}
