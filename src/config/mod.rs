//! Configuration management.
//!
//! Configuration is an explicit value handed to each source adapter at
//! construction; nothing here is process-wide state.
//!
//! # Configuration File Format
//!
//! ```toml
//! [contact]
//! email = "researcher@example.org"
//! tool = "research-retriever"
//!
//! [api_keys]
//! ncbi = "your-ncbi-api-key"
//!
//! [http]
//! timeout_secs = 30
//!
//! [europe_pmc]
//! page_size = 1000
//! min_interval_ms = 200
//! result_type = "core"
//!
//! [eutils]
//! batch_size = 200
//! min_interval_ms = 340
//! pmc_fetch_mode = "summary"
//! ```
//!
//! Every key can be overridden from the environment with the
//! `RESEARCH_RETRIEVER__` prefix, e.g. `RESEARCH_RETRIEVER__CONTACT__EMAIL`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Europe PMC REST search endpoint
pub const EUROPE_PMC_SEARCH_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest/search";

/// NCBI E-utilities base URL
pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Largest page size Europe PMC accepts
pub const EUROPE_PMC_MAX_PAGE_SIZE: usize = 1000;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Identification sent to NCBI with every request
    #[serde(default)]
    pub contact: ContactConfig,

    /// API keys for various services
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Europe PMC settings
    #[serde(default)]
    pub europe_pmc: EuropePmcConfig,

    /// NCBI E-utilities settings (PubMed and PMC)
    #[serde(default)]
    pub eutils: EutilsConfig,
}

/// Contact details required by the NCBI usage policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactConfig {
    /// Contact email address
    #[serde(default = "default_email")]
    pub email: Option<String>,

    /// Tool name
    #[serde(default = "default_tool")]
    pub tool: String,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            email: default_email(),
            tool: default_tool(),
        }
    }
}

fn default_email() -> Option<String> {
    std::env::var("NCBI_EMAIL").ok().filter(|e| !e.trim().is_empty())
}

fn default_tool() -> String {
    std::env::var("NCBI_TOOL").unwrap_or_else(|_| env!("CARGO_PKG_NAME").to_string())
}

/// API keys for external services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    /// NCBI API key (optional, for higher rate limits)
    #[serde(default = "default_ncbi_key")]
    pub ncbi: Option<String>,
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            ncbi: default_ncbi_key(),
        }
    }
}

fn default_ncbi_key() -> Option<String> {
    std::env::var("NCBI_API_KEY").ok().filter(|k| !k.trim().is_empty())
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent override
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: None,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Europe PMC result type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    /// Full metadata including abstract and full-text links
    #[default]
    Core,
    /// Minimal metadata
    Lite,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Core => "core",
            ResultType::Lite => "lite",
        }
    }
}

/// Europe PMC configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EuropePmcConfig {
    /// Search endpoint
    #[serde(default = "default_europe_pmc_url")]
    pub search_url: String,

    /// Records per page, capped at 1000
    #[serde(default = "default_europe_pmc_page_size")]
    pub page_size: usize,

    /// Minimum delay between consecutive requests in milliseconds
    #[serde(default = "default_europe_pmc_interval")]
    pub min_interval_ms: u64,

    #[serde(default)]
    pub result_type: ResultType,
}

impl Default for EuropePmcConfig {
    fn default() -> Self {
        Self {
            search_url: default_europe_pmc_url(),
            page_size: default_europe_pmc_page_size(),
            min_interval_ms: default_europe_pmc_interval(),
            result_type: ResultType::default(),
        }
    }
}

impl EuropePmcConfig {
    /// Page size clamped to what the API accepts
    pub fn effective_page_size(&self) -> usize {
        self.page_size.clamp(1, EUROPE_PMC_MAX_PAGE_SIZE)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

fn default_europe_pmc_url() -> String {
    EUROPE_PMC_SEARCH_URL.to_string()
}

fn default_europe_pmc_page_size() -> usize {
    EUROPE_PMC_MAX_PAGE_SIZE
}

fn default_europe_pmc_interval() -> u64 {
    200
}

/// How PMC records are fetched after esearch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PmcFetchMode {
    /// esummary JSON
    #[default]
    Summary,
    /// efetch JATS XML
    Xml,
}

/// NCBI E-utilities configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EutilsConfig {
    /// Base URL, without trailing slash
    #[serde(default = "default_eutils_url")]
    pub base_url: String,

    /// Records per efetch/esummary batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Minimum delay between consecutive requests in milliseconds
    #[serde(default = "default_eutils_interval")]
    pub min_interval_ms: u64,

    #[serde(default)]
    pub pmc_fetch_mode: PmcFetchMode,
}

impl Default for EutilsConfig {
    fn default() -> Self {
        Self {
            base_url: default_eutils_url(),
            batch_size: default_batch_size(),
            min_interval_ms: default_eutils_interval(),
            pmc_fetch_mode: PmcFetchMode::default(),
        }
    }
}

impl EutilsConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

fn default_eutils_url() -> String {
    EUTILS_BASE_URL.to_string()
}

fn default_batch_size() -> usize {
    200
}

// NCBI allows three requests per second without an API key
fn default_eutils_interval() -> u64 {
    340
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(environment())
        .build()?;

    settings.try_deserialize()
}

/// Parse configuration from a TOML string
pub fn config_from_toml(toml: &str) -> Result<Config, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?
        .try_deserialize()
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("RESEARCH_RETRIEVER")
        .prefix_separator("__")
        .separator("__")
}

/// Get the configuration from `RESEARCH_RETRIEVER__*` env vars, falling back to defaults
pub fn get_config() -> Config {
    config::Config::builder()
        .add_source(environment())
        .build()
        .and_then(|settings| settings.try_deserialize())
        .unwrap_or_else(|e| {
            tracing::warn!("Ignoring invalid environment configuration: {}", e);
            Config::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.europe_pmc.page_size, 1000);
        assert_eq!(config.eutils.batch_size, 200);
        assert!(config.eutils.min_interval() >= Duration::from_millis(334));
        assert_eq!(config.http.timeout(), Duration::from_secs(30));
        assert_eq!(config.europe_pmc.result_type, ResultType::Core);
    }

    #[test]
    fn test_page_size_is_capped() {
        let config = EuropePmcConfig {
            page_size: 5000,
            ..EuropePmcConfig::default()
        };
        assert_eq!(config.effective_page_size(), 1000);
    }

    #[test]
    fn test_config_from_toml() {
        let config = config_from_toml(
            r#"
            [contact]
            email = "someone@example.org"
            tool = "review-bot"

            [eutils]
            batch_size = 100
            pmc_fetch_mode = "xml"
            "#,
        )
        .unwrap();

        assert_eq!(config.contact.email.as_deref(), Some("someone@example.org"));
        assert_eq!(config.contact.tool, "review-bot");
        assert_eq!(config.eutils.batch_size, 100);
        assert_eq!(config.eutils.pmc_fetch_mode, PmcFetchMode::Xml);
        assert_eq!(config.europe_pmc.page_size, 1000);
    }
}
