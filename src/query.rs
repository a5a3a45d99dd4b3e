//! Boolean search-string construction.
//!
//! A [`SearchStrategy`] collects concept blocks (a main term plus synonyms),
//! exclusions and an optional year range, and renders them as:
//!
//! - a fielded query for PubMed, PMC and Europe PMC (`"term"[Title/Abstract]`)
//! - an untagged free-text query for Google Scholar
//! - direct browser links to each database's own search page
//!
//! The retrieval layer treats the rendered strings as opaque.

use serde::{Deserialize, Serialize};

use crate::models::{MaxResults, Query, SourceType, YearRange};

/// Field tag applied to concept terms
pub const TITLE_ABSTRACT: &str = "Title/Abstract";

/// Field tag applied to exclusions
pub const PUBLICATION_TYPE: &str = "Publication Type";

const PUBMED_SEARCH_URL: &str = "https://pubmed.ncbi.nlm.nih.gov/?term=";
const PMC_SEARCH_URL: &str = "https://www.ncbi.nlm.nih.gov/pmc/?term=";
const EUROPE_PMC_SEARCH_URL: &str = "https://europepmc.org/search?query=";
const GOOGLE_SCHOLAR_SEARCH_URL: &str = "https://scholar.google.com/scholar?q=";

fn tagged(term: &str, field: Option<&str>) -> String {
    match field {
        Some(field) => format!("\"{}\"[{}]", term, field),
        None => format!("\"{}\"", term),
    }
}

fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// `("term"[field] OR "synonym"[field] ...)` from a term and newline-separated synonyms
///
/// Blank lines are skipped; with nothing left the block is empty.
pub fn build_or_block(term: &str, synonyms: &str, field: Option<&str>) -> String {
    let terms: Vec<String> = lines(term)
        .chain(lines(synonyms))
        .map(|t| tagged(t, field))
        .collect();

    if terms.is_empty() {
        String::new()
    } else {
        format!("({})", terms.join(" OR "))
    }
}

/// ` NOT ("x"[field] OR ...)` from newline-separated exclusions, with a leading space
pub fn build_not_block(exclusions: &str, field: Option<&str>) -> String {
    let terms: Vec<String> = lines(exclusions).map(|t| tagged(t, field)).collect();

    if terms.is_empty() {
        String::new()
    } else {
        format!(" NOT ({})", terms.join(" OR "))
    }
}

/// AND-join the non-empty blocks
pub fn combine_blocks<I, S>(blocks: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    blocks
        .into_iter()
        .filter(|b| !b.as_ref().is_empty())
        .map(|b| b.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Percent-encode like a browser address bar would, leaving `/` readable
fn quote(text: &str) -> String {
    urlencoding::encode(text).replace("%2F", "/")
}

/// One concept: a main term and its synonyms, one per line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptBlock {
    pub term: String,
    #[serde(default)]
    pub synonyms: String,
}

impl ConceptBlock {
    pub fn new(term: impl Into<String>, synonyms: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            synonyms: synonyms.into(),
        }
    }
}

/// Direct links to each database's own search page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchLinks {
    pub pubmed: String,
    pub pmc: String,
    pub europe_pmc: String,
    pub google_scholar: String,
}

/// A Boolean search built from concept blocks and exclusions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStrategy {
    #[serde(default)]
    pub concepts: Vec<ConceptBlock>,
    #[serde(default)]
    pub exclusions: String,
    #[serde(default)]
    pub years: Option<YearRange>,
}

impl SearchStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a concept block; blocks are AND-ed in insertion order
    pub fn concept(mut self, term: impl Into<String>, synonyms: impl Into<String>) -> Self {
        self.concepts.push(ConceptBlock::new(term, synonyms));
        self
    }

    /// Newline-separated publication types to exclude
    pub fn exclude(mut self, exclusions: impl Into<String>) -> Self {
        self.exclusions = exclusions.into();
        self
    }

    pub fn years(mut self, from: u16, to: u16) -> Self {
        self.years = Some(YearRange::new(from, to));
        self
    }

    fn render(&self, concept_field: Option<&str>, exclusion_field: Option<&str>) -> String {
        let blocks = self
            .concepts
            .iter()
            .map(|c| build_or_block(&c.term, &c.synonyms, concept_field));
        combine_blocks(blocks) + &build_not_block(&self.exclusions, exclusion_field)
    }

    /// Field-tagged query for PubMed, PMC and Europe PMC
    pub fn fielded_query(&self) -> String {
        self.render(Some(TITLE_ABSTRACT), Some(PUBLICATION_TYPE))
    }

    /// Untagged free-text query for Google Scholar
    pub fn free_text_query(&self) -> String {
        self.render(None, None)
    }

    /// Whether the strategy renders to an empty query
    pub fn is_empty(&self) -> bool {
        self.fielded_query().trim().is_empty()
    }

    pub fn links(&self) -> SearchLinks {
        let fielded = quote(&self.fielded_query());
        let year_filter = self
            .years
            .map(|y| format!("&filter=years.{}-{}", y.from, y.to))
            .unwrap_or_default();

        SearchLinks {
            pubmed: format!("{}{}{}", PUBMED_SEARCH_URL, fielded, year_filter),
            pmc: format!("{}{}", PMC_SEARCH_URL, fielded),
            europe_pmc: format!("{}{}", EUROPE_PMC_SEARCH_URL, fielded),
            google_scholar: format!("{}{}", GOOGLE_SCHOLAR_SEARCH_URL, quote(&self.free_text_query())),
        }
    }

    /// One retrieval query per database, carrying the year range and bound
    pub fn queries(&self, max_results: MaxResults) -> Vec<Query> {
        let text = self.fielded_query();
        SourceType::ALL
            .iter()
            .map(|&source| {
                let query = Query::new(text.clone(), source).bound(max_results);
                match self.years {
                    Some(years) => query.years(years.from, years.to),
                    None => query,
                }
            })
            .collect()
    }
}
