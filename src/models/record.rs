//! Record model representing one bibliographic hit from any source.

use serde::{Deserialize, Serialize};

/// The database a record was retrieved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    #[serde(rename = "europe_pmc")]
    EuropePmc,
    #[serde(rename = "pubmed")]
    PubMed,
    #[serde(rename = "pmc")]
    Pmc,
}

impl SourceType {
    /// All known sources, in the order they are queried by default
    pub const ALL: [SourceType; 3] = [SourceType::EuropePmc, SourceType::PubMed, SourceType::Pmc];

    /// Returns the display name of the source
    pub fn name(&self) -> &'static str {
        match self {
            SourceType::EuropePmc => "Europe PMC",
            SourceType::PubMed => "PubMed",
            SourceType::Pmc => "PubMed Central",
        }
    }

    /// Returns the source identifier
    pub fn id(&self) -> &'static str {
        match self {
            SourceType::EuropePmc => "europe_pmc",
            SourceType::PubMed => "pubmed",
            SourceType::Pmc => "pmc",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "europe_pmc" | "europepmc" | "epmc" => Ok(SourceType::EuropePmc),
            "pubmed" => Ok(SourceType::PubMed),
            "pmc" => Ok(SourceType::Pmc),
            other => Err(format!("unknown source '{}'", other)),
        }
    }
}

/// Whether the full text of a record is freely available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAccess {
    Yes,
    No,
    #[default]
    Unknown,
}

impl OpenAccess {
    /// `Some(true)` / `Some(false)` for known values, `None` when unknown
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OpenAccess::Yes => Some(true),
            OpenAccess::No => Some(false),
            OpenAccess::Unknown => None,
        }
    }
}

/// A normalized bibliographic record
///
/// Every source adapter maps its native payload into this shape. Text fields
/// are `None` rather than blank when the source did not supply them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Article title
    pub title: Option<String>,

    /// Author display names, in publication order
    pub authors: Vec<String>,

    /// Journal title
    pub journal: Option<String>,

    /// Publication year, kept as text since sources disagree on its type
    pub year: Option<String>,

    /// Digital Object Identifier
    pub doi: Option<String>,

    /// PubMed identifier
    pub pmid: Option<String>,

    /// PubMed Central identifier (`PMC` prefixed)
    pub pmcid: Option<String>,

    /// Open access status as reported by the source
    pub open_access: OpenAccess,

    /// Article landing page
    pub source_url: Option<String>,

    /// Direct PDF URL
    pub pdf_url: Option<String>,

    /// Abstract text
    pub abstract_text: Option<String>,

    /// Database the record was retrieved from
    pub source: Option<SourceType>,
}

impl Record {
    /// Whether the record carries an identifier usable for cross-source deduplication
    pub fn is_dedup_eligible(&self) -> bool {
        self.doi.is_some() || self.pmcid.is_some()
    }

    /// Authors joined for tabular output
    pub fn authors_joined(&self) -> String {
        self.authors.join(", ")
    }
}

/// Builder for constructing Record objects
///
/// Blank strings passed to any setter are stored as `None`.
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    record: Record,
}

fn non_blank(value: impl Into<Option<String>>) -> Option<String> {
    value
        .into()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RecordBuilder {
    /// Create a new builder for a record from `source`
    pub fn new(source: SourceType) -> Self {
        Self {
            record: Record {
                source: Some(source),
                ..Record::default()
            },
        }
    }

    pub fn title(mut self, title: impl Into<Option<String>>) -> Self {
        self.record.title = non_blank(title);
        self
    }

    /// Set authors, dropping blank names
    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record.authors = authors
            .into_iter()
            .filter_map(|a| non_blank(Into::<String>::into(a)))
            .collect();
        self
    }

    pub fn journal(mut self, journal: impl Into<Option<String>>) -> Self {
        self.record.journal = non_blank(journal);
        self
    }

    pub fn year(mut self, year: impl Into<Option<String>>) -> Self {
        self.record.year = non_blank(year);
        self
    }

    pub fn doi(mut self, doi: impl Into<Option<String>>) -> Self {
        self.record.doi = non_blank(doi);
        self
    }

    pub fn pmid(mut self, pmid: impl Into<Option<String>>) -> Self {
        self.record.pmid = non_blank(pmid);
        self
    }

    pub fn pmcid(mut self, pmcid: impl Into<Option<String>>) -> Self {
        self.record.pmcid = non_blank(pmcid);
        self
    }

    pub fn open_access(mut self, open_access: OpenAccess) -> Self {
        self.record.open_access = open_access;
        self
    }

    pub fn source_url(mut self, url: impl Into<Option<String>>) -> Self {
        self.record.source_url = non_blank(url);
        self
    }

    pub fn pdf_url(mut self, url: impl Into<Option<String>>) -> Self {
        self.record.pdf_url = non_blank(url);
        self
    }

    pub fn abstract_text(mut self, text: impl Into<Option<String>>) -> Self {
        self.record.abstract_text = non_blank(text);
        self
    }

    /// Build the Record
    pub fn build(self) -> Record {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = RecordBuilder::new(SourceType::PubMed)
            .title("Test Paper".to_string())
            .authors(["Smith J", "Doe A"])
            .doi("10.1234/test.1234".to_string())
            .pmid("12345".to_string())
            .open_access(OpenAccess::Yes)
            .build();

        assert_eq!(record.title.as_deref(), Some("Test Paper"));
        assert_eq!(record.authors, vec!["Smith J", "Doe A"]);
        assert_eq!(record.doi.as_deref(), Some("10.1234/test.1234"));
        assert_eq!(record.source, Some(SourceType::PubMed));
        assert_eq!(record.open_access.as_bool(), Some(true));
    }

    #[test]
    fn test_blank_values_are_absent() {
        let record = RecordBuilder::new(SourceType::EuropePmc)
            .title("   ".to_string())
            .journal(None)
            .authors(["", "  Doe A "])
            .build();

        assert_eq!(record.title, None);
        assert_eq!(record.journal, None);
        assert_eq!(record.authors, vec!["Doe A"]);
    }

    #[test]
    fn test_dedup_eligibility() {
        let pmid_only = RecordBuilder::new(SourceType::PubMed)
            .pmid("1".to_string())
            .build();
        assert!(!pmid_only.is_dedup_eligible());

        let with_pmcid = RecordBuilder::new(SourceType::Pmc)
            .pmcid("PMC1".to_string())
            .build();
        assert!(with_pmcid.is_dedup_eligible());
    }

    #[test]
    fn test_source_type_parse() {
        assert_eq!("europe_pmc".parse::<SourceType>(), Ok(SourceType::EuropePmc));
        assert_eq!("PubMed".parse::<SourceType>(), Ok(SourceType::PubMed));
        assert!("scholar".parse::<SourceType>().is_err());
        assert_eq!(SourceType::Pmc.to_string(), "PubMed Central");
    }
}
