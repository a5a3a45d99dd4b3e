//! PubMed research source implementation using E-utilities API.
//!
//! Matching PMIDs are stored server-side by esearch and the full citations are
//! pulled back in `efetch` XML batches, parsed with a streaming reader.

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::config::Config;
use crate::models::{Pull, Query, Record, RecordBuilder, ResultSet, SourceType};
use crate::sources::eutils::{check_error_body, EutilsClient};
use crate::sources::{drain_hits, Source, SourceError};
use crate::utils::text::{collapse_whitespace, extract_year};
use crate::utils::{normalize_pmcid, HttpClient, Page};

const PUBMED_ARTICLE_URL: &str = "https://pubmed.ncbi.nlm.nih.gov";

/// PubMed research source
#[derive(Debug, Clone)]
pub struct PubMedSource {
    eutils: EutilsClient,
}

impl PubMedSource {
    /// Create a new PubMed source
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        Self::with_client(HttpClient::from_config(&config.http)?, config)
    }

    /// Create with a custom HTTP client (for testing)
    pub fn with_client(client: HttpClient, config: &Config) -> Result<Self, SourceError> {
        Ok(Self::with_eutils(EutilsClient::new(client, config)?))
    }

    /// Create on top of an existing E-utilities client, sharing its throttle
    pub fn with_eutils(eutils: EutilsClient) -> Self {
        Self { eutils }
    }

    /// Parse one efetch batch into raw articles
    ///
    /// A body that is not a `PubmedArticleSet` (an HTML maintenance page, a
    /// JSON error) is an upstream error, never an empty page.
    fn parse_efetch(xml: &str) -> Result<Page<RawArticle>, SourceError> {
        check_error_body(xml)?;
        Ok(Page::new(parse_article_set(xml)?))
    }

    /// Map a raw article into a Record
    fn parse_article(raw: RawArticle) -> Record {
        let year = raw
            .pub_year
            .or_else(|| raw.medline_date.as_deref().and_then(extract_year))
            .or(raw.article_year);

        let source_url = raw
            .pmid
            .as_ref()
            .map(|pmid| format!("{}/{}/", PUBMED_ARTICLE_URL, pmid));

        let abstract_text = if raw.abstract_segments.is_empty() {
            None
        } else {
            Some(raw.abstract_segments.join(" "))
        };

        RecordBuilder::new(SourceType::PubMed)
            .title(raw.title)
            .authors(raw.authors)
            .journal(raw.journal)
            .year(year)
            .doi(raw.article_doi.or(raw.elocation_doi))
            .pmid(raw.pmid)
            .pmcid(raw.pmcid.as_deref().and_then(normalize_pmcid))
            .source_url(source_url)
            .abstract_text(abstract_text)
            .build()
    }
}

#[async_trait]
impl Source for PubMedSource {
    fn source_type(&self) -> SourceType {
        SourceType::PubMed
    }

    async fn pull(&self, query: &Query) -> Pull {
        let history = match self.eutils.esearch("pubmed", query).await {
            Ok(history) => history,
            Err(error) => {
                tracing::warn!(source = "pubmed", "esearch failed: {}", error);
                return Pull::failed(SourceType::PubMed, ResultSet::new(), error);
            }
        };

        let paginator = self.eutils.batches(
            "efetch",
            "pubmed",
            "xml",
            &history,
            query.max_results,
            Self::parse_efetch,
        );

        drain_hits(SourceType::PubMed, paginator.hits(), Self::parse_article).await
    }
}

/// All-optional view of one `PubmedArticle` or `PubmedBookArticle`
#[derive(Debug, Default, Clone, PartialEq)]
struct RawArticle {
    pmid: Option<String>,
    title: Option<String>,
    book_title: Option<String>,
    journal: Option<String>,
    pub_year: Option<String>,
    medline_date: Option<String>,
    article_year: Option<String>,
    abstract_segments: Vec<String>,
    article_doi: Option<String>,
    elocation_doi: Option<String>,
    pmcid: Option<String>,
    authors: Vec<String>,
}

/// Element whose text is being collected
#[derive(Debug, Clone, PartialEq)]
enum Field {
    Pmid,
    Title,
    BookTitle,
    Journal,
    PubYear,
    MedlineDate,
    ArticleYear,
    Abstract(Option<String>),
    ElocationDoi,
    ArticleDoi,
    ArticlePmc,
    LastName,
    ForeName,
    Initials,
    CollectiveName,
}

#[derive(Debug, Default)]
struct AuthorParts {
    last_name: Option<String>,
    fore_name: Option<String>,
    initials: Option<String>,
    collective_name: Option<String>,
}

impl AuthorParts {
    /// `LastName Initials`, falling back to the fore name or the collective name
    fn display_name(self) -> Option<String> {
        if let Some(last) = self.last_name {
            return Some(match self.initials.or(self.fore_name) {
                Some(given) => format!("{} {}", last, given),
                None => last,
            });
        }
        self.collective_name
    }
}

struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Decide which field, if any, an opening element contributes to
fn field_for(name: &str, e: &BytesStart, path: &[String]) -> Option<Field> {
    let parent = path.last().map(String::as_str);
    let grandparent = path.len().checked_sub(2).map(|i| path[i].as_str());

    match (name, parent) {
        ("PMID", Some("MedlineCitation" | "BookDocument")) => Some(Field::Pmid),
        ("ArticleTitle", _) => Some(Field::Title),
        ("BookTitle", _) => Some(Field::BookTitle),
        ("Title", Some("Journal")) => Some(Field::Journal),
        ("Year", Some("PubDate")) => Some(Field::PubYear),
        ("MedlineDate", Some("PubDate")) => Some(Field::MedlineDate),
        ("Year", Some("ArticleDate")) => Some(Field::ArticleYear),
        ("AbstractText", Some("Abstract")) => Some(Field::Abstract(attribute(e, b"Label"))),
        ("ELocationID", _) => match attribute(e, b"EIdType").as_deref() {
            Some("doi") => Some(Field::ElocationDoi),
            _ => None,
        },
        ("ArticleId", Some("ArticleIdList")) if grandparent == Some("PubmedData") => {
            match attribute(e, b"IdType").as_deref() {
                Some("doi") => Some(Field::ArticleDoi),
                Some("pmc") => Some(Field::ArticlePmc),
                _ => None,
            }
        }
        ("LastName", Some("Author")) => Some(Field::LastName),
        ("ForeName", Some("Author")) => Some(Field::ForeName),
        ("Initials", Some("Author")) => Some(Field::Initials),
        ("CollectiveName", Some("Author")) => Some(Field::CollectiveName),
        _ => None,
    }
}

fn set_once(slot: &mut Option<String>, value: String) {
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value);
    }
}

fn store(article: &mut RawArticle, author: &mut AuthorParts, field: Field, text: String) {
    match field {
        Field::Pmid => set_once(&mut article.pmid, text),
        Field::Title => set_once(&mut article.title, text),
        Field::BookTitle => set_once(&mut article.book_title, text),
        Field::Journal => set_once(&mut article.journal, text),
        Field::PubYear => set_once(&mut article.pub_year, text),
        Field::MedlineDate => set_once(&mut article.medline_date, text),
        Field::ArticleYear => set_once(&mut article.article_year, text),
        Field::Abstract(label) => {
            if !text.is_empty() {
                article.abstract_segments.push(match label {
                    Some(label) if !label.trim().is_empty() => format!("{}: {}", label.trim(), text),
                    _ => text,
                });
            }
        }
        Field::ElocationDoi => set_once(&mut article.elocation_doi, text),
        Field::ArticleDoi => set_once(&mut article.article_doi, text),
        Field::ArticlePmc => set_once(&mut article.pmcid, text),
        Field::LastName => set_once(&mut author.last_name, text),
        Field::ForeName => set_once(&mut author.fore_name, text),
        Field::Initials => set_once(&mut author.initials, text),
        Field::CollectiveName => set_once(&mut author.collective_name, text),
    }
}

const ARTICLE_SET: &str = "PubmedArticleSet";

/// Stream through a `PubmedArticleSet`, one raw article per citation
fn parse_article_set(xml: &str) -> Result<Vec<RawArticle>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut articles = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<RawArticle> = None;
    let mut author = AuthorParts::default();
    let mut capture: Option<Capture> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Empty(ref e) => {
                if path.is_empty() && e.name().as_ref() == ARTICLE_SET.as_bytes() {
                    saw_root = true;
                }
            }
            Event::Start(ref e) => {
                let name = element_name(e);
                if path.is_empty() && name == ARTICLE_SET {
                    saw_root = true;
                }
                match name.as_str() {
                    "PubmedArticle" | "PubmedBookArticle" => current = Some(RawArticle::default()),
                    "Author" => author = AuthorParts::default(),
                    _ => {}
                }
                if current.is_some() && capture.is_none() {
                    if let Some(field) = field_for(&name, e, &path) {
                        capture = Some(Capture {
                            field,
                            depth: path.len(),
                            text: String::new(),
                        });
                    }
                }
                path.push(name);
            }
            Event::Text(ref e) => {
                if let Some(capture) = capture.as_mut() {
                    capture.text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(capture) = capture.as_mut() {
                    capture.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(_) => {
                let name = path.pop().unwrap_or_default();

                if capture.as_ref().is_some_and(|c| c.depth == path.len()) {
                    if let (Some(done), Some(article)) = (capture.take(), current.as_mut()) {
                        store(article, &mut author, done.field, collapse_whitespace(&done.text));
                    }
                }

                match name.as_str() {
                    "Author" if path.last().map(String::as_str) == Some("AuthorList") => {
                        let parts = std::mem::take(&mut author);
                        if let (Some(article), Some(display)) = (current.as_mut(), parts.display_name()) {
                            article.authors.push(display);
                        }
                    }
                    "PubmedArticle" | "PubmedBookArticle" => {
                        if let Some(mut article) = current.take() {
                            if article.title.is_none() {
                                article.title = article.book_title.take();
                            }
                            articles.push(article);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(SourceError::upstream(None, "PubMed efetch response is not a PubmedArticleSet"));
    }
    if current.is_some() || !path.is_empty() {
        return Err(SourceError::upstream(None, "PubMed efetch response ended inside an article"));
    }

    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OpenAccess;

    const ARTICLE_SET: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE PubmedArticleSet PUBLIC "-//NLM//DTD PubMedArticle, 1st January 2024//EN" "https://dtd.nlm.nih.gov/ncbi/pubmed/out/pubmed_240101.dtd">
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
      <PMID Version="1">31000001</PMID>
      <Article PubModel="Print">
        <Journal>
          <JournalIssue CitedMedium="Internet">
            <PubDate><Year>2019</Year><Month>Mar</Month></PubDate>
          </JournalIssue>
          <Title>Journal of Hospital Infection</Title>
        </Journal>
        <ArticleTitle>Wound infection after <i>Staphylococcus aureus</i> colonisation &amp; surgery.</ArticleTitle>
        <ELocationID EIdType="pii" ValidYN="Y">S0195-6701(19)30001-1</ELocationID>
        <ELocationID EIdType="doi" ValidYN="Y">10.1016/j.jhin.2019.01.001</ELocationID>
        <Abstract>
          <AbstractText Label="BACKGROUND" NlmCategory="BACKGROUND">Infections are common.</AbstractText>
          <AbstractText Label="METHODS" NlmCategory="METHODS">We reviewed   records.</AbstractText>
        </Abstract>
        <AuthorList CompleteYN="Y">
          <Author ValidYN="Y"><LastName>Smith</LastName><ForeName>John</ForeName><Initials>J</Initials></Author>
          <Author ValidYN="Y"><CollectiveName>SSI Study Group</CollectiveName></Author>
        </AuthorList>
      </Article>
      <CommentsCorrectionsList>
        <CommentsCorrections RefType="CommentIn"><PMID Version="1">39999999</PMID></CommentsCorrections>
      </CommentsCorrectionsList>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">31000001</ArticleId>
        <ArticleId IdType="pmc">PMC6500001</ArticleId>
      </ArticleIdList>
      <ReferenceList>
        <Reference>
          <ArticleIdList><ArticleId IdType="doi">10.9999/reference</ArticleId></ArticleIdList>
        </Reference>
      </ReferenceList>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation Status="PubMed-not-MEDLINE" Owner="NLM">
      <PMID Version="1">31000002</PMID>
      <Article PubModel="Print">
        <Journal>
          <JournalIssue><PubDate><MedlineDate>2018 Dec-2019 Jan</MedlineDate></PubDate></JournalIssue>
          <Title>Surgery Today</Title>
        </Journal>
        <ArticleTitle>Antibiotic prophylaxis.</ArticleTitle>
        <Abstract><AbstractText>Plain abstract.</AbstractText></Abstract>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="doi">10.1007/S00595-018-1234-5</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
</PubmedArticleSet>"#;

    fn parse(xml: &str) -> Vec<Record> {
        PubMedSource::parse_efetch(xml)
            .unwrap()
            .hits
            .into_iter()
            .map(PubMedSource::parse_article)
            .collect()
    }

    #[test]
    fn test_parse_structured_article() {
        let records = parse(ARTICLE_SET);
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(
            first.title.as_deref(),
            Some("Wound infection after Staphylococcus aureus colonisation & surgery.")
        );
        assert_eq!(first.journal.as_deref(), Some("Journal of Hospital Infection"));
        assert_eq!(first.year.as_deref(), Some("2019"));
        assert_eq!(first.pmid.as_deref(), Some("31000001"));
        assert_eq!(first.pmcid.as_deref(), Some("PMC6500001"));
        assert_eq!(first.doi.as_deref(), Some("10.1016/j.jhin.2019.01.001"));
        assert_eq!(first.authors, vec!["Smith J", "SSI Study Group"]);
        assert_eq!(
            first.abstract_text.as_deref(),
            Some("BACKGROUND: Infections are common. METHODS: We reviewed records.")
        );
        assert_eq!(first.source_url.as_deref(), Some("https://pubmed.ncbi.nlm.nih.gov/31000001/"));
        assert_eq!(first.open_access, OpenAccess::Unknown);
        assert_eq!(first.source, Some(SourceType::PubMed));
    }

    #[test]
    fn test_parse_medline_date_and_article_id_doi() {
        let records = parse(ARTICLE_SET);
        let second = &records[1];

        assert_eq!(second.year.as_deref(), Some("2018"));
        assert_eq!(second.doi.as_deref(), Some("10.1007/S00595-018-1234-5"));
        assert_eq!(second.pmcid, None);
        assert!(second.authors.is_empty());
        assert_eq!(second.abstract_text.as_deref(), Some("Plain abstract."));
    }

    #[test]
    fn test_reference_list_ids_are_ignored() {
        let records = parse(ARTICLE_SET);
        assert!(records
            .iter()
            .all(|r| r.doi.as_deref() != Some("10.9999/reference")));
    }

    #[test]
    fn test_book_article_counts_as_hit() {
        let xml = r#"<PubmedArticleSet>
          <PubmedBookArticle>
            <BookDocument>
              <PMID Version="1">20301295</PMID>
              <Book><BookTitle>GeneReviews</BookTitle><PubDate><Year>1993</Year></PubDate></Book>
            </BookDocument>
          </PubmedBookArticle>
        </PubmedArticleSet>"#;

        let records = parse(xml);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title.as_deref(), Some("GeneReviews"));
        assert_eq!(records[0].year.as_deref(), Some("1993"));
        assert_eq!(records[0].pmid.as_deref(), Some("20301295"));
    }

    #[test]
    fn test_empty_set_is_empty_page() {
        let page = PubMedSource::parse_efetch("<PubmedArticleSet></PubmedArticleSet>").unwrap();
        assert!(page.hits.is_empty());
    }

    #[test]
    fn test_error_body_and_broken_xml_are_upstream_errors() {
        let err = PubMedSource::parse_efetch("<eFetchResult><ERROR>Invalid WebEnv</ERROR></eFetchResult>").unwrap_err();
        assert!(err.is_upstream());

        let err = PubMedSource::parse_efetch("<PubmedArticleSet><PubmedArticle></Oops>").unwrap_err();
        assert!(err.is_upstream());
    }

    #[test]
    fn test_body_without_article_set_is_upstream_error() {
        let html = "<html><body><h1>Service temporarily unavailable</h1></body></html>";
        assert!(PubMedSource::parse_efetch(html).unwrap_err().is_upstream());

        let json = r#"{"error":"API rate limit exceeded","api-key":"1.2.3.4","count":"11","limit":"10"}"#;
        assert!(PubMedSource::parse_efetch(json).unwrap_err().is_upstream());

        assert!(PubMedSource::parse_efetch("").unwrap_err().is_upstream());
        assert!(PubMedSource::parse_efetch("<PubmedArticleSet/>").unwrap().hits.is_empty());
    }

    #[test]
    fn test_truncated_article_set_is_upstream_error() {
        let truncated = "<PubmedArticleSet><PubmedArticle><MedlineCitation><PMID>1</PMID>";
        assert!(PubMedSource::parse_efetch(truncated).unwrap_err().is_upstream());
    }

    #[test]
    fn test_author_display_name() {
        let parts = AuthorParts {
            last_name: Some("Doe".to_string()),
            fore_name: Some("Alice".to_string()),
            initials: None,
            collective_name: None,
        };
        assert_eq!(parts.display_name().as_deref(), Some("Doe Alice"));
        assert_eq!(AuthorParts::default().display_name(), None);
    }
}
