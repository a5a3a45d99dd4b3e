//! PubMed Central source implementation using E-utilities API.
//!
//! Two retrieval modes share the esearch history phase:
//!
//! - `summary` (default): `esummary` JSON batches, one document summary per uid
//! - `xml`: `efetch` JATS XML batches, reading only the article front matter

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::Deserialize;
use serde_json::Value;

use crate::config::{Config, PmcFetchMode};
use crate::models::{OpenAccess, Pull, Query, Record, RecordBuilder, ResultSet, SourceType};
use crate::sources::eutils::{check_error_body, EutilsClient};
use crate::sources::{drain_hits, lenient, Source, SourceError};
use crate::utils::text::{collapse_whitespace, extract_year};
use crate::utils::{normalize_pmcid, HttpClient, Page};

const PMC_ARTICLE_URL: &str = "https://www.ncbi.nlm.nih.gov/pmc/articles";

/// PubMed Central research source
#[derive(Debug, Clone)]
pub struct PmcSource {
    eutils: EutilsClient,
    mode: PmcFetchMode,
}

impl PmcSource {
    /// Create a new PMC source
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        Self::with_client(HttpClient::from_config(&config.http)?, config)
    }

    /// Create with a custom HTTP client (for testing)
    pub fn with_client(client: HttpClient, config: &Config) -> Result<Self, SourceError> {
        Ok(Self::with_eutils(EutilsClient::new(client, config)?, config.eutils.pmc_fetch_mode))
    }

    /// Create on top of an existing E-utilities client, sharing its throttle
    pub fn with_eutils(eutils: EutilsClient, mode: PmcFetchMode) -> Self {
        Self { eutils, mode }
    }

    /// Decode one esummary batch, in uid order
    fn parse_summary_page(json: &str) -> Result<Page<RawSummary>, SourceError> {
        let response: SummaryResponse = serde_json::from_str(json)
            .map_err(|e| SourceError::upstream(None, format!("Failed to parse PMC esummary JSON: {}", e)))?;

        if let Some(error) = response.error {
            return Err(SourceError::upstream(None, error));
        }

        let result = response
            .result
            .ok_or_else(|| SourceError::upstream(None, "esummary response has no result"))?;

        let uids: Vec<String> = result
            .get("uids")
            .and_then(Value::as_array)
            .map(|uids| {
                uids.iter()
                    .filter_map(|uid| match uid {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let hits = uids
            .into_iter()
            .map(|uid| {
                let mut summary = result
                    .get(&uid)
                    .cloned()
                    .map(|raw| {
                        serde_json::from_value::<RawSummary>(raw).unwrap_or_else(|e| {
                            tracing::warn!(uid = %uid, "Undecodable PMC summary, keeping the uid only: {}", e);
                            RawSummary::default()
                        })
                    })
                    .unwrap_or_default();
                summary.uid = Some(uid);
                summary
            })
            .collect();

        Ok(Page::new(hits))
    }

    /// Map one document summary into a Record
    fn parse_summary(raw: RawSummary) -> Record {
        let pmcid = raw
            .uid
            .as_deref()
            .map(|uid| format!("PMC{}", uid.trim().trim_start_matches("PMC")))
            .and_then(|id| normalize_pmcid(&id));

        let article_id = |kind: &str| {
            raw.articleids
                .iter()
                .find(|id| id.idtype.as_deref() == Some(kind))
                .and_then(|id| id.value.clone())
        };

        let doi = raw
            .elocationid
            .as_deref()
            .and_then(doi_from_elocation)
            .or_else(|| article_id("doi"));
        let pmid = article_id("pmid").filter(|pmid| pmid.trim() != "0");

        let year = raw
            .pubdate
            .as_deref()
            .and_then(extract_year)
            .or_else(|| raw.epubdate.as_deref().and_then(extract_year));

        let authors: Vec<String> = raw.authors.into_iter().filter_map(|a| a.name).collect();

        RecordBuilder::new(SourceType::Pmc)
            .title(raw.title)
            .authors(authors)
            .journal(raw.fulljournalname.or(raw.source))
            .year(year)
            .doi(doi)
            .pmid(pmid)
            .open_access(OpenAccess::Yes)
            .source_url(pmcid.as_deref().map(article_url))
            .pdf_url(pmcid.as_deref().map(pdf_url))
            .pmcid(pmcid)
            .build()
    }

    /// Parse one efetch batch of JATS articles
    fn parse_xml_page(xml: &str) -> Result<Page<RawJatsArticle>, SourceError> {
        check_error_body(xml)?;
        Ok(Page::new(parse_jats_articles(xml)?))
    }

    /// Map one JATS article into a Record
    fn parse_jats(raw: RawJatsArticle) -> Record {
        let pmcid = raw.pmcid.as_deref().and_then(normalize_pmcid);

        RecordBuilder::new(SourceType::Pmc)
            .title(raw.title)
            .authors(raw.authors)
            .journal(raw.journal)
            .year(raw.year.as_deref().and_then(extract_year))
            .doi(raw.doi)
            .pmid(raw.pmid)
            .open_access(OpenAccess::Yes)
            .source_url(pmcid.as_deref().map(article_url))
            .pdf_url(pmcid.as_deref().map(pdf_url))
            .pmcid(pmcid)
            .abstract_text(raw.abstract_text)
            .build()
    }
}

fn article_url(pmcid: &str) -> String {
    format!("{}/{}/", PMC_ARTICLE_URL, pmcid)
}

fn pdf_url(pmcid: &str) -> String {
    format!("{}/{}/pdf/", PMC_ARTICLE_URL, pmcid)
}

/// DOI carried by an esummary `elocationid` such as `doi: 10.1000/xyz`
fn doi_from_elocation(elocation: &str) -> Option<String> {
    let rest = elocation.trim();
    let prefix = rest.get(..4)?;
    if !prefix.eq_ignore_ascii_case("doi:") {
        return None;
    }
    rest[4..].split_whitespace().next().map(str::to_string)
}

#[async_trait]
impl Source for PmcSource {
    fn source_type(&self) -> SourceType {
        SourceType::Pmc
    }

    async fn pull(&self, query: &Query) -> Pull {
        let history = match self.eutils.esearch("pmc", query).await {
            Ok(history) => history,
            Err(error) => {
                tracing::warn!(source = "pmc", "esearch failed: {}", error);
                return Pull::failed(SourceType::Pmc, ResultSet::new(), error);
            }
        };

        match self.mode {
            PmcFetchMode::Summary => {
                let paginator = self.eutils.batches(
                    "esummary",
                    "pmc",
                    "json",
                    &history,
                    query.max_results,
                    Self::parse_summary_page,
                );
                drain_hits(SourceType::Pmc, paginator.hits(), Self::parse_summary).await
            }
            PmcFetchMode::Xml => {
                let paginator = self.eutils.batches(
                    "efetch",
                    "pmc",
                    "xml",
                    &history,
                    query.max_results,
                    Self::parse_xml_page,
                );
                drain_hits(SourceType::Pmc, paginator.hits(), Self::parse_jats).await
            }
        }
    }
}

/// esummary envelope; the `result` map is keyed by uid plus a `uids` list
#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    result: Option<serde_json::Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient::string")]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSummary {
    #[serde(default, deserialize_with = "lenient::string")]
    uid: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    fulljournalname: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    source: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pubdate: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    epubdate: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    elocationid: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    articleids: Vec<RawArticleId>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    authors: Vec<RawAuthor>,
}

#[derive(Debug, Default, Deserialize)]
struct RawArticleId {
    #[serde(default, deserialize_with = "lenient::string")]
    idtype: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAuthor {
    #[serde(default, deserialize_with = "lenient::string")]
    name: Option<String>,
}

/// All-optional view of a JATS `<article>` front matter
#[derive(Debug, Default, Clone, PartialEq)]
struct RawJatsArticle {
    title: Option<String>,
    journal: Option<String>,
    year: Option<String>,
    pmid: Option<String>,
    pmcid: Option<String>,
    doi: Option<String>,
    authors: Vec<String>,
    abstract_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum JatsField {
    Title,
    Journal,
    Year,
    ArticleId(String),
    Surname,
    GivenNames,
    Collab,
    Abstract,
}

#[derive(Debug, Default)]
struct Contributor {
    surname: Option<String>,
    given_names: Option<String>,
    collab: Option<String>,
}

impl Contributor {
    fn display_name(self) -> Option<String> {
        match (self.surname, self.given_names) {
            (Some(surname), Some(given)) => Some(format!("{} {}", surname, given)),
            (Some(surname), None) => Some(surname),
            (None, _) => self.collab,
        }
    }
}

struct Capture {
    field: JatsField,
    depth: usize,
    text: String,
}

/// Block-level elements whose text must not run into the next block
const BLOCK_ELEMENTS: &[&str] = &["p", "title", "sec", "list-item", "label"];

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn jats_field(name: &str, e: &BytesStart, path: &[String], in_author: bool) -> Option<JatsField> {
    let within = |tag: &str| path.iter().any(|p| p == tag);
    let parent = path.last().map(String::as_str);

    if within("ref-list") || within("sub-article") {
        return None;
    }

    if within("journal-meta") {
        return match name {
            "journal-title" => Some(JatsField::Journal),
            _ => None,
        };
    }

    if !within("article-meta") {
        return None;
    }

    match (name, parent) {
        ("article-title", Some("title-group")) => Some(JatsField::Title),
        ("year", Some("pub-date")) => Some(JatsField::Year),
        ("article-id", _) => attribute(e, b"pub-id-type").map(JatsField::ArticleId),
        ("surname", Some("name")) if in_author => Some(JatsField::Surname),
        ("given-names", Some("name")) if in_author => Some(JatsField::GivenNames),
        ("collab", _) if in_author => Some(JatsField::Collab),
        ("abstract", _) if attribute(e, b"abstract-type").is_none() => Some(JatsField::Abstract),
        _ => None,
    }
}

fn set_once(slot: &mut Option<String>, value: String) {
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value);
    }
}

fn store(article: &mut RawJatsArticle, contributor: &mut Contributor, field: JatsField, text: String) {
    match field {
        JatsField::Title => set_once(&mut article.title, text),
        JatsField::Journal => set_once(&mut article.journal, text),
        JatsField::Year => set_once(&mut article.year, text),
        JatsField::ArticleId(kind) => match kind.as_str() {
            "pmid" => set_once(&mut article.pmid, text),
            "pmc" | "pmcid" => set_once(&mut article.pmcid, text),
            "doi" => set_once(&mut article.doi, text),
            _ => {}
        },
        JatsField::Surname => set_once(&mut contributor.surname, text),
        JatsField::GivenNames => set_once(&mut contributor.given_names, text),
        JatsField::Collab => set_once(&mut contributor.collab, text),
        JatsField::Abstract => set_once(&mut article.abstract_text, text),
    }
}

const ARTICLE_SET: &str = "pmc-articleset";

/// Stream through a `pmc-articleset`, one raw article per top-level `<article>`
fn parse_jats_articles(xml: &str) -> Result<Vec<RawJatsArticle>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut articles = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<RawJatsArticle> = None;
    let mut contributor: Option<Contributor> = None;
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

                if let Some(capture) = capture.as_mut() {
                    if BLOCK_ELEMENTS.contains(&name.as_str()) {
                        capture.text.push(' ');
                    }
                } else if current.is_some() {
                    if name == "contrib" && path.iter().any(|p| p == "article-meta") {
                        contributor = match attribute(e, b"contrib-type").as_deref() {
                            Some("author") => Some(Contributor::default()),
                            _ => None,
                        };
                    }
                    if let Some(field) = jats_field(&name, e, &path, contributor.is_some()) {
                        capture = Some(Capture {
                            field,
                            depth: path.len(),
                            text: String::new(),
                        });
                    }
                }

                if name == "article" && current.is_none() {
                    current = Some(RawJatsArticle::default());
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
                        let mut scratch = Contributor::default();
                        let target = contributor.as_mut().unwrap_or(&mut scratch);
                        store(article, target, done.field, collapse_whitespace(&done.text));
                    }
                }

                match name.as_str() {
                    "contrib" => {
                        if let (Some(parts), Some(article)) = (contributor.take(), current.as_mut()) {
                            if let Some(display) = parts.display_name() {
                                article.authors.push(display);
                            }
                        }
                    }
                    "article" if !path.iter().any(|p| p == "article") => {
                        if let Some(article) = current.take() {
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
        return Err(SourceError::upstream(None, "PMC efetch response is not a pmc-articleset"));
    }
    if current.is_some() || !path.is_empty() {
        return Err(SourceError::upstream(None, "PMC efetch response ended inside an article"));
    }

    Ok(articles)
}
