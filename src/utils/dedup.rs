//! Deduplication of records across sources.
//!
//! DOI and PMCID are the identifiers shared by PubMed, PMC and Europe PMC, so
//! a record counts as a duplicate of an earlier one when either of them
//! matches, even if one source omits the DOI and another omits the PMCID.

use std::collections::HashSet;

use crate::models::Record;

/// Normalize a DOI for comparison
///
/// Lower-cases and strips resolver and `doi:` prefixes.
pub fn normalize_doi(doi: &str) -> Option<String> {
    let doi = doi.trim().to_lowercase();
    let doi = ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "http://dx.doi.org/", "doi:"]
        .iter()
        .find_map(|prefix| doi.strip_prefix(prefix))
        .map(|rest| rest.trim().to_string())
        .unwrap_or(doi);

    (!doi.is_empty()).then_some(doi)
}

/// Normalize a PMCID to the `PMC123` form
pub fn normalize_pmcid(pmcid: &str) -> Option<String> {
    let pmcid = pmcid.trim().to_uppercase();
    if pmcid.is_empty() {
        return None;
    }
    if pmcid.starts_with("PMC") {
        Some(pmcid)
    } else {
        Some(format!("PMC{}", pmcid))
    }
}

/// Composite dedup key: normalized DOI and PMCID, either may be absent
fn dedup_key(record: &Record) -> (Option<String>, Option<String>) {
    (
        record.doi.as_deref().and_then(normalize_doi),
        record.pmcid.as_deref().and_then(normalize_pmcid),
    )
}

/// Find duplicate records
///
/// Returns the indices of records that duplicate an earlier record. Records
/// without a DOI or PMCID are never reported.
pub fn find_duplicates(records: &[Record]) -> Vec<usize> {
    let mut seen_doi: HashSet<String> = HashSet::new();
    let mut seen_pmcid: HashSet<String> = HashSet::new();
    let mut duplicates = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        let (doi, pmcid) = dedup_key(record);

        let is_duplicate = doi.as_ref().is_some_and(|d| seen_doi.contains(d))
            || pmcid.as_ref().is_some_and(|p| seen_pmcid.contains(p));

        if is_duplicate {
            duplicates.push(idx);
        }

        // keys of dropped records still count, so chains of partial matches collapse
        if let Some(doi) = doi {
            seen_doi.insert(doi);
        }
        if let Some(pmcid) = pmcid {
            seen_pmcid.insert(pmcid);
        }
    }

    duplicates
}

/// Remove duplicate records, keeping the first occurrence
pub fn deduplicate_records(records: Vec<Record>) -> Vec<Record> {
    let duplicates: HashSet<usize> = find_duplicates(&records).into_iter().collect();

    if duplicates.is_empty() {
        return records;
    }

    tracing::debug!(removed = duplicates.len(), "removed duplicate records");

    records
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !duplicates.contains(i))
        .map(|(_, r)| r)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordBuilder, SourceType};

    fn make_record(title: &str, doi: Option<&str>, pmcid: Option<&str>, source: SourceType) -> Record {
        RecordBuilder::new(source)
            .title(title.to_string())
            .doi(doi.map(str::to_string))
            .pmcid(pmcid.map(str::to_string))
            .build()
    }

    #[test]
    fn test_normalize_doi() {
        assert_eq!(normalize_doi("10.1234/ABC"), Some("10.1234/abc".to_string()));
        assert_eq!(normalize_doi("https://doi.org/10.1/X"), Some("10.1/x".to_string()));
        assert_eq!(normalize_doi("doi: 10.1/x"), Some("10.1/x".to_string()));
        assert_eq!(normalize_doi("  "), None);
    }

    #[test]
    fn test_normalize_pmcid() {
        assert_eq!(normalize_pmcid("123"), Some("PMC123".to_string()));
        assert_eq!(normalize_pmcid("pmc123"), Some("PMC123".to_string()));
        assert_eq!(normalize_pmcid(""), None);
    }

    #[test]
    fn test_same_doi_different_pmcid() {
        let records = vec![
            make_record("A", Some("10.1/x"), Some("PMC1"), SourceType::EuropePmc),
            make_record("B", Some("10.1/X"), Some("PMC2"), SourceType::Pmc),
        ];

        let unique = deduplicate_records(records);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].title.as_deref(), Some("A"));
    }

    #[test]
    fn test_same_pmcid_empty_doi() {
        let records = vec![
            make_record("A", None, Some("PMC7"), SourceType::Pmc),
            make_record("B", Some(""), Some("7"), SourceType::EuropePmc),
        ];

        assert_eq!(deduplicate_records(records).len(), 1);
    }

    #[test]
    fn test_records_without_keys_are_kept() {
        let records = vec![
            make_record("Same", None, None, SourceType::PubMed),
            make_record("Same", None, None, SourceType::PubMed),
        ];

        assert_eq!(deduplicate_records(records).len(), 2);
    }

    #[test]
    fn test_partial_key_chain_collapses() {
        let records = vec![
            make_record("A", Some("10.1/a"), None, SourceType::PubMed),
            make_record("B", Some("10.1/a"), Some("PMC9"), SourceType::EuropePmc),
            make_record("C", None, Some("PMC9"), SourceType::Pmc),
        ];

        assert_eq!(find_duplicates(&records), vec![1, 2]);
        let unique = deduplicate_records(records);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].title.as_deref(), Some("A"));
    }

    #[test]
    fn test_deduplication_is_idempotent() {
        let records = vec![
            make_record("A", Some("10.1/a"), None, SourceType::PubMed),
            make_record("B", None, Some("PMC2"), SourceType::Pmc),
            make_record("C", None, None, SourceType::Pmc),
            make_record("D", Some("10.1/A"), Some("PMC2"), SourceType::EuropePmc),
        ];

        let keyed: Vec<Record> = records.iter().filter(|r| r.is_dedup_eligible()).cloned().collect();
        let mut doubled = keyed.clone();
        doubled.extend(keyed.clone());

        let once = deduplicate_records(records);
        let twice = deduplicate_records(once.clone());
        assert_eq!(once, twice);

        assert_eq!(
            deduplicate_records(doubled).len(),
            deduplicate_records(keyed).len()
        );
    }

    #[test]
    fn test_deduplicate_empty_list() {
        assert!(deduplicate_records(Vec::new()).is_empty());
    }
}
