//! RIS rendering.
//!
//! Tags with no value are left out entirely: several reference managers
//! reject a present-but-blank tag.

use crate::models::{Record, ResultSet};

fn push_tag(out: &mut String, tag: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        out.push_str(tag);
        out.push_str("  - ");
        out.push_str(value);
        out.push('\n');
    }
}

fn push_reference(out: &mut String, record: &Record) {
    out.push_str("TY  - JOUR\n");
    push_tag(out, "TI", record.title.as_deref());
    push_tag(out, "JO", record.journal.as_deref());
    push_tag(out, "PY", record.year.as_deref());
    for author in record.authors_joined().split(',') {
        push_tag(out, "AU", Some(author));
    }
    push_tag(out, "DO", record.doi.as_deref());
    push_tag(out, "PM", record.pmid.as_deref());
    out.push_str("ER  - \n\n");
}

/// Render records as RIS, one reference block per record
pub fn to_ris(records: &ResultSet) -> String {
    let mut out = String::new();
    for record in records {
        push_reference(&mut out, record);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordBuilder, SourceType};

    #[test]
    fn test_empty_journal_has_no_jo_line() {
        let record = RecordBuilder::new(SourceType::EuropePmc)
            .title("Surgical site infection".to_string())
            .journal("   ".to_string())
            .build();

        let ris = to_ris(&ResultSet::from(vec![record]));
        assert!(!ris.contains("JO  -"));
        assert!(ris.contains("TI  - Surgical site infection\n"));
    }

    #[test]
    fn test_author_string_splits_into_lines() {
        let record = RecordBuilder::new(SourceType::EuropePmc)
            .authors(["Smith J, Doe A"])
            .build();

        let ris = to_ris(&ResultSet::from(vec![record]));
        let authors: Vec<&str> = ris.lines().filter(|l| l.starts_with("AU  - ")).collect();
        assert_eq!(authors, vec!["AU  - Smith J", "AU  - Doe A"]);
    }

    #[test]
    fn test_block_shape() {
        let record = RecordBuilder::new(SourceType::PubMed)
            .title("T".to_string())
            .journal("J".to_string())
            .year("2020".to_string())
            .authors(["Smith J"])
            .doi("10.1/x".to_string())
            .pmid("123".to_string())
            .build();

        let ris = to_ris(&ResultSet::from(vec![record]));
        assert_eq!(
            ris,
            "TY  - JOUR\nTI  - T\nJO  - J\nPY  - 2020\nAU  - Smith J\nDO  - 10.1/x\nPM  - 123\nER  - \n\n"
        );
    }

    #[test]
    fn test_bare_record_is_type_and_end_only() {
        let ris = to_ris(&ResultSet::from(vec![RecordBuilder::new(SourceType::Pmc).build()]));
        assert_eq!(ris, "TY  - JOUR\nER  - \n\n");
    }
}
