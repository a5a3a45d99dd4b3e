//! Small text helpers shared by the source parsers.

use regex::Regex;

/// Collapse runs of whitespace into single spaces and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First plausible four-digit year in a free-form date such as `2019 Dec-2020 Jan`
pub fn extract_year(date: &str) -> Option<String> {
    let re = Regex::new(r"\b(1[5-9]\d{2}|20\d{2}|21\d{2})\b").ok()?;
    re.captures(date)?.get(1).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n b\t c "), "a b c");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("2020 Jan 5"), Some("2020".to_string()));
        assert_eq!(extract_year("Winter 1998-1999"), Some("1998".to_string()));
        assert_eq!(extract_year("Spring"), None);
        assert_eq!(extract_year("12345"), None);
    }
}
