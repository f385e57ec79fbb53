use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};

lazy_static! {
    static ref FACT_LINE: Regex = Regex::new(r"^[A-Za-z0-9_]+=.*$").unwrap();
}

/// Flat key/value data extracted by inspection: versions, release
/// identifiers, paths. Either a full parse succeeds or the whole call
/// fails; no partial mapping is ever returned.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Facts(BTreeMap<String, String>);

impl Facts {
    pub fn new() -> Self {
        Facts::default()
    }

    /// Parse `KEY=value` lines. Empty lines and `#` comments are skipped;
    /// any other line not matching the grammar is a parse error.
    pub fn parse(input: &str) -> Result<Self> {
        let mut facts = BTreeMap::new();
        for (idx, line) in input.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if !FACT_LINE.is_match(line) {
                return Err(Error::InspectionParse {
                    line: idx + 1,
                    content: line.to_string(),
                });
            }
            // the grammar guarantees the '='
            let (key, value) = line.split_once('=').unwrap();
            facts.insert(key.to_string(), value.to_string());
        }
        Ok(Facts(facts))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &'static str) -> Result<&str> {
        self.get(key).ok_or(Error::MissingFact(key))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn merge(&mut self, other: Facts) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        let input = "current_db_version=14\nimage_db_version=16\nimage_release=2025.2\n";
        let facts = Facts::parse(input).unwrap();
        assert_eq!(facts.get("current_db_version"), Some("14"));
        assert_eq!(facts.get("image_db_version"), Some("16"));
        assert_eq!(facts.get("image_release"), Some("2025.2"));
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let input = "# produced by inspect.sh\n\ntimezone=Europe/Berlin\n";
        let facts = Facts::parse(input).unwrap();
        assert_eq!(facts.iter().count(), 1);
        assert_eq!(facts.get("timezone"), Some("Europe/Berlin"));
    }

    #[test]
    fn test_parse_value_may_contain_equals() {
        let facts = Facts::parse("java_opts=-Xmx2G=ignored\n").unwrap();
        assert_eq!(facts.get("java_opts"), Some("-Xmx2G=ignored"));
    }

    #[test]
    fn test_parse_rejects_line_without_equals() {
        let err = Facts::parse("good=1\nnot a fact\n").unwrap_err();
        match err {
            Error::InspectionParse { line, content } => {
                assert_eq!(line, 2);
                assert_eq!(content, "not a fact");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_key() {
        assert!(Facts::parse("bad key=1\n").is_err());
        assert!(Facts::parse("bad-key=1\n").is_err());
    }

    #[test]
    fn test_no_partial_mapping_on_error() {
        // the error comes back instead of the two valid entries
        assert!(Facts::parse("a=1\nbroken\nb=2\n").is_err());
    }

    #[test]
    fn test_require_missing() {
        let facts = Facts::parse("a=1\n").unwrap();
        assert!(matches!(
            facts.require("current_db_version"),
            Err(Error::MissingFact("current_db_version"))
        ));
    }
}
