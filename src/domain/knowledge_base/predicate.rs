//! Guards for caller-supplied SQL fragments and identifiers
//!
//! `SafePredicate` is the only way an extra filter expression reaches a
//! store. The keyword check is a denylist over word tokens, not a SQL
//! parser: it blocks statements that mutate data or schema and nothing else.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::KnowledgeError;

/// Keywords that make a predicate unsafe (compared case-insensitively)
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "CREATE", "EXEC", "EXECUTE",
];

/// Postgres truncates identifiers beyond this length
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

static WORD_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Reject a predicate containing any forbidden keyword token
pub fn check_predicate(predicate: &str) -> Result<(), KnowledgeError> {
    for token in WORD_TOKEN.find_iter(predicate) {
        let word = token.as_str();

        if let Some(keyword) = FORBIDDEN_KEYWORDS
            .iter()
            .find(|k| k.eq_ignore_ascii_case(word))
        {
            return Err(KnowledgeError::unsafe_predicate(format!(
                "keyword {} is not allowed",
                keyword
            )));
        }
    }

    Ok(())
}

/// Validate a bare SQL identifier (schema, table or column name)
pub fn validate_identifier(identifier: &str) -> Result<(), KnowledgeError> {
    if identifier.len() > MAX_IDENTIFIER_LENGTH || !IDENTIFIER.is_match(identifier) {
        return Err(KnowledgeError::validation(format!(
            "Invalid SQL identifier '{}'",
            identifier
        )));
    }

    Ok(())
}

/// A filter expression that passed `check_predicate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafePredicate(String);

impl SafePredicate {
    /// Check a raw expression; blank input yields `None`
    pub fn parse(raw: &str) -> Result<Option<Self>, KnowledgeError> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Ok(None);
        }

        check_predicate(trimmed)?;
        Ok(Some(Self(trimmed.to_string())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SafePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_drop_after_statement_break() {
        let result = check_predicate("1=1; DROP TABLE chunks");
        assert!(matches!(result, Err(KnowledgeError::UnsafePredicate { .. })));
    }

    #[test]
    fn test_rejects_every_keyword_in_any_case() {
        for keyword in FORBIDDEN_KEYWORDS {
            let predicate = format!("c.enabled AND {}", keyword.to_lowercase());
            assert!(check_predicate(&predicate).is_err(), "{}", keyword);
        }
    }

    #[test]
    fn test_allows_keywords_embedded_in_identifiers() {
        assert!(check_predicate("c.updated_at > now() - interval '1 day'").is_ok());
        assert!(check_predicate("c.content ILIKE '%droplet%'").is_ok());
        assert!(check_predicate("c.chunk_index < 10").is_ok());
    }

    #[test]
    fn test_denylist_scans_string_literals_too() {
        assert!(check_predicate("c.content = 'please delete me'").is_err());
    }

    #[test]
    fn test_safe_predicate_parse() {
        assert_eq!(SafePredicate::parse("   ").unwrap(), None);

        let predicate = SafePredicate::parse(" c.chunk_index = 0 ").unwrap().unwrap();
        assert_eq!(predicate.as_str(), "c.chunk_index = 0");

        assert!(SafePredicate::parse("1=1; DROP TABLE chunks").is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("public").is_ok());
        assert!(validate_identifier("_kb_2").is_ok());

        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("public; drop").is_err());
        assert!(validate_identifier("a.b").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }
}
