//! Full-text plan search
//!
//! Plans are ranked with PostgreSQL's `ts_rank` over a weighted vector of
//! title (A), description (B) and quote (B). Every whitespace-separated token
//! must match: plain words match as prefixes, anything else goes through
//! `plainto_tsquery`.

use crate::db::queries::SqlBuilder;
use once_cell::sync::Lazy;
use regex::Regex;

/// Plans ranking below this are not returned
pub const MIN_RANK: f32 = 0.1;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\w+$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTerm {
    /// A single word, matched as `word:*`
    Prefix(String),
    /// Anything with punctuation, handed to `plainto_tsquery`
    Plain(String),
}

/// Split a query string into search terms
pub fn parse_query(query: &str) -> Vec<SearchTerm> {
    query
        .split_whitespace()
        .map(|token| {
            if WORD_RE.is_match(token) {
                SearchTerm::Prefix(format!("{}:*", token))
            } else {
                SearchTerm::Plain(token.to_string())
            }
        })
        .collect()
}

/// Weighted search vector over a plan row aliased `p`
pub fn search_vector_sql(language: &str) -> String {
    [("title", 'A'), ("description", 'B'), ("quote", 'B')]
        .iter()
        .map(|(field, weight)| {
            format!(
                "setweight(to_tsvector('{lang}', coalesce(p.{field}, '')), '{weight}')",
                lang = language,
                field = field,
                weight = weight
            )
        })
        .collect::<Vec<_>>()
        .join(" || ")
}

/// A parsed search bound to a text search configuration
#[derive(Debug, Clone)]
pub struct PlanSearch {
    terms: Vec<SearchTerm>,
    language: String,
}

impl PlanSearch {
    /// `None` when the query has no terms, meaning "do not filter"
    pub fn new(query: &str, language: &str) -> Option<Self> {
        let terms = parse_query(query.trim());
        if terms.is_empty() {
            return None;
        }
        Some(Self {
            terms,
            language: language.to_string(),
        })
    }

    /// Bind the terms, add the rank threshold and return the rank expression
    /// for the caller's SELECT list and ORDER BY.
    pub fn apply(&self, builder: &mut SqlBuilder) -> String {
        let query = self
            .terms
            .iter()
            .map(|term| match term {
                SearchTerm::Prefix(raw) => {
                    let placeholder = builder.bind(raw.clone());
                    format!("to_tsquery('{}', {})", self.language, placeholder)
                }
                SearchTerm::Plain(text) => {
                    let placeholder = builder.bind(text.clone());
                    format!("plainto_tsquery('{}', {})", self.language, placeholder)
                }
            })
            .collect::<Vec<_>>()
            .join(" && ");

        let rank = format!(
            "ts_rank({}, {})",
            search_vector_sql(&self.language),
            query
        );
        builder.filter(format!("{} >= {}", rank, MIN_RANK));
        rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_query_prefixes_words() {
        assert_eq!(
            parse_query("  Klima  schutz "),
            vec![
                SearchTerm::Prefix("Klima:*".to_string()),
                SearchTerm::Prefix("schutz:*".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_query_plain_for_punctuation() {
        assert_eq!(
            parse_query("Bürgergeld e-auto"),
            vec![
                SearchTerm::Prefix("Bürgergeld:*".to_string()),
                SearchTerm::Plain("e-auto".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_query_does_not_filter() {
        assert!(PlanSearch::new("   ", "german").is_none());
        assert!(PlanSearch::new("", "german").is_none());
    }

    #[test]
    fn test_vector_weights() {
        let sql = search_vector_sql("german");
        assert_eq!(
            sql,
            "setweight(to_tsvector('german', coalesce(p.title, '')), 'A') || \
             setweight(to_tsvector('german', coalesce(p.description, '')), 'B') || \
             setweight(to_tsvector('german', coalesce(p.quote, '')), 'B')"
        );
    }

    #[test]
    fn test_apply_binds_terms_and_thresholds_rank() {
        let search = PlanSearch::new("wind e-auto", "german").unwrap();
        let mut builder = SqlBuilder::new();
        let rank = search.apply(&mut builder);

        assert_eq!(builder.param_count(), 2);
        assert!(rank.starts_with("ts_rank("));
        assert!(rank.contains("to_tsquery('german', $1) && plainto_tsquery('german', $2)"));
        assert!(builder.where_clause().ends_with(">= 0.1"));
    }
}
