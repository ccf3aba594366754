//! Query rewriting applied before a query is embedded.

use std::collections::BTreeMap;

use semdex_core::text::tokenize;
use semdex_core::traits::QueryExpander;

/// Leaves queries untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExpansion;

impl QueryExpander for NoExpansion {
    fn expand(&self, query: &str) -> String {
        query.to_string()
    }
}

/// Appends configured synonyms of the query's tokens, each at most once,
/// after the original query text.
#[derive(Debug, Default, Clone)]
pub struct SynonymExpander {
    synonyms: BTreeMap<String, Vec<String>>,
}

impl SynonymExpander {
    pub fn new(synonyms: BTreeMap<String, Vec<String>>) -> Self {
        let synonyms = synonyms.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect();
        Self { synonyms }
    }
}

impl QueryExpander for SynonymExpander {
    fn expand(&self, query: &str) -> String {
        let tokens = tokenize(query);
        let mut extra: Vec<&str> = Vec::new();
        for token in &tokens {
            for syn in self.synonyms.get(token).into_iter().flatten() {
                if !tokens.iter().any(|t| t == syn) && !extra.contains(&syn.as_str()) {
                    extra.push(syn);
                }
            }
        }
        if extra.is_empty() {
            query.to_string()
        } else {
            format!("{} {}", query, extra.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expander() -> SynonymExpander {
        let mut map = BTreeMap::new();
        map.insert("Feline".to_string(), vec!["cat".to_string(), "cats".to_string()]);
        map.insert("animal".to_string(), vec!["mammal".to_string(), "cat".to_string()]);
        SynonymExpander::new(map)
    }

    #[test]
    fn appends_each_synonym_once() {
        assert_eq!(expander().expand("feline animal"), "feline animal cat cats mammal");
    }

    #[test]
    fn leaves_unknown_queries_alone() {
        assert_eq!(expander().expand("stock market"), "stock market");
        assert_eq!(NoExpansion.expand("Feline"), "Feline");
    }

    #[test]
    fn skips_synonyms_already_in_query() {
        assert_eq!(expander().expand("feline cat"), "feline cat cats");
    }
}
