//! Parsed-query cache
//!
//! Rules are persisted as strings and parsed once per application pass; the
//! cache keys on `(rule_id, query hash)` so an edited query never serves a
//! stale AST.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use hourmark_domain::Result;

use crate::query::ast::Query;
use crate::query::parser;

/// Shared cache of parsed rule ASTs
#[derive(Clone)]
pub struct QueryCache {
    inner: moka::sync::Cache<String, Arc<Query>>,
}

impl QueryCache {
    /// Create a cache holding up to `capacity` parsed queries.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self { inner: moka::sync::Cache::new(capacity) }
    }

    /// Fetch the parsed AST for a rule, parsing and caching on miss.
    ///
    /// # Errors
    /// Propagates [`hourmark_domain::HourmarkError::Parse`] when the stored
    /// query string does not parse.
    pub fn get_or_parse(&self, rule_id: &str, query: &str) -> Result<Arc<Query>> {
        let key = cache_key(rule_id, query);
        if let Some(cached) = self.inner.get(&key) {
            return Ok(cached);
        }
        let parsed = Arc::new(parser::parse(query)?);
        self.inner.insert(key, Arc::clone(&parsed));
        Ok(parsed)
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

fn cache_key(rule_id: &str, query: &str) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    query.hash(&mut hasher);
    format!("{rule_id}:{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_by_rule_and_query_hash() {
        let cache = QueryCache::new(16);
        let first = cache.get_or_parse("r1", "title:sync").unwrap();
        let again = cache.get_or_parse("r1", "title:sync").unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn edited_query_reparses() {
        let cache = QueryCache::new(16);
        let first = cache.get_or_parse("r1", "title:sync").unwrap();
        let edited = cache.get_or_parse("r1", "title:standup").unwrap();
        assert_ne!(*first, *edited);
    }

    #[test]
    fn parse_errors_propagate() {
        let cache = QueryCache::new(16);
        assert!(cache.get_or_parse("r1", "title:\"broken").is_err());
    }
}
