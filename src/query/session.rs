use super::{build_user_query, contains, merge, split};

/// Owns the "current query" that quick filters and shortcuts act on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuerySession {
    current: String,
}

impl QuerySession {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            current: initial.into().trim().to_string(),
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn set(&mut self, query: &str) {
        self.current = query.trim().to_string();
    }

    pub fn clear(&mut self) {
        self.current.clear();
    }

    /// Merges `fragment` into the current query and returns the result.
    pub fn apply_filter(&mut self, fragment: &str) -> &str {
        self.current = merge(&self.current, fragment);
        &self.current
    }

    pub fn has_filter(&self, fragment: &str) -> bool {
        contains(fragment, &self.current)
    }

    pub fn fragments(&self) -> Vec<String> {
        split(&self.current)
    }

    /// The query to send to the backend, or `None` when there is nothing to
    /// search for.
    pub fn search_query(&self, auto_wildcard: bool) -> Option<String> {
        let query = self.current.trim();
        if query.is_empty() {
            return None;
        }
        if auto_wildcard {
            Some(build_user_query(query))
        } else {
            Some(query.to_string())
        }
    }
}
