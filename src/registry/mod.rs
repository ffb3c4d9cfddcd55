//! Registry of built-in datasets
//!
//! Maps dataset names used on the command line to [`DatasetSource`]
//! implementations and expands `*` wildcards.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::sources::{DailyQuotes, DatasetSource, StockBasic, TradeCalendar};

/// Registry errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RegistryError {
    /// No dataset matches the name or pattern
    #[error("no dataset matches '{pattern}' (available: {available})")]
    NotFound {
        /// Name or pattern requested
        pattern: String,
        /// Comma-separated registered names
        available: String,
    },
}

/// Named dataset sources
#[derive(Clone, Default)]
pub struct DatasetRegistry {
    sources: BTreeMap<String, Arc<dyn DatasetSource>>,
}

impl DatasetRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in dataset
    pub fn builtin() -> Self {
        Self::new()
            .with(Arc::new(TradeCalendar::new()))
            .with(Arc::new(StockBasic::new()))
            .with(Arc::new(DailyQuotes::new()))
    }

    /// Register a source under its own name, replacing any previous one
    pub fn with(mut self, source: Arc<dyn DatasetSource>) -> Self {
        self.sources.insert(source.name().to_string(), source);
        self
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    /// Registered sources in name order
    pub fn all(&self) -> Vec<Arc<dyn DatasetSource>> {
        self.sources.values().cloned().collect()
    }

    /// Look up a source by exact name
    pub fn get(&self, name: &str) -> Option<Arc<dyn DatasetSource>> {
        self.sources.get(name).cloned()
    }

    /// Resolve names and `*` patterns to sources
    ///
    /// An empty list selects every dataset. Duplicates are removed while
    /// keeping first-mention order.
    ///
    /// # Errors
    /// [`RegistryError::NotFound`] for the first name or pattern that matches
    /// nothing.
    pub fn resolve<S: AsRef<str>>(
        &self,
        patterns: &[S],
    ) -> Result<Vec<Arc<dyn DatasetSource>>, RegistryError> {
        if patterns.is_empty() {
            return Ok(self.all());
        }

        let mut selected: Vec<&str> = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            let matches: Vec<&str> = self
                .sources
                .keys()
                .map(String::as_str)
                .filter(|name| matches_pattern(pattern, name))
                .collect();

            if matches.is_empty() {
                return Err(RegistryError::NotFound {
                    pattern: pattern.to_string(),
                    available: self.names().join(", "),
                });
            }

            for name in matches {
                if !selected.contains(&name) {
                    selected.push(name);
                }
            }
        }

        Ok(selected
            .into_iter()
            .filter_map(|name| self.get(name))
            .collect())
    }
}

/// Match `value` against a pattern where `*` stands for any run of characters
fn matches_pattern(pattern: &str, value: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == value;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let last = parts.len() - 1;
    let mut pos = 0;

    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }

        if i == 0 {
            if !value.starts_with(part) {
                return false;
            }
            pos = part.len();
        } else if i == last {
            return value.len() >= pos + part.len() && value[pos..].ends_with(part);
        } else {
            match value[pos..].find(part) {
                Some(found) => pos += found + part.len(),
                None => return false,
            }
        }
    }

    true
}
