//! Configuration types for the search index client.

/// Configuration for the OpenSearch client.
#[derive(Debug, Clone)]
pub struct SearchIndexConfig {
    /// Maximum number of items allowed in a single bulk request.
    /// `None` disables the check.
    pub max_bulk_items: Option<usize>,
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            max_bulk_items: Some(1000),
        }
    }
}

impl SearchIndexConfig {
    /// Create a config with a custom bulk size limit.
    pub fn with_max_bulk_items(max_bulk_items: usize) -> Self {
        Self {
            max_bulk_items: Some(max_bulk_items),
        }
    }

    /// Check a bulk request size against the configured limit.
    pub fn check_bulk_size(&self, size: usize) -> Result<(), crate::SearchIndexError> {
        if let Some(max) = self.max_bulk_items {
            if size > max {
                return Err(crate::SearchIndexError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_size_limit() {
        let config = SearchIndexConfig::with_max_bulk_items(2);
        assert!(config.check_bulk_size(2).is_ok());
        assert!(config.check_bulk_size(3).is_err());
        let unchecked = SearchIndexConfig { max_bulk_items: None };
        assert!(unchecked.check_bulk_size(100_000).is_ok());
    }
}
