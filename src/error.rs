//! Error taxonomy surfaced by `CatalogStore` load operations.

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A raw source could not be read, parsed or reached. Never retried.
    #[error("failed to read {source_name}: {detail}")]
    SourceRead {
        source_name: &'static str,
        detail: String,
    },

    #[error(transparent)]
    Validation(#[from] AggregateValidationError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CatalogError {
    /// Wrap a reader failure, keeping the whole context chain in the message.
    pub fn source_read(source_name: &'static str, err: anyhow::Error) -> Self {
        CatalogError::SourceRead {
            source_name,
            detail: format!("{err:#}"),
        }
    }
}

/// Every referential or range violation found by one validation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateValidationError {
    pub errors: Vec<String>,
}

impl fmt::Display for AggregateValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "catalog data errors ({}):", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n- {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateValidationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn aggregate_lists_every_error() {
        let err = AggregateValidationError {
            errors: vec!["first".into(), "second".into()],
        };
        let message = CatalogError::from(err).to_string();
        assert!(message.contains("(2)"));
        assert!(message.contains("\n- first"));
        assert!(message.contains("\n- second"));
    }

    #[test]
    fn source_read_keeps_context_chain() {
        let inner: anyhow::Result<()> =
            Err(anyhow::anyhow!("No such file")).context("reading /data/roles.json");
        let err = CatalogError::source_read("roles", inner.unwrap_err());
        let message = err.to_string();
        assert!(message.starts_with("failed to read roles"));
        assert!(message.contains("/data/roles.json"));
        assert!(message.contains("No such file"));
    }
}
