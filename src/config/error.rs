//! Config error types.

use thiserror::Error;

/// Problems found while validating a parsed config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("{count} states are marked initial, at most one may be")]
    MultipleInitial { count: usize },

    #[error("{count} edges declared but mode is not 'graph'")]
    EdgesWithoutGraph { count: usize },

    #[error("state declaration #{index} has an empty tag")]
    EmptyTag { index: usize },

    #[error("edge declaration #{index} has an empty endpoint")]
    EmptyEdgeEndpoint { index: usize },
}

/// Errors reading or writing a config document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config (de)serialization failed: {0}")]
    Parse(#[from] serde_json::Error),
}
