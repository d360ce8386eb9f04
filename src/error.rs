// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Forecast Scoring Engine - Errors

use crate::types::AssetSymbol;

/// Errors raised by the scoring pipeline and its collaborators.
///
/// Configuration errors abort the epoch with no partial output. Data-quality
/// conditions (missing window scores, empty batches) are not errors; they
/// degrade to zero weights or an empty reward table.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("unknown asset '{0}' -- no calibration coefficient configured")]
    UnknownAsset(AssetSymbol),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid simulation request: {0}")]
    InvalidSimulation(String),

    #[error("score source failed: {0}")]
    Source(String),

    #[error("reward sink failed: {0}")]
    Sink(String),
}

impl ScoringError {
    /// Whether this error stems from the configuration surface.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UnknownAsset(_) | Self::InvalidConfig(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_classified() {
        assert!(ScoringError::UnknownAsset(AssetSymbol::from("DOGE")).is_configuration());
        assert!(ScoringError::InvalidConfig("beta".into()).is_configuration());
        assert!(!ScoringError::Sink("disk full".into()).is_configuration());
    }

    #[test]
    fn unknown_asset_message_names_the_asset() {
        let err = ScoringError::UnknownAsset(AssetSymbol::from("doge"));
        assert!(err.to_string().contains("DOGE"), "got {err}");
    }
}
