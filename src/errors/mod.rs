/// Error taxonomy for the decision routing and risk-tilt core
///
/// Public risk calls never surface these to callers; they are converted to each
/// service's fail-closed value at the boundary. Construction and configuration
/// loading do return them.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskCoreError {
    #[error("Configuration error in '{field}': {reason}")]
    Configuration { field: String, reason: String },

    #[error("Insufficient data for {subject}: have {have}, need {need}")]
    InsufficientData {
        subject: String,
        have: usize,
        need: usize,
    },

    #[error("Computation failed: {0}")]
    Computation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Decision source {source_name} failed: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

impl RiskCoreError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RiskCoreError::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn source(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        RiskCoreError::Source {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Errors that refuse service construction
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RiskCoreError::Configuration { .. } | RiskCoreError::Parse(_) | RiskCoreError::Io(_)
        )
    }
}

pub type RiskResult<T> = Result<T, RiskCoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let cfg = RiskCoreError::config("breadth.weights", "must sum to 1.0");
        assert!(cfg.is_configuration());
        assert_eq!(
            cfg.to_string(),
            "Configuration error in 'breadth.weights': must sum to 1.0"
        );

        let arg = RiskCoreError::InvalidArgument("empty symbol".to_string());
        assert!(!arg.is_configuration());

        let src = RiskCoreError::source("UnifiedBrain", "timeout");
        assert!(!src.is_configuration());
        assert_eq!(src.to_string(), "Decision source UnifiedBrain failed: timeout");
    }
}
