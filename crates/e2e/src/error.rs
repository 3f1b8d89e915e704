//! Error types for the acceptance harness

use std::time::Duration;
use thiserror::Error;

/// How a failure affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// No meaningful outcome exists yet; the run terminates before (or
    /// instead of) scenario execution.
    FatalEnvironment,
    /// An expected UI condition did not materialize; reported as a
    /// scenario failure.
    Assertion,
    /// Cleanup or evidence capture problems; logged and swallowed.
    Diagnostic,
}

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Admin tool '{tool}' failed: {reason}")]
    AdminTool { tool: String, reason: String },

    #[error("WebDriver service failed to start: {0}")]
    DriverStartup(String),

    #[error("WebDriver service health check failed after {0} attempts")]
    DriverHealthCheck(usize),

    #[error("Browser failed to launch: {0}")]
    BrowserLaunch(String),

    #[error("Browser session is closed")]
    SessionClosed,

    #[error("WebDriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),

    #[error("Timed out after {timeout:?} waiting for: {condition}")]
    Timeout { condition: String, timeout: Duration },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Artifact capture failed: {0}")]
    Artifact(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

impl E2eError {
    /// Place this error in the run's failure taxonomy.
    pub fn class(&self) -> FailureClass {
        match self {
            E2eError::Config(_)
            | E2eError::Environment(_)
            | E2eError::Database(_)
            | E2eError::AdminTool { .. }
            | E2eError::DriverStartup(_)
            | E2eError::DriverHealthCheck(_)
            | E2eError::BrowserLaunch(_) => FailureClass::FatalEnvironment,
            E2eError::Artifact(_) => FailureClass::Diagnostic,
            E2eError::SessionClosed
            | E2eError::WebDriver(_)
            | E2eError::Timeout { .. }
            | E2eError::AssertionFailed(_)
            | E2eError::Io(_)
            | E2eError::Yaml(_)
            | E2eError::Http(_) => FailureClass::Assertion,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == FailureClass::FatalEnvironment
    }

    pub(crate) fn admin_tool(tool: &str, reason: impl Into<String>) -> Self {
        E2eError::AdminTool {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_branch_is_fatal() {
        let err = E2eError::Environment("no branch found in seed data".into());
        assert!(err.is_fatal());
        assert_eq!(err.class(), FailureClass::FatalEnvironment);
    }

    #[test]
    fn test_timeout_is_scenario_failure() {
        let err = E2eError::Timeout {
            condition: "url contains '/vendas/terminal'".into(),
            timeout: Duration::from_secs(10),
        };
        assert_eq!(err.class(), FailureClass::Assertion);
        assert!(err.to_string().contains("/vendas/terminal"));
    }

    #[test]
    fn test_artifact_errors_are_diagnostic() {
        let err = E2eError::Artifact("disk full".into());
        assert_eq!(err.class(), FailureClass::Diagnostic);
        assert!(!err.is_fatal());
    }
}
