//! Collaborator error type.
//!
//! Returned by [`Planner`](crate::agent::Planner) and [`Summarizer`](crate::agent::Summarizer)
//! implementations. Search failures use [`SearchError`](crate::worker::SearchError) instead,
//! because they are absorbed at the node.

use thiserror::Error;

/// Planner or summarizer failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    /// The collaborator call failed (e.g. model request error).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Display of ExecutionFailed contains the prefix and the message.
    #[test]
    fn agent_error_display_execution_failed() {
        let s = AgentError::ExecutionFailed("msg".to_string()).to_string();
        assert!(s.contains("execution failed"), "{}", s);
        assert!(s.contains("msg"), "{}", s);
    }
}
