//! IGD integration errors

use ha_config_entries::FlowError;
use thiserror::Error;

use crate::state_machine::InvalidTransition;

/// Errors raised at the IGD flow boundary
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IgdError {
    /// Discovery info is missing a required key or has the wrong type
    #[error("malformed discovery info: missing or invalid '{field}'")]
    MalformedDescriptor { field: &'static str },

    /// Import or form input is missing a required key or has the wrong type
    #[error("malformed flow input: missing or invalid '{field}'")]
    MalformedInput { field: &'static str },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

impl From<IgdError> for FlowError {
    fn from(err: IgdError) -> Self {
        match err {
            IgdError::InvalidTransition(t) => t.into(),
            other => FlowError::InvalidInput(other.to_string()),
        }
    }
}

impl From<InvalidTransition> for FlowError {
    fn from(t: InvalidTransition) -> Self {
        FlowError::InvalidState {
            state: t.state.to_string(),
            event: t.event.to_string(),
        }
    }
}
