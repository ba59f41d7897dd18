//! Config Flow types
//!
//! A config flow is a small multi-step wizard owned by an integration. Each
//! step returns a [`FlowStep`]: show a form, create an entry, or abort. The
//! [`ConfigFlowManager`](crate::flow_manager::ConfigFlowManager) turns those
//! into serialisable [`FlowResult`]s for the frontend.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::entry::ConfigEntry;
use crate::manager::ConfigEntriesError;

/// Errors raised while driving a flow.
///
/// Aborts are not errors; they are returned as [`FlowStep::Abort`].
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("No config flow handler registered for domain '{0}'")]
    UnknownHandler(String),

    #[error("Flow {0} not found")]
    UnknownFlow(String),

    #[error("Flow has no step '{0}'")]
    UnknownStep(String),

    #[error("Invalid user input: {0}")]
    InvalidInput(String),

    #[error("Flow cannot handle '{event}' in state {state}")]
    InvalidState { state: String, event: String },

    #[error(transparent)]
    Entries(#[from] ConfigEntriesError),

    #[error("Failed to serialize flow result: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type of a flow step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowResultType {
    Form,
    CreateEntry,
    Abort,
}

/// Form field value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Boolean,
    /// One of a fixed list of strings
    Select,
}

/// Form field schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl FormField {
    /// Required field with no default
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            default: None,
            options: Vec::new(),
        }
    }

    /// Optional field filled with `default` when omitted
    pub fn optional(
        name: impl Into<String>,
        field_type: FieldType,
        default: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            default: Some(default.into()),
            options: Vec::new(),
        }
    }

    /// Required choice among `options`
    pub fn select(name: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            options,
            ..Self::required(name, FieldType::Select)
        }
    }

    /// Check a submitted value against the field.
    ///
    /// A select value must be one of the options offered when the form was
    /// shown.
    pub fn check(&self, value: &serde_json::Value) -> Result<(), FlowError> {
        let ok = match self.field_type {
            FieldType::Boolean => value.is_boolean(),
            FieldType::String => value.is_string(),
            FieldType::Select => value
                .as_str()
                .is_some_and(|choice| self.options.iter().any(|option| option == choice)),
        };
        if ok {
            Ok(())
        } else {
            Err(FlowError::InvalidInput(format!(
                "invalid value for '{}' ({:?}): {}",
                self.name, self.field_type, value
            )))
        }
    }
}

/// Outcome of a single flow step, as returned by a [`ConfigFlow`]
#[derive(Debug, Clone, PartialEq)]
pub enum FlowStep {
    Form {
        step_id: String,
        data_schema: Vec<FormField>,
        errors: Option<HashMap<String, String>>,
        description_placeholders: Option<HashMap<String, String>>,
    },
    CreateEntry {
        title: String,
        data: HashMap<String, serde_json::Value>,
        /// Claimed atomically when the entry is added
        unique_id: Option<String>,
    },
    Abort {
        reason: String,
    },
}

impl FlowStep {
    pub fn form(step_id: impl Into<String>, data_schema: Vec<FormField>) -> Self {
        FlowStep::Form {
            step_id: step_id.into(),
            data_schema,
            errors: None,
            description_placeholders: None,
        }
    }

    pub fn abort(reason: impl Into<String>) -> Self {
        FlowStep::Abort {
            reason: reason.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, FlowStep::Form { .. })
    }
}

/// A running config flow for one integration.
///
/// `step` is called with the step id and the submitted input (`None` when
/// the step is entered without input). The first step id is the flow source
/// (`user`, `discovery`, `import`, ...); later ones are the `step_id` of the
/// last form shown.
pub trait ConfigFlow: Send + Sync {
    /// Major version stamped onto created entries
    fn version(&self) -> u32 {
        1
    }

    /// Minor version stamped onto created entries
    fn minor_version(&self) -> u32 {
        1
    }

    fn step(
        &mut self,
        step_id: &str,
        user_input: Option<serde_json::Value>,
    ) -> Result<FlowStep, FlowError>;
}

/// Creates a fresh flow instance for each started flow
pub type ConfigFlowFactory = Arc<dyn Fn() -> Box<dyn ConfigFlow> + Send + Sync + 'static>;

/// Result of a flow step as sent to the frontend
#[derive(Debug, Clone, Serialize)]
pub struct FlowResult {
    pub flow_id: String,
    /// Integration domain
    pub handler: String,
    #[serde(rename = "type")]
    pub result_type: FlowResultType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Always present, empty if no schema
    pub data_schema: Vec<FormField>,
    pub errors: Option<HashMap<String, String>>,
    pub description_placeholders: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minor_version: Option<u32>,
    /// The created config entry (create_entry only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Controls submit vs next button in the frontend
    pub last_step: Option<bool>,
}

impl FlowResult {
    fn base(flow_id: &str, handler: &str, result_type: FlowResultType) -> Self {
        Self {
            flow_id: flow_id.to_string(),
            handler: handler.to_string(),
            result_type,
            step_id: None,
            data_schema: Vec::new(),
            errors: None,
            description_placeholders: None,
            title: None,
            reason: None,
            version: None,
            minor_version: None,
            result: None,
            last_step: None,
        }
    }

    pub fn form(
        flow_id: &str,
        handler: &str,
        step_id: &str,
        data_schema: Vec<FormField>,
        errors: Option<HashMap<String, String>>,
        description_placeholders: Option<HashMap<String, String>>,
    ) -> Self {
        Self {
            step_id: Some(step_id.to_string()),
            data_schema,
            errors,
            description_placeholders,
            ..Self::base(flow_id, handler, FlowResultType::Form)
        }
    }

    pub fn abort(flow_id: &str, handler: &str, reason: &str) -> Self {
        Self {
            reason: Some(reason.to_string()),
            ..Self::base(flow_id, handler, FlowResultType::Abort)
        }
    }

    pub fn create_entry(
        flow_id: &str,
        handler: &str,
        entry: &ConfigEntry,
    ) -> Result<Self, FlowError> {
        Ok(Self {
            title: Some(entry.title.clone()),
            version: Some(entry.version),
            minor_version: Some(entry.minor_version),
            result: Some(serde_json::to_value(entry)?),
            ..Self::base(flow_id, handler, FlowResultType::CreateEntry)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_field_serialization() {
        let field = FormField::select("name", vec!["10.0.0.1 (Router)".to_string()]);
        assert_eq!(
            serde_json::to_value(&field).unwrap(),
            json!({
                "name": "name",
                "type": "select",
                "required": true,
                "options": ["10.0.0.1 (Router)"],
            })
        );

        let field = FormField::optional("sensors", FieldType::Boolean, false);
        assert_eq!(
            serde_json::to_value(&field).unwrap(),
            json!({
                "name": "sensors",
                "type": "boolean",
                "required": false,
                "default": false,
            })
        );
    }

    #[test]
    fn test_field_type_check() {
        let flag = FormField::optional("sensors", FieldType::Boolean, false);
        assert!(flag.check(&json!(true)).is_ok());
        assert!(matches!(
            flag.check(&json!("yes")),
            Err(FlowError::InvalidInput(_))
        ));

        let host = FormField::required("host", FieldType::String);
        assert!(host.check(&json!("anything")).is_ok());
        assert!(host.check(&json!(false)).is_err());
    }

    #[test]
    fn test_select_requires_offered_option() {
        let name = FormField::select("name", vec!["a".to_string(), "b".to_string()]);
        assert!(name.check(&json!("b")).is_ok());
        assert!(matches!(
            name.check(&json!("not-an-option")),
            Err(FlowError::InvalidInput(_))
        ));
        assert!(name.check(&json!(1)).is_err());

        let empty = FormField::select("name", Vec::new());
        assert!(empty.check(&json!("a")).is_err());
    }

    #[test]
    fn test_abort_result_serialization() {
        let result = FlowResult::abort("abc", "igd", "already_configured");
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["type"], "abort");
        assert_eq!(value["reason"], "already_configured");
        assert_eq!(value["data_schema"], json!([]));
        assert!(value["errors"].is_null());
        assert!(value.get("step_id").is_none());
    }

    #[test]
    fn test_create_entry_result() {
        let entry = ConfigEntry::new("igd", "Router").with_version(1, 2);
        let result = FlowResult::create_entry("abc", "igd", &entry).unwrap();

        assert_eq!(result.result_type, FlowResultType::CreateEntry);
        assert_eq!(result.title.as_deref(), Some("Router"));
        assert_eq!(result.minor_version, Some(2));
        assert_eq!(result.result.unwrap()["entry_id"], json!(entry.entry_id));
    }

    #[test]
    fn test_step_terminality() {
        assert!(!FlowStep::form("user", Vec::new()).is_terminal());
        assert!(FlowStep::abort("host_not_found").is_terminal());
    }
}
