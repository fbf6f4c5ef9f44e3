//! Instance variables as the execution backend stores them, and the variable
//! names reserved by the dispatcher.

use crate::Value;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Implementation identifier of the executor bound to a step.
pub const EXECUTOR: &str = "executor";
/// Serialized activity configuration of a step.
pub const ACTIVITY: &str = "activity";
/// Holder of the event that triggered the current branch.
pub const EVENT: &str = "event";
/// Last recorded activity failure.
pub const ERROR: &str = "error";
/// Segment under which activity outputs are grouped and flattened.
pub const OUTPUTS: &str = "outputs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Json,
}

/// A variable in the backend's variable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Variable {
    /// Scalar kept in the backend's native representation.
    Native { value: Value },
    /// Composite value kept as serialized text.
    Object { format: DataFormat, payload: String },
}

impl Variable {
    pub fn native(value: impl Into<Value>) -> Self {
        Variable::Native {
            value: value.into(),
        }
    }

    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Variable::Object {
            format: DataFormat::Json,
            payload: serde_json::to_string(value)?,
        })
    }

    /// Native when the value is a scalar, serialized JSON otherwise.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if value.is_native() {
            Ok(Variable::Native { value })
        } else {
            Variable::json(&value)
        }
    }

    pub fn as_native(&self) -> Option<&Value> {
        match self {
            Variable::Native { value } => Some(value),
            Variable::Object { .. } => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Variable::Object { .. })
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Variable::Native { value } => Ok(value.to_json()),
            Variable::Object { payload, .. } => serde_json::from_str(payload),
        }
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Variable::Native { value } => Ok(value.clone()),
            Variable::Object { payload, .. } => serde_json::from_str(payload),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_json()?)
    }

    /// Text form used for template interpolation.
    pub fn to_text(&self) -> String {
        match self {
            Variable::Native { value } => value.to_text(),
            Variable::Object { payload, .. } => payload.clone(),
        }
    }
}

/// Error entry written under [`ERROR`] when an activity fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionErrorRecord {
    pub message: String,
    pub activity_inst_id: String,
    pub activity_id: String,
}

/// Name of the flattened variable holding one output of an activity.
pub fn output_variable_name(activity_id: &str, key: &str) -> String {
    format!("{}.{}.{}", activity_id, OUTPUTS, key)
}
