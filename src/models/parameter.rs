use serde::{Deserialize, Serialize};

/// One tunable value declared in an indicator with `input` or `extern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorParameter {
    pub name: String,
    /// Initializer text exactly as written, trimmed. Never evaluated.
    pub default_value: String,
}

impl IndicatorParameter {
    pub fn new(name: impl Into<String>, default_value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: default_value.into(),
        }
    }
}
