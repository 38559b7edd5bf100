use serde::{Deserialize, Serialize};

/// A parameterized boot-script body, rendered with a host's resolved
/// variables at request time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Unique key.
    pub id: String,

    /// Raw template-script text.
    #[serde(default)]
    pub template: String,
}

impl Template {
    pub fn new(id: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template: template.into(),
        }
    }
}
