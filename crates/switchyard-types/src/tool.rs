//! The tool descriptor published in the merged catalog.

use serde::{Deserialize, Serialize};

/// A tool offered by one provider process.
///
/// The input schema is kept as an opaque JSON value: it is forwarded to
/// callers and rankers as-is and never validated beyond being present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: serde_json::Value,
    /// Name of the provider that owns this tool.
    #[serde(rename = "serverName", default)]
    pub provider: String,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            provider: provider.into(),
        }
    }
}
