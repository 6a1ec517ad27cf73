//! Tool and resource value objects exchanged with domain experts.

use super::ExpertDomainError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata for a tool exposed by a domain expert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "inputSchema", alias = "input_schema")]
    input_schema: Value,
}

impl ToolDefinition {
    /// Creates a tool definition.
    ///
    /// # Errors
    ///
    /// Returns [`ExpertDomainError::EmptyToolName`] when the name is blank.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Result<Self, ExpertDomainError> {
        let normalized_name = name.into().trim().to_owned();
        if normalized_name.is_empty() {
            return Err(ExpertDomainError::EmptyToolName);
        }

        Ok(Self {
            name: normalized_name,
            description: description.into().trim().to_owned(),
            input_schema,
        })
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tool description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the input schema.
    #[must_use]
    pub const fn input_schema(&self) -> &Value {
        &self.input_schema
    }
}

/// Outcome of a discovery call.
///
/// Discovery never fails outright: a failed call yields an empty tool list
/// and an error marker so callers can degrade gracefully.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolListing {
    /// Discovered tools.
    pub tools: Vec<ToolDefinition>,
    /// Failure description when discovery did not succeed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolListing {
    /// Creates a successful listing.
    #[must_use]
    pub const fn available(tools: Vec<ToolDefinition>) -> Self {
        Self { tools, error: None }
    }

    /// Creates an empty listing carrying an error marker.
    #[must_use]
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            tools: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Returns whether discovery failed.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Content returned by a resource read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceContent {
    /// Resource URI that was read.
    pub uri: String,
    /// MIME type, when the expert reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Resource body.
    pub content: Value,
}

impl ResourceContent {
    /// Creates resource content without a MIME type.
    #[must_use]
    pub fn new(uri: impl Into<String>, content: Value) -> Self {
        Self {
            uri: uri.into(),
            mime_type: None,
            content,
        }
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}
