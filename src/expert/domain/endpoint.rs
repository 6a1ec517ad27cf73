//! Domain expert endpoint configuration value objects.

use super::{ExpertDomainError, ExpertName};
use serde::{Deserialize, Serialize};

/// Unvalidated endpoint entry as it appears in configuration sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertEndpointSpec {
    /// Unique expert name.
    pub name: String,
    /// Transport address in `scheme://address` form.
    pub endpoint: String,
    /// Expert kind, for example `code_analysis`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Optional capability tags advertised by configuration.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Validated endpoint of a single domain expert service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ExpertEndpointSpec", into = "ExpertEndpointSpec")]
pub struct ExpertEndpoint {
    name: ExpertName,
    address: String,
    scheme: String,
    kind: String,
    capabilities: Vec<String>,
}

impl ExpertEndpoint {
    /// Creates a validated endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ExpertDomainError`] when the name, address or kind are
    /// invalid.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        kind: impl Into<String>,
    ) -> Result<Self, ExpertDomainError> {
        let expert_name = ExpertName::new(name)?;

        let normalized_address = address.into().trim().to_owned();
        if normalized_address.is_empty() {
            return Err(ExpertDomainError::EmptyEndpoint);
        }
        let scheme = match normalized_address.split_once("://") {
            Some((scheme, rest)) if !scheme.is_empty() && !rest.is_empty() => {
                scheme.to_ascii_lowercase()
            }
            _ => return Err(ExpertDomainError::InvalidEndpoint(normalized_address)),
        };

        let normalized_kind = kind.into().trim().to_owned();
        if normalized_kind.is_empty() {
            return Err(ExpertDomainError::EmptyExpertKind);
        }

        Ok(Self {
            name: expert_name,
            address: normalized_address,
            scheme,
            kind: normalized_kind,
            capabilities: Vec::new(),
        })
    }

    /// Replaces the advertised capability tags.
    ///
    /// Blank tags are discarded.
    #[must_use]
    pub fn with_capabilities(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.capabilities = values
            .into_iter()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .collect();
        self
    }

    /// Returns the expert name.
    #[must_use]
    pub const fn name(&self) -> &ExpertName {
        &self.name
    }

    /// Returns the full transport address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the lowercased address scheme, for example `https` or `ws`.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the expert kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the configured capability tags.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }
}

impl TryFrom<ExpertEndpointSpec> for ExpertEndpoint {
    type Error = ExpertDomainError;

    fn try_from(entry: ExpertEndpointSpec) -> Result<Self, Self::Error> {
        Ok(Self::new(entry.name, entry.endpoint, entry.kind)?.with_capabilities(entry.capabilities))
    }
}

impl From<ExpertEndpoint> for ExpertEndpointSpec {
    fn from(endpoint: ExpertEndpoint) -> Self {
        Self {
            name: endpoint.name.into(),
            endpoint: endpoint.address,
            kind: endpoint.kind,
            capabilities: endpoint.capabilities,
        }
    }
}
