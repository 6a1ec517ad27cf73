//! Endpoint source that re-reads a JSON file on every load.

use crate::expert::{
    domain::ExpertEndpoint,
    ports::{EndpointSource, EndpointSourceError, EndpointSourceResult},
};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::Deserialize;
use std::io;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EndpointDocument {
    List(Vec<ExpertEndpoint>),
    Config {
        #[serde(default)]
        domain_experts: Vec<ExpertEndpoint>,
    },
}

/// Reads a UTF-8 text file through a capability handle on its parent
/// directory.
fn read_text_file(path: &Utf8Path) -> io::Result<String> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{path} does not name a file"),
        )
    })?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.read_to_string(file_name)
}

/// Reads expert endpoints from a JSON file.
///
/// The file holds either a bare array of endpoints or an object with a
/// `domain_experts` array.
#[derive(Debug, Clone)]
pub struct JsonFileEndpointSource {
    path: Utf8PathBuf,
}

impl JsonFileEndpointSource {
    /// Creates a source for `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the watched path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

#[async_trait]
impl EndpointSource for JsonFileEndpointSource {
    async fn load(&self) -> EndpointSourceResult<Vec<ExpertEndpoint>> {
        let path = self.path.clone();
        let text = tokio::task::spawn_blocking(move || read_text_file(&path))
            .await
            .map_err(EndpointSourceError::runtime)?
            .map_err(EndpointSourceError::runtime)?;
        let document: EndpointDocument =
            serde_json::from_str(&text).map_err(EndpointSourceError::runtime)?;

        Ok(match document {
            EndpointDocument::List(endpoints) => endpoints,
            EndpointDocument::Config { domain_experts } => domain_experts,
        })
    }
}
