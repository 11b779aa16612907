//! Custom parts of structured container formats
//!
//! Compound documents can carry a passport, or a pointer to one, in a
//! custom metadata part. Reading and writing the container format is an
//! external concern; discovery only sees the part's bytes.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::source::ArtifactInput;

/// Part path the passport or pointer is stored under
pub const PASSPORT_PART_PATH: &str = "customXml/provenance-passport.json";

/// Trait for reading a custom part out of a container
#[async_trait]
pub trait ContainerPartReader: Send + Sync {
    /// Bytes of `part_path`, or `None` if the artifact is not a container
    /// or has no such part
    async fn read_part(&self, artifact: &ArtifactInput, part_path: &str) -> Result<Option<Vec<u8>>>;

    /// Get a description of this reader (for logging)
    fn description(&self) -> &str {
        "container reader"
    }
}

/// Trait for producers writing a custom part
#[async_trait]
pub trait ContainerPartWriter: Send + Sync {
    async fn write_part(&self, artifact: &ArtifactInput, part_path: &str, bytes: Vec<u8>) -> Result<()>;
}

/// In-memory container parts keyed by artifact name and part path
#[derive(Debug, Default)]
pub struct InMemoryContainerParts {
    parts: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryContainerParts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` under the default passport part of `artifact_name`
    pub fn with_part(self, artifact_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.parts.write().unwrap().insert(
            (artifact_name.into(), PASSPORT_PART_PATH.to_string()),
            bytes.into(),
        );
        self
    }
}

#[async_trait]
impl ContainerPartReader for InMemoryContainerParts {
    async fn read_part(&self, artifact: &ArtifactInput, part_path: &str) -> Result<Option<Vec<u8>>> {
        let parts = self.parts.read().unwrap();
        Ok(parts
            .get(&(artifact.name.clone(), part_path.to_string()))
            .cloned())
    }

    fn description(&self) -> &str {
        "in-memory container parts"
    }
}

#[async_trait]
impl ContainerPartWriter for InMemoryContainerParts {
    async fn write_part(&self, artifact: &ArtifactInput, part_path: &str, bytes: Vec<u8>) -> Result<()> {
        self.parts
            .write()
            .unwrap()
            .insert((artifact.name.clone(), part_path.to_string()), bytes);
        Ok(())
    }
}
