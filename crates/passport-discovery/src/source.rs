//! Passport sources and discovery inputs
//!
//! Every reader produces the same [`Candidate`] shape: the raw passport bytes
//! plus a [`BindingHint`] telling the orchestrator whether a direct byte-hash
//! comparison is meaningful for that source.

use std::fmt;
use std::path::{Path, PathBuf};

use passport_core::digest::sha256_hex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// `type` value carried by container pointers
pub const POINTER_TYPE: &str = "provenance-passport-pointer";

/// Where a passport was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassportSource {
    /// Assertion inside an embedded content-credential manifest
    EmbeddedManifest,
    /// Full passport stored in a container custom part
    ContainerPart,
    /// Container pointer resolved to a passport stored elsewhere
    ContainerPointer,
    /// `<artifact>.passport.json` or legacy `<artifact>.pp`
    CompanionFile,
}

impl PassportSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassportSource::EmbeddedManifest => "embedded_manifest",
            PassportSource::ContainerPart => "container_part",
            PassportSource::ContainerPointer => "container_pointer",
            PassportSource::CompanionFile => "companion_file",
        }
    }
}

impl fmt::Display for PassportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the artifact's declared hash relates to the bytes being verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingHint {
    /// The container's own integrity chain covers the content
    ContainerAttested,
    /// Always compare `artifact.sha256` against the artifact bytes
    DirectBytes,
    /// Follow the passport's `artifact.hash_binding`
    AsDeclared,
}

/// A passport located by one of the sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub source: PassportSource,
    pub bytes: Vec<u8>,
    pub binding: BindingHint,
    /// Human-readable origin: a path, URL or assertion label
    pub origin: String,
    /// `artifact.sha256` the passport must declare, set when a container
    /// pointer named it
    pub pinned_sha256: Option<String>,
}

impl Candidate {
    pub fn new(
        source: PassportSource,
        bytes: impl Into<Vec<u8>>,
        binding: BindingHint,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            source,
            bytes: bytes.into(),
            binding,
            origin: origin.into(),
            pinned_sha256: None,
        }
    }

    /// Require the passport to declare `sha256` as its artifact hash
    pub fn pinned_to(mut self, sha256: impl Into<String>) -> Self {
        self.pinned_sha256 = Some(sha256.into());
        self
    }
}

/// Reference from a container to a passport stored elsewhere
///
/// `sha256` is the artifact's content hash and doubles as the lookup key
/// under the manifest base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassportPointer {
    #[serde(rename = "type")]
    pub kind: String,
    pub sha256: String,
}

impl PassportPointer {
    pub fn new(sha256: impl Into<String>) -> Self {
        Self {
            kind: POINTER_TYPE.to_string(),
            sha256: sha256.into(),
        }
    }

    /// Pointer keyed by the content hash of `artifact_bytes`
    pub fn for_artifact(artifact_bytes: &[u8]) -> Self {
        Self::new(sha256_hex(artifact_bytes))
    }
}

/// What a container custom part holds
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerEntry {
    /// A legacy full passport, kept verbatim
    Passport(Vec<u8>),
    Pointer(PassportPointer),
}

impl ContainerEntry {
    /// Classify the bytes of a custom part
    ///
    /// Anything that is not a well-formed pointer is handed on as a passport
    /// so that structural validation reports what is wrong with it.
    pub fn classify(bytes: Vec<u8>) -> Self {
        if let Ok(pointer) = serde_json::from_slice::<PassportPointer>(&bytes) {
            if pointer.kind == POINTER_TYPE {
                return ContainerEntry::Pointer(pointer);
            }
        }
        ContainerEntry::Passport(bytes)
    }
}

/// An extra file supplied alongside the artifact, e.g. a dropped companion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl AuxiliaryFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// An artifact to discover a passport for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInput {
    /// File name used for companion matching and reports
    pub name: String,
    /// On-disk location, when the artifact came from the filesystem
    pub path: Option<PathBuf>,
    pub bytes: Vec<u8>,
    pub auxiliary: Vec<AuxiliaryFile>,
}

impl ArtifactInput {
    /// Artifact held in memory only
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            path: None,
            bytes: bytes.into(),
            auxiliary: Vec::new(),
        }
    }

    /// Read an artifact from disk
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            path: Some(path.to_path_buf()),
            bytes,
            auxiliary: Vec::new(),
        })
    }

    pub fn with_auxiliary(mut self, file: AuxiliaryFile) -> Self {
        self.auxiliary.push(file);
        self
    }

    /// Lowercase hex SHA-256 of the artifact bytes
    pub fn sha256(&self) -> String {
        sha256_hex(&self.bytes)
    }

    /// File name without its last extension
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(idx) if idx > 0 => &self.name[..idx],
            _ => &self.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_pointer() {
        let bytes = serde_json::to_vec(&json!({
            "type": "provenance-passport-pointer",
            "sha256": "ab".repeat(32)
        }))
        .unwrap();

        match ContainerEntry::classify(bytes) {
            ContainerEntry::Pointer(p) => assert_eq!(p.sha256, "ab".repeat(32)),
            other => panic!("expected pointer, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_full_passport() {
        let bytes = br#"{"version":"0.1","artifact":{}}"#.to_vec();
        assert_eq!(
            ContainerEntry::classify(bytes.clone()),
            ContainerEntry::Passport(bytes)
        );
    }

    #[test]
    fn test_classify_foreign_type_is_passport() {
        let bytes = br#"{"type":"something-else","sha256":"00"}"#.to_vec();
        assert!(matches!(
            ContainerEntry::classify(bytes),
            ContainerEntry::Passport(_)
        ));
    }

    #[test]
    fn test_stem() {
        assert_eq!(ArtifactInput::from_bytes("report.docx", vec![]).stem(), "report");
        assert_eq!(ArtifactInput::from_bytes("a.tar.gz", vec![]).stem(), "a.tar");
        assert_eq!(ArtifactInput::from_bytes("README", vec![]).stem(), "README");
        assert_eq!(ArtifactInput::from_bytes(".env", vec![]).stem(), ".env");
    }

    #[test]
    fn test_pointer_for_artifact() {
        let pointer = PassportPointer::for_artifact(b"");
        assert_eq!(pointer.kind, POINTER_TYPE);
        assert_eq!(
            pointer.sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(ArtifactInput::from_bytes("empty", vec![]).sha256(), pointer.sha256);
    }

    #[test]
    fn test_source_wire_names() {
        assert_eq!(
            serde_json::to_value(PassportSource::CompanionFile).unwrap(),
            json!("companion_file")
        );
        assert_eq!(PassportSource::EmbeddedManifest.to_string(), "embedded_manifest");
    }

    #[tokio::test]
    async fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hi").unwrap();

        let input = ArtifactInput::from_path(&path).await.unwrap();
        assert_eq!(input.name, "hello.txt");
        assert_eq!(input.bytes, b"hi");
        assert_eq!(input.path.as_deref(), Some(path.as_path()));
    }
}
