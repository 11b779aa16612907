//! Source discovery state machine
//!
//! Sources are tried strictly in order and the first hit wins:
//!
//! 1. embedded manifest assertion
//! 2. container custom part (full passport or pointer)
//! 3. companion file
//!
//! Custom container parts and the pointers they hold sit outside any
//! integrity chain, so their passports are always compared to the artifact
//! bytes. Only an intact embedded manifest can attest the content.
//!
//! A reader that errors is logged and treated as empty. A container pointer
//! that cannot be resolved ends discovery with
//! [`DiscoveryOutcome::PointerUnresolved`], which callers report differently
//! from a plain absence.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, info, warn};

use crate::fetch::HttpFetch;
use crate::readers::companion::{match_auxiliary, CompanionLookup, FsCompanionLookup};
use crate::readers::container::{ContainerPartReader, PASSPORT_PART_PATH};
use crate::readers::manifest::{find_passport_assertion, EmbeddedManifestReader, PASSPORT_ASSERTION};
use crate::source::{
    ArtifactInput, BindingHint, Candidate, ContainerEntry, PassportPointer, PassportSource,
};

/// How long fetched pointer targets stay cached
pub const POINTER_CACHE_TTL: Duration = Duration::from_secs(3600);

const POINTER_CACHE_CAPACITY: u64 = 1000;

/// Result of running discovery on one artifact
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryOutcome {
    Found(Candidate),
    /// The container points at a passport that could not be retrieved
    PointerUnresolved {
        pointer: PassportPointer,
        reason: String,
    },
    NotFound,
}

impl DiscoveryOutcome {
    pub fn candidate(&self) -> Option<&Candidate> {
        match self {
            DiscoveryOutcome::Found(candidate) => Some(candidate),
            _ => None,
        }
    }
}

/// Locates the passport for an artifact
pub struct Discovery {
    manifest: Option<Arc<dyn EmbeddedManifestReader>>,
    container: Option<Arc<dyn ContainerPartReader>>,
    companion: Arc<dyn CompanionLookup>,
    fetcher: Option<Arc<dyn HttpFetch>>,
    manifest_base_url: Option<String>,
    part_path: String,
    pointer_cache: Cache<String, Arc<Vec<u8>>>,
}

impl Discovery {
    /// Discovery over filesystem companions only
    pub fn new() -> Self {
        DiscoveryBuilder::new().build()
    }

    pub fn builder() -> DiscoveryBuilder {
        DiscoveryBuilder::new()
    }

    /// Run the source state machine for `artifact`
    pub async fn discover(&self, artifact: &ArtifactInput) -> DiscoveryOutcome {
        if let Some(candidate) = self.from_manifest(artifact).await {
            return self.found(artifact, candidate);
        }

        if let Some(entry) = self.from_container(artifact).await {
            match entry {
                ContainerEntry::Passport(bytes) => {
                    let candidate = Candidate::new(
                        PassportSource::ContainerPart,
                        bytes,
                        BindingHint::DirectBytes,
                        self.part_path.clone(),
                    );
                    return self.found(artifact, candidate);
                }
                ContainerEntry::Pointer(pointer) => {
                    return match self.resolve_pointer(artifact, &pointer).await {
                        Ok(candidate) => {
                            self.found(artifact, candidate.pinned_to(pointer.sha256.clone()))
                        }
                        Err(reason) => {
                            warn!(
                                artifact = %artifact.name,
                                sha256 = %pointer.sha256,
                                reason = %reason,
                                "Passport pointer could not be resolved"
                            );
                            DiscoveryOutcome::PointerUnresolved { pointer, reason }
                        }
                    };
                }
            }
        }

        if let Some((origin, bytes)) = self.find_companion(artifact).await {
            let candidate = Candidate::new(
                PassportSource::CompanionFile,
                bytes,
                BindingHint::DirectBytes,
                origin,
            );
            return self.found(artifact, candidate);
        }

        debug!(artifact = %artifact.name, "No passport found");
        DiscoveryOutcome::NotFound
    }

    fn found(&self, artifact: &ArtifactInput, candidate: Candidate) -> DiscoveryOutcome {
        info!(
            artifact = %artifact.name,
            source = %candidate.source,
            origin = %candidate.origin,
            "Passport discovered"
        );
        DiscoveryOutcome::Found(candidate)
    }

    async fn from_manifest(&self, artifact: &ArtifactInput) -> Option<Candidate> {
        let reader = self.manifest.as_ref()?;
        let store = match reader.inspect(artifact).await {
            Ok(store) => store?,
            Err(e) => {
                warn!(
                    artifact = %artifact.name,
                    reader = reader.description(),
                    error = %e,
                    "Manifest reader failed, trying next source"
                );
                return None;
            }
        };

        let assertion = find_passport_assertion(&store)?;
        let binding = if !assertion.is_intact() {
            warn!(
                artifact = %artifact.name,
                failures = ?assertion.validation_failures,
                "SECURITY: Manifest failed validation, comparing bytes directly"
            );
            BindingHint::DirectBytes
        } else if assertion.declares_claim_binding() {
            BindingHint::ContainerAttested
        } else {
            BindingHint::AsDeclared
        };

        match serde_json::to_vec(&assertion.passport) {
            Ok(bytes) => Some(Candidate::new(
                PassportSource::EmbeddedManifest,
                bytes,
                binding,
                PASSPORT_ASSERTION,
            )),
            Err(e) => {
                warn!(artifact = %artifact.name, error = %e, "Unserializable manifest assertion");
                None
            }
        }
    }

    async fn from_container(&self, artifact: &ArtifactInput) -> Option<ContainerEntry> {
        let reader = self.container.as_ref()?;
        match reader.read_part(artifact, &self.part_path).await {
            Ok(bytes) => bytes.map(ContainerEntry::classify),
            Err(e) => {
                warn!(
                    artifact = %artifact.name,
                    reader = reader.description(),
                    error = %e,
                    "Container reader failed, trying next source"
                );
                None
            }
        }
    }

    /// Supplied auxiliary files first, then the filesystem
    async fn find_companion(&self, artifact: &ArtifactInput) -> Option<(String, Vec<u8>)> {
        if let Some(file) = match_auxiliary(artifact) {
            return Some((file.name.clone(), file.bytes.clone()));
        }

        let path = artifact.path.as_ref()?;
        match self.companion.find(path).await {
            Ok(found) => found.map(|f| (f.path.display().to_string(), f.bytes)),
            Err(e) => {
                warn!(artifact = %artifact.name, error = %e, "Companion lookup failed");
                None
            }
        }
    }

    /// Companion file first, then `{manifest_base_url}/{sha256}.json`
    async fn resolve_pointer(
        &self,
        artifact: &ArtifactInput,
        pointer: &PassportPointer,
    ) -> std::result::Result<Candidate, String> {
        if let Some((origin, bytes)) = self.find_companion(artifact).await {
            return Ok(Candidate::new(
                PassportSource::ContainerPointer,
                bytes,
                BindingHint::DirectBytes,
                origin,
            ));
        }

        let (Some(base), Some(fetcher)) = (self.manifest_base_url.as_ref(), self.fetcher.as_ref())
        else {
            return Err("no companion file and no manifest base URL configured".to_string());
        };

        if pointer.sha256.len() != 64 || !pointer.sha256.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err("pointer sha256 must be exactly 64 hexadecimal characters".to_string());
        }

        let url = pointer_url(base, &pointer.sha256);
        if let Some(body) = self.pointer_cache.get(&url).await {
            debug!(url = %url, "Using cached pointer target");
            return Ok(Candidate::new(
                PassportSource::ContainerPointer,
                body.as_ref().clone(),
                BindingHint::DirectBytes,
                url,
            ));
        }

        let response = fetcher
            .get(&url)
            .await
            .map_err(|e| format!("{url} unreachable: {e}"))?;
        if !response.is_success() {
            return Err(format!("{url} unreachable: HTTP {}", response.status));
        }

        let body = Arc::new(response.body);
        self.pointer_cache.insert(url.clone(), body.clone()).await;
        Ok(Candidate::new(
            PassportSource::ContainerPointer,
            body.as_ref().clone(),
            BindingHint::DirectBytes,
            url,
        ))
    }
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new()
    }
}

/// `{base}/{sha256}.json`, tolerating a trailing slash on `base`
pub fn pointer_url(base: &str, sha256: &str) -> String {
    format!("{}/{}.json", base.trim_end_matches('/'), sha256.to_ascii_lowercase())
}

/// Builder for [`Discovery`]
pub struct DiscoveryBuilder {
    manifest: Option<Arc<dyn EmbeddedManifestReader>>,
    container: Option<Arc<dyn ContainerPartReader>>,
    companion: Arc<dyn CompanionLookup>,
    fetcher: Option<Arc<dyn HttpFetch>>,
    manifest_base_url: Option<String>,
    part_path: String,
    pointer_cache_ttl: Duration,
}

impl DiscoveryBuilder {
    pub fn new() -> Self {
        Self {
            manifest: None,
            container: None,
            companion: Arc::new(FsCompanionLookup),
            fetcher: None,
            manifest_base_url: None,
            part_path: PASSPORT_PART_PATH.to_string(),
            pointer_cache_ttl: POINTER_CACHE_TTL,
        }
    }

    pub fn with_manifest_reader<R: EmbeddedManifestReader + 'static>(mut self, reader: R) -> Self {
        self.manifest = Some(Arc::new(reader));
        self
    }

    pub fn with_container_reader<R: ContainerPartReader + 'static>(mut self, reader: R) -> Self {
        self.container = Some(Arc::new(reader));
        self
    }

    /// Share a container reader that is also used elsewhere
    pub fn with_shared_container_reader(mut self, reader: Arc<dyn ContainerPartReader>) -> Self {
        self.container = Some(reader);
        self
    }

    pub fn with_companion_lookup<L: CompanionLookup + 'static>(mut self, lookup: L) -> Self {
        self.companion = Arc::new(lookup);
        self
    }

    /// Fetcher used to resolve container pointers
    pub fn with_fetcher(mut self, fetcher: Arc<dyn HttpFetch>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_manifest_base_url(mut self, url: impl Into<String>) -> Self {
        self.manifest_base_url = Some(url.into());
        self
    }

    pub fn with_part_path(mut self, part_path: impl Into<String>) -> Self {
        self.part_path = part_path.into();
        self
    }

    pub fn with_pointer_cache_ttl(mut self, ttl: Duration) -> Self {
        self.pointer_cache_ttl = ttl;
        self
    }

    pub fn build(self) -> Discovery {
        let pointer_cache = Cache::builder()
            .time_to_live(self.pointer_cache_ttl)
            .max_capacity(POINTER_CACHE_CAPACITY)
            .build();

        Discovery {
            manifest: self.manifest,
            container: self.container,
            companion: self.companion,
            fetcher: self.fetcher,
            manifest_base_url: self.manifest_base_url,
            part_path: self.part_path,
            pointer_cache,
        }
    }
}

impl Default for DiscoveryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchResponse, InMemoryFetcher};
    use crate::readers::container::InMemoryContainerParts;
    use crate::readers::manifest::InMemoryManifestReader;
    use crate::source::AuxiliaryFile;
    use serde_json::json;

    fn pointer_bytes(sha: &str) -> Vec<u8> {
        serde_json::to_vec(&PassportPointer::new(sha)).unwrap()
    }

    #[test]
    fn test_pointer_url() {
        assert_eq!(pointer_url("https://m.test/p/", "AB"), "https://m.test/p/ab.json");
        assert_eq!(pointer_url("https://m.test/p", "ab"), "https://m.test/p/ab.json");
    }

    #[tokio::test]
    async fn test_embedded_beats_container_and_companion() {
        let discovery = Discovery::builder()
            .with_manifest_reader(
                InMemoryManifestReader::new().with_passport("a.jpg", json!({"version": "0.1"})),
            )
            .with_container_reader(InMemoryContainerParts::new().with_part("a.jpg", b"{}".to_vec()))
            .build();
        let artifact = ArtifactInput::from_bytes("a.jpg", b"x".to_vec())
            .with_auxiliary(AuxiliaryFile::new("a.jpg.passport.json", b"{}".to_vec()));

        let candidate = discovery.discover(&artifact).await.candidate().cloned().unwrap();
        assert_eq!(candidate.source, PassportSource::EmbeddedManifest);
        assert_eq!(candidate.binding, BindingHint::AsDeclared);
        assert_eq!(candidate.bytes, br#"{"version":"0.1"}"#);
    }

    #[tokio::test]
    async fn test_embedded_binding_follows_manifest() {
        let artifact = ArtifactInput::from_bytes("a.jpg", b"x".to_vec());

        let claim_bound = Discovery::builder()
            .with_manifest_reader(
                InMemoryManifestReader::new()
                    .with_claim_bound_passport("a.jpg", json!({"version": "0.1"})),
            )
            .build();
        let candidate = claim_bound.discover(&artifact).await.candidate().cloned().unwrap();
        assert_eq!(candidate.binding, BindingHint::ContainerAttested);

        // a manifest whose data hash no longer matches attests nothing
        let broken = Discovery::builder()
            .with_manifest_reader(InMemoryManifestReader::new().with_store(
                "a.jpg",
                json!({
                    "active_manifest": "urn:uuid:1",
                    "manifests": {"urn:uuid:1": {"assertions": {
                        "com.provenancepassport.receipt": {"version": "0.1"},
                        "com.provenancepassport.hash_binding": "c2pa-claim"
                    }}},
                    "validation_status": [{"code": "assertion.dataHash.mismatch"}]
                }),
            ))
            .build();
        let candidate = broken.discover(&artifact).await.candidate().cloned().unwrap();
        assert_eq!(candidate.binding, BindingHint::DirectBytes);
    }

    #[tokio::test]
    async fn test_container_passport_beats_companion() {
        let discovery = Discovery::builder()
            .with_container_reader(
                InMemoryContainerParts::new().with_part("r.docx", br#"{"version":"0.1"}"#.to_vec()),
            )
            .build();
        let artifact = ArtifactInput::from_bytes("r.docx", b"PK".to_vec())
            .with_auxiliary(AuxiliaryFile::new("r.docx.passport.json", b"{}".to_vec()));

        let candidate = discovery.discover(&artifact).await.candidate().cloned().unwrap();
        assert_eq!(candidate.source, PassportSource::ContainerPart);
        assert_eq!(candidate.binding, BindingHint::DirectBytes);
        assert_eq!(candidate.origin, PASSPORT_PART_PATH);
        assert!(candidate.pinned_sha256.is_none());
    }

    #[tokio::test]
    async fn test_companion_binding_is_direct() {
        let discovery = Discovery::new();
        let artifact = ArtifactInput::from_bytes("a.txt", b"x".to_vec())
            .with_auxiliary(AuxiliaryFile::new("a.txt.passport.json", b"{}".to_vec()));

        let candidate = discovery.discover(&artifact).await.candidate().cloned().unwrap();
        assert_eq!(candidate.source, PassportSource::CompanionFile);
        assert_eq!(candidate.binding, BindingHint::DirectBytes);
        assert_eq!(candidate.origin, "a.txt.passport.json");
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let outcome = Discovery::new()
            .discover(&ArtifactInput::from_bytes("a.txt", b"x".to_vec()))
            .await;
        assert_eq!(outcome, DiscoveryOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_pointer_prefers_companion_over_base_url() {
        let sha = "cd".repeat(32);
        let fetcher = Arc::new(InMemoryFetcher::new().with_body(
            format!("https://m.test/{sha}.json"),
            b"remote".to_vec(),
        ));
        let discovery = Discovery::builder()
            .with_container_reader(InMemoryContainerParts::new().with_part("r.docx", pointer_bytes(&sha)))
            .with_fetcher(fetcher.clone())
            .with_manifest_base_url("https://m.test")
            .build();
        let artifact = ArtifactInput::from_bytes("r.docx", b"PK".to_vec())
            .with_auxiliary(AuxiliaryFile::new("r.passport.json", b"local".to_vec()));

        let candidate = discovery.discover(&artifact).await.candidate().cloned().unwrap();
        assert_eq!(candidate.source, PassportSource::ContainerPointer);
        assert_eq!(candidate.bytes, b"local");
        assert_eq!(candidate.binding, BindingHint::DirectBytes);
        assert_eq!(candidate.pinned_sha256.as_deref(), Some(sha.as_str()));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_pointer_fetched_once_then_cached() {
        let sha = "cd".repeat(32);
        let url = format!("https://m.test/{sha}.json");
        let fetcher = Arc::new(InMemoryFetcher::new().with_body(url.clone(), b"remote".to_vec()));
        let discovery = Discovery::builder()
            .with_container_reader(InMemoryContainerParts::new().with_part("r.docx", pointer_bytes(&sha)))
            .with_fetcher(fetcher.clone())
            .with_manifest_base_url("https://m.test/")
            .build();
        let artifact = ArtifactInput::from_bytes("r.docx", b"PK".to_vec());

        for _ in 0..3 {
            let candidate = discovery.discover(&artifact).await.candidate().cloned().unwrap();
            assert_eq!(candidate.bytes, b"remote");
            assert_eq!(candidate.origin, url);
        }
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_pointer_unreachable_is_distinct_outcome() {
        let sha = "cd".repeat(32);
        let fetcher = Arc::new(
            InMemoryFetcher::new()
                .with_response(format!("https://m.test/{sha}.json"), FetchResponse::status(503)),
        );
        let discovery = Discovery::builder()
            .with_container_reader(InMemoryContainerParts::new().with_part("r.docx", pointer_bytes(&sha)))
            .with_fetcher(fetcher.clone())
            .with_manifest_base_url("https://m.test")
            .build();
        let artifact = ArtifactInput::from_bytes("r.docx", b"PK".to_vec());

        match discovery.discover(&artifact).await {
            DiscoveryOutcome::PointerUnresolved { pointer, reason } => {
                assert_eq!(pointer.sha256, sha);
                assert!(reason.contains("HTTP 503"), "{reason}");
            }
            other => panic!("expected unresolved pointer, got {:?}", other),
        }

        // failures are not cached
        fetcher.set_response(format!("https://m.test/{sha}.json"), FetchResponse::ok("late"));
        assert!(discovery.discover(&artifact).await.candidate().is_some());
    }

    #[tokio::test]
    async fn test_pointer_without_base_url() {
        let discovery = Discovery::builder()
            .with_container_reader(
                InMemoryContainerParts::new().with_part("r.docx", pointer_bytes(&"cd".repeat(32))),
            )
            .build();

        let outcome = discovery
            .discover(&ArtifactInput::from_bytes("r.docx", b"PK".to_vec()))
            .await;
        assert!(matches!(outcome, DiscoveryOutcome::PointerUnresolved { .. }));
    }

    #[tokio::test]
    async fn test_pointer_rejects_malformed_sha() {
        let fetcher = Arc::new(InMemoryFetcher::new());
        let discovery = Discovery::builder()
            .with_container_reader(
                InMemoryContainerParts::new().with_part("r.docx", pointer_bytes("../../etc/passwd")),
            )
            .with_fetcher(fetcher.clone())
            .with_manifest_base_url("https://m.test")
            .build();

        let outcome = discovery
            .discover(&ArtifactInput::from_bytes("r.docx", b"PK".to_vec()))
            .await;
        assert!(matches!(outcome, DiscoveryOutcome::PointerUnresolved { .. }));
        assert_eq!(fetcher.calls(), 0);
    }
}
