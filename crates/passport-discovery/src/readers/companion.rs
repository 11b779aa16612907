//! Companion passport files
//!
//! A companion sits next to its artifact as `<artifact>.passport.json`, or
//! as the legacy `<artifact>.pp`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::source::{ArtifactInput, AuxiliaryFile};

/// Preferred companion suffix
pub const COMPANION_SUFFIX: &str = ".passport.json";

/// Legacy companion suffix
pub const LEGACY_COMPANION_SUFFIX: &str = ".pp";

/// A companion file read from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionFile {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Trait for locating a companion next to an on-disk artifact
#[async_trait]
pub trait CompanionLookup: Send + Sync {
    async fn find(&self, artifact_path: &Path) -> Result<Option<CompanionFile>>;
}

/// Filesystem companion lookup
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCompanionLookup;

#[async_trait]
impl CompanionLookup for FsCompanionLookup {
    async fn find(&self, artifact_path: &Path) -> Result<Option<CompanionFile>> {
        for suffix in [COMPANION_SUFFIX, LEGACY_COMPANION_SUFFIX] {
            let mut candidate = artifact_path.as_os_str().to_owned();
            candidate.push(suffix);
            let candidate = PathBuf::from(candidate);

            match tokio::fs::read(&candidate).await {
                Ok(bytes) => {
                    debug!(path = %candidate.display(), "Found companion file");
                    return Ok(Some(CompanionFile {
                        path: candidate,
                        bytes,
                    }));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }
}

/// Pick the companion among files supplied alongside the artifact
///
/// Exact names win in the order `<name>.passport.json`,
/// `<stem>.passport.json`, `<name>.pp`, `<stem>.pp`. Failing those, the
/// first supplied file carrying either suffix is used.
pub fn match_auxiliary(artifact: &ArtifactInput) -> Option<&AuxiliaryFile> {
    let name = artifact.name.as_str();
    let stem = artifact.stem();
    let preferred = [
        format!("{name}{COMPANION_SUFFIX}"),
        format!("{stem}{COMPANION_SUFFIX}"),
        format!("{name}{LEGACY_COMPANION_SUFFIX}"),
        format!("{stem}{LEGACY_COMPANION_SUFFIX}"),
    ];

    preferred
        .iter()
        .find_map(|wanted| artifact.auxiliary.iter().find(|f| &f.name == wanted))
        .or_else(|| {
            artifact.auxiliary.iter().find(|f| {
                f.name.ends_with(COMPANION_SUFFIX) || f.name.ends_with(LEGACY_COMPANION_SUFFIX)
            })
        })
}
