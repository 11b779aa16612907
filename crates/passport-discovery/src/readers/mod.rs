//! Source readers
//!
//! Each reader wraps one external collaborator behind a trait so discovery
//! can be driven by real tools in production and by in-memory fixtures in
//! tests.

pub mod companion;
pub mod container;
pub mod manifest;

pub use companion::{CompanionFile, CompanionLookup, FsCompanionLookup};
pub use container::{ContainerPartReader, ContainerPartWriter, InMemoryContainerParts};
pub use manifest::{
    find_passport_assertion, C2paToolReader, EmbeddedManifestReader, InMemoryManifestReader,
    ManifestAssertion,
};
