//! Passport Discovery
//!
//! Locates the passport belonging to an artifact. Three kinds of source are
//! consulted in a fixed order, first hit wins:
//!
//! - **Embedded manifest**: a passport assertion inside the artifact's
//!   content-credential manifest (read via `c2patool`)
//! - **Container part**: a custom metadata part holding either a full
//!   passport or a pointer resolved through a companion file or a manifest
//!   base URL
//! - **Companion file**: `<artifact>.passport.json`, or legacy `<artifact>.pp`
//!
//! Every external collaborator sits behind a trait so tests can inject
//! synthetic sources.
//!
//! ## Usage
//!
//! ```ignore
//! use passport_discovery::{ArtifactInput, Discovery, DiscoveryOutcome};
//! use passport_discovery::readers::C2paToolReader;
//!
//! let discovery = Discovery::builder()
//!     .with_manifest_reader(C2paToolReader::new())
//!     .build();
//!
//! let artifact = ArtifactInput::from_path("photo.jpg").await?;
//! if let DiscoveryOutcome::Found(candidate) = discovery.discover(&artifact).await {
//!     println!("passport from {}", candidate.source);
//! }
//! ```

pub mod discovery;
pub mod error;
pub mod fetch;
pub mod readers;
pub mod source;

pub use discovery::{pointer_url, Discovery, DiscoveryBuilder, DiscoveryOutcome};
pub use error::{DiscoveryError, Result};
pub use fetch::{FetchResponse, HttpFetch, InMemoryFetcher, ReqwestFetcher};
pub use source::{
    ArtifactInput, AuxiliaryFile, BindingHint, Candidate, ContainerEntry, PassportPointer,
    PassportSource,
};
