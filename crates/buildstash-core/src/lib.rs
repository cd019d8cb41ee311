//! Incremental-build caching core.
//!
//! Turns a buildable target's declared inputs into a stable fingerprint and
//! uses that fingerprint as the address into a tiered, content-addressable
//! artifact store (local disk, a remote REST service, or both).

pub mod cache;
pub mod config;
pub mod fingerprint;

pub use cache::{
    ArtifactCache, BuiltCache, CacheError, CacheFactory, CacheKey, CachedArtifact,
    CombinedArtifactCache, LocalArtifactCache, Pinger, RemoteArtifactCache, RestClient,
    StagingArea, TempArtifactCache,
};
pub use config::{CacheConfig, CacheSpec, CliOverrides, ConfigError};
pub use fingerprint::{
    BuildTarget, DefaultFingerprintStrategy, Field, FieldContent, FingerprintError,
    FingerprintStrategy, JvmFingerprintStrategy, Payload,
};
