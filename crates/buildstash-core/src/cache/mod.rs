//! Tiered artifact caches
//!
//! Every tier implements [`ArtifactCache`]. Local and temp tiers also act as
//! [`StagingArea`]s for a remote tier, building archives before upload and
//! unpacking downloads. [`CacheFactory`] turns a configured spec into a tier
//! or a chain of tiers.

mod artifact_cache;
mod combined;
mod error;
mod factory;
mod key;
mod local;
mod pinger;
mod remote;
mod staging;
mod tarball;
mod temp;

pub use artifact_cache::{ArtifactCache, CachedArtifact};
pub use combined::CombinedArtifactCache;
pub use error::{CacheError, Result};
pub use factory::{BuiltCache, CacheFactory};
pub use key::CacheKey;
pub use local::LocalArtifactCache;
pub use pinger::{Pinger, DEFAULT_PING_TIMEOUT, DEFAULT_PING_TRIES};
pub use remote::{RemoteArtifactCache, RestClient, DEFAULT_REMOTE_TIMEOUT};
pub use staging::{StagedArchive, StagingArea, READ_SIZE_BYTES};
pub use tarball::{archive_extension, Tarball, TAR_EXT, TAR_GZ_EXT};
pub use temp::TempArtifactCache;
