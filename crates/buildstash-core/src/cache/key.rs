use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage address of an artifact
///
/// `id` disambiguates targets that fingerprint identically (two sourceless
/// targets with different names share a hash), so both halves are part of the
/// address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub id: String,
    pub hash: String,
}

impl CacheKey {
    pub fn new(id: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hash: hash.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.hash)
    }
}
