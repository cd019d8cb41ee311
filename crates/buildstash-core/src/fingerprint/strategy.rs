use rustc_hash::FxHashMap;
use tracing::debug;

use super::hash::{combine_hashes, DEPS_HASH_WIDTH};
use super::{Payload, Result};
use crate::cache::CacheKey;

/// A buildable unit as seen by fingerprinting
///
/// `id` must be stable across builds and safe to use as a path segment.
/// Dependencies must form a DAG.
pub trait BuildTarget {
    fn id(&self) -> &str;

    /// The target's own fingerprintable content, `None` for pure groupings
    fn payload(&self) -> Option<&Payload>;

    fn dependencies(&self) -> Vec<&Self>;

    /// Whether platform descriptors (e.g. a JVM version) affect this target
    fn is_platform_sensitive(&self) -> bool {
        false
    }
}

/// Per-invocation memo of computed fingerprints keyed by (target id, transitive)
#[derive(Debug, Default)]
pub struct FingerprintMemo {
    direct: FxHashMap<String, Option<String>>,
    transitive: FxHashMap<String, Option<String>>,
}

impl FingerprintMemo {
    pub fn get(&self, id: &str, transitive: bool) -> Option<&Option<String>> {
        self.table(transitive).get(id)
    }

    pub fn insert(&mut self, id: &str, transitive: bool, fingerprint: Option<String>) {
        let table = if transitive {
            &mut self.transitive
        } else {
            &mut self.direct
        };
        table.insert(id.to_string(), fingerprint);
    }

    pub fn len(&self) -> usize {
        self.direct.len() + self.transitive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self, transitive: bool) -> &FxHashMap<String, Option<String>> {
        if transitive {
            &self.transitive
        } else {
            &self.direct
        }
    }
}

/// Computes cache-worthy identities for build targets
///
/// A strategy instance lives for exactly one build invocation; its memo is
/// dropped with it. A `None` fingerprint means the target is uncacheable.
pub trait FingerprintStrategy {
    /// Annotates produced cache keys for debugging
    fn name(&self) -> &'static str;

    fn memo(&mut self) -> &mut FingerprintMemo;

    /// Compute without consulting the memo
    fn compute_fingerprint<T: BuildTarget>(
        &mut self,
        target: &T,
        transitive: bool,
    ) -> Result<Option<String>>;

    fn fingerprint<T: BuildTarget>(&mut self, target: &T, transitive: bool) -> Result<Option<String>> {
        if let Some(memoized) = self.memo().get(target.id(), transitive) {
            return Ok(memoized.clone());
        }
        let fingerprint = self.compute_fingerprint(target, transitive)?;
        self.memo()
            .insert(target.id(), transitive, fingerprint.clone());
        Ok(fingerprint)
    }

    /// Cache key for a target, or `None` when it must not be cached
    fn cache_key<T: BuildTarget>(&mut self, target: &T, transitive: bool) -> Result<Option<CacheKey>> {
        let name = self.name();
        Ok(self
            .fingerprint(target, transitive)?
            .map(|fingerprint| CacheKey::new(target.id(), format!("{fingerprint}-{name}"))))
    }
}

/// Payload fingerprint, optionally folded together with the dependency closure
///
/// Dependencies are fingerprinted through `strategy`, so a wrapping strategy
/// applies its own rules at every level of the graph.
pub fn default_fingerprint<S, T>(strategy: &mut S, target: &T, transitive: bool) -> Result<Option<String>>
where
    S: FingerprintStrategy + ?Sized,
    T: BuildTarget,
{
    let own_hash = match target.payload() {
        Some(payload) => Some(payload.fingerprint()?.to_string()),
        None => None,
    };
    if !transitive {
        return Ok(own_hash);
    }

    let mut dep_hashes = Vec::new();
    for dep in target.dependencies() {
        if let Some(dep_hash) = strategy.fingerprint(dep, true)? {
            dep_hashes.push(dep_hash);
        }
    }
    if own_hash.is_none() && dep_hashes.is_empty() {
        return Ok(None);
    }

    dep_hashes.sort();
    let mut hasher = blake3::Hasher::new();
    for dep_hash in &dep_hashes {
        hasher.update(dep_hash.as_bytes());
    }
    let deps_hash = hasher.finalize().to_hex();

    Ok(Some(format!(
        "{}.{}",
        own_hash.unwrap_or_default(),
        &deps_hash.as_str()[..DEPS_HASH_WIDTH]
    )))
}

/// Delegates to the target's payload fingerprint
#[derive(Debug, Default)]
pub struct DefaultFingerprintStrategy {
    memo: FingerprintMemo,
}

impl DefaultFingerprintStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FingerprintStrategy for DefaultFingerprintStrategy {
    fn name(&self) -> &'static str {
        "default"
    }

    fn memo(&mut self) -> &mut FingerprintMemo {
        &mut self.memo
    }

    fn compute_fingerprint<T: BuildTarget>(
        &mut self,
        target: &T,
        transitive: bool,
    ) -> Result<Option<String>> {
        default_fingerprint(self, target, transitive)
    }
}

/// Default fingerprinting plus a digest of platform descriptors
///
/// Platform-sensitive targets compiled under different declared platforms
/// never share a fingerprint. Descriptor order does not matter.
#[derive(Debug)]
pub struct JvmFingerprintStrategy {
    memo: FingerprintMemo,
    platform_data: Vec<String>,
    platform_hash: String,
}

impl JvmFingerprintStrategy {
    pub fn new<I, S>(platform_data: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut platform_data: Vec<String> = platform_data.into_iter().map(Into::into).collect();
        platform_data.sort();
        let platform_hash = combine_hashes(&platform_data);
        debug!("JVM platform data {:?} hashed to {}", platform_data, platform_hash);

        Self {
            memo: FingerprintMemo::default(),
            platform_data,
            platform_hash,
        }
    }

    pub fn platform_data(&self) -> &[String] {
        &self.platform_data
    }
}

impl FingerprintStrategy for JvmFingerprintStrategy {
    fn name(&self) -> &'static str {
        "jvm"
    }

    fn memo(&mut self) -> &mut FingerprintMemo {
        &mut self.memo
    }

    fn compute_fingerprint<T: BuildTarget>(
        &mut self,
        target: &T,
        transitive: bool,
    ) -> Result<Option<String>> {
        let base = default_fingerprint(self, target, transitive)?;
        if !target.is_platform_sensitive() {
            return Ok(base);
        }

        Ok(base.map(|fingerprint| {
            let mut hasher = blake3::Hasher::new();
            hasher.update(fingerprint.as_bytes());
            hasher.update(self.platform_hash.as_bytes());
            hasher.finalize().to_hex().to_string()
        }))
    }
}
