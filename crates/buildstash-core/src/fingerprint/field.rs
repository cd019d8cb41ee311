use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Serialize;

use super::hash::{combine_hashes, hash_bytes, update_framed, update_with_file};
use super::Result;

/// Content that knows how to fingerprint itself
///
/// Implementations must be pure functions of their immutable state (plus the
/// bytes of any files they reference).
pub trait FieldContent: fmt::Debug + Send + Sync {
    fn compute_fingerprint(&self) -> Result<String>;
}

/// An immutable payload field with a memoized fingerprint
///
/// Two fields are equal when their fingerprints are equal, regardless of the
/// kind of content behind them.
pub struct Field {
    content: Box<dyn FieldContent>,
    memo: OnceLock<String>,
}

impl Field {
    pub fn new(content: impl FieldContent + 'static) -> Self {
        Self {
            content: Box::new(content),
            memo: OnceLock::new(),
        }
    }

    /// Shorthand for a [`PrimitiveField`]
    pub fn primitive(value: impl Into<String>) -> Self {
        Self::new(PrimitiveField::new(value))
    }

    /// Fingerprint of this field, computed on first call
    pub fn fingerprint(&self) -> Result<&str> {
        if let Some(fingerprint) = self.memo.get() {
            return Ok(fingerprint);
        }
        let computed = self.content.compute_fingerprint()?;
        Ok(self.memo.get_or_init(|| computed))
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("content", &self.content)
            .field("fingerprint", &self.memo.get())
            .finish()
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint().ok() == other.fingerprint().ok()
    }
}

impl Eq for Field {}

impl Hash for Field {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint().ok().hash(state);
    }
}

impl<C: FieldContent + 'static> From<C> for Field {
    fn from(content: C) -> Self {
        Field::new(content)
    }
}

/// A single string value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveField {
    value: String,
}

impl PrimitiveField {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl FieldContent for PrimitiveField {
    fn compute_fingerprint(&self) -> Result<String> {
        Ok(hash_bytes(self.value.as_bytes()))
    }
}

/// Any JSON-serializable value, hashed through its canonical JSON form
///
/// Object keys are sorted, so two maps with the same entries always
/// fingerprint identically.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonField {
    value: serde_json::Value,
}

impl JsonField {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            value: serde_json::to_value(value)?,
        })
    }
}

impl FieldContent for JsonField {
    fn compute_fingerprint(&self) -> Result<String> {
        let canonical = serde_json::to_string(&self.value)?;
        Ok(hash_bytes(canonical.as_bytes()))
    }
}

/// Source files declared relative to a directory under the build root
///
/// The fingerprint covers every file's path and current bytes, so editing any
/// source changes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcesField {
    build_root: PathBuf,
    rel_path: String,
    sources: Vec<String>,
}

impl SourcesField {
    pub fn new(
        build_root: impl Into<PathBuf>,
        rel_path: impl Into<String>,
        sources: Vec<String>,
    ) -> Self {
        Self {
            build_root: build_root.into(),
            rel_path: rel_path.into(),
            sources,
        }
    }

    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn has_sources(&self, extension: &str) -> bool {
        self.sources.iter().any(|source| source.ends_with(extension))
    }

    /// Source paths joined onto the relative directory
    pub fn relative_to_build_root(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|source| join_rel(&self.rel_path, source))
            .collect()
    }
}

impl FieldContent for SourcesField {
    fn compute_fingerprint(&self) -> Result<String> {
        let mut hasher = blake3::Hasher::new();
        update_framed(&mut hasher, self.rel_path.as_bytes());

        let mut sources = self.relative_to_build_root();
        sources.sort();
        for source in &sources {
            update_framed(&mut hasher, source.as_bytes());
            update_with_file(&mut hasher, &self.build_root.join(source))?;
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}

/// An unordered collection of strings (excludes, configurations, jar ids)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringListField {
    values: Vec<String>,
}

impl StringListField {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

impl FieldContent for StringListField {
    fn compute_fingerprint(&self) -> Result<String> {
        Ok(combine_hashes(
            self.values.iter().map(|value| hash_bytes(value.as_bytes())),
        ))
    }
}

/// A set of file bundles, each mapping files on disk to a destination name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleField {
    build_root: PathBuf,
    bundles: Vec<Bundle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub rel_path: String,
    /// Absolute source path -> destination inside the bundle
    pub filemap: BTreeMap<PathBuf, String>,
}

impl BundleField {
    pub fn new(build_root: impl Into<PathBuf>, bundles: Vec<Bundle>) -> Self {
        Self {
            build_root: build_root.into(),
            bundles,
        }
    }

    fn hash_bundle(&self, bundle: &Bundle) -> Result<String> {
        let mut hasher = blake3::Hasher::new();
        update_framed(&mut hasher, bundle.rel_path.as_bytes());
        // BTreeMap iterates in sorted path order
        for (abs_path, destination) in &bundle.filemap {
            let relative = abs_path.strip_prefix(&self.build_root).unwrap_or(abs_path);
            update_framed(&mut hasher, relative.to_string_lossy().as_bytes());
            update_framed(&mut hasher, destination.as_bytes());
            update_with_file(&mut hasher, abs_path)?;
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}

impl FieldContent for BundleField {
    fn compute_fingerprint(&self) -> Result<String> {
        let hashes = self
            .bundles
            .iter()
            .map(|bundle| self.hash_bundle(bundle))
            .collect::<Result<Vec<_>>>()?;
        Ok(combine_hashes(hashes))
    }
}

fn join_rel(rel_path: &str, source: &str) -> String {
    if rel_path.is_empty() {
        source.to_string()
    } else {
        Path::new(rel_path).join(source).to_string_lossy().into_owned()
    }
}
