//! Content fingerprinting for build targets
//!
//! Fields hash their own content, payloads aggregate named fields, and
//! strategies fold in a target's dependency closure. Every digest is Blake3,
//! rendered as lowercase hex; it is part of the on-disk and remote address
//! format, so changing it invalidates every existing cache entry.

mod error;
mod field;
pub mod hash;
mod payload;
mod strategy;

pub use error::{FingerprintError, Result};
pub use field::{
    Bundle, BundleField, Field, FieldContent, JsonField, PrimitiveField, SourcesField,
    StringListField,
};
pub use payload::Payload;
pub use strategy::{
    default_fingerprint, BuildTarget, DefaultFingerprintStrategy, FingerprintMemo,
    FingerprintStrategy, JvmFingerprintStrategy,
};
