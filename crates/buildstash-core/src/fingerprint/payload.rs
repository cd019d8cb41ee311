use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::hash::update_framed;
use super::{Field, FingerprintError, Result};

/// Named fields belonging to one build target
///
/// The fingerprint is taken over field names in ascending order, so it does
/// not depend on the order fields were added. Taking a fingerprint freezes
/// the payload: once an identity has been handed out it can no longer change.
#[derive(Debug, Default)]
pub struct Payload {
    fields: BTreeMap<String, Field>,
    frozen: bool,
    fingerprint_memo: OnceLock<String>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a payload from `(name, field)` pairs and freeze it
    pub fn frozen<I, K>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Field)>,
        K: Into<String>,
    {
        let mut payload = Self::new();
        payload.add_fields(fields)?;
        payload.freeze();
        Ok(payload)
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen || self.fingerprint_memo.get().is_some()
    }

    pub fn add_fields<I, K>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Field)>,
        K: Into<String>,
    {
        for (key, field) in fields {
            self.add_field(key, field)?;
        }
        Ok(())
    }

    pub fn add_field(&mut self, key: impl Into<String>, field: Field) -> Result<()> {
        let key = key.into();
        if self.fields.contains_key(&key) {
            return Err(FingerprintError::FieldAlreadyDefined { key });
        }
        if self.is_frozen() {
            return Err(FingerprintError::PayloadFrozen { key });
        }
        self.fields.insert(key, field);
        Ok(())
    }

    pub fn get_field(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fingerprint over every field, memoized
    ///
    /// An empty payload has a valid, fixed fingerprint.
    pub fn fingerprint(&self) -> Result<&str> {
        if let Some(fingerprint) = self.fingerprint_memo.get() {
            return Ok(fingerprint);
        }
        let computed = self.compute_fingerprint(self.fields.keys().map(String::as_str))?;
        Ok(self.fingerprint_memo.get_or_init(|| computed))
    }

    /// Fingerprint over a subset of fields
    ///
    /// Names that are not present on the payload are ignored.
    pub fn fingerprint_fields(&self, keys: &[&str]) -> Result<String> {
        let mut keys: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| self.fields.contains_key(*key))
            .collect();
        keys.sort_unstable();
        keys.dedup();
        self.compute_fingerprint(keys.into_iter())
    }

    fn compute_fingerprint<'a>(&'a self, keys: impl Iterator<Item = &'a str>) -> Result<String> {
        let mut hasher = blake3::Hasher::new();
        for key in keys {
            if let Some(field) = self.fields.get(key) {
                update_framed(&mut hasher, key.as_bytes());
                update_framed(&mut hasher, field.fingerprint()?.as_bytes());
            }
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_irrelevant() {
        let ab = Payload::frozen([("a", Field::primitive("x")), ("b", Field::primitive("y"))])
            .unwrap();
        let ba = Payload::frozen([("b", Field::primitive("y")), ("a", Field::primitive("x"))])
            .unwrap();

        assert_eq!(ab.fingerprint().unwrap(), ba.fingerprint().unwrap());
    }

    #[test]
    fn test_field_names_contribute() {
        let a = Payload::frozen([("a", Field::primitive("x"))]).unwrap();
        let b = Payload::frozen([("b", Field::primitive("x"))]).unwrap();

        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn test_empty_payload_is_deterministic() {
        let first = Payload::new();
        let second = Payload::new();

        assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
    }

    #[test]
    fn test_add_to_frozen_payload_fails() {
        let mut payload = Payload::new();
        payload.freeze();

        let err = payload.add_field("a", Field::primitive("x")).unwrap_err();
        assert!(matches!(err, FingerprintError::PayloadFrozen { .. }));
    }

    #[test]
    fn test_duplicate_field_fails_frozen_or_not() {
        let mut payload = Payload::new();
        payload.add_field("a", Field::primitive("x")).unwrap();

        let err = payload.add_field("a", Field::primitive("y")).unwrap_err();
        assert!(matches!(err, FingerprintError::FieldAlreadyDefined { .. }));
        assert_eq!(payload.get_field("a"), Some(&Field::primitive("x")));
        assert_eq!(payload.get_field("b"), None);

        payload.freeze();
        let err = payload.add_field("a", Field::primitive("z")).unwrap_err();
        assert!(matches!(err, FingerprintError::FieldAlreadyDefined { .. }));
    }

    #[test]
    fn test_fingerprint_freezes_payload() {
        let mut payload = Payload::new();
        payload.add_field("a", Field::primitive("x")).unwrap();
        let before = payload.fingerprint().unwrap().to_string();

        assert!(payload.is_frozen());
        assert!(payload.add_field("b", Field::primitive("y")).is_err());
        assert_eq!(payload.fingerprint().unwrap(), before);
    }

    #[test]
    fn test_fingerprint_fields_subset() {
        let full = Payload::frozen([("a", Field::primitive("x")), ("b", Field::primitive("y"))])
            .unwrap();
        let only_a = Payload::frozen([("a", Field::primitive("x"))]).unwrap();

        assert_eq!(
            full.fingerprint_fields(&["a", "missing"]).unwrap(),
            only_a.fingerprint().unwrap()
        );
        assert_eq!(
            full.fingerprint_fields(&["b", "a"]).unwrap(),
            full.fingerprint().unwrap()
        );
    }
}
