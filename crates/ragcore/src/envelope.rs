use crate::Value;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The accumulating key/value structure threaded from node to node.
///
/// Keys keep their insertion order, so a persisted envelope reads in the
/// order the pipeline produced its fields. Re-inserting an existing key
/// replaces the value in place without moving it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    entries: Vec<(String, Value)>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field. Existing keys keep their position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Convenience accessor for string-typed fields.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl FromIterator<(String, Value)> for Envelope {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut envelope = Envelope::new();
        for (key, value) in iter {
            envelope.insert(key, value);
        }
        envelope
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct EnvelopeVisitor;

impl<'de> Visitor<'de> for EnvelopeVisitor {
    type Value = Envelope;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of envelope fields")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Envelope, A::Error> {
        let mut envelope = Envelope::new();
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            envelope.insert(key, value);
        }
        Ok(envelope)
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(EnvelopeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let mut envelope = Envelope::new();
        envelope.insert("message", "hi");
        envelope.insert("intent", "question");
        envelope.insert("route", "retrieval");

        let keys: Vec<&str> = envelope.keys().collect();
        assert_eq!(keys, vec!["message", "intent", "route"]);
    }

    #[test]
    fn reinsert_replaces_in_place() {
        let mut envelope = Envelope::new();
        envelope.insert("message", "original");
        envelope.insert("length", 8i64);
        envelope.insert("message", "truncated");

        let keys: Vec<&str> = envelope.keys().collect();
        assert_eq!(keys, vec!["message", "length"]);
        assert_eq!(envelope.get_str("message"), Some("truncated"));
    }

    #[test]
    fn serializes_as_plain_json_object() {
        let mut envelope = Envelope::new();
        envelope.insert("message", "hi");
        envelope.insert("length", 2i64);

        let json = serde_json::to_string(&envelope).unwrap();
        assert_eq!(json, r#"{"message":"hi","length":2.0}"#);

        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get_str("message"), Some("hi"));
    }
}
