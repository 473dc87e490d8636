//! Case-insensitive, insertion-ordered input mapping

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Mapping of input name to value.
///
/// Names compare ASCII case-insensitively. The casing of the first insertion
/// is kept, later insertions only replace the value. Iteration follows
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputMap {
    entries: Vec<(String, String)>,
}

impl InputMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(name, _)| name.eq_ignore_ascii_case(key))
    }

    /// Insert or replace a value, returning the previous one
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|index| self.entries[index].1.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.position(key).map(|index| self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Produce a new map with every value transformed
    pub fn map_values<F>(self, mut f: F) -> Self
    where
        F: FnMut(&str, &str) -> String,
    {
        let entries = self
            .entries
            .into_iter()
            .map(|(name, value)| {
                let mapped = f(&name, &value);
                (name, mapped)
            })
            .collect();
        Self { entries }
    }

    /// Produce a new map where `other` wins on key collision
    pub fn overlay(mut self, other: &InputMap) -> Self {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
        self
    }
}

impl<K, V> FromIterator<(K, V)> for InputMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = InputMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl IntoIterator for InputMap {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for InputMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for InputMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct InputMapVisitor;

        impl<'de> Visitor<'de> for InputMapVisitor {
            type Value = InputMap;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of input names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<InputMap, A::Error> {
                let mut map = InputMap::new();
                while let Some((key, value)) = access.next_entry::<String, Option<String>>()? {
                    map.insert(key, value.unwrap_or_default());
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(InputMapVisitor)
    }
}
