use std::collections::BTreeMap;
use std::fmt;

/// A single property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    Float(f32),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PropertyValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Empty text counts as "no value" when merging tag sources.
    pub fn is_empty_text(&self) -> bool {
        matches!(self, PropertyValue::Text(s) if s.is_empty())
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Int(v) => f.write_str(itoa::Buffer::new().format(*v)),
            PropertyValue::Float(v) => f.write_str(ryu::Buffer::new().format(*v)),
            PropertyValue::Bool(v) => f.write_str(if *v { "true" } else { "false" }),
            PropertyValue::Text(s) => f.write_str(s),
            PropertyValue::Bytes(b) => write!(f, "[{} bytes]", b.len()),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(v as i64)
    }
}

impl From<u32> for PropertyValue {
    fn from(v: u32) -> Self {
        PropertyValue::Int(v as i64)
    }
}

impl From<f32> for PropertyValue {
    fn from(v: f32) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(v: Vec<u8>) -> Self {
        PropertyValue::Bytes(v)
    }
}

/// String-keyed property bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    entries: BTreeMap<String, PropertyValue>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Insert unless a non-empty value is already present. Returns whether it was written.
    pub fn insert_if_empty(&mut self, key: &str, value: impl Into<PropertyValue>) -> bool {
        match self.entries.get(key) {
            Some(existing) if !existing.is_empty_text() => false,
            _ => {
                self.entries.insert(key.to_string(), value.into());
                true
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropertyValue::as_text)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(PropertyValue::as_int)
    }

    pub fn get_float(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(PropertyValue::as_float)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(PropertyValue::as_bool)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<'a> IntoIterator for &'a PropertyMap {
    type Item = (&'a String, &'a PropertyValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_if_empty_keeps_existing_values() {
        let mut map = PropertyMap::new();
        map.insert("title", "From v2");
        assert!(!map.insert_if_empty("title", "From v1"));
        assert_eq!(map.get_text("title"), Some("From v2"));
    }

    #[test]
    fn insert_if_empty_replaces_blank_text() {
        let mut map = PropertyMap::new();
        map.insert("album", "");
        assert!(map.insert_if_empty("album", "Filled"));
        assert_eq!(map.get_text("album"), Some("Filled"));
        assert!(map.insert_if_empty("date", "1999"));
    }

    #[test]
    fn display_uses_plain_number_formatting() {
        assert_eq!(PropertyValue::Int(-42).to_string(), "-42");
        assert_eq!(PropertyValue::Float(38.28125).to_string(), "38.28125");
        assert_eq!(PropertyValue::Bool(true).to_string(), "true");
        assert_eq!(PropertyValue::Bytes(vec![1, 2, 3]).to_string(), "[3 bytes]");
    }
}
