//! The document tree node and its per-key attributes.

use cfgldr_source_map::{Origin, Provenance};
use thiserror::Error;
use tracing::trace;

use crate::ordered::OrderedMap;
use crate::plain::{PlainMap, PlainValue};
use crate::template::Template;

/// A value stored under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A fully evaluated scalar
    Text(String),
    /// A scalar with references still to be evaluated; only exists while parsing
    Template(Template),
    /// A nested section
    Section(Section),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_section(&self) -> Option<&Section> {
        match self {
            Value::Section(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_section(&self) -> bool {
        matches!(self, Value::Section(_))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Section> for Value {
    fn from(s: Section) -> Self {
        Value::Section(s)
    }
}

/// Attributes kept for every key of a section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyAttrs {
    /// `^key`: in a schema, the rule must match some configuration key
    pub mandatory: bool,
    /// `!key`: can never be overwritten
    pub finalized: bool,
    /// `~key`: dropped from the tree once parsing completes
    pub temporary: bool,
    /// Overwrite permission granted by `@inherit`; cleared by every write
    pub writable: bool,
    /// Every definition of the key, oldest first
    pub provenance: Provenance,
}

impl KeyAttrs {
    /// Effective write protection: `finalized`, then `temporary`, then `writable`.
    pub fn is_protected(&self) -> bool {
        if self.finalized {
            return true;
        }
        if self.temporary {
            return false;
        }
        !self.writable
    }

    /// Take the flags of `other` and append its history to ours.
    pub(crate) fn overlay(&mut self, other: &KeyAttrs) {
        self.mandatory = other.mandatory;
        self.finalized = other.finalized;
        self.temporary = other.temporary;
        self.writable = other.writable;
        self.provenance.extend(&other.provenance);
    }
}

/// A key's value together with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub value: Value,
    pub attrs: KeyAttrs,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SectionError {
    #[error("Key({key}) is NOT writable")]
    KeyNotWritable { key: String },

    #[error("Section({key}) is not writable")]
    SectionNotWritable { key: String },
}

/// An ordered set of keys, each holding text or a nested section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    name: Option<String>,
    entries: OrderedMap<Entry>,
}

impl Section {
    /// The anonymous root section of a document.
    pub fn root() -> Self {
        Section::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Section {
            name: Some(name.into()),
            entries: OrderedMap::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), &e.value))
    }

    pub fn entries(&self) -> &OrderedMap<Entry> {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_text)
    }

    pub fn get_section(&self, key: &str) -> Option<&Section> {
        self.get(key).and_then(Value::as_section)
    }

    pub fn get_section_mut(&mut self, key: &str) -> Option<&mut Section> {
        match self.entries.get_mut(key) {
            Some(Entry {
                value: Value::Section(s),
                ..
            }) => Some(s),
            _ => None,
        }
    }

    pub fn attrs(&self, key: &str) -> Option<&KeyAttrs> {
        self.entries.get(key).map(|e| &e.attrs)
    }

    pub fn attrs_mut(&mut self, key: &str) -> Option<&mut KeyAttrs> {
        self.entries.get_mut(key).map(|e| &mut e.attrs)
    }

    pub fn is_section(&self, key: &str) -> bool {
        self.get(key).is_some_and(Value::is_section)
    }

    /// Whether writing `key` would be refused. Absent keys are never protected.
    pub fn is_protected(&self, key: &str) -> bool {
        self.attrs(key).is_some_and(KeyAttrs::is_protected)
    }

    /// Walk nested sections along `path`.
    pub fn lookup(&self, path: &[String]) -> Option<&Value> {
        let (last, parents) = path.split_last()?;
        let mut section = self;
        for name in parents {
            section = section.get_section(name)?;
        }
        section.get(last)
    }

    /// Attributes of the key at `path`.
    pub fn lookup_attrs(&self, path: &[String]) -> Option<&KeyAttrs> {
        let (last, parents) = path.split_last()?;
        self.section_at(parents)?.attrs(last)
    }

    /// The section at `path`; the empty path is `self`.
    pub fn section_at(&self, path: &[String]) -> Option<&Section> {
        path.iter().try_fold(self, |s, name| s.get_section(name))
    }

    pub fn section_at_mut(&mut self, path: &[String]) -> Option<&mut Section> {
        let mut section = self;
        for name in path {
            section = section.get_section_mut(name)?;
        }
        Some(section)
    }

    /// Write a key, subject to write protection.
    ///
    /// The key keeps its position if it already exists. All flags are reset
    /// (so the key is read-only again) while the definition history is kept;
    /// callers record the new definition through the returned attributes.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<&mut KeyAttrs, SectionError> {
        let key = key.into();
        if self.is_protected(&key) {
            return Err(SectionError::KeyNotWritable { key });
        }
        trace!(section = ?self.name, key = %key, "set");
        let value = value.into();
        let entry = self.entries.get_or_insert_with(key, || Entry {
            value: Value::Text(String::new()),
            attrs: KeyAttrs::default(),
        });
        entry.value = value;
        let attrs = &mut entry.attrs;
        attrs.mandatory = false;
        attrs.finalized = false;
        attrs.temporary = false;
        attrs.writable = false;
        Ok(attrs)
    }

    /// [`Section::set`] followed by recording `origin` in the key's history.
    pub fn set_at(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
        origin: Origin,
    ) -> Result<&mut KeyAttrs, SectionError> {
        let attrs = self.set(key, value)?;
        attrs.provenance.push(origin);
        Ok(attrs)
    }

    /// Replace a value without touching its attributes.
    pub(crate) fn replace_value(&mut self, key: &str, value: Value) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.value = value;
        }
    }

    pub(crate) fn entry_mut(&mut self, key: &str) -> Option<&mut Entry> {
        self.entries.get_mut(key)
    }

    pub(crate) fn insert_entry(&mut self, key: &str, entry: Entry) {
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key).map(|e| e.value)
    }

    /// Grant overwrite permission to one key, or to every key when `key` is
    /// `None`. With `recursive`, keys of nested sections are opened as well.
    pub fn set_writable(&mut self, key: Option<&str>, recursive: bool) {
        self.set_writable_flag(key, recursive, true);
    }

    /// Revoke overwrite permission, with the same selection as [`Section::set_writable`].
    pub fn set_readonly(&mut self, key: Option<&str>, recursive: bool) {
        self.set_writable_flag(key, recursive, false);
    }

    fn set_writable_flag(&mut self, key: Option<&str>, recursive: bool, writable: bool) {
        for (name, entry) in self.entries.iter_mut() {
            if key.is_some_and(|k| k != name) {
                continue;
            }
            if recursive && let Value::Section(sub) = &mut entry.value {
                sub.set_writable_flag(None, true, writable);
            }
            entry.attrs.writable = writable;
        }
    }

    /// Drop temporary keys, optionally in nested sections too.
    pub fn clear_temporary(&mut self, recursive: bool) {
        self.entries.retain(|key, entry| {
            if recursive && let Value::Section(sub) = &mut entry.value {
                sub.clear_temporary(true);
            }
            if entry.attrs.temporary {
                trace!(key = %key, "dropping temporary key");
                return false;
            }
            true
        });
    }

    /// Flatten to nested plain maps of strings.
    ///
    /// Unevaluated templates are rendered in their source form.
    pub fn to_plain_mapping(&self) -> PlainMap {
        self.entries
            .iter()
            .map(|(k, e)| {
                let v = match &e.value {
                    Value::Text(s) => PlainValue::Text(s.clone()),
                    Value::Template(t) => PlainValue::Text(t.to_string()),
                    Value::Section(s) => PlainValue::Map(s.to_plain_mapping()),
                };
                (k.clone(), v)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgldr_source_map::SourcePos;

    fn origin(file: &str) -> Origin {
        Origin::new(vec![SourcePos::file(file)], Default::default())
    }

    #[test]
    fn test_protection_priority() {
        let mut attrs = KeyAttrs::default();
        assert!(attrs.is_protected());

        attrs.writable = true;
        assert!(!attrs.is_protected());

        attrs.writable = false;
        attrs.temporary = true;
        assert!(!attrs.is_protected());

        attrs.finalized = true;
        assert!(attrs.is_protected());
        attrs.writable = true;
        assert!(attrs.is_protected());
    }

    #[test]
    fn test_set_makes_key_read_only() {
        let mut s = Section::root();
        s.set("a", "1").unwrap();
        assert!(s.is_protected("a"));

        let err = s.set("a", "2").unwrap_err();
        assert_eq!(
            err,
            SectionError::KeyNotWritable {
                key: "a".to_string()
            }
        );
        assert_eq!(s.get_text("a"), Some("1"));

        s.set_writable(Some("a"), false);
        s.set("a", "2").unwrap();
        assert_eq!(s.get_text("a"), Some("2"));
        assert!(s.is_protected("a"));
    }

    #[test]
    fn test_set_resets_flags_and_keeps_history() {
        let mut s = Section::root();
        let attrs = s.set_at("k", "v", origin("a.conf")).unwrap();
        attrs.temporary = true;
        attrs.mandatory = true;

        let attrs = s.set_at("k", "w", origin("b.conf")).unwrap();
        assert!(!attrs.temporary);
        assert!(!attrs.mandatory);
        assert!(!attrs.writable);
        assert_eq!(attrs.provenance.origins().len(), 2);
    }

    #[test]
    fn test_final_key_cannot_be_reopened() {
        let mut s = Section::root();
        s.set("k", "v").unwrap().finalized = true;
        s.set_writable(None, true);
        assert!(s.set("k", "w").is_err());
    }

    #[test]
    fn test_clear_temporary_recursive() {
        let mut inner = Section::named("inner");
        inner.set("keep", "1").unwrap();
        inner.set("tmp", "2").unwrap().temporary = true;

        let mut root = Section::root();
        root.set("t", "x").unwrap().temporary = true;
        root.set("inner", inner).unwrap();
        root.set("z", "y").unwrap();

        let mut shallow = root.clone();
        shallow.clear_temporary(false);
        assert_eq!(shallow.keys().collect::<Vec<_>>(), ["inner", "z"]);
        assert!(shallow.get_section("inner").unwrap().contains_key("tmp"));

        root.clear_temporary(true);
        assert_eq!(root.keys().collect::<Vec<_>>(), ["inner", "z"]);
        assert_eq!(
            root.get_section("inner").unwrap().keys().collect::<Vec<_>>(),
            ["keep"]
        );
    }

    #[test]
    fn test_set_writable_recursive() {
        let mut inner = Section::named("inner");
        inner.set("a", "1").unwrap();
        let mut root = Section::root();
        root.set("inner", inner).unwrap();
        root.set("b", "2").unwrap();

        root.set_writable(None, false);
        assert!(!root.is_protected("inner"));
        assert!(root.get_section("inner").unwrap().is_protected("a"));

        root.set_writable(None, true);
        assert!(!root.get_section("inner").unwrap().is_protected("a"));

        root.set_readonly(Some("inner"), true);
        assert!(root.is_protected("inner"));
        assert!(!root.is_protected("b"));
        assert!(root.get_section("inner").unwrap().is_protected("a"));
    }

    #[test]
    fn test_lookup_paths() {
        let mut tls = Section::named("tls");
        tls.set("cert", "c.pem").unwrap();
        let mut server = Section::named("server");
        server.set("tls", tls).unwrap();
        let mut root = Section::root();
        root.set("server", server).unwrap();

        let path = |p: &[&str]| p.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(
            root.lookup(&path(&["server", "tls", "cert"])),
            Some(&Value::from("c.pem"))
        );
        assert!(root.lookup(&path(&["server", "nope"])).is_none());
        assert!(root.lookup(&path(&["server", "tls", "cert", "x"])).is_none());
        assert!(root.lookup(&[]).is_none());
        assert_eq!(
            root.section_at(&path(&["server"])).and_then(Section::name),
            Some("server")
        );
        assert!(root.lookup_attrs(&path(&["server", "tls"])).is_some());

        root.section_at_mut(&path(&["server", "tls"]))
            .unwrap()
            .set("key", "k.pem")
            .unwrap();
        assert_eq!(
            root.lookup(&path(&["server", "tls", "key"])),
            Some(&Value::from("k.pem"))
        );
    }

    #[test]
    fn test_to_plain_mapping_keeps_order() {
        let mut sub = Section::named("sub");
        sub.set("y", "2").unwrap();
        let mut root = Section::root();
        root.set("z", "1").unwrap();
        root.set("sub", sub).unwrap();
        root.set("a", "3").unwrap();

        let json = serde_json::to_string(&root.to_plain_mapping()).unwrap();
        insta::assert_snapshot!(json, @r#"{"z":"1","sub":{"y":"2"},"a":"3"}"#);
    }
}
