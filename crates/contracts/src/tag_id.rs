//! TagId - shared EPC identifier
//!
//! Tag ids arrive on every event but only two distinct values matter per run,
//! so the string is interned once behind an `Arc<str>`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// EPC identifier of a detected tag.
///
/// ```
/// use contracts::TagId;
///
/// let id: TagId = "E2801160600002".into();
/// assert_eq!(id, "E2801160600002");
/// assert_eq!(id.clone().as_str(), id.as_str());
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(Arc<str>);

impl TagId {
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when both ids share the same allocation.
    #[inline]
    pub fn same_allocation(&self, other: &TagId) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for TagId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TagId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TagId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TagId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagId({:?})", &*self.0)
    }
}

impl PartialEq<str> for TagId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for TagId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl Serialize for TagId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TagId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn clone_shares_allocation() {
        let a: TagId = "tag-a".into();
        let b = a.clone();
        assert!(a.same_allocation(&b));
        assert!(!a.same_allocation(&TagId::new("tag-a")));
        assert_eq!(a, TagId::new("tag-a"));
    }

    #[test]
    fn btree_lookup_by_str() {
        let mut map: BTreeMap<TagId, u32> = BTreeMap::new();
        map.insert("b".into(), 2);
        map.insert("a".into(), 1);
        assert_eq!(map.get("a"), Some(&1));
        assert_eq!(map.keys().next().map(TagId::as_str), Some("a"));
    }

    #[test]
    fn serde_as_plain_string() {
        let id: TagId = "E200".into();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"E200\"");
        let back: TagId = serde_json::from_str("\"E200\"").unwrap();
        assert_eq!(back, id);
    }
}
