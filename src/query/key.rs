use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar parameter inside a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyParam {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for KeyParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<bool> for KeyParam {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for KeyParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for KeyParam {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for KeyParam {
    fn from(value: u64) -> Self {
        // Ids above i64::MAX do not occur; keep them distinct instead of wrapping.
        i64::try_from(value).map_or_else(|_| Self::Str(value.to_string()), Self::Int)
    }
}

impl From<&str> for KeyParam {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for KeyParam {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Identity of a cached resource: a resource name plus its parameters.
///
/// Parameters are kept sorted, so keys built in a different order compare, hash and
/// serialize identically. Two keys are equal only when every parameter is equal:
/// `comments{listing_id=1}` and `comments{listing_id=2}` never share an entry.
///
/// ```
/// use avitolog::query::QueryKey;
///
/// let a = QueryKey::new("listings").with("limit", 20_u32);
/// let b = QueryKey::new("listings").with("limit", 20_u32);
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "listings{limit=20}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey {
    resource: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, KeyParam>,
}

impl QueryKey {
    /// A key with no parameters.
    #[must_use]
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            params: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) a parameter.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<KeyParam>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, KeyParam> {
        &self.params
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&KeyParam> {
        self.params.get(name)
    }

    /// Returns `true` if `self` has the same resource and contains every parameter of
    /// `prefix` with an equal value.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.resource == prefix.resource
            && prefix
                .params
                .iter()
                .all(|(name, value)| self.params.get(name) == Some(value))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource)?;
        if self.params.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("}")
    }
}

/// Selects cache entries for invalidation or reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
    /// Exactly this key.
    Exact(QueryKey),
    /// Every key of a resource, whatever its parameters.
    Resource(String),
    /// Keys of the same resource containing all of the given parameters.
    Prefix(QueryKey),
}

impl QueryFilter {
    /// Every key of `resource`.
    #[must_use]
    pub fn resource(resource: impl Into<String>) -> Self {
        Self::Resource(resource.into())
    }

    #[must_use]
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Self::Exact(exact) => exact == key,
            Self::Resource(resource) => key.resource == *resource,
            Self::Prefix(prefix) => key.starts_with(prefix),
        }
    }
}

impl From<QueryKey> for QueryFilter {
    fn from(key: QueryKey) -> Self {
        Self::Exact(key)
    }
}

impl fmt::Display for QueryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(key) => write!(f, "{key}"),
            Self::Resource(resource) => write!(f, "{resource}{{*}}"),
            Self::Prefix(key) => write!(f, "{key}*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(key: &QueryKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_parameter_order_does_not_matter() {
        let a = QueryKey::new("search").with("q", "bike").with("limit", 5_u32);
        let b = QueryKey::new("search").with("limit", 5_u32).with("q", "bike");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_eq!(
            serde_json::to_string(&a).expect("serialize"),
            serde_json::to_string(&b).expect("serialize")
        );
    }

    #[test]
    fn test_keys_differ_by_any_parameter() {
        let one = QueryKey::new("comments").with("listing_id", 1_u64);
        let two = QueryKey::new("comments").with("listing_id", 2_u64);
        assert_ne!(one, two);
        assert_ne!(QueryKey::new("comments"), one);
        assert_ne!(
            QueryKey::new("listing").with("id", 1_u64),
            QueryKey::new("comments").with("id", 1_u64)
        );
    }

    #[test]
    fn test_int_and_string_params_are_distinct() {
        let int = QueryKey::new("listing").with("id", 1_u64);
        let string = QueryKey::new("listing").with("id", "1");
        assert_ne!(int, string);
    }

    #[test]
    fn test_display() {
        assert_eq!(QueryKey::new("me").to_string(), "me");
        assert_eq!(
            QueryKey::new("comments")
                .with("listing_id", 42_u64)
                .to_string(),
            "comments{listing_id=42}"
        );
        assert_eq!(
            QueryKey::new("search").with("q", "bike").to_string(),
            r#"search{q="bike"}"#
        );
    }

    #[test]
    fn test_serde_round_trip_shape() {
        let key = QueryKey::new("comments").with("listing_id", 42_u64);
        let json = serde_json::to_value(&key).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"resource": "comments", "params": {"listing_id": 42}})
        );
        let back: QueryKey = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, key);
    }

    #[test]
    fn test_filters() {
        let x = QueryKey::new("comments").with("listing_id", 1_u64);
        let y = QueryKey::new("comments").with("listing_id", 2_u64);
        let listing = QueryKey::new("listing").with("id", 1_u64);

        let exact = QueryFilter::from(x.clone());
        assert!(exact.matches(&x));
        assert!(!exact.matches(&y));

        let resource = QueryFilter::resource("comments");
        assert!(resource.matches(&x));
        assert!(resource.matches(&y));
        assert!(!resource.matches(&listing));

        let prefix = QueryFilter::Prefix(QueryKey::new("comments"));
        assert!(prefix.matches(&x));
        assert!(prefix.matches(&y));
        let narrow = QueryFilter::Prefix(x.clone());
        assert!(narrow.matches(&x));
        assert!(!narrow.matches(&y));
    }
}
