use std::{cmp::Ordering, fmt};

use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

/// A route identifier.
///
/// The client accepts both integer and string ids. Ids are stored as strings; an id that is
/// the canonical decimal form of an unsigned integer is serialized as a JSON number, anything
/// else as a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteId(String);

impl RouteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric value of this id, if it is a canonical unsigned integer.
    pub fn as_number(&self) -> Option<u64> {
        let n: u64 = self.0.parse().ok()?;
        (n.to_string() == self.0).then_some(n)
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for RouteId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for RouteId {
    fn from(id: &str) -> Self {
        Self(id.trim().to_owned())
    }
}

impl From<String> for RouteId {
    fn from(id: String) -> Self {
        Self::from(id.as_str())
    }
}

// Numeric ids first, in numeric order, then everything else lexicographically.
impl Ord for RouteId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for RouteId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for RouteId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_number() {
            Some(n) => serializer.serialize_u64(n),
            None => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for RouteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RouteIdVisitor)
    }
}

struct RouteIdVisitor;

impl Visitor<'_> for RouteIdVisitor {
    type Value = RouteId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-empty string or an integer route id")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(RouteId::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(RouteId::from)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let id = RouteId::from(v);
        if id.0.is_empty() {
            return Err(E::invalid_value(de::Unexpected::Str(v), &self));
        }

        Ok(id)
    }
}
