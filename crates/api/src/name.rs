//! Names and name components.

use crate::{tlv, PsError, PsResult, Timestamp};
use bytes::{Bytes, BytesMut};

/// A single opaque name component.
///
/// Components carry arbitrary bytes. Printable components display as text,
/// anything else renders as url-safe base64.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Component(pub Bytes);

impl Component {
    /// Construct a component from raw bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Construct a component carrying a millisecond timestamp.
    pub fn from_timestamp(timestamp: Timestamp) -> Self {
        Self(tlv::nonneg_bytes(timestamp.as_millis() as u64))
    }

    /// Decode this component as a millisecond timestamp.
    pub fn as_timestamp(&self) -> PsResult<Timestamp> {
        Ok(Timestamp::from_millis(tlv::read_nonneg(&self.0)? as i64))
    }

    /// The raw component value.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Component {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<Bytes> for Component {
    fn from(b: Bytes) -> Self {
        Self(b)
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let printable = !self.0.is_empty()
            && self
                .0
                .iter()
                .all(|b| b.is_ascii_graphic() && *b != b'/' || *b == b' ');
        if printable {
            f.write_str(&String::from_utf8_lossy(&self.0))
        } else {
            use base64::prelude::*;
            f.write_str(&BASE64_URL_SAFE_NO_PAD.encode(&self.0))
        }
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

/// An ordered sequence of [Component]s.
///
/// Names order and compare component-by-component (shorter prefixes sort
/// first), which is what the subscription table relies on.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    /// Construct an empty name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a name from a component list.
    pub fn from_components(components: Vec<Component>) -> Self {
        Self { components }
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True when the name has no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component at `i`, if present.
    pub fn get(&self, i: usize) -> Option<&Component> {
        self.components.get(i)
    }

    /// The final component, if any.
    pub fn last(&self) -> Option<&Component> {
        self.components.last()
    }

    /// Append a component in place.
    pub fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    /// A copy of this name with one more component.
    pub fn child(&self, component: Component) -> Name {
        let mut out = self.clone();
        out.push(component);
        out
    }

    /// Append a millisecond timestamp component in place.
    pub fn push_timestamp(&mut self, timestamp: Timestamp) {
        self.push(Component::from_timestamp(timestamp));
    }

    /// The first `n` components as a new name.
    ///
    /// `n` is clamped to the name length.
    pub fn prefix(&self, n: usize) -> Name {
        Name {
            components: self.components[..n.min(self.components.len())]
                .to_vec(),
        }
    }

    /// `n` components starting at `i`, clamped to the name bounds.
    pub fn subname(&self, i: usize, n: usize) -> Name {
        let start = i.min(self.components.len());
        let end = (start + n).min(self.components.len());
        Name {
            components: self.components[start..end].to_vec(),
        }
    }

    /// True when every component of `self` prefixes `other`.
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    /// Iterate over the components.
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    /// Encode as a Name TLV.
    pub fn encode(&self) -> Bytes {
        let mut inner = BytesMut::new();
        for c in &self.components {
            tlv::write_tlv(&mut inner, tlv::COMPONENT, &c.0);
        }
        let mut out = BytesMut::new();
        tlv::write_tlv(&mut out, tlv::NAME, &inner);
        out.freeze()
    }

    /// Append this name's TLV encoding to an existing buffer.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        let mut inner = BytesMut::new();
        for c in &self.components {
            tlv::write_tlv(&mut inner, tlv::COMPONENT, &c.0);
        }
        tlv::write_tlv(buf, tlv::NAME, &inner);
    }

    /// Decode a Name TLV value (the bytes inside the outer TLV).
    pub fn decode_value(mut value: Bytes) -> PsResult<Name> {
        let mut components = Vec::new();
        while !value.is_empty() {
            let (ty, v) = tlv::read_tlv(&mut value)?;
            if ty != tlv::COMPONENT {
                return Err(PsError::decode(format!(
                    "unexpected TLV type {} inside Name",
                    ty
                )));
            }
            components.push(Component(v));
        }
        Ok(Name { components })
    }

    /// Decode a full Name TLV.
    pub fn decode(mut bytes: Bytes) -> PsResult<Name> {
        let (ty, value) = tlv::read_tlv(&mut bytes)?;
        if ty != tlv::NAME {
            return Err(PsError::decode(format!(
                "expected Name TLV, found type {}",
                ty
            )));
        }
        Self::decode_value(value)
    }
}

impl std::str::FromStr for Name {
    type Err = PsError;

    /// Parse a `/`-separated textual name such as `/probe/local/cpu`.
    fn from_str(s: &str) -> PsResult<Name> {
        let trimmed = s.strip_prefix('/').unwrap_or(s);
        if trimmed.is_empty() {
            return Ok(Name::new());
        }
        Ok(Name {
            components: trimmed.split('/').map(Component::from).collect(),
        })
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for c in &self.components {
            write!(f, "/{}", c)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("/a/b/c", name("/a/b/c").to_string());
        assert_eq!("/", Name::new().to_string());
        assert_eq!(3, name("/a/b/c").len());
    }

    #[test]
    fn prefix_and_subname() {
        let n = name("/a/b/c/d");
        assert_eq!(name("/a/b"), n.prefix(2));
        assert_eq!(n, n.prefix(10));
        assert_eq!(name("/b/c"), n.subname(1, 2));
        assert_eq!(name("/d"), n.subname(3, 5));
    }

    #[test]
    fn prefix_test() {
        assert!(name("/a/b").is_prefix_of(&name("/a/b/c")));
        assert!(name("/a/b").is_prefix_of(&name("/a/b")));
        assert!(!name("/a/b").is_prefix_of(&name("/a")));
        assert!(!name("/a/x").is_prefix_of(&name("/a/b/c")));
        assert!(Name::new().is_prefix_of(&name("/a")));
    }

    #[test]
    fn ordering_puts_prefixes_first() {
        assert!(name("/a") < name("/a/b"));
        assert!(name("/a/b") < name("/a/c"));
    }

    #[test]
    fn tlv_round_trip() {
        let n = name("/sync/demo/x");
        assert_eq!(n, Name::decode(n.encode()).unwrap());

        let empty = Name::new();
        assert_eq!(empty, Name::decode(empty.encode()).unwrap());
    }

    #[test]
    fn timestamp_component_round_trip() {
        let mut n = name("/a");
        let ts = Timestamp::from_millis(1_700_000_000_123);
        n.push_timestamp(ts);
        assert_eq!(ts, n.last().unwrap().as_timestamp().unwrap());
    }

    #[test]
    fn decode_rejects_foreign_inner_type() {
        let mut inner = BytesMut::new();
        tlv::write_tlv(&mut inner, tlv::CONTENT, b"zz");
        let mut out = BytesMut::new();
        tlv::write_tlv(&mut out, tlv::NAME, &inner);
        assert!(Name::decode(out.freeze()).is_err());
    }
}
