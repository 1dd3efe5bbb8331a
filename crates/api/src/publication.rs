//! Publications: immutable signed data objects.

use crate::{tlv, Name, PsError, PsResult, Timestamp};
use bytes::{Bytes, BytesMut};

/// A named, signed object synchronized between peers.
///
/// The last component of a publication name is a millisecond timestamp,
/// appended by the publisher before signing so it is covered by the
/// signature. A publication's identity is the 32-bit digest of its wire
/// encoding; the engine treats publications as immutable once signed and
/// shares them behind `Arc`.
#[derive(Clone, PartialEq, Eq)]
pub struct Publication {
    name: Name,
    freshness_ms: Option<u64>,
    content: Bytes,
    sig_type: u64,
    sig_value: Bytes,
}

impl Publication {
    /// Construct an unsigned publication.
    pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
        Self {
            name,
            freshness_ms: None,
            content: content.into(),
            sig_type: 0,
            sig_value: Bytes::new(),
        }
    }

    /// The publication name.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// The payload.
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// The freshness period in milliseconds, if one was set.
    pub fn freshness_ms(&self) -> Option<u64> {
        self.freshness_ms
    }

    /// Set the freshness period.
    pub fn set_freshness(&mut self, freshness: std::time::Duration) {
        self.freshness_ms = Some(freshness.as_millis() as u64);
    }

    /// The signature type code.
    pub fn sig_type(&self) -> u64 {
        self.sig_type
    }

    /// The signature value.
    pub fn sig_value(&self) -> &Bytes {
        &self.sig_value
    }

    /// True once a signer has filled in the signature.
    pub fn is_signed(&self) -> bool {
        !self.sig_value.is_empty()
    }

    /// Install a signature. Called by [Signer](crate::Signer)
    /// implementations.
    pub fn set_signature(&mut self, sig_type: u64, value: Bytes) {
        self.sig_type = sig_type;
        self.sig_value = value;
    }

    /// The timestamp carried in the final name component.
    pub fn timestamp(&self) -> PsResult<Timestamp> {
        self.name
            .last()
            .ok_or_else(|| PsError::decode("publication with empty name"))?
            .as_timestamp()
    }

    /// The portion of the encoding covered by the signature:
    /// everything from the name through the signature info.
    pub fn signed_portion(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode_signed_portion(&mut buf);
        buf.freeze()
    }

    fn encode_signed_portion(&self, buf: &mut BytesMut) {
        self.name.encode_into(buf);
        if let Some(freshness) = self.freshness_ms {
            let mut meta = BytesMut::new();
            tlv::write_tlv(
                &mut meta,
                tlv::FRESHNESS_PERIOD,
                &tlv::nonneg_bytes(freshness),
            );
            tlv::write_tlv(buf, tlv::META_INFO, &meta);
        }
        tlv::write_tlv(buf, tlv::CONTENT, &self.content);
        let mut sig_info = BytesMut::new();
        tlv::write_tlv(
            &mut sig_info,
            tlv::SIGNATURE_TYPE,
            &tlv::nonneg_bytes(self.sig_type),
        );
        tlv::write_tlv(buf, tlv::SIGNATURE_INFO, &sig_info);
    }

    /// The full Data TLV wire encoding.
    ///
    /// Deterministic: encoding, decoding and re-encoding a publication
    /// yields identical bytes, which is what makes the 32-bit digest a
    /// stable identity across peers.
    pub fn wire_encode(&self) -> Bytes {
        let mut value = BytesMut::new();
        self.encode_signed_portion(&mut value);
        tlv::write_tlv(&mut value, tlv::SIGNATURE_VALUE, &self.sig_value);
        let mut out = BytesMut::new();
        tlv::write_tlv(&mut out, tlv::DATA, &value);
        out.freeze()
    }

    /// Decode a full Data TLV.
    pub fn decode(mut bytes: Bytes) -> PsResult<Publication> {
        let (ty, value) = tlv::read_tlv(&mut bytes)?;
        if ty != tlv::DATA {
            return Err(PsError::decode(format!(
                "expected Data TLV, found type {}",
                ty
            )));
        }
        Self::decode_value(value)
    }

    /// Decode the value of a Data TLV (its inner fields).
    pub fn decode_value(mut value: Bytes) -> PsResult<Publication> {
        let (ty, name_value) = tlv::read_tlv(&mut value)?;
        if ty != tlv::NAME {
            return Err(PsError::decode("Data must start with a Name"));
        }
        let name = Name::decode_value(name_value)?;

        let (mut ty, mut field) = tlv::read_tlv(&mut value)?;
        let mut freshness_ms = None;
        if ty == tlv::META_INFO {
            let mut meta = field;
            while !meta.is_empty() {
                let (mty, mvalue) = tlv::read_tlv(&mut meta)?;
                if mty == tlv::FRESHNESS_PERIOD {
                    freshness_ms = Some(tlv::read_nonneg(&mvalue)?);
                }
            }
            (ty, field) = tlv::read_tlv(&mut value)?;
        }

        if ty != tlv::CONTENT {
            return Err(PsError::decode("Data missing Content"));
        }
        let content = field;

        let (ty, sig_info) = tlv::read_tlv(&mut value)?;
        if ty != tlv::SIGNATURE_INFO {
            return Err(PsError::decode("Data missing SignatureInfo"));
        }
        let mut sig_type = 0;
        let mut sig_info = sig_info;
        while !sig_info.is_empty() {
            let (sty, svalue) = tlv::read_tlv(&mut sig_info)?;
            if sty == tlv::SIGNATURE_TYPE {
                sig_type = tlv::read_nonneg(&svalue)?;
            }
        }

        let (ty, sig_value) = tlv::read_tlv(&mut value)?;
        if ty != tlv::SIGNATURE_VALUE {
            return Err(PsError::decode("Data missing SignatureValue"));
        }

        Ok(Publication {
            name,
            freshness_ms,
            content,
            sig_type,
            sig_value,
        })
    }
}

impl std::fmt::Debug for Publication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publication")
            .field("name", &self.name)
            .field("content_len", &self.content.len())
            .field("sig_type", &self.sig_type)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> Publication {
        let mut name: Name = "/probe/local/cpu".parse().unwrap();
        name.push_timestamp(Timestamp::from_millis(1_700_000_000_000));
        let mut p = Publication::new(name, Bytes::from_static(b"payload"));
        p.set_signature(0, Bytes::from_static(&[0xab; 32]));
        p
    }

    #[test]
    fn wire_round_trip() {
        let p = sample();
        let wire = p.wire_encode();
        let decoded = Publication::decode(wire.clone()).unwrap();
        assert_eq!(p, decoded);
        assert_eq!(wire, decoded.wire_encode());
    }

    #[test]
    fn round_trip_with_freshness() {
        let mut p = sample();
        p.set_freshness(std::time::Duration::from_millis(500));
        let decoded = Publication::decode(p.wire_encode()).unwrap();
        assert_eq!(Some(500), decoded.freshness_ms());
        assert_eq!(p.wire_encode(), decoded.wire_encode());
    }

    #[test]
    fn timestamp_accessor() {
        let p = sample();
        assert_eq!(1_700_000_000_000, p.timestamp().unwrap().as_millis());
    }

    #[test]
    fn signed_portion_excludes_signature_value() {
        let mut a = sample();
        let mut b = sample();
        a.set_signature(0, Bytes::from_static(&[1; 32]));
        b.set_signature(0, Bytes::from_static(&[2; 32]));
        assert_eq!(a.signed_portion(), b.signed_portion());
        assert_ne!(a.wire_encode(), b.wire_encode());
    }

    #[test]
    fn decode_rejects_wrong_outer_type() {
        let mut buf = BytesMut::new();
        tlv::write_tlv(&mut buf, tlv::CONTENT, b"zz");
        assert!(Publication::decode(buf.freeze()).is_err());
    }
}
