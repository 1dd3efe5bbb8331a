//! TLV wire primitives.
//!
//! Publications and names use an NDN-style type-length-value encoding:
//! type and length are variable-size numbers (1 byte below 253, otherwise a
//! marker byte followed by a 2/4/8-byte big-endian integer), the value is
//! opaque. Number-valued fields (timestamps, freshness periods) are encoded
//! as minimal-length big-endian non-negative integers of 1, 2, 4 or 8 bytes.

use crate::{PsError, PsResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Name TLV type.
pub const NAME: u64 = 7;
/// Generic name component TLV type.
pub const COMPONENT: u64 = 8;
/// Data (publication) TLV type.
pub const DATA: u64 = 6;
/// MetaInfo TLV type.
pub const META_INFO: u64 = 20;
/// Content TLV type.
pub const CONTENT: u64 = 21;
/// SignatureInfo TLV type.
pub const SIGNATURE_INFO: u64 = 22;
/// SignatureValue TLV type.
pub const SIGNATURE_VALUE: u64 = 23;
/// FreshnessPeriod TLV type (inside MetaInfo).
pub const FRESHNESS_PERIOD: u64 = 25;
/// SignatureType TLV type (inside SignatureInfo).
pub const SIGNATURE_TYPE: u64 = 27;
/// The content tag marking a block of publications in a sync response.
pub const SYNCPS_CONTENT: u64 = 129;

/// Append a variable-size number.
pub fn write_varnum(buf: &mut BytesMut, n: u64) {
    if n < 253 {
        buf.put_u8(n as u8);
    } else if n <= u16::MAX as u64 {
        buf.put_u8(253);
        buf.put_u16(n as u16);
    } else if n <= u32::MAX as u64 {
        buf.put_u8(254);
        buf.put_u32(n as u32);
    } else {
        buf.put_u8(255);
        buf.put_u64(n);
    }
}

/// Read a variable-size number, advancing `buf` past it.
pub fn read_varnum(buf: &mut Bytes) -> PsResult<u64> {
    if !buf.has_remaining() {
        return Err(PsError::decode("varnum on empty buffer"));
    }
    let first = buf.get_u8();
    let extra = match first {
        0..=252 => return Ok(first as u64),
        253 => 2,
        254 => 4,
        _ => 8,
    };
    if buf.remaining() < extra {
        return Err(PsError::decode("truncated varnum"));
    }
    Ok(match extra {
        2 => buf.get_u16() as u64,
        4 => buf.get_u32() as u64,
        _ => buf.get_u64(),
    })
}

/// Append a full TLV: type, length, value.
pub fn write_tlv(buf: &mut BytesMut, ty: u64, value: &[u8]) {
    write_varnum(buf, ty);
    write_varnum(buf, value.len() as u64);
    buf.put_slice(value);
}

/// Read one TLV off the front of `buf`, returning its type and value.
///
/// The value is split out of `buf` without copying; `buf` is left at the
/// byte following the TLV.
pub fn read_tlv(buf: &mut Bytes) -> PsResult<(u64, Bytes)> {
    let ty = read_varnum(buf)?;
    let len = read_varnum(buf)? as usize;
    if buf.remaining() < len {
        return Err(PsError::decode(format!(
            "TLV type {} claims {} bytes, {} remain",
            ty,
            len,
            buf.remaining()
        )));
    }
    Ok((ty, buf.split_to(len)))
}

/// Encode a number as a minimal-length big-endian non-negative integer.
pub fn nonneg_bytes(n: u64) -> Bytes {
    let mut buf = BytesMut::new();
    if n <= u8::MAX as u64 {
        buf.put_u8(n as u8);
    } else if n <= u16::MAX as u64 {
        buf.put_u16(n as u16);
    } else if n <= u32::MAX as u64 {
        buf.put_u32(n as u32);
    } else {
        buf.put_u64(n);
    }
    buf.freeze()
}

/// Decode a non-negative integer value of 1, 2, 4 or 8 bytes.
pub fn read_nonneg(value: &[u8]) -> PsResult<u64> {
    Ok(match value.len() {
        1 => value[0] as u64,
        2 => u16::from_be_bytes([value[0], value[1]]) as u64,
        4 => u32::from_be_bytes([value[0], value[1], value[2], value[3]])
            as u64,
        8 => u64::from_be_bytes([
            value[0], value[1], value[2], value[3], value[4], value[5],
            value[6], value[7],
        ]),
        n => {
            return Err(PsError::decode(format!(
                "non-negative integer of {} bytes",
                n
            )))
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn varnum_round_trip() {
        for n in [0u64, 1, 128, 252, 253, 300, 65535, 65536, u32::MAX as u64, u64::MAX] {
            let mut buf = BytesMut::new();
            write_varnum(&mut buf, n);
            let mut bytes = buf.freeze();
            assert_eq!(n, read_varnum(&mut bytes).unwrap());
            assert!(bytes.is_empty());
        }
    }

    #[test]
    fn varnum_boundary_encoding() {
        let mut buf = BytesMut::new();
        write_varnum(&mut buf, 252);
        assert_eq!(&[252][..], &buf[..]);

        let mut buf = BytesMut::new();
        write_varnum(&mut buf, 253);
        assert_eq!(&[253, 0, 253][..], &buf[..]);
    }

    #[test]
    fn tlv_round_trip() {
        let mut buf = BytesMut::new();
        write_tlv(&mut buf, COMPONENT, b"hello");
        write_tlv(&mut buf, CONTENT, b"");
        let mut bytes = buf.freeze();

        let (ty, value) = read_tlv(&mut bytes).unwrap();
        assert_eq!(COMPONENT, ty);
        assert_eq!(&b"hello"[..], &value[..]);

        let (ty, value) = read_tlv(&mut bytes).unwrap();
        assert_eq!(CONTENT, ty);
        assert!(value.is_empty());
        assert!(bytes.is_empty());
    }

    #[test]
    fn tlv_truncated_value_rejected() {
        let mut buf = BytesMut::new();
        write_varnum(&mut buf, DATA);
        write_varnum(&mut buf, 10);
        buf.put_slice(b"short");
        assert!(read_tlv(&mut buf.freeze()).is_err());
    }

    #[test]
    fn nonneg_round_trip() {
        for n in [0u64, 200, 256, 40_000, 70_000, 1u64 << 40] {
            assert_eq!(n, read_nonneg(&nonneg_bytes(n)).unwrap());
        }
    }

    #[test]
    fn nonneg_odd_width_rejected() {
        assert!(read_nonneg(&[1, 2, 3]).is_err());
        assert!(read_nonneg(&[]).is_err());
    }
}
